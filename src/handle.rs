// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Upload handles.

An [UploadHandle] pairs a CPU pixel buffer with a native upload registration and a
destination texture.  Write pixels into [UploadHandle::buffer_mut], then schedule the
handle; the upload happens at the next frame boundary.

```
use std::rc::Rc;
use texture_apply_async::handle::UploadHandle;
use texture_apply_async::native::{BufferRegistry, UploadPrimitive};
use texture_apply_async::pixel_formats::TextureFormat;
use texture_apply_async::texture::{TextureDescriptor, UploadTarget};

let registry: Rc<dyn UploadPrimitive> = Rc::new(BufferRegistry::new());
let texture: Rc<dyn UploadTarget> = Rc::new(TextureDescriptor::new("sprite", 4, 4, TextureFormat::Rgba32));
let mut handle = UploadHandle::new(&texture, registry).unwrap();
assert!(handle.is_valid());
assert_eq!(handle.buffer().map(|b| b.len()), Some(64));

handle.buffer_mut().unwrap().fill(0xFF);
handle.dispose();
assert!(!handle.is_valid());
```
*/

use std::cell::{Cell, RefCell};
use std::fmt::{Debug, Formatter};
use std::ptr::NonNull;
use std::rc::{Rc, Weak};

use crate::command_list::CommandList;
use crate::error::{HandleError, ScheduleError};
use crate::native::{BufferAddress, EventHandler, UploadId, UploadPrimitive};
use crate::pixel_formats::size_in_bytes;
use crate::runtime;
use crate::texture::UploadTarget;

/// A request that arrived while the scheduler was dispatching, applied at the next frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum Deferred {
    #[default]
    Nothing,
    Dirty,
    Cancel,
}

/**
The part of a handle the scheduler holds on to.

Identity (for set membership) is the address of this allocation.
*/
pub(crate) struct HandleState {
    id: Cell<UploadId>,
    texture: RefCell<Option<Weak<dyn UploadTarget>>>,
    event_handler: EventHandler,
    deferred: Cell<Deferred>,
}

impl HandleState {
    /// Records `request`.  A pending cancel is never downgraded.
    pub(crate) fn defer(&self, request: Deferred) {
        if self.deferred.get() != Deferred::Cancel {
            self.deferred.set(request);
        }
    }

    pub(crate) fn take_deferred(&self) -> Deferred {
        self.deferred.take()
    }

    pub(crate) fn id(&self) -> UploadId {
        self.id.get()
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.id.get().is_registered()
            && self
                .texture
                .borrow()
                .as_ref()
                .is_some_and(|texture| texture.strong_count() > 0)
    }

    pub(crate) fn fill_command_list(&self, list: &mut CommandList) {
        let id = self.id.get();
        if !id.is_registered() {
            return;
        }
        let texture = self.texture.borrow().as_ref().and_then(Weak::upgrade);
        if let Some(texture) = texture {
            list.push_upload(self.event_handler, &texture, id);
        }
    }
}

impl Debug for HandleState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleState")
            .field("id", &self.id.get())
            .field("valid", &self.is_valid())
            .field("event_handler", &self.event_handler)
            .field("deferred", &self.deferred.get())
            .finish()
    }
}

/**
Caller-owned upload handle.

The buffer's address is handed to the native primitive at creation and stays fixed for the
life of the handle.  Dropping the handle disposes it.
*/
pub struct UploadHandle {
    state: Rc<HandleState>,
    //allocated from a Box<[u8]>; all access goes through this pointer so the registered address stays valid
    buffer: Option<NonNull<[u8]>>,
    primitive: Rc<dyn UploadPrimitive>,
}

impl UploadHandle {
    /**
    Creates a handle with a buffer sized for `texture`.

    The buffer starts as a copy of the texture's readable pixels if it has any, zeroed
    otherwise.  Fails if the texture format has no known footprint.
    */
    pub fn new(texture: &Rc<dyn UploadTarget>, primitive: Rc<dyn UploadPrimitive>) -> Result<Self, HandleError> {
        let buffer = initial_buffer(texture.as_ref())?;
        Ok(Self::register(texture, buffer, primitive))
    }

    /// Creates a handle that adopts `buffer`, which must match the texture's footprint exactly.
    pub fn with_buffer(
        texture: &Rc<dyn UploadTarget>,
        buffer: Box<[u8]>,
        primitive: Rc<dyn UploadPrimitive>,
    ) -> Result<Self, HandleError> {
        let expected = size_in_bytes(texture.format(), texture.width(), texture.height())?;
        if buffer.len() != expected {
            return Err(HandleError::BufferSize {
                expected,
                actual: buffer.len(),
            });
        }
        Ok(Self::register(texture, buffer, primitive))
    }

    fn register(texture: &Rc<dyn UploadTarget>, buffer: Box<[u8]>, primitive: Rc<dyn UploadPrimitive>) -> Self {
        let (raw, id) = register_buffer(primitive.as_ref(), texture.as_ref(), buffer);
        UploadHandle {
            state: Rc::new(HandleState {
                id: Cell::new(id),
                texture: RefCell::new(Some(Rc::downgrade(texture))),
                event_handler: primitive.event_handler(),
                deferred: Cell::new(Deferred::Nothing),
            }),
            buffer: Some(raw),
            primitive,
        }
    }

    /**
    Re-sizes the buffer to the texture's current footprint and registers it again.

    Call this after the host resized or reformatted the texture.  The buffer starts over as in
    [UploadHandle::new].  A scheduled handle stays scheduled and is re-recorded at the next
    frame.  Does nothing on an invalid handle.

    On error the handle is left as it was.
    */
    pub fn reinitialize(&mut self) -> Result<(), HandleError> {
        let Some(texture) = self.texture() else {
            return Ok(());
        };
        if !self.id().is_registered() {
            return Ok(());
        }
        let buffer = initial_buffer(texture.as_ref())?;

        let old = self.state.id.replace(UploadId::UNREGISTERED);
        self.primitive.dispose_upload_request(old);
        self.free_buffer();

        let (raw, id) = register_buffer(self.primitive.as_ref(), texture.as_ref(), buffer);
        self.buffer = Some(raw);
        self.state.id.set(id);
        self.state.defer(Deferred::Dirty);
        Ok(())
    }

    /// Registration id, or [UploadId::UNREGISTERED] once disposed.
    pub fn id(&self) -> UploadId {
        self.state.id()
    }

    /// Registered and pointing at a live texture.
    pub fn is_valid(&self) -> bool {
        self.state.is_valid()
    }

    pub fn texture(&self) -> Option<Rc<dyn UploadTarget>> {
        self.state.texture.borrow().as_ref().and_then(Weak::upgrade)
    }

    pub fn buffer(&self) -> Option<&[u8]> {
        //safe: the allocation is owned by self and freed only in dispose, which takes &mut self
        self.buffer.map(|raw| unsafe { raw.as_ref() })
    }

    /**
    Mutable access to the pixel buffer.

    Don't hold on to the slice across a frame callback; the host reads the buffer while it
    replays the upload.
    */
    pub fn buffer_mut(&mut self) -> Option<&mut [u8]> {
        //safe: &mut self guarantees no other borrow of the buffer exists on our side
        self.buffer.map(|mut raw| unsafe { raw.as_mut() })
    }

    /// Upload this handle every frame until cancelled.
    pub fn schedule_every_frame(&self) -> Result<(), ScheduleError> {
        runtime::schedule_every_frame(self)
    }

    /// Upload this handle at the next frame boundary only.
    pub fn schedule_once(&self) -> Result<(), ScheduleError> {
        runtime::schedule_once(self)
    }

    /// Stops any scheduled uploads.  No-op if nothing is scheduled.
    pub fn cancel_updates(&self) {
        runtime::cancel(self)
    }

    /// Tells the scheduler the upload needs re-recording.  Only meaningful while scheduled.
    pub fn mark_dirty(&self) -> Result<(), ScheduleError> {
        runtime::mark_dirty(self)
    }

    pub fn is_scheduled(&self) -> bool {
        runtime::is_scheduled(self)
    }

    /// Appends this handle's upload command to `list`.  Does nothing if the handle is invalid.
    pub fn fill_command_list(&self, list: &mut CommandList) {
        self.state.fill_command_list(list)
    }

    /**
    Cancels scheduling, releases the native registration and frees the buffer.

    Idempotent.  Never fails.
    */
    pub fn dispose(&mut self) {
        runtime::cancel(self);

        let id = self.state.id.replace(UploadId::UNREGISTERED);
        if id.is_registered() {
            self.primitive.dispose_upload_request(id);
        }
        self.state.texture.borrow_mut().take();
        self.free_buffer();
    }

    //only after the registration pointing at the buffer is released
    fn free_buffer(&mut self) {
        if let Some(raw) = self.buffer.take() {
            //safe: raw came from Box::leak in register_buffer and nothing registered refers to it
            unsafe { drop(Box::from_raw(raw.as_ptr())) };
        }
    }

    pub(crate) fn state(&self) -> &Rc<HandleState> {
        &self.state
    }
}

/// A buffer for `texture`: its readable pixels if it has any, zeroed otherwise.
fn initial_buffer(texture: &dyn UploadTarget) -> Result<Box<[u8]>, HandleError> {
    let expected = size_in_bytes(texture.format(), texture.width(), texture.height())?;
    match texture.readable_pixels() {
        Some(pixels) if pixels.len() == expected => Ok(pixels.into_boxed_slice()),
        Some(pixels) => Err(HandleError::BufferSize {
            expected,
            actual: pixels.len(),
        }),
        None => Ok(vec![0u8; expected].into_boxed_slice()),
    }
}

/// Leaks `buffer` so its address stays put and hands that address to `primitive`.
fn register_buffer(
    primitive: &dyn UploadPrimitive,
    texture: &dyn UploadTarget,
    buffer: Box<[u8]>,
) -> (NonNull<[u8]>, UploadId) {
    let raw = NonNull::from(Box::leak(buffer));
    let id = primitive.create_upload_request(BufferAddress::new(raw.cast::<u8>(), raw.len()));
    if !id.is_registered() {
        logwise::warn_sync!(
            "native primitive refused registration for a {width}x{height} {format} texture; handle will stay invalid",
            width = texture.width(),
            height = texture.height(),
            format = logwise::privacy::LogIt(&texture.format())
        );
    }
    (raw, id)
}

impl Drop for UploadHandle {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl Debug for UploadHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadHandle")
            .field("state", &self.state)
            .field("buffer_len", &self.buffer.map(|raw| raw.len()))
            .finish()
    }
}
