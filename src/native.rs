// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The native upload primitive.

The primitive is the piece that actually copies bytes into GPU memory when the host
replays an upload command.  The scheduler never calls into it directly; it only needs

1.  a way to register a CPU buffer's address and get an opaque id back,
2.  a way to release that registration,
3.  an [EventHandler] tag to stamp on every command, so the host knows which primitive
    services the upload.

[BufferRegistry] is an implementation of the primitive's bookkeeping half: an
id -> address map with an event callback that resolves the data pointer when the host
begins a texture update.
*/

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt::Debug;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::pixel_formats::TextureFormat;

/**
Opaque registration id issued by the native primitive.

`0` is reserved to mean "not registered".
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct UploadId(u32);

impl UploadId {
    pub const UNREGISTERED: UploadId = UploadId(0);

    pub const fn new(raw: u32) -> Self {
        UploadId(raw)
    }
    pub const fn get(self) -> u32 {
        self.0
    }
    pub const fn is_registered(self) -> bool {
        self.0 != 0
    }
}

/// Tag identifying the primitive that services a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventHandler(u64);

impl EventHandler {
    pub const fn new(tag: u64) -> Self {
        EventHandler(tag)
    }
    pub const fn tag(self) -> u64 {
        self.0
    }
}

/**
Address and length of a registered CPU buffer.

The owner guarantees the memory stays put until the registration is disposed.
Reading through it is only sound while the owner isn't writing.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferAddress {
    ptr: NonNull<u8>,
    len: usize,
}

impl BufferAddress {
    pub fn new(ptr: NonNull<u8>, len: usize) -> Self {
        BufferAddress { ptr, len }
    }
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }
    pub fn len(&self) -> usize {
        self.len
    }
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /**
    Views the buffer as a slice.

    # Safety
    The registration must still be live and nothing may hold a mutable borrow of the
    buffer for the lifetime of the returned slice.
    */
    pub unsafe fn as_slice<'a>(&self) -> &'a [u8] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

/// Interface the core needs from the native upload primitive.
pub trait UploadPrimitive: Debug {
    /// Registers `buffer`.  Returns [UploadId::UNREGISTERED] if registration failed.
    fn create_upload_request(&self, buffer: BufferAddress) -> UploadId;
    fn dispose_upload_request(&self, id: UploadId);
    fn event_handler(&self) -> EventHandler;
}

/// Phase of a texture update the host reports to the event callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadEvent {
    UpdateTextureBegin,
    UpdateTextureEnd,
}

/// Parameters the host passes to the event callback for one texture update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureUpdate {
    pub upload_id: UploadId,
    pub format: TextureFormat,
    pub width: u32,
    pub height: u32,
    /// Filled in by the callback on [UploadEvent::UpdateTextureBegin].
    pub data: Option<BufferAddress>,
}

impl TextureUpdate {
    pub fn new(upload_id: UploadId, format: TextureFormat, width: u32, height: u32) -> Self {
        TextureUpdate {
            upload_id,
            format,
            width,
            height,
            data: None,
        }
    }
}

static NEXT_HANDLER_TAG: AtomicU64 = AtomicU64::new(1);

/**
Id -> buffer address map.

Ids are issued in increasing order starting at 1 and are not reused until the counter
wraps.  Each registry has its own [EventHandler] tag.
*/
#[derive(Debug)]
pub struct BufferRegistry {
    handler: EventHandler,
    last_id: Cell<u32>,
    buffers: RefCell<HashMap<UploadId, BufferAddress>>,
}

impl BufferRegistry {
    pub fn new() -> Self {
        BufferRegistry {
            handler: EventHandler::new(NEXT_HANDLER_TAG.fetch_add(1, Ordering::Relaxed)),
            last_id: Cell::new(0),
            buffers: RefCell::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.buffers.borrow().len()
    }
    pub fn is_empty(&self) -> bool {
        self.buffers.borrow().is_empty()
    }
    pub fn contains(&self, id: UploadId) -> bool {
        self.buffers.borrow().contains_key(&id)
    }
    pub fn address(&self, id: UploadId) -> Option<BufferAddress> {
        self.buffers.borrow().get(&id).copied()
    }

    /**
    Event callback.

    On [UploadEvent::UpdateTextureBegin] for a registered id, points `update.data` at the
    registered buffer.  Everything else leaves `update` untouched.
    */
    pub fn handle_event(&self, event: UploadEvent, update: &mut TextureUpdate) {
        if event != UploadEvent::UpdateTextureBegin {
            return;
        }
        if let Some(address) = self.address(update.upload_id) {
            update.data = Some(address);
        }
    }

    fn next_id(&self) -> UploadId {
        //0 is the sentinel, skip it on wrap
        let next = self.last_id.get().wrapping_add(1).max(1);
        self.last_id.set(next);
        UploadId::new(next)
    }
}

impl Default for BufferRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadPrimitive for BufferRegistry {
    fn create_upload_request(&self, buffer: BufferAddress) -> UploadId {
        let id = self.next_id();
        self.buffers.borrow_mut().insert(id, buffer);
        logwise::trace_sync!("BufferRegistry: registered {id} ({len} bytes)", id = id.get(), len = buffer.len());
        id
    }

    fn dispose_upload_request(&self, id: UploadId) {
        self.buffers.borrow_mut().remove(&id);
    }

    fn event_handler(&self) -> EventHandler {
        self.handler
    }
}
