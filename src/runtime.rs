// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The per-thread scheduler singleton and the host-facing entry points.

# Lifecycle

1.  The thread that drives the host's frame loop calls [init] with its [RenderHost] before
    any handle is scheduled.
2.  Handles are scheduled and cancelled from that thread.  The host forwards its frame
    callbacks to [on_pre_render] or [on_begin_frame], whichever it subscribed to.
    Cancelling, dropping or marking a handle dirty from inside one of those callbacks is
    allowed and takes effect when the next frame begins; scheduling from inside one is
    refused with [ScheduleError::Busy].
3.  Dropping the returned [RuntimeGuard] tears the scheduler down: both sets are cleared,
    the command list is detached, and the host subscription is released, in that order.

The scheduler lives in a thread local.  Calls from any other thread find no scheduler and
get [ScheduleError::NotInitialized]; there is no locking.

```
use std::rc::Rc;
use texture_apply_async::command_list::CommandList;
use texture_apply_async::config::Config;
use texture_apply_async::handle::UploadHandle;
use texture_apply_async::host::{ExecutionContext, RenderHost, SubmissionKind};
use texture_apply_async::native::{BufferRegistry, UploadPrimitive};
use texture_apply_async::pixel_formats::TextureFormat;
use texture_apply_async::runtime;
use texture_apply_async::texture::{TextureDescriptor, UploadTarget};

struct Host;
impl RenderHost for Host {
    fn submission_kind(&self) -> SubmissionKind { SubmissionKind::FrameWide }
    fn subscribe(&mut self, _kind: SubmissionKind) {}
    fn unsubscribe(&mut self, _kind: SubmissionKind) {}
}

struct Count(usize);
impl ExecutionContext for Count {
    fn execute(&mut self, list: &CommandList) { self.0 += list.len(); }
}

let _runtime = runtime::init(Box::new(Host), Config::default()).unwrap();
let registry: Rc<dyn UploadPrimitive> = Rc::new(BufferRegistry::new());
let texture: Rc<dyn UploadTarget> = Rc::new(TextureDescriptor::new("t", 2, 2, TextureFormat::R8));
let handle = UploadHandle::new(&texture, registry).unwrap();

handle.schedule_once().unwrap();
let mut frame = Count(0);
runtime::on_begin_frame(&mut frame, &[]).unwrap();
runtime::on_begin_frame(&mut frame, &[]).unwrap();
assert_eq!(frame.0, 1);
```
*/

use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::config::Config;
use crate::error::{InitError, ScheduleError};
use crate::handle::{Deferred, UploadHandle};
use crate::host::{ExecutionContext, RenderHost, TargetInfo};
use crate::scheduler::{FrameEvent, FrameScheduler, SchedulerStats};

thread_local! {
    static SCHEDULER: RefCell<Option<FrameScheduler>> = const { RefCell::new(None) };
}

/**
Keeps the scheduler installed.

Dropping it tears the scheduler down.  Not `Send`: it must be dropped on the thread that
called [init].
*/
#[derive(Debug)]
#[must_use = "dropping the guard tears the scheduler down immediately"]
pub struct RuntimeGuard {
    _not_send: PhantomData<Rc<()>>,
}

impl RuntimeGuard {
    /// Tears the scheduler down now.
    pub fn teardown(self) {}
}

impl Drop for RuntimeGuard {
    fn drop(&mut self) {
        teardown_current();
    }
}

/// Installs a scheduler driving `host` on the calling thread.
pub fn init(host: Box<dyn RenderHost>, config: Config) -> Result<RuntimeGuard, InitError> {
    SCHEDULER.with(|cell| {
        let mut slot = cell.try_borrow_mut().map_err(|_| InitError::AlreadyInitialized)?;
        if slot.is_some() {
            return Err(InitError::AlreadyInitialized);
        }
        logwise::info_sync!(
            "installing frame scheduler {label}",
            label = logwise::privacy::LogIt(&config.label)
        );
        *slot = Some(FrameScheduler::new(host, config));
        Ok(RuntimeGuard {
            _not_send: PhantomData,
        })
    })
}

fn teardown_current() {
    let taken = SCHEDULER
        .try_with(|cell| match cell.try_borrow_mut() {
            Ok(mut slot) => slot.take(),
            Err(_) => {
                logwise::warn_sync!("frame scheduler torn down while dispatching; leaving it installed");
                None
            }
        })
        .ok()
        .flatten();
    //shut down outside the borrow so host callbacks see an empty slot rather than a busy one
    if let Some(mut scheduler) = taken {
        scheduler.shutdown();
        logwise::info_sync!("frame scheduler torn down");
    }
}

pub fn is_initialized() -> bool {
    SCHEDULER
        .try_with(|cell| cell.try_borrow().map(|slot| slot.is_some()).unwrap_or(true))
        .unwrap_or(false)
}

fn with_scheduler<R>(f: impl FnOnce(&mut FrameScheduler) -> R) -> Result<R, ScheduleError> {
    SCHEDULER
        .try_with(|cell| {
            let mut slot = cell.try_borrow_mut().map_err(|_| ScheduleError::Busy)?;
            let scheduler = slot.as_mut().ok_or(ScheduleError::NotInitialized)?;
            Ok(f(scheduler))
        })
        .unwrap_or(Err(ScheduleError::NotInitialized))
}

/// Uploads `handle` every frame until cancelled.  Invalid handles are ignored.
pub fn schedule_every_frame(handle: &UploadHandle) -> Result<(), ScheduleError> {
    with_scheduler(|scheduler| scheduler.schedule_repeating(handle.state()))
}

/// Uploads `handle` on the next processed frame.  Invalid handles are ignored.
pub fn schedule_once(handle: &UploadHandle) -> Result<(), ScheduleError> {
    with_scheduler(|scheduler| scheduler.schedule_once(handle.state()))
}

/**
Removes `handle` from the scheduler.

Without a scheduler there is nothing to cancel, so this never fails.  Called from inside a
host callback, the cancel is recorded on the handle and applied when the next frame begins.
*/
pub fn cancel(handle: &UploadHandle) {
    if let Err(ScheduleError::Busy) = with_scheduler(|scheduler| scheduler.cancel(handle.state())) {
        logwise::trace_sync!(
            "deferring cancel of upload {id} until the next frame",
            id = handle.id().get()
        );
        handle.state().defer(Deferred::Cancel);
    }
}

/**
Marks the command list for rebuilding if `handle` is scheduled.

Like [cancel], a call from inside a host callback takes effect at the next frame.
*/
pub fn mark_dirty(handle: &UploadHandle) -> Result<(), ScheduleError> {
    match with_scheduler(|scheduler| scheduler.mark_dirty(handle.state())) {
        Err(ScheduleError::Busy) => {
            handle.state().defer(Deferred::Dirty);
            Ok(())
        }
        other => other,
    }
}

pub fn is_scheduled(handle: &UploadHandle) -> bool {
    with_scheduler(|scheduler| scheduler.is_scheduled(handle.state())).unwrap_or(false)
}

/**
Per-target frame callback: `target` is about to render frame `frame_index`.

Only the first call for each frame index does any work.
*/
pub fn on_pre_render(target: TargetInfo, frame_index: u64) -> Result<(), ScheduleError> {
    with_scheduler(|scheduler| scheduler.on_frame(FrameEvent::PreRender { target, frame_index }))
}

/// Frame-wide callback: the frame is starting and will render `targets`.
pub fn on_begin_frame<'a>(context: &'a mut dyn ExecutionContext, targets: &'a [TargetInfo]) -> Result<(), ScheduleError> {
    with_scheduler(|scheduler| scheduler.on_frame(FrameEvent::BeginFrame { context, targets }))
}

pub fn stats() -> Option<SchedulerStats> {
    with_scheduler(|scheduler| scheduler.stats()).ok()
}
