// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! texture_apply_async schedules CPU->GPU texture uploads so they land at frame boundaries
without stalling the thread that produced the pixels.

# Overview

Client code owns an [UploadHandle]: a CPU pixel buffer, registered once with a native
upload primitive, plus a weak reference to the destination texture.  It writes pixels into
the buffer whenever it likes and asks for the upload to happen either every frame
([UploadHandle::schedule_every_frame]) or on the next frame only
([UploadHandle::schedule_once]).

The frame scheduler collects scheduled handles into a single labelled [CommandList] and
hands it to the host renderer once per frame.  Hosts submit work in one of two models:

| Model      | Host callback          | How the list reaches the GPU                        |
|------------|------------------------|-----------------------------------------------------|
| Per target | [runtime::on_pre_render], once per target | attached to the first target rendered each frame, detached on rebind |
| Frame wide | [runtime::on_begin_frame], once per frame  | executed through the host's [host::ExecutionContext]          |

The scheduler subscribes to whichever model the host reports when the first handle is
scheduled, and unsubscribes when it runs out of work, so an idle scheduler costs nothing
per frame.

# Threading

Everything runs on the thread that drives the host frame loop.  [runtime::init] installs
the scheduler there; calls from other threads get [error::ScheduleError::NotInitialized].

# Backends

With the default `backend_wgpu` feature, [WgpuTexture], [WgpuHost] and [QueueContext]
connect the scheduler to a `wgpu::Queue`.  Other hosts implement [host::RenderHost] and
[texture::UploadTarget] themselves.
*/

pub mod command_list;
pub mod config;
pub mod error;
pub mod handle;
pub mod host;
mod imp;
pub mod native;
pub mod pixel_formats;
pub mod runtime;
pub mod scheduler;
pub mod texture;

pub use command_list::CommandList;
pub use config::Config;
pub use handle::UploadHandle;
pub use runtime::RuntimeGuard;
pub use scheduler::SchedulerStats;

#[cfg(feature = "backend_wgpu")]
pub use imp::{BackendError, QueueContext, WgpuHost, WgpuTexture, headless_device, wgpu_format};
