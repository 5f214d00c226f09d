// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
wgpu backend.

* [WgpuTexture] is an upload target backed by a `wgpu::Texture`.
* [WgpuHost] is a frame-wide host.  wgpu has no per-camera command buffers to attach to,
  so the frame loop hands a [QueueContext] to [crate::runtime::on_begin_frame] instead.
* [QueueContext] replays a command list with `Queue::write_texture`, resolving each
  command's bytes through the [BufferRegistry] that issued its id.
*/

use std::any::Any;
use std::cell::Cell;
use std::rc::Rc;

use wgpu::{Extent3d, TexelCopyBufferLayout, TexelCopyTextureInfo};

use crate::command_list::{CommandList, UploadCommand};
use crate::error::{PixelFormatError, ScheduleError};
use crate::host::{ExecutionContext, RenderHost, SubmissionKind, TargetInfo};
use crate::native::{BufferRegistry, TextureUpdate, UploadEvent, UploadPrimitive};
use crate::pixel_formats::{TextureFormat, size_in_bytes};
use crate::runtime;
use crate::texture::UploadTarget;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BackendError {
    #[error("texture format {0:?} has no wgpu equivalent")]
    UnsupportedFormat(TextureFormat),
    #[error("can't size texture: {0}")]
    Format(#[from] PixelFormatError),
    #[error("no such adapter: {0}")]
    NoSuchAdapter(#[from] wgpu::RequestAdapterError),
    #[error(transparent)]
    RequestDevice(#[from] wgpu::RequestDeviceError),
}

/**
The wgpu format a [TextureFormat] uploads into.

Only formats whose CPU layout matches a wgpu format byte for byte are mapped.  Packed
16-bit formats, 24-bit RGB and the mobile compression families have no wgpu counterpart.
*/
pub fn wgpu_format(format: TextureFormat) -> Result<wgpu::TextureFormat, BackendError> {
    use wgpu::TextureFormat as W;
    Ok(match format {
        TextureFormat::Alpha8 | TextureFormat::R8 => W::R8Unorm,
        TextureFormat::Rg16 => W::Rg8Unorm,
        TextureFormat::Rgba32 => W::Rgba8Unorm,
        TextureFormat::Bgra32 => W::Bgra8Unorm,
        TextureFormat::RHalf => W::R16Float,
        TextureFormat::RgHalf => W::Rg16Float,
        TextureFormat::RgbaHalf => W::Rgba16Float,
        TextureFormat::RFloat => W::R32Float,
        TextureFormat::RgFloat => W::Rg32Float,
        TextureFormat::RgbaFloat => W::Rgba32Float,
        TextureFormat::Rgb9e5Float => W::Rgb9e5Ufloat,
        other => return Err(BackendError::UnsupportedFormat(other)),
    })
}

/// A GPU texture that can receive uploads.
#[derive(Debug)]
pub struct WgpuTexture {
    texture: wgpu::Texture,
    format: TextureFormat,
    width: u32,
    height: u32,
}

impl WgpuTexture {
    pub fn new(
        device: &wgpu::Device,
        debug_name: &str,
        width: u32,
        height: u32,
        format: TextureFormat,
    ) -> Result<Self, BackendError> {
        let wgpu_format = wgpu_format(format)?;
        let descriptor = wgpu::TextureDescriptor {
            label: Some(debug_name),
            size: Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu_format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        };
        Ok(WgpuTexture {
            texture: device.create_texture(&descriptor),
            format,
            width,
            height,
        })
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }
}

impl UploadTarget for WgpuTexture {
    fn width(&self) -> u32 {
        self.width
    }
    fn height(&self) -> u32 {
        self.height
    }
    fn format(&self) -> TextureFormat {
        self.format
    }
}

/**
Frame-wide host for a wgpu frame loop.

Clones share subscription state, so keep one and box the other into [crate::runtime::init].
*/
#[derive(Debug, Clone, Default)]
pub struct WgpuHost {
    subscribed: Rc<Cell<bool>>,
}

impl WgpuHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the scheduler currently wants frame callbacks.
    pub fn is_subscribed(&self) -> bool {
        self.subscribed.get()
    }

    /**
    Runs the frame-begin callback against `queue`.

    Returns the number of textures written, which is 0 when the scheduler is not subscribed.
    */
    pub fn begin_frame(
        &self,
        queue: &wgpu::Queue,
        registry: &BufferRegistry,
        targets: &[TargetInfo],
    ) -> Result<usize, ScheduleError> {
        if !self.is_subscribed() {
            return Ok(0);
        }
        let mut context = QueueContext::new(queue, registry);
        runtime::on_begin_frame(&mut context, targets)?;
        Ok(context.uploaded())
    }
}

impl RenderHost for WgpuHost {
    fn submission_kind(&self) -> SubmissionKind {
        SubmissionKind::FrameWide
    }
    fn subscribe(&mut self, kind: SubmissionKind) {
        if kind != SubmissionKind::FrameWide {
            logwise::warn_sync!(
                "wgpu host only delivers frame-wide callbacks, not {kind}",
                kind = logwise::privacy::LogIt(&kind)
            );
            return;
        }
        self.subscribed.set(true);
    }
    fn unsubscribe(&mut self, _kind: SubmissionKind) {
        self.subscribed.set(false);
    }
}

/// Executes command lists by writing each upload through a queue.
#[derive(Debug)]
pub struct QueueContext<'a> {
    queue: &'a wgpu::Queue,
    registry: &'a BufferRegistry,
    uploaded: usize,
}

impl<'a> QueueContext<'a> {
    pub fn new(queue: &'a wgpu::Queue, registry: &'a BufferRegistry) -> Self {
        QueueContext {
            queue,
            registry,
            uploaded: 0,
        }
    }

    /// Textures written so far.
    pub fn uploaded(&self) -> usize {
        self.uploaded
    }

    fn upload(&self, command: &UploadCommand) -> bool {
        let Some(target) = command.texture() else {
            return false;
        };
        let Some(texture) = (target.as_ref() as &dyn Any).downcast_ref::<WgpuTexture>() else {
            logwise::warn_sync!(
                "skipping upload {id} into a texture the wgpu backend doesn't own",
                id = command.upload_id.get()
            );
            return false;
        };
        let mut update = TextureUpdate::new(command.upload_id, texture.format, texture.width, texture.height);
        self.registry.handle_event(UploadEvent::UpdateTextureBegin, &mut update);
        let Some(data) = update.data else {
            return false;
        };
        let Ok(expected) = size_in_bytes(texture.format, texture.width, texture.height) else {
            return false;
        };
        if data.len() != expected || texture.height == 0 {
            return false;
        }
        //safe: the registration is live (the registry just resolved it) and handles are not
        //written to while a frame callback runs on their thread
        let bytes = unsafe { data.as_slice() };
        self.queue.write_texture(
            TexelCopyTextureInfo {
                texture: &texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytes,
            TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some((expected / texture.height as usize) as u32),
                rows_per_image: Some(texture.height),
            },
            Extent3d {
                width: texture.width,
                height: texture.height,
                depth_or_array_layers: 1,
            },
        );
        self.registry.handle_event(UploadEvent::UpdateTextureEnd, &mut update);
        true
    }
}

impl ExecutionContext for QueueContext<'_> {
    fn execute(&mut self, list: &CommandList) {
        let handler = self.registry.event_handler();
        for command in list {
            if command.event_handler != handler {
                continue;
            }
            if self.upload(command) {
                self.uploaded += 1;
            }
        }
        logwise::trace_sync!(
            "wrote {uploaded} of {count} uploads from {label}",
            uploaded = self.uploaded,
            count = list.len(),
            label = logwise::privacy::LogIt(&list.label())
        );
    }
}

/// Requests an adapter and device with no surface, for offscreen frame loops.
pub async fn headless_device(debug_name: &str) -> Result<(wgpu::Device, wgpu::Queue), BackendError> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::from_env_or_default());
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions::default())
        .await?;
    let descriptor = wgpu::DeviceDescriptor {
        label: Some(debug_name),
        ..Default::default()
    };
    Ok(adapter.request_device(&descriptor).await?)
}
