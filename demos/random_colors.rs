// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Refills a 64x64 texture with random colours every frame and queues a one-shot upload
//! for each refill.
//!
//! Runs headless: there is no window, just a wgpu device and a fixed number of frames.
//!
//! ```bash
//! cargo run --example random_colors
//! ```

use std::rc::Rc;

use texture_apply_async::config::Config;
use texture_apply_async::native::BufferRegistry;
use texture_apply_async::pixel_formats::TextureFormat;
use texture_apply_async::runtime;
use texture_apply_async::texture::UploadTarget;
use texture_apply_async::{UploadHandle, WgpuHost, WgpuTexture, headless_device};

const FRAMES: usize = 120;

/// xorshift32; good enough for noise.
struct Noise(u32);

impl Noise {
    fn next(&mut self) -> u32 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.0 = x;
        x
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Starting random colors example...");
    let (device, queue) = test_executors::sleep_on(headless_device("random_colors"))?;

    let host = WgpuHost::new();
    let _runtime = runtime::init(Box::new(host.clone()), Config::from_env())?;
    let registry = Rc::new(BufferRegistry::new());

    let texture: Rc<dyn UploadTarget> = Rc::new(WgpuTexture::new(&device, "random", 64, 64, TextureFormat::Rgba32)?);
    let mut handle = UploadHandle::new(&texture, registry.clone())?;

    let mut noise = Noise(0x9E37_79B9);
    let mut uploaded = 0;
    for _ in 0..FRAMES {
        if let Some(pixels) = handle.buffer_mut() {
            for pixel in pixels.chunks_exact_mut(4) {
                let [r, g, b, _] = noise.next().to_le_bytes();
                pixel.copy_from_slice(&[r, g, b, 0xFF]);
            }
        }
        handle.schedule_once()?;

        uploaded += host.begin_frame(&queue, &registry, &[])?;
        queue.submit([]);
    }
    device.poll(wgpu::PollType::Wait)?;

    println!("uploaded {uploaded} textures over {FRAMES} frames");
    if let Some(stats) = runtime::stats() {
        println!("{stats:?}");
    }
    handle.dispose();
    Ok(())
}
