// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Destination textures.

Textures are created and owned by the host.  Handles only keep a weak reference, so a
texture the host destroys makes every handle pointing at it invalid.
*/

use std::any::Any;
use std::fmt::Debug;

use crate::pixel_formats::TextureFormat;

/**
A texture that can receive uploads.

Backends downcast through [Any] to reach their own texture type when executing commands.
*/
pub trait UploadTarget: Debug + Any {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn format(&self) -> TextureFormat;

    /**
    Current CPU-visible pixel data of the top mip level, if the host keeps a readable copy.

    New handles start from this data instead of a zeroed buffer.
    */
    fn readable_pixels(&self) -> Option<Vec<u8>> {
        None
    }
}

/// A texture known only by its description.
///
/// Useful for hosts that track GPU textures elsewhere and identify them by label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureDescriptor {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub pixels: Option<Vec<u8>>,
}

impl TextureDescriptor {
    pub fn new(label: impl Into<String>, width: u32, height: u32, format: TextureFormat) -> Self {
        TextureDescriptor {
            label: label.into(),
            width,
            height,
            format,
            pixels: None,
        }
    }

    /// Marks the texture readable with the given initial contents.
    pub fn with_pixels(mut self, pixels: Vec<u8>) -> Self {
        self.pixels = Some(pixels);
        self
    }
}

impl UploadTarget for TextureDescriptor {
    fn width(&self) -> u32 {
        self.width
    }
    fn height(&self) -> u32 {
        self.height
    }
    fn format(&self) -> TextureFormat {
        self.format
    }
    fn readable_pixels(&self) -> Option<Vec<u8>> {
        self.pixels.clone()
    }
}
