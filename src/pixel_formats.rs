// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Pixel format storage sizes.
//!
//! Upload buffers are sized from the destination texture's dimensions and
//! format before they are registered with the native upload primitive.  This
//! module is the lookup table for that computation.
//!
//! Sizes are tracked in *bits* per pixel, since several block-compressed
//! formats (DXT1, PVRTC, ETC) use less than one byte per pixel.
//!
//! # Examples
//!
//! ```
//! use texture_apply_async::pixel_formats::{size_in_bytes, TextureFormat};
//!
//! assert_eq!(size_in_bytes(TextureFormat::Rgba32, 64, 64), Ok(64 * 64 * 4));
//! assert_eq!(size_in_bytes(TextureFormat::Dxt1, 64, 64), Ok(64 * 64 / 2));
//! ```

/*
Quick note on type design.  Pixel formats could be zero-sized types so that
writes are typechecked.  Here the format is only ever read off a texture that
somebody else created, at runtime, so a plain enum is the right shape.
 */

use crate::error::PixelFormatError;

/// Storage format of a destination texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum TextureFormat {
    /// Alpha-only, 8 bit integer.
    Alpha8,
    /// 16 bits/pixel with alpha.
    Argb4444,
    /// Color, 8 bits per channel.
    Rgb24,
    /// Color with alpha, 8 bits per channel.
    Rgba32,
    /// Color with alpha, 8 bits per channel, alpha first.
    Argb32,
    /// 16 bit color.
    Rgb565,
    /// Single channel, 16 bit integer.
    R16,
    /// Compressed color.
    Dxt1,
    /// Compressed color with alpha.
    Dxt5,
    /// Color and alpha, 4 bits per channel.
    Rgba4444,
    /// Color with alpha, 8 bits per channel, blue first.
    Bgra32,
    /// Single channel, 16 bit float.
    RHalf,
    /// Two channels, 16 bit float per channel.
    RgHalf,
    /// Four channels, 16 bit float per channel.
    RgbaHalf,
    /// Single channel, 32 bit float.
    RFloat,
    /// Two channels, 32 bit float per channel.
    RgFloat,
    /// Four channels, 32 bit float per channel.
    RgbaFloat,
    /// RGB HDR, 9 bit mantissa per channel and a shared 5 bit exponent.
    Rgb9e5Float,
    /// Compressed one channel.
    Bc4,
    /// Compressed two channels.
    Bc5,
    /// HDR compressed color.
    Bc6h,
    /// High quality compressed color.
    Bc7,
    /// PowerVR 2 bits/pixel color.
    PvrtcRgb2,
    /// PowerVR 2 bits/pixel color with alpha.
    PvrtcRgba2,
    /// PowerVR 4 bits/pixel color.
    PvrtcRgb4,
    /// PowerVR 4 bits/pixel color with alpha.
    PvrtcRgba4,
    /// ETC 4 bits/pixel RGB.
    EtcRgb4,
    /// ETC2 EAC 4 bits/pixel unsigned single channel.
    EacR,
    /// ETC2 EAC 4 bits/pixel signed single channel.
    EacRSigned,
    /// ETC2 EAC 8 bits/pixel unsigned dual channel.
    EacRg,
    /// ETC2 EAC 8 bits/pixel signed dual channel.
    EacRgSigned,
    /// ETC2 4 bits/pixel RGB.
    Etc2Rgb,
    /// ETC2 8 bits/pixel RGBA.
    Etc2Rgba8,
    /// Two channels, 8 bits per channel.
    Rg16,
    /// Single channel, 8 bit integer.
    R8,
    /// Two channels, 16 bit integer per channel.
    Rg32,
    /// Three channels, 16 bit integer per channel.
    Rgb48,
    /// Four channels, 16 bit integer per channel.
    Rgba64,
    /// ETC2 RGB with 1 bit alpha.  Not supported for uploads.
    Etc2Rgba1,
    /// ASTC 4x4 blocks.  Not supported for uploads.
    Astc4x4,
    /// ASTC 6x6 blocks.  Not supported for uploads.
    Astc6x6,
    /// ASTC 8x8 blocks.  Not supported for uploads.
    Astc8x8,
    /// Packed YUV 4:2:2.  Not supported for uploads.
    Yuy2,
}

impl TextureFormat {
    /// Bits of storage per pixel.
    ///
    /// Fails with [PixelFormatError::Unsupported] for formats without a fixed footprint
    /// in the upload table.
    pub const fn bits_per_pixel(self) -> Result<u32, PixelFormatError> {
        use TextureFormat::*;
        let bits = match self {
            PvrtcRgb2 | PvrtcRgba2 => 2,
            Dxt1 | Bc4 | PvrtcRgb4 | PvrtcRgba4 | EtcRgb4 | EacR | EacRSigned | Etc2Rgb => 4,
            Alpha8 | R8 | Dxt5 | Bc5 | Bc6h | Bc7 | EacRg | EacRgSigned | Etc2Rgba8 => 8,
            Argb4444 | Rgba4444 | Rgb565 | R16 | RHalf | Rg16 => 16,
            Rgb24 => 24,
            Rgba32 | Argb32 | Bgra32 | RgHalf | RFloat | Rgb9e5Float | Rg32 => 32,
            Rgb48 => 48,
            RgbaHalf | RgFloat | Rgba64 => 64,
            RgbaFloat => 128,
            Etc2Rgba1 | Astc4x4 | Astc6x6 | Astc8x8 | Yuy2 => {
                return Err(PixelFormatError::Unsupported(self));
            }
        };
        Ok(bits)
    }

    /// True for block-compressed formats, which can't be written row by row.
    pub const fn is_compressed(self) -> bool {
        use TextureFormat::*;
        matches!(
            self,
            Dxt1 | Dxt5
                | Bc4
                | Bc5
                | Bc6h
                | Bc7
                | PvrtcRgb2
                | PvrtcRgba2
                | PvrtcRgb4
                | PvrtcRgba4
                | EtcRgb4
                | EacR
                | EacRSigned
                | EacRg
                | EacRgSigned
                | Etc2Rgb
                | Etc2Rgba8
                | Etc2Rgba1
                | Astc4x4
                | Astc6x6
                | Astc8x8
        )
    }
}

/// Byte footprint of the top mip level of a `width` x `height` texture in `format`.
///
/// Fails with [PixelFormatError::TooLarge] when the bit count overflows `usize`.
pub fn size_in_bytes(format: TextureFormat, width: u32, height: u32) -> Result<usize, PixelFormatError> {
    let bits = format.bits_per_pixel()? as usize;
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(bits))
        .map(|total| total / 8)
        .ok_or(PixelFormatError::TooLarge { format, width, height })
}

/// Bytes per pixel, for formats that use a whole number of them.
///
/// Sub-byte formats report [PixelFormatError::Unsupported]; use [size_in_bytes] for those.
pub fn bytes_per_pixel(format: TextureFormat) -> Result<u32, PixelFormatError> {
    let bits = format.bits_per_pixel()?;
    if bits % 8 != 0 {
        return Err(PixelFormatError::Unsupported(format));
    }
    Ok(bits / 8)
}
