// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Error types.
//!
//! Invalid handles are not errors: scheduling or filling with a disposed or
//! never-registered handle is silently ignored.  What remains are precondition
//! violations and sizing failures.

use crate::pixel_formats::TextureFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum PixelFormatError {
    #[error("texture format {0:?} is not supported yet")]
    Unsupported(TextureFormat),
    #[error("{width}x{height} {format:?} texture doesn't fit in memory")]
    TooLarge {
        format: TextureFormat,
        width: u32,
        height: u32,
    },
}

/// Errors creating an [crate::handle::UploadHandle].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum HandleError {
    #[error("can't size upload buffer: {0}")]
    Format(#[from] PixelFormatError),
    #[error("upload buffer is {actual} bytes but the texture needs {expected}")]
    BufferSize { expected: usize, actual: usize },
}

/// Precondition violations reported by the scheduling entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ScheduleError {
    /// No scheduler is installed on the calling thread.
    ///
    /// Either [crate::runtime::init] was never called, the scheduler was torn down,
    /// or the call came from a thread other than the one driving the frame loop.
    #[error("no frame scheduler is installed on this thread")]
    NotInitialized,
    /// The scheduler is dispatching a host callback and can't be re-entered.
    #[error("frame scheduler is busy dispatching a host callback")]
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum InitError {
    #[error("a frame scheduler is already installed on this thread")]
    AlreadyInitialized,
}
