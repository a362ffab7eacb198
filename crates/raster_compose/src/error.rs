// Copyright 2024 the Piet Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::format::Format;

/// Errors reported by image construction and mutation.
///
/// The compositing entry points themselves never fail: a malformed request is a
/// caller error and is ignored.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// `width * height * bpp` (or the stride product) does not fit in memory.
    #[error("image of {width}x{height} at {bpp} bpp overflows the addressable size")]
    SizeOverflow { width: i32, height: i32, bpp: u32 },
    /// Allocating pixel storage or a lookup table failed.
    #[error("allocation failed")]
    AllocationFailed,
    /// A caller-supplied pixel buffer is shorter than `stride * height`.
    #[error("pixel buffer holds {actual} words, but {needed} are required")]
    BufferTooSmall { needed: usize, actual: usize },
    /// The format code is not one this engine can fetch or store.
    #[error("unsupported pixel format {0:?}")]
    UnsupportedFormat(Format),
    /// A gradient was created without any color stops.
    #[error("a gradient needs at least one color stop")]
    EmptyGradient,
    /// Convolution filter parameters do not describe a `width x height` kernel.
    #[error("convolution filter parameters are malformed")]
    InvalidFilterParams,
    /// The operation requires a raster image.
    #[error("operation requires a bits image")]
    NotBits,
    /// Encoded image data could not be decoded.
    #[error("invalid PNG data")]
    InvalidPng,
}
