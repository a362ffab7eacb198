// Copyright 2024 the Piet Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A software pixel compositing engine.
//!
//! Images (rasters in many pixel formats, solid fills and gradients) are combined
//! with Porter-Duff and blend operators, optionally through a mask, into a raster
//! destination:
//!
//! ```
//! use raster_compose::{composite, Color, Format, Image, Operator};
//!
//! let src = Image::solid(Color::from_argb32(0x8080_0000));
//! let mut dest = Image::bits(Format::A8R8G8B8, 16, 16).unwrap();
//! composite(Operator::Over, &src, None, &mut dest, 0, 0, 0, 0, 0, 0, 16, 16);
//! assert_eq!(dest.as_bits().unwrap().pixel_32(3, 3), 0x8080_0000);
//! ```
//!
//! Requests are served by an [`ImplementationChain`]: specialized backends first, the
//! generic scanline loop last. Every backend produces the same bytes.

#![cfg_attr(not(feature = "simd"), forbid(unsafe_code))]

mod bits;
pub mod codec;
pub mod combine;
mod error;
mod fast_path;
pub mod format;
pub mod general;
pub mod gradient;
pub mod image;
pub mod implementation;
pub mod operator;
pub mod palette;
pub mod region;
#[cfg(feature = "simd")]
mod simd;
mod util;

pub use error::Error;
pub use format::{Format, FormatType};
pub use general::CompositeInfo;
pub use gradient::{Color, GradientStop};
pub use image::{AlphaMap, BitsImage, Filter, Image, ImageClass, ImageKind, Repeat};
pub use implementation::{ExecutionMode, ImplementationChain};
pub use operator::Operator;
pub use palette::Palette;
pub use peniko;
pub use peniko::kurbo;
pub use region::{IntRect, Region};
pub use util::{fixed_from_f64, fixed_to_f64, Fixed, FIXED_HALF, FIXED_ONE};

use once_cell::sync::Lazy;

static CHAIN: Lazy<ImplementationChain> = Lazy::new(ImplementationChain::default);

/// The process-wide chain used by the free functions of this crate, built on first use
/// with [`ExecutionMode::default`].
pub fn implementation_chain() -> &'static ImplementationChain {
    &CHAIN
}

/// Composite `src`, through `mask` if given, onto `dest` with `op`.
///
/// The `width x height` rectangle at `(dest_x, dest_y)` of `dest` reads `src` from
/// `(src_x, src_y)` and `mask` from `(mask_x, mask_y)`.
#[allow(clippy::too_many_arguments)]
pub fn composite(
    op: Operator,
    src: &Image,
    mask: Option<&Image>,
    dest: &mut Image,
    src_x: i16,
    src_y: i16,
    mask_x: i16,
    mask_y: i16,
    dest_x: i16,
    dest_y: i16,
    width: u16,
    height: u16,
) {
    composite32(
        op,
        src,
        mask,
        dest,
        i32::from(src_x),
        i32::from(src_y),
        i32::from(mask_x),
        i32::from(mask_y),
        i32::from(dest_x),
        i32::from(dest_y),
        i32::from(width),
        i32::from(height),
    );
}

/// [`composite`] with 32-bit coordinates.
#[allow(clippy::too_many_arguments)]
pub fn composite32(
    op: Operator,
    src: &Image,
    mask: Option<&Image>,
    dest: &mut Image,
    src_x: i32,
    src_y: i32,
    mask_x: i32,
    mask_y: i32,
    dest_x: i32,
    dest_y: i32,
    width: i32,
    height: i32,
) {
    let info = CompositeInfo {
        op,
        src,
        mask,
        src_x,
        src_y,
        mask_x,
        mask_y,
        dest_x,
        dest_y,
        width,
        height,
    };
    CHAIN.composite(&info, dest);
}

/// Copy raw pixels between two rasters of equal depth. See [`ImplementationChain::blt`].
#[allow(clippy::too_many_arguments)]
pub fn blt(
    src: &Image,
    dest: &mut Image,
    src_x: i32,
    src_y: i32,
    dest_x: i32,
    dest_y: i32,
    width: i32,
    height: i32,
) -> bool {
    CHAIN.blt(src, dest, src_x, src_y, dest_x, dest_y, width, height)
}

/// Fill a rectangle of `dest` with a raw pixel value. See [`ImplementationChain::fill`].
pub fn fill(dest: &mut Image, x: i32, y: i32, width: u32, height: u32, filler: u32) -> bool {
    CHAIN.fill(dest, IntRect::from_origin_size(x, y, width, height), filler)
}

/// Composite a solid `color` onto each rectangle of `rects`.
pub fn fill_rectangles(op: Operator, dest: &mut Image, color: impl Into<Color>, rects: &[IntRect]) {
    CHAIN.fill_rectangles(op, dest, color.into(), rects);
}
