// Copyright 2024 the Piet Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! C bindings for the compositing engine.
//!
//! Images are handed out as owned pointers. Every `rc_image_create_*` and
//! `rc_image_ref` result must be released with `rc_image_unref`. Constructors return
//! a null pointer on failure.

#![allow(non_camel_case_types)]
#![allow(clippy::missing_safety_doc)]

use raster_compose::kurbo::{Affine, Point};
use raster_compose::{
    Color, Filter, Fixed, Format, GradientStop, Image, IntRect, Operator, Palette, Region, Repeat,
};
use std::ptr;
use std::slice;

pub struct rc_image(Image);

#[repr(C)]
#[derive(Copy, Clone)]
pub struct rc_point {
    x: f64,
    y: f64,
}

impl From<rc_point> for Point {
    fn from(value: rc_point) -> Self {
        Point::new(value.x, value.y)
    }
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct rc_transform {
    sx: f64,
    kx: f64,
    ky: f64,
    sy: f64,
    tx: f64,
    ty: f64,
}

impl From<Affine> for rc_transform {
    fn from(value: Affine) -> Self {
        let [sx, kx, ky, sy, tx, ty] = value.as_coeffs();
        Self {
            sx,
            kx,
            ky,
            sy,
            tx,
            ty,
        }
    }
}

impl From<rc_transform> for Affine {
    fn from(value: rc_transform) -> Self {
        Affine::new([value.sx, value.kx, value.ky, value.sy, value.tx, value.ty])
    }
}

/// A premultiplied color with 16 bits per channel.
#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct rc_color {
    pub red: u16,
    pub green: u16,
    pub blue: u16,
    pub alpha: u16,
}

impl From<rc_color> for Color {
    fn from(value: rc_color) -> Self {
        Color::new(value.red, value.green, value.blue, value.alpha)
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct rc_gradient_stop {
    pub offset: f64,
    pub color: rc_color,
}

impl From<rc_gradient_stop> for GradientStop {
    fn from(value: rc_gradient_stop) -> Self {
        GradientStop::new(value.offset, value.color)
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct rc_rect {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl From<rc_rect> for IntRect {
    fn from(value: rc_rect) -> Self {
        IntRect::new(value.x0, value.y0, value.x1, value.y1)
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub enum rc_repeat {
    None,
    Normal,
    Pad,
    Reflect,
}

impl From<rc_repeat> for Repeat {
    fn from(value: rc_repeat) -> Self {
        match value {
            rc_repeat::None => Repeat::None,
            rc_repeat::Normal => Repeat::Normal,
            rc_repeat::Pad => Repeat::Pad,
            rc_repeat::Reflect => Repeat::Reflect,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub enum rc_filter {
    Fast,
    Good,
    Best,
    Nearest,
    Bilinear,
    Convolution,
}

impl From<rc_filter> for Filter {
    fn from(value: rc_filter) -> Self {
        match value {
            rc_filter::Fast => Filter::Fast,
            rc_filter::Good => Filter::Good,
            rc_filter::Best => Filter::Best,
            rc_filter::Nearest => Filter::Nearest,
            rc_filter::Bilinear => Filter::Bilinear,
            rc_filter::Convolution => Filter::Convolution,
        }
    }
}

fn into_raw(image: Image) -> *mut rc_image {
    Box::into_raw(Box::new(rc_image(image)))
}

unsafe fn stops(stops: *const rc_gradient_stop, count: usize) -> Vec<GradientStop> {
    if stops.is_null() {
        return vec![];
    }
    slice::from_raw_parts(stops, count)
        .iter()
        .map(|&stop| stop.into())
        .collect()
}

#[no_mangle]
pub extern "C" fn rc_transform_identity() -> rc_transform {
    Affine::IDENTITY.into()
}

#[no_mangle]
pub extern "C" fn rc_transform_translate(tx: f64, ty: f64) -> rc_transform {
    Affine::translate((tx, ty)).into()
}

#[no_mangle]
pub extern "C" fn rc_transform_scale(sx: f64, sy: f64) -> rc_transform {
    Affine::scale_non_uniform(sx, sy).into()
}

#[no_mangle]
pub extern "C" fn rc_transform_rotate(degrees: f64) -> rc_transform {
    Affine::rotate(degrees.to_radians()).into()
}

/// Create a zeroed raster. `format` is a packed format code.
#[no_mangle]
pub extern "C" fn rc_image_create_bits(format: u32, width: i32, height: i32) -> *mut rc_image {
    match Image::bits(Format::from_code(format), width, height) {
        Ok(image) => into_raw(image),
        Err(e) => {
            log::error!("rc_image_create_bits: {e}");
            ptr::null_mut()
        }
    }
}

/// Create a raster over a copy of `stride * height` words of `data`.
#[no_mangle]
pub unsafe extern "C" fn rc_image_create_bits_with_data(
    format: u32,
    width: i32,
    height: i32,
    data: *const u32,
    stride: usize,
) -> *mut rc_image {
    let len = stride.saturating_mul(height.max(0) as usize);
    let data = if data.is_null() {
        vec![]
    } else {
        slice::from_raw_parts(data, len).to_vec()
    };

    match Image::bits_with_data(Format::from_code(format), width, height, data, stride) {
        Ok(image) => into_raw(image),
        Err(e) => {
            log::error!("rc_image_create_bits_with_data: {e}");
            ptr::null_mut()
        }
    }
}

#[no_mangle]
pub extern "C" fn rc_image_create_solid(color: rc_color) -> *mut rc_image {
    into_raw(Image::solid(color))
}

#[no_mangle]
pub unsafe extern "C" fn rc_image_create_linear_gradient(
    p1: rc_point,
    p2: rc_point,
    stops_ptr: *const rc_gradient_stop,
    count: usize,
) -> *mut rc_image {
    match Image::linear_gradient(p1.into(), p2.into(), &stops(stops_ptr, count)) {
        Ok(image) => into_raw(image),
        Err(e) => {
            log::error!("rc_image_create_linear_gradient: {e}");
            ptr::null_mut()
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn rc_image_create_radial_gradient(
    c1: rc_point,
    r1: f64,
    c2: rc_point,
    r2: f64,
    stops_ptr: *const rc_gradient_stop,
    count: usize,
) -> *mut rc_image {
    match Image::radial_gradient(c1.into(), r1, c2.into(), r2, &stops(stops_ptr, count)) {
        Ok(image) => into_raw(image),
        Err(e) => {
            log::error!("rc_image_create_radial_gradient: {e}");
            ptr::null_mut()
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn rc_image_create_conical_gradient(
    center: rc_point,
    degrees: f64,
    stops_ptr: *const rc_gradient_stop,
    count: usize,
) -> *mut rc_image {
    match Image::conical_gradient(center.into(), degrees.to_radians(), &stops(stops_ptr, count)) {
        Ok(image) => into_raw(image),
        Err(e) => {
            log::error!("rc_image_create_conical_gradient: {e}");
            ptr::null_mut()
        }
    }
}

/// A new handle sharing the image. Writes through either handle copy the pixels first.
#[no_mangle]
pub unsafe extern "C" fn rc_image_ref(image: *const rc_image) -> *mut rc_image {
    into_raw((*image).0.clone())
}

#[no_mangle]
pub unsafe extern "C" fn rc_image_unref(image: *mut rc_image) {
    if !image.is_null() {
        let _ = Box::from_raw(image);
    }
}

#[no_mangle]
pub unsafe extern "C" fn rc_image_width(image: *const rc_image) -> i32 {
    (*image).0.width()
}

#[no_mangle]
pub unsafe extern "C" fn rc_image_height(image: *const rc_image) -> i32 {
    (*image).0.height()
}

/// The row stride in 32-bit words, or 0 for images without pixel storage.
#[no_mangle]
pub unsafe extern "C" fn rc_image_stride(image: *const rc_image) -> usize {
    (*image).0.as_bits().map_or(0, |bits| bits.stride())
}

/// The pixel storage, or null for images without one. Valid until the image is next
/// written or released.
#[no_mangle]
pub unsafe extern "C" fn rc_image_data(image: *const rc_image) -> *const u32 {
    (*image)
        .0
        .as_bits()
        .map_or(ptr::null(), |bits| bits.data().as_ptr())
}

#[no_mangle]
pub unsafe extern "C" fn rc_image_set_transform(image: *mut rc_image, transform: rc_transform) {
    (*image).0.set_transform(Some(transform.into()));
}

#[no_mangle]
pub unsafe extern "C" fn rc_image_set_repeat(image: *mut rc_image, repeat: rc_repeat) {
    (*image).0.set_repeat(repeat.into());
}

#[no_mangle]
pub unsafe extern "C" fn rc_image_set_filter(image: *mut rc_image, filter: rc_filter) -> bool {
    match (*image).0.set_filter(filter.into(), &[]) {
        Ok(()) => true,
        Err(e) => {
            log::error!("rc_image_set_filter: {e}");
            false
        }
    }
}

/// Set `filter` with `count` 16.16 parameters. A convolution takes the kernel width
/// and height followed by the kernel, row by row.
#[no_mangle]
pub unsafe extern "C" fn rc_image_set_filter_params(
    image: *mut rc_image,
    filter: rc_filter,
    params: *const Fixed,
    count: usize,
) -> bool {
    let params: &[Fixed] = if params.is_null() {
        &[]
    } else {
        slice::from_raw_parts(params, count)
    };
    match (*image).0.set_filter(filter.into(), params) {
        Ok(()) => true,
        Err(e) => {
            log::error!("rc_image_set_filter_params: {e}");
            false
        }
    }
}

/// Give an indexed image up to 256 ARGB `entries`, as a gray palette when `gray`.
#[no_mangle]
pub unsafe extern "C" fn rc_image_set_palette(
    image: *mut rc_image,
    entries: *const u32,
    count: usize,
    gray: bool,
) -> bool {
    let entries: &[u32] = if entries.is_null() {
        &[]
    } else {
        slice::from_raw_parts(entries, count)
    };
    let palette = if gray {
        Palette::gray(entries)
    } else {
        Palette::color(entries)
    };
    match (*image).0.set_palette(palette) {
        Ok(()) => true,
        Err(e) => {
            log::error!("rc_image_set_palette: {e}");
            false
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn rc_image_set_component_alpha(image: *mut rc_image, component_alpha: bool) {
    (*image).0.set_component_alpha(component_alpha);
}

#[no_mangle]
pub unsafe extern "C" fn rc_image_set_alpha_map(
    image: *mut rc_image,
    alpha_map: *const rc_image,
    x: i16,
    y: i16,
) -> bool {
    let alpha_map = alpha_map.as_ref().map(|a| &a.0);
    match (*image).0.set_alpha_map(alpha_map, x, y) {
        Ok(()) => true,
        Err(e) => {
            log::error!("rc_image_set_alpha_map: {e}");
            false
        }
    }
}

/// Clip to the union of `count` rectangles. A null `rects` removes the clip.
#[no_mangle]
pub unsafe extern "C" fn rc_image_set_clip_rectangles(
    image: *mut rc_image,
    rects: *const rc_rect,
    count: usize,
) {
    if rects.is_null() {
        (*image).0.set_clip_region(None);
        return;
    }

    let rects: Vec<IntRect> = slice::from_raw_parts(rects, count)
        .iter()
        .map(|&r| r.into())
        .collect();
    (*image).0.set_clip_region(Some(&Region::from_rects(&rects)));
}

/// Composite `src` through the optional `mask` onto `dest`. Returns false for an
/// unknown operator code.
#[no_mangle]
pub unsafe extern "C" fn rc_composite(
    op: u32,
    src: *const rc_image,
    mask: *const rc_image,
    dest: *mut rc_image,
    src_x: i16,
    src_y: i16,
    mask_x: i16,
    mask_y: i16,
    dest_x: i16,
    dest_y: i16,
    width: u16,
    height: u16,
) -> bool {
    let Some(op) = Operator::from_code(op) else {
        log::error!("rc_composite: unknown operator {op:#x}");
        return false;
    };

    let mask = mask.as_ref().map(|m| &m.0);
    raster_compose::composite(
        op,
        &(*src).0,
        mask,
        &mut (*dest).0,
        src_x,
        src_y,
        mask_x,
        mask_y,
        dest_x,
        dest_y,
        width,
        height,
    );
    true
}

#[no_mangle]
pub unsafe extern "C" fn rc_blt(
    src: *const rc_image,
    dest: *mut rc_image,
    src_x: i32,
    src_y: i32,
    dest_x: i32,
    dest_y: i32,
    width: i32,
    height: i32,
) -> bool {
    raster_compose::blt(
        &(*src).0,
        &mut (*dest).0,
        src_x,
        src_y,
        dest_x,
        dest_y,
        width,
        height,
    )
}

/// Fill a rectangle with a raw pixel value of the destination format.
#[no_mangle]
pub unsafe extern "C" fn rc_fill(
    dest: *mut rc_image,
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    filler: u32,
) -> bool {
    raster_compose::fill(&mut (*dest).0, x, y, width, height, filler)
}

#[no_mangle]
pub unsafe extern "C" fn rc_fill_rectangles(
    op: u32,
    dest: *mut rc_image,
    color: rc_color,
    rects: *const rc_rect,
    count: usize,
) -> bool {
    let Some(op) = Operator::from_code(op) else {
        log::error!("rc_fill_rectangles: unknown operator {op:#x}");
        return false;
    };
    if rects.is_null() {
        return true;
    }

    let rects: Vec<IntRect> = slice::from_raw_parts(rects, count)
        .iter()
        .map(|&r| r.into())
        .collect();
    raster_compose::fill_rectangles(op, &mut (*dest).0, Color::from(color), &rects);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const A8R8G8B8: u32 = Format::A8R8G8B8.code();

    #[test]
    fn composite_through_handles() {
        unsafe {
            let src = rc_image_create_solid(rc_color {
                red: 0xffff,
                green: 0,
                blue: 0,
                alpha: 0xffff,
            });
            let dest = rc_image_create_bits(A8R8G8B8, 4, 2);
            assert!(!dest.is_null());

            assert!(rc_composite(
                Operator::Over.code(),
                src,
                ptr::null(),
                dest,
                0,
                0,
                0,
                0,
                1,
                0,
                2,
                2
            ));

            let data = slice::from_raw_parts(rc_image_data(dest), 8);
            assert_eq!(rc_image_stride(dest), 4);
            assert_eq!(data, &[0, 0xffff_0000, 0xffff_0000, 0, 0, 0xffff_0000, 0xffff_0000, 0]);

            assert!(!rc_composite(0xdead, src, ptr::null(), dest, 0, 0, 0, 0, 0, 0, 1, 1));

            rc_image_unref(src);
            rc_image_unref(dest);
        }
    }

    #[test]
    fn references_copy_on_write() {
        unsafe {
            let image = rc_image_create_bits(A8R8G8B8, 2, 1);
            let shared = rc_image_ref(image);
            assert!(rc_fill(image, 0, 0, 2, 1, 0xff00_ff00));

            assert_eq!(slice::from_raw_parts(rc_image_data(image), 2), &[0xff00_ff00; 2]);
            assert_eq!(slice::from_raw_parts(rc_image_data(shared), 2), &[0; 2]);

            rc_image_unref(image);
            rc_image_unref(shared);
        }
    }

    #[test]
    fn palettes_map_colors_to_indices() {
        unsafe {
            let dest = rc_image_create_bits(Format::C8.code(), 4, 1);
            let entries = [0xff00_0000, 0xffff_0000];
            assert!(rc_image_set_palette(dest, entries.as_ptr(), entries.len(), false));

            let red = rc_image_create_solid(rc_color {
                red: 0xffff,
                green: 0,
                blue: 0,
                alpha: 0xffff,
            });
            assert!(!rc_image_set_palette(red, entries.as_ptr(), entries.len(), false));
            assert!(rc_composite(
                Operator::Src.code(),
                red,
                ptr::null(),
                dest,
                0,
                0,
                0,
                0,
                1,
                0,
                2,
                1
            ));

            let word = *rc_image_data(dest);
            assert_eq!(word.to_ne_bytes(), [0, 1, 1, 0]);

            rc_image_unref(red);
            rc_image_unref(dest);
        }
    }

    #[test]
    fn convolution_takes_its_kernel() {
        unsafe {
            let image = rc_image_create_bits(A8R8G8B8, 2, 2);
            let kernel = [1 << 16, 1 << 16, raster_compose::FIXED_ONE];
            assert!(rc_image_set_filter_params(
                image,
                rc_filter::Convolution,
                kernel.as_ptr(),
                kernel.len()
            ));
            assert!(!rc_image_set_filter_params(
                image,
                rc_filter::Convolution,
                kernel.as_ptr(),
                2
            ));
            assert!(rc_image_set_filter_params(image, rc_filter::Bilinear, ptr::null(), 0));
            rc_image_unref(image);
        }
    }

    #[test]
    fn invalid_requests_return_null() {
        assert!(rc_image_create_bits(0, 4, 4).is_null());
        unsafe {
            assert!(rc_image_create_linear_gradient(
                rc_point { x: 0.0, y: 0.0 },
                rc_point { x: 1.0, y: 0.0 },
                ptr::null(),
                0
            )
            .is_null());
        }
    }
}
