// Copyright 2024 the Piet Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Architecture-generic fast paths.
//!
//! These routines work on raw storage of the most common format combinations. Each
//! one writes exactly what the generic loop would, including zeroed padding bits in
//! formats without alpha.

use crate::codec;
use crate::combine::Combiners;
use crate::format::Format;
use crate::general::CompositeInfo;
use crate::image::{BitsImage, Image};
use crate::implementation::{FastPath, Implementation, NeedFlags, PathFormat};
use crate::operator::Operator;
use crate::region::IntRect;
use crate::util::scalar::{cvt_0565_to_0888, cvt_8888_to_0565, mul_un8, mul_un8x4, over};

macro_rules! fast_path {
    ($op:ident, $src:ident, $mask:ident, $dest:ident, $func:ident) => {
        FastPath {
            op: Some(Operator::$op),
            src: PathFormat::Is(Format::$src),
            mask: PathFormat::Is(Format::$mask),
            dest: PathFormat::Is(Format::$dest),
            needs: NeedFlags::empty(),
            func: $func,
        }
    };
    ($op:ident, $src:ident, $mask:ident, $dest:ident, $needs:ident, $func:ident) => {
        FastPath {
            needs: NeedFlags::$needs,
            ..fast_path!($op, $src, $mask, $dest, $func)
        }
    };
}

const FAST_PATHS: &[FastPath] = &[
    fast_path!(Over, SOLID, A8, A8R8G8B8, over_n_8_8888),
    fast_path!(Over, SOLID, A8, X8R8G8B8, over_n_8_8888),
    fast_path!(Over, SOLID, A8, A8B8G8R8, over_n_8_8888),
    fast_path!(Over, SOLID, A8, X8B8G8R8, over_n_8_8888),
    fast_path!(Over, SOLID, A8, R5G6B5, over_n_8_0565),
    fast_path!(Over, SOLID, A8, B5G6R5, over_n_8_0565),
    fast_path!(Over, SOLID, A8R8G8B8, A8R8G8B8, COMPONENT_ALPHA, over_n_8888_8888_ca),
    fast_path!(Over, SOLID, A8R8G8B8, X8R8G8B8, COMPONENT_ALPHA, over_n_8888_8888_ca),
    fast_path!(Over, SOLID, A8B8G8R8, A8B8G8R8, COMPONENT_ALPHA, over_n_8888_8888_ca),
    fast_path!(Over, SOLID, A8B8G8R8, X8B8G8R8, COMPONENT_ALPHA, over_n_8888_8888_ca),
    fast_path!(Over, SOLID, NULL, A8R8G8B8, OPAQUE_SOURCE, src_n),
    fast_path!(Over, SOLID, NULL, X8R8G8B8, OPAQUE_SOURCE, src_n),
    fast_path!(Over, SOLID, NULL, A8B8G8R8, OPAQUE_SOURCE, src_n),
    fast_path!(Over, SOLID, NULL, X8B8G8R8, OPAQUE_SOURCE, src_n),
    fast_path!(Over, SOLID, NULL, R5G6B5, OPAQUE_SOURCE, src_n),
    fast_path!(Over, SOLID, NULL, B5G6R5, OPAQUE_SOURCE, src_n),
    fast_path!(Over, X8R8G8B8, NULL, X8R8G8B8, OPAQUE_SOURCE, src_8888),
    fast_path!(Over, X8R8G8B8, NULL, A8R8G8B8, OPAQUE_SOURCE, src_8888),
    fast_path!(Over, X8B8G8R8, NULL, X8B8G8R8, OPAQUE_SOURCE, src_8888),
    fast_path!(Over, X8B8G8R8, NULL, A8B8G8R8, OPAQUE_SOURCE, src_8888),
    fast_path!(Over, A8R8G8B8, NULL, A8R8G8B8, combine_8888),
    fast_path!(Over, A8R8G8B8, NULL, X8R8G8B8, combine_8888),
    fast_path!(Over, A8B8G8R8, NULL, A8B8G8R8, combine_8888),
    fast_path!(Over, A8B8G8R8, NULL, X8B8G8R8, combine_8888),
    fast_path!(Over, A8R8G8B8, NULL, R5G6B5, over_8888_0565),
    fast_path!(Over, A8B8G8R8, NULL, B5G6R5, over_8888_0565),
    fast_path!(Add, A8R8G8B8, NULL, A8R8G8B8, combine_8888),
    fast_path!(Add, A8B8G8R8, NULL, A8B8G8R8, combine_8888),
    fast_path!(Add, A8, NULL, A8, add_8_8),
    fast_path!(Add, SOLID, A8, A8, add_n_8_8),
    fast_path!(Src, SOLID, NULL, A8R8G8B8, src_n),
    fast_path!(Src, SOLID, NULL, X8R8G8B8, src_n),
    fast_path!(Src, SOLID, NULL, A8B8G8R8, src_n),
    fast_path!(Src, SOLID, NULL, X8B8G8R8, src_n),
    fast_path!(Src, SOLID, NULL, R5G6B5, src_n),
    fast_path!(Src, SOLID, NULL, B5G6R5, src_n),
    fast_path!(Src, SOLID, NULL, A8, src_n),
    fast_path!(Src, A8R8G8B8, NULL, A8R8G8B8, src_8888),
    fast_path!(Src, A8R8G8B8, NULL, X8R8G8B8, src_8888),
    fast_path!(Src, X8R8G8B8, NULL, X8R8G8B8, src_8888),
    fast_path!(Src, X8R8G8B8, NULL, A8R8G8B8, src_8888),
    fast_path!(Src, A8B8G8R8, NULL, A8B8G8R8, src_8888),
    fast_path!(Src, A8B8G8R8, NULL, X8B8G8R8, src_8888),
    fast_path!(Src, X8B8G8R8, NULL, X8B8G8R8, src_8888),
    fast_path!(Src, X8B8G8R8, NULL, A8B8G8R8, src_8888),
    fast_path!(Src, R8G8B8, NULL, R8G8B8, src_copy),
    fast_path!(Src, B8G8R8, NULL, B8G8R8, src_copy),
    fast_path!(Src, R5G6B5, NULL, R5G6B5, src_copy),
    fast_path!(Src, B5G6R5, NULL, B5G6R5, src_copy),
    fast_path!(Src, A8, NULL, A8, src_copy),
];

/// The generic fast-path backend, inheriting the combiners of `delegate`.
pub(crate) fn implementation(delegate: &Implementation) -> Implementation {
    Implementation::new("fast", delegate)
        .with_fast_paths(FAST_PATHS)
        .with_blt(blt)
        .with_fill(fill)
}

/// Bits to set before blending into a 32-bpp format, and bits to keep afterwards.
///
/// Formats without alpha read as opaque and store zero padding.
fn padding(format: Format) -> (u32, u32) {
    if format.has_alpha() {
        (0, u32::MAX)
    } else {
        (0xff00_0000, 0x00ff_ffff)
    }
}

fn span_32(bits: &BitsImage, x: i32, y: i32, width: usize) -> &[u32] {
    let x = x as usize;
    &bits.row(y as usize)[x..x + width]
}

fn span_32_mut(bits: &mut BitsImage, x: i32, y: i32, width: usize) -> &mut [u32] {
    let x = x as usize;
    &mut bits.row_mut(y as usize)[x..x + width]
}

fn span_16_mut(bits: &mut BitsImage, x: i32, y: i32, width: usize) -> &mut [u16] {
    let x = x as usize;
    &mut bytemuck::cast_slice_mut(bits.row_mut(y as usize))[x..x + width]
}

fn span_8(bits: &BitsImage, x: i32, y: i32, width: usize) -> &[u8] {
    let x = x as usize;
    &bytemuck::cast_slice(bits.row(y as usize))[x..x + width]
}

fn span_8_mut(bits: &mut BitsImage, x: i32, y: i32, width: usize) -> &mut [u8] {
    let x = x as usize;
    &mut bytemuck::cast_slice_mut(bits.row_mut(y as usize))[x..x + width]
}

/// The constant source color, in the channel order of `target`.
fn solid_source(info: &CompositeInfo<'_>, target: Format) -> Option<u32> {
    codec::solid_color(info.src, target)
        .map_err(|e| log::error!("solid fast path cannot read its source: {e}"))
        .ok()
}

fn over_n_8_8888(_: &Combiners, info: &CompositeInfo<'_>, dest: &mut Image) {
    let (Some(mask), Some(dest)) = (info.mask.and_then(Image::as_bits), dest.as_bits_mut()) else {
        return;
    };
    let Some(src) = solid_source(info, dest.format()) else {
        return;
    };
    let (pad_in, pad_out) = padding(dest.format());
    let width = info.width as usize;

    for j in 0..info.height {
        let m = span_8(mask, info.mask_x, info.mask_y + j, width);
        let d = span_32_mut(dest, info.dest_x, info.dest_y + j, width);
        for (d, &m) in d.iter_mut().zip(m) {
            let s = match m {
                0 => 0,
                0xff => src,
                m => mul_un8x4(src, u32::from(m)),
            };
            *d = over(s, *d | pad_in) & pad_out;
        }
    }
}

fn over_n_8888_8888_ca(combiners: &Combiners, info: &CompositeInfo<'_>, dest: &mut Image) {
    let (Some(mask), Some(dest)) = (info.mask.and_then(Image::as_bits), dest.as_bits_mut()) else {
        return;
    };
    let Some(src) = solid_source(info, dest.format()) else {
        return;
    };
    let combine = combiners.combine_32_ca[Operator::Over.index()];
    let (pad_in, pad_out) = padding(dest.format());
    let width = info.width as usize;
    let src = vec![src; width];

    for j in 0..info.height {
        let m = span_32(mask, info.mask_x, info.mask_y + j, width);
        let d = span_32_mut(dest, info.dest_x, info.dest_y + j, width);
        d.iter_mut().for_each(|d| *d |= pad_in);
        combine(d, &src, Some(m));
        d.iter_mut().for_each(|d| *d &= pad_out);
    }
}

/// Blend two 32-bpp rows of the same channel order with the unified combiner of the
/// operator.
fn combine_8888(combiners: &Combiners, info: &CompositeInfo<'_>, dest: &mut Image) {
    let (Some(src), Some(dest)) = (info.src.as_bits(), dest.as_bits_mut()) else {
        return;
    };
    let combine = combiners.combine_32[info.op.index()];
    let (pad_in, pad_out) = padding(dest.format());
    let width = info.width as usize;

    for j in 0..info.height {
        let s = span_32(src, info.src_x, info.src_y + j, width);
        let d = span_32_mut(dest, info.dest_x, info.dest_y + j, width);
        if pad_in != 0 {
            d.iter_mut().for_each(|d| *d |= pad_in);
        }
        combine(d, s, None);
        if pad_out != u32::MAX {
            d.iter_mut().for_each(|d| *d &= pad_out);
        }
    }
}

fn over_n_8_0565(_: &Combiners, info: &CompositeInfo<'_>, dest: &mut Image) {
    let (Some(mask), Some(dest)) = (info.mask.and_then(Image::as_bits), dest.as_bits_mut()) else {
        return;
    };
    let Some(src) = solid_source(info, dest.format()) else {
        return;
    };
    let width = info.width as usize;

    for j in 0..info.height {
        let m = span_8(mask, info.mask_x, info.mask_y + j, width);
        let d = span_16_mut(dest, info.dest_x, info.dest_y + j, width);
        for (d, &m) in d.iter_mut().zip(m) {
            let s = match m {
                0 => continue,
                0xff => src,
                m => mul_un8x4(src, u32::from(m)),
            };
            let expanded = cvt_0565_to_0888(u32::from(*d)) | 0xff00_0000;
            *d = cvt_8888_to_0565(over(s, expanded)) as u16;
        }
    }
}

fn over_8888_0565(_: &Combiners, info: &CompositeInfo<'_>, dest: &mut Image) {
    let (Some(src), Some(dest)) = (info.src.as_bits(), dest.as_bits_mut()) else {
        return;
    };
    let width = info.width as usize;

    for j in 0..info.height {
        let s = span_32(src, info.src_x, info.src_y + j, width);
        let d = span_16_mut(dest, info.dest_x, info.dest_y + j, width);
        for (d, &s) in d.iter_mut().zip(s) {
            let expanded = cvt_0565_to_0888(u32::from(*d)) | 0xff00_0000;
            *d = cvt_8888_to_0565(over(s, expanded)) as u16;
        }
    }
}

fn add_8_8(_: &Combiners, info: &CompositeInfo<'_>, dest: &mut Image) {
    let (Some(src), Some(dest)) = (info.src.as_bits(), dest.as_bits_mut()) else {
        return;
    };
    let width = info.width as usize;

    for j in 0..info.height {
        let s = span_8(src, info.src_x, info.src_y + j, width);
        let d = span_8_mut(dest, info.dest_x, info.dest_y + j, width);
        for (d, &s) in d.iter_mut().zip(s) {
            *d = d.saturating_add(s);
        }
    }
}

fn add_n_8_8(_: &Combiners, info: &CompositeInfo<'_>, dest: &mut Image) {
    let (Some(mask), Some(dest)) = (info.mask.and_then(Image::as_bits), dest.as_bits_mut()) else {
        return;
    };
    let Some(src) = solid_source(info, Format::A8) else {
        return;
    };
    let sa = src >> 24;
    let width = info.width as usize;

    for j in 0..info.height {
        let m = span_8(mask, info.mask_x, info.mask_y + j, width);
        let d = span_8_mut(dest, info.dest_x, info.dest_y + j, width);
        for (d, &m) in d.iter_mut().zip(m) {
            *d = (mul_un8(sa, u32::from(m)) + u32::from(*d)).min(0xff) as u8;
        }
    }
}

/// Fill with the constant source. Also serves `Over` with an opaque source.
fn src_n(_: &Combiners, info: &CompositeInfo<'_>, dest: &mut Image) {
    let Some(dest) = dest.as_bits_mut() else {
        return;
    };
    let Some(src) = solid_source(info, Format::A8R8G8B8) else {
        return;
    };
    let filler = dest.codec().encode_32(src, dest.palette());
    let rect = IntRect::from_origin_size(
        info.dest_x,
        info.dest_y,
        info.width as u32,
        info.height as u32,
    );
    fill_raw(dest, rect, filler);
}

/// Copy between 32-bpp formats of the same channel order, forcing alpha where the
/// source has none and clearing padding where the destination has none.
fn src_8888(_: &Combiners, info: &CompositeInfo<'_>, dest: &mut Image) {
    let (Some(src), Some(dest)) = (info.src.as_bits(), dest.as_bits_mut()) else {
        return;
    };
    let (force, _) = padding(src.format());
    let (_, keep) = padding(dest.format());
    let width = info.width as usize;

    for j in 0..info.height {
        let s = span_32(src, info.src_x, info.src_y + j, width);
        let d = span_32_mut(dest, info.dest_x, info.dest_y + j, width);
        for (d, &s) in d.iter_mut().zip(s) {
            *d = (s | force) & keep;
        }
    }
}

/// Byte copy between identical formats without padding bits.
fn src_copy(_: &Combiners, info: &CompositeInfo<'_>, dest: &mut Image) {
    let (Some(src), Some(dest)) = (info.src.as_bits(), dest.as_bits_mut()) else {
        return;
    };
    copy_rows(
        src,
        dest,
        [info.src_x, info.src_y],
        [info.dest_x, info.dest_y],
        [info.width, info.height],
    );
}

fn copy_rows(
    src: &BitsImage,
    dest: &mut BitsImage,
    [src_x, src_y]: [i32; 2],
    [dest_x, dest_y]: [i32; 2],
    [width, height]: [i32; 2],
) {
    let bytes = (src.format().bpp() / 8) as usize;
    let len = width.max(0) as usize * bytes;
    let (sx, dx) = (src_x as usize * bytes, dest_x as usize * bytes);

    for j in 0..height.max(0) {
        let s: &[u8] = bytemuck::cast_slice(src.row((src_y + j) as usize));
        let d: &mut [u8] = bytemuck::cast_slice_mut(dest.row_mut((dest_y + j) as usize));
        d[dx..dx + len].copy_from_slice(&s[sx..sx + len]);
    }
}

/// Row copies between formats of equal, whole-byte depth.
fn blt(
    src: &BitsImage,
    dest: &mut BitsImage,
    src_pos: [i32; 2],
    dest_pos: [i32; 2],
    size: [i32; 2],
) -> bool {
    let bpp = src.format().bpp();
    if bpp != dest.format().bpp() || bpp % 8 != 0 {
        return false;
    }
    copy_rows(src, dest, src_pos, dest_pos, size);
    true
}

/// Slice fills for 8, 16 and 32 bpp.
fn fill(dest: &mut BitsImage, rect: IntRect, filler: u32) -> bool {
    if !matches!(dest.format().bpp(), 8 | 16 | 32) {
        return false;
    }
    fill_raw(dest, rect, filler);
    true
}

fn fill_raw(dest: &mut BitsImage, rect: IntRect, filler: u32) {
    let width = rect.width().max(0) as usize;
    let codec = *dest.codec();

    for y in rect.y0..rect.y1 {
        match dest.format().bpp() {
            32 => span_32_mut(dest, rect.x0, y, width).fill(filler),
            16 => span_16_mut(dest, rect.x0, y, width).fill(filler as u16),
            8 => span_8_mut(dest, rect.x0, y, width).fill(filler as u8),
            _ => {
                let row = dest.row_mut(y as usize);
                for x in rect.x0..rect.x1 {
                    codec.write_raw(row, x as usize, filler);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gradient::Color;
    use crate::implementation::ImplementationChain;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_image(rng: &mut StdRng, format: Format, width: i32, height: i32) -> Image {
        let mut image = Image::bits(format, width, height).unwrap();
        let bits = image.as_bits_mut().unwrap();
        for word in bits.data_mut() {
            *word = rng.gen();
        }
        // Keep 32-bpp pixels with alpha premultiplied.
        if format.bpp() == 32 && format.has_alpha() {
            for word in bits.data_mut() {
                let a = *word >> 24;
                let c = |shift: u32| ((*word >> shift) & 0xff).min(a) << shift;
                *word = (a << 24) | c(16) | c(8) | c(0);
            }
        }
        image
    }

    /// Run every fast path of the table against the general loop on random data.
    #[test]
    fn fast_paths_match_the_general_loop() {
        let mut rng = StdRng::from_seed([7; 32]);
        let fast = ImplementationChain::new(crate::ExecutionMode::Scalar);
        let general = ImplementationChain::general_only();

        for path in FAST_PATHS {
            let (PathFormat::Is(src_format), PathFormat::Is(mask_format), PathFormat::Is(dest_format)) =
                (path.src, path.mask, path.dest)
            else {
                unreachable!();
            };
            let op = path.op.unwrap();

            let src = if src_format == Format::SOLID {
                let alpha = if path.needs.contains(NeedFlags::OPAQUE_SOURCE) {
                    0xff
                } else {
                    rng.gen_range(0..=0xff)
                };
                let c = |rng: &mut StdRng| rng.gen_range(0..=alpha);
                Image::solid(Color::from_argb32(
                    (alpha << 24) | (c(&mut rng) << 16) | (c(&mut rng) << 8) | c(&mut rng),
                ))
            } else {
                random_image(&mut rng, src_format, 9, 5)
            };
            let mask = (mask_format != Format::NULL).then(|| {
                let mut mask = random_image(&mut rng, mask_format, 9, 5);
                mask.set_component_alpha(path.needs.contains(NeedFlags::COMPONENT_ALPHA));
                mask
            });
            let dest = random_image(&mut rng, dest_format, 11, 7);

            let info = CompositeInfo {
                op,
                src: &src,
                mask: mask.as_ref(),
                src_x: 1,
                src_y: 0,
                mask_x: 0,
                mask_y: 1,
                dest_x: 2,
                dest_y: 3,
                width: 8,
                height: 4,
            };
            let (name, hit) = fast.resolve(&info, &dest).unwrap();
            assert_eq!(name, "fast", "{path:?}");
            assert_eq!(
                (hit.op, hit.src, hit.mask, hit.dest, hit.needs),
                (path.op, path.src, path.mask, path.dest, path.needs),
                "{path:?} shadowed by {hit:?}"
            );

            let mut expected = dest.clone();
            general.composite(&info, &mut expected);
            let mut actual = dest.clone();
            fast.composite(&info, &mut actual);
            assert_eq!(
                actual.as_bits().unwrap().data(),
                expected.as_bits().unwrap().data(),
                "{path:?}"
            );
        }
    }

    #[test]
    fn over_solid_a8_into_rgb565() {
        let chain = ImplementationChain::new(crate::ExecutionMode::Scalar);
        let src = Image::solid(Color::from_argb32(0xffff_0000));
        let mask = Image::bits_with_data(Format::A8, 2, 1, vec![0x0000_ff00], 1).unwrap();
        let mut dest = Image::bits_with_data(Format::R5G6B5, 2, 1, vec![0x07e0_07e0], 1).unwrap();
        let info = CompositeInfo {
            op: Operator::Over,
            src: &src,
            mask: Some(&mask),
            src_x: 0,
            src_y: 0,
            mask_x: 0,
            mask_y: 0,
            dest_x: 0,
            dest_y: 0,
            width: 2,
            height: 1,
        };
        chain.composite(&info, &mut dest);
        let bits = dest.as_bits().unwrap();
        let mask_bits = mask.as_bits().unwrap();
        // Where the mask is zero the green destination survives, where it is full the
        // source replaces it.
        for x in 0..2 {
            let expected = if mask_bits.pixel_32(x, 0) == 0 {
                0xff00_ff00
            } else {
                0xffff_0000
            };
            assert_eq!(bits.pixel_32(x, 0), expected);
        }
    }

    #[test]
    fn fill_handles_whole_byte_depths_only() {
        let mut dest = Image::bits(Format::A4, 4, 1).unwrap();
        assert!(!fill(dest.as_bits_mut().unwrap(), IntRect::new(0, 0, 4, 1), 0xf));
        let mut dest = Image::bits(Format::R5G6B5, 4, 2).unwrap();
        assert!(fill(dest.as_bits_mut().unwrap(), IntRect::new(1, 1, 3, 2), 0xf800));
        assert_eq!(dest.as_bits().unwrap().pixel_32(1, 1), 0xffff_0000);
        assert_eq!(dest.as_bits().unwrap().pixel_32(0, 1), 0xff00_0000);
    }
}
