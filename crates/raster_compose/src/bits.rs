// Copyright 2024 the Piet Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sampling raster images: repeat, transform, filtering and alpha maps.

use crate::combine::Pixel;
use crate::image::{coord_to_fixed, BitsImage, Common, Filter, Repeat, Sample};
use crate::region::Region;
use peniko::kurbo::{Affine, Point};

/// Map a coordinate into `[0, size)` according to `repeat`, or `None` when the sample
/// is transparent.
#[inline]
pub(crate) fn repeat_coord(repeat: Repeat, v: i64, size: i64) -> Option<usize> {
    let v = match repeat {
        Repeat::None => {
            if v < 0 || v >= size {
                return None;
            }
            v
        }
        Repeat::Normal => v.rem_euclid(size),
        Repeat::Pad => v.clamp(0, size - 1),
        Repeat::Reflect => {
            let v = v.rem_euclid(2 * size);
            if v >= size {
                2 * size - v - 1
            } else {
                v
            }
        }
    };
    Some(v as usize)
}

pub(crate) fn get_scanline<P: Sample>(
    common: &Common,
    bits: &BitsImage,
    x: i32,
    y: i32,
    out: &mut [P],
    mask: Option<&[P]>,
    component_alpha: bool,
) {
    if bits.width() <= 0 || bits.height() <= 0 {
        out.fill(P::default());
        return;
    }

    if common.transform.is_none()
        && common.alpha_map.is_none()
        && common.filter != Filter::Convolution
    {
        fetch_untransformed(common.repeat, bits, x, y, out);
    } else {
        let sampler = Sampler::new(common, bits);
        sampler.fetch_transformed(x, y, out, mask, component_alpha);
    }
}

/// Read `out.len()` stored pixels of row `y` from column `x`, as a composite
/// destination sees them.
///
/// Transform, repeat and filter are ignored. Pixels outside the image read as zero,
/// and an alpha map supplies the alpha.
pub(crate) fn fetch_dest<P: Sample>(common: &Common, bits: &BitsImage, x: i32, y: i32, out: &mut [P]) {
    fetch_untransformed(Repeat::None, bits, x, y, out);

    let Some(am) = common.alpha_map.as_ref() else {
        return;
    };
    let mut alpha = vec![P::default(); out.len()];
    if let Some(am_bits) = am.image.as_bits() {
        let ax = x.saturating_sub(i32::from(am.x));
        let ay = y.saturating_sub(i32::from(am.y));
        fetch_untransformed(Repeat::None, am_bits, ax, ay, &mut alpha);
    }
    for (px, a) in out.iter_mut().zip(&alpha) {
        let a = a.alpha();
        let [_, r, g, b] = px.unpack();
        *px = P::pack([a, r.min(a), g.min(a), b.min(a)]);
    }
}

/// Pixel centers map onto pixel centers, so every filter reduces to a plain fetch.
fn fetch_untransformed<P: Sample>(repeat: Repeat, bits: &BitsImage, x: i32, y: i32, out: &mut [P]) {
    let (w, h) = (i64::from(bits.width()), i64::from(bits.height()));
    let Some(sy) = repeat_coord(repeat, i64::from(y), h) else {
        out.fill(P::default());
        return;
    };

    let row = bits.row(sy);
    let codec = bits.codec();
    let palette = bits.palette();

    if repeat == Repeat::None {
        let len = out.len() as i64;
        let x = i64::from(x);
        let start = (-x).clamp(0, len) as usize;
        let end = (w - x).clamp(start as i64, len) as usize;

        out[..start].fill(P::default());
        out[end..].fill(P::default());
        if start < end {
            P::fetch_row(codec, row, (x + start as i64) as usize, &mut out[start..end], palette);
        }
        return;
    }

    for (i, px) in out.iter_mut().enumerate() {
        *px = match repeat_coord(repeat, i64::from(x) + i as i64, w) {
            Some(sx) => P::fetch_pixel(codec, row, sx, palette),
            None => P::default(),
        };
    }
}

struct Sampler<'a> {
    bits: &'a BitsImage,
    repeat: Repeat,
    filter: Filter,
    params: &'a [i32],
    transform: Affine,
    clip: Option<&'a Region>,
    alpha_map: Option<(&'a BitsImage, i64, i64)>,
}

impl<'a> Sampler<'a> {
    fn new(common: &'a Common, bits: &'a BitsImage) -> Self {
        let clip = (common.has_client_clip && common.transform.is_some()).then_some(&common.clip_region);
        let alpha_map = common.alpha_map.as_ref().and_then(|am| {
            am.image
                .as_bits()
                .map(|b| (b, i64::from(am.x), i64::from(am.y)))
        });

        Self {
            bits,
            repeat: common.repeat,
            filter: common.filter,
            params: &common.filter_params,
            transform: common.transform.unwrap_or(Affine::IDENTITY),
            clip,
            alpha_map,
        }
    }

    fn fetch_transformed<P: Sample>(
        &self,
        x: i32,
        y: i32,
        out: &mut [P],
        mask: Option<&[P]>,
        component_alpha: bool,
    ) {
        for (i, px) in out.iter_mut().enumerate() {
            if let Some(mask) = mask {
                if !mask[i].covers(component_alpha) {
                    *px = P::default();
                    continue;
                }
            }

            let p = self.transform * Point::new(f64::from(x) + i as f64 + 0.5, f64::from(y) + 0.5);
            let (fx, fy) = (coord_to_fixed(p.x), coord_to_fixed(p.y));

            *px = match self.filter {
                Filter::Fast | Filter::Nearest => self.tap(fx.saturating_sub(1) >> 16, fy.saturating_sub(1) >> 16),
                Filter::Good | Filter::Best | Filter::Bilinear => self.bilinear(fx, fy),
                Filter::Convolution => self.convolution(fx, fy),
            };
        }
    }

    /// One source pixel, after repeat, clip and alpha map.
    fn tap<P: Sample>(&self, sx: i64, sy: i64) -> P {
        let bits = self.bits;
        let sx = repeat_coord(self.repeat, sx, i64::from(bits.width()));
        let sy = repeat_coord(self.repeat, sy, i64::from(bits.height()));
        let (Some(sx), Some(sy)) = (sx, sy) else {
            return P::default();
        };

        if let Some(clip) = self.clip {
            if !clip.contains_point(sx as i32, sy as i32) {
                return P::default();
            }
        }

        let px = P::fetch_pixel(bits.codec(), bits.row(sy), sx, bits.palette());

        match self.alpha_map {
            None => px,
            Some((am, ox, oy)) => {
                let (ax, ay) = (sx as i64 - ox, sy as i64 - oy);
                let alpha = if ax < 0 || ay < 0 || ax >= i64::from(am.width()) || ay >= i64::from(am.height()) {
                    0
                } else {
                    P::fetch_pixel(am.codec(), am.row(ay as usize), ax as usize, am.palette()).alpha()
                };
                let [_, r, g, b] = px.unpack();
                P::pack([alpha, r.min(alpha), g.min(alpha), b.min(alpha)])
            }
        }
    }

    fn bilinear<P: Sample>(&self, fx: i64, fy: i64) -> P {
        let (fx, fy) = (fx - 0x8000, fy - 0x8000);
        let (x1, y1) = (fx >> 16, fy >> 16);
        let dx = ((fx >> 8) & 0xff) as u64;
        let dy = ((fy >> 8) & 0xff) as u64;

        let tl: P = self.tap(x1, y1);
        let tr: P = self.tap(x1 + 1, y1);
        let bl: P = self.tap(x1, y1 + 1);
        let br: P = self.tap(x1 + 1, y1 + 1);

        let (tl, tr, bl, br) = (tl.unpack(), tr.unpack(), bl.unpack(), br.unpack());
        P::pack(std::array::from_fn(|c| {
            let top = u64::from(tl[c]) * (256 - dx) + u64::from(tr[c]) * dx;
            let bottom = u64::from(bl[c]) * (256 - dx) + u64::from(br[c]) * dx;
            ((top * (256 - dy) + bottom * dy + 0x8000) >> 16) as u32
        }))
    }

    fn convolution<P: Sample>(&self, fx: i64, fy: i64) -> P {
        let [w, h, kernel @ ..] = self.params else {
            return P::default();
        };
        let (w, h) = (i64::from(w >> 16), i64::from(h >> 16));
        let x_off = ((w - 1) << 16) >> 1;
        let y_off = ((h - 1) << 16) >> 1;
        let x1 = (fx - 1 - x_off) >> 16;
        let y1 = (fy - 1 - y_off) >> 16;

        let mut sum = [0i64; 4];
        for j in 0..h {
            for i in 0..w {
                let f = i64::from(kernel[(j * w + i) as usize]);
                if f == 0 {
                    continue;
                }
                let px: P = self.tap(x1 + i, y1 + j);
                for (s, c) in sum.iter_mut().zip(px.unpack()) {
                    *s += i64::from(c) * f;
                }
            }
        }

        let max = i64::from(P::MAX);
        let [a, r, g, b] = sum.map(|s| ((s + 0x8000) >> 16).clamp(0, max) as u32);
        P::pack([a, r.min(a), g.min(a), b.min(a)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Format;
    use crate::image::Image;
    use crate::region::IntRect;
    use crate::util::FIXED_ONE;

    fn image_4x1(pixels: [u32; 4]) -> Image {
        Image::bits_with_data(Format::A8R8G8B8, 4, 1, pixels.to_vec(), 4).unwrap()
    }

    fn scanline(image: &Image, x: i32, y: i32, len: usize) -> Vec<u32> {
        let mut out = vec![0u32; len];
        image.get_scanline(x, y, &mut out, None, false);
        out
    }

    #[test]
    fn repeat_coordinates() {
        assert_eq!(repeat_coord(Repeat::None, -1, 4), None);
        assert_eq!(repeat_coord(Repeat::Normal, -1, 4), Some(3));
        assert_eq!(repeat_coord(Repeat::Pad, 9, 4), Some(3));
        assert_eq!(repeat_coord(Repeat::Reflect, 4, 4), Some(3));
        assert_eq!(repeat_coord(Repeat::Reflect, -1, 4), Some(0));
        assert_eq!(repeat_coord(Repeat::Reflect, 9, 4), Some(1));
    }

    #[test]
    fn untransformed_repeat_modes() {
        let mut image = image_4x1([0xff00_0001, 0xff00_0002, 0xff00_0003, 0xff00_0004]);
        assert_eq!(scanline(&image, -1, 0, 6), [0, 0xff00_0001, 0xff00_0002, 0xff00_0003, 0xff00_0004, 0]);
        assert_eq!(scanline(&image, 0, 1, 2), [0, 0]);

        image.set_repeat(Repeat::Normal);
        assert_eq!(scanline(&image, 3, 5, 3), [0xff00_0004, 0xff00_0001, 0xff00_0002]);

        image.set_repeat(Repeat::Pad);
        assert_eq!(scanline(&image, -2, 0, 3), [0xff00_0001; 3]);
    }

    #[test]
    fn nearest_scale() {
        let mut image = image_4x1([0xff00_0001, 0xff00_0002, 0xff00_0003, 0xff00_0004]);
        image.set_transform(Some(Affine::scale_non_uniform(0.5, 1.0)));
        assert_eq!(
            scanline(&image, 0, 0, 8),
            [
                0xff00_0001,
                0xff00_0001,
                0xff00_0002,
                0xff00_0002,
                0xff00_0003,
                0xff00_0003,
                0xff00_0004,
                0xff00_0004
            ]
        );
    }

    #[test]
    fn bilinear_midpoint() {
        let mut image = image_4x1([0xff00_0000, 0xffff_ffff, 0, 0]);
        image.set_repeat(Repeat::Pad);
        image.set_filter(Filter::Bilinear, &[]).unwrap();
        image.set_transform(Some(Affine::translate((0.5, 0.0))));
        assert_eq!(scanline(&image, 0, 0, 1), [0xff80_8080]);
    }

    #[test]
    fn identity_convolution_is_a_copy() {
        let mut image = image_4x1([0xff10_2030, 0x8040_2010, 0, 0xffff_ffff]);
        let mut kernel = vec![3 << 16, 3 << 16];
        kernel.extend([0, 0, 0, 0, FIXED_ONE, 0, 0, 0, 0]);
        image.set_filter(Filter::Convolution, &kernel).unwrap();
        assert_eq!(
            scanline(&image, 0, 0, 4),
            [0xff10_2030, 0x8040_2010, 0, 0xffff_ffff]
        );
    }

    #[test]
    fn alpha_map_replaces_alpha() {
        let mut image = image_4x1([0xffff_ffff; 4]);
        let alpha = Image::bits_with_data(Format::A8, 4, 1, vec![0x00ff_8040], 1).unwrap();
        image.set_alpha_map(Some(&alpha), 1, 0).unwrap();

        let bytes = 0x00ff_8040u32.to_ne_bytes();
        let expected: Vec<u32> = [0u8, bytes[0], bytes[1], bytes[2]]
            .iter()
            .enumerate()
            .map(|(i, &a)| {
                let a = if i == 0 { 0 } else { u32::from(a) };
                (a << 24) | (a << 16) | (a << 8) | a
            })
            .collect();
        assert_eq!(scanline(&image, 0, 0, 4), expected);
    }

    #[test]
    fn destination_reads_skip_transform_but_keep_alpha_map() {
        let mut image = image_4x1([0xff10_2030, 0xff40_4040, 0xff00_0000, 0xffff_ffff]);
        image.set_transform(Some(Affine::translate((2.0, 0.0))));
        let alpha = Image::bits_with_data(Format::A8, 2, 1, vec![0x0000_20ff], 1).unwrap();
        image.set_alpha_map(Some(&alpha), 1, 0).unwrap();

        let mut out = vec![0u32; 5];
        image.fetch_dest(0, 0, &mut out);
        let [a1, a2, ..] = 0x0000_20ffu32.to_ne_bytes();
        let (a1, a2) = (u32::from(a1), u32::from(a2));
        let clamp = |px: u32, a: u32| {
            let c = |shift: u32| ((px >> shift) & 0xff).min(a) << shift;
            (a << 24) | c(16) | c(8) | c(0)
        };
        assert_eq!(out, [0, clamp(0xff40_4040, a1), clamp(0xff00_0000, a2), 0, 0]);
    }

    #[test]
    fn transformed_sources_respect_clip() {
        let mut image = image_4x1([0xff00_00ff; 4]);
        image.set_clip_region(Some(&Region::from_rect(IntRect::new(0, 0, 2, 1))));
        image.set_transform(Some(Affine::translate((1.0, 0.0))));
        assert_eq!(scanline(&image, 0, 0, 3), [0xff00_00ff, 0, 0]);
    }
}
