// Copyright 2024 the Piet Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The generic scanline compositing loop.
//!
//! Every request can be served here: each row of the composite region is fetched from
//! the source, mask and destination in canonical form, blended with the combiner for
//! the operator, and stored back.

use crate::combine::{CombinerTable, Combiners};
use crate::image::{Image, ImageClass, Sample};
use crate::operator::Operator;
use crate::region::{IntRect, Region};

/// The operands and coordinates of one composite request, or of one box of it.
#[derive(Copy, Clone, Debug)]
pub struct CompositeInfo<'a> {
    pub op: Operator,
    pub src: &'a Image,
    pub mask: Option<&'a Image>,
    pub src_x: i32,
    pub src_y: i32,
    pub mask_x: i32,
    pub mask_y: i32,
    pub dest_x: i32,
    pub dest_y: i32,
    pub width: i32,
    pub height: i32,
}

impl CompositeInfo<'_> {
    /// The same request restricted to `rect`, a box in destination space.
    pub(crate) fn restrict(&self, rect: &IntRect) -> Self {
        let (dx, dy) = (rect.x0.saturating_sub(self.dest_x), rect.y0.saturating_sub(self.dest_y));
        Self {
            src_x: self.src_x.saturating_add(dx),
            src_y: self.src_y.saturating_add(dy),
            mask_x: self.mask_x.saturating_add(dx),
            mask_y: self.mask_y.saturating_add(dy),
            dest_x: rect.x0,
            dest_y: rect.y0,
            width: rect.width(),
            height: rect.height(),
            ..*self
        }
    }

    pub(crate) fn dest_rect(&self) -> IntRect {
        IntRect::new(
            self.dest_x,
            self.dest_y,
            self.dest_x.saturating_add(self.width),
            self.dest_y.saturating_add(self.height),
        )
    }
}

/// The set of destination pixels a request touches: the requested rectangle, clipped
/// to the destination (and its alpha map), and to the client clips of untransformed
/// sources and masks.
pub fn compute_composite_region(info: &CompositeInfo<'_>, dest: &Image) -> Region {
    let mut region = dest.clip_region().intersect_rect(info.dest_rect());

    if let Some(am) = dest.alpha_map() {
        let mut full = Region::from_rect(IntRect::new(0, 0, am.image.width(), am.image.height()));
        full.translate(i32::from(am.x), i32::from(am.y));
        region = region.intersect(&full);
    }

    let operands = [
        Some((info.src, info.src_x, info.src_y)),
        info.mask.map(|m| (m, info.mask_x, info.mask_y)),
    ];
    for (image, x, y) in operands.into_iter().flatten() {
        if image.has_client_clip() && image.transform().is_none() {
            let mut clip = image.clip_region().clone();
            clip.translate(info.dest_x.saturating_sub(x), info.dest_y.saturating_sub(y));
            region = region.intersect(&clip);
        }
    }

    region
}

/// Run `f` once per box of `region`, with the request restricted to that box.
pub fn walk_composite_region<F>(info: &CompositeInfo<'_>, region: &Region, mut f: F)
where
    F: FnMut(&CompositeInfo<'_>),
{
    for rect in region.rects() {
        f(&info.restrict(rect));
    }
}

/// Composite one box with the portable loop, using `combiners` for the blend.
pub fn composite_general(combiners: &Combiners, info: &CompositeInfo<'_>, dest: &mut Image) {
    let component_alpha = info.mask.is_some_and(|m| m.component_alpha());
    let wide = info.src.is_wide() || info.mask.is_some_and(|m| m.is_wide()) || dest.is_wide();

    if wide {
        let table = if component_alpha {
            &combiners.combine_64_ca
        } else {
            &combiners.combine_64
        };
        composite_rows::<u64>(table, component_alpha, info, dest);
    } else {
        let table = if component_alpha {
            &combiners.combine_32_ca
        } else {
            &combiners.combine_32
        };
        composite_rows::<u32>(table, component_alpha, info, dest);
    }
}

fn composite_rows<P: Sample>(
    table: &CombinerTable<P>,
    component_alpha: bool,
    info: &CompositeInfo<'_>,
    dest: &mut Image,
) {
    if info.width <= 0 || info.height <= 0 {
        return;
    }

    let width = info.width as usize;
    let combine = table[info.op.index()];

    let mut src_buf = vec![P::default(); width];
    let mut mask_buf = vec![P::default(); if info.mask.is_some() { width } else { 0 }];
    let mut dest_buf = vec![P::default(); width];

    // Rows of a horizontal source are identical, so without a mask to skip pixels by
    // the first row can be reused.
    let reuse_src = info.mask.is_none() && info.src.classify() == ImageClass::Horizontal;

    for j in 0..info.height {
        let (mask_y, src_y, dest_y) = (
            info.mask_y.saturating_add(j),
            info.src_y.saturating_add(j),
            info.dest_y.saturating_add(j),
        );
        let mask = match info.mask {
            Some(mask) => {
                mask.get_scanline(info.mask_x, mask_y, &mut mask_buf, None, false);
                Some(&mask_buf[..])
            }
            None => None,
        };

        if !(reuse_src && j > 0) {
            info.src
                .get_scanline(info.src_x, src_y, &mut src_buf, mask, component_alpha);
        }

        if info.op.reads_dest() {
            dest.fetch_dest(info.dest_x, dest_y, &mut dest_buf);
        }

        combine(&mut dest_buf, &src_buf, mask);
        dest.store_scanline(info.dest_x, dest_y, &dest_buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Format;
    use crate::gradient::Color;

    fn info<'a>(op: Operator, src: &'a Image, mask: Option<&'a Image>, width: i32, height: i32) -> CompositeInfo<'a> {
        CompositeInfo {
            op,
            src,
            mask,
            src_x: 0,
            src_y: 0,
            mask_x: 0,
            mask_y: 0,
            dest_x: 0,
            dest_y: 0,
            width,
            height,
        }
    }

    #[test]
    fn region_is_clipped_to_dest() {
        let src = Image::solid(Color::from_argb32(0xffff_0000));
        let dest = Image::bits(Format::A8R8G8B8, 4, 4).unwrap();
        let mut request = info(Operator::Src, &src, None, 10, 10);
        request.dest_x = -2;
        request.dest_y = 1;

        let region = compute_composite_region(&request, &dest);
        assert_eq!(region.rects(), &[IntRect::new(0, 1, 4, 4)]);
    }

    #[test]
    fn untransformed_source_clip_limits_region() {
        let mut src = Image::bits(Format::A8R8G8B8, 8, 8).unwrap();
        src.set_clip_region(Some(&Region::from_rect(IntRect::new(0, 0, 2, 8))));
        let dest = Image::bits(Format::A8R8G8B8, 8, 8).unwrap();
        let mut request = info(Operator::Over, &src, None, 8, 8);
        request.dest_x = 3;
        request.width = 5;

        let region = compute_composite_region(&request, &dest);
        assert_eq!(region.extents(), IntRect::new(3, 0, 5, 8));
    }

    #[test]
    fn restrict_offsets_operands() {
        let src = Image::solid(Color::default());
        let mut request = info(Operator::Over, &src, None, 10, 10);
        request.src_x = 5;
        request.mask_y = 7;
        let sub = request.restrict(&IntRect::new(2, 3, 4, 6));
        assert_eq!((sub.src_x, sub.src_y), (7, 3));
        assert_eq!((sub.mask_x, sub.mask_y), (2, 10));
        assert_eq!((sub.width, sub.height), (2, 3));
    }

    #[test]
    fn general_loop_blends_rows() {
        let src = Image::solid(Color::from_argb32(0x8080_0000));
        let mut dest =
            Image::bits_with_data(Format::A8R8G8B8, 2, 2, vec![0xff00_ff00; 4], 2).unwrap();
        let request = info(Operator::Over, &src, None, 2, 1);

        composite_general(&Combiners::general(), &request, &mut dest);
        let data = dest.as_bits().unwrap().data();
        assert_eq!(data, &[0xff80_7f00, 0xff80_7f00, 0xff00_ff00, 0xff00_ff00]);
    }
}
