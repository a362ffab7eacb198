// Copyright 2024 the Piet Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sets of non-overlapping integer rectangles, used for clipping.

/// A half-open integer box `[x0, x1) x [y0, y1)`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct IntRect {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl IntRect {
    pub const fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// A box from an origin and a size. The far edges saturate instead of overflowing.
    pub fn from_origin_size(x: i32, y: i32, width: u32, height: u32) -> Self {
        let clamp = |v: i64| v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;
        Self {
            x0: x,
            y0: y,
            x1: clamp(i64::from(x) + i64::from(width)),
            y1: clamp(i64::from(y) + i64::from(height)),
        }
    }

    pub fn width(&self) -> i32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> i32 {
        self.y1 - self.y0
    }

    pub fn is_empty(&self) -> bool {
        self.x0 >= self.x1 || self.y0 >= self.y1
    }

    pub fn intersect(&self, other: &IntRect) -> IntRect {
        IntRect {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }

    fn translate(&self, dx: i32, dy: i32) -> IntRect {
        IntRect {
            x0: self.x0.saturating_add(dx),
            y0: self.y0.saturating_add(dy),
            x1: self.x1.saturating_add(dx),
            y1: self.y1.saturating_add(dy),
        }
    }

    /// The parts of `self` not covered by `other`, as up to four boxes.
    fn subtract(&self, other: &IntRect, out: &mut Vec<IntRect>) {
        let overlap = self.intersect(other);
        if overlap.is_empty() {
            out.push(*self);
            return;
        }

        let pieces = [
            IntRect::new(self.x0, self.y0, self.x1, overlap.y0),
            IntRect::new(self.x0, overlap.y1, self.x1, self.y1),
            IntRect::new(self.x0, overlap.y0, overlap.x0, overlap.y1),
            IntRect::new(overlap.x1, overlap.y0, self.x1, overlap.y1),
        ];
        out.extend(pieces.into_iter().filter(|r| !r.is_empty()));
    }
}

/// A set of pixels described by disjoint, non-empty boxes.
///
/// Boxes are kept sorted by their top-left corner, so iteration order is stable.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Region {
    rects: Vec<IntRect>,
}

impl Region {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rect(rect: IntRect) -> Self {
        let mut region = Self::new();
        if !rect.is_empty() {
            region.rects.push(rect);
        }
        region
    }

    pub fn from_rects(rects: &[IntRect]) -> Self {
        let mut region = Self::new();
        for rect in rects {
            region.union_rect(*rect);
        }
        region
    }

    pub fn rects(&self) -> &[IntRect] {
        &self.rects
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// The bounding box of the region, empty if the region is.
    pub fn extents(&self) -> IntRect {
        let mut iter = self.rects.iter();
        let Some(first) = iter.next() else {
            return IntRect::default();
        };

        iter.fold(*first, |acc, r| IntRect {
            x0: acc.x0.min(r.x0),
            y0: acc.y0.min(r.y0),
            x1: acc.x1.max(r.x1),
            y1: acc.y1.max(r.y1),
        })
    }

    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        self.rects.iter().any(|r| r.contains(x, y))
    }

    /// Add `rect` to the region.
    pub fn union_rect(&mut self, rect: IntRect) {
        if rect.is_empty() {
            return;
        }

        let mut remaining = vec![rect];
        let mut scratch = Vec::new();
        for existing in &self.rects {
            scratch.clear();
            for piece in &remaining {
                piece.subtract(existing, &mut scratch);
            }
            std::mem::swap(&mut remaining, &mut scratch);
            if remaining.is_empty() {
                return;
            }
        }

        self.rects.extend(remaining);
        self.sort();
    }

    pub fn union(&self, other: &Region) -> Region {
        let mut result = self.clone();
        for rect in &other.rects {
            result.union_rect(*rect);
        }
        result
    }

    pub fn intersect(&self, other: &Region) -> Region {
        let mut rects = Vec::new();
        for a in &self.rects {
            for b in &other.rects {
                let r = a.intersect(b);
                if !r.is_empty() {
                    rects.push(r);
                }
            }
        }

        let mut region = Region { rects };
        region.sort();
        region
    }

    pub fn intersect_rect(&self, rect: IntRect) -> Region {
        self.intersect(&Region::from_rect(rect))
    }

    pub fn translate(&mut self, dx: i32, dy: i32) {
        for rect in &mut self.rects {
            *rect = rect.translate(dx, dy);
        }
        self.rects.retain(|r| !r.is_empty());
    }

    fn sort(&mut self) {
        self.rects.sort_by_key(|r| (r.y0, r.x0));
    }
}

impl From<IntRect> for Region {
    fn from(rect: IntRect) -> Self {
        Region::from_rect(rect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area(region: &Region) -> i64 {
        region
            .rects()
            .iter()
            .map(|r| i64::from(r.width()) * i64::from(r.height()))
            .sum()
    }

    #[test]
    fn union_of_overlapping_rects_is_disjoint() {
        let mut region = Region::new();
        region.union_rect(IntRect::new(0, 0, 10, 10));
        region.union_rect(IntRect::new(5, 5, 15, 15));

        assert_eq!(area(&region), 175);
        assert_eq!(region.extents(), IntRect::new(0, 0, 15, 15));
        for (i, a) in region.rects().iter().enumerate() {
            for b in &region.rects()[i + 1..] {
                assert!(a.intersect(b).is_empty());
            }
        }
    }

    #[test]
    fn union_of_contained_rect_is_noop() {
        let mut region = Region::from_rect(IntRect::new(0, 0, 10, 10));
        region.union_rect(IntRect::new(2, 2, 4, 4));
        assert_eq!(region.rects(), &[IntRect::new(0, 0, 10, 10)]);
    }

    #[test]
    fn intersect_and_translate() {
        let a = Region::from_rects(&[IntRect::new(0, 0, 4, 4), IntRect::new(8, 0, 12, 4)]);
        let b = Region::from_rect(IntRect::new(2, 1, 10, 3));
        let mut c = a.intersect(&b);

        assert_eq!(
            c.rects(),
            &[IntRect::new(2, 1, 4, 3), IntRect::new(8, 1, 10, 3)]
        );
        assert!(c.contains_point(3, 2));
        assert!(!c.contains_point(5, 2));

        c.translate(-2, -1);
        assert_eq!(c.extents(), IntRect::new(0, 0, 8, 2));
    }

    #[test]
    fn empty_regions() {
        assert!(Region::from_rect(IntRect::new(3, 3, 3, 9)).is_empty());
        assert!(Region::new().extents().is_empty());
        let disjoint = Region::from_rect(IntRect::new(0, 0, 1, 1))
            .intersect_rect(IntRect::new(1, 1, 2, 2));
        assert!(disjoint.is_empty());
    }
}
