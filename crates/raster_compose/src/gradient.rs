// Copyright 2024 the Piet Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Gradient color stops, the incremental gradient walker and gradient geometry.

use crate::error::Error;
use crate::image::{ImageClass, Repeat};
use crate::util::ColorExt;
use once_cell::sync::OnceCell;
use peniko::color::{AlphaColor, PremulColor, Srgb};
use peniko::kurbo::{Affine, Point};
use std::f64::consts::TAU;
use std::sync::Arc;

/// One unit of gradient position in 16.16 fixed point.
const UNIT: i64 = 0x10000;

/// A premultiplied color with 16 bits per channel.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Color {
    pub red: u16,
    pub green: u16,
    pub blue: u16,
    pub alpha: u16,
}

impl Color {
    pub const fn new(red: u16, green: u16, blue: u16, alpha: u16) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    /// Build from a premultiplied `a8r8g8b8` pixel.
    pub fn from_argb32(argb: u32) -> Self {
        let ch = |shift: u32| ((argb >> shift) & 0xff) as u16 * 0x101;
        Self::new(ch(16), ch(8), ch(0), ch(24))
    }

    /// Truncate to a premultiplied `a8r8g8b8` pixel.
    pub fn to_argb32(self) -> u32 {
        (u32::from(self.alpha >> 8) << 24)
            | (u32::from(self.red >> 8) << 16)
            | (u32::from(self.green >> 8) << 8)
            | u32::from(self.blue >> 8)
    }

    pub fn to_argb64(self) -> u64 {
        (u64::from(self.alpha) << 48)
            | (u64::from(self.red) << 32)
            | (u64::from(self.green) << 16)
            | u64::from(self.blue)
    }

    pub(crate) fn is_premultiplied(&self) -> bool {
        self.red <= self.alpha && self.green <= self.alpha && self.blue <= self.alpha
    }

    pub(crate) fn clamped(self) -> Self {
        Self::new(
            self.red.min(self.alpha),
            self.green.min(self.alpha),
            self.blue.min(self.alpha),
            self.alpha,
        )
    }
}

impl From<PremulColor<Srgb>> for Color {
    fn from(color: PremulColor<Srgb>) -> Self {
        let [r, g, b, a] = color.to_rgba16_premul();
        Self::new(r, g, b, a)
    }
}

impl From<AlphaColor<Srgb>> for Color {
    fn from(color: AlphaColor<Srgb>) -> Self {
        color.premultiply().into()
    }
}

/// A gradient stop: a position in `[0, 1]` and a premultiplied color.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GradientStop {
    pub offset: f64,
    pub color: Color,
}

impl GradientStop {
    pub fn new(offset: f64, color: impl Into<Color>) -> Self {
        Self {
            offset,
            color: color.into(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Stop {
    /// Position in 16.16 fixed point.
    x: i64,
    color: Color,
}

impl Stop {
    fn ag(&self) -> u32 {
        (u32::from(self.color.alpha >> 8) << 16) | u32::from(self.color.green >> 8)
    }

    fn rb(&self) -> u32 {
        (u32::from(self.color.red >> 8) << 16) | u32::from(self.color.blue >> 8)
    }
}

/// The stop table shared by all gradient kinds.
#[derive(Clone, Debug)]
pub struct Gradient {
    stops: Arc<[Stop]>,
    lut: OnceCell<Arc<ColorLut>>,
}

impl Gradient {
    pub fn new(stops: &[GradientStop]) -> Result<Self, Error> {
        if stops.is_empty() {
            return Err(Error::EmptyGradient);
        }

        let mut converted = Vec::new();
        converted
            .try_reserve_exact(stops.len())
            .map_err(|_| Error::AllocationFailed)?;

        for stop in stops {
            let mut color = stop.color;
            if !color.is_premultiplied() {
                log::warn!("gradient stop color {color:?} is not premultiplied, clamping");
                color = color.clamped();
            }

            let offset = if stop.offset.is_nan() {
                0.0
            } else {
                stop.offset.clamp(0.0, 1.0)
            };

            converted.push(Stop {
                x: (offset * UNIT as f64).round() as i64,
                color,
            });
        }
        converted.sort_by_key(|s| s.x);

        Ok(Self {
            stops: converted.into(),
            lut: OnceCell::new(),
        })
    }

    pub fn stop_count(&self) -> usize {
        self.stops.len()
    }

    /// Drop derived state. Called whenever a property the lookup table depends on changes.
    pub(crate) fn invalidate(&mut self) {
        self.lut = OnceCell::new();
    }

    /// The quantized lookup table for `repeat`, built on first use.
    ///
    /// `None` when the table cannot be allocated; callers then walk the stops.
    pub(crate) fn lut(&self, repeat: Repeat) -> Option<&ColorLut> {
        self.lut
            .get_or_try_init(|| ColorLut::build(self, repeat).map(Arc::new))
            .map(|lut| &**lut)
            .map_err(|e| log::warn!("no gradient lookup table: {e}"))
            .ok()
    }

    pub fn walker(&self, repeat: Repeat) -> GradientWalker<'_> {
        GradientWalker::new(self, repeat)
    }
}

/// Map a position onto `[0, UNIT]` according to the spread rule.
#[inline]
fn fold(pos: i64, repeat: Repeat) -> i64 {
    match repeat {
        Repeat::None | Repeat::Pad => pos,
        Repeat::Normal => pos.rem_euclid(UNIT),
        Repeat::Reflect => {
            let t = pos.rem_euclid(2 * UNIT);
            if t > UNIT {
                2 * UNIT - t
            } else {
                t
            }
        }
    }
}

/// Incremental color lookup along a gradient.
///
/// The walker caches the pair of stops bracketing the last position, so walking a
/// row of pixels along the gradient axis only searches the stop table when a stop
/// boundary is crossed.
#[derive(Clone, Debug)]
pub struct GradientWalker<'a> {
    stops: &'a [Stop],
    repeat: Repeat,

    left_x: i64,
    right_x: i64,
    left_ag: u32,
    left_rb: u32,
    right_ag: u32,
    right_rb: u32,
    left_wide: Color,
    right_wide: Color,
    stepper: i64,

    need_reset: bool,
}

impl<'a> GradientWalker<'a> {
    pub fn new(gradient: &'a Gradient, repeat: Repeat) -> Self {
        Self {
            stops: &gradient.stops,
            repeat,
            left_x: 0,
            right_x: 0,
            left_ag: 0,
            left_rb: 0,
            right_ag: 0,
            right_rb: 0,
            left_wide: Color::default(),
            right_wide: Color::default(),
            stepper: 0,
            need_reset: true,
        }
    }

    /// Locate the stops bracketing `pos`, a 16.16 fixed-point gradient position.
    pub fn reset(&mut self, pos: i64) {
        let x = fold(pos, self.repeat);
        let stops = self.stops;
        let n = stops.iter().position(|s| x < s.x).unwrap_or(stops.len());

        let (left, right) = match self.repeat {
            Repeat::Normal => {
                let first = stops[0];
                let last = stops[stops.len() - 1];
                let left = if n == 0 {
                    Stop {
                        x: last.x - UNIT,
                        ..last
                    }
                } else {
                    stops[n - 1]
                };
                let right = if n == stops.len() {
                    Stop {
                        x: first.x + UNIT,
                        ..first
                    }
                } else {
                    stops[n]
                };
                (left, right)
            }
            Repeat::None | Repeat::Pad | Repeat::Reflect => {
                let first = stops[0];
                let last = stops[stops.len() - 1];
                let left = if n == 0 {
                    Stop {
                        x: i64::MIN / 2,
                        ..first
                    }
                } else {
                    stops[n - 1]
                };
                let right = if n == stops.len() {
                    Stop {
                        x: i64::MAX / 2,
                        ..last
                    }
                } else {
                    stops[n]
                };
                (left, right)
            }
        };

        self.left_x = left.x;
        self.right_x = right.x;
        self.left_ag = left.ag();
        self.left_rb = left.rb();
        self.right_ag = right.ag();
        self.right_rb = right.rb();
        self.left_wide = left.color;
        self.right_wide = right.color;

        let width = self.right_x - self.left_x;
        self.stepper = if width > 0 && width <= 2 * UNIT {
            ((1 << 24) + width / 2) / width
        } else {
            0
        };

        self.need_reset = false;
    }

    #[inline]
    fn prepare(&mut self, pos: i64) -> i64 {
        let x = fold(pos, self.repeat);
        if self.need_reset || x < self.left_x || x >= self.right_x {
            self.reset(pos);
        }
        x
    }

    /// The premultiplied `a8r8g8b8` color at `pos`.
    pub fn pixel(&mut self, pos: i64) -> u32 {
        let x = self.prepare(pos);

        let dist = (((x - self.left_x) * self.stepper) >> 16).clamp(0, 256) as u32;
        let idist = 256 - dist;

        let lerp = |l: u32, r: u32| ((l * idist + r * dist + 0x0080_0080) >> 8) & 0x00ff_00ff;
        let ag = lerp(self.left_ag, self.right_ag);
        let rb = lerp(self.left_rb, self.right_rb);

        (ag << 8) | rb
    }

    /// The premultiplied `a16r16g16b16` color at `pos`.
    pub fn pixel_wide(&mut self, pos: i64) -> u64 {
        let x = self.prepare(pos);

        let width = self.right_x - self.left_x;
        let dist = if self.stepper == 0 {
            0
        } else {
            (((x - self.left_x) << 16) / width).clamp(0, UNIT) as u64
        };
        let idist = UNIT as u64 - dist;

        let lerp = |l: u16, r: u16| (u64::from(l) * idist + u64::from(r) * dist + 0x8000) >> 16;
        let (l, r) = (self.left_wide, self.right_wide);

        (lerp(l.alpha, r.alpha) << 48)
            | (lerp(l.red, r.red) << 32)
            | (lerp(l.green, r.green) << 16)
            | lerp(l.blue, r.blue)
    }
}

const LUT_SIZE: i64 = 256;

/// Colors sampled at evenly spaced positions over one gradient unit.
#[derive(Clone, Debug)]
pub struct ColorLut {
    repeat: Repeat,
    entries: Box<[u32]>,
}

impl ColorLut {
    fn build(gradient: &Gradient, repeat: Repeat) -> Result<Self, Error> {
        log::trace!("building gradient lookup table for {repeat:?}");

        let mut entries = reserve_entries(LUT_SIZE as usize)?;
        let mut walker = gradient.walker(repeat);
        entries.extend(
            (0..LUT_SIZE).map(|i| walker.pixel((i * UNIT + (LUT_SIZE - 1) / 2) / (LUT_SIZE - 1))),
        );

        Ok(Self {
            repeat,
            entries: entries.into_boxed_slice(),
        })
    }

    pub fn lookup(&self, pos: i64) -> u32 {
        let x = fold(pos, self.repeat).clamp(0, UNIT);
        self.entries[((x * (LUT_SIZE - 1) + UNIT / 2) >> 16) as usize]
    }
}

fn reserve_entries(len: usize) -> Result<Vec<u32>, Error> {
    let mut entries = Vec::new();
    entries
        .try_reserve_exact(len)
        .map_err(|_| Error::AllocationFailed)?;
    Ok(entries)
}

/// The geometry mapping a point to a gradient position.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum GradientKind {
    /// Position is the projection onto the axis from `p1` (0) to `p2` (1).
    Linear { p1: Point, p2: Point },
    /// Position `t` of the circle interpolated between the two circles that passes
    /// through the point.
    Radial {
        c1: Point,
        r1: f64,
        c2: Point,
        r2: f64,
    },
    /// Position is the angle around `center`, starting at `angle` radians, in turns.
    Conical { center: Point, angle: f64 },
}

impl GradientKind {
    /// The gradient position of a point in gradient space, or `None` when the point
    /// is not covered.
    pub(crate) fn position(&self, p: Point, repeat: Repeat) -> Option<f64> {
        match *self {
            GradientKind::Linear { p1, p2 } => {
                let v = p2 - p1;
                let l2 = v.hypot2();
                if l2 == 0.0 {
                    return Some(0.0);
                }
                Some((p - p1).dot(v) / l2)
            }
            GradientKind::Radial { c1, r1, c2, r2 } => radial_position(p, c1, r1, c2, r2, repeat),
            GradientKind::Conical { center, angle } => {
                let d = p - center;
                Some(((d.y.atan2(d.x) - angle) / TAU).rem_euclid(1.0))
            }
        }
    }

    pub(crate) fn classify(&self, transform: Option<Affine>) -> ImageClass {
        let GradientKind::Linear { p1, p2 } = *self else {
            return ImageClass::Unknown;
        };

        let v = p2 - p1;
        let [a, b, c, d, _, _] = transform.unwrap_or(Affine::IDENTITY).as_coeffs();
        let independent = |dx: f64, dy: f64| (dx == 0.0 || v.x == 0.0) && (dy == 0.0 || v.y == 0.0);

        if independent(c, d) {
            ImageClass::Horizontal
        } else if independent(a, b) {
            ImageClass::Vertical
        } else {
            ImageClass::Unknown
        }
    }
}

/// Solve `a t² - 2 b t + c = 0` for the circle `(c1 + t (c2 - c1), r1 + t (r2 - r1))`
/// through `p`, taking the larger root whose radius is non-negative.
fn radial_position(p: Point, c1: Point, r1: f64, c2: Point, r2: f64, repeat: Repeat) -> Option<f64> {
    let cd = c2 - c1;
    let dr = r2 - r1;
    let pd = p - c1;

    let a = cd.hypot2() - dr * dr;
    let b = pd.dot(cd) + r1 * dr;
    let c = pd.hypot2() - r1 * r1;

    let accept = |t: f64| {
        if repeat == Repeat::None {
            (0.0..=1.0).contains(&t)
        } else {
            r1 + t * dr >= 0.0
        }
    };

    if a.abs() < 1e-12 {
        if b == 0.0 {
            return None;
        }
        let t = c / (2.0 * b);
        return accept(t).then_some(t);
    }

    let discr = b * b - a * c;
    if discr < 0.0 {
        return None;
    }

    let sqrt = discr.sqrt();
    let t1 = (b + sqrt) / a;
    let t2 = (b - sqrt) / a;
    let (hi, lo) = if t1 >= t2 { (t1, t2) } else { (t2, t1) };

    if accept(hi) {
        Some(hi)
    } else if accept(lo) {
        Some(lo)
    } else {
        None
    }
}

/// Convert a gradient position to 16.16 fixed point, saturating far outside the range.
#[inline]
pub(crate) fn to_fixed(t: f64) -> i64 {
    if t.is_nan() {
        return 0;
    }
    let limit = (1i64 << 40) as f64;
    (t * UNIT as f64).floor().clamp(-limit, limit) as i64
}
