// Copyright 2024 the Piet Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-operator blending of canonical scanlines.
//!
//! Every combiner computes, per channel, `min(max, s * Fa + d * Fb)` on premultiplied
//! values (or the separable blend mode equivalent), where `s` is the source already
//! multiplied by the mask. The unified variant uses the mask's alpha for all channels,
//! the component-alpha variant uses each mask channel on its own.

use crate::operator::Operator;
use crate::util::scalar::{div_un16, div_un8, mul_un16, mul_un8};
use std::fmt::Debug;

/// A canonical pixel: `a8r8g8b8` in a `u32` or `a16r16g16b16` in a `u64`.
pub trait Pixel: Copy + Default + PartialEq + Debug + Send + Sync + 'static {
    /// The maximum value of one channel.
    const MAX: u32;

    /// Channels as `[a, r, g, b]`.
    fn unpack(self) -> [u32; 4];
    fn pack(channels: [u32; 4]) -> Self;

    /// `a * b / MAX`, rounded.
    fn mul(a: u32, b: u32) -> u32;
    /// `a * MAX / b`, rounded and saturated.
    fn div(a: u32, b: u32) -> u32;

    #[inline(always)]
    fn alpha(self) -> u32 {
        self.unpack()[0]
    }

    /// `x / MAX` for a product of two channels, rounded. Negative input yields zero.
    #[inline(always)]
    fn div_one(x: i64) -> u32 {
        let max = i64::from(Self::MAX);
        (((x.max(0)) + max / 2) / max).min(max) as u32
    }
}

impl Pixel for u32 {
    const MAX: u32 = 0xff;

    #[inline(always)]
    fn unpack(self) -> [u32; 4] {
        [self >> 24, (self >> 16) & 0xff, (self >> 8) & 0xff, self & 0xff]
    }

    #[inline(always)]
    fn pack(c: [u32; 4]) -> Self {
        (c[0] << 24) | (c[1] << 16) | (c[2] << 8) | c[3]
    }

    #[inline(always)]
    fn mul(a: u32, b: u32) -> u32 {
        mul_un8(a, b)
    }

    #[inline(always)]
    fn div(a: u32, b: u32) -> u32 {
        div_un8(a, b)
    }
}

impl Pixel for u64 {
    const MAX: u32 = 0xffff;

    #[inline(always)]
    fn unpack(self) -> [u32; 4] {
        [
            (self >> 48) as u32,
            ((self >> 32) & 0xffff) as u32,
            ((self >> 16) & 0xffff) as u32,
            (self & 0xffff) as u32,
        ]
    }

    #[inline(always)]
    fn pack(c: [u32; 4]) -> Self {
        (u64::from(c[0]) << 48) | (u64::from(c[1]) << 32) | (u64::from(c[2]) << 16) | u64::from(c[3])
    }

    #[inline(always)]
    fn mul(a: u32, b: u32) -> u32 {
        mul_un16(a, b)
    }

    #[inline(always)]
    fn div(a: u32, b: u32) -> u32 {
        div_un16(a, b)
    }
}

/// Blend `src` (optionally masked) into `dest`. All slices have the same length.
pub type CombineFn<P> = fn(dest: &mut [P], src: &[P], mask: Option<&[P]>);

/// One combiner per operator, indexed by [`Operator::index`].
pub type CombinerTable<P> = [CombineFn<P>; Operator::COUNT];

/// The four tables every backend carries.
#[derive(Clone, Copy)]
pub struct Combiners {
    pub combine_32: CombinerTable<u32>,
    pub combine_32_ca: CombinerTable<u32>,
    pub combine_64: CombinerTable<u64>,
    pub combine_64_ca: CombinerTable<u64>,
}

impl Combiners {
    /// The portable combiners for every operator.
    pub fn general() -> Self {
        Self {
            combine_32: unified_table(),
            combine_32_ca: component_table(),
            combine_64: unified_table(),
            combine_64_ca: component_table(),
        }
    }
}

impl Debug for Combiners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Combiners").finish_non_exhaustive()
    }
}

/// Multiply a source pixel by the alpha of its mask pixel.
#[inline(always)]
pub(crate) fn mask_unified<P: Pixel>(s: P, m: Option<P>) -> P {
    match m {
        None => s,
        Some(m) => {
            let ma = m.alpha();
            if ma == 0 {
                P::default()
            } else if ma == P::MAX {
                s
            } else {
                P::pack(s.unpack().map(|c| P::mul(c, ma)))
            }
        }
    }
}

#[inline(always)]
fn combine_unified<P: Pixel, F>(dest: &mut [P], src: &[P], mask: Option<&[P]>, f: F)
where
    F: Fn(u32, u32, u32, u32, usize) -> u32,
{
    for (i, d) in dest.iter_mut().enumerate() {
        let s = mask_unified(src[i], mask.map(|m| m[i])).unpack();
        let dc = d.unpack();
        let (sa, da) = (s[0], dc[0]);
        *d = P::pack(std::array::from_fn(|c| f(s[c], dc[c], sa, da, c)));
    }
}

/// Component alpha: the source is multiplied by each mask channel, and each channel
/// sees `mask_c * αs` as its source alpha.
#[inline(always)]
fn combine_component<P: Pixel, F>(dest: &mut [P], src: &[P], mask: Option<&[P]>, f: F)
where
    F: Fn(u32, u32, u32, u32, usize) -> u32,
{
    for (i, d) in dest.iter_mut().enumerate() {
        let s = src[i].unpack();
        let m = mask.map_or([P::MAX; 4], |m| m[i].unpack());
        let src_alpha = s[0];
        let s: [u32; 4] = std::array::from_fn(|c| P::mul(s[c], m[c]));
        let sa: [u32; 4] = std::array::from_fn(|c| P::mul(m[c], src_alpha));
        let dc = d.unpack();
        let da = dc[0];
        *d = P::pack(std::array::from_fn(|c| f(s[c], dc[c], sa[c], da, c)));
    }
}

#[inline(always)]
fn porter_duff<P: Pixel>(factors: impl Fn(u32, u32) -> (u32, u32)) -> impl Fn(u32, u32, u32, u32, usize) -> u32 {
    move |s, d, sa, da, _| {
        let (fa, fb) = factors(sa, da);
        (P::mul(s, fa) + P::mul(d, fb)).min(P::MAX)
    }
}

#[inline(always)]
fn separable<P: Pixel>(
    blend: impl Fn(i64, i64, i64, i64, i64) -> i64,
) -> impl Fn(u32, u32, u32, u32, usize) -> u32 {
    move |s, d, sa, da, c| {
        let base = P::mul(d, P::MAX - sa) + P::mul(s, P::MAX - da);
        let term = if c == 0 {
            P::div_one(i64::from(sa) * i64::from(da))
        } else {
            let (d, da, s, sa) = (i64::from(d), i64::from(da), i64::from(s), i64::from(sa));
            P::div_one(blend(d, da, s, sa, i64::from(P::MAX)).min(sa * da))
        };
        (base + term).min(P::MAX)
    }
}

// Porter-Duff coefficients `(Fa, Fb)` from the source and destination alpha.

fn clear<P: Pixel>(_: u32, _: u32) -> (u32, u32) {
    (0, 0)
}

fn src<P: Pixel>(_: u32, _: u32) -> (u32, u32) {
    (P::MAX, 0)
}

fn dst<P: Pixel>(_: u32, _: u32) -> (u32, u32) {
    (0, P::MAX)
}

fn over<P: Pixel>(sa: u32, _: u32) -> (u32, u32) {
    (P::MAX, P::MAX - sa)
}

fn over_reverse<P: Pixel>(_: u32, da: u32) -> (u32, u32) {
    (P::MAX - da, P::MAX)
}

fn in_<P: Pixel>(_: u32, da: u32) -> (u32, u32) {
    (da, 0)
}

fn in_reverse<P: Pixel>(sa: u32, _: u32) -> (u32, u32) {
    (0, sa)
}

fn out<P: Pixel>(_: u32, da: u32) -> (u32, u32) {
    (P::MAX - da, 0)
}

fn out_reverse<P: Pixel>(sa: u32, _: u32) -> (u32, u32) {
    (0, P::MAX - sa)
}

fn atop<P: Pixel>(sa: u32, da: u32) -> (u32, u32) {
    (da, P::MAX - sa)
}

fn atop_reverse<P: Pixel>(sa: u32, da: u32) -> (u32, u32) {
    (P::MAX - da, sa)
}

fn xor<P: Pixel>(sa: u32, da: u32) -> (u32, u32) {
    (P::MAX - da, P::MAX - sa)
}

fn add<P: Pixel>(_: u32, _: u32) -> (u32, u32) {
    (P::MAX, P::MAX)
}

fn saturate<P: Pixel>(sa: u32, da: u32) -> (u32, u32) {
    let room = P::MAX - da;
    if sa > room {
        (P::div(room, sa), P::MAX)
    } else {
        (P::MAX, P::MAX)
    }
}

// Coverage fractions for the disjoint and conjoint families. `a` is the alpha of the
// operand being scaled, `b` the alpha of the other one.

/// `min(1, (1 - b) / a)`
fn disjoint_out_part<P: Pixel>(a: u32, b: u32) -> u32 {
    let b = P::MAX - b;
    if b >= a {
        P::MAX
    } else {
        P::div(b, a)
    }
}

/// `max(1 - (1 - b) / a, 0)`
fn disjoint_in_part<P: Pixel>(a: u32, b: u32) -> u32 {
    let b = P::MAX - b;
    if b >= a {
        0
    } else {
        P::MAX - P::div(b, a)
    }
}

/// `max(1 - b / a, 0)`
fn conjoint_out_part<P: Pixel>(a: u32, b: u32) -> u32 {
    if b >= a {
        0
    } else {
        P::MAX - P::div(b, a)
    }
}

/// `min(1, b / a)`
fn conjoint_in_part<P: Pixel>(a: u32, b: u32) -> u32 {
    if b >= a {
        P::MAX
    } else {
        P::div(b, a)
    }
}

#[derive(Copy, Clone)]
enum Part {
    Zero,
    Out,
    In,
    All,
}

#[inline(always)]
fn part<P: Pixel>(part: Part, conjoint: bool, a: u32, b: u32) -> u32 {
    match (part, conjoint) {
        (Part::Zero, _) => 0,
        (Part::All, _) => P::MAX,
        (Part::Out, false) => disjoint_out_part::<P>(a, b),
        (Part::In, false) => disjoint_in_part::<P>(a, b),
        (Part::Out, true) => conjoint_out_part::<P>(a, b),
        (Part::In, true) => conjoint_in_part::<P>(a, b),
    }
}

#[inline(always)]
fn overlap_factors<P: Pixel>(
    a: Part,
    b: Part,
    conjoint: bool,
) -> impl Fn(u32, u32) -> (u32, u32) {
    move |sa, da| (part::<P>(a, conjoint, sa, da), part::<P>(b, conjoint, da, sa))
}

// Separable blend terms, scaled by `max * max`: `B(s, d) * αs * αd` on premultiplied
// inputs.

fn multiply(dc: i64, _: i64, sc: i64, _: i64, _: i64) -> i64 {
    sc * dc
}

fn screen(dc: i64, da: i64, sc: i64, sa: i64, _: i64) -> i64 {
    sc * da + dc * sa - sc * dc
}

fn overlay(dc: i64, da: i64, sc: i64, sa: i64, max: i64) -> i64 {
    hard_light(sc, sa, dc, da, max)
}

fn darken(dc: i64, da: i64, sc: i64, sa: i64, _: i64) -> i64 {
    (sc * da).min(dc * sa)
}

fn lighten(dc: i64, da: i64, sc: i64, sa: i64, _: i64) -> i64 {
    (sc * da).max(dc * sa)
}

fn color_dodge(dc: i64, da: i64, sc: i64, sa: i64, _: i64) -> i64 {
    if dc == 0 {
        0
    } else if sc >= sa || dc * sa >= da * (sa - sc) {
        sa * da
    } else {
        sa * sa * dc / (sa - sc)
    }
}

fn color_burn(dc: i64, da: i64, sc: i64, sa: i64, _: i64) -> i64 {
    if dc >= da {
        sa * da
    } else if sa * (da - dc) >= sc * da {
        0
    } else {
        sa * da - sa * sa * (da - dc) / sc
    }
}

fn hard_light(dc: i64, da: i64, sc: i64, sa: i64, _: i64) -> i64 {
    if 2 * sc < sa {
        2 * sc * dc
    } else {
        sa * da - 2 * (da - dc) * (sa - sc)
    }
}

fn soft_light(dc: i64, da: i64, sc: i64, sa: i64, max: i64) -> i64 {
    let m = max as f64;
    let (dc, da, sc, sa) = (dc as f64 / m, da as f64 / m, sc as f64 / m, sa as f64 / m);

    let rca = if 2.0 * sc < sa {
        if da == 0.0 {
            dc * sa
        } else {
            dc * sa - dc * (da - dc) * (sa - 2.0 * sc) / da
        }
    } else if da == 0.0 {
        0.0
    } else if 4.0 * dc <= da {
        dc * sa + (2.0 * sc - sa) * dc * ((16.0 * dc / da - 12.0) * dc / da + 3.0)
    } else {
        dc * sa + ((dc * da).sqrt() - dc) * (2.0 * sc - sa)
    };

    (rca * m * m).round() as i64
}

fn difference(dc: i64, da: i64, sc: i64, sa: i64, _: i64) -> i64 {
    (sc * da - dc * sa).abs()
}

fn exclusion(dc: i64, da: i64, sc: i64, sa: i64, _: i64) -> i64 {
    sc * da + dc * sa - 2 * sc * dc
}

macro_rules! combiners {
    (
        porter_duff: { $($pd_u:ident, $pd_ca:ident => $factors:expr;)* }
        separable: { $($sep_u:ident, $sep_ca:ident => $blend:ident;)* }
    ) => {
        $(
            pub(crate) fn $pd_u<P: Pixel>(dest: &mut [P], src: &[P], mask: Option<&[P]>) {
                combine_unified(dest, src, mask, porter_duff::<P>($factors));
            }

            pub(crate) fn $pd_ca<P: Pixel>(dest: &mut [P], src: &[P], mask: Option<&[P]>) {
                combine_component(dest, src, mask, porter_duff::<P>($factors));
            }
        )*

        $(
            pub(crate) fn $sep_u<P: Pixel>(dest: &mut [P], src: &[P], mask: Option<&[P]>) {
                combine_unified(dest, src, mask, separable::<P>($blend));
            }

            pub(crate) fn $sep_ca<P: Pixel>(dest: &mut [P], src: &[P], mask: Option<&[P]>) {
                combine_component(dest, src, mask, separable::<P>($blend));
            }
        )*
    };
}

combiners! {
    porter_duff: {
        clear_u, clear_ca => clear::<P>;
        src_u, src_ca => src::<P>;
        dst_u, dst_ca => dst::<P>;
        over_u, over_ca => over::<P>;
        over_reverse_u, over_reverse_ca => over_reverse::<P>;
        in_u, in_ca => in_::<P>;
        in_reverse_u, in_reverse_ca => in_reverse::<P>;
        out_u, out_ca => out::<P>;
        out_reverse_u, out_reverse_ca => out_reverse::<P>;
        atop_u, atop_ca => atop::<P>;
        atop_reverse_u, atop_reverse_ca => atop_reverse::<P>;
        xor_u, xor_ca => xor::<P>;
        add_u, add_ca => add::<P>;
        saturate_u, saturate_ca => saturate::<P>;

        disjoint_over_u, disjoint_over_ca => overlap_factors::<P>(Part::All, Part::Out, false);
        disjoint_over_reverse_u, disjoint_over_reverse_ca => overlap_factors::<P>(Part::Out, Part::All, false);
        disjoint_in_u, disjoint_in_ca => overlap_factors::<P>(Part::In, Part::Zero, false);
        disjoint_in_reverse_u, disjoint_in_reverse_ca => overlap_factors::<P>(Part::Zero, Part::In, false);
        disjoint_out_u, disjoint_out_ca => overlap_factors::<P>(Part::Out, Part::Zero, false);
        disjoint_out_reverse_u, disjoint_out_reverse_ca => overlap_factors::<P>(Part::Zero, Part::Out, false);
        disjoint_atop_u, disjoint_atop_ca => overlap_factors::<P>(Part::In, Part::Out, false);
        disjoint_atop_reverse_u, disjoint_atop_reverse_ca => overlap_factors::<P>(Part::Out, Part::In, false);
        disjoint_xor_u, disjoint_xor_ca => overlap_factors::<P>(Part::Out, Part::Out, false);

        conjoint_over_u, conjoint_over_ca => overlap_factors::<P>(Part::All, Part::Out, true);
        conjoint_over_reverse_u, conjoint_over_reverse_ca => overlap_factors::<P>(Part::Out, Part::All, true);
        conjoint_in_u, conjoint_in_ca => overlap_factors::<P>(Part::In, Part::Zero, true);
        conjoint_in_reverse_u, conjoint_in_reverse_ca => overlap_factors::<P>(Part::Zero, Part::In, true);
        conjoint_out_u, conjoint_out_ca => overlap_factors::<P>(Part::Out, Part::Zero, true);
        conjoint_out_reverse_u, conjoint_out_reverse_ca => overlap_factors::<P>(Part::Zero, Part::Out, true);
        conjoint_atop_u, conjoint_atop_ca => overlap_factors::<P>(Part::In, Part::Out, true);
        conjoint_atop_reverse_u, conjoint_atop_reverse_ca => overlap_factors::<P>(Part::Out, Part::In, true);
        conjoint_xor_u, conjoint_xor_ca => overlap_factors::<P>(Part::Out, Part::Out, true);
    }
    separable: {
        multiply_u, multiply_ca => multiply;
        screen_u, screen_ca => screen;
        overlay_u, overlay_ca => overlay;
        darken_u, darken_ca => darken;
        lighten_u, lighten_ca => lighten;
        color_dodge_u, color_dodge_ca => color_dodge;
        color_burn_u, color_burn_ca => color_burn;
        hard_light_u, hard_light_ca => hard_light;
        soft_light_u, soft_light_ca => soft_light;
        difference_u, difference_ca => difference;
        exclusion_u, exclusion_ca => exclusion;
    }
}

fn unified_entry<P: Pixel>(op: Operator) -> CombineFn<P> {
    use Operator::*;

    match op {
        Clear | DisjointClear | ConjointClear => clear_u::<P>,
        Src | DisjointSrc | ConjointSrc => src_u::<P>,
        Dst | DisjointDst | ConjointDst => dst_u::<P>,
        Over => over_u::<P>,
        OverReverse => over_reverse_u::<P>,
        In => in_u::<P>,
        InReverse => in_reverse_u::<P>,
        Out => out_u::<P>,
        OutReverse => out_reverse_u::<P>,
        Atop => atop_u::<P>,
        AtopReverse => atop_reverse_u::<P>,
        Xor => xor_u::<P>,
        Add => add_u::<P>,
        Saturate => saturate_u::<P>,
        DisjointOver => disjoint_over_u::<P>,
        DisjointOverReverse => disjoint_over_reverse_u::<P>,
        DisjointIn => disjoint_in_u::<P>,
        DisjointInReverse => disjoint_in_reverse_u::<P>,
        DisjointOut => disjoint_out_u::<P>,
        DisjointOutReverse => disjoint_out_reverse_u::<P>,
        DisjointAtop => disjoint_atop_u::<P>,
        DisjointAtopReverse => disjoint_atop_reverse_u::<P>,
        DisjointXor => disjoint_xor_u::<P>,
        ConjointOver => conjoint_over_u::<P>,
        ConjointOverReverse => conjoint_over_reverse_u::<P>,
        ConjointIn => conjoint_in_u::<P>,
        ConjointInReverse => conjoint_in_reverse_u::<P>,
        ConjointOut => conjoint_out_u::<P>,
        ConjointOutReverse => conjoint_out_reverse_u::<P>,
        ConjointAtop => conjoint_atop_u::<P>,
        ConjointAtopReverse => conjoint_atop_reverse_u::<P>,
        ConjointXor => conjoint_xor_u::<P>,
        Multiply => multiply_u::<P>,
        Screen => screen_u::<P>,
        Overlay => overlay_u::<P>,
        Darken => darken_u::<P>,
        Lighten => lighten_u::<P>,
        ColorDodge => color_dodge_u::<P>,
        ColorBurn => color_burn_u::<P>,
        HardLight => hard_light_u::<P>,
        SoftLight => soft_light_u::<P>,
        Difference => difference_u::<P>,
        Exclusion => exclusion_u::<P>,
    }
}

fn component_entry<P: Pixel>(op: Operator) -> CombineFn<P> {
    use Operator::*;

    match op {
        Clear | DisjointClear | ConjointClear => clear_ca::<P>,
        Src | DisjointSrc | ConjointSrc => src_ca::<P>,
        Dst | DisjointDst | ConjointDst => dst_ca::<P>,
        Over => over_ca::<P>,
        OverReverse => over_reverse_ca::<P>,
        In => in_ca::<P>,
        InReverse => in_reverse_ca::<P>,
        Out => out_ca::<P>,
        OutReverse => out_reverse_ca::<P>,
        Atop => atop_ca::<P>,
        AtopReverse => atop_reverse_ca::<P>,
        Xor => xor_ca::<P>,
        Add => add_ca::<P>,
        Saturate => saturate_ca::<P>,
        DisjointOver => disjoint_over_ca::<P>,
        DisjointOverReverse => disjoint_over_reverse_ca::<P>,
        DisjointIn => disjoint_in_ca::<P>,
        DisjointInReverse => disjoint_in_reverse_ca::<P>,
        DisjointOut => disjoint_out_ca::<P>,
        DisjointOutReverse => disjoint_out_reverse_ca::<P>,
        DisjointAtop => disjoint_atop_ca::<P>,
        DisjointAtopReverse => disjoint_atop_reverse_ca::<P>,
        DisjointXor => disjoint_xor_ca::<P>,
        ConjointOver => conjoint_over_ca::<P>,
        ConjointOverReverse => conjoint_over_reverse_ca::<P>,
        ConjointIn => conjoint_in_ca::<P>,
        ConjointInReverse => conjoint_in_reverse_ca::<P>,
        ConjointOut => conjoint_out_ca::<P>,
        ConjointOutReverse => conjoint_out_reverse_ca::<P>,
        ConjointAtop => conjoint_atop_ca::<P>,
        ConjointAtopReverse => conjoint_atop_reverse_ca::<P>,
        ConjointXor => conjoint_xor_ca::<P>,
        Multiply => multiply_ca::<P>,
        Screen => screen_ca::<P>,
        Overlay => overlay_ca::<P>,
        Darken => darken_ca::<P>,
        Lighten => lighten_ca::<P>,
        ColorDodge => color_dodge_ca::<P>,
        ColorBurn => color_burn_ca::<P>,
        HardLight => hard_light_ca::<P>,
        SoftLight => soft_light_ca::<P>,
        Difference => difference_ca::<P>,
        Exclusion => exclusion_ca::<P>,
    }
}

pub fn unified_table<P: Pixel>() -> CombinerTable<P> {
    Operator::ALL.map(unified_entry::<P>)
}

pub fn component_table<P: Pixel>() -> CombinerTable<P> {
    Operator::ALL.map(component_entry::<P>)
}
