// Copyright 2024 the Piet Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Channel arithmetic shared by the codecs, combiners and fast paths.

use peniko::color::{PremulColor, Srgb};

/// A 16.16 fixed-point number.
pub type Fixed = i32;

pub const FIXED_ONE: Fixed = 1 << 16;
pub const FIXED_HALF: Fixed = 1 << 15;

/// Round to the nearest 16.16 value.
pub fn fixed_from_f64(val: f64) -> Fixed {
    (val * f64::from(FIXED_ONE)).round() as Fixed
}

pub fn fixed_to_f64(val: Fixed) -> f64 {
    f64::from(val) / f64::from(FIXED_ONE)
}

pub(crate) trait ColorExt {
    /// Convert to premultiplied 16-bit channels `[r, g, b, a]`.
    fn to_rgba16_premul(&self) -> [u16; 4];
}

impl ColorExt for PremulColor<Srgb> {
    fn to_rgba16_premul(&self) -> [u16; 4] {
        self.components
            .map(|c| (c.clamp(0.0, 1.0) * 65535.0 + 0.5) as u16)
    }
}

pub(crate) mod scalar {
    /// `a * b / 255`, rounded to nearest.
    #[inline(always)]
    pub(crate) const fn mul_un8(a: u32, b: u32) -> u32 {
        let t = a * b + 0x80;
        ((t >> 8) + t) >> 8
    }

    /// `a * b / 65535`, rounded to nearest.
    #[inline(always)]
    pub(crate) const fn mul_un16(a: u32, b: u32) -> u32 {
        let t = a * b + 0x8000;
        ((t >> 16) + t) >> 16
    }

    /// `a * 255 / b`, rounded to nearest and saturated. `b` must be non-zero.
    #[inline(always)]
    pub(crate) const fn div_un8(a: u32, b: u32) -> u32 {
        let q = (a * 0xff + b / 2) / b;
        if q > 0xff {
            0xff
        } else {
            q
        }
    }

    /// `a * 65535 / b`, rounded to nearest and saturated. `b` must be non-zero.
    #[inline(always)]
    pub(crate) const fn div_un16(a: u32, b: u32) -> u32 {
        let q = (a as u64 * 0xffff + b as u64 / 2) / b as u64;
        if q > 0xffff {
            0xffff
        } else {
            q as u32
        }
    }

    /// Multiply every channel of an a8r8g8b8 pixel by `a`.
    #[inline(always)]
    pub(crate) const fn mul_un8x4(x: u32, a: u32) -> u32 {
        (mul_un8(x >> 24, a) << 24)
            | (mul_un8((x >> 16) & 0xff, a) << 16)
            | (mul_un8((x >> 8) & 0xff, a) << 8)
            | mul_un8(x & 0xff, a)
    }

    /// `x * a + y` for every channel of two a8r8g8b8 pixels, saturating.
    #[inline(always)]
    pub(crate) const fn mul_un8x4_add_un8x4(x: u32, a: u32, y: u32) -> u32 {
        let mut out = 0;
        let mut shift = 0;
        while shift < 32 {
            let t = mul_un8((x >> shift) & 0xff, a) + ((y >> shift) & 0xff);
            out |= (if t > 0xff { 0xff } else { t }) << shift;
            shift += 8;
        }
        out
    }

    /// `Cs + Cb * (1 - αs)` on a8r8g8b8 pixels.
    #[inline(always)]
    pub(crate) const fn over(src: u32, dest: u32) -> u32 {
        mul_un8x4_add_un8x4(dest, 0xff - (src >> 24), src)
    }

    /// Expand r5g6b5 to x8r8g8b8 by replicating the top bits of each channel.
    #[inline(always)]
    pub(crate) const fn cvt_0565_to_0888(s: u32) -> u32 {
        (((s << 3) & 0xf8) | ((s >> 2) & 0x7))
            | (((s << 5) & 0xfc00) | ((s >> 1) & 0x300))
            | (((s << 8) & 0xf8_0000) | ((s << 3) & 0x7_0000))
    }

    /// Truncate x8r8g8b8 to r5g6b5.
    #[inline(always)]
    pub(crate) const fn cvt_8888_to_0565(s: u32) -> u32 {
        ((s >> 3) & 0x001f) | ((s >> 5) & 0x07e0) | ((s >> 8) & 0xf800)
    }
}

#[cfg(all(target_arch = "x86_64", feature = "simd"))]
pub(crate) mod avx2 {
    use std::arch::x86_64::*;

    /// Rounded `val / 255` on 16-bit lanes holding products of two bytes.
    ///
    /// SAFETY: The CPU needs to support the target feature `avx2`.
    #[target_feature(enable = "avx2")]
    pub(crate) unsafe fn div_255(val: __m256i) -> __m256i {
        let t = _mm256_add_epi16(val, _mm256_set1_epi16(0x80));
        _mm256_srli_epi16::<8>(_mm256_add_epi16(t, _mm256_srli_epi16::<8>(t)))
    }
}

#[cfg(all(target_arch = "aarch64", feature = "simd"))]
pub(crate) mod neon {
    use std::arch::aarch64::*;

    /// Rounded `val / 255` on 16-bit lanes holding products of two bytes.
    ///
    /// SAFETY: The CPU needs to support the target feature `neon`.
    #[inline]
    pub(crate) unsafe fn div_255(val: uint16x8_t) -> uint16x8_t {
        let t = vaddq_u16(val, vdupq_n_u16(0x80));
        vshrq_n_u16::<8>(vaddq_u16(t, vshrq_n_u16::<8>(t)))
    }
}
