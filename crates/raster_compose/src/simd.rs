// Copyright 2024 the Piet Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! SIMD backends.
//!
//! They replace the 8-bit unified `over` and `add` combiners for rows without a mask.
//! Rounding follows `mul_un8` exactly, so results are identical to the scalar code.
//! Masked rows and remainders go through the scalar combiners.

#[cfg(all(target_arch = "x86_64", feature = "simd"))]
pub(crate) mod avx2 {
    use crate::combine;
    use crate::implementation::Implementation;
    use crate::operator::Operator;
    use crate::util::avx2::div_255;
    use std::arch::x86_64::*;

    /// Pixels per 256-bit register.
    const LANES: usize = 8;

    /// Must only be called when the CPU supports `avx2`.
    pub(crate) fn implementation(delegate: &Implementation) -> Implementation {
        let mut imp = Implementation::new("avx2", delegate);
        imp.combiners.combine_32[Operator::Over.index()] = over;
        imp.combiners.combine_32[Operator::Add.index()] = add;
        imp
    }

    fn over(dest: &mut [u32], src: &[u32], mask: Option<&[u32]>) {
        if mask.is_some() {
            return combine::over_u::<u32>(dest, src, mask);
        }
        let head = dest.len().min(src.len()) / LANES * LANES;
        // SAFETY: This combiner is only installed when the CPU supports `avx2`.
        unsafe {
            over_rows(&mut dest[..head], &src[..head]);
        }
        combine::over_u::<u32>(&mut dest[head..], &src[head..], None);
    }

    fn add(dest: &mut [u32], src: &[u32], mask: Option<&[u32]>) {
        if mask.is_some() {
            return combine::add_u::<u32>(dest, src, mask);
        }
        let head = dest.len().min(src.len()) / LANES * LANES;
        // SAFETY: This combiner is only installed when the CPU supports `avx2`.
        unsafe {
            add_rows(&mut dest[..head], &src[..head]);
        }
        combine::add_u::<u32>(&mut dest[head..], &src[head..], None);
    }

    /// SAFETY: The CPU needs to support the target feature `avx2`.
    #[target_feature(enable = "avx2")]
    unsafe fn over_rows(dest: &mut [u32], src: &[u32]) {
        let zero = _mm256_setzero_si256();
        let max = _mm256_set1_epi16(0xff);

        for (d, s) in dest.chunks_exact_mut(LANES).zip(src.chunks_exact(LANES)) {
            let s_vals = _mm256_loadu_si256(s.as_ptr() as *const __m256i);
            let d_vals = _mm256_loadu_si256(d.as_ptr() as *const __m256i);

            let s_lo = _mm256_unpacklo_epi8(s_vals, zero);
            let s_hi = _mm256_unpackhi_epi8(s_vals, zero);
            let d_lo = _mm256_unpacklo_epi8(d_vals, zero);
            let d_hi = _mm256_unpackhi_epi8(d_vals, zero);

            // Alpha is the fourth 16-bit lane of each pixel.
            let inv_lo = _mm256_sub_epi16(
                max,
                _mm256_shufflehi_epi16::<0xff>(_mm256_shufflelo_epi16::<0xff>(s_lo)),
            );
            let inv_hi = _mm256_sub_epi16(
                max,
                _mm256_shufflehi_epi16::<0xff>(_mm256_shufflelo_epi16::<0xff>(s_hi)),
            );

            let added_lo = _mm256_add_epi16(s_lo, div_255(_mm256_mullo_epi16(d_lo, inv_lo)));
            let added_hi = _mm256_add_epi16(s_hi, div_255(_mm256_mullo_epi16(d_hi, inv_hi)));
            let packed = _mm256_packus_epi16(added_lo, added_hi);
            _mm256_storeu_si256(d.as_mut_ptr() as *mut __m256i, packed);
        }
    }

    /// SAFETY: The CPU needs to support the target feature `avx2`.
    #[target_feature(enable = "avx2")]
    unsafe fn add_rows(dest: &mut [u32], src: &[u32]) {
        for (d, s) in dest.chunks_exact_mut(LANES).zip(src.chunks_exact(LANES)) {
            let s_vals = _mm256_loadu_si256(s.as_ptr() as *const __m256i);
            let d_vals = _mm256_loadu_si256(d.as_ptr() as *const __m256i);
            _mm256_storeu_si256(d.as_mut_ptr() as *mut __m256i, _mm256_adds_epu8(s_vals, d_vals));
        }
    }
}

#[cfg(all(target_arch = "aarch64", feature = "simd"))]
pub(crate) mod neon {
    use crate::combine;
    use crate::implementation::Implementation;
    use crate::operator::Operator;
    use crate::util::neon::div_255;
    use std::arch::aarch64::*;

    /// Pixels per 128-bit register.
    const LANES: usize = 4;

    /// Byte index of each pixel's alpha, repeated over its four channels.
    const ALPHA_INDEX: [u8; 16] = if cfg!(target_endian = "big") {
        [0, 0, 0, 0, 4, 4, 4, 4, 8, 8, 8, 8, 12, 12, 12, 12]
    } else {
        [3, 3, 3, 3, 7, 7, 7, 7, 11, 11, 11, 11, 15, 15, 15, 15]
    };

    pub(crate) fn implementation(delegate: &Implementation) -> Implementation {
        let mut imp = Implementation::new("neon", delegate);
        imp.combiners.combine_32[Operator::Over.index()] = over;
        imp.combiners.combine_32[Operator::Add.index()] = add;
        imp
    }

    fn over(dest: &mut [u32], src: &[u32], mask: Option<&[u32]>) {
        if mask.is_some() {
            return combine::over_u::<u32>(dest, src, mask);
        }
        let head = dest.len().min(src.len()) / LANES * LANES;
        // SAFETY: This combiner is only installed when the CPU supports `neon`.
        unsafe {
            over_rows(&mut dest[..head], &src[..head]);
        }
        combine::over_u::<u32>(&mut dest[head..], &src[head..], None);
    }

    fn add(dest: &mut [u32], src: &[u32], mask: Option<&[u32]>) {
        if mask.is_some() {
            return combine::add_u::<u32>(dest, src, mask);
        }
        let head = dest.len().min(src.len()) / LANES * LANES;
        // SAFETY: This combiner is only installed when the CPU supports `neon`.
        unsafe {
            add_rows(&mut dest[..head], &src[..head]);
        }
        combine::add_u::<u32>(&mut dest[head..], &src[head..], None);
    }

    /// SAFETY: The CPU needs to support the target feature `neon`.
    #[target_feature(enable = "neon")]
    unsafe fn over_rows(dest: &mut [u32], src: &[u32]) {
        let alpha_index = vld1q_u8(ALPHA_INDEX.as_ptr());

        for (d, s) in dest.chunks_exact_mut(LANES).zip(src.chunks_exact(LANES)) {
            let s_vals = vld1q_u8(s.as_ptr() as *const u8);
            let d_vals = vld1q_u8(d.as_ptr() as *const u8);
            let inv = vmvnq_u8(vqtbl1q_u8(s_vals, alpha_index));

            let lo = div_255(vmull_u8(vget_low_u8(d_vals), vget_low_u8(inv)));
            let hi = div_255(vmull_high_u8(d_vals, inv));
            let scaled = vcombine_u8(vmovn_u16(lo), vmovn_u16(hi));
            vst1q_u8(d.as_mut_ptr() as *mut u8, vqaddq_u8(s_vals, scaled));
        }
    }

    /// SAFETY: The CPU needs to support the target feature `neon`.
    #[target_feature(enable = "neon")]
    unsafe fn add_rows(dest: &mut [u32], src: &[u32]) {
        for (d, s) in dest.chunks_exact_mut(LANES).zip(src.chunks_exact(LANES)) {
            let s_vals = vld1q_u8(s.as_ptr() as *const u8);
            let d_vals = vld1q_u8(d.as_ptr() as *const u8);
            vst1q_u8(d.as_mut_ptr() as *mut u8, vqaddq_u8(s_vals, d_vals));
        }
    }
}
