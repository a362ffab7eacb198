// Copyright 2024 the Piet Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Color tables for indexed and gray formats.

/// A palette consulted by the `Color` and `Gray` format types.
///
/// Fetching maps an index to `rgba[index]`. Storing maps a color back to an index
/// through a 15-bit inverse table, keyed by `r5g5b5` for color palettes and by a
/// 15-bit luminance for gray palettes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Palette {
    color: bool,
    rgba: [u32; 256],
    ent: Box<[u8; 32768]>,
}

impl Palette {
    /// Build a color palette from up to 256 ARGB entries; the inverse table maps each
    /// 15-bit color to the nearest entry.
    pub fn color(entries: &[u32]) -> Self {
        Self::build(true, entries)
    }

    /// Build a gray palette from up to 256 ARGB entries; the inverse table maps each
    /// 15-bit luminance to the entry with the nearest luminance.
    pub fn gray(entries: &[u32]) -> Self {
        Self::build(false, entries)
    }

    /// A 256-level gray ramp, the natural palette for `g8`.
    pub fn gray_ramp() -> Self {
        let entries: Vec<u32> = (0..256u32)
            .map(|i| 0xff00_0000 | (i << 16) | (i << 8) | i)
            .collect();
        Self::gray(&entries)
    }

    fn build(color: bool, entries: &[u32]) -> Self {
        let entries = &entries[..entries.len().min(256)];
        let mut rgba = [0; 256];
        rgba[..entries.len()].copy_from_slice(entries);

        let mut ent = Box::new([0u8; 32768]);
        if !entries.is_empty() {
            for (key, slot) in ent.iter_mut().enumerate() {
                let key = key as u32;
                *slot = if color {
                    let target = rgb15_to_rgb24(key);
                    nearest(entries, |e| color_distance(e, target))
                } else {
                    nearest(entries, |e| (i64::from(luminance15(e)) - i64::from(key)).unsigned_abs())
                };
            }
        }

        Self { color, rgba, ent }
    }

    pub fn is_color(&self) -> bool {
        self.color
    }

    #[inline]
    pub(crate) fn lookup(&self, index: u32) -> u32 {
        self.rgba[(index & 0xff) as usize]
    }

    #[inline]
    pub(crate) fn index_of(&self, argb: u32) -> u32 {
        let key = if self.color {
            rgb24_to_rgb15(argb)
        } else {
            luminance15(argb)
        };
        u32::from(self.ent[key as usize])
    }
}

fn nearest(entries: &[u32], dist: impl Fn(u32) -> u64) -> u8 {
    entries
        .iter()
        .enumerate()
        .min_by_key(|(_, e)| dist(**e))
        .map(|(i, _)| i as u8)
        .unwrap_or(0)
}

fn color_distance(a: u32, b: u32) -> u64 {
    [16, 8, 0]
        .iter()
        .map(|shift| {
            let d = i64::from((a >> shift) & 0xff) - i64::from((b >> shift) & 0xff);
            (d * d) as u64
        })
        .sum()
}

#[inline]
fn rgb24_to_rgb15(s: u32) -> u32 {
    ((s >> 3) & 0x001f) | ((s >> 6) & 0x03e0) | ((s >> 9) & 0x7c00)
}

fn rgb15_to_rgb24(s: u32) -> u32 {
    let r = (s >> 10) & 0x1f;
    let g = (s >> 5) & 0x1f;
    let b = s & 0x1f;
    let widen = |c: u32| (c << 3) | (c >> 2);
    (widen(r) << 16) | (widen(g) << 8) | widen(b)
}

#[inline]
fn luminance15(s: u32) -> u32 {
    (((s >> 16) & 0xff) * 153 + ((s >> 8) & 0xff) * 301 + (s & 0xff) * 58) >> 2
}
