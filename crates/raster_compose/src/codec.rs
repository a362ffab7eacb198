// Copyright 2024 the Piet Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fetching and storing scanlines of every supported pixel format.
//!
//! All compositing math happens on canonical pixels: `a8r8g8b8` packed into a `u32`,
//! or `a16r16g16b16` packed into a `u64` for the wide precision. A [`Codec`] is
//! resolved once per raster image and converts between its storage layout and the
//! canonical pixels one scanline at a time.

use crate::error::Error;
use crate::format::{Format, FormatType};
use crate::palette::Palette;

/// Sub-byte pixels and 24-bpp pixels depend on the memory layout of the target.
const BIG_ENDIAN: bool = cfg!(target_endian = "big");

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Access {
    Bpp1,
    Bpp4,
    Bpp8,
    Bpp16,
    Bpp24,
    Bpp32,
}

impl Access {
    fn from_bpp(bpp: u32) -> Option<Self> {
        Some(match bpp {
            1 => Self::Bpp1,
            4 => Self::Bpp4,
            8 => Self::Bpp8,
            16 => Self::Bpp16,
            24 => Self::Bpp24,
            32 => Self::Bpp32,
            _ => return None,
        })
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
struct Channel {
    shift: u32,
    width: u32,
}

impl Channel {
    #[inline(always)]
    fn extract(self, raw: u32) -> u32 {
        (raw >> self.shift) & mask(self.width)
    }

    #[inline(always)]
    fn insert(self, value: u32) -> u32 {
        (value & mask(self.width)) << self.shift
    }
}

#[inline(always)]
const fn mask(width: u32) -> u32 {
    if width >= 32 {
        u32::MAX
    } else {
        (1 << width) - 1
    }
}

/// Widen a `width`-bit channel to `bits` by replicating its top bits.
#[inline(always)]
fn replicate(value: u32, width: u32, bits: u32) -> u32 {
    if width == 0 {
        return 0;
    }
    if width >= bits {
        return value >> (width - bits);
    }

    let mut result = value << (bits - width);
    let mut filled = width;
    while filled < bits {
        result |= result >> filled;
        filled *= 2;
    }
    result & mask(bits)
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Layout {
    Packed {
        a: Channel,
        r: Channel,
        g: Channel,
        b: Channel,
    },
    Indexed,
}

impl Layout {
    fn new(format: Format) -> Option<Self> {
        let (aw, rw, gw, bw) = (format.a(), format.r(), format.g(), format.b());
        let ch = |shift, width| Channel { shift, width };

        Some(match format.ty()? {
            FormatType::Color | FormatType::Gray => Self::Indexed,
            FormatType::A => Self::Packed {
                a: ch(0, aw),
                r: Channel::default(),
                g: Channel::default(),
                b: Channel::default(),
            },
            FormatType::Argb => Self::Packed {
                b: ch(0, bw),
                g: ch(bw, gw),
                r: ch(bw + gw, rw),
                a: ch(bw + gw + rw, aw),
            },
            FormatType::Abgr => Self::Packed {
                r: ch(0, rw),
                g: ch(rw, gw),
                b: ch(rw + gw, bw),
                a: ch(rw + gw + bw, aw),
            },
            FormatType::Bgra => {
                let b_shift = format.bpp() - bw;
                let g_shift = b_shift - gw;
                let r_shift = g_shift - rw;
                Self::Packed {
                    b: ch(b_shift, bw),
                    g: ch(g_shift, gw),
                    r: ch(r_shift, rw),
                    a: ch(0, aw),
                }
            }
            FormatType::Other => return None,
        })
    }
}

/// Per-format fetch and store procedures.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Codec {
    format: Format,
    access: Access,
    layout: Layout,
}

impl Codec {
    pub fn new(format: Format) -> Result<Self, Error> {
        if !format.is_supported() {
            return Err(Error::UnsupportedFormat(format));
        }

        let access = Access::from_bpp(format.bpp()).ok_or(Error::UnsupportedFormat(format))?;
        let layout = Layout::new(format).ok_or(Error::UnsupportedFormat(format))?;

        Ok(Self {
            format,
            access,
            layout,
        })
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// Decode `out.len()` pixels starting at column `x` of `row` into `a8r8g8b8`.
    pub fn fetch_32(&self, row: &[u32], x: usize, out: &mut [u32], palette: Option<&Palette>) {
        for (i, px) in out.iter_mut().enumerate() {
            *px = self.decode_32(read(self.access, row, x + i), palette);
        }
    }

    /// Decode `out.len()` pixels starting at column `x` of `row` into `a16r16g16b16`.
    pub fn fetch_64(&self, row: &[u32], x: usize, out: &mut [u64], palette: Option<&Palette>) {
        for (i, px) in out.iter_mut().enumerate() {
            *px = self.decode_64(read(self.access, row, x + i), palette);
        }
    }

    /// Decode a single pixel.
    #[inline]
    pub fn fetch_pixel_32(&self, row: &[u32], x: usize, palette: Option<&Palette>) -> u32 {
        self.decode_32(read(self.access, row, x), palette)
    }

    #[inline]
    pub fn fetch_pixel_64(&self, row: &[u32], x: usize, palette: Option<&Palette>) -> u64 {
        self.decode_64(read(self.access, row, x), palette)
    }

    /// Encode `values` into `row` starting at column `x`.
    pub fn store_32(&self, row: &mut [u32], x: usize, values: &[u32], palette: Option<&Palette>) {
        for (i, &px) in values.iter().enumerate() {
            write(self.access, row, x + i, self.encode_32(px, palette));
        }
    }

    pub fn store_64(&self, row: &mut [u32], x: usize, values: &[u64], palette: Option<&Palette>) {
        for (i, &px) in values.iter().enumerate() {
            write(self.access, row, x + i, self.encode_64(px, palette));
        }
    }

    /// The raw storage value of pixel `x`.
    #[inline]
    pub(crate) fn read_raw(&self, row: &[u32], x: usize) -> u32 {
        read(self.access, row, x)
    }

    #[inline]
    pub(crate) fn write_raw(&self, row: &mut [u32], x: usize, value: u32) {
        write(self.access, row, x, value);
    }

    /// Encode one canonical pixel into its raw storage value.
    #[inline]
    pub fn encode_32(&self, px: u32, palette: Option<&Palette>) -> u32 {
        match self.layout {
            Layout::Indexed => palette.map(|p| p.index_of(px)).unwrap_or(0),
            Layout::Packed { .. } if self.format.is_wide() => {
                self.encode_64(expand_pixel(px), palette)
            }
            Layout::Packed { a, r, g, b } => {
                let narrow = |ch: Channel, v: u32| ch.insert(v >> (8 - ch.width.min(8)));
                narrow(a, px >> 24)
                    | narrow(r, (px >> 16) & 0xff)
                    | narrow(g, (px >> 8) & 0xff)
                    | narrow(b, px & 0xff)
            }
        }
    }

    #[inline]
    pub fn encode_64(&self, px: u64, palette: Option<&Palette>) -> u32 {
        match self.layout {
            Layout::Indexed => palette.map(|p| p.index_of(contract_pixel(px))).unwrap_or(0),
            Layout::Packed { a, r, g, b } => {
                let narrow = |ch: Channel, v: u64| ch.insert((v >> (16 - ch.width)) as u32);
                narrow(a, px >> 48)
                    | narrow(r, (px >> 32) & 0xffff)
                    | narrow(g, (px >> 16) & 0xffff)
                    | narrow(b, px & 0xffff)
            }
        }
    }

    #[inline]
    fn decode_32(&self, raw: u32, palette: Option<&Palette>) -> u32 {
        match self.layout {
            Layout::Indexed => match palette {
                Some(palette) => palette.lookup(raw),
                None => 0,
            },
            Layout::Packed { a, r, g, b } => {
                let alpha = if a.width == 0 {
                    0xff
                } else {
                    replicate(a.extract(raw), a.width, 8)
                };
                (alpha << 24)
                    | (replicate(r.extract(raw), r.width, 8) << 16)
                    | (replicate(g.extract(raw), g.width, 8) << 8)
                    | replicate(b.extract(raw), b.width, 8)
            }
        }
    }

    #[inline]
    fn decode_64(&self, raw: u32, palette: Option<&Palette>) -> u64 {
        match self.layout {
            Layout::Indexed => expand_pixel(self.decode_32(raw, palette)),
            Layout::Packed { a, r, g, b } => {
                let alpha = if a.width == 0 {
                    0xffff
                } else {
                    replicate(a.extract(raw), a.width, 16)
                };
                (u64::from(alpha) << 48)
                    | (u64::from(replicate(r.extract(raw), r.width, 16)) << 32)
                    | (u64::from(replicate(g.extract(raw), g.width, 16)) << 16)
                    | u64::from(replicate(b.extract(raw), b.width, 16))
            }
        }
    }
}

/// Promote `a8r8g8b8` pixels to `a16r16g16b16`.
///
/// Each channel is widened from the bit depth it had in `format`, so a channel that
/// came from a 5-bit field is replicated from those 5 bits, not from the 8-bit value.
/// Formats without an alpha channel expand to opaque.
pub fn expand(dst: &mut [u64], src: &[u32], format: Format) {
    let (aw, rw, gw, bw) = match format.ty() {
        Some(FormatType::Argb | FormatType::Abgr | FormatType::Bgra | FormatType::A) => (
            format.a().min(8),
            format.r().min(8),
            format.g().min(8),
            format.b().min(8),
        ),
        _ => (8, 8, 8, 8),
    };

    for (d, &s) in dst.iter_mut().zip(src) {
        let top = |v: u32, width: u32| {
            if width == 0 {
                0
            } else {
                replicate((v & 0xff) >> (8 - width), width, 16)
            }
        };
        let a = if aw == 0 { 0xffff } else { top(s >> 24, aw) };
        *d = (u64::from(a) << 48)
            | (u64::from(top(s >> 16, rw)) << 32)
            | (u64::from(top(s >> 8, gw)) << 16)
            | u64::from(top(s, bw));
    }
}

/// Demote `a16r16g16b16` pixels to `a8r8g8b8` by truncation.
pub fn contract(dst: &mut [u32], src: &[u64]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = contract_pixel(s);
    }
}

#[inline(always)]
pub(crate) fn expand_pixel(px: u32) -> u64 {
    let ch = |v: u32| u64::from(((v & 0xff) << 8) | (v & 0xff));
    (ch(px >> 24) << 48) | (ch(px >> 16) << 32) | (ch(px >> 8) << 16) | ch(px)
}

#[inline(always)]
pub(crate) fn contract_pixel(px: u64) -> u32 {
    let ch = |v: u64| ((v >> 8) & 0xff) as u32;
    (ch(px >> 48) << 24) | (ch(px >> 32) << 16) | (ch(px >> 16) << 8) | ch(px)
}

/// Reorder an `a8r8g8b8` pixel into the channel order of `format`'s type.
pub(crate) fn to_format_order(argb: u32, format: Format) -> u32 {
    match format.ty() {
        Some(FormatType::Abgr) => {
            (argb & 0xff00_ff00) | ((argb >> 16) & 0xff) | ((argb & 0xff) << 16)
        }
        Some(FormatType::Bgra) => argb.swap_bytes(),
        _ => argb,
    }
}

#[inline(always)]
fn read(access: Access, row: &[u32], x: usize) -> u32 {
    match access {
        Access::Bpp32 => row[x],
        Access::Bpp16 => {
            let bytes: &[u8] = bytemuck::cast_slice(row);
            u32::from(u16::from_ne_bytes([bytes[2 * x], bytes[2 * x + 1]]))
        }
        Access::Bpp8 => {
            let bytes: &[u8] = bytemuck::cast_slice(row);
            u32::from(bytes[x])
        }
        Access::Bpp24 => fetch_24(bytemuck::cast_slice(row), 3 * x),
        Access::Bpp4 => {
            let bytes: &[u8] = bytemuck::cast_slice(row);
            let byte = u32::from(bytes[x >> 1]);
            let high = (x & 1 == 1) != BIG_ENDIAN;
            if high {
                byte >> 4
            } else {
                byte & 0x0f
            }
        }
        Access::Bpp1 => {
            let word = row[x >> 5];
            let bit = (x & 31) as u32;
            if BIG_ENDIAN {
                (word >> (31 - bit)) & 1
            } else {
                (word >> bit) & 1
            }
        }
    }
}

#[inline(always)]
fn write(access: Access, row: &mut [u32], x: usize, value: u32) {
    match access {
        Access::Bpp32 => row[x] = value,
        Access::Bpp16 => {
            let bytes: &mut [u8] = bytemuck::cast_slice_mut(row);
            bytes[2 * x..2 * x + 2].copy_from_slice(&(value as u16).to_ne_bytes());
        }
        Access::Bpp8 => {
            let bytes: &mut [u8] = bytemuck::cast_slice_mut(row);
            bytes[x] = value as u8;
        }
        Access::Bpp24 => store_24(bytemuck::cast_slice_mut(row), 3 * x, value),
        Access::Bpp4 => {
            let bytes: &mut [u8] = bytemuck::cast_slice_mut(row);
            let byte = &mut bytes[x >> 1];
            let high = (x & 1 == 1) != BIG_ENDIAN;
            let nibble = (value & 0x0f) as u8;
            *byte = if high {
                (*byte & 0x0f) | (nibble << 4)
            } else {
                (*byte & 0xf0) | nibble
            };
        }
        Access::Bpp1 => {
            let word = &mut row[x >> 5];
            let bit = (x & 31) as u32;
            let m = if BIG_ENDIAN { 1 << (31 - bit) } else { 1 << bit };
            if value & 1 != 0 {
                *word |= m;
            } else {
                *word &= !m;
            }
        }
    }
}

/// Read a 24-bit pixel at byte `offset`: one byte and one 16-bit load, split by the
/// parity of the offset, combined in native byte order.
#[inline(always)]
fn fetch_24(bytes: &[u8], offset: usize) -> u32 {
    if offset & 1 == 1 {
        let single = u32::from(bytes[offset]);
        let pair = u32::from(u16::from_ne_bytes([bytes[offset + 1], bytes[offset + 2]]));
        if BIG_ENDIAN {
            (single << 16) | pair
        } else {
            single | (pair << 8)
        }
    } else {
        let pair = u32::from(u16::from_ne_bytes([bytes[offset], bytes[offset + 1]]));
        let single = u32::from(bytes[offset + 2]);
        if BIG_ENDIAN {
            (pair << 8) | single
        } else {
            pair | (single << 16)
        }
    }
}

#[inline(always)]
fn store_24(bytes: &mut [u8], offset: usize, value: u32) {
    if offset & 1 == 1 {
        let (single, pair) = if BIG_ENDIAN {
            ((value >> 16) as u8, value as u16)
        } else {
            (value as u8, (value >> 8) as u16)
        };
        bytes[offset] = single;
        bytes[offset + 1..offset + 3].copy_from_slice(&pair.to_ne_bytes());
    } else {
        let (pair, single) = if BIG_ENDIAN {
            ((value >> 8) as u16, value as u8)
        } else {
            (value as u16, (value >> 16) as u8)
        };
        bytes[offset..offset + 2].copy_from_slice(&pair.to_ne_bytes());
        bytes[offset + 2] = single;
    }
}

/// Extract the color of a solid operand without running the generic fetch path,
/// reordered into `target`'s channel order.
///
/// Only the bit depths the fast paths know how to read are accepted; anything else is
/// rejected rather than guessed.
pub(crate) fn solid_color(image: &crate::image::Image, target: Format) -> Result<u32, Error> {
    use crate::image::ImageKind;

    let argb = match image.kind() {
        ImageKind::Solid(solid) => solid.color(),
        ImageKind::Bits(bits) => {
            let format = bits.format();
            if !matches!(format.bpp(), 32 | 24 | 16 | 8 | 1) {
                return Err(Error::UnsupportedFormat(format));
            }
            bits.pixel_32(0, 0)
        }
        _ => return Err(Error::NotBits),
    };

    Ok(to_format_order(argb, target))
}
