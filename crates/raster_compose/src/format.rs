// Copyright 2024 the Piet Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pixel format codes.
//!
//! A format code packs the bits per pixel, a channel ordering tag and the width of
//! each channel into one `u32`: `bpp << 24 | type << 16 | a << 12 | r << 8 | g << 4 | b`.
//! The layout is part of the public construction API and must stay stable.

use std::fmt;

/// How the channels of a format are ordered inside a pixel.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FormatType {
    Other = 0,
    /// Alpha only.
    A = 1,
    /// Alpha in the top bits, then red, green and blue.
    Argb = 2,
    /// Alpha in the top bits, then blue, green and red.
    Abgr = 3,
    /// Indices into a color palette.
    Color = 4,
    /// Indices into a gray palette.
    Gray = 5,
    /// Blue in the top bits, then green, red and alpha.
    Bgra = 8,
}

impl FormatType {
    fn from_bits(bits: u32) -> Option<Self> {
        Some(match bits {
            0 => Self::Other,
            1 => Self::A,
            2 => Self::Argb,
            3 => Self::Abgr,
            4 => Self::Color,
            5 => Self::Gray,
            8 => Self::Bgra,
            _ => return None,
        })
    }
}

/// A bit-packed pixel format descriptor.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Format(u32);

impl Format {
    pub const fn new(bpp: u32, ty: FormatType, a: u32, r: u32, g: u32, b: u32) -> Self {
        Self((bpp << 24) | ((ty as u32) << 16) | (a << 12) | (r << 8) | (g << 4) | b)
    }

    /// Reinterpret a raw format code.
    pub const fn from_code(code: u32) -> Self {
        Self(code)
    }

    pub const fn code(self) -> u32 {
        self.0
    }

    pub const fn bpp(self) -> u32 {
        self.0 >> 24
    }

    pub fn ty(self) -> Option<FormatType> {
        FormatType::from_bits((self.0 >> 16) & 0xff)
    }

    pub const fn a(self) -> u32 {
        (self.0 >> 12) & 0x0f
    }

    pub const fn r(self) -> u32 {
        (self.0 >> 8) & 0x0f
    }

    pub const fn g(self) -> u32 {
        (self.0 >> 4) & 0x0f
    }

    pub const fn b(self) -> u32 {
        self.0 & 0x0f
    }

    /// Number of significant bits per pixel.
    pub const fn depth(self) -> u32 {
        self.a() + self.r() + self.g() + self.b()
    }

    pub const fn has_alpha(self) -> bool {
        self.a() != 0
    }

    /// Whether any channel is wider than 8 bits, requiring the wide canonical precision.
    pub const fn is_wide(self) -> bool {
        self.a() > 8 || self.r() > 8 || self.g() > 8 || self.b() > 8
    }

    /// Whether pixels of this format are palette indices.
    pub fn is_indexed(self) -> bool {
        matches!(self.ty(), Some(FormatType::Color | FormatType::Gray))
    }

    /// Whether this engine can fetch and store pixels of this format.
    pub fn is_supported(self) -> bool {
        let Some(ty) = self.ty() else {
            return false;
        };

        let bpp = self.bpp();
        if !matches!(bpp, 1 | 4 | 8 | 16 | 24 | 32) {
            return false;
        }

        match ty {
            FormatType::Other => false,
            FormatType::Color | FormatType::Gray => self.depth() == 0 && bpp <= 8,
            FormatType::A => self.r() == 0 && self.g() == 0 && self.b() == 0 && self.a() > 0 && self.a() <= bpp,
            FormatType::Argb | FormatType::Abgr | FormatType::Bgra => {
                self.depth() > 0 && self.depth() <= bpp
            }
        }
    }

    pub const A8R8G8B8: Self = Self::new(32, FormatType::Argb, 8, 8, 8, 8);
    pub const X8R8G8B8: Self = Self::new(32, FormatType::Argb, 0, 8, 8, 8);
    pub const A8B8G8R8: Self = Self::new(32, FormatType::Abgr, 8, 8, 8, 8);
    pub const X8B8G8R8: Self = Self::new(32, FormatType::Abgr, 0, 8, 8, 8);
    pub const B8G8R8A8: Self = Self::new(32, FormatType::Bgra, 8, 8, 8, 8);
    pub const B8G8R8X8: Self = Self::new(32, FormatType::Bgra, 0, 8, 8, 8);
    pub const A2R10G10B10: Self = Self::new(32, FormatType::Argb, 2, 10, 10, 10);
    pub const X2R10G10B10: Self = Self::new(32, FormatType::Argb, 0, 10, 10, 10);
    pub const A2B10G10R10: Self = Self::new(32, FormatType::Abgr, 2, 10, 10, 10);
    pub const X2B10G10R10: Self = Self::new(32, FormatType::Abgr, 0, 10, 10, 10);

    pub const R8G8B8: Self = Self::new(24, FormatType::Argb, 0, 8, 8, 8);
    pub const B8G8R8: Self = Self::new(24, FormatType::Abgr, 0, 8, 8, 8);

    pub const R5G6B5: Self = Self::new(16, FormatType::Argb, 0, 5, 6, 5);
    pub const B5G6R5: Self = Self::new(16, FormatType::Abgr, 0, 5, 6, 5);
    pub const A1R5G5B5: Self = Self::new(16, FormatType::Argb, 1, 5, 5, 5);
    pub const X1R5G5B5: Self = Self::new(16, FormatType::Argb, 0, 5, 5, 5);
    pub const A1B5G5R5: Self = Self::new(16, FormatType::Abgr, 1, 5, 5, 5);
    pub const X1B5G5R5: Self = Self::new(16, FormatType::Abgr, 0, 5, 5, 5);
    pub const A4R4G4B4: Self = Self::new(16, FormatType::Argb, 4, 4, 4, 4);
    pub const X4R4G4B4: Self = Self::new(16, FormatType::Argb, 0, 4, 4, 4);
    pub const A4B4G4R4: Self = Self::new(16, FormatType::Abgr, 4, 4, 4, 4);
    pub const X4B4G4R4: Self = Self::new(16, FormatType::Abgr, 0, 4, 4, 4);

    pub const A8: Self = Self::new(8, FormatType::A, 8, 0, 0, 0);
    pub const R3G3B2: Self = Self::new(8, FormatType::Argb, 0, 3, 3, 2);
    pub const B2G3R3: Self = Self::new(8, FormatType::Abgr, 0, 3, 3, 2);
    pub const A2R2G2B2: Self = Self::new(8, FormatType::Argb, 2, 2, 2, 2);
    pub const A2B2G2R2: Self = Self::new(8, FormatType::Abgr, 2, 2, 2, 2);
    pub const C8: Self = Self::new(8, FormatType::Color, 0, 0, 0, 0);
    pub const G8: Self = Self::new(8, FormatType::Gray, 0, 0, 0, 0);
    pub const X4A4: Self = Self::new(8, FormatType::A, 4, 0, 0, 0);
    /// Same code as [`Format::C8`]: only the low nibble is meaningful.
    pub const X4C4: Self = Self::C8;
    /// Same code as [`Format::G8`]: only the low nibble is meaningful.
    pub const X4G4: Self = Self::G8;

    pub const A4: Self = Self::new(4, FormatType::A, 4, 0, 0, 0);
    pub const R1G2B1: Self = Self::new(4, FormatType::Argb, 0, 1, 2, 1);
    pub const B1G2R1: Self = Self::new(4, FormatType::Abgr, 0, 1, 2, 1);
    pub const A1R1G1B1: Self = Self::new(4, FormatType::Argb, 1, 1, 1, 1);
    pub const A1B1G1R1: Self = Self::new(4, FormatType::Abgr, 1, 1, 1, 1);
    pub const C4: Self = Self::new(4, FormatType::Color, 0, 0, 0, 0);
    pub const G4: Self = Self::new(4, FormatType::Gray, 0, 0, 0, 0);

    pub const A1: Self = Self::new(1, FormatType::A, 1, 0, 0, 0);
    pub const G1: Self = Self::new(1, FormatType::Gray, 0, 0, 0, 0);

    /// Matches "no mask" in fast-path tables. Depth 0, so it never clashes with a real format.
    pub const NULL: Self = Self::new(0, FormatType::Other, 0, 0, 0, 0);
    /// Matches a solid source in fast-path tables.
    pub const SOLID: Self = Self::new(0, FormatType::A, 0, 0, 0, 0);

    /// Every real format with a codec.
    pub const ALL: &'static [Format] = &[
        Self::A8R8G8B8,
        Self::X8R8G8B8,
        Self::A8B8G8R8,
        Self::X8B8G8R8,
        Self::B8G8R8A8,
        Self::B8G8R8X8,
        Self::A2R10G10B10,
        Self::X2R10G10B10,
        Self::A2B10G10R10,
        Self::X2B10G10R10,
        Self::R8G8B8,
        Self::B8G8R8,
        Self::R5G6B5,
        Self::B5G6R5,
        Self::A1R5G5B5,
        Self::X1R5G5B5,
        Self::A1B5G5R5,
        Self::X1B5G5R5,
        Self::A4R4G4B4,
        Self::X4R4G4B4,
        Self::A4B4G4R4,
        Self::X4B4G4R4,
        Self::A8,
        Self::R3G3B2,
        Self::B2G3R3,
        Self::A2R2G2B2,
        Self::A2B2G2R2,
        Self::C8,
        Self::G8,
        Self::X4A4,
        Self::A4,
        Self::R1G2B1,
        Self::B1G2R1,
        Self::A1R1G1B1,
        Self::A1B1G1R1,
        Self::C4,
        Self::G4,
        Self::A1,
        Self::G1,
    ];
}

impl fmt::Debug for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ty() {
            Some(ty) => write!(
                f,
                "Format({}bpp {:?} a{} r{} g{} b{})",
                self.bpp(),
                ty,
                self.a(),
                self.r(),
                self.g(),
                self.b()
            ),
            None => write!(f, "Format({:#010x})", self.0),
        }
    }
}
