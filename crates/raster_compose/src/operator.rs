// Copyright 2024 the Piet Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compositing operators.

/// A compositing operator.
///
/// The discriminants are the operator codes of the public construction API.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Operator {
    Clear = 0x00,
    Src = 0x01,
    Dst = 0x02,
    Over = 0x03,
    OverReverse = 0x04,
    In = 0x05,
    InReverse = 0x06,
    Out = 0x07,
    OutReverse = 0x08,
    Atop = 0x09,
    AtopReverse = 0x0a,
    Xor = 0x0b,
    Add = 0x0c,
    Saturate = 0x0d,

    DisjointClear = 0x10,
    DisjointSrc = 0x11,
    DisjointDst = 0x12,
    DisjointOver = 0x13,
    DisjointOverReverse = 0x14,
    DisjointIn = 0x15,
    DisjointInReverse = 0x16,
    DisjointOut = 0x17,
    DisjointOutReverse = 0x18,
    DisjointAtop = 0x19,
    DisjointAtopReverse = 0x1a,
    DisjointXor = 0x1b,

    ConjointClear = 0x20,
    ConjointSrc = 0x21,
    ConjointDst = 0x22,
    ConjointOver = 0x23,
    ConjointOverReverse = 0x24,
    ConjointIn = 0x25,
    ConjointInReverse = 0x26,
    ConjointOut = 0x27,
    ConjointOutReverse = 0x28,
    ConjointAtop = 0x29,
    ConjointAtopReverse = 0x2a,
    ConjointXor = 0x2b,

    Multiply = 0x30,
    Screen = 0x31,
    Overlay = 0x32,
    Darken = 0x33,
    Lighten = 0x34,
    ColorDodge = 0x35,
    ColorBurn = 0x36,
    HardLight = 0x37,
    SoftLight = 0x38,
    Difference = 0x39,
    Exclusion = 0x3a,
}

impl Operator {
    /// Every operator, in table order.
    pub const ALL: [Operator; 49] = [
        Self::Clear,
        Self::Src,
        Self::Dst,
        Self::Over,
        Self::OverReverse,
        Self::In,
        Self::InReverse,
        Self::Out,
        Self::OutReverse,
        Self::Atop,
        Self::AtopReverse,
        Self::Xor,
        Self::Add,
        Self::Saturate,
        Self::DisjointClear,
        Self::DisjointSrc,
        Self::DisjointDst,
        Self::DisjointOver,
        Self::DisjointOverReverse,
        Self::DisjointIn,
        Self::DisjointInReverse,
        Self::DisjointOut,
        Self::DisjointOutReverse,
        Self::DisjointAtop,
        Self::DisjointAtopReverse,
        Self::DisjointXor,
        Self::ConjointClear,
        Self::ConjointSrc,
        Self::ConjointDst,
        Self::ConjointOver,
        Self::ConjointOverReverse,
        Self::ConjointIn,
        Self::ConjointInReverse,
        Self::ConjointOut,
        Self::ConjointOutReverse,
        Self::ConjointAtop,
        Self::ConjointAtopReverse,
        Self::ConjointXor,
        Self::Multiply,
        Self::Screen,
        Self::Overlay,
        Self::Darken,
        Self::Lighten,
        Self::ColorDodge,
        Self::ColorBurn,
        Self::HardLight,
        Self::SoftLight,
        Self::Difference,
        Self::Exclusion,
    ];

    /// Number of entries in a combiner table.
    pub const COUNT: usize = Self::ALL.len();

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.code() == code)
    }

    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Dense index of this operator into a combiner table.
    pub const fn index(self) -> usize {
        let code = self as usize;
        match code >> 4 {
            0 => code,
            1 => 14 + (code & 0xf),
            2 => 26 + (code & 0xf),
            _ => 38 + (code & 0xf),
        }
    }

    /// Whether the result for a pixel can depend on the destination.
    pub const fn reads_dest(self) -> bool {
        !matches!(
            self,
            Self::Clear
                | Self::Src
                | Self::DisjointClear
                | Self::DisjointSrc
                | Self::ConjointClear
                | Self::ConjointSrc
        )
    }
}
