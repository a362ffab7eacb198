// Copyright 2024 the Piet Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Seeded random operands for benchmarks and property tests.

use raster_compose::{
    Color, CompositeInfo, Error, Format, FormatType, Image, ImplementationChain, IntRect, Operator,
    Palette,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SEED: [u8; 32] = [0; 32];

/// A generator with the fixed seed, so every run sees the same operands.
pub fn rng() -> StdRng {
    StdRng::from_seed(SEED)
}

/// A random premultiplied `a8r8g8b8` pixel. Fully transparent and fully opaque
/// pixels are over-represented since fast paths special-case them.
pub fn premul_pixel(rng: &mut StdRng) -> u32 {
    let a: u32 = match rng.gen_range(0..8) {
        0 => 0,
        1 | 2 => 0xff,
        _ => rng.gen_range(0..=0xff),
    };
    let mut channel = || rng.gen_range(0..=a);
    (a << 24) | (channel() << 16) | (channel() << 8) | channel()
}

pub fn premul_row(rng: &mut StdRng, len: usize) -> Vec<u32> {
    (0..len).map(|_| premul_pixel(rng)).collect()
}

/// Formats the codec can fetch and store without a palette.
pub fn direct_formats() -> impl Iterator<Item = Format> {
    Format::ALL.iter().copied().filter(|f| f.is_supported() && !f.is_indexed())
}

pub fn random_format(rng: &mut StdRng) -> Format {
    let formats: Vec<Format> = direct_formats().collect();
    formats[rng.gen_range(0..formats.len())]
}

pub fn random_operator(rng: &mut StdRng) -> Operator {
    Operator::ALL[rng.gen_range(0..Operator::COUNT)]
}

/// A `width x height` image of `format` holding random premultiplied content.
///
/// The content is generated as `a8r8g8b8` and converted with the generic loop, so
/// every format sees values it can represent.
pub fn random_image(
    rng: &mut StdRng,
    format: Format,
    width: i32,
    height: i32,
) -> Result<Image, Error> {
    let len = width.max(0) as usize * height.max(0) as usize;
    let pixels = premul_row(rng, len);
    let argb = Image::bits_with_data(Format::A8R8G8B8, width, height, pixels, width.max(0) as usize)?;
    if format == Format::A8R8G8B8 {
        return Ok(argb);
    }

    let mut image = Image::bits(format, width, height)?;
    match format.ty() {
        Some(FormatType::Color) => {
            let entries: Vec<u32> = (0..256).map(|_| 0xff00_0000 | rng.gen::<u32>()).collect();
            image.set_palette(Palette::color(&entries))?;
        }
        Some(FormatType::Gray) => {
            image.set_palette(Palette::gray_ramp())?;
        }
        _ => {}
    }

    ImplementationChain::general_only().composite(
        &CompositeInfo {
            op: Operator::Src,
            src: &argb,
            mask: None,
            src_x: 0,
            src_y: 0,
            mask_x: 0,
            mask_y: 0,
            dest_x: 0,
            dest_y: 0,
            width,
            height,
        },
        &mut image,
    );
    Ok(image)
}

#[derive(Copy, Clone, Debug)]
pub struct Params {
    pub width: i32,
    pub height: i32,
    pub size: i32,
}

/// One solid-color rectangle operation.
#[derive(Copy, Clone, Debug)]
pub struct Command {
    pub op: Operator,
    pub color: Color,
    pub rect: IntRect,
}

/// Integer-aligned squares of `params.size` at random positions inside the canvas.
pub struct RectIterator {
    params: Params,
    ops: &'static [Operator],
    rng: StdRng,
}

impl RectIterator {
    pub fn new(params: Params, ops: &'static [Operator]) -> Self {
        Self {
            params,
            ops,
            rng: rng(),
        }
    }
}

impl Iterator for RectIterator {
    type Item = Command;

    fn next(&mut self) -> Option<Self::Item> {
        let size = self.params.size;
        let x = self.rng.gen_range(0..=(self.params.width - size).max(0));
        let y = self.rng.gen_range(0..=(self.params.height - size).max(0));
        let op = self.ops[self.rng.gen_range(0..self.ops.len())];
        let color = Color::from_argb32(premul_pixel(&mut self.rng));

        Some(Command {
            op,
            color,
            rect: IntRect::from_origin_size(x, y, size as u32, size as u32),
        })
    }
}
