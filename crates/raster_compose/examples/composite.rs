// Copyright 2024 the Piet Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Composites a few operands and writes the result to `composite.png`.

use peniko::color::palette;
use raster_compose::kurbo::Point;
use raster_compose::{
    composite32, fill_rectangles, Color, Format, GradientStop, Image, IntRect, Operator, Region,
    Repeat,
};
use std::io::BufWriter;

const WIDTH: i32 = 256;
const HEIGHT: i32 = 256;

fn main() {
    env_logger::init();

    let mut dest = Image::bits(Format::A8R8G8B8, WIDTH, HEIGHT).unwrap();
    fill_rectangles(
        Operator::Src,
        &mut dest,
        palette::css::WHITE,
        &[IntRect::new(0, 0, WIDTH, HEIGHT)],
    );

    let stops = [
        GradientStop::new(0.0, palette::css::REBECCA_PURPLE),
        GradientStop::new(0.5, palette::css::GOLD.with_alpha(0.5)),
        GradientStop::new(1.0, palette::css::TEAL),
    ];
    let mut linear = Image::linear_gradient(Point::new(0.0, 0.0), Point::new(64.0, 32.0), &stops).unwrap();
    linear.set_repeat(Repeat::Reflect);
    composite32(Operator::Over, &linear, None, &mut dest, 0, 0, 0, 0, 0, 0, WIDTH, HEIGHT / 2);

    let center = Point::new(128.0, 192.0);
    let radial = Image::radial_gradient(center, 8.0, center, 60.0, &stops).unwrap();
    composite32(Operator::Multiply, &radial, None, &mut dest, 0, 0, 0, 0, 0, 0, WIDTH, HEIGHT);

    // A translucent band through a clip of two rectangles.
    let band = Image::solid(Color::from_argb32(0x8000_4080));
    let mut clip = Region::from_rect(IntRect::new(16, 100, 120, 156));
    clip.union_rect(IntRect::new(136, 100, 240, 156));
    dest.set_clip_region(Some(&clip));
    composite32(Operator::Over, &band, None, &mut dest, 0, 0, 0, 0, 0, 0, WIDTH, HEIGHT);
    dest.set_clip_region(None);

    let bits = dest.as_bits().unwrap();
    let file = std::fs::File::create("composite.png").unwrap();
    let mut encoder = png::Encoder::new(BufWriter::new(file), WIDTH as u32, HEIGHT as u32);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header().unwrap();
    writer.write_image_data(&bits.to_rgba8()).unwrap();
}
