// Copyright 2024 the Piet Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

mod util;

use crate::util::{composite_with, get_chain, pixels};
use raster_compose::gradient::Gradient;
use raster_compose::kurbo::{Affine, Point};
use raster_compose::{
    Color, Error, Filter, Format, GradientStop, Image, ImageClass, Operator, Repeat,
};

/// One gradient unit in 16.16 fixed point.
const UNIT: i64 = 0x10000;

const WHITE: u32 = 0xffff_ffff;
const BLACK: u32 = 0xff00_0000;
const RED: u32 = 0xffff_0000;
const BLUE: u32 = 0xff00_00ff;

fn stops(colors: &[(f64, u32)]) -> Vec<GradientStop> {
    colors
        .iter()
        .map(|&(offset, argb)| GradientStop::new(offset, Color::from_argb32(argb)))
        .collect()
}

fn channels(px: u32) -> [i32; 4] {
    [24, 16, 8, 0].map(|shift| ((px >> shift) & 0xff) as i32)
}

fn assert_close(actual: u32, expected: [f64; 4], tolerance: f64) {
    for (a, e) in channels(actual).into_iter().zip(expected) {
        assert!(
            (f64::from(a) - e).abs() <= tolerance,
            "{actual:08x} is not within {tolerance} of {expected:?}"
        );
    }
}

#[test]
fn stops_are_hit_exactly_from_both_sides() {
    let gradient = Gradient::new(&stops(&[(0.0, WHITE), (0.5, RED), (1.0, BLUE)])).unwrap();

    for repeat in [Repeat::None, Repeat::Pad, Repeat::Normal, Repeat::Reflect] {
        let mut walker = gradient.walker(repeat);
        for pos in (0..UNIT / 2).step_by(257) {
            walker.pixel(pos);
        }
        assert_eq!(walker.pixel(UNIT / 2), RED, "{repeat:?} from the left");

        let mut walker = gradient.walker(repeat);
        for pos in (UNIT / 2 + 1..UNIT).rev().step_by(257) {
            walker.pixel(pos);
        }
        assert_eq!(walker.pixel(UNIT / 2), RED, "{repeat:?} from the right");
    }

    let mut walker = gradient.walker(Repeat::Pad);
    assert_eq!(walker.pixel(0), WHITE);
    assert_eq!(walker.pixel(UNIT), BLUE);
}

#[test]
fn pad_holds_boundary_colors() {
    let gradient = Gradient::new(&stops(&[(0.2, RED), (0.8, BLUE)])).unwrap();

    for repeat in [Repeat::Pad, Repeat::None] {
        let mut walker = gradient.walker(repeat);
        for pos in [UNIT / 5 - 1, 0, -UNIT, -100 * UNIT] {
            assert_eq!(walker.pixel(pos), RED, "{repeat:?} at {pos}");
        }
        for pos in [UNIT, 2 * UNIT, 100 * UNIT] {
            assert_eq!(walker.pixel(pos), BLUE, "{repeat:?} at {pos}");
        }
    }
}

#[test]
fn repeat_is_periodic() {
    let gradient = Gradient::new(&stops(&[(0.0, RED), (0.3, WHITE), (1.0, BLUE)])).unwrap();
    let mut walker = gradient.walker(Repeat::Normal);
    let mut shifted = gradient.walker(Repeat::Normal);

    for pos in (-UNIT..2 * UNIT).step_by(997) {
        assert_eq!(walker.pixel(pos), shifted.pixel(pos + UNIT), "at {pos}");
        assert_eq!(walker.pixel_wide(pos), shifted.pixel_wide(pos + UNIT), "at {pos}");
    }
}

#[test]
fn reflect_mirrors_around_one() {
    let gradient = Gradient::new(&stops(&[(0.0, RED), (0.3, WHITE), (1.0, BLUE)])).unwrap();
    let mut walker = gradient.walker(Repeat::Reflect);
    let mut mirrored = gradient.walker(Repeat::Reflect);

    for pos in (0..=UNIT).step_by(991) {
        assert_eq!(walker.pixel(pos), mirrored.pixel(2 * UNIT - pos), "at {pos}");
        assert_eq!(walker.pixel(-pos), mirrored.pixel(pos), "at -{pos}");
    }
}

#[test]
fn empty_gradients_are_refused() {
    assert!(matches!(
        Image::linear_gradient(Point::ZERO, Point::new(1.0, 0.0), &[]),
        Err(Error::EmptyGradient)
    ));
}

#[test]
fn linear_gradient_image() {
    let image = Image::linear_gradient(
        Point::ZERO,
        Point::new(16.0, 0.0),
        &stops(&[(0.0, WHITE), (1.0, BLACK)]),
    )
    .unwrap();
    assert_eq!(image.classify(), ImageClass::Horizontal);

    let mut dest = Image::bits(Format::A8R8G8B8, 16, 3).unwrap();
    composite_with(&get_chain(), Operator::Src, &image, None, &mut dest);
    let pixels = pixels(&dest);

    let first_row = &pixels[..16];
    for row in pixels.chunks(16) {
        assert_eq!(row, first_row);
    }
    for pair in first_row.windows(2) {
        let [a, b] = [pair[0], pair[1]].map(channels);
        assert_eq!(a[0], 0xff);
        assert!(b[1] < a[1], "{:08x} then {:08x}", pair[0], pair[1]);
    }

    // Pixel 8 is sampled at its center, 8.5 / 16 along the axis.
    assert_close(first_row[8], [255.0, 119.5, 119.5, 119.5], 1.0);
}

#[test]
fn vertical_axis_is_classified() {
    let mut image = Image::linear_gradient(
        Point::ZERO,
        Point::new(0.0, 8.0),
        &stops(&[(0.0, WHITE), (1.0, BLACK)]),
    )
    .unwrap();
    assert_eq!(image.classify(), ImageClass::Vertical);

    image.set_transform(Some(Affine::rotate(0.3)));
    assert_eq!(image.classify(), ImageClass::Unknown);
}

#[test]
fn radial_gradient_without_repeat_is_bounded() {
    let mut image = Image::radial_gradient(
        Point::new(8.0, 8.0),
        0.0,
        Point::new(8.0, 8.0),
        4.0,
        &stops(&[(0.0, RED), (1.0, BLUE)]),
    )
    .unwrap();

    let mut dest = Image::bits(Format::A8R8G8B8, 16, 16).unwrap();
    composite_with(&get_chain(), Operator::Src, &image, None, &mut dest);
    let bits = dest.as_bits().unwrap();
    assert_eq!(bits.pixel_32(0, 0), 0);
    assert_eq!(bits.pixel_32(8, 8) >> 24, 0xff);
    // The center pixel sits at about t = 0.18.
    assert_close(bits.pixel_32(8, 8), [255.0, 210.0, 0.0, 45.0], 3.0);

    image.set_repeat(Repeat::Pad);
    composite_with(&get_chain(), Operator::Src, &image, None, &mut dest);
    assert_eq!(dest.as_bits().unwrap().pixel_32(0, 0), BLUE);
}

#[test]
fn conical_gradient_starts_at_its_angle() {
    let image = Image::conical_gradient(
        Point::new(8.0, 8.0),
        0.0,
        &stops(&[(0.0, RED), (1.0, BLUE)]),
    )
    .unwrap();
    assert_eq!(image.classify(), ImageClass::Unknown);

    let mut dest = Image::bits(Format::A8R8G8B8, 16, 16).unwrap();
    composite_with(&get_chain(), Operator::Src, &image, None, &mut dest);
    let bits = dest.as_bits().unwrap();

    // Just below the positive x axis.
    let [a, r, _, b] = channels(bits.pixel_32(12, 8));
    assert_eq!(a, 0xff);
    assert!(r > 0xf0 && b < 0x10, "{:08x}", bits.pixel_32(12, 8));

    // Opposite side, about half a turn.
    assert_close(bits.pixel_32(3, 8), [255.0, 132.0, 0.0, 123.0], 3.0);
}

#[test]
fn fast_filter_uses_the_lookup_table() {
    let stops = stops(&[(0.0, RED), (0.4, WHITE), (1.0, BLUE)]);
    let exact = Image::linear_gradient(Point::ZERO, Point::new(64.0, 0.0), &stops).unwrap();
    let mut fast = exact.clone();
    fast.set_filter(Filter::Fast, &[]).unwrap();

    let mut exact_dest = Image::bits(Format::A8R8G8B8, 64, 1).unwrap();
    let mut fast_dest = exact_dest.clone();
    composite_with(&get_chain(), Operator::Src, &exact, None, &mut exact_dest);
    composite_with(&get_chain(), Operator::Src, &fast, None, &mut fast_dest);

    for (e, f) in pixels(&exact_dest).into_iter().zip(pixels(&fast_dest)) {
        for (ce, cf) in channels(e).into_iter().zip(channels(f)) {
            assert!((ce - cf).abs() <= 3, "{e:08x} vs {f:08x}");
        }
    }
}

#[test]
fn gradient_sources_match_general_in_every_destination_format() {
    let mut image = Image::linear_gradient(
        Point::new(1.0, 2.0),
        Point::new(11.0, 7.0),
        &stops(&[(0.0, 0x8000_0080), (0.5, WHITE), (1.0, 0x4020_1000)]),
    )
    .unwrap();
    image.set_repeat(Repeat::Reflect);

    for format in [Format::A8R8G8B8, Format::R5G6B5, Format::A2R10G10B10, Format::A8] {
        let mut expected = Image::bits(format, 12, 9).unwrap();
        let mut actual = expected.clone();
        composite_with(
            &raster_compose::ImplementationChain::general_only(),
            Operator::Over,
            &image,
            None,
            &mut expected,
        );
        composite_with(&get_chain(), Operator::Over, &image, None, &mut actual);
        util::check_same(&expected, &actual, &format!("gradient_{format:?}"));
    }
}
