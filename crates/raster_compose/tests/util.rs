// Copyright 2024 the Piet Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

#![allow(dead_code)]

use image::{Rgba, RgbaImage};
use once_cell::sync::Lazy;
use raster_compose::{CompositeInfo, ExecutionMode, Format, Image, ImplementationChain, Operator};
use std::cmp::max;
use std::path::PathBuf;

static DIFFS_PATH: Lazy<PathBuf> = Lazy::new(|| {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("diffs");
    let _ = std::fs::remove_dir_all(&path);
    let _ = std::fs::create_dir_all(&path);
    path
});

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn execution_mode() -> ExecutionMode {
    #[allow(unused_mut)]
    let mut execution_mode = ExecutionMode::Scalar;

    #[cfg(all(target_arch = "aarch64", feature = "simd"))]
    if option_env!("NEON").is_some() {
        execution_mode = ExecutionMode::Neon;
    }

    #[cfg(all(target_arch = "x86_64", feature = "simd"))]
    if option_env!("AVX2").is_some() {
        execution_mode = ExecutionMode::Avx2;
    }

    execution_mode
}

/// The full chain under test.
pub fn get_chain() -> ImplementationChain {
    init_logging();
    ImplementationChain::new(execution_mode())
}

/// An `a8r8g8b8` image holding `pixels`, row by row.
pub fn argb_image(width: i32, height: i32, pixels: &[u32]) -> Image {
    assert_eq!(pixels.len(), (width * height) as usize);
    Image::bits_with_data(
        Format::A8R8G8B8,
        width,
        height,
        pixels.to_vec(),
        width as usize,
    )
    .unwrap()
}

/// An image of `format` filled with the `a8r8g8b8` color `argb`.
pub fn filled_image(format: Format, width: i32, height: i32, argb: u32) -> Image {
    let src = argb_image(width, height, &vec![argb; (width * height) as usize]);
    if format == Format::A8R8G8B8 {
        return src;
    }
    let mut dest = Image::bits(format, width, height).unwrap();
    composite_with(&ImplementationChain::general_only(), Operator::Src, &src, None, &mut dest);
    dest
}

/// Composite the whole of `dest` with all operands anchored at the origin.
pub fn composite_with(
    chain: &ImplementationChain,
    op: Operator,
    src: &Image,
    mask: Option<&Image>,
    dest: &mut Image,
) {
    let (width, height) = (dest.width(), dest.height());
    chain.composite(
        &CompositeInfo {
            op,
            src,
            mask,
            src_x: 0,
            src_y: 0,
            mask_x: 0,
            mask_y: 0,
            dest_x: 0,
            dest_y: 0,
            width,
            height,
        },
        dest,
    );
}

/// Every pixel of `image` as `a8r8g8b8`, row by row.
pub fn pixels(image: &Image) -> Vec<u32> {
    let bits = image.as_bits().unwrap();
    (0..bits.height())
        .flat_map(|y| (0..bits.width()).map(move |x| bits.pixel_32(x, y)))
        .collect()
}

/// Assert that two images hold the same raw storage. On mismatch, a diff image
/// (expected, differing pixels in red, actual) is written to `diffs/<name>.png`.
pub fn check_same(expected: &Image, actual: &Image, name: &str) {
    let expected_bits = expected.as_bits().unwrap();
    let actual_bits = actual.as_bits().unwrap();
    assert_eq!(expected_bits.format(), actual_bits.format(), "{name}: format");

    if expected_bits.data() == actual_bits.data() {
        return;
    }

    let to_image = |image: &Image| {
        let bits = image.as_bits().unwrap();
        RgbaImage::from_raw(bits.width() as u32, bits.height() as u32, bits.to_rgba8()).unwrap()
    };
    let diff_image = get_diff(&to_image(expected), &to_image(actual));

    let diff_path = DIFFS_PATH.join(format!("{}.png", name));
    diff_image
        .save_with_format(&diff_path, image::ImageFormat::Png)
        .unwrap();

    let first = expected_bits
        .data()
        .iter()
        .zip(actual_bits.data())
        .position(|(e, a)| e != a);
    panic!("{name}: images differ, first at word {first:?}");
}

fn get_diff(expected_image: &RgbaImage, actual_image: &RgbaImage) -> RgbaImage {
    let width = max(expected_image.width(), actual_image.width());
    let height = max(expected_image.height(), actual_image.height());

    let mut diff_image = RgbaImage::new(width * 3, height);

    for x in 0..width {
        for y in 0..height {
            let actual_pixel = actual_image.get_pixel_checked(x, y);
            let expected_pixel = expected_image.get_pixel_checked(x, y);

            match (actual_pixel, expected_pixel) {
                (Some(actual), Some(expected)) => {
                    diff_image.put_pixel(x, y, *expected);
                    diff_image.put_pixel(x + 2 * width, y, *actual);
                    if actual != expected {
                        diff_image.put_pixel(x + width, y, Rgba([255, 0, 0, 255]));
                    } else {
                        diff_image.put_pixel(x + width, y, Rgba([0, 0, 0, 255]))
                    }
                }
                (Some(actual), None) => {
                    diff_image.put_pixel(x + 2 * width, y, *actual);
                    diff_image.put_pixel(x + width, y, Rgba([255, 0, 0, 255]));
                }
                (None, Some(expected)) => {
                    diff_image.put_pixel(x, y, *expected);
                    diff_image.put_pixel(x + width, y, Rgba([255, 0, 0, 255]));
                }
                _ => {
                    diff_image.put_pixel(x + width, y, Rgba([255, 0, 0, 255]));
                }
            }
        }
    }

    diff_image
}
