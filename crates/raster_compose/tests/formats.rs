// Copyright 2024 the Piet Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

mod util;

use crate::util::{argb_image, composite_with, filled_image, get_chain, pixels};
use raster_compose::codec::Codec;
use raster_compose::{Error, Format, FormatType, Image, Operator, Palette};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Enough pixels that every depth fills whole words.
const PIXELS: usize = 64;

fn random_row(rng: &mut StdRng, format: Format) -> Vec<u32> {
    let words = PIXELS * format.bpp() as usize / 32;
    (0..words).map(|_| rng.gen()).collect()
}

/// A palette of well separated opaque colors.
fn separated_palette() -> Palette {
    let levels = [0x00u32, 0x55, 0xaa, 0xff];
    let mut entries = vec![];
    for r in levels {
        for g in levels {
            for b in levels {
                entries.push(0xff00_0000 | (r << 16) | (g << 8) | b);
            }
        }
    }
    Palette::color(&entries)
}

fn palette_for(format: Format) -> Option<Palette> {
    match format.ty() {
        Some(FormatType::Color) => Some(separated_palette()),
        Some(FormatType::Gray) => Some(Palette::gray_ramp()),
        _ => None,
    }
}

/// Formats whose every storage bit is a channel bit.
fn is_lossless(format: Format) -> bool {
    !format.is_indexed() && format.depth() == format.bpp()
}

#[test]
fn lossless_formats_round_trip_raw_bits() {
    let mut rng = StdRng::from_seed([1; 32]);

    for &format in Format::ALL.iter().filter(|f| is_lossless(**f)) {
        let codec = Codec::new(format).unwrap();
        let raw = random_row(&mut rng, format);
        let mut stored = vec![0; raw.len()];

        if format.is_wide() {
            let mut canonical = vec![0u64; PIXELS];
            codec.fetch_64(&raw, 0, &mut canonical, None);
            codec.store_64(&mut stored, 0, &canonical, None);
        } else {
            let mut canonical = vec![0u32; PIXELS];
            codec.fetch_32(&raw, 0, &mut canonical, None);
            codec.store_32(&mut stored, 0, &canonical, None);
        }

        assert_eq!(stored, raw, "{format:?}");
    }
}

#[test]
fn every_format_reaches_a_fixed_point_after_one_store() {
    let mut rng = StdRng::from_seed([2; 32]);

    for &format in Format::ALL {
        let codec = Codec::new(format).unwrap();
        let palette = palette_for(format);
        let palette = palette.as_ref();
        let raw = random_row(&mut rng, format);

        let mut first = vec![0u32; PIXELS];
        codec.fetch_32(&raw, 0, &mut first, palette);

        let mut stored = vec![0; raw.len()];
        codec.store_32(&mut stored, 0, &first, palette);
        let mut second = vec![0u32; PIXELS];
        codec.fetch_32(&stored, 0, &mut second, palette);

        codec.store_32(&mut stored, 0, &second, palette);
        let mut third = vec![0u32; PIXELS];
        codec.fetch_32(&stored, 0, &mut third, palette);

        assert_eq!(third, second, "{format:?}");
    }
}

#[test]
fn fetch_and_pixel_fetch_agree() {
    let mut rng = StdRng::from_seed([3; 32]);

    for &format in Format::ALL.iter().filter(|f| !f.is_indexed()) {
        let codec = Codec::new(format).unwrap();
        let raw = random_row(&mut rng, format);
        let mut row = vec![0u32; PIXELS];
        codec.fetch_32(&raw, 0, &mut row, None);

        for (x, &px) in row.iter().enumerate() {
            assert_eq!(codec.fetch_pixel_32(&raw, x, None), px, "{format:?} at {x}");
        }

        // Fetching from an offset sees the same pixels.
        let mut tail = vec![0u32; PIXELS - 3];
        codec.fetch_32(&raw, 3, &mut tail, None);
        assert_eq!(tail, row[3..], "{format:?}");
    }
}

#[test]
fn channels_replicate_into_canonical_precision() {
    let codec = Codec::new(Format::R5G6B5).unwrap();
    assert_eq!(codec.fetch_pixel_32(&[0xffff], 0, None), 0xffff_ffff);
    assert_eq!(codec.fetch_pixel_32(&[0xf800], 0, None), 0xffff_0000);

    let codec = Codec::new(Format::A1).unwrap();
    assert_eq!(codec.fetch_pixel_32(&[u32::MAX], 5, None), 0xff00_0000);
    assert_eq!(codec.fetch_pixel_32(&[0], 5, None), 0);

    let codec = Codec::new(Format::A2R10G10B10).unwrap();
    assert_eq!(codec.fetch_pixel_64(&[u32::MAX], 0, None), u64::MAX);
}

#[test]
fn padded_formats_read_opaque_and_store_zero_padding() {
    let codec = Codec::new(Format::X8R8G8B8).unwrap();
    assert_eq!(codec.fetch_pixel_32(&[0x0012_3456], 0, None), 0xff12_3456);

    let mut row = [u32::MAX];
    codec.store_32(&mut row, 0, &[0x8012_3456], None);
    assert_eq!(row[0], 0x0012_3456);
}

#[test]
fn unsupported_formats_are_rejected() {
    let bogus = Format::new(12, FormatType::Argb, 0, 4, 4, 4);
    assert_eq!(Codec::new(bogus).unwrap_err(), Error::UnsupportedFormat(bogus));
    assert!(matches!(
        Image::bits(bogus, 4, 4),
        Err(Error::UnsupportedFormat(_))
    ));
    assert!(Codec::new(Format::NULL).is_err());
    assert!(Codec::new(Format::SOLID).is_err());
}

#[test]
fn oversized_images_are_refused() {
    assert!(matches!(
        Image::bits(Format::A8R8G8B8, i32::MAX, i32::MAX),
        Err(Error::SizeOverflow { .. } | Error::AllocationFailed)
    ));
    assert!(matches!(
        Image::bits_with_data(Format::A8R8G8B8, 4, 4, vec![0; 15], 4),
        Err(Error::BufferTooSmall { needed: 16, actual: 15 })
    ));
    assert!(matches!(
        Image::bits_with_data(Format::A8R8G8B8, 4, 4, vec![0; 16], 3),
        Err(Error::BufferTooSmall { .. })
    ));
}

#[test]
fn gray_images_store_through_the_palette() {
    let mut dest = Image::bits(Format::G8, 3, 1).unwrap();
    dest.set_palette(Palette::gray_ramp()).unwrap();

    let src = argb_image(3, 1, &[0xff00_0000, 0xff80_8080, 0xffff_ffff]);
    composite_with(&get_chain(), Operator::Src, &src, None, &mut dest);

    assert_eq!(pixels(&dest), vec![0xff00_0000, 0xff80_8080, 0xffff_ffff]);
}

#[test]
fn conversion_between_formats_keeps_representable_colors() {
    // Colors with 5/6-bit exact channels survive a trip through 565.
    let colors = [0xff00_0000, 0xffff_ffff, 0xff84_8284, 0xff08_0400];
    for color in colors {
        let image = filled_image(Format::R5G6B5, 2, 2, color);
        assert_eq!(pixels(&image), vec![color; 4], "{color:08x}");
    }

    let image = filled_image(Format::A8, 2, 1, 0x7f10_2030);
    assert_eq!(pixels(&image), vec![0x7f00_0000; 2]);
}

#[test]
fn png_loading_premultiplies() {
    let rgba: [u8; 8] = [255, 0, 0, 128, 0, 0, 255, 255];
    let encoded = {
        let mut out = vec![];
        let mut encoder = png::Encoder::new(&mut out, 2, 1);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(&rgba).unwrap();
        writer.finish().unwrap();
        out
    };

    let image = Image::from_png(&encoded).unwrap();
    assert_eq!(image.format(), Some(Format::A8R8G8B8));
    assert_eq!(pixels(&image), vec![0x8080_0000, 0xff00_00ff]);

    // And back to straight alpha.
    assert_eq!(image.as_bits().unwrap().to_rgba8(), rgba);

    assert_eq!(Image::from_png(b"not a png").unwrap_err(), Error::InvalidPng);
}
