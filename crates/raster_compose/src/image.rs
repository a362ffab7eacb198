// Copyright 2024 the Piet Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compositing operands: raster images, solid fills and gradients.

use crate::bits;
use crate::codec::{self, Codec};
use crate::combine::Pixel;
use crate::error::Error;
use crate::format::Format;
use crate::gradient::{self, Color, ColorLut, Gradient, GradientKind, GradientStop, GradientWalker};
use crate::palette::Palette;
use crate::region::{IntRect, Region};
use crate::util::{Fixed, FIXED_ONE};
use peniko::kurbo::{Affine, Point};
use std::sync::Arc;

/// How samples outside the image (or outside `[0, 1]` for gradients) are produced.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Repeat {
    /// Transparent outside the image; gradients hold their boundary color.
    #[default]
    None,
    Normal,
    Pad,
    Reflect,
}

/// Sampling filter.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Filter {
    /// Cheapest available: nearest for rasters, the lookup table for gradients.
    Fast,
    Good,
    Best,
    #[default]
    Nearest,
    Bilinear,
    /// Weighted sum over the kernel given in the filter parameters.
    Convolution,
}

/// Whether an image's output is constant along one axis.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ImageClass {
    Unknown,
    /// Every row is the same.
    Horizontal,
    /// Every column is the same.
    Vertical,
}

/// A raster image used as the alpha channel of another image.
#[derive(Clone, Debug)]
pub struct AlphaMap {
    pub image: Image,
    pub x: i16,
    pub y: i16,
}

#[derive(Clone, Debug)]
pub(crate) struct Common {
    pub(crate) transform: Option<Affine>,
    pub(crate) repeat: Repeat,
    pub(crate) filter: Filter,
    pub(crate) filter_params: Arc<[Fixed]>,
    pub(crate) alpha_map: Option<AlphaMap>,
    pub(crate) component_alpha: bool,
    pub(crate) full_region: Region,
    pub(crate) clip_region: Region,
    pub(crate) has_client_clip: bool,
}

impl Common {
    fn new(full: IntRect) -> Self {
        let full_region = Region::from_rect(full);
        Self {
            transform: None,
            repeat: Repeat::None,
            filter: Filter::Nearest,
            filter_params: Arc::from([]),
            alpha_map: None,
            component_alpha: false,
            clip_region: full_region.clone(),
            full_region,
            has_client_clip: false,
        }
    }
}

/// Raster storage: a format, dimensions and packed rows of native words.
#[derive(Clone, Debug)]
pub struct BitsImage {
    format: Format,
    codec: Codec,
    width: i32,
    height: i32,
    /// Row stride in `u32` words.
    stride: usize,
    data: Vec<u32>,
    palette: Option<Arc<Palette>>,
}

impl BitsImage {
    pub fn format(&self) -> Format {
        self.format
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Row stride in `u32` words.
    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn data(&self) -> &[u32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u32] {
        &mut self.data
    }

    pub fn palette(&self) -> Option<&Palette> {
        self.palette.as_deref()
    }

    pub(crate) fn codec(&self) -> &Codec {
        &self.codec
    }

    pub(crate) fn row(&self, y: usize) -> &[u32] {
        &self.data[y * self.stride..(y + 1) * self.stride]
    }

    pub(crate) fn row_mut(&mut self, y: usize) -> &mut [u32] {
        &mut self.data[y * self.stride..(y + 1) * self.stride]
    }

    /// The `a8r8g8b8` value of one pixel, transparent outside the image.
    pub fn pixel_32(&self, x: i32, y: i32) -> u32 {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return 0;
        }
        self.codec
            .fetch_pixel_32(self.row(y as usize), x as usize, self.palette())
    }

    /// All pixels as non-premultiplied RGBA bytes, row by row.
    pub fn to_rgba8(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.width.max(0) as usize * self.height.max(0) as usize * 4);
        let mut row = vec![0u32; self.width.max(0) as usize];
        for y in 0..self.height.max(0) as usize {
            self.codec.fetch_32(self.row(y), 0, &mut row, self.palette());
            for &px in &row {
                let a = px >> 24;
                let unpremultiply = |c: u32| {
                    if a == 0 {
                        0
                    } else {
                        ((c * 255 + a / 2) / a).min(255) as u8
                    }
                };
                out.extend_from_slice(&[
                    unpremultiply((px >> 16) & 0xff),
                    unpremultiply((px >> 8) & 0xff),
                    unpremultiply(px & 0xff),
                    a as u8,
                ]);
            }
        }
        out
    }
}

/// A constant color plane.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SolidFill {
    color: Color,
}

impl SolidFill {
    /// The color as premultiplied `a8r8g8b8`.
    pub fn color(&self) -> u32 {
        self.color.to_argb32()
    }

    pub fn color_wide(&self) -> u64 {
        self.color.to_argb64()
    }
}

/// A gradient: its stop table and geometry.
#[derive(Clone, Debug)]
pub struct GradientImage {
    gradient: Gradient,
    kind: GradientKind,
}

impl GradientImage {
    pub fn gradient(&self) -> &Gradient {
        &self.gradient
    }

    pub fn kind(&self) -> &GradientKind {
        &self.kind
    }
}

#[derive(Clone, Debug)]
pub enum ImageKind {
    Bits(BitsImage),
    Solid(SolidFill),
    Gradient(GradientImage),
}

#[derive(Clone, Debug)]
struct Repr {
    common: Common,
    kind: ImageKind,
}

/// A shared handle to a compositing operand.
///
/// Cloning is cheap. Mutation through any handle copies the image first if other
/// handles still refer to it, so a mutation is never observed by another handle.
#[derive(Clone, Debug)]
pub struct Image(Arc<Repr>);

impl Image {
    fn from_parts(common: Common, kind: ImageKind) -> Self {
        Self(Arc::new(Repr { common, kind }))
    }

    fn unbounded() -> IntRect {
        IntRect::new(i32::MIN / 2, i32::MIN / 2, i32::MAX / 2, i32::MAX / 2)
    }

    /// A zero-initialized raster image.
    pub fn bits(format: Format, width: i32, height: i32) -> Result<Self, Error> {
        let stride = min_stride(format, width, height)?;
        let len = words(stride, width, height, format)?;

        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| Error::AllocationFailed)?;
        data.resize(len, 0);

        Self::bits_from_parts(format, width, height, data, stride)
    }

    /// A raster image over caller-provided rows of `stride` words each.
    pub fn bits_with_data(
        format: Format,
        width: i32,
        height: i32,
        data: Vec<u32>,
        stride: usize,
    ) -> Result<Self, Error> {
        let min = min_stride(format, width, height)?;
        if stride < min {
            return Err(Error::BufferTooSmall {
                needed: min,
                actual: stride,
            });
        }

        let needed = words(stride, width, height, format)?;
        if data.len() < needed {
            return Err(Error::BufferTooSmall {
                needed,
                actual: data.len(),
            });
        }

        Self::bits_from_parts(format, width, height, data, stride)
    }

    fn bits_from_parts(
        format: Format,
        width: i32,
        height: i32,
        data: Vec<u32>,
        stride: usize,
    ) -> Result<Self, Error> {
        let codec = Codec::new(format)?;
        let common = Common::new(IntRect::new(0, 0, width, height));
        Ok(Self::from_parts(
            common,
            ImageKind::Bits(BitsImage {
                format,
                codec,
                width,
                height,
                stride,
                data,
                palette: None,
            }),
        ))
    }

    /// Decode a PNG into an `a8r8g8b8` image, premultiplying on load.
    #[cfg(feature = "png")]
    pub fn from_png(data: &[u8]) -> Result<Self, Error> {
        use zune_png::zune_core::options::DecoderOptions;

        let options = DecoderOptions::new_cmd()
            .png_set_add_alpha_channel(true)
            .png_set_strip_to_8bit(true);
        let mut decoder = zune_png::PngDecoder::new_with_options(data, options);
        decoder.decode_headers().map_err(|_| Error::InvalidPng)?;

        let (width, height) = decoder.get_dimensions().ok_or(Error::InvalidPng)?;
        let decoded = decoder
            .decode()
            .map_err(|_| Error::InvalidPng)?
            .u8()
            .ok_or(Error::InvalidPng)?;

        let width = i32::try_from(width).map_err(|_| Error::InvalidPng)?;
        let height = i32::try_from(height).map_err(|_| Error::InvalidPng)?;

        let pixels = decoded
            .chunks_exact(4)
            .map(|rgba| {
                let [r, g, b, a] = [rgba[0], rgba[1], rgba[2], rgba[3]].map(u32::from);
                let premul = |c: u32| crate::util::scalar::mul_un8(c, a);
                (a << 24) | (premul(r) << 16) | (premul(g) << 8) | premul(b)
            })
            .collect();

        Self::bits_with_data(Format::A8R8G8B8, width, height, pixels, width as usize)
    }

    pub fn solid(color: impl Into<Color>) -> Self {
        let mut color = color.into();
        if !color.is_premultiplied() {
            log::warn!("solid color {color:?} is not premultiplied, clamping");
            color = Color::new(
                color.red.min(color.alpha),
                color.green.min(color.alpha),
                color.blue.min(color.alpha),
                color.alpha,
            );
        }
        Self::from_parts(
            Common::new(Self::unbounded()),
            ImageKind::Solid(SolidFill { color }),
        )
    }

    pub fn linear_gradient(p1: Point, p2: Point, stops: &[GradientStop]) -> Result<Self, Error> {
        Self::gradient(GradientKind::Linear { p1, p2 }, stops)
    }

    pub fn radial_gradient(
        c1: Point,
        r1: f64,
        c2: Point,
        r2: f64,
        stops: &[GradientStop],
    ) -> Result<Self, Error> {
        Self::gradient(GradientKind::Radial { c1, r1, c2, r2 }, stops)
    }

    /// A conical gradient around `center`, starting at `angle` radians.
    pub fn conical_gradient(center: Point, angle: f64, stops: &[GradientStop]) -> Result<Self, Error> {
        Self::gradient(GradientKind::Conical { center, angle }, stops)
    }

    fn gradient(kind: GradientKind, stops: &[GradientStop]) -> Result<Self, Error> {
        let gradient = Gradient::new(stops)?;
        Ok(Self::from_parts(
            Common::new(Self::unbounded()),
            ImageKind::Gradient(GradientImage { gradient, kind }),
        ))
    }

    pub fn kind(&self) -> &ImageKind {
        &self.0.kind
    }

    pub fn as_bits(&self) -> Option<&BitsImage> {
        match &self.0.kind {
            ImageKind::Bits(bits) => Some(bits),
            _ => None,
        }
    }

    /// Mutable access to the raster storage, copying it first if it is shared.
    pub fn as_bits_mut(&mut self) -> Option<&mut BitsImage> {
        match &mut Arc::make_mut(&mut self.0).kind {
            ImageKind::Bits(bits) => Some(bits),
            _ => None,
        }
    }

    pub fn format(&self) -> Option<Format> {
        self.as_bits().map(|b| b.format)
    }

    pub fn width(&self) -> i32 {
        self.as_bits().map_or(0, |b| b.width)
    }

    pub fn height(&self) -> i32 {
        self.as_bits().map_or(0, |b| b.height)
    }

    pub fn transform(&self) -> Option<Affine> {
        self.0.common.transform
    }

    pub fn repeat(&self) -> Repeat {
        self.0.common.repeat
    }

    pub fn filter(&self) -> Filter {
        self.0.common.filter
    }

    pub fn filter_params(&self) -> &[Fixed] {
        &self.0.common.filter_params
    }

    pub fn alpha_map(&self) -> Option<&AlphaMap> {
        self.0.common.alpha_map.as_ref()
    }

    pub fn component_alpha(&self) -> bool {
        self.0.common.component_alpha
    }

    /// The region reads from this image are limited to.
    pub fn clip_region(&self) -> &Region {
        &self.0.common.clip_region
    }

    pub fn has_client_clip(&self) -> bool {
        self.0.common.has_client_clip
    }

    fn common_mut(&mut self) -> &mut Common {
        &mut Arc::make_mut(&mut self.0).common
    }

    /// Invalidate state derived from the image properties.
    fn property_changed(&mut self) {
        if let ImageKind::Gradient(g) = &mut Arc::make_mut(&mut self.0).kind {
            g.gradient.invalidate();
        }
    }

    /// Set the transform from destination space to image space. The identity is
    /// stored as no transform.
    pub fn set_transform(&mut self, transform: Option<Affine>) {
        self.common_mut().transform = transform.filter(|t| *t != Affine::IDENTITY);
        self.property_changed();
    }

    pub fn set_repeat(&mut self, repeat: Repeat) {
        self.common_mut().repeat = repeat;
        self.property_changed();
    }

    /// Set the sampling filter. [`Filter::Convolution`] takes `[width, height, k...]`
    /// in 16.16 fixed point with `width * height` kernel entries; other filters take none.
    pub fn set_filter(&mut self, filter: Filter, params: &[Fixed]) -> Result<(), Error> {
        if filter == Filter::Convolution {
            let [w, h, kernel @ ..] = params else {
                return Err(Error::InvalidFilterParams);
            };
            let (w, h) = (w >> 16, h >> 16);
            if w <= 0 || h <= 0 || (w as i64) * (h as i64) != kernel.len() as i64 {
                return Err(Error::InvalidFilterParams);
            }
        }

        let common = self.common_mut();
        common.filter = filter;
        common.filter_params = Arc::from(params);
        self.property_changed();
        Ok(())
    }

    /// Use `alpha_map`'s alpha channel, offset by `(x, y)`, in place of this image's.
    pub fn set_alpha_map(&mut self, alpha_map: Option<&Image>, x: i16, y: i16) -> Result<(), Error> {
        let alpha_map = match alpha_map {
            Some(image) if image.as_bits().is_none() => return Err(Error::NotBits),
            Some(image) => Some(AlphaMap {
                image: image.clone(),
                x,
                y,
            }),
            None => None,
        };

        self.common_mut().alpha_map = alpha_map;
        self.property_changed();
        Ok(())
    }

    pub fn set_component_alpha(&mut self, component_alpha: bool) {
        self.common_mut().component_alpha = component_alpha;
        self.property_changed();
    }

    /// Restrict reads and writes to `region`. `None` restores the full image.
    pub fn set_clip_region(&mut self, region: Option<&Region>) {
        let common = self.common_mut();
        match region {
            Some(region) => {
                common.clip_region = region.intersect(&common.full_region);
                common.has_client_clip = true;
            }
            None => {
                common.clip_region = common.full_region.clone();
                common.has_client_clip = false;
            }
        }
        self.property_changed();
    }

    /// Attach the palette consulted by indexed and gray formats.
    pub fn set_palette(&mut self, palette: Palette) -> Result<(), Error> {
        let bits = self.as_bits_mut().ok_or(Error::NotBits)?;
        bits.palette = Some(Arc::new(palette));
        self.property_changed();
        Ok(())
    }

    /// Whether the output is constant along one axis.
    pub fn classify(&self) -> ImageClass {
        match &self.0.kind {
            ImageKind::Solid(_) => ImageClass::Horizontal,
            ImageKind::Bits(_) => ImageClass::Unknown,
            ImageKind::Gradient(g) => g.kind.classify(self.0.common.transform),
        }
    }

    /// Whether this image samples the same opaque-or-not color everywhere: a solid fill,
    /// or a 1x1 raster that repeats.
    pub(crate) fn is_solid(&self) -> bool {
        match &self.0.kind {
            ImageKind::Solid(_) => true,
            ImageKind::Bits(bits) => {
                bits.width == 1
                    && bits.height == 1
                    && self.0.common.repeat == Repeat::Normal
                    && self.0.common.transform.is_none()
                    && self.0.common.alpha_map.is_none()
            }
            ImageKind::Gradient(_) => false,
        }
    }

    /// Whether sampling needs the wide canonical precision.
    pub(crate) fn is_wide(&self) -> bool {
        match &self.0.kind {
            ImageKind::Bits(bits) => {
                bits.format.is_wide()
                    || self
                        .alpha_map()
                        .and_then(|am| am.image.format())
                        .is_some_and(|f| f.is_wide())
            }
            ImageKind::Solid(_) => false,
            ImageKind::Gradient(_) => true,
        }
    }

    /// Produce `out.len()` canonical pixels of row `y` starting at column `x`.
    ///
    /// When `mask` is given, pixels whose mask is zero (in alpha, or in every channel
    /// with component alpha) may be left as zero.
    pub(crate) fn get_scanline<P: Sample>(
        &self,
        x: i32,
        y: i32,
        out: &mut [P],
        mask: Option<&[P]>,
        component_alpha: bool,
    ) {
        match &self.0.kind {
            ImageKind::Solid(solid) => out.fill(P::solid(solid)),
            ImageKind::Bits(b) => {
                bits::get_scanline(&self.0.common, b, x, y, out, mask, component_alpha)
            }
            ImageKind::Gradient(g) => {
                self.gradient_scanline(g, x, y, out, mask, component_alpha)
            }
        }
    }

    /// Read row `y` from column `x` as stored, for blending into.
    pub(crate) fn fetch_dest<P: Sample>(&self, x: i32, y: i32, out: &mut [P]) {
        match &self.0.kind {
            ImageKind::Bits(b) => bits::fetch_dest(&self.0.common, b, x, y, out),
            _ => out.fill(P::default()),
        }
    }

    fn gradient_scanline<P: Sample>(
        &self,
        g: &GradientImage,
        x: i32,
        y: i32,
        out: &mut [P],
        mask: Option<&[P]>,
        component_alpha: bool,
    ) {
        let common = &self.0.common;
        let transform = common.transform.unwrap_or(Affine::IDENTITY);
        let repeat = common.repeat;
        let lut = (common.filter == Filter::Fast)
            .then(|| g.gradient.lut(repeat))
            .flatten();
        let mut walker = g.gradient.walker(repeat);

        for (i, px) in out.iter_mut().enumerate() {
            if let Some(mask) = mask {
                if !mask[i].covers(component_alpha) {
                    *px = P::default();
                    continue;
                }
            }

            let p = transform * Point::new(f64::from(x) + i as f64 + 0.5, f64::from(y) + 0.5);
            *px = match g.kind.position(p, repeat) {
                None => P::default(),
                Some(t) => {
                    let pos = gradient::to_fixed(t);
                    match lut {
                        Some(lut) => P::lut(lut, pos),
                        None => P::walk(&mut walker, pos),
                    }
                }
            };
        }
    }

    /// Write `values` into row `y` starting at column `x`, clipped to the image.
    pub(crate) fn store_scanline<P: Sample>(&mut self, x: i32, y: i32, values: &[P]) {
        let repr = Arc::make_mut(&mut self.0);
        let ImageKind::Bits(bits) = &mut repr.kind else {
            log::error!("store into a non-raster image");
            return;
        };

        let Some((x, values)) = clip_span(x, y, values, bits.width, bits.height) else {
            return;
        };
        let palette = bits.palette.clone();
        let codec = bits.codec;
        P::store_row(&codec, bits.row_mut(y as usize), x, values, palette.as_deref());

        if let Some(am) = &mut repr.common.alpha_map {
            let (ax, ay) = (x as i32 - i32::from(am.x), y - i32::from(am.y));
            am.image.store_alpha(ax, ay, values);
        }
    }

    fn store_alpha<P: Sample>(&mut self, x: i32, y: i32, values: &[P]) {
        let Some(bits) = self.as_bits_mut() else {
            return;
        };
        let Some((x, values)) = clip_span(x, y, values, bits.width, bits.height) else {
            return;
        };

        let alpha: Vec<P> = values
            .iter()
            .map(|v| P::pack([v.alpha(), 0, 0, 0]))
            .collect();
        let palette = bits.palette.clone();
        let codec = bits.codec;
        P::store_row(&codec, bits.row_mut(y as usize), x, &alpha, palette.as_deref());
    }
}

/// Clip a span to `[0, width) x [0, height)`, returning the first column and the
/// covered values.
fn clip_span<P>(x: i32, y: i32, values: &[P], width: i32, height: i32) -> Option<(usize, &[P])> {
    if y < 0 || y >= height {
        return None;
    }

    let start = (-i64::from(x)).clamp(0, values.len() as i64) as usize;
    let x0 = i64::from(x) + start as i64;
    let end = (i64::from(width) - i64::from(x)).clamp(start as i64, values.len() as i64) as usize;
    if start >= end {
        return None;
    }

    if start != 0 || end != values.len() {
        log::error!("scanline store at ({x}, {y}) exceeds the image bounds");
    }
    Some((x0 as usize, &values[start..end]))
}

/// Smallest stride in words holding `width` pixels of `format`.
fn min_stride(format: Format, width: i32, height: i32) -> Result<usize, Error> {
    let overflow = Error::SizeOverflow {
        width,
        height,
        bpp: format.bpp(),
    };
    if width < 0 || height < 0 {
        return Err(overflow);
    }

    let bits = (width as u64)
        .checked_mul(u64::from(format.bpp()))
        .ok_or(overflow.clone())?;
    usize::try_from(bits.div_ceil(32)).map_err(|_| overflow)
}

fn words(stride: usize, width: i32, height: i32, format: Format) -> Result<usize, Error> {
    stride
        .checked_mul(height as usize)
        .filter(|w| w.checked_mul(4).is_some_and(|bytes| bytes <= isize::MAX as usize))
        .ok_or(Error::SizeOverflow {
            width,
            height,
            bpp: format.bpp(),
        })
}

/// Canonical precisions the sampling code is generic over.
pub(crate) trait Sample: Pixel {
    fn solid(solid: &SolidFill) -> Self;
    fn walk(walker: &mut GradientWalker<'_>, pos: i64) -> Self;
    fn lut(lut: &ColorLut, pos: i64) -> Self;
    fn fetch_row(codec: &Codec, row: &[u32], x: usize, out: &mut [Self], palette: Option<&Palette>);
    fn fetch_pixel(codec: &Codec, row: &[u32], x: usize, palette: Option<&Palette>) -> Self;
    fn store_row(codec: &Codec, row: &mut [u32], x: usize, values: &[Self], palette: Option<&Palette>);

    /// Whether a mask pixel lets any of the source through.
    #[inline]
    fn covers(self, component_alpha: bool) -> bool {
        if component_alpha {
            self != Self::default()
        } else {
            self.alpha() != 0
        }
    }
}

impl Sample for u32 {
    fn solid(solid: &SolidFill) -> Self {
        solid.color()
    }

    fn walk(walker: &mut GradientWalker<'_>, pos: i64) -> Self {
        walker.pixel(pos)
    }

    fn lut(lut: &ColorLut, pos: i64) -> Self {
        lut.lookup(pos)
    }

    fn fetch_row(codec: &Codec, row: &[u32], x: usize, out: &mut [Self], palette: Option<&Palette>) {
        codec.fetch_32(row, x, out, palette);
    }

    fn fetch_pixel(codec: &Codec, row: &[u32], x: usize, palette: Option<&Palette>) -> Self {
        codec.fetch_pixel_32(row, x, palette)
    }

    fn store_row(codec: &Codec, row: &mut [u32], x: usize, values: &[Self], palette: Option<&Palette>) {
        codec.store_32(row, x, values, palette);
    }
}

impl Sample for u64 {
    fn solid(solid: &SolidFill) -> Self {
        solid.color_wide()
    }

    fn walk(walker: &mut GradientWalker<'_>, pos: i64) -> Self {
        walker.pixel_wide(pos)
    }

    fn lut(lut: &ColorLut, pos: i64) -> Self {
        codec::expand_pixel(lut.lookup(pos))
    }

    fn fetch_row(codec: &Codec, row: &[u32], x: usize, out: &mut [Self], palette: Option<&Palette>) {
        codec.fetch_64(row, x, out, palette);
    }

    fn fetch_pixel(codec: &Codec, row: &[u32], x: usize, palette: Option<&Palette>) -> Self {
        codec.fetch_pixel_64(row, x, palette)
    }

    fn store_row(codec: &Codec, row: &mut [u32], x: usize, values: &[Self], palette: Option<&Palette>) {
        codec.store_64(row, x, values, palette);
    }
}

/// Convert an `f64` pixel coordinate to 16.16 fixed point, saturating.
pub(crate) fn coord_to_fixed(v: f64) -> i64 {
    if v.is_nan() {
        return 0;
    }
    let limit = (1i64 << 46) as f64;
    (v * f64::from(FIXED_ONE)).floor().clamp(-limit, limit) as i64
}
