// Copyright 2024 the Piet Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The ordered chain of compositing backends.
//!
//! A request walks the chain from the most specialized backend to the general one and
//! runs the first fast path whose operator, formats and flags match. The general
//! backend matches everything, so every request is served. Backends are a pure
//! performance layer: each produces exactly the bytes the general loop would.

use crate::codec;
use crate::combine::Combiners;
use crate::fast_path;
use crate::format::Format;
use crate::general::{self, CompositeInfo};
use crate::gradient::Color;
use crate::image::{BitsImage, Filter, Image};
use crate::operator::Operator;
use crate::region::IntRect;
use bitflags::bitflags;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
/// The execution mode used to pick the backends of a chain.
pub enum ExecutionMode {
    /// Only use scalar backends. This is recommended if you want to have consistent
    /// performance across different platforms and want to avoid unsafe code, and is
    /// the only option if you disabled the `simd` feature. Results are the same in
    /// every mode.
    Scalar,
    /// Select the best backend according to what is available on the host system.
    #[cfg(feature = "simd")]
    Auto,
    /// Force the usage of neon SIMD instructions. This will lead to panics in case
    /// the CPU doesn't support neon.
    #[cfg(all(target_arch = "aarch64", feature = "simd"))]
    Neon,
    #[cfg(all(target_arch = "x86_64", feature = "simd"))]
    Avx2,
}

#[cfg(feature = "simd")]
impl Default for ExecutionMode {
    fn default() -> Self {
        Self::Auto
    }
}

#[cfg(not(feature = "simd"))]
impl Default for ExecutionMode {
    fn default() -> Self {
        Self::Scalar
    }
}

bitflags! {
    /// Properties of a request that a fast path must declare to be chosen.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct NeedFlags: u32 {
        /// The mask has component alpha.
        const COMPONENT_ALPHA = 1 << 0;
        /// The source is opaque everywhere it is sampled.
        const OPAQUE_SOURCE = 1 << 1;
    }
}

/// The format an operand must have for a fast path to match.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PathFormat {
    /// Matches every operand, including ones no fast path can read directly.
    Any,
    /// Matches exactly this format. [`Format::NULL`] stands for an absent mask and
    /// [`Format::SOLID`] for a constant operand.
    Is(Format),
}

impl PathFormat {
    fn matches(self, actual: Option<Format>) -> bool {
        match self {
            Self::Any => true,
            Self::Is(format) => actual == Some(format),
        }
    }
}

impl From<Format> for PathFormat {
    fn from(format: Format) -> Self {
        Self::Is(format)
    }
}

/// Composite one box of a request into `dest`.
pub type CompositeFn = fn(&Combiners, &CompositeInfo<'_>, &mut Image);

/// Copy a block of raw pixels between two rasters. Returns `false` if the backend
/// cannot handle the pair of formats.
pub type BltFn = fn(&BitsImage, &mut BitsImage, [i32; 2], [i32; 2], [i32; 2]) -> bool;

/// Fill a block of a raster with a raw pixel value. Returns `false` if the backend
/// cannot handle the format.
pub type FillFn = fn(&mut BitsImage, IntRect, u32) -> bool;

/// One entry of a backend's dispatch table.
#[derive(Copy, Clone)]
pub struct FastPath {
    /// `None` matches every operator.
    pub op: Option<Operator>,
    pub src: PathFormat,
    pub mask: PathFormat,
    pub dest: PathFormat,
    pub needs: NeedFlags,
    pub func: CompositeFn,
}

impl FastPath {
    fn matches(
        &self,
        op: Operator,
        formats: [Option<Format>; 3],
        flags: NeedFlags,
    ) -> bool {
        let [src, mask, dest] = formats;
        // A component alpha mask is only handed to a path that declares it, or that
        // takes any mask.
        let ca_ok = !flags.contains(NeedFlags::COMPONENT_ALPHA)
            || self.needs.contains(NeedFlags::COMPONENT_ALPHA)
            || self.mask == PathFormat::Any;

        self.op.map_or(true, |o| o == op)
            && self.src.matches(src)
            && self.mask.matches(mask)
            && self.dest.matches(dest)
            && flags.contains(self.needs)
            && ca_ok
    }
}

impl std::fmt::Debug for FastPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastPath")
            .field("op", &self.op)
            .field("src", &self.src)
            .field("mask", &self.mask)
            .field("dest", &self.dest)
            .field("needs", &self.needs)
            .finish_non_exhaustive()
    }
}

/// One backend: its fast paths, its combiners and optional raw blt and fill.
#[derive(Debug)]
pub struct Implementation {
    name: &'static str,
    fast_paths: Vec<FastPath>,
    pub(crate) combiners: Combiners,
    blt: Option<BltFn>,
    fill: Option<FillFn>,
}

impl Implementation {
    /// The backend that serves every request through the generic loop.
    pub fn general() -> Self {
        Self {
            name: "general",
            fast_paths: vec![FastPath {
                op: None,
                src: PathFormat::Any,
                mask: PathFormat::Any,
                dest: PathFormat::Any,
                needs: NeedFlags::empty(),
                func: general::composite_general,
            }],
            combiners: Combiners::general(),
            blt: Some(general_blt),
            fill: Some(general_fill),
        }
    }

    /// An empty backend that inherits the combiners of `delegate`.
    pub fn new(name: &'static str, delegate: &Implementation) -> Self {
        Self {
            name,
            fast_paths: Vec::new(),
            combiners: delegate.combiners,
            blt: None,
            fill: None,
        }
    }

    pub fn with_fast_paths(mut self, fast_paths: &[FastPath]) -> Self {
        self.fast_paths.extend_from_slice(fast_paths);
        self
    }

    pub fn with_blt(mut self, blt: BltFn) -> Self {
        self.blt = Some(blt);
        self
    }

    pub fn with_fill(mut self, fill: FillFn) -> Self {
        self.fill = Some(fill);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn fast_paths(&self) -> &[FastPath] {
        &self.fast_paths
    }

    pub fn combiners(&self) -> &Combiners {
        &self.combiners
    }

    fn lookup(
        &self,
        op: Operator,
        formats: [Option<Format>; 3],
        flags: NeedFlags,
    ) -> Option<&FastPath> {
        self.fast_paths
            .iter()
            .find(|path| path.matches(op, formats, flags))
    }
}

macro_rules! avx2 {
    ($e:expr) => {
        #[cfg(all(target_arch = "x86_64", feature = "simd"))]
        if std::arch::is_x86_feature_detected!("avx2") {
            return $e;
        }
    };
}

macro_rules! neon {
    ($e:expr) => {
        #[cfg(all(target_arch = "aarch64", feature = "simd"))]
        if std::arch::is_aarch64_feature_detected!("neon") {
            return $e;
        }
    };
}

type BackendConstructor = fn(&Implementation) -> Implementation;

/// NOTE: BE CAREFUL WHEN CHANGING THIS METHOD! A SIMD backend may only be chosen when
/// the CPU actually supports it. Unsafe code relies on the correctness of this method!
fn select_simd_backend(execution_mode: ExecutionMode) -> Option<BackendConstructor> {
    match execution_mode {
        ExecutionMode::Scalar => None,
        #[cfg(feature = "simd")]
        ExecutionMode::Auto => {
            neon!(Some(crate::simd::neon::implementation as BackendConstructor));
            avx2!(Some(crate::simd::avx2::implementation as BackendConstructor));

            // Fallback.
            None
        }
        #[cfg(all(target_arch = "aarch64", feature = "simd"))]
        ExecutionMode::Neon => {
            neon!(Some(crate::simd::neon::implementation as BackendConstructor));

            panic!(
                "attempted to force execution mode NEON, but CPU doesn't support NEON instructions"
            );
        }
        #[cfg(all(target_arch = "x86_64", feature = "simd"))]
        ExecutionMode::Avx2 => {
            avx2!(Some(crate::simd::avx2::implementation as BackendConstructor));

            panic!(
                "attempted to force execution mode AVX2, but CPU doesn't support AVX2 instructions"
            );
        }
    }
}

/// Backends ordered from most specialized to the general one.
#[derive(Debug)]
pub struct ImplementationChain {
    implementations: Vec<Implementation>,
}

impl Default for ImplementationChain {
    fn default() -> Self {
        Self::new(ExecutionMode::default())
    }
}

impl ImplementationChain {
    /// Build the chain for `execution_mode`: a SIMD backend if one is selected, the
    /// generic fast paths, then the general backend.
    ///
    /// Panics when forcing an execution mode the current CPU does not support.
    pub fn new(execution_mode: ExecutionMode) -> Self {
        let general = Implementation::general();
        let fast = fast_path::implementation(&general);
        let simd = select_simd_backend(execution_mode).map(|backend| backend(&fast));

        let implementations: Vec<_> = simd.into_iter().chain([fast, general]).collect();
        log::debug!(
            "implementation chain for {execution_mode:?}: {:?}",
            implementations.iter().map(|i| i.name).collect::<Vec<_>>()
        );

        Self { implementations }
    }

    /// A chain holding only the general backend.
    pub fn general_only() -> Self {
        Self {
            implementations: vec![Implementation::general()],
        }
    }

    pub fn implementations(&self) -> &[Implementation] {
        &self.implementations
    }

    /// The combiners of the first backend, which every composite blends with.
    pub fn combiners(&self) -> &Combiners {
        &self.implementations[0].combiners
    }

    /// The name of the backend and the fast path that would serve `info`.
    pub fn resolve(&self, info: &CompositeInfo<'_>, dest: &Image) -> Option<(&'static str, FastPath)> {
        let region = general::compute_composite_region(info, dest);
        if region.is_empty() {
            return None;
        }
        self.lookup(info, dest, &region.extents())
    }

    fn lookup(
        &self,
        info: &CompositeInfo<'_>,
        dest: &Image,
        extents: &IntRect,
    ) -> Option<(&'static str, FastPath)> {
        let (dx, dy) = (info.dest_x, info.dest_y);
        let formats = [
            operand_format(
                info.src,
                info.src_x.saturating_sub(dx),
                info.src_y.saturating_sub(dy),
                extents,
            ),
            match info.mask {
                None => Some(Format::NULL),
                Some(mask) => operand_format(
                    mask,
                    info.mask_x.saturating_sub(dx),
                    info.mask_y.saturating_sub(dy),
                    extents,
                ),
            },
            dest.alpha_map().is_none().then(|| dest.format()).flatten(),
        ];
        let flags = request_flags(info);

        let hit = self.implementations.iter().find_map(|imp| {
            imp.lookup(info.op, formats, flags)
                .map(|path| (imp.name, *path))
        });

        match &hit {
            Some((name, path)) if path.src != PathFormat::Any => {
                log::trace!("{name} fast path {path:?} serves {:?} {formats:?}", info.op);
            }
            _ => log::trace!("no fast path for {:?} {formats:?} {flags:?}", info.op),
        }
        hit
    }

    /// Composite `info` into `dest`.
    ///
    /// `dest` must be a raster image. Violations are reported through the log and
    /// leave `dest` untouched.
    pub fn composite(&self, info: &CompositeInfo<'_>, dest: &mut Image) {
        if dest.as_bits().is_none() {
            log::error!("composite destination is not a raster image");
            debug_assert!(false, "composite destination is not a raster image");
            return;
        }
        if info.width <= 0 || info.height <= 0 {
            return;
        }

        let region = general::compute_composite_region(info, dest);
        if region.is_empty() {
            return;
        }

        let func = self
            .lookup(info, dest, &region.extents())
            .map_or(general::composite_general as CompositeFn, |(_, path)| path.func);
        let combiners = self.combiners();
        general::walk_composite_region(info, &region, |sub| func(combiners, sub, dest));
    }

    /// Copy a `width x height` block of raw pixels from `src` at `(src_x, src_y)` to
    /// `dest` at `(dest_x, dest_y)`.
    ///
    /// Returns `false` if either image is not a raster, the block is not inside both
    /// images, or no backend can copy between the two formats.
    #[allow(clippy::too_many_arguments)]
    pub fn blt(
        &self,
        src: &Image,
        dest: &mut Image,
        src_x: i32,
        src_y: i32,
        dest_x: i32,
        dest_y: i32,
        width: i32,
        height: i32,
    ) -> bool {
        let Some(src) = src.as_bits() else {
            return false;
        };
        if !block_inside(src, IntRect::from_origin_size(src_x, src_y, width.max(0) as u32, height.max(0) as u32)) {
            return false;
        }
        let Some(dest) = dest.as_bits_mut() else {
            return false;
        };
        let dest_rect =
            IntRect::from_origin_size(dest_x, dest_y, width.max(0) as u32, height.max(0) as u32);
        if !block_inside(dest, dest_rect) {
            return false;
        }

        self.implementations
            .iter()
            .filter_map(|imp| imp.blt)
            .any(|blt| blt(src, dest, [src_x, src_y], [dest_x, dest_y], [width, height]))
    }

    /// Fill `rect` of `dest` with the raw pixel value `filler`.
    ///
    /// Returns `false` if `dest` is not a raster or `rect` is not inside it.
    pub fn fill(&self, dest: &mut Image, rect: IntRect, filler: u32) -> bool {
        let Some(dest) = dest.as_bits_mut() else {
            return false;
        };
        if !block_inside(dest, rect) {
            return false;
        }

        self.implementations
            .iter()
            .filter_map(|imp| imp.fill)
            .any(|fill| fill(dest, rect, filler))
    }

    /// Composite `color` onto each of `rects` with `op`.
    ///
    /// Clearing, sources and opaque overs of a plain raster are raw fills.
    pub fn fill_rectangles(&self, op: Operator, dest: &mut Image, color: Color, rects: &[IntRect]) {
        let (op, color) = match op {
            Operator::Clear => (Operator::Src, Color::default()),
            Operator::Over if color.alpha == 0xffff => (Operator::Src, color),
            _ => (op, color),
        };

        if op == Operator::Src && dest.alpha_map().is_none() && !dest.has_client_clip() {
            let raw = dest.as_bits().map(|bits| {
                let color = color.clamped();
                let filler = if bits.format().is_wide() {
                    bits.codec().encode_64(color.to_argb64(), bits.palette())
                } else {
                    bits.codec().encode_32(color.to_argb32(), bits.palette())
                };
                (filler, IntRect::new(0, 0, bits.width(), bits.height()))
            });
            if let Some((filler, full)) = raw {
                for rect in rects {
                    let rect = rect.intersect(&full);
                    if !rect.is_empty() {
                        self.fill(dest, rect, filler);
                    }
                }
                return;
            }
        }

        let solid = Image::solid(color);
        for rect in rects.iter().filter(|r| !r.is_empty()) {
            let info = CompositeInfo {
                op,
                src: &solid,
                mask: None,
                src_x: 0,
                src_y: 0,
                mask_x: 0,
                mask_y: 0,
                dest_x: rect.x0,
                dest_y: rect.y0,
                width: rect.width(),
                height: rect.height(),
            };
            self.composite(&info, dest);
        }
    }
}

/// The format a fast path sees for an operand sampled over `extents` shifted by
/// `(dx, dy)`, or `None` if only the generic loop can sample it.
fn operand_format(image: &Image, dx: i32, dy: i32, extents: &IntRect) -> Option<Format> {
    if image.is_solid()
        && image
            .as_bits()
            .map_or(true, |b| codec::solid_color(image, b.format()).is_ok())
    {
        return Some(Format::SOLID);
    }

    let bits = image.as_bits()?;
    if image.transform().is_some()
        || image.alpha_map().is_some()
        || image.filter() == Filter::Convolution
    {
        return None;
    }

    let sampled = IntRect::new(
        extents.x0.saturating_add(dx),
        extents.y0.saturating_add(dy),
        extents.x1.saturating_add(dx),
        extents.y1.saturating_add(dy),
    );
    let inside = sampled.x0 >= 0
        && sampled.y0 >= 0
        && sampled.x1 <= bits.width()
        && sampled.y1 <= bits.height();
    inside.then(|| bits.format())
}

fn request_flags(info: &CompositeInfo<'_>) -> NeedFlags {
    let mut flags = NeedFlags::empty();
    if info.mask.is_some_and(|m| m.component_alpha()) {
        flags |= NeedFlags::COMPONENT_ALPHA;
    }

    let opaque = if info.src.is_solid() {
        codec::solid_color(info.src, Format::A8R8G8B8).is_ok_and(|c| c >> 24 == 0xff)
    } else {
        info.src.alpha_map().is_none() && info.src.format().is_some_and(|f| !f.has_alpha())
    };
    if opaque {
        flags |= NeedFlags::OPAQUE_SOURCE;
    }
    flags
}

fn block_inside(bits: &BitsImage, rect: IntRect) -> bool {
    rect.x0 >= 0
        && rect.y0 >= 0
        && rect.x1 <= bits.width()
        && rect.y1 <= bits.height()
}

/// Pixel by pixel copy between formats of equal depth.
fn general_blt(
    src: &BitsImage,
    dest: &mut BitsImage,
    [src_x, src_y]: [i32; 2],
    [dest_x, dest_y]: [i32; 2],
    [width, height]: [i32; 2],
) -> bool {
    if src.format().bpp() != dest.format().bpp() {
        return false;
    }

    let (src_codec, dest_codec) = (*src.codec(), *dest.codec());
    for j in 0..height.max(0) {
        let src_row = src.row((src_y + j) as usize);
        let dest_row = dest.row_mut((dest_y + j) as usize);
        for i in 0..width.max(0) {
            let raw = src_codec.read_raw(src_row, (src_x + i) as usize);
            dest_codec.write_raw(dest_row, (dest_x + i) as usize, raw);
        }
    }
    true
}

fn general_fill(dest: &mut BitsImage, rect: IntRect, filler: u32) -> bool {
    let codec = *dest.codec();
    for y in rect.y0..rect.y1 {
        let row = dest.row_mut(y as usize);
        for x in rect.x0..rect.x1 {
            codec.write_raw(row, x as usize, filler);
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(op: Operator, src: &'a Image, mask: Option<&'a Image>) -> CompositeInfo<'a> {
        CompositeInfo {
            op,
            src,
            mask,
            src_x: 0,
            src_y: 0,
            mask_x: 0,
            mask_y: 0,
            dest_x: 0,
            dest_y: 0,
            width: 4,
            height: 4,
        }
    }

    #[test]
    fn general_chain_serves_everything() {
        let chain = ImplementationChain::general_only();
        let src = Image::bits(Format::A8R8G8B8, 4, 4).unwrap();
        let dest = Image::bits(Format::R5G6B5, 4, 4).unwrap();
        let (name, path) = chain.resolve(&request(Operator::Xor, &src, None), &dest).unwrap();
        assert_eq!(name, "general");
        assert_eq!(path.src, PathFormat::Any);
    }

    #[test]
    fn solid_over_a8_picks_a_fast_path() {
        let chain = ImplementationChain::new(ExecutionMode::Scalar);
        let src = Image::solid(Color::from_argb32(0x8000_0080));
        let mask = Image::bits(Format::A8, 4, 4).unwrap();
        let dest = Image::bits(Format::A8R8G8B8, 4, 4).unwrap();
        let (name, path) = chain
            .resolve(&request(Operator::Over, &src, Some(&mask)), &dest)
            .unwrap();
        assert_eq!(name, "fast");
        assert_eq!(path.src, PathFormat::Is(Format::SOLID));
        assert_eq!(path.mask, PathFormat::Is(Format::A8));
    }

    #[test]
    fn component_alpha_needs_a_declaring_path() {
        let chain = ImplementationChain::new(ExecutionMode::Scalar);
        let src = Image::solid(Color::from_argb32(0xff00_0000));
        let mut mask = Image::bits(Format::A8, 4, 4).unwrap();
        mask.set_component_alpha(true);
        let dest = Image::bits(Format::A8R8G8B8, 4, 4).unwrap();
        let (name, _) = chain
            .resolve(&request(Operator::Over, &src, Some(&mask)), &dest)
            .unwrap();
        assert_eq!(name, "general");
    }

    #[test]
    fn sources_sampled_out_of_bounds_use_the_general_loop() {
        let chain = ImplementationChain::new(ExecutionMode::Scalar);
        let src = Image::bits(Format::A8R8G8B8, 2, 2).unwrap();
        let dest = Image::bits(Format::A8R8G8B8, 4, 4).unwrap();
        let (name, _) = chain.resolve(&request(Operator::Over, &src, None), &dest).unwrap();
        assert_eq!(name, "general");
    }

    #[test]
    fn fill_rejects_blocks_outside_dest() {
        let chain = ImplementationChain::new(ExecutionMode::Scalar);
        let mut dest = Image::bits(Format::A8, 4, 4).unwrap();
        assert!(!chain.fill(&mut dest, IntRect::new(2, 2, 5, 3), 0xff));
        assert!(chain.fill(&mut dest, IntRect::new(2, 2, 4, 3), 0xff));
    }

    #[test]
    fn general_blt_copies_sub_byte_pixels() {
        let chain = ImplementationChain::general_only();
        let src = Image::bits_with_data(Format::A1, 8, 1, vec![0b1010_0110], 1).unwrap();
        let mut dest = Image::bits(Format::A1, 8, 1).unwrap();
        assert!(chain.blt(&src, &mut dest, 1, 0, 0, 0, 4, 1));
        let bits = dest.as_bits().unwrap();
        let copied: Vec<u32> = (0..4).map(|x| bits.pixel_32(x, 0) >> 24).collect();
        let expected: Vec<u32> = (1..5)
            .map(|x| src.as_bits().unwrap().pixel_32(x, 0) >> 24)
            .collect();
        assert_eq!(copied, expected);
    }
}
