//! Page decoding: compressed image bytes in, budgeted bitmaps or tile grids out.
//!
//! Comic pages are routinely larger than what a single texture or the pixel
//! budget can hold, and page sizes vary inside one archive (single and double
//! spreads). Every page therefore goes through the same two strategies:
//!
//! 1. Downscale by a factor that doubles each time the budget refuses the
//!    allocation.
//! 2. For display, cut the page into tiles no larger than `max_tile_edge`.
//!
//! Landscape pages are turned 90° clockwise when `auto_rotate_landscape` is set.

use std::io::Cursor;

use image::imageops::{self, FilterType};
use image::{ImageReader, RgbaImage};

use crate::bitmap::{Bitmap, PixelBudget};
use crate::config::DecodePolicy;
use crate::error::ReaderError;
use crate::model::Viewport;
use crate::tiles::TileCanvas;

/// Size of a `width × height` image shrunk by `scale`, rounded, never below 1 px.
pub fn scaled_dimensions(width: u32, height: u32, scale: u32) -> (u32, u32) {
    let scale = scale.max(1) as f64;
    let w = (width as f64 / scale).round().max(1.0) as u32;
    let h = (height as f64 / scale).round().max(1.0) as u32;
    (w, h)
}

/// Largest power-of-two factor that keeps a `width × height` page at least as
/// large as the viewport in both dimensions.
pub fn fit_scale(width: u32, height: u32, viewport: Viewport) -> u32 {
    let mut scale = 1u32;
    while let Some(next) = scale.checked_mul(2) {
        if width / next >= viewport.width && height / next >= viewport.height {
            scale = next;
        } else {
            break;
        }
    }
    scale
}

/// How one page is cut into tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    /// Source size before scaling and rotation.
    pub src_width: u32,
    pub src_height: u32,
    pub scale: u32,
    pub rotate: bool,
    /// Page size after scaling and rotation.
    pub page_width: u32,
    pub page_height: u32,
    pub cols: u32,
    pub rows: u32,
    pub tile_width: u32,
    pub tile_height: u32,
}

impl TileGrid {
    /// Choose the grid for a `src_width × src_height` source.
    ///
    /// Without a viewport the page is tiled at full size; with one, it is
    /// first shrunk by [`fit_scale`].
    pub fn plan(
        src_width: u32,
        src_height: u32,
        policy: &DecodePolicy,
        viewport: Option<Viewport>,
    ) -> Self {
        let rotate = policy.auto_rotate_landscape && src_height < src_width;
        let (ew, eh) = if rotate {
            (src_height, src_width)
        } else {
            (src_width, src_height)
        };
        let scale = viewport.map(|v| fit_scale(ew, eh, v)).unwrap_or(1);
        Self::at_scale(src_width, src_height, rotate, scale, policy.max_tile_edge)
    }

    /// The grid for a fixed downscale factor.
    pub fn at_scale(
        src_width: u32,
        src_height: u32,
        rotate: bool,
        scale: u32,
        max_tile_edge: u32,
    ) -> Self {
        let max_tile_edge = max_tile_edge.max(1);
        let (sw, sh) = scaled_dimensions(src_width, src_height, scale);
        let (page_width, page_height) = if rotate { (sh, sw) } else { (sw, sh) };
        let cols = page_width.div_ceil(max_tile_edge).max(1);
        let rows = page_height.div_ceil(max_tile_edge).max(1);
        Self {
            src_width,
            src_height,
            scale,
            rotate,
            page_width,
            page_height,
            cols,
            rows,
            tile_width: page_width / cols,
            tile_height: page_height / rows,
        }
    }

    /// The same grid with the downscale factor doubled.
    pub fn halved(&self, max_tile_edge: u32) -> Self {
        Self::at_scale(
            self.src_width,
            self.src_height,
            self.rotate,
            self.scale.saturating_mul(2),
            max_tile_edge,
        )
    }

    pub fn tile_count(&self) -> usize {
        self.cols as usize * self.rows as usize
    }

    /// Size of the scaled, unrotated source.
    pub fn scaled_source(&self) -> (u32, u32) {
        scaled_dimensions(self.src_width, self.src_height, self.scale)
    }

    /// Rectangle `(x, y, w, h)` of the scaled, unrotated source that becomes
    /// tile `(row, col)`.
    ///
    /// For rotated grids the rectangle is taken from where the tile sits
    /// before a 90° clockwise turn; the cropped region still has to be rotated.
    pub fn source_rect(&self, row: u32, col: u32) -> (u32, u32, u32, u32) {
        let x0 = col * self.tile_width;
        let y0 = row * self.tile_height;
        if self.rotate {
            let (_, sh) = self.scaled_source();
            (y0, sh - x0 - self.tile_width, self.tile_height, self.tile_width)
        } else {
            (x0, y0, self.tile_width, self.tile_height)
        }
    }
}

/// Turns page bytes into bitmaps, following a [`DecodePolicy`] and charging
/// every bitmap to a [`PixelBudget`].
#[derive(Debug, Clone)]
pub struct ImageDecoder {
    policy: DecodePolicy,
    budget: PixelBudget,
}

impl ImageDecoder {
    pub fn new(policy: DecodePolicy, budget: PixelBudget) -> Self {
        Self { policy, budget }
    }

    pub fn policy(&self) -> &DecodePolicy {
        &self.policy
    }

    pub fn budget(&self) -> &PixelBudget {
        &self.budget
    }

    /// Decode compressed bytes to RGBA, guessing the format from the content.
    pub fn decode_source(bytes: &[u8]) -> Result<RgbaImage, ReaderError> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| ReaderError::DecodeFailed(format!("Failed to read image: {}", e)))?;
        if reader.format().is_none() {
            return Err(ReaderError::DecodeFailed("Unknown image format".into()));
        }
        Ok(reader.decode()?.into_rgba8())
    }

    /// Decode one page into a single bitmap.
    ///
    /// Starts at `initial_scale` and doubles it whenever the budget refuses
    /// the bitmap. Landscape results are rotated when the policy asks for it.
    ///
    /// # Returns
    ///
    /// The bitmap, `DecodeFailed` for malformed bytes, or `OutOfMemory` when
    /// not even a 1×1 bitmap fits.
    pub fn decode_bitmap(&self, bytes: &[u8], initial_scale: u32) -> Result<Bitmap, ReaderError> {
        let source = Self::decode_source(bytes)?;
        let bitmap = self.downscale(&source, initial_scale)?;
        drop(source);

        if self.policy.auto_rotate_landscape && bitmap.height() < bitmap.width() {
            log::debug!("Rotating landscape page {}x{}", bitmap.width(), bitmap.height());
            return Ok(bitmap.rotated90());
        }
        Ok(bitmap)
    }

    fn downscale(&self, source: &RgbaImage, initial_scale: u32) -> Result<Bitmap, ReaderError> {
        let (w, h) = source.dimensions();
        let mut scale = initial_scale.max(1);
        loop {
            let (sw, sh) = scaled_dimensions(w, h, scale);
            if let Some(reservation) = self.budget.try_reserve(PixelBudget::bytes_for(sw, sh)) {
                let image = if (sw, sh) == (w, h) {
                    source.clone()
                } else {
                    imageops::resize(source, sw, sh, FilterType::Triangle)
                };
                return Ok(Bitmap::with_reservation(image, reservation));
            }
            if sw == 1 && sh == 1 {
                return Err(ReaderError::OutOfMemory);
            }
            scale = scale.saturating_mul(2);
            log::debug!("Using scale {}", scale);
        }
    }

    /// Decode one page into a tile grid for display.
    pub fn decode_tiled(
        &self,
        bytes: &[u8],
        viewport: Option<Viewport>,
    ) -> Result<TileCanvas, ReaderError> {
        let source = Self::decode_source(bytes)?;
        let (w, h) = source.dimensions();
        let mut grid = TileGrid::plan(w, h, &self.policy, viewport);
        loop {
            log::debug!(
                "Tiling {}x{} page as {}x{} (scale {}, rotate {})",
                w,
                h,
                grid.cols,
                grid.rows,
                grid.scale,
                grid.rotate
            );
            if let Some(tiles) = self.cut_tiles(&source, &grid) {
                let mut canvas = TileCanvas::new(tiles, grid.cols, grid.rows)?;
                canvas.set_mode(self.policy.render_mode);
                return Ok(canvas);
            }
            if grid.page_width == 1 && grid.page_height == 1 {
                return Err(ReaderError::OutOfMemory);
            }
            grid = grid.halved(self.policy.max_tile_edge);
            log::debug!("Using scale {}", grid.scale);
        }
    }

    /// Cut every tile of `grid` out of `source`.
    ///
    /// Returns `None` as soon as the budget refuses an allocation; tiles cut
    /// so far are released on return.
    fn cut_tiles(&self, source: &RgbaImage, grid: &TileGrid) -> Option<Vec<Bitmap>> {
        let scaled;
        let src = if grid.scale > 1 {
            let (sw, sh) = grid.scaled_source();
            let reservation = self.budget.try_reserve(PixelBudget::bytes_for(sw, sh))?;
            scaled = (imageops::resize(source, sw, sh, FilterType::Triangle), reservation);
            &scaled.0
        } else {
            source
        };

        let tile_bytes = PixelBudget::bytes_for(grid.tile_width, grid.tile_height);
        let mut tiles = Vec::with_capacity(grid.tile_count());
        for row in 0..grid.rows {
            for col in 0..grid.cols {
                let reservation = self.budget.try_reserve(tile_bytes)?;
                let (x, y, cw, ch) = grid.source_rect(row, col);
                let tile = imageops::crop_imm(src, x, y, cw, ch).to_image();
                let tile = if grid.rotate {
                    imageops::rotate90(&tile)
                } else {
                    tile
                };
                tiles.push(Bitmap::with_reservation(tile, reservation));
            }
        }
        Some(tiles)
    }
}
