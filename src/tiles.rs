//! A page held as a grid of tile bitmaps.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use crate::bitmap::Bitmap;
use crate::error::ReaderError;
use crate::model::RenderMode;

/// Where one tile lands in the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Index into the canvas tiles (row-major).
    pub index: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// A decoded page split into `cols × rows` tiles.
///
/// Tiles are stored row-major: the first row left to right, then the second
/// row, and so on. All tiles are expected to share the size of the first one;
/// this is not checked.
#[derive(Debug)]
pub struct TileCanvas {
    tiles: Vec<Bitmap>,
    cols: u32,
    rows: u32,
    tile_width: u32,
    tile_height: u32,
    mode: RenderMode,
}

impl TileCanvas {
    /// Build a canvas from row-major tiles.
    ///
    /// # Arguments
    ///
    /// * `tiles` - Exactly `cols * rows` bitmaps.
    /// * `cols` - Number of columns.
    /// * `rows` - Number of rows.
    pub fn new(tiles: Vec<Bitmap>, cols: u32, rows: u32) -> Result<Self, ReaderError> {
        if tiles.is_empty() || tiles.len() != (cols as usize) * (rows as usize) {
            return Err(ReaderError::DecodeFailed(format!(
                "Expected {}x{} tiles, got {}",
                cols,
                rows,
                tiles.len()
            )));
        }
        let (tile_width, tile_height) = tiles[0].dimensions();
        Ok(Self {
            tiles,
            cols,
            rows,
            tile_width,
            tile_height,
            mode: RenderMode::default(),
        })
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn tiles(&self) -> &[Bitmap] {
        &self.tiles
    }

    pub fn tile(&self, row: u32, col: u32) -> Option<&Bitmap> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.tiles.get((row * self.cols + col) as usize)
    }

    pub fn tile_size(&self) -> (u32, u32) {
        (self.tile_width, self.tile_height)
    }

    /// Width of the whole page at native tile size.
    pub fn width(&self) -> u32 {
        self.tile_width * self.cols
    }

    /// Height of the whole page at native tile size.
    pub fn height(&self) -> u32 {
        self.tile_height * self.rows
    }

    pub fn is_portrait(&self) -> bool {
        self.height() >= self.width()
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: RenderMode) {
        self.mode = mode;
    }

    /// Compute where every tile goes in a `viewport_width × viewport_height` area
    /// under the current render mode.
    pub fn layout(&self, viewport_width: u32, viewport_height: u32) -> Vec<Placement> {
        let vw = viewport_width as f32;
        let vh = viewport_height as f32;
        let cols = self.cols as f32;
        let rows = self.rows as f32;
        let tw = self.tile_width as f32;
        let th = self.tile_height as f32;

        let mut placements = Vec::with_capacity(self.tiles.len());
        for r in 0..self.rows {
            for c in 0..self.cols {
                let index = (r * self.cols + c) as usize;
                let (fc, fr) = (c as f32, r as f32);
                let placement = match self.mode {
                    RenderMode::Stretched => {
                        let w = vw / cols;
                        let h = vh / rows;
                        Placement {
                            index,
                            x: w * fc,
                            y: h * fr,
                            width: w,
                            height: h,
                        }
                    }
                    RenderMode::CenteredOriginal => Placement {
                        index,
                        x: tw * fc,
                        y: th * fr,
                        width: tw,
                        height: th,
                    },
                    RenderMode::CenteredFill => {
                        let scale = (vw / cols / tw).min(vh / rows / th);
                        let ox = ((vw - scale * tw * cols).round() as i64 / 2) as f32;
                        let oy = ((vh - scale * th * rows).round() as i64 / 2) as f32;
                        Placement {
                            index,
                            x: scale * tw * fc + ox,
                            y: scale * th * fr + oy,
                            width: scale * tw,
                            height: scale * th,
                        }
                    }
                };
                placements.push(placement);
            }
        }
        placements
    }

    /// Paint the page into `canvas` following [`layout`](Self::layout).
    pub fn draw(&self, canvas: &mut RgbaImage) {
        let (vw, vh) = canvas.dimensions();
        for placement in self.layout(vw, vh) {
            let tile = self.tiles[placement.index].as_image();
            let x0 = placement.x.round() as i64;
            let y0 = placement.y.round() as i64;
            let w = ((placement.x + placement.width).round() as i64 - x0).max(0) as u32;
            let h = ((placement.y + placement.height).round() as i64 - y0).max(0) as u32;
            if w == 0 || h == 0 {
                continue;
            }
            if (w, h) == tile.dimensions() {
                imageops::overlay(canvas, tile, x0, y0);
            } else {
                let scaled = imageops::resize(tile, w, h, FilterType::Triangle);
                imageops::overlay(canvas, &scaled, x0, y0);
            }
        }
    }

    /// Render into a fresh `width × height` canvas filled with `background`.
    pub fn render(&self, width: u32, height: u32, background: Rgba<u8>) -> RgbaImage {
        let mut canvas = RgbaImage::from_pixel(width, height, background);
        self.draw(&mut canvas);
        canvas
    }

    /// Stitch the tiles back into one image at native size.
    pub fn compose(&self) -> RgbaImage {
        let mut page = RgbaImage::new(self.width(), self.height());
        for r in 0..self.rows {
            for c in 0..self.cols {
                let tile = self.tiles[(r * self.cols + c) as usize].as_image();
                imageops::replace(
                    &mut page,
                    tile,
                    (c * self.tile_width) as i64,
                    (r * self.tile_height) as i64,
                );
            }
        }
        page
    }

    /// Release every tile bitmap.
    pub fn recycle(self) {
        log::debug!(
            "Recycling {}x{} tile canvas ({} tiles)",
            self.cols,
            self.rows,
            self.tiles.len()
        );
        for tile in self.tiles {
            tile.recycle();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::PixelBudget;

    fn canvas(cols: u32, rows: u32, tw: u32, th: u32) -> TileCanvas {
        let budget = PixelBudget::unlimited();
        let tiles = (0..cols * rows)
            .map(|i| {
                let shade = (i * 10) as u8;
                Bitmap::from_image(
                    RgbaImage::from_pixel(tw, th, Rgba([shade, shade, shade, 255])),
                    &budget,
                )
                .unwrap()
            })
            .collect();
        TileCanvas::new(tiles, cols, rows).unwrap()
    }

    #[test]
    fn rejects_wrong_tile_count() {
        let budget = PixelBudget::unlimited();
        let tiles = vec![Bitmap::from_image(RgbaImage::new(2, 2), &budget).unwrap()];
        assert!(TileCanvas::new(tiles, 2, 1).is_err());
    }

    #[test]
    fn centered_fill_keeps_aspect_and_centers() {
        // 2x2 tiles of 100x150 => page 200x300 in a 400x400 viewport
        let c = canvas(2, 2, 100, 150);
        let placements = c.layout(400, 400);
        assert_eq!(placements.len(), 4);
        let first = placements[0];
        let scale = 400.0 / 300.0;
        assert!((first.width - 100.0 * scale).abs() < 1e-3);
        assert!((first.height - 150.0 * scale).abs() < 1e-3);
        assert_eq!(first.y, 0.0);
        // horizontal slack is split evenly
        let page_w = 200.0 * scale;
        assert!((first.x - ((400.0 - page_w).round() as i64 / 2) as f32).abs() < 1e-3);
        let last = placements[3];
        assert!((last.x - (first.x + first.width)).abs() < 1e-3);
        assert!((last.y - first.height).abs() < 1e-3);
    }

    #[test]
    fn stretched_fills_viewport() {
        let mut c = canvas(3, 2, 10, 10);
        c.set_mode(RenderMode::Stretched);
        let placements = c.layout(300, 100);
        let last = placements.last().unwrap();
        assert_eq!(last.x + last.width, 300.0);
        assert_eq!(last.y + last.height, 100.0);
        assert_eq!(last.width, 100.0);
        assert_eq!(last.height, 50.0);
    }

    #[test]
    fn centered_original_uses_native_size() {
        let mut c = canvas(2, 1, 64, 32);
        c.set_mode(RenderMode::CenteredOriginal);
        let placements = c.layout(10, 10);
        assert_eq!(placements[1].x, 64.0);
        assert_eq!(placements[1].width, 64.0);
        assert_eq!(placements[1].height, 32.0);
    }

    #[test]
    fn compose_places_tiles_row_major() {
        let c = canvas(2, 2, 4, 4);
        let page = c.compose();
        assert_eq!(page.dimensions(), (8, 8));
        assert_eq!(page.get_pixel(0, 0)[0], 0);
        assert_eq!(page.get_pixel(5, 0)[0], 10);
        assert_eq!(page.get_pixel(0, 5)[0], 20);
        assert_eq!(page.get_pixel(7, 7)[0], 30);
    }

    #[test]
    fn draw_paints_inside_viewport() {
        let c = canvas(1, 1, 10, 20);
        let out = c.render(40, 40, Rgba([255, 0, 0, 255]));
        // page is scaled to 20x40 and centered horizontally
        assert_eq!(out.get_pixel(0, 20), &Rgba([255, 0, 0, 255]));
        assert_eq!(out.get_pixel(20, 20), &Rgba([0, 0, 0, 255]));
    }
}
