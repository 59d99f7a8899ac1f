//! The reader facade: one comic, one backend, a page cursor.

use std::path::{Path, PathBuf};

use crate::decoder::ImageDecoder;
use crate::prelude::*;
use crate::thumbnail::CoverCache;

/// An open comic.
///
/// The cursor starts at -1 ("nothing shown yet"); the first [`next`](Self::next)
/// shows page 0. Moving past either end is not an error: those calls return
/// `Ok(None)` and leave the cursor where it was.
///
/// A reader is used from one thread at a time. Share it through
/// [`PageLoader`](crate::loader::PageLoader) when pages are requested
/// concurrently.
pub struct Reader {
    path: Option<PathBuf>,
    backend: Option<Box<dyn ArchiveBackend>>,
    config: ReaderConfig,
    decoder: ImageDecoder,
    budget: PixelBudget,
    covers: CoverCache,
    current_page: i32,
    viewport: Option<Viewport>,
}

impl Reader {
    /// Whether any backend can open `path`.
    pub fn manages(path: &Path, config: &ReaderConfig) -> bool {
        BackendKind::detect(path, config).is_some()
    }

    /// Open the comic at `path`, choosing the backend from its name or contents.
    pub fn open(path: impl AsRef<Path>, config: ReaderConfig) -> Result<Self, ReaderError> {
        let path = path.as_ref();
        config.validate()?;
        if !path.exists() {
            return Err(ReaderError::NotFound(path.to_path_buf()));
        }
        let kind = BackendKind::detect(path, &config).ok_or(ReaderError::Unsupported)?;
        log::info!("Loading {:?} as {:?}", path, kind);
        let backend = kind.open(path, &config)?;

        let budget = PixelBudget::new(config.memory_budget);
        let decoder = ImageDecoder::new(config.decode_policy(), budget.clone());
        let covers = CoverCache::new(config.thumbnail_dir_name.clone(), config.cover_thumb_size);
        Ok(Self {
            path: Some(path.to_path_buf()),
            backend: Some(backend),
            config,
            decoder,
            budget,
            covers,
            current_page: -1,
            viewport: None,
        })
    }

    /// Release the backend. Calling it again does nothing.
    pub fn close(&mut self) {
        if let Some(mut backend) = self.backend.take() {
            log::info!("Closing {:?}", self.path);
            backend.close();
        }
        self.viewport = None;
        self.current_page = -1;
    }

    pub fn is_open(&self) -> bool {
        self.backend.is_some()
    }

    pub fn uri(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn kind(&self) -> Option<BackendKind> {
        self.backend.as_ref().map(|b| b.kind())
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// The budget every bitmap of this reader is charged to.
    pub fn budget(&self) -> &PixelBudget {
        &self.budget
    }

    pub fn covers(&self) -> &CoverCache {
        &self.covers
    }

    /// Number of pages, or [`NOFILE`] when nothing is loaded.
    pub fn count(&self) -> i32 {
        match &self.backend {
            Some(backend) => backend.entries().len() as i32,
            None => NOFILE,
        }
    }

    /// Pages in reading order. Empty when nothing is loaded.
    pub fn entries(&self) -> &[PageEntry] {
        match &self.backend {
            Some(backend) => backend.entries(),
            None => &[],
        }
    }

    pub fn current_page(&self) -> i32 {
        self.current_page
    }

    /// Set the cursor. Out-of-range pages are ignored.
    pub fn move_to(&mut self, page: i32) {
        if self.in_range(page) {
            self.current_page = page;
        } else {
            log::debug!("Ignoring move to page {} of {}", page, self.count());
        }
    }

    /// Advance the cursor and decode the new current page.
    pub fn next(&mut self) -> Result<Option<TileCanvas>, ReaderError> {
        let page = self.current_page + 1;
        if !self.in_range(page) {
            return Ok(None);
        }
        self.current_page = page;
        self.get(page)
    }

    /// Step the cursor back and decode the new current page.
    pub fn prev(&mut self) -> Result<Option<TileCanvas>, ReaderError> {
        let page = self.current_page - 1;
        if !self.in_range(page) {
            return Ok(None);
        }
        self.current_page = page;
        self.get(page)
    }

    /// Decode the page under the cursor.
    pub fn current(&mut self) -> Result<Option<TileCanvas>, ReaderError> {
        self.get(self.current_page)
    }

    /// Paint area hint for tile grid selection. Non-positive values unset it.
    pub fn set_viewport(&mut self, width: i32, height: i32) {
        self.viewport = Viewport::from_hint(width, height);
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    /// Decode page `page` into a tile grid sized for the viewport.
    ///
    /// Does not move the cursor. Out-of-range pages yield `Ok(None)`.
    pub fn get(&mut self, page: i32) -> Result<Option<TileCanvas>, ReaderError> {
        let Some(bytes) = self.read_page(page)? else {
            return Ok(None);
        };
        let canvas = self.decoder.decode_tiled(&bytes, self.viewport)?;
        Ok(Some(canvas))
    }

    /// Decode page `page` into one bitmap, starting at downscale factor
    /// `initial_scale`.
    pub fn get_bitmap(
        &mut self,
        page: i32,
        initial_scale: u32,
    ) -> Result<Option<Bitmap>, ReaderError> {
        let Some(bytes) = self.read_page(page)? else {
            return Ok(None);
        };
        let bitmap = self.decoder.decode_bitmap(&bytes, initial_scale)?;
        Ok(Some(bitmap))
    }

    /// The cover thumbnail: page 0 scaled to the configured thumbnail size.
    ///
    /// Served from the thumbnail cache when possible. On a miss the cover is
    /// generated and written back; a failed write is logged and the in-memory
    /// thumbnail is still returned. An empty comic has no cover.
    pub fn cover(&mut self) -> Result<Option<Bitmap>, ReaderError> {
        if self.count() <= 0 {
            return Ok(None);
        }
        let Some(path) = self.path.clone() else {
            return Ok(None);
        };
        let allow_cache = self
            .backend
            .as_ref()
            .map(|b| b.allow_cover_cache())
            .unwrap_or(false);

        if allow_cache {
            if let Some(thumb) = self.covers.lookup(&path, &self.budget) {
                return Ok(Some(thumb));
            }
            log::debug!("Cache not found, creating cover for {:?}", path);
        }

        let Some(page) = self.get_bitmap(0, self.config.initial_scale)? else {
            return Ok(None);
        };
        let thumb = self.covers.scale(page.as_image());
        page.recycle();
        let thumb = Bitmap::from_image(thumb, &self.budget)?;

        if allow_cache {
            if let Err(e) = self.covers.store(&path, &thumb) {
                log::warn!("Cannot create the cache file for {:?}: {}", path, e);
            }
        }
        Ok(Some(thumb))
    }

    fn in_range(&self, page: i32) -> bool {
        page >= 0 && page < self.count()
    }

    fn read_page(&mut self, page: i32) -> Result<Option<Vec<u8>>, ReaderError> {
        if !self.in_range(page) {
            return Ok(None);
        }
        let Some(backend) = self.backend.as_mut() else {
            return Ok(None);
        };
        let entry = backend.entries()[page as usize].clone();
        log::debug!("Reading page {} ({})", page, entry.name);
        backend.read_entry(&entry).map(Some)
    }
}

impl Drop for Reader {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Reader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("path", &self.path)
            .field("kind", &self.kind())
            .field("count", &self.count())
            .field("current_page", &self.current_page)
            .field("viewport", &self.viewport)
            .finish()
    }
}
