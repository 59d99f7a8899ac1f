//! Side-car PNG cover thumbnails.
//!
//! The cover of `<dir>/<name>.<ext>` lives at `<dir>/.thumbnails/<name>.png`.
//! Entries are keyed by file name only: a comic replaced in place keeps its
//! old cover until the thumbnail is removed.

use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{ImageFormat, RgbaImage};

use crate::bitmap::{Bitmap, PixelBudget};
use crate::config::THUMBNAILS_DIR;
use crate::error::ReaderError;
use crate::model::ThumbSize;

/// On-disk cover cache.
#[derive(Debug, Clone)]
pub struct CoverCache {
    dir_name: String,
    size: ThumbSize,
}

impl Default for CoverCache {
    fn default() -> Self {
        Self::new(THUMBNAILS_DIR, ThumbSize::default())
    }
}

impl CoverCache {
    pub fn new(dir_name: impl Into<String>, size: ThumbSize) -> Self {
        Self {
            dir_name: dir_name.into(),
            size,
        }
    }

    pub fn size(&self) -> ThumbSize {
        self.size
    }

    /// Where the cover of `comic` is stored.
    pub fn thumbnail_path(&self, comic: &Path) -> PathBuf {
        let name = comic
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let base = match name.rfind('.') {
            Some(dot) if dot > 0 => &name[..dot],
            _ => name.as_str(),
        };
        let parent = comic.parent().unwrap_or_else(|| Path::new(""));
        parent.join(&self.dir_name).join(format!("{}.png", base))
    }

    /// Load a cached cover.
    ///
    /// A thumbnail that cannot be decoded (torn write, foreign file) is
    /// deleted and reported as a miss.
    pub fn lookup(&self, comic: &Path, budget: &PixelBudget) -> Option<Bitmap> {
        let path = self.thumbnail_path(comic);
        if !path.is_file() {
            log::debug!("Cache not found: {:?}", path);
            return None;
        }
        match image::open(&path) {
            Ok(img) => {
                log::debug!("Cache found: {:?}", path);
                Bitmap::from_image(img.into_rgba8(), budget).ok()
            }
            Err(e) => {
                log::warn!("Discarding unreadable thumbnail {:?}: {}", path, e);
                if let Err(e) = fs::remove_file(&path) {
                    log::warn!("Cannot remove thumbnail {:?}: {}", path, e);
                }
                None
            }
        }
    }

    /// Scale a full page down to the thumbnail size.
    ///
    /// The result is not charged to any budget yet; callers release the page
    /// first and then wrap the thumbnail with [`Bitmap::from_image`].
    pub fn scale(&self, page: &RgbaImage) -> RgbaImage {
        let ThumbSize { width, height } = self.size;
        imageops::resize(page, width, height, FilterType::Lanczos3)
    }

    /// Persist a cover for `comic`.
    ///
    /// The PNG is written to a temporary file inside the thumbnail directory
    /// and renamed into place, so concurrent readers never see a partial file.
    pub fn store(&self, comic: &Path, thumb: &Bitmap) -> Result<PathBuf, ReaderError> {
        let path = self.thumbnail_path(comic);
        let dir = path
            .parent()
            .ok_or_else(|| ReaderError::Config(format!("No parent for {:?}", path)))?;
        if !dir.exists() {
            log::debug!("Creating thumbnails dir: {:?}", dir);
            fs::create_dir_all(dir)?;
        }

        let png = encode_png(thumb.as_image())?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&png)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| ReaderError::Io(e.error))?;
        log::debug!("Cache file created: {:?}", path);
        Ok(path)
    }

    /// Forget the cover of `comic`, removing the thumbnail directory once it
    /// is empty.
    pub fn remove(&self, comic: &Path) -> Result<(), ReaderError> {
        let path = self.thumbnail_path(comic);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        if let Some(dir) = path.parent() {
            let empty = fs::read_dir(dir)
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(false);
            if empty {
                if let Err(e) = fs::remove_dir(dir) {
                    log::warn!("Cannot remove thumbnails dir {:?}: {}", dir, e);
                }
            }
        }
        Ok(())
    }
}

fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ReaderError> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png).map_err(|e| {
        ReaderError::DecodeFailed(format!("Failed to write thumbnail: {}", e))
    })?;
    Ok(buffer.into_inner())
}
