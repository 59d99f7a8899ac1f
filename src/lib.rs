//! Page reader layer for comic books: CBZ/ZIP, CBR/RAR and folders of images.
//!
//! A [`Reader`](reader::Reader) picks one [`ArchiveBackend`] for a path, lists
//! its pages in a stable order and decodes them on demand into
//! [`TileCanvas`](tiles::TileCanvas) grids sized for a viewport, under a
//! pixel budget. Covers are cached as PNG files in a `.thumbnails/` directory
//! next to the comic.

pub mod bitmap;
pub mod config;
pub mod decoder;
pub mod error;
pub mod loader;
pub mod model;
pub mod prelude;
pub mod reader;
pub mod thumbnail;
pub mod tiles;

mod zip_archive;
pub use zip_archive::ZipBackend;

mod rar_archive;
pub use rar_archive::{RarBackend, RarEntryStream};

mod folder_archive;
pub use folder_archive::DirBackend;

use std::cmp::Ordering;
use std::io::Read;
use std::path::Path;

use crate::prelude::*;

/// True when an entry name (already lowercased) is a page image.
#[macro_export]
macro_rules! is_supported_format {
    ($name:expr) => {
        $name.ends_with(".jpg") || $name.ends_with(".png")
    };
}

/// The three kinds of container a comic can live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Zip,
    Rar,
    Dir,
}

impl BackendKind {
    /// Pick the backend for `path`, checking RAR, then ZIP, then directory.
    ///
    /// Suffix tests apply to files only; the directory test requires at least
    /// `min_images_for_dir_backend` image files directly inside it.
    pub fn detect(path: &Path, config: &ReaderConfig) -> Option<Self> {
        if RarBackend::manages(path) {
            Some(BackendKind::Rar)
        } else if ZipBackend::manages(path) {
            Some(BackendKind::Zip)
        } else if DirBackend::manages(path, config.min_images_for_dir_backend) {
            Some(BackendKind::Dir)
        } else {
            None
        }
    }

    /// Open `path` with this backend.
    pub fn open(
        self,
        path: &Path,
        config: &ReaderConfig,
    ) -> Result<Box<dyn ArchiveBackend>, ReaderError> {
        let backend: Box<dyn ArchiveBackend> = match self {
            BackendKind::Zip => Box::new(ZipBackend::open(path, config.ignore_case)?),
            BackendKind::Rar => Box::new(RarBackend::open(path, config.ignore_case)?),
            BackendKind::Dir => Box::new(DirBackend::open(path, config.ignore_case)?),
        };
        Ok(backend)
    }
}

/// Lowercased file name of `path`, if it is an existing regular file.
pub(crate) fn file_name_lower(path: &Path) -> Option<String> {
    if !path.is_file() {
        return None;
    }
    path.file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
}

/// Uniform view over a comic container.
///
/// A backend lists its pages once when opened and hands out byte streams per
/// page afterwards. After [`close`](ArchiveBackend::close) the entry list is
/// empty and every stream request fails.
pub trait ArchiveBackend: Send {
    fn kind(&self) -> BackendKind;

    /// Page entries, filtered and sorted.
    fn entries(&self) -> &[PageEntry];

    /// Open a byte stream over one entry.
    fn open_stream(&mut self, entry: &PageEntry) -> Result<Box<dyn Read + '_>, ReaderError>;

    /// Read a whole entry into memory.
    ///
    /// Stream errors on archive members mean the archive is damaged, so they
    /// surface as `Corrupt`.
    fn read_entry(&mut self, entry: &PageEntry) -> Result<Vec<u8>, ReaderError> {
        let mut stream = self.open_stream(entry)?;
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).map_err(|e| {
            ReaderError::Corrupt(format!("Failed to read {}: {}", entry.name, e))
        })?;
        Ok(buf)
    }

    /// Whether covers of this backend may be persisted to the thumbnail cache.
    fn allow_cover_cache(&self) -> bool {
        true
    }

    fn close(&mut self);
}

/// Entry filter shared by all backends: `.jpg`/`.png` files only, no
/// directories, nothing hidden.
///
/// A name is hidden when any of its path components starts with a dot, which
/// also drops `.thumbnails/` folders and `__MACOSX/._*` resource forks.
pub fn accepts_entry(name: &str, is_dir: bool) -> bool {
    if is_dir || name.ends_with('/') || name.ends_with('\\') {
        return false;
    }
    if name
        .split(['/', '\\'])
        .any(|component| component.starts_with('.'))
    {
        return false;
    }
    let lower = name.to_lowercase();
    is_supported_format!(&lower)
}

/// Compare two entry names, lowercasing both sides when `ignore_case` is set.
pub fn compare_names(a: &str, b: &str, ignore_case: bool) -> Ordering {
    if ignore_case {
        a.to_lowercase().cmp(&b.to_lowercase())
    } else {
        a.cmp(b)
    }
}

/// Stable sort of page entries by name; ties keep their listing order.
pub fn sort_entries(entries: &mut [PageEntry], ignore_case: bool) {
    entries.sort_by(|a, b| compare_names(&a.name, &b.name, ignore_case));
}
