use std::fs;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use crate::prelude::*;
use crate::{accepts_entry, sort_entries};

/// A backend for a plain directory of page images.
///
/// Only files directly inside the directory are pages; subdirectories
/// (including `.thumbnails/`) are ignored.
pub struct DirBackend {
    pub path: PathBuf,
    entries: Vec<PageEntry>,
    closed: bool,
}

/// Names of the image files directly inside `path`, in listing order.
fn image_files(path: &Path) -> Result<Vec<String>, std::io::Error> {
    let mut files = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(true);
        let name = entry.file_name().to_string_lossy().to_string();
        if accepts_entry(&name, is_dir) && entry.path().is_file() {
            files.push(name);
        }
    }
    Ok(files)
}

impl DirBackend {
    /// True for existing directories holding at least `min_images` page images.
    pub fn manages(path: &Path, min_images: usize) -> bool {
        if !path.is_dir() {
            return false;
        }
        match image_files(path) {
            Ok(files) => files.len() >= min_images,
            Err(_) => false,
        }
    }

    pub fn open(path: &Path, ignore_case: bool) -> Result<Self, ReaderError> {
        if !path.is_dir() {
            return Err(ReaderError::Unsupported);
        }
        log::info!("Opening image directory {:?}", path);
        let mut entries: Vec<PageEntry> = image_files(path)
            .map_err(|e| {
                ReaderError::Corrupt(format!("Failed to list {}: {}", path.display(), e))
            })?
            .into_iter()
            .enumerate()
            .map(|(i, name)| PageEntry::new(name, i))
            .collect();
        sort_entries(&mut entries, ignore_case);
        log::info!("Found {} pages in {:?}", entries.len(), path);

        Ok(Self {
            path: path.to_path_buf(),
            entries,
            closed: false,
        })
    }
}

impl ArchiveBackend for DirBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Dir
    }

    fn entries(&self) -> &[PageEntry] {
        &self.entries
    }

    fn open_stream(&mut self, entry: &PageEntry) -> Result<Box<dyn Read + '_>, ReaderError> {
        if self.closed {
            return Err(ReaderError::DecodeFailed("Directory reader is closed".into()));
        }
        let img_path = self.path.join(&entry.name);
        let file = fs::File::open(&img_path).map_err(|e| {
            ReaderError::DecodeFailed(format!("Failed to open image {}: {}", entry.name, e))
        })?;
        Ok(Box::new(BufReader::new(file)))
    }

    /// Loose files are not archive members: read errors are decode failures.
    fn read_entry(&mut self, entry: &PageEntry) -> Result<Vec<u8>, ReaderError> {
        let mut stream = self.open_stream(entry)?;
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).map_err(|e| {
            ReaderError::DecodeFailed(format!("Failed to read image {}: {}", entry.name, e))
        })?;
        Ok(buf)
    }

    fn close(&mut self) {
        self.closed = true;
        self.entries.clear();
    }
}
