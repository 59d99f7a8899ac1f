use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use zip::read::ZipArchive;

use crate::prelude::*;
use crate::{accepts_entry, file_name_lower, sort_entries};

/// A backend for CBZ/ZIP comic archives.
///
/// The central directory is read once when the archive is opened; pages are
/// then inflated one at a time straight from the open file.
pub struct ZipBackend {
    /// Path to the ZIP archive file.
    path: PathBuf,
    archive: Option<ZipArchive<BufReader<File>>>,
    entries: Vec<PageEntry>,
}

impl ZipBackend {
    /// True for existing files named `*.zip` or `*.cbz`.
    pub fn manages(path: &Path) -> bool {
        file_name_lower(path)
            .map(|name| name.ends_with(".zip") || name.ends_with(".cbz"))
            .unwrap_or(false)
    }

    /// Open a ZIP archive and list its pages.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the CBZ/ZIP file.
    /// * `ignore_case` - Sort entry names case-insensitively.
    ///
    /// # Returns
    ///
    /// The backend, or `Corrupt` if the file cannot be read as a ZIP archive.
    pub fn open(path: &Path, ignore_case: bool) -> Result<Self, ReaderError> {
        log::info!("Opening zip archive {:?}", path);
        let file = File::open(path).map_err(|e| {
            ReaderError::Corrupt(format!("Failed to open {}: {}", path.display(), e))
        })?;
        let mut archive = ZipArchive::new(BufReader::new(file))?;
        log::debug!("Zip archive opened, contains {} entries", archive.len());

        let mut entries = Vec::new();
        for i in 0..archive.len() {
            let file = archive.by_index_raw(i)?;
            let name = file.name().to_string();
            if accepts_entry(&name, file.is_dir()) {
                entries.push(PageEntry::new(name, i));
            }
        }
        sort_entries(&mut entries, ignore_case);
        log::info!("Found {} pages in {:?}", entries.len(), path);

        Ok(Self {
            path: path.to_path_buf(),
            archive: Some(archive),
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ArchiveBackend for ZipBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Zip
    }

    fn entries(&self) -> &[PageEntry] {
        &self.entries
    }

    fn open_stream(&mut self, entry: &PageEntry) -> Result<Box<dyn Read + '_>, ReaderError> {
        let archive = self
            .archive
            .as_mut()
            .ok_or_else(|| ReaderError::Corrupt("Zip archive is closed".into()))?;
        let file = archive.by_index(entry.index)?;
        Ok(Box::new(file))
    }

    fn close(&mut self) {
        if self.archive.take().is_some() {
            log::debug!("Closed zip archive {:?}", self.path);
        }
        self.entries.clear();
    }
}
