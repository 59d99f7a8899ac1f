//! RAR/CBR backend on top of the `unrar` library.
//!
//! `unrar` only extracts a member as a whole, either to disk or to memory, so
//! each page is read into memory by the worker before it goes through the
//! pipe. The 32 KiB pipe bounds the hand-off between threads, not the memory a
//! page takes while it is being extracted.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use std::thread::{self, JoinHandle};

use unrar::Archive;
use unrar::error::{Code, UnrarError};

use crate::config::PIPE_BUFFER_SIZE;
use crate::prelude::*;
use crate::{accepts_entry, file_name_lower, sort_entries};

/// A backend for RAR/CBR comic archives, read with the `unrar` library.
///
/// RAR members cannot be opened at random, so every page stream is served by
/// a worker thread that walks the archive up to the member, extracts it and
/// feeds it through a bounded pipe.
pub struct RarBackend {
    /// Path to the RAR archive file.
    path: PathBuf,
    /// Image entries in the archive, sorted.
    entries: Vec<PageEntry>,
    closed: bool,
}

pub(crate) fn map_rar_error(err: &UnrarError) -> ReaderError {
    match err.code {
        Code::MissingPassword | Code::BadPassword => ReaderError::Encrypted,
        _ => ReaderError::Corrupt(format!("RAR error: {}", err)),
    }
}

impl RarBackend {
    /// True for existing files named `*.rar` or `*.cbr`.
    pub fn manages(path: &Path) -> bool {
        file_name_lower(path)
            .map(|name| name.ends_with(".rar") || name.ends_with(".cbr"))
            .unwrap_or(false)
    }

    /// Open a RAR archive and list its image entries.
    ///
    /// # Returns
    ///
    /// The backend, `Encrypted` if the archive or any page in it needs a
    /// password, or `Corrupt` if it cannot be listed.
    pub fn open(path: &Path, ignore_case: bool) -> Result<Self, ReaderError> {
        log::info!("Opening rar archive {:?}", path);
        let listing = Archive::new(path)
            .open_for_listing()
            .map_err(|e| map_rar_error(&e))?;

        if listing.has_encrypted_headers() {
            log::warn!("Rar archive {:?} has encrypted headers", path);
            return Err(ReaderError::Encrypted);
        }

        let mut entries = Vec::new();
        for (i, header) in listing.enumerate() {
            let header = header.map_err(|e| map_rar_error(&e))?;
            let name = header.filename.to_string_lossy().to_string();
            if !accepts_entry(&name, header.is_directory()) {
                continue;
            }
            if header.is_encrypted() {
                log::warn!("Rar entry {} is encrypted", name);
                return Err(ReaderError::Encrypted);
            }
            entries.push(PageEntry::new(name, i));
        }
        sort_entries(&mut entries, ignore_case);
        log::info!("Found {} pages in {:?}", entries.len(), path);

        Ok(Self {
            path: path.to_path_buf(),
            entries,
            closed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ArchiveBackend for RarBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Rar
    }

    fn entries(&self) -> &[PageEntry] {
        &self.entries
    }

    fn open_stream(&mut self, entry: &PageEntry) -> Result<Box<dyn Read + '_>, ReaderError> {
        if self.closed {
            return Err(ReaderError::Corrupt("Rar archive is closed".into()));
        }
        Ok(Box::new(RarEntryStream::spawn(
            self.path.clone(),
            entry.name.clone(),
        )?))
    }

    fn close(&mut self) {
        self.closed = true;
        self.entries.clear();
    }
}

/// Read end of a pipe fed by a worker thread extracting one RAR member.
///
/// Extraction failures are logged by the worker and show up here as an early
/// end of stream. Dropping the stream cancels the worker and joins it.
pub struct RarEntryStream {
    rx: Option<Receiver<Vec<u8>>>,
    chunk: Vec<u8>,
    pos: usize,
    cancel: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl RarEntryStream {
    /// Start extracting `entry` from the archive at `path`.
    pub fn spawn(path: PathBuf, entry: String) -> Result<Self, ReaderError> {
        let (tx, rx) = sync_channel(1);
        let cancel = Arc::new(AtomicBool::new(false));
        let worker_cancel = cancel.clone();
        let worker = thread::Builder::new()
            .name("rar-extract".into())
            .spawn(move || extract_to_pipe(&path, &entry, tx, &worker_cancel))?;

        Ok(Self {
            rx: Some(rx),
            chunk: Vec::new(),
            pos: 0,
            cancel,
            worker: Some(worker),
        })
    }
}

fn extract_to_pipe(path: &Path, entry: &str, tx: SyncSender<Vec<u8>>, cancel: &AtomicBool) {
    let data = match read_member(path, entry) {
        Ok(Some(data)) => data,
        Ok(None) => {
            log::error!("Rar entry {} not found in {:?}", entry, path);
            return;
        }
        Err(e) => {
            log::error!("Failed to extract {} from {:?}: {}", entry, path, e);
            return;
        }
    };

    for chunk in data.chunks(PIPE_BUFFER_SIZE) {
        if cancel.load(Ordering::Acquire) {
            log::debug!("Extraction of {} cancelled", entry);
            return;
        }
        if tx.send(chunk.to_vec()).is_err() {
            // reader hung up
            return;
        }
    }
}

/// Walk the archive up to `entry` and extract it to memory in one piece.
fn read_member(path: &Path, entry: &str) -> Result<Option<Vec<u8>>, UnrarError> {
    let mut archive = Archive::new(path).open_for_processing()?;
    while let Some(header) = archive.read_header()? {
        let name = header.entry().filename.to_string_lossy().to_string();
        if name == entry {
            let (data, _rest) = header.read()?;
            return Ok(Some(data));
        }
        archive = header.skip()?;
    }
    Ok(None)
}

impl Read for RarEntryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pos >= self.chunk.len() {
            let Some(rx) = self.rx.as_ref() else {
                return Ok(0);
            };
            match rx.recv() {
                Ok(chunk) => {
                    self.chunk = chunk;
                    self.pos = 0;
                }
                Err(_) => {
                    // worker finished and closed its end
                    self.rx = None;
                    return Ok(0);
                }
            }
        }
        let n = buf.len().min(self.chunk.len() - self.pos);
        buf[..n].copy_from_slice(&self.chunk[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl Drop for RarEntryStream {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Release);
        // dropping the receiver unblocks a worker stuck in send()
        self.rx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("Rar extraction worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unrar::error::When;

    #[test]
    fn password_errors_are_encrypted() {
        let err = UnrarError::from(Code::MissingPassword, When::Open);
        assert!(matches!(map_rar_error(&err), ReaderError::Encrypted));
        let err = UnrarError::from(Code::BadPassword, When::Process);
        assert!(matches!(map_rar_error(&err), ReaderError::Encrypted));
    }

    #[test]
    fn other_errors_are_corrupt() {
        let err = UnrarError::from(Code::BadArchive, When::Open);
        assert_eq!(map_rar_error(&err).kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn garbage_archive_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.cbr");
        std::fs::write(&path, b"this is not a rar archive at all").unwrap();
        assert!(RarBackend::manages(&path));
        let err = RarBackend::open(&path, true).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Corrupt);
    }

    #[test]
    fn missing_member_reads_as_empty_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.cbr");
        std::fs::write(&path, b"not rar").unwrap();
        let mut stream = RarEntryStream::spawn(path, "001.jpg".into()).unwrap();
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).unwrap();
        assert!(buf.is_empty());
    }
}
