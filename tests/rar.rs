mod common;

use std::io::Read;
use std::path::{Path, PathBuf};

use comic_pages::decoder::ImageDecoder;
use comic_pages::RarEntryStream;
use comic_pages::prelude::*;
use common::*;

/// Copy a checked-in fixture into `dir` so covers are written there.
fn fixture(dir: &Path, name: &str) -> PathBuf {
    let source = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    let target = dir.join(name);
    std::fs::copy(source, &target).unwrap();
    target
}

#[test]
fn rar_pages_are_sorted_ignoring_case() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = fixture(dir.path(), "sample.cbr");

    let reader = Reader::open(&path, ReaderConfig::default()).unwrap();
    assert_eq!(reader.kind(), Some(BackendKind::Rar));
    let names: Vec<_> = reader.entries().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["a.jpg", "B.JPG", "c.png"]);
    assert_eq!(reader.count(), 3);
}

#[test]
fn rar_pages_decode_through_the_pipe() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixture(dir.path(), "sample.cbr");
    let mut reader = Reader::open(&path, ReaderConfig::default()).unwrap();

    let small = reader.get(1).unwrap().unwrap();
    assert_eq!((small.width(), small.height()), (20, 30));
    assert_eq!(page_tag(&small), 2);

    // larger than one pipe chunk
    let large = reader.get(2).unwrap().unwrap();
    assert_eq!((large.width(), large.height()), (128, 192));
    assert_eq!(page_tag(&large), 3);

    let first = reader.next().unwrap().unwrap();
    assert_eq!(page_tag(&first), 1);
}

#[test]
fn rar_entry_is_read_in_full() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixture(dir.path(), "sample.cbr");
    let mut backend = RarBackend::open(&path, true).unwrap();
    let entry = backend.entries()[2].clone();
    assert_eq!(entry.name, "c.png");

    let bytes = backend.read_entry(&entry).unwrap();
    assert!(bytes.len() > comic_pages::config::PIPE_BUFFER_SIZE);
    let image = ImageDecoder::decode_source(&bytes).unwrap();
    assert_eq!(image.dimensions(), (128, 192));
}

#[test]
fn abandoned_rar_stream_shuts_down() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixture(dir.path(), "sample.cbr");
    let mut stream = RarEntryStream::spawn(path, "c.png".into()).unwrap();
    let mut head = [0u8; 8];
    stream.read_exact(&mut head).unwrap();
    assert_eq!(&head, b"\x89PNG\r\n\x1a\n");
    // dropping mid-page must cancel and join the worker
    drop(stream);
}

#[test]
fn rar_cover_is_cached() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixture(dir.path(), "sample.cbr");
    let mut reader = Reader::open(&path, ReaderConfig::default()).unwrap();
    let cover = reader.cover().unwrap().unwrap();
    assert_eq!(cover.dimensions(), (200, 300));
    assert_eq!(cover.as_image().get_pixel(100, 150)[0], 1);
    assert!(dir.path().join(".thumbnails").join("sample.png").is_file());
}

#[test]
fn encrypted_rar_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixture(dir.path(), "locked.cbr");

    assert!(Reader::manages(&path, &ReaderConfig::default()));
    let err = Reader::open(&path, ReaderConfig::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Encrypted);
    assert!(!dir.path().join(".thumbnails").exists());

    let err = RarBackend::open(&path, true).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Encrypted);
}
