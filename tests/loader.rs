mod common;

use std::sync::Arc;

use comic_pages::loader::PageLoader;
use comic_pages::prelude::*;
use common::*;

fn loader_for(dir: &std::path::Path) -> PageLoader {
    let path = write_cbz(
        &dir.join("loader.cbz"),
        &[("1.png", png(64, 96, 1)), ("2.png", png(64, 96, 2))],
    );
    PageLoader::new(Reader::open(&path, ReaderConfig::default()).unwrap())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_requests_share_one_decode() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let loader = loader_for(dir.path());

    let first = loader.load(0);
    let second = loader.load(0);
    assert_eq!(loader.in_flight(), 1);

    let (a, b) = futures::join!(first, second);
    let a = a.unwrap().unwrap();
    let b = b.unwrap().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(page_tag(&a), 1);
    assert_eq!(loader.in_flight(), 0);
}

#[tokio::test]
async fn different_pages_load_independently() {
    let dir = tempfile::tempdir().unwrap();
    let loader = loader_for(dir.path());

    let first = loader.load(0);
    let second = loader.load(1);
    assert_eq!(loader.in_flight(), 2);

    let a = first.await.unwrap().unwrap();
    let b = second.await.unwrap().unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(page_tag(&b), 2);
}

#[tokio::test]
async fn finished_loads_are_not_reused() {
    let dir = tempfile::tempdir().unwrap();
    let loader = loader_for(dir.path());

    let a = loader.load(1).await.unwrap().unwrap();
    let b = loader.load(1).await.unwrap().unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(a.compose(), b.compose());
}

#[tokio::test]
async fn decode_errors_reach_every_waiter() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_cbz(&dir.path().join("bad.cbz"), &[("1.png", b"nope".to_vec())]);
    let loader = PageLoader::new(Reader::open(&path, ReaderConfig::default()).unwrap());

    let first = loader.load(0);
    let second = loader.load(0);
    let err_a = first.await.unwrap_err();
    let err_b = second.await.unwrap_err();
    assert!(Arc::ptr_eq(&err_a, &err_b));
    assert_eq!(err_a.kind(), ErrorKind::DecodeFailed);
}

#[tokio::test]
async fn reader_stays_usable_alongside_the_loader() {
    let dir = tempfile::tempdir().unwrap();
    let loader = loader_for(dir.path());
    {
        let reader = loader.reader();
        let mut reader = reader.lock().unwrap();
        reader.move_to(1);
        assert_eq!(reader.count(), 2);
    }
    let page = loader.load(1).await.unwrap().unwrap();
    assert_eq!(page_tag(&page), 2);
    assert_eq!(loader.reader().lock().unwrap().current_page(), 1);
}
