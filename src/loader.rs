//! Single-flight page loading on top of a shared [`Reader`].
//!
//! At most one decode per page index runs at a time; anyone asking for a page
//! that is already being decoded awaits the same result. The decode itself is
//! blocking and runs on tokio's blocking pool.
//!
//! The loader only keeps weak references to pending loads. Once every caller
//! has dropped its handle (a page flip), the load is abandoned and no longer
//! counts as in flight.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};

use crate::prelude::*;

/// Outcome of one page load, shareable between every waiter.
pub type PageResult = Result<Option<Arc<TileCanvas>>, Arc<ReaderError>>;

/// A pending page. Clone it to wait from several places; a handle that is
/// never polled never starts the decode.
pub type PageHandle = Shared<BoxFuture<'static, PageResult>>;

type InFlight = Arc<Mutex<HashMap<usize, WeakShared<BoxFuture<'static, PageResult>>>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct PageLoader {
    reader: Arc<Mutex<Reader>>,
    in_flight: InFlight,
}

impl PageLoader {
    pub fn new(reader: Reader) -> Self {
        Self {
            reader: Arc::new(Mutex::new(reader)),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The wrapped reader, for cursor moves and metadata.
    pub fn reader(&self) -> Arc<Mutex<Reader>> {
        self.reader.clone()
    }

    /// Number of page loads currently pending and still wanted by a caller.
    pub fn in_flight(&self) -> usize {
        let mut in_flight = lock(&self.in_flight);
        in_flight.retain(|_, weak| weak.upgrade().is_some());
        in_flight.len()
    }

    /// Request page `page`, joining an identical request if one is pending.
    pub fn load(&self, page: usize) -> PageHandle {
        let mut in_flight = lock(&self.in_flight);
        if let Some(handle) = in_flight.get(&page).and_then(WeakShared::upgrade) {
            log::debug!("Page {} already loading", page);
            return handle;
        }
        in_flight.retain(|_, weak| weak.upgrade().is_some());

        let reader = self.reader.clone();
        let pending = self.in_flight.clone();
        let handle = async move {
            let result = tokio::task::spawn_blocking(move || {
                let mut reader = lock(&reader);
                let page = i32::try_from(page).unwrap_or(i32::MAX);
                reader.get(page)
            })
            .await;
            lock(&pending).remove(&page);

            match result {
                Ok(Ok(canvas)) => Ok(canvas.map(Arc::new)),
                Ok(Err(e)) => Err(Arc::new(e)),
                Err(e) => Err(Arc::new(ReaderError::DecodeFailed(format!(
                    "Page {} decode task failed: {}",
                    page, e
                )))),
            }
        }
        .boxed()
        .shared();

        if let Some(weak) = handle.downgrade() {
            in_flight.insert(page, weak);
        }
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn out_of_range_page_resolves_to_none() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["1.png", "2.png"] {
            image::RgbaImage::new(4, 6)
                .save(dir.path().join(name))
                .unwrap();
        }
        let reader = Reader::open(dir.path(), ReaderConfig::default()).unwrap();
        let loader = PageLoader::new(reader);
        assert!(loader.load(5).await.unwrap().is_none());
        assert_eq!(loader.in_flight(), 0);
    }

    #[tokio::test]
    async fn dropped_handles_are_forgotten() {
        let dir = tempfile::tempdir().unwrap();
        image::RgbaImage::new(4, 6)
            .save(dir.path().join("1.png"))
            .unwrap();
        let reader = Reader::open(dir.path(), ReaderConfig::default()).unwrap();
        let loader = PageLoader::new(reader);

        let handle = loader.load(0);
        assert_eq!(loader.in_flight(), 1);
        drop(handle);
        assert_eq!(loader.in_flight(), 0);

        // a fresh request starts over and completes
        assert!(loader.load(0).await.unwrap().is_some());
        assert_eq!(loader.in_flight(), 0);
    }
}
