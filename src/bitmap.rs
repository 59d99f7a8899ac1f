//! Decoded bitmaps and the pixel budget they are charged against.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use image::RgbaImage;

use crate::error::ReaderError;

/// Bytes per RGBA pixel.
const BYTES_PER_PIXEL: u64 = 4;

/// A shared allowance of decoded-pixel memory.
///
/// Every live [`Bitmap`] holds a reservation against the budget it was
/// created from; the bytes come back when the bitmap is dropped or recycled.
/// Clones share the same counter.
#[derive(Debug, Clone)]
pub struct PixelBudget {
    limit: Option<u64>,
    used: Arc<AtomicU64>,
}

impl PixelBudget {
    pub fn new(limit: Option<u64>) -> Self {
        Self {
            limit,
            used: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(None)
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// Bytes currently held by live bitmaps.
    pub fn used(&self) -> u64 {
        self.used.load(Ordering::Acquire)
    }

    /// Bytes a `width × height` RGBA bitmap needs.
    pub fn bytes_for(width: u32, height: u32) -> u64 {
        width as u64 * height as u64 * BYTES_PER_PIXEL
    }

    /// Try to take `bytes` out of the budget.
    ///
    /// Returns `None` when the reservation would overrun the limit.
    pub fn try_reserve(&self, bytes: u64) -> Option<Reservation> {
        let mut current = self.used.load(Ordering::Acquire);
        loop {
            let next = current.checked_add(bytes)?;
            if let Some(limit) = self.limit {
                if next > limit {
                    return None;
                }
            }
            match self.used.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return Some(Reservation {
                        bytes,
                        used: self.used.clone(),
                    });
                }
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for PixelBudget {
    fn default() -> Self {
        Self::unlimited()
    }
}

/// Bytes held against a [`PixelBudget`], released on drop.
#[derive(Debug)]
pub struct Reservation {
    bytes: u64,
    used: Arc<AtomicU64>,
}

impl Reservation {
    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.used.fetch_sub(self.bytes, Ordering::AcqRel);
    }
}

/// An RGBA image whose memory is accounted for in a [`PixelBudget`].
#[derive(Debug)]
pub struct Bitmap {
    image: RgbaImage,
    _reservation: Reservation,
}

impl Bitmap {
    /// Wrap an already-decoded image, charging its size to `budget`.
    pub fn from_image(image: RgbaImage, budget: &PixelBudget) -> Result<Self, ReaderError> {
        let bytes = PixelBudget::bytes_for(image.width(), image.height());
        let reservation = budget.try_reserve(bytes).ok_or(ReaderError::OutOfMemory)?;
        Ok(Self::with_reservation(image, reservation))
    }

    pub(crate) fn with_reservation(image: RgbaImage, reservation: Reservation) -> Self {
        Self {
            image,
            _reservation: reservation,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn is_portrait(&self) -> bool {
        self.height() >= self.width()
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    /// Turn the bitmap 90° clockwise, keeping its reservation.
    pub(crate) fn rotated90(self) -> Self {
        let Bitmap {
            image,
            _reservation,
        } = self;
        Self {
            image: image::imageops::rotate90(&image),
            _reservation,
        }
    }

    /// Detach the pixels from the budget.
    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Release the pixels now instead of whenever the value goes out of scope.
    pub fn recycle(self) {
        log::debug!("Recycling {}x{} bitmap", self.width(), self.height());
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reservations_are_returned_on_drop() {
        let budget = PixelBudget::new(Some(1000));
        let a = budget.try_reserve(600).unwrap();
        assert!(budget.try_reserve(600).is_none());
        assert_eq!(budget.used(), 600);
        drop(a);
        assert_eq!(budget.used(), 0);
        assert!(budget.try_reserve(1000).is_some());
    }

    #[test]
    fn recycle_releases_bitmap_memory() {
        let budget = PixelBudget::new(Some(PixelBudget::bytes_for(10, 10)));
        let bitmap = Bitmap::from_image(RgbaImage::new(10, 10), &budget).unwrap();
        assert_eq!(budget.used(), 400);
        assert!(matches!(
            Bitmap::from_image(RgbaImage::new(1, 1), &budget),
            Err(ReaderError::OutOfMemory)
        ));
        bitmap.recycle();
        assert_eq!(budget.used(), 0);
    }

    #[test]
    fn into_image_detaches_from_budget() {
        let budget = PixelBudget::unlimited();
        let bitmap = Bitmap::from_image(RgbaImage::new(4, 2), &budget).unwrap();
        let image = bitmap.into_image();
        assert_eq!(image.dimensions(), (4, 2));
        assert_eq!(budget.used(), 0);
    }
}
