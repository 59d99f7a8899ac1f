use serde::{Deserialize, Serialize};

/// One page of a comic, as listed by a backend.
///
/// `name` is the raw entry name (archive member path or file name) and is what
/// pages are ordered by. `index` is the backend's own locator for the entry:
/// the member index inside a ZIP, the position in the RAR listing, the
/// position in the directory scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageEntry {
    pub name: String,
    pub index: usize,
}

impl PageEntry {
    pub fn new(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }
}

/// The pixel area a page will be painted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Builds a viewport from the caller's `(w, h)` hint.
    ///
    /// Non-positive values mean "unset" and yield `None`.
    pub fn from_hint(width: i32, height: i32) -> Option<Self> {
        if width <= 0 || height <= 0 {
            return None;
        }
        Some(Self {
            width: width as u32,
            height: height as u32,
        })
    }

    pub fn is_portrait(&self) -> bool {
        self.height >= self.width
    }
}

/// How a [`TileCanvas`](crate::tiles::TileCanvas) is painted into a viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Every tile is stretched to `viewport / grid`; the page may distort.
    Stretched,
    /// Tiles are placed at native size from the top-left corner.
    CenteredOriginal,
    /// One uniform scale that fits the page, centered.
    #[default]
    CenteredFill,
}

/// Width and height of a cover thumbnail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ThumbSize {
    pub width: u32,
    pub height: u32,
}

impl Default for ThumbSize {
    fn default() -> Self {
        Self {
            width: 200,
            height: 300,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_viewport_hint() {
        assert_eq!(Viewport::from_hint(-1, -1), None);
        assert_eq!(Viewport::from_hint(800, 0), None);
        assert_eq!(
            Viewport::from_hint(800, 1200),
            Some(Viewport {
                width: 800,
                height: 1200
            })
        );
    }
}
