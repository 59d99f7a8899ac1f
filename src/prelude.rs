pub use crate::bitmap::{Bitmap, PixelBudget};
pub use crate::config::{DecodePolicy, NOFILE, ReaderConfig};
pub use crate::error::{ErrorKind, ReaderError};
pub use crate::model::{PageEntry, RenderMode, ThumbSize, Viewport};
pub use crate::reader::Reader;
pub use crate::tiles::TileCanvas;
pub use crate::{ArchiveBackend, BackendKind, DirBackend, RarBackend, ZipBackend};
