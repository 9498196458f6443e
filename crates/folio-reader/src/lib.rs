//! Host-facing reader layer for `folio`.
//!
//! [`ReaderSession`] walks an EPUB chapter by chapter and page by page,
//! [`ComicSession`] pages through a CBZ with decoding offloaded to an
//! [`ImageLoader`] worker, and [`App`] dispatches rotary/keyboard
//! [`NavEvent`]s through the Library, Reader and options-modal states.

#![cfg_attr(
    not(test),
    deny(
        clippy::disallowed_methods,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::panic_in_result_fn,
        clippy::todo,
        clippy::unimplemented
    )
)]

pub mod app;
pub mod bookmarks;
pub mod comic;
pub mod config;
pub mod debounce;
pub mod image_loader;
pub mod session;

use core::fmt;

use folio::FolioError;
use folio_render::RenderError;

pub use app::{App, AppState, BookKind, LibraryItem, MenuOption, NavEvent, OpenBook};
pub use bookmarks::{BookId, Bookmark, BookmarkStore};
pub use comic::{ComicSession, NO_IMAGES_MESSAGE};
pub use config::{ConfigError, LoaderConfig, ReaderConfig};
pub use debounce::Debouncer;
pub use image_loader::{
    decode_page, DecodedPage, ImageLoader, LoadOutcome, LoadResult, PageImageSource,
};
pub use session::{Position, ReaderSession};

/// Reader-layer error.
#[derive(Debug)]
pub enum ReaderError {
    /// Container failure while opening a book.
    Folio(FolioError),
    /// Chapter preparation failure.
    Render(RenderError),
    /// The book has no readable chapters.
    NoChapters,
}

impl fmt::Display for ReaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Folio(err) => write!(f, "{}", err),
            Self::Render(err) => write!(f, "{}", err),
            Self::NoChapters => write!(f, "book has no chapters"),
        }
    }
}

impl std::error::Error for ReaderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Folio(err) => Some(err),
            Self::Render(err) => Some(err),
            Self::NoChapters => None,
        }
    }
}

impl From<FolioError> for ReaderError {
    fn from(value: FolioError) -> Self {
        Self::Folio(value)
    }
}

impl From<RenderError> for ReaderError {
    fn from(value: RenderError) -> Self {
        Self::Render(value)
    }
}
