//! Book containers and styled chapter documents for small-screen readers.
//!
//! `folio` opens EPUB and CBZ files, converts chapter markup into an
//! immutable [`Document`] (styled blocks plus a flattened text stream with a
//! per-style range index), and exposes table-of-contents navigation.
//! Pagination and page projection live in `folio-render`.
//!
//! ```rust
//! use folio::{Converter, StyleTag};
//!
//! let doc = Converter::default().convert(b"<body><h1>Title</h1><p>Some <b>bold</b> text</p></body>");
//! assert_eq!(doc.text(), "Title\nSome bold text\n");
//! assert_eq!(doc.styles().ranges(StyleTag::Bold), &[11..15]);
//! ```

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

pub mod book;
pub mod cbz;
pub mod convert;
pub mod document;
pub mod error;
pub mod markup;
pub mod navigation;

pub use book::{ChapterSource, EpubBook, Metadata};
pub use cbz::CbzArchive;
pub use convert::{ConvertOptions, Converter};
pub use document::{
    Block, BlockKind, Document, Emphasis, Run, RunSpan, RunStyle, StyleIndex, StyleTag,
};
pub use error::{ErrorPhase, FolioError};
pub use markup::{MarkupError, MarkupTree};
pub use navigation::{NavPoint, TableOfContents};
