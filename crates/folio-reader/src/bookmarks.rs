//! One bookmark per book, kept in memory.

use core::fmt;
use std::collections::HashMap;
use std::path::Path;

/// Stable identity of a book, normally its file path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BookId(String);

impl BookId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn from_path(path: &Path) -> Self {
        Self(path.to_string_lossy().into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A saved reading position. Comics use chapter 0 and the image index.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Bookmark {
    pub chapter: usize,
    pub page: usize,
}

impl Bookmark {
    pub const fn new(chapter: usize, page: usize) -> Self {
        Self { chapter, page }
    }

    /// Chapter index clamped into `[0, chapter_count)`.
    pub fn clamped_chapter(&self, chapter_count: usize) -> usize {
        self.chapter.min(chapter_count.saturating_sub(1))
    }

    /// Page index clamped into `[0, page_count)`.
    pub fn clamped_page(&self, page_count: usize) -> usize {
        self.page.min(page_count.saturating_sub(1))
    }
}

/// Bookmarks keyed by book. Dropping a bookmark overwrites the previous one.
#[derive(Clone, Debug, Default)]
pub struct BookmarkStore {
    marks: HashMap<BookId, Bookmark>,
}

impl BookmarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drop_bookmark(&mut self, book: &BookId, chapter: usize, page: usize) {
        log::debug!("bookmark {} at chapter {} page {}", book, chapter, page);
        self.marks.insert(book.clone(), Bookmark::new(chapter, page));
    }

    pub fn recall_bookmark(&self, book: &BookId) -> Option<Bookmark> {
        self.marks.get(book).copied()
    }

    pub fn remove(&mut self, book: &BookId) -> Option<Bookmark> {
        self.marks.remove(book)
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }
}
