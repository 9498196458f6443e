//! Chapter and page navigation through one EPUB.

use std::path::Path;

use folio::{ChapterSource, Document, EpubBook};
use folio_render::{PageView, PreparedChapter, RenderEngine, Viewport};

use crate::bookmarks::{BookId, Bookmark};
use crate::ReaderError;

/// Chapter and page indices, both zero-based.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Position {
    pub chapter: usize,
    pub page: usize,
}

/// An open book positioned on one page of one prepared chapter.
///
/// Only the current chapter is converted and paginated. Crossing a chapter
/// boundary prepares the neighbour; a viewport change reflows the current
/// chapter and clamps the page index.
pub struct ReaderSession<S: ChapterSource = EpubBook> {
    id: BookId,
    title: String,
    source: S,
    engine: RenderEngine,
    chapter: PreparedChapter,
    page: usize,
}

impl<S: ChapterSource> core::fmt::Debug for ReaderSession<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ReaderSession")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("position", &self.current_position())
            .finish_non_exhaustive()
    }
}

impl ReaderSession<EpubBook> {
    /// Open the EPUB at `path` on its first page.
    pub fn open_path(
        path: &Path,
        engine: RenderEngine,
        viewport: Viewport,
    ) -> Result<Self, ReaderError> {
        let book = EpubBook::open(path)?;
        let title = book.title();
        Self::open(BookId::from_path(path), title, book, engine, viewport)
    }
}

impl<S: ChapterSource> ReaderSession<S> {
    /// Start reading `source` at chapter 0, page 0.
    pub fn open(
        id: BookId,
        title: String,
        mut source: S,
        engine: RenderEngine,
        viewport: Viewport,
    ) -> Result<Self, ReaderError> {
        if source.chapter_count() == 0 {
            return Err(ReaderError::NoChapters);
        }
        let chapter = engine.prepare_chapter(&mut source, 0, viewport)?;
        Ok(Self {
            id,
            title,
            source,
            engine,
            chapter,
            page: 0,
        })
    }

    pub fn id(&self) -> &BookId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn chapter_count(&self) -> usize {
        self.source.chapter_count()
    }

    pub fn page_count(&self) -> usize {
        self.chapter.page_count()
    }

    pub fn viewport(&self) -> Viewport {
        self.chapter.viewport
    }

    pub fn document(&self) -> &Document {
        &self.chapter.document
    }

    pub fn engine_mut(&mut self) -> &mut RenderEngine {
        &mut self.engine
    }

    pub fn current_position(&self) -> Position {
        Position {
            chapter: self.chapter.chapter_index,
            page: self.page,
        }
    }

    /// Advance one page, entering the next chapter at its end.
    ///
    /// Returns `false` on the last page of the last chapter.
    pub fn next_page(&mut self) -> Result<bool, ReaderError> {
        if self.page + 1 < self.chapter.page_count() {
            self.page += 1;
            return Ok(true);
        }
        let next = self.chapter.chapter_index + 1;
        if next >= self.chapter_count() {
            return Ok(false);
        }
        self.load_chapter(next)?;
        Ok(true)
    }

    /// Go back one page. Crossing into the previous chapter lands on its
    /// last page.
    ///
    /// Returns `false` on the first page of the first chapter.
    pub fn prev_page(&mut self) -> Result<bool, ReaderError> {
        if self.page > 0 {
            self.page -= 1;
            return Ok(true);
        }
        let Some(prev) = self.chapter.chapter_index.checked_sub(1) else {
            return Ok(false);
        };
        self.load_chapter(prev)?;
        self.page = self.chapter.last_page_index();
        Ok(true)
    }

    /// Convert and paginate chapter `index`, then show its first page.
    pub fn load_chapter(&mut self, index: usize) -> Result<(), ReaderError> {
        let viewport = self.viewport();
        self.chapter = self
            .engine
            .prepare_chapter(&mut self.source, index, viewport)?;
        self.page = 0;
        Ok(())
    }

    /// Jump to `page` in the current chapter, clamped to its last page.
    pub fn goto_page(&mut self, page: usize) -> usize {
        self.page = page.min(self.chapter.last_page_index());
        self.page
    }

    /// Reflow for a new surface size. Returns `false` if the size is
    /// unchanged and nothing was recomputed.
    pub fn set_viewport(&mut self, viewport: Viewport) -> bool {
        if viewport == self.viewport() {
            return false;
        }
        self.chapter = self.engine.reflow(&self.chapter, viewport);
        self.page = self.page.min(self.chapter.last_page_index());
        true
    }

    /// Navigate to `mark`: load its chapter, then clamp its page into the
    /// freshly computed page count.
    pub fn apply_bookmark(&mut self, mark: Bookmark) -> Result<Position, ReaderError> {
        self.load_chapter(mark.clamped_chapter(self.chapter_count()))?;
        self.page = mark.clamped_page(self.chapter.page_count());
        Ok(self.current_position())
    }

    pub fn bookmark(&self) -> Bookmark {
        let position = self.current_position();
        Bookmark::new(position.chapter, position.page)
    }

    /// Text and page-relative styles of the current page.
    pub fn page_view(&self) -> Option<PageView<'_>> {
        self.chapter.view(self.page)
    }

    /// `"Chapter X of Y"`, one-based.
    pub fn footer(&self) -> String {
        format!(
            "Chapter {} of {}",
            self.chapter.chapter_index + 1,
            self.chapter_count()
        )
    }

    /// `"P / N"` within the current chapter, one-based.
    pub fn page_label(&self) -> String {
        format!("{} / {}", self.page + 1, self.chapter.page_count())
    }
}
