//! Input dispatch across the library, reader and options modal.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use folio_render::{FixedAdvanceMetrics, RenderEngine, TextMetrics, Viewport};

use crate::bookmarks::{BookId, Bookmark, BookmarkStore};
use crate::comic::ComicSession;
use crate::config::ReaderConfig;
use crate::session::{Position, ReaderSession};
use crate::ReaderError;

/// Abstract input from a rotary encoder or keyboard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NavEvent {
    RotateCw,
    RotateCcw,
    Press,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AppState {
    #[default]
    Library,
    Reader,
    ModalOpen,
}

/// Entries of the reader options modal, in display order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MenuOption {
    DropBookmark,
    GoToBookmark,
    BackToLibrary,
    Cancel,
}

impl MenuOption {
    pub const ALL: [MenuOption; 4] = [
        MenuOption::DropBookmark,
        MenuOption::GoToBookmark,
        MenuOption::BackToLibrary,
        MenuOption::Cancel,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            MenuOption::DropBookmark => "Drop Bookmark",
            MenuOption::GoToBookmark => "Go to Bookmark",
            MenuOption::BackToLibrary => "Back to Library",
            MenuOption::Cancel => "Cancel",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BookKind {
    Epub,
    Cbz,
}

impl BookKind {
    /// Kind by file extension, case-insensitive.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        if ext.eq_ignore_ascii_case("epub") {
            Some(Self::Epub)
        } else if ext.eq_ignore_ascii_case("cbz") {
            Some(Self::Cbz)
        } else {
            None
        }
    }
}

/// A book the library can open.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LibraryItem {
    pub path: PathBuf,
    /// File stem until the book is opened.
    pub title: String,
    pub kind: BookKind,
}

impl LibraryItem {
    /// `None` for files that are neither EPUB nor CBZ.
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let kind = BookKind::from_path(&path)?;
        let title = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Some(Self { path, title, kind })
    }
}

/// The book currently in the reader.
#[derive(Debug)]
pub enum OpenBook {
    Epub(Box<ReaderSession>),
    Comic(ComicSession),
}

impl OpenBook {
    pub fn id(&self) -> &BookId {
        match self {
            Self::Epub(session) => session.id(),
            Self::Comic(comic) => comic.id(),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::Epub(session) => session.title(),
            Self::Comic(comic) => comic.title(),
        }
    }

    pub fn current_position(&self) -> Position {
        match self {
            Self::Epub(session) => session.current_position(),
            Self::Comic(comic) => comic.current_position(),
        }
    }

    pub fn next_page(&mut self, now: Instant) -> Result<bool, ReaderError> {
        match self {
            Self::Epub(session) => session.next_page(),
            Self::Comic(comic) => Ok(comic.next_page(now)),
        }
    }

    pub fn prev_page(&mut self, now: Instant) -> Result<bool, ReaderError> {
        match self {
            Self::Epub(session) => session.prev_page(),
            Self::Comic(comic) => Ok(comic.prev_page(now)),
        }
    }

    pub fn apply_bookmark(&mut self, mark: Bookmark, now: Instant) -> Result<Position, ReaderError> {
        match self {
            Self::Epub(session) => session.apply_bookmark(mark),
            Self::Comic(comic) => Ok(comic.apply_bookmark(mark, now)),
        }
    }

    /// Position string for the footer: `"P / N"` or `"Page P / N"`.
    pub fn page_label(&self) -> String {
        match self {
            Self::Epub(session) => session.page_label(),
            Self::Comic(comic) => comic.page_label(),
        }
    }

    /// `"Chapter X of Y"` for EPUBs.
    pub fn footer(&self) -> Option<String> {
        match self {
            Self::Epub(session) => Some(session.footer()),
            Self::Comic(_) => None,
        }
    }
}

/// Library / reader / options-modal state machine.
///
/// Every input goes through [`App::handle_event`], which interprets it by
/// the current state.
pub struct App {
    config: ReaderConfig,
    metrics: Arc<dyn TextMetrics>,
    library: Vec<LibraryItem>,
    selected: usize,
    state: AppState,
    menu_cursor: usize,
    book: Option<OpenBook>,
    bookmarks: BookmarkStore,
    viewport: Viewport,
    last_press: Option<Instant>,
}

impl core::fmt::Debug for App {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("App")
            .field("state", &self.state)
            .field("selected", &self.selected)
            .field("menu_cursor", &self.menu_cursor)
            .field("book", &self.book)
            .finish_non_exhaustive()
    }
}

impl App {
    /// An app measuring text with [`FixedAdvanceMetrics`].
    pub fn new(config: ReaderConfig, library: Vec<LibraryItem>) -> Self {
        Self::with_metrics(config, library, Arc::new(FixedAdvanceMetrics::default()))
    }

    pub fn with_metrics(
        config: ReaderConfig,
        library: Vec<LibraryItem>,
        metrics: Arc<dyn TextMetrics>,
    ) -> Self {
        Self {
            viewport: config.viewport,
            config,
            metrics,
            library,
            selected: 0,
            state: AppState::Library,
            menu_cursor: 0,
            book: None,
            bookmarks: BookmarkStore::new(),
            last_press: None,
        }
    }

    pub fn state(&self) -> AppState {
        self.state
    }

    pub fn library(&self) -> &[LibraryItem] {
        &self.library
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn selected_item(&self) -> Option<&LibraryItem> {
        self.library.get(self.selected)
    }

    /// Highlighted modal entry.
    pub fn highlighted_option(&self) -> MenuOption {
        MenuOption::ALL[self.menu_cursor % MenuOption::ALL.len()]
    }

    pub fn book(&self) -> Option<&OpenBook> {
        self.book.as_ref()
    }

    pub fn book_mut(&mut self) -> Option<&mut OpenBook> {
        self.book.as_mut()
    }

    pub fn bookmarks(&self) -> &BookmarkStore {
        &self.bookmarks
    }

    pub fn bookmarks_mut(&mut self) -> &mut BookmarkStore {
        &mut self.bookmarks
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Dispatch one input event. Returns the state after handling it.
    ///
    /// A failed open leaves the app in the library and returns the error.
    pub fn handle_event(&mut self, event: NavEvent, now: Instant) -> Result<AppState, ReaderError> {
        match (self.state, event) {
            (AppState::Library, NavEvent::RotateCw) => self.move_selection(1),
            (AppState::Library, NavEvent::RotateCcw) => self.move_selection(-1),
            (AppState::Library, NavEvent::Press) => {
                self.last_press = Some(now);
                if !self.library.is_empty() {
                    self.open_selected()?;
                }
            }
            (AppState::Reader, NavEvent::RotateCw) => {
                if let Some(book) = self.book.as_mut() {
                    book.next_page(now)?;
                }
            }
            (AppState::Reader, NavEvent::RotateCcw) => {
                if let Some(book) = self.book.as_mut() {
                    book.prev_page(now)?;
                }
            }
            (AppState::Reader, NavEvent::Press) => {
                if self.accept_press(now) {
                    self.menu_cursor = 0;
                    self.state = AppState::ModalOpen;
                }
            }
            (AppState::ModalOpen, NavEvent::RotateCw) => self.move_menu(1),
            (AppState::ModalOpen, NavEvent::RotateCcw) => self.move_menu(-1),
            (AppState::ModalOpen, NavEvent::Press) => {
                if self.accept_press(now) {
                    self.commit_option(self.highlighted_option(), now)?;
                }
            }
        }
        Ok(self.state)
    }

    /// Open the highlighted library item and enter the reader.
    pub fn open_selected(&mut self) -> Result<(), ReaderError> {
        let Some(item) = self.library.get(self.selected).cloned() else {
            return Ok(());
        };
        let opened = match item.kind {
            BookKind::Epub => {
                let engine = RenderEngine::new(self.config.engine_options(), Arc::clone(&self.metrics));
                ReaderSession::open_path(&item.path, engine, self.viewport)
                    .map(|session| OpenBook::Epub(Box::new(session)))
            }
            BookKind::Cbz => ComicSession::open_path(&item.path, self.config.loader, self.viewport)
                .map(OpenBook::Comic),
        };
        match opened {
            Ok(book) => {
                log::info!("opened {} ({})", book.title(), item.path.display());
                self.book = Some(book);
                self.menu_cursor = 0;
                self.state = AppState::Reader;
                Ok(())
            }
            Err(err) => {
                log::warn!("failed to open {}: {}", item.path.display(), err);
                Err(err)
            }
        }
    }

    /// Leave the reader or modal for the library.
    pub fn close_book(&mut self) {
        if let Some(book) = self.book.take() {
            log::info!("closed {}", book.title());
        }
        self.menu_cursor = 0;
        self.state = AppState::Library;
    }

    /// Propagate a surface size change to the open book.
    pub fn set_viewport(&mut self, viewport: Viewport, now: Instant) {
        self.viewport = viewport;
        match self.book.as_mut() {
            Some(OpenBook::Epub(session)) => {
                session.set_viewport(viewport);
            }
            Some(OpenBook::Comic(comic)) => {
                comic.set_canvas(viewport, now);
            }
            None => {}
        }
    }

    /// Drive background page loading. Returns whether the display changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.book.as_mut() {
            Some(OpenBook::Comic(comic)) => comic.tick(now),
            _ => false,
        }
    }

    fn move_selection(&mut self, step: isize) {
        self.selected = wrap(self.selected, step, self.library.len());
    }

    fn move_menu(&mut self, step: isize) {
        self.menu_cursor = wrap(self.menu_cursor, step, MenuOption::ALL.len());
    }

    fn accept_press(&mut self, now: Instant) -> bool {
        let guard = self.config.press_guard();
        if let Some(last) = self.last_press {
            if now.saturating_duration_since(last) < guard {
                return false;
            }
        }
        self.last_press = Some(now);
        true
    }

    fn commit_option(&mut self, option: MenuOption, now: Instant) -> Result<(), ReaderError> {
        match option {
            MenuOption::DropBookmark => {
                if let Some(book) = self.book.as_ref() {
                    let position = book.current_position();
                    self.bookmarks
                        .drop_bookmark(book.id(), position.chapter, position.page);
                }
            }
            MenuOption::GoToBookmark => {
                if let Some(book) = self.book.as_mut() {
                    match self.bookmarks.recall_bookmark(book.id()) {
                        Some(mark) => {
                            book.apply_bookmark(mark, now)?;
                        }
                        None => log::info!("no bookmark for {}", book.title()),
                    }
                }
            }
            MenuOption::BackToLibrary => {
                self.close_book();
                return Ok(());
            }
            MenuOption::Cancel => {}
        }
        self.state = AppState::Reader;
        Ok(())
    }
}

fn wrap(index: usize, step: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    (index as isize + step).rem_euclid(len as isize) as usize
}
