//! Page navigation through a comic archive.

use std::path::Path;
use std::time::{Duration, Instant};

use folio::CbzArchive;
use folio_render::Viewport;
use image::GrayImage;

use crate::bookmarks::{BookId, Bookmark};
use crate::config::LoaderConfig;
use crate::debounce::Debouncer;
use crate::image_loader::{ImageLoader, LoadOutcome, PageImageSource};
use crate::session::Position;
use crate::ReaderError;

/// Label shown for an archive without image entries.
pub const NO_IMAGES_MESSAGE: &str = "No images found in CBZ.";

type Target = (usize, Viewport);

/// A comic positioned on one page.
///
/// Navigation and resizes update the position at once but reach the decoder
/// only after the debounce window settles; see [`ComicSession::tick`].
#[derive(Debug)]
pub struct ComicSession {
    id: BookId,
    title: String,
    loader: ImageLoader,
    index: usize,
    canvas: Viewport,
    debounce: Debouncer<Target>,
    requested: Option<Target>,
}

impl ComicSession {
    pub fn open_path(
        path: &Path,
        config: LoaderConfig,
        canvas: Viewport,
    ) -> Result<Self, ReaderError> {
        let archive = CbzArchive::open(path)?;
        let title = archive.title();
        Ok(Self::open(
            BookId::from_path(path),
            title,
            archive,
            config,
            canvas,
        ))
    }

    /// Start on the first page; its decode is requested right away.
    pub fn open<S: PageImageSource>(
        id: BookId,
        title: String,
        source: S,
        config: LoaderConfig,
        canvas: Viewport,
    ) -> Self {
        let loader = ImageLoader::new(source, config);
        let mut session = Self {
            id,
            title,
            loader,
            index: 0,
            canvas,
            debounce: Debouncer::new(config.debounce_window()),
            requested: None,
        };
        if session.page_count() > 0 {
            session.request((0, canvas));
        }
        session
    }

    pub fn id(&self) -> &BookId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn page_count(&self) -> usize {
        self.loader.page_count()
    }

    pub fn is_empty(&self) -> bool {
        self.page_count() == 0
    }

    pub fn canvas(&self) -> Viewport {
        self.canvas
    }

    pub fn loader(&self) -> &ImageLoader {
        &self.loader
    }

    pub fn current_position(&self) -> Position {
        Position {
            chapter: 0,
            page: self.index,
        }
    }

    pub fn next_page(&mut self, now: Instant) -> bool {
        if self.index + 1 >= self.page_count() {
            return false;
        }
        self.index += 1;
        self.schedule(now);
        true
    }

    pub fn prev_page(&mut self, now: Instant) -> bool {
        if self.index == 0 {
            return false;
        }
        self.index -= 1;
        self.schedule(now);
        true
    }

    /// Jump to `page`, clamped to the last page.
    pub fn goto_page(&mut self, page: usize, now: Instant) -> usize {
        let page = page.min(self.page_count().saturating_sub(1));
        if page != self.index {
            self.index = page;
            self.schedule(now);
        }
        self.index
    }

    pub fn set_canvas(&mut self, canvas: Viewport, now: Instant) -> bool {
        if canvas == self.canvas {
            return false;
        }
        self.canvas = canvas;
        self.schedule(now);
        true
    }

    pub fn bookmark(&self) -> Bookmark {
        Bookmark::new(0, self.index)
    }

    pub fn apply_bookmark(&mut self, mark: Bookmark, now: Instant) -> Position {
        self.goto_page(mark.clamped_page(self.page_count()), now);
        self.current_position()
    }

    /// Send a settled request to the decoder and pull finished work.
    ///
    /// Returns whether the displayed result changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        if let Some(target) = self.debounce.take_ready(now) {
            self.request(target);
        }
        self.loader.poll()
    }

    /// Skip the debounce window and block until the current page commits.
    pub fn wait(&mut self, timeout: Duration) -> bool {
        if let Some(target) = self.debounce.flush() {
            self.request(target);
        }
        self.loader.wait(timeout)
    }

    /// The last committed page, which may lag the position while loading.
    pub fn current(&self) -> Option<&LoadOutcome> {
        self.loader.current()
    }

    pub fn current_image(&self) -> Option<&GrayImage> {
        self.current().and_then(LoadOutcome::image)
    }

    pub fn is_loading(&self) -> bool {
        self.debounce.is_pending() || self.loader.is_loading()
    }

    /// `"Page P / N"`, or the empty-archive message.
    pub fn page_label(&self) -> String {
        if self.is_empty() {
            return String::from(NO_IMAGES_MESSAGE);
        }
        format!("Page {} / {}", self.index + 1, self.page_count())
    }

    fn schedule(&mut self, now: Instant) {
        self.debounce.schedule((self.index, self.canvas), now);
    }

    fn request(&mut self, target: Target) {
        if self.requested == Some(target) {
            return;
        }
        self.loader.request_page(target.0, target.1);
        self.requested = Some(target);
    }
}
