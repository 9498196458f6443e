use folio::{ChapterSource, ConvertOptions, Converter, Document, FolioError};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::render_ir::{project_page, Page, PageView};
use crate::render_layout::{LayoutConfig, Paginator, TextMetrics, Viewport};

/// Runtime diagnostics from conversion and pagination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderDiagnostic {
    /// Wall time of one pagination pass.
    ReflowTimeMs(u32),
    /// Chapter content was replaced by the placeholder document.
    ContentFallback {
        chapter_index: usize,
        reason: String,
    },
}

type DiagnosticCallback = Arc<Mutex<Box<dyn FnMut(RenderDiagnostic) + Send + 'static>>>;
type DiagnosticSink = Option<DiagnosticCallback>;

/// Render-engine options.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderEngineOptions {
    /// Converter options (recognized block tags).
    pub convert: ConvertOptions,
    /// Pagination options.
    pub layout: LayoutConfig,
}

/// A converted chapter and its pages for one viewport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedChapter {
    pub chapter_index: usize,
    pub document: Arc<Document>,
    pub pages: Vec<Page>,
    pub viewport: Viewport,
}

impl PreparedChapter {
    /// Always at least 1.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn last_page_index(&self) -> usize {
        self.pages.len().saturating_sub(1)
    }

    pub fn page(&self, index: usize) -> Option<Page> {
        self.pages.get(index).copied()
    }

    /// Text and page-relative styles of page `index`.
    pub fn view(&self, index: usize) -> Option<PageView<'_>> {
        project_page(&self.document, self.page(index)?)
    }
}

/// Converts chapters and paginates them against injected text metrics.
#[derive(Clone)]
pub struct RenderEngine {
    opts: RenderEngineOptions,
    converter: Converter,
    paginator: Paginator,
    diagnostic_sink: DiagnosticSink,
}

impl fmt::Debug for RenderEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderEngine")
            .field("opts", &self.opts)
            .field("paginator", &self.paginator)
            .finish_non_exhaustive()
    }
}

impl RenderEngine {
    pub fn new(opts: RenderEngineOptions, metrics: Arc<dyn TextMetrics>) -> Self {
        Self {
            converter: Converter::new(opts.convert.clone()),
            paginator: Paginator::new(opts.layout, metrics),
            opts,
            diagnostic_sink: None,
        }
    }

    pub fn options(&self) -> &RenderEngineOptions {
        &self.opts
    }

    /// Register or replace the diagnostics sink.
    pub fn set_diagnostic_sink<F>(&mut self, sink: F)
    where
        F: FnMut(RenderDiagnostic) + Send + 'static,
    {
        self.diagnostic_sink = Some(Arc::new(Mutex::new(Box::new(sink))));
    }

    fn emit_diagnostic(&self, diagnostic: RenderDiagnostic) {
        let Some(sink) = &self.diagnostic_sink else {
            return;
        };
        if let Ok(mut sink) = sink.lock() {
            sink(diagnostic);
        }
    }

    /// Convert chapter markup, substituting the placeholder on parse failure.
    pub fn convert_chapter(&self, chapter_index: usize, markup: &[u8]) -> Document {
        match self.converter.try_convert(markup) {
            Ok(doc) => doc,
            Err(err) => {
                log::warn!(
                    "chapter {} markup unreadable, showing placeholder: {}",
                    chapter_index,
                    err
                );
                self.fallback(chapter_index, err.to_string())
            }
        }
    }

    fn fallback(&self, chapter_index: usize, reason: String) -> Document {
        self.emit_diagnostic(RenderDiagnostic::ContentFallback {
            chapter_index,
            reason,
        });
        Document::placeholder()
    }

    /// Paginate `doc` for `viewport`.
    pub fn paginate(&self, doc: &Document, viewport: Viewport) -> Vec<Page> {
        let started = Instant::now();
        let pages = self.paginator.paginate(doc, viewport);
        let elapsed = started.elapsed().as_millis().min(u32::MAX as u128) as u32;
        log::debug!(
            "paginated {} bytes into {} pages in {} ms",
            doc.len(),
            pages.len(),
            elapsed
        );
        self.emit_diagnostic(RenderDiagnostic::ReflowTimeMs(elapsed));
        pages
    }

    /// Read, convert, and paginate one chapter.
    ///
    /// Only an out-of-range index is an error. Unreadable entries and bad
    /// markup produce the placeholder document.
    pub fn prepare_chapter<S>(
        &self,
        source: &mut S,
        chapter_index: usize,
        viewport: Viewport,
    ) -> Result<PreparedChapter, RenderError>
    where
        S: ChapterSource + ?Sized,
    {
        let count = source.chapter_count();
        if chapter_index >= count {
            return Err(RenderError::ChapterOutOfRange {
                index: chapter_index,
                count,
            });
        }
        let document = match source.read_chapter(chapter_index) {
            Ok(markup) => self.convert_chapter(chapter_index, &markup),
            Err(err @ FolioError::ChapterOutOfRange { .. }) => return Err(err.into()),
            Err(err) => {
                log::warn!(
                    "chapter {} unreadable, showing placeholder: {}",
                    chapter_index,
                    err
                );
                self.fallback(chapter_index, err.to_string())
            }
        };
        Ok(self.prepare_document(chapter_index, Arc::new(document), viewport))
    }

    /// Paginate an already converted document.
    pub fn prepare_document(
        &self,
        chapter_index: usize,
        document: Arc<Document>,
        viewport: Viewport,
    ) -> PreparedChapter {
        let pages = self.paginate(&document, viewport);
        PreparedChapter {
            chapter_index,
            document,
            pages,
            viewport,
        }
    }

    /// Recompute pages of `chapter` for a new viewport, reusing its document.
    pub fn reflow(&self, chapter: &PreparedChapter, viewport: Viewport) -> PreparedChapter {
        self.prepare_document(chapter.chapter_index, Arc::clone(&chapter.document), viewport)
    }
}

/// Render engine error.
#[derive(Debug)]
pub enum RenderError {
    /// Chapter index outside the book.
    ChapterOutOfRange { index: usize, count: usize },
    /// Container failure that cannot be replaced by a placeholder.
    Source(FolioError),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChapterOutOfRange { index, count } => {
                write!(f, "chapter {} out of range (count={})", index, count)
            }
            Self::Source(err) => write!(f, "chapter source failed: {}", err),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Source(err) => Some(err),
            Self::ChapterOutOfRange { .. } => None,
        }
    }
}

impl From<FolioError> for RenderError {
    fn from(value: FolioError) -> Self {
        match value {
            FolioError::ChapterOutOfRange { index, count } => {
                Self::ChapterOutOfRange { index, count }
            }
            other => Self::Source(other),
        }
    }
}
