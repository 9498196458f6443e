use core::ops::Range;
use folio::{Document, StyleIndex, StyleTag};
use serde::{Deserialize, Serialize};

/// Half-open byte range `[start, end)` into a document's flattened text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Page {
    pub start: usize,
    pub end: usize,
}

impl Page {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Whether `pages` tile `[0, len)` contiguously with at least one page.
pub fn is_partition(pages: &[Page], len: usize) -> bool {
    let (Some(first), Some(last)) = (pages.first(), pages.last()) else {
        return false;
    };
    first.start == 0
        && last.end == len
        && pages.iter().all(|page| page.start <= page.end)
        && pages.windows(2).all(|pair| pair[0].end == pair[1].start)
}

/// One style applied to a page-relative range.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StyleSpan {
    pub tag: StyleTag,
    /// Offsets relative to the page start.
    pub range: Range<usize>,
}

/// Text and page-relative styles for one page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageView<'a> {
    pub page: Page,
    pub text: &'a str,
    /// Sorted by tag, then by start.
    pub spans: Vec<StyleSpan>,
}

impl PageView<'_> {
    /// Spans carrying `tag`.
    pub fn spans_for(&self, tag: StyleTag) -> impl Iterator<Item = &Range<usize>> + '_ {
        self.spans
            .iter()
            .filter(move |span| span.tag == tag)
            .map(|span| &span.range)
    }
}

/// Extract the page text and clip styles to it.
///
/// Returns `None` when the page lies outside the document or splits a
/// UTF-8 sequence.
pub fn project_page(doc: &Document, page: Page) -> Option<PageView<'_>> {
    let text = doc.text().get(page.range())?;
    Some(PageView {
        page,
        text,
        spans: project_styles(doc.styles(), page),
    })
}

/// Clip every style range intersecting `page` and rebase it to the page
/// start. Ranges that miss the page are skipped.
pub fn project_styles(styles: &StyleIndex, page: Page) -> Vec<StyleSpan> {
    let mut out = Vec::new();
    if page.is_empty() {
        return out;
    }
    for (tag, ranges) in styles.iter() {
        let first = ranges.partition_point(|r| r.end <= page.start);
        for range in ranges[first..].iter().take_while(|r| r.start < page.end) {
            let start = range.start.max(page.start) - page.start;
            let end = range.end.min(page.end) - page.start;
            out.push(StyleSpan {
                tag,
                range: start..end,
            });
        }
    }
    out
}
