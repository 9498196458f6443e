//! Styled, flattened chapter documents.
//!
//! A [`Document`] holds the blocks of exactly one chapter together with a
//! flattened character stream (all run texts concatenated, one `'\n'` after
//! each block) and a per-style index of ranges into that stream.
//!
//! Offsets are UTF-8 byte offsets into [`Document::text`] and always fall on
//! `char` boundaries.

extern crate alloc;

use alloc::string::String;
use alloc::vec::Vec;
use core::ops::Range;
use smallvec::SmallVec;
use std::collections::BTreeMap;

/// Separator appended after every block in the flattened stream.
pub const BLOCK_SEPARATOR: char = '\n';

/// Text shown when a chapter cannot be decoded or parsed.
pub const PLACEHOLDER_TEXT: &str = "[content unavailable]";

/// Closed vocabulary of display styles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StyleTag {
    /// Unstyled body text.
    Base,
    Bold,
    Italic,
    /// Bold and italic active at once; never emitted as separate tags.
    BoldItalic,
    Heading1,
    Heading2,
    Heading3,
}

impl StyleTag {
    /// All tags in index order.
    pub const ALL: [StyleTag; 7] = [
        StyleTag::Base,
        StyleTag::Bold,
        StyleTag::Italic,
        StyleTag::BoldItalic,
        StyleTag::Heading1,
        StyleTag::Heading2,
        StyleTag::Heading3,
    ];

    /// Heading tag for levels 1..=3.
    pub fn heading(level: u8) -> Option<Self> {
        match level {
            1 => Some(Self::Heading1),
            2 => Some(Self::Heading2),
            3 => Some(Self::Heading3),
            _ => None,
        }
    }

    /// Whether this tag marks a heading.
    pub fn is_heading(self) -> bool {
        matches!(self, Self::Heading1 | Self::Heading2 | Self::Heading3)
    }

    /// Stable lowercase name, handy for host-side tag tables.
    pub fn name(self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Bold => "bold",
            Self::Italic => "italic",
            Self::BoldItalic => "bold_italic",
            Self::Heading1 => "h1",
            Self::Heading2 => "h2",
            Self::Heading3 => "h3",
        }
    }
}

/// Inline emphasis state accumulated while walking markup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Emphasis {
    #[default]
    Plain,
    Bold,
    Italic,
    BoldItalic,
}

impl Emphasis {
    /// Emphasis after entering a bold element.
    pub fn with_bold(self) -> Self {
        match self {
            Self::Plain | Self::Bold => Self::Bold,
            Self::Italic | Self::BoldItalic => Self::BoldItalic,
        }
    }

    /// Emphasis after entering an italic element.
    pub fn with_italic(self) -> Self {
        match self {
            Self::Plain | Self::Italic => Self::Italic,
            Self::Bold | Self::BoldItalic => Self::BoldItalic,
        }
    }

    fn tag(self) -> Option<StyleTag> {
        match self {
            Self::Plain => None,
            Self::Bold => Some(StyleTag::Bold),
            Self::Italic => Some(StyleTag::Italic),
            Self::BoldItalic => Some(StyleTag::BoldItalic),
        }
    }
}

/// Active style set for a run: one emphasis plus an optional heading level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RunStyle {
    pub emphasis: Emphasis,
    /// Heading level 1..=3 when the enclosing block is a styled heading.
    pub heading: Option<u8>,
}

impl RunStyle {
    /// Tags applied to this run's text. `Base` only when nothing else applies.
    pub fn tags(&self) -> SmallVec<[StyleTag; 2]> {
        let mut out = SmallVec::new();
        if let Some(tag) = self.emphasis.tag() {
            out.push(tag);
        }
        if let Some(tag) = self.heading.and_then(StyleTag::heading) {
            out.push(tag);
        }
        if out.is_empty() {
            out.push(StyleTag::Base);
        }
        out
    }

    /// Tag that drives line metrics: heading beats emphasis beats base.
    pub fn layout_tag(&self) -> StyleTag {
        self.heading
            .and_then(StyleTag::heading)
            .or_else(|| self.emphasis.tag())
            .unwrap_or(StyleTag::Base)
    }
}

/// Immutable styled text span.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Run {
    text: String,
    style: RunStyle,
}

impl Run {
    pub fn new(text: impl Into<String>, style: RunStyle) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }

    /// Unstyled run.
    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, RunStyle::default())
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn style(&self) -> RunStyle {
        self.style
    }
}

/// Semantic kind of a block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BlockKind {
    #[default]
    Paragraph,
    /// Heading by level (1..=6); only 1..=3 carry a heading style.
    Heading(u8),
    ListItem,
    /// Synthetic block holding a rendered table of contents.
    TableOfContents,
}

/// One semantic unit made of runs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Block {
    kind: BlockKind,
    runs: SmallVec<[Run; 2]>,
}

impl Block {
    pub fn new<I>(kind: BlockKind, runs: I) -> Self
    where
        I: IntoIterator<Item = Run>,
    {
        Self {
            kind,
            runs: runs.into_iter().collect(),
        }
    }

    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    /// Concatenated run text.
    pub fn text(&self) -> String {
        let mut out = String::with_capacity(self.runs.iter().map(|r| r.text.len()).sum());
        for run in &self.runs {
            out.push_str(&run.text);
        }
        out
    }

    /// True when the trimmed text is empty; such blocks are dropped.
    pub fn is_blank(&self) -> bool {
        self.runs.iter().all(|run| run.text.trim().is_empty())
    }

    /// Tag used to measure this block's lines.
    pub fn layout_tag(&self) -> StyleTag {
        if let BlockKind::Heading(level) = self.kind {
            if let Some(tag) = StyleTag::heading(level) {
                return tag;
            }
        }
        StyleTag::Base
    }

    /// Drop leading whitespace of the first run and trailing whitespace of
    /// the last run, removing runs left empty.
    fn trimmed(self) -> Self {
        let kind = self.kind;
        let mut runs: SmallVec<[Run; 2]> = self.runs;
        while let Some(first) = runs.first_mut() {
            let trimmed = first.text.trim_start();
            if trimmed.is_empty() {
                runs.remove(0);
                continue;
            }
            if trimmed.len() != first.text.len() {
                first.text = String::from(trimmed);
            }
            break;
        }
        while let Some(last) = runs.last_mut() {
            let trimmed = last.text.trim_end();
            if trimmed.is_empty() {
                runs.pop();
                continue;
            }
            if trimmed.len() != last.text.len() {
                last.text = String::from(trimmed);
            }
            break;
        }
        Self { kind, runs }
    }
}

/// Sorted, non-overlapping ranges per style.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StyleIndex {
    ranges: BTreeMap<StyleTag, Vec<Range<usize>>>,
}

impl StyleIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `range` under `tag`, merging with overlapping or touching ranges.
    pub fn insert(&mut self, tag: StyleTag, range: Range<usize>) {
        if range.start >= range.end {
            return;
        }
        let list = self.ranges.entry(tag).or_default();
        // Fast path: streams are built front to back.
        if let Some(last) = list.last_mut() {
            if last.end == range.start {
                last.end = range.end;
                return;
            }
            if last.end < range.start {
                list.push(range);
                return;
            }
        } else {
            list.push(range);
            return;
        }

        let first = list.partition_point(|r| r.end < range.start);
        let mut merged = range;
        let mut last = first;
        while last < list.len() && list[last].start <= merged.end {
            merged.start = merged.start.min(list[last].start);
            merged.end = merged.end.max(list[last].end);
            last += 1;
        }
        list.splice(first..last, core::iter::once(merged));
    }

    /// Ranges for one style, sorted by start.
    pub fn ranges(&self, tag: StyleTag) -> &[Range<usize>] {
        self.ranges.get(&tag).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterate styles that have at least one range.
    pub fn iter(&self) -> impl Iterator<Item = (StyleTag, &[Range<usize>])> {
        self.ranges
            .iter()
            .filter(|(_, list)| !list.is_empty())
            .map(|(tag, list)| (*tag, list.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.values().all(Vec::is_empty)
    }
}

impl FromIterator<(StyleTag, Range<usize>)> for StyleIndex {
    fn from_iter<T: IntoIterator<Item = (StyleTag, Range<usize>)>>(iter: T) -> Self {
        let mut index = Self::new();
        for (tag, range) in iter {
            index.insert(tag, range);
        }
        index
    }
}

/// Position of one run inside the flattened stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSpan {
    pub range: Range<usize>,
    pub style: RunStyle,
    /// Index into [`Document::blocks`].
    pub block: usize,
}

/// One chapter as styled blocks plus its flattened stream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Document {
    blocks: Vec<Block>,
    text: String,
    /// Block text ranges, excluding the trailing separator at `span.end`.
    block_spans: Vec<Range<usize>>,
    run_spans: Vec<RunSpan>,
    styles: StyleIndex,
}

impl Document {
    /// Build a document, trimming block edges and dropping blank blocks.
    pub fn from_blocks<I>(blocks: I) -> Self
    where
        I: IntoIterator<Item = Block>,
    {
        let mut doc = Self::default();
        for block in blocks {
            if block.is_blank() {
                continue;
            }
            doc.push_block(block.trimmed());
        }
        doc
    }

    /// Single-block document shown in place of unreadable content.
    pub fn placeholder() -> Self {
        Self::from_blocks([Block::new(
            BlockKind::Paragraph,
            [Run::plain(PLACEHOLDER_TEXT)],
        )])
    }

    fn push_block(&mut self, block: Block) {
        let block_idx = self.blocks.len();
        let block_start = self.text.len();
        for run in block.runs() {
            let start = self.text.len();
            self.text.push_str(run.text());
            let range = start..self.text.len();
            for tag in run.style().tags() {
                self.styles.insert(tag, range.clone());
            }
            self.run_spans.push(RunSpan {
                range,
                style: run.style(),
                block: block_idx,
            });
        }
        self.block_spans.push(block_start..self.text.len());
        self.text.push(BLOCK_SEPARATOR);
        self.blocks.push(block);
    }

    /// Flattened character stream.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Length of the flattened stream in bytes.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Block text ranges; the separator sits at each `range.end`.
    pub fn block_spans(&self) -> &[Range<usize>] {
        &self.block_spans
    }

    pub fn run_spans(&self) -> &[RunSpan] {
        &self.run_spans
    }

    pub fn styles(&self) -> &StyleIndex {
        &self.styles
    }

    /// Index of the block whose text or separator contains `offset`.
    pub fn block_index_at(&self, offset: usize) -> Option<usize> {
        let idx = self.block_spans.partition_point(|span| span.end < offset);
        (idx < self.block_spans.len()).then_some(idx)
    }
}
