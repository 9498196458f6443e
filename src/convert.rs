//! Markup-to-document conversion.
//!
//! Selects top-level block elements, walks their inline content with an
//! accumulated [`RunStyle`], and emits one [`Block`] per selected element.
//! Block elements nested inside a selected block are walked as inline
//! content of that block, bounded by a word space. Chapters containing a ToC
//! navigation container are rendered as a single indented
//! [`BlockKind::TableOfContents`] block.

extern crate alloc;

use alloc::string::String;
use alloc::vec::Vec;

use crate::document::{Block, BlockKind, Document, Emphasis, Run, RunStyle};
use crate::markup::{MarkupError, MarkupTree, NodeData, NodeId};
use crate::navigation::{find_toc_nav, toc_from_nav, TableOfContents};

/// Block-level tags recognized by default.
pub const DEFAULT_BLOCK_TAGS: &[&str] = &[
    "p",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "li",
    "blockquote",
    "pre",
    "div",
];

/// Spaces of indentation per ToC nesting level.
pub const TOC_INDENT: &str = "    ";

/// Converter configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Lowercase tag names treated as blocks.
    pub block_tags: Vec<String>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            block_tags: DEFAULT_BLOCK_TAGS.iter().map(|t| String::from(*t)).collect(),
        }
    }
}

impl ConvertOptions {
    pub fn with_block_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            block_tags: tags
                .into_iter()
                .map(|t| t.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    fn is_block(&self, name: &str) -> bool {
        self.block_tags.iter().any(|t| t == name)
    }
}

/// Chapter markup converter.
#[derive(Clone, Debug, Default)]
pub struct Converter {
    options: ConvertOptions,
}

impl Converter {
    pub fn new(options: ConvertOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Convert chapter bytes, substituting the placeholder document when the
    /// markup cannot be parsed.
    pub fn convert(&self, markup: &[u8]) -> Document {
        match self.try_convert(markup) {
            Ok(doc) => doc,
            Err(err) => {
                log::warn!("Chapter markup unreadable, using placeholder: {}", err);
                Document::placeholder()
            }
        }
    }

    /// Convert chapter bytes, surfacing tokenizer failures.
    pub fn try_convert(&self, markup: &[u8]) -> Result<Document, MarkupError> {
        let tree = MarkupTree::parse(markup)?;
        Ok(self.convert_tree(&tree))
    }

    pub fn convert_tree(&self, tree: &MarkupTree) -> Document {
        if let Some(nav) = find_toc_nav(tree) {
            let toc = toc_from_nav(tree, nav);
            if !toc.is_empty() {
                return Document::from_blocks([toc_block(&toc)]);
            }
        }

        let selected = self.select_blocks(tree);
        let mut emitter = Emitter::default();
        if selected.is_empty() {
            for &child in tree.children(tree.body()) {
                if let Some(name) = tree.element_name(child) {
                    emitter.begin(block_kind(name));
                    self.visit(tree, child, RunStyle::default(), &mut emitter, true);
                    emitter.finish();
                }
            }
        } else {
            for id in selected {
                let kind = tree.element_name(id).map(block_kind).unwrap_or_default();
                emitter.begin(kind);
                self.visit(tree, id, RunStyle::default(), &mut emitter, true);
                emitter.finish();
            }
        }
        Document::from_blocks(emitter.blocks)
    }

    /// Block elements with no block-tagged ancestor, in document order.
    fn select_blocks(&self, tree: &MarkupTree) -> Vec<NodeId> {
        tree.descendants(tree.root())
            .filter(|id| {
                tree.element_name(*id)
                    .is_some_and(|name| self.is_block(name))
            })
            .filter(|id| {
                !tree
                    .ancestors(*id)
                    .any(|a| tree.element_name(a).is_some_and(|name| self.is_block(name)))
            })
            .collect()
    }

    fn is_block(&self, name: &str) -> bool {
        self.options.is_block(name)
    }

    fn visit(
        &self,
        tree: &MarkupTree,
        id: NodeId,
        inherited: RunStyle,
        out: &mut Emitter,
        is_block_root: bool,
    ) {
        let node = tree.node(id);
        let name = match &node.data {
            NodeData::Text(text) => {
                out.push_text(text, inherited);
                return;
            }
            NodeData::Root => None,
            NodeData::Element(el) => Some(el.name.as_str()),
        };

        let mut style = inherited;
        let mut nested_block = false;
        if let Some(name) = name {
            match name {
                "b" | "strong" => style.emphasis = style.emphasis.with_bold(),
                "i" | "em" => style.emphasis = style.emphasis.with_italic(),
                "h1" => style.heading = Some(1),
                "h2" => style.heading = Some(2),
                "h3" => style.heading = Some(3),
                "br" => out.push_text(" ", inherited),
                _ => {}
            }
            nested_block = !is_block_root && self.is_block(name);
        }

        if nested_block {
            out.push_text(" ", inherited);
        }
        for &child in tree.children(id) {
            self.visit(tree, child, style, out, false);
        }
        if nested_block {
            out.push_text(" ", inherited);
        }
    }
}

/// Accumulates runs for the block currently being emitted.
#[derive(Default)]
struct Emitter {
    blocks: Vec<Block>,
    kind: BlockKind,
    runs: Vec<Run>,
    pending: String,
    pending_style: RunStyle,
    ends_with_space: bool,
}

impl Emitter {
    fn begin(&mut self, kind: BlockKind) {
        self.kind = kind;
        self.ends_with_space = true;
    }

    fn push_text(&mut self, raw: &str, style: RunStyle) {
        if raw.trim().is_empty() && raw != " " {
            return;
        }
        let normalized = normalize_whitespace(raw);
        let text = if self.ends_with_space {
            normalized.trim_start()
        } else {
            normalized.as_str()
        };
        if text.is_empty() {
            return;
        }
        if style != self.pending_style && !self.pending.is_empty() {
            self.flush_run();
        }
        self.pending_style = style;
        self.pending.push_str(text);
        self.ends_with_space = text.ends_with(' ');
    }

    fn flush_run(&mut self) {
        if !self.pending.is_empty() {
            let text = core::mem::take(&mut self.pending);
            self.runs.push(Run::new(text, self.pending_style));
        }
    }

    fn finish(&mut self) {
        self.flush_run();
        let runs = core::mem::take(&mut self.runs);
        let block = Block::new(self.kind, runs);
        if !block.is_blank() {
            self.blocks.push(block);
        }
        self.ends_with_space = true;
    }
}

fn block_kind(name: &str) -> BlockKind {
    match name {
        "h1" => BlockKind::Heading(1),
        "h2" => BlockKind::Heading(2),
        "h3" => BlockKind::Heading(3),
        "h4" => BlockKind::Heading(4),
        "h5" => BlockKind::Heading(5),
        "h6" => BlockKind::Heading(6),
        "li" => BlockKind::ListItem,
        _ => BlockKind::Paragraph,
    }
}

/// Drop carriage returns and collapse whitespace runs to a single space,
/// keeping one space at either edge.
fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_space = false;
    for ch in text.chars() {
        if ch == '\r' {
            continue;
        }
        if ch.is_whitespace() {
            if !prev_space {
                out.push(' ');
                prev_space = true;
            }
        } else {
            out.push(ch);
            prev_space = false;
        }
    }
    out
}

/// One block holding the heading line and one line per entry.
pub fn toc_block(toc: &TableOfContents) -> Block {
    let mut runs = Vec::with_capacity(toc.len() + 1);
    let flat = toc.flat();
    if let Some(heading) = &toc.heading {
        let mut style = RunStyle::default();
        match toc.heading_level {
            Some(level @ 1..=3) => style.heading = Some(level),
            _ => style.emphasis = Emphasis::Bold,
        }
        let mut text = heading.clone();
        if !flat.is_empty() {
            text.push('\n');
        }
        runs.push(Run::new(text, style));
    }
    let last = flat.len().saturating_sub(1);
    for (idx, (depth, point)) in flat.into_iter().enumerate() {
        let mut text = TOC_INDENT.repeat(depth);
        text.push_str(&point.label);
        if idx < last {
            text.push('\n');
        }
        runs.push(Run::plain(text));
    }
    Block::new(BlockKind::TableOfContents, runs)
}
