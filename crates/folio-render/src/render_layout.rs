use folio::{Document, StyleTag};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::render_ir::Page;

/// Text measurement capability supplied by the host.
///
/// Implementations must be pure: the same inputs always produce the same
/// answers, otherwise pagination stops being reproducible.
pub trait TextMetrics: Send + Sync {
    /// Line height in pixels for `style`.
    fn line_height(&self, style: StyleTag) -> u32;

    /// Number of visual lines `text` occupies when wrapped at `width_px`.
    /// `'\n'` inside `text` is a hard line break.
    fn wrapped_lines(&self, text: &str, style: StyleTag, width_px: u32) -> u32;
}

/// Drawing surface size in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(480, 800)
    }
}

/// Pagination settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Height reserved for the footer line.
    pub footer_height_px: u32,
    /// Slack subtracted from the usable height to absorb line-height rounding.
    pub safety_margin_px: u32,
    /// Gap after every block.
    pub paragraph_spacing_px: u32,
    /// Extra gap before and after heading blocks.
    pub heading_spacing_px: u32,
    /// Characters measured per step before extending to the next word break.
    pub chunk_chars: usize,
    /// Horizontal margin on each side.
    pub margin_x_px: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            footer_height_px: 28,
            safety_margin_px: 4,
            paragraph_spacing_px: 8,
            heading_spacing_px: 10,
            chunk_chars: 48,
            margin_x_px: 16,
        }
    }
}

impl LayoutConfig {
    /// Height available for text on one page.
    pub fn content_height(&self, viewport: Viewport) -> u32 {
        viewport
            .height
            .saturating_sub(self.footer_height_px)
            .saturating_sub(self.safety_margin_px)
    }

    /// Wrapping width for text.
    pub fn content_width(&self, viewport: Viewport) -> u32 {
        viewport
            .width
            .saturating_sub(self.margin_x_px.saturating_mul(2))
            .max(1)
    }
}

/// Greedy page splitter.
#[derive(Clone)]
pub struct Paginator {
    cfg: LayoutConfig,
    metrics: Arc<dyn TextMetrics>,
}

impl core::fmt::Debug for Paginator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Paginator")
            .field("cfg", &self.cfg)
            .finish_non_exhaustive()
    }
}

impl Paginator {
    pub fn new(cfg: LayoutConfig, metrics: Arc<dyn TextMetrics>) -> Self {
        Self { cfg, metrics }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.cfg
    }

    /// Split `doc` into contiguous pages that fit `viewport`.
    ///
    /// Pages always cover `[0, doc.len())` exactly. A chunk that does not fit
    /// an empty page is placed on it anyway, so every page holds content and
    /// an empty document still yields a single empty page.
    pub fn paginate(&self, doc: &Document, viewport: Viewport) -> Vec<Page> {
        if doc.is_empty() {
            return vec![Page::new(0, 0)];
        }
        let budget = u64::from(self.cfg.content_height(viewport));
        let width = self.cfg.content_width(viewport);
        let chunk_chars = self.cfg.chunk_chars.max(1);
        let text = doc.text();

        let mut pages = Vec::new();
        let mut page_start = 0usize;
        let mut used = 0u64;

        for (block, span) in doc.blocks().iter().zip(doc.block_spans()) {
            let tag = block.layout_tag();
            let line_height = u64::from(self.metrics.line_height(tag));
            let heading_gap = if tag.is_heading() {
                u64::from(self.cfg.heading_spacing_px)
            } else {
                0
            };

            // Portion of this block already placed on the current page.
            let mut fragment_start = span.start;
            let mut chunk_start = span.start;
            let mut fragment_lines = 0u32;

            loop {
                let end = next_chunk_end(text, chunk_start, span.end, chunk_chars);
                let closes_block = end == span.end;
                let trailing = if closes_block {
                    u64::from(self.cfg.paragraph_spacing_px) + heading_gap
                } else {
                    0
                };
                let leading = if chunk_start == span.start {
                    heading_gap
                } else {
                    0
                };

                let lines = self
                    .metrics
                    .wrapped_lines(&text[fragment_start..end], tag, width);
                let mut height = u64::from(lines.saturating_sub(fragment_lines)) * line_height
                    + leading
                    + trailing;
                let mut placed_lines = lines;

                if chunk_start > page_start && used + height > budget {
                    pages.push(Page::new(page_start, chunk_start));
                    page_start = chunk_start;
                    used = 0;
                    fragment_start = chunk_start;
                    placed_lines = self
                        .metrics
                        .wrapped_lines(&text[fragment_start..end], tag, width);
                    height = u64::from(placed_lines) * line_height + leading + trailing;
                }

                used += height;
                fragment_lines = placed_lines;
                if closes_block {
                    break;
                }
                chunk_start = end;
            }
        }

        pages.push(Page::new(page_start, text.len()));
        pages
    }
}

/// End of the chunk starting at `from`: `chunk_chars` characters, then on to
/// just past the next whitespace, capped at `block_end`.
fn next_chunk_end(text: &str, from: usize, block_end: usize, chunk_chars: usize) -> usize {
    let rest = &text[from..block_end];
    let Some((target, _)) = rest.char_indices().nth(chunk_chars) else {
        return block_end;
    };
    match rest[target..].char_indices().find(|(_, ch)| ch.is_whitespace()) {
        Some((offset, ch)) => {
            let end = from + target + offset + ch.len_utf8();
            end.min(block_end)
        }
        None => block_end,
    }
}

/// Monospace metrics: every character advances `advance_px`.
///
/// Useful for hosts without a font backend and for reproducible tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedAdvanceMetrics {
    pub advance_px: u32,
    pub base_line_px: u32,
    pub heading_line_px: [u32; 3],
}

impl Default for FixedAdvanceMetrics {
    fn default() -> Self {
        Self {
            advance_px: 8,
            base_line_px: 20,
            heading_line_px: [32, 28, 24],
        }
    }
}

impl FixedAdvanceMetrics {
    /// Uniform line height for every style.
    pub fn uniform(advance_px: u32, line_px: u32) -> Self {
        Self {
            advance_px,
            base_line_px: line_px,
            heading_line_px: [line_px; 3],
        }
    }

    fn columns(&self, width_px: u32) -> usize {
        (width_px / self.advance_px.max(1)).max(1) as usize
    }
}

impl TextMetrics for FixedAdvanceMetrics {
    fn line_height(&self, style: StyleTag) -> u32 {
        match style {
            StyleTag::Heading1 => self.heading_line_px[0],
            StyleTag::Heading2 => self.heading_line_px[1],
            StyleTag::Heading3 => self.heading_line_px[2],
            _ => self.base_line_px,
        }
    }

    fn wrapped_lines(&self, text: &str, _style: StyleTag, width_px: u32) -> u32 {
        let cols = self.columns(width_px);
        let segments: Vec<&str> = text.split('\n').collect();
        let last = segments.len().saturating_sub(1);
        let mut lines = 0u32;
        for (idx, segment) in segments.iter().enumerate() {
            if segment.trim().is_empty() {
                // Blank line between hard breaks; a trailing break adds nothing.
                if idx < last {
                    lines += 1;
                }
                continue;
            }
            lines += wrap_segment(segment, cols);
        }
        lines
    }
}

fn wrap_segment(segment: &str, cols: usize) -> u32 {
    let mut lines = 0u32;
    let mut col = 0usize;
    for word in segment.split_whitespace() {
        let mut width = word.chars().count();
        if col > 0 && col + 1 + width <= cols {
            col += 1 + width;
            continue;
        }
        lines += 1;
        while width > cols {
            width -= cols;
            lines += 1;
        }
        col = width;
    }
    lines
}
