use std::sync::Arc;

use folio::{Block, BlockKind, Document, Emphasis, Run, RunStyle};
use folio_render::{
    is_partition, project_styles, FixedAdvanceMetrics, LayoutConfig, Page, Paginator, Viewport,
};
use proptest::prelude::*;

fn paginator(chunk_chars: usize) -> Paginator {
    let cfg = LayoutConfig {
        chunk_chars,
        ..LayoutConfig::default()
    };
    Paginator::new(cfg, Arc::new(FixedAdvanceMetrics::default()))
}

fn run_strategy() -> impl Strategy<Value = Run> {
    (
        prop::collection::vec("[a-z]{1,12}|é{1,3}|[A-Z][a-z]{0,8}", 1..12),
        0u8..4,
    )
        .prop_map(|(words, emphasis)| {
            let emphasis = match emphasis {
                0 => Emphasis::Plain,
                1 => Emphasis::Bold,
                2 => Emphasis::Italic,
                _ => Emphasis::BoldItalic,
            };
            Run::new(
                words.join(" ") + " ",
                RunStyle {
                    emphasis,
                    heading: None,
                },
            )
        })
}

fn block_strategy() -> impl Strategy<Value = Block> {
    (prop::collection::vec(run_strategy(), 1..5), 0u8..5).prop_map(|(runs, kind)| {
        if (1..=3).contains(&kind) {
            let runs = runs.into_iter().map(|run| {
                let mut style = run.style();
                style.heading = Some(kind);
                Run::new(run.text(), style)
            });
            Block::new(BlockKind::Heading(kind), runs)
        } else {
            Block::new(BlockKind::Paragraph, runs)
        }
    })
}

fn document_strategy() -> impl Strategy<Value = Document> {
    prop::collection::vec(block_strategy(), 0..40).prop_map(Document::from_blocks)
}

fn viewport_strategy() -> impl Strategy<Value = Viewport> {
    (1u32..900, 1u32..1200).prop_map(|(w, h)| Viewport::new(w, h))
}

proptest! {
    #[test]
    fn prop_pages_partition_document(
        doc in document_strategy(),
        viewport in viewport_strategy(),
        chunk in 1usize..96,
    ) {
        let pages = paginator(chunk).paginate(&doc, viewport);
        prop_assert!(is_partition(&pages, doc.len()), "pages={:?} len={}", pages, doc.len());
        if !doc.is_empty() {
            prop_assert!(pages.iter().all(|page| !page.is_empty()));
        }
        for page in &pages {
            prop_assert!(doc.text().is_char_boundary(page.start));
            prop_assert!(doc.text().is_char_boundary(page.end));
        }
    }

    #[test]
    fn prop_pagination_is_deterministic(
        doc in document_strategy(),
        viewport in viewport_strategy(),
    ) {
        let paginator = paginator(48);
        let first = paginator.paginate(&doc, viewport);
        let second = paginator.paginate(&doc.clone(), viewport);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_projection_stays_inside_page(
        doc in document_strategy(),
        viewport in viewport_strategy(),
    ) {
        for page in paginator(48).paginate(&doc, viewport) {
            for span in project_styles(doc.styles(), page) {
                prop_assert!(span.range.start < span.range.end);
                prop_assert!(span.range.end <= page.len());
            }
        }
    }
}

#[test]
fn taller_viewport_never_needs_more_pages() {
    let blocks = (0..60).map(|i| {
        Block::new(
            BlockKind::Paragraph,
            [Run::plain(format!("Paragraph {i} carries a sentence or two of text."))],
        )
    });
    let doc = Document::from_blocks(blocks);
    let paginator = paginator(48);
    let short = paginator.paginate(&doc, Viewport::new(320, 240));
    let tall = paginator.paginate(&doc, Viewport::new(320, 960));
    assert!(tall.len() <= short.len());
    assert_eq!(short.last().map(|p| p.end), Some(doc.len()));
}

#[test]
fn single_page_for_oversized_single_chunk() {
    let doc = Document::from_blocks([Block::new(
        BlockKind::Paragraph,
        [Run::plain("Supercalifragilistic")],
    )]);
    let pages = paginator(48).paginate(&doc, Viewport::new(40, 16));
    assert_eq!(pages, vec![Page::new(0, doc.len())]);
}
