//! Table-of-contents navigation parsing.
//!
//! Reads EPUB 3 navigation containers (`<nav epub:type="toc">`) into a tree
//! of [`NavPoint`]s built from the nested `<ol>/<li>/<a>` structure.
//!
//! ```rust
//! use folio::navigation::parse_nav_xhtml;
//!
//! let toc = parse_nav_xhtml(br#"<nav epub:type="toc"><h1>Contents</h1>
//!     <ol><li><a href="c1.xhtml">One</a></li></ol></nav>"#)
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(toc.heading.as_deref(), Some("Contents"));
//! assert_eq!(toc.entries[0].label, "One");
//! ```

extern crate alloc;

use alloc::string::String;
use alloc::vec::Vec;

use crate::markup::{MarkupError, MarkupTree, NodeId};

/// Maximum nesting honored when walking nested lists.
pub const MAX_NAV_DEPTH: usize = 32;

/// A single navigation point (table of contents entry).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NavPoint {
    /// Display label.
    pub label: String,
    /// Content href, when the entry links somewhere.
    pub href: Option<String>,
    /// Nested entries.
    pub children: Vec<NavPoint>,
}

/// Parsed table of contents.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableOfContents {
    /// Text of the first heading inside the container, if any.
    pub heading: Option<String>,
    /// Heading level (1..=6) of that heading.
    pub heading_level: Option<u8>,
    pub entries: Vec<NavPoint>,
}

impl TableOfContents {
    /// Total number of entries including nested ones.
    pub fn len(&self) -> usize {
        count_nav_points(&self.entries)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Flatten into `(depth, point)` pairs in reading order.
    pub fn flat(&self) -> Vec<(usize, &NavPoint)> {
        let mut result = Vec::with_capacity(8);
        flatten_nav_points(&self.entries, 0, &mut result);
        result
    }
}

fn count_nav_points(points: &[NavPoint]) -> usize {
    points
        .iter()
        .map(|p| 1 + count_nav_points(&p.children))
        .sum()
}

fn flatten_nav_points<'a>(
    points: &'a [NavPoint],
    depth: usize,
    result: &mut Vec<(usize, &'a NavPoint)>,
) {
    for point in points {
        result.push((depth, point));
        flatten_nav_points(&point.children, depth + 1, result);
    }
}

/// Parse nav markup and return its table of contents, if it has one.
pub fn parse_nav_xhtml(content: &[u8]) -> Result<Option<TableOfContents>, MarkupError> {
    let tree = MarkupTree::parse(content)?;
    Ok(find_toc_nav(&tree).map(|nav| toc_from_nav(&tree, nav)))
}

/// First `<nav>` whose `epub:type` (or `role="doc-toc"`) marks a ToC.
pub fn find_toc_nav(tree: &MarkupTree) -> Option<NodeId> {
    tree.descendants(tree.root()).find(|id| {
        let Some(el) = tree.element(*id) else {
            return false;
        };
        if el.name != "nav" {
            return false;
        }
        el.attrs.iter().any(|(key, value)| {
            let typed = key == "epub:type" || key.ends_with(":type") || key == "type";
            (typed && value.split_ascii_whitespace().any(|v| v == "toc"))
                || (key == "role" && value == "doc-toc")
        })
    })
}

/// Build a [`TableOfContents`] from a `<nav>` element.
pub fn toc_from_nav(tree: &MarkupTree, nav: NodeId) -> TableOfContents {
    let mut toc = TableOfContents::default();
    for id in tree.descendants(nav) {
        let Some(name) = tree.element_name(id) else {
            continue;
        };
        if toc.heading.is_none() {
            if let Some(level) = heading_level(name) {
                let text = clean_label(&tree.text_content(id));
                if !text.is_empty() {
                    toc.heading = Some(text);
                    toc.heading_level = Some(level);
                }
                continue;
            }
        }
        if matches!(name, "ol" | "ul") {
            toc.entries = list_entries(tree, id, 0);
            break;
        }
    }
    toc
}

fn list_entries(tree: &MarkupTree, list: NodeId, depth: usize) -> Vec<NavPoint> {
    let mut out = Vec::new();
    if depth >= MAX_NAV_DEPTH {
        log::warn!("ToC nesting exceeds {}; truncating", MAX_NAV_DEPTH);
        return out;
    }
    for &item in tree.children(list) {
        if tree.element_name(item) != Some("li") {
            continue;
        }
        let mut label = String::new();
        let mut href = None;
        let mut children = Vec::new();
        for &child in tree.children(item) {
            match tree.element_name(child) {
                Some("ol") | Some("ul") => {
                    children.extend(list_entries(tree, child, depth + 1));
                }
                Some(name) => {
                    if href.is_none() && name == "a" {
                        href = tree
                            .element(child)
                            .and_then(|el| el.attr("href"))
                            .map(String::from);
                    }
                    push_label(&mut label, &tree.text_content(child));
                }
                None => push_label(&mut label, &tree.text_content(child)),
            }
        }
        let label = clean_label(&label);
        if label.is_empty() && children.is_empty() {
            continue;
        }
        out.push(NavPoint {
            label,
            href,
            children,
        });
    }
    out
}

fn push_label(label: &mut String, text: &str) {
    if !label.is_empty() && !label.ends_with(' ') && !text.starts_with(' ') {
        label.push(' ');
    }
    label.push_str(text);
}

fn clean_label(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn heading_level(name: &str) -> Option<u8> {
    match name {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NESTED: &[u8] = br#"<html xmlns:epub="http://www.idpf.org/2007/ops"><body>
        <nav epub:type="toc" id="toc">
          <h2>Table of Contents</h2>
          <ol>
            <li><a href="ch1.xhtml">Chapter <em>One</em></a>
              <ol>
                <li><a href="ch1.xhtml#s1">Section 1.1</a></li>
                <li><a href="ch1.xhtml#s2">Section 1.2</a></li>
              </ol>
            </li>
            <li><a href="ch2.xhtml">Chapter Two</a></li>
          </ol>
        </nav>
        <nav epub:type="landmarks"><ol><li><a href="cover.xhtml">Cover</a></li></ol></nav>
        </body></html>"#;

    #[test]
    fn parses_nested_toc() {
        let toc = parse_nav_xhtml(NESTED).unwrap().unwrap();
        assert_eq!(toc.heading.as_deref(), Some("Table of Contents"));
        assert_eq!(toc.heading_level, Some(2));
        assert_eq!(toc.entries.len(), 2);
        assert_eq!(toc.entries[0].label, "Chapter One");
        assert_eq!(toc.entries[0].href.as_deref(), Some("ch1.xhtml"));
        assert_eq!(toc.entries[0].children.len(), 2);
        assert_eq!(toc.len(), 4);
    }

    #[test]
    fn flat_reports_depth() {
        let toc = parse_nav_xhtml(NESTED).unwrap().unwrap();
        let depths: Vec<(usize, &str)> = toc
            .flat()
            .into_iter()
            .map(|(depth, point)| (depth, point.label.as_str()))
            .collect();
        assert_eq!(
            depths,
            vec![
                (0, "Chapter One"),
                (1, "Section 1.1"),
                (1, "Section 1.2"),
                (0, "Chapter Two"),
            ]
        );
    }

    #[test]
    fn non_toc_nav_is_ignored() {
        let markup = br#"<nav epub:type="landmarks"><ol><li><a href="a">A</a></li></ol></nav>"#;
        assert_eq!(parse_nav_xhtml(markup).unwrap(), None);
    }

    #[test]
    fn span_entries_without_links_are_kept() {
        let markup = br#"<nav epub:type="toc"><ol><li><span>Part I</span><ol>
            <li><a href="x">Inner</a></li></ol></li></ol></nav>"#;
        let toc = parse_nav_xhtml(markup).unwrap().unwrap();
        assert_eq!(toc.entries[0].label, "Part I");
        assert_eq!(toc.entries[0].href, None);
        assert_eq!(toc.entries[0].children[0].label, "Inner");
    }
}
