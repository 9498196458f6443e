//! Tolerant markup tree for chapter content.
//!
//! Chapter files are nominally XHTML but frequently are not well formed.
//! [`MarkupTree::parse`] builds an arena of element and text nodes from the
//! quick-xml event stream and recovers from the common breakages: unmatched
//! end tags are ignored, mismatched end tags close up to the nearest open
//! element of the same name, HTML void elements never take children, and
//! unknown entities are kept verbatim.

extern crate alloc;

use alloc::borrow::Cow;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

/// Markup that could not be tokenized at all.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarkupError {
    pub message: String,
    /// Byte offset where the tokenizer stopped.
    pub offset: usize,
}

impl fmt::Display for MarkupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "markup error at byte {}: {}", self.offset, self.message)
    }
}

impl std::error::Error for MarkupError {}

/// Index of a node in a [`MarkupTree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Element name (lowercase local name) and attributes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    /// Lowercased qualified keys (`epub:type`) with unescaped values.
    pub attrs: Vec<(String, String)>,
}

impl Element {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeData {
    /// Synthetic document root.
    Root,
    Element(Element),
    /// Raw text, entities resolved, whitespace untouched.
    Text(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    pub data: NodeData,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Arena-backed element tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarkupTree {
    nodes: Vec<Node>,
}

impl MarkupTree {
    /// Parse raw chapter bytes, decoding UTF-8 lossily.
    pub fn parse(bytes: &[u8]) -> Result<Self, MarkupError> {
        let text = String::from_utf8_lossy(bytes);
        Self::parse_str(&text)
    }

    pub fn parse_str(markup: &str) -> Result<Self, MarkupError> {
        let mut reader = Reader::from_str(markup);
        let config = reader.config_mut();
        config.trim_text(false);
        config.check_end_names = false;
        config.allow_unmatched_ends = true;

        let mut tree = Self {
            nodes: alloc::vec![Node {
                data: NodeData::Root,
                parent: None,
                children: Vec::new(),
            }],
        };
        let mut open: Vec<NodeId> = alloc::vec![tree.root()];
        let mut skip_depth = 0usize;

        loop {
            let event = reader.read_event().map_err(|err| MarkupError {
                message: alloc::format!("{}", err),
                offset: usize::try_from(reader.buffer_position()).unwrap_or(usize::MAX),
            })?;
            match event {
                Event::Start(e) => {
                    let element = element_from_start(&reader, &e);
                    if skip_depth > 0 || should_skip_tag(&element.name) {
                        if !is_void(&element.name) {
                            skip_depth += 1;
                        }
                        continue;
                    }
                    let void = is_void(&element.name);
                    let id = tree.append(current(&open), NodeData::Element(element));
                    if !void {
                        open.push(id);
                    }
                }
                Event::Empty(e) => {
                    if skip_depth > 0 {
                        continue;
                    }
                    let element = element_from_start(&reader, &e);
                    if should_skip_tag(&element.name) {
                        continue;
                    }
                    tree.append(current(&open), NodeData::Element(element));
                }
                Event::End(e) => {
                    let name = local_name(&reader, e.name().as_ref());
                    if skip_depth > 0 {
                        if should_skip_tag(&name) {
                            skip_depth -= 1;
                        }
                        continue;
                    }
                    if is_void(&name) {
                        continue;
                    }
                    // Pop to the nearest matching open element; ignore strays.
                    if let Some(pos) = open
                        .iter()
                        .rposition(|id| tree.element(*id).is_some_and(|el| el.name == name))
                    {
                        open.truncate(pos);
                    }
                }
                Event::Text(e) => {
                    if skip_depth > 0 {
                        continue;
                    }
                    let text = e.decode().map_err(|err| MarkupError {
                        message: alloc::format!("text decode: {}", err),
                        offset: usize::try_from(reader.buffer_position()).unwrap_or(usize::MAX),
                    })?;
                    tree.append_text(current(&open), &text);
                }
                Event::CData(e) => {
                    if skip_depth > 0 {
                        continue;
                    }
                    let text = reader.decoder().decode(&e).map_err(|err| MarkupError {
                        message: alloc::format!("cdata decode: {}", err),
                        offset: usize::try_from(reader.buffer_position()).unwrap_or(usize::MAX),
                    })?;
                    tree.append_text(current(&open), &text);
                }
                Event::GeneralRef(e) => {
                    if skip_depth > 0 {
                        continue;
                    }
                    let name = e.decode().map_err(|err| MarkupError {
                        message: alloc::format!("entity decode: {}", err),
                        offset: usize::try_from(reader.buffer_position()).unwrap_or(usize::MAX),
                    })?;
                    let resolved = resolve_entity(&name);
                    tree.append_text(current(&open), &resolved);
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(tree)
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes.get(id.0)?.data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn element_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.name.as_str())
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Proper ancestors of `id`, nearest first, ending at the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        core::iter::successors(self.parent(id), move |node| self.parent(*node))
    }

    /// `id` and all nodes below it in document order.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            tree: self,
            stack: alloc::vec![id],
        }
    }

    /// First element named `name` in document order.
    pub fn find_element(&self, name: &str) -> Option<NodeId> {
        self.descendants(self.root())
            .find(|id| self.element_name(*id) == Some(name))
    }

    /// `<body>` when present, otherwise the root.
    pub fn body(&self) -> NodeId {
        self.find_element("body").unwrap_or_else(|| self.root())
    }

    /// Concatenated text below `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        for node in self.descendants(id) {
            if let NodeData::Text(text) = &self.nodes[node.0].data {
                out.push_str(text);
            }
        }
        out
    }

    fn append(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            data,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Append text, merging into a directly preceding text sibling.
    fn append_text(&mut self, parent: NodeId, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(last) = self.nodes[parent.0].children.last().copied() {
            if let NodeData::Text(existing) = &mut self.nodes[last.0].data {
                existing.push_str(text);
                return;
            }
        }
        self.append(parent, NodeData::Text(String::from(text)));
    }
}

/// Pre-order walk over a subtree.
pub struct Descendants<'a> {
    tree: &'a MarkupTree,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.tree.children(id).iter().rev().copied());
        Some(id)
    }
}

fn current(open: &[NodeId]) -> NodeId {
    open.last().copied().unwrap_or(NodeId(0))
}

fn should_skip_tag(tag: &str) -> bool {
    matches!(tag, "script" | "style" | "head" | "noscript")
}

fn is_void(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "source"
            | "track"
            | "wbr"
    )
}

fn local_name(reader: &Reader<&[u8]>, raw: &[u8]) -> String {
    let decoded = reader
        .decoder()
        .decode(raw)
        .unwrap_or(Cow::Borrowed(""));
    let local = decoded.rsplit(':').next().unwrap_or(decoded.as_ref());
    local.to_ascii_lowercase()
}

fn element_from_start(reader: &Reader<&[u8]>, e: &BytesStart<'_>) -> Element {
    let name = local_name(reader, e.name().as_ref());
    let mut attrs = Vec::new();
    // Malformed attributes are dropped individually.
    for attr in e.attributes().with_checks(false).flatten() {
        let key = match reader.decoder().decode(attr.key.as_ref()) {
            Ok(key) => key.to_ascii_lowercase(),
            Err(_) => continue,
        };
        let raw = match reader.decoder().decode(attr.value.as_ref()) {
            Ok(value) => value.into_owned(),
            Err(_) => continue,
        };
        let value = match quick_xml::escape::unescape(&raw) {
            Ok(value) => value.into_owned(),
            Err(_) => raw,
        };
        attrs.push((key, value));
    }
    Element { name, attrs }
}

/// Resolve `&name;`, falling back to a few HTML entities and then to the
/// literal reference.
fn resolve_entity(name: &str) -> String {
    let reference = alloc::format!("&{};", name);
    if let Ok(resolved) = quick_xml::escape::unescape(&reference) {
        return resolved.into_owned();
    }
    let html = match name {
        "nbsp" => "\u{a0}",
        "ndash" => "\u{2013}",
        "mdash" => "\u{2014}",
        "hellip" => "\u{2026}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "ldquo" => "\u{201c}",
        "rdquo" => "\u{201d}",
        "copy" => "\u{a9}",
        "shy" => "",
        _ => return reference,
    };
    String::from(html)
}
