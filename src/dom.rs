//! Page model - the DOM query surface the resolver and executor work against
//!
//! [`DomSurface`] is the narrow view of a page the core needs: the stack of
//! elements under a point, computed style, attributes and text. [`Document`]
//! is an in-memory implementation built from [`Element`] builders or loaded
//! from a JSON page snapshot.

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::error::Result;

/// Opaque handle to a node inside one document
pub type NodeId = usize;

/// Layout box in viewport coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        !self.is_empty()
            && x >= self.x
            && x < self.x + self.width
            && y >= self.y
            && y < self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Display {
    #[default]
    Block,
    Inline,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
    Collapse,
}

/// Declared style of one element. `visibility: None` inherits from the parent.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct Style {
    pub display: Display,
    pub visibility: Option<Visibility>,
    pub opacity: f32,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            display: Display::Block,
            visibility: None,
            opacity: 1.0,
        }
    }
}

/// Style after inheritance has been resolved
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComputedStyle {
    pub display: Display,
    pub visibility: Visibility,
    pub opacity: f32,
}

impl ComputedStyle {
    pub fn is_hidden(&self) -> bool {
        self.display == Display::None
            || self.visibility != Visibility::Visible
            || self.opacity <= 0.0
    }
}

/// Read-only view of a rendered page
pub trait DomSurface {
    /// All elements whose box contains the point, front-most first
    fn elements_from_point(&self, x: f64, y: f64) -> Vec<NodeId>;

    /// Lower-case tag name
    fn tag(&self, node: NodeId) -> &str;

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str>;

    /// Concatenated text of all descendant text nodes, like `textContent`
    fn text_content(&self, node: NodeId) -> String;

    fn computed_style(&self, node: NodeId) -> ComputedStyle;

    fn bounding_rect(&self, node: NodeId) -> Rect;

    /// Parent element, if any
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Links and buttons in document order
    fn interactive_elements(&self) -> Vec<NodeId>;

    /// Current text selection, trimmed
    fn selection_text(&self) -> String;
}

/// Builder for an element node
#[derive(Debug, Clone, Default)]
pub struct Element {
    tag: String,
    attributes: BTreeMap<String, String>,
    style: Style,
    rect: Rect,
    z_index: i32,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_lowercase(),
            ..Default::default()
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_lowercase(), value.to_string());
        self
    }

    pub fn rect(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.rect = Rect::new(x, y, width, height);
        self
    }

    pub fn display(mut self, display: Display) -> Self {
        self.style.display = display;
        self
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.style.visibility = Some(visibility);
        self
    }

    pub fn opacity(mut self, opacity: f32) -> Self {
        self.style.opacity = opacity;
        self
    }

    pub fn z_index(mut self, z: i32) -> Self {
        self.z_index = z;
        self
    }
}

#[derive(Debug, Clone)]
enum NodeKind {
    Element {
        tag: String,
        attributes: BTreeMap<String, String>,
        style: Style,
        rect: Rect,
        z_index: i32,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// In-memory document: an arena of element and text nodes
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    /// Slots of removed nodes, reused by later appends
    free: Vec<NodeId>,
    root: NodeId,
    selection: String,
}

impl Document {
    /// New document whose root element is `root`
    pub fn new(root: Element) -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            free: Vec::new(),
            root: 0,
            selection: String::new(),
        };
        doc.root = doc.push(None, element_kind(root));
        doc
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn append(&mut self, parent: NodeId, element: Element) -> NodeId {
        self.push(Some(parent), element_kind(element))
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.push(Some(parent), NodeKind::Text(text.to_string()))
    }

    fn push(&mut self, parent: Option<NodeId>, kind: NodeKind) -> NodeId {
        let node = Node {
            kind,
            parent,
            children: Vec::new(),
        };
        let id = match self.free.pop() {
            Some(id) => {
                self.nodes[id] = node;
                id
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };
        if let Some(p) = parent {
            self.nodes[p].children.push(id);
        }
        id
    }

    /// Unlink a node from its parent. The subtree stays in the arena but is
    /// no longer reachable from the root.
    pub fn detach(&mut self, node: NodeId) {
        if node == self.root {
            return;
        }
        if let Some(parent) = self.nodes[node].parent.take() {
            self.nodes[parent].children.retain(|&c| c != node);
        }
    }

    /// Detach a node and free its whole subtree for reuse. Ids of removed
    /// nodes must not be used afterwards.
    pub fn remove(&mut self, node: NodeId) {
        if node == self.root {
            return;
        }
        self.detach(node);
        let subtree: Vec<NodeId> = self.descendants(node).collect();
        for id in subtree {
            self.nodes[id] = Node {
                kind: NodeKind::Text(String::new()),
                parent: None,
                children: Vec::new(),
            };
            self.free.push(id);
        }
    }

    /// Replace all children of `node` with a single text node
    pub fn set_text(&mut self, node: NodeId, text: &str) {
        let children = std::mem::take(&mut self.nodes[node].children);
        for child in children {
            self.nodes[child].parent = None;
            self.remove(child);
        }
        self.append_text(node, text);
    }

    /// Arena slots in use or free; stays flat when nodes are replaced
    pub fn arena_len(&self) -> usize {
        self.nodes.len()
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let NodeKind::Element { attributes, .. } = &mut self.nodes[node].kind {
            attributes.insert(name.to_lowercase(), value.to_string());
        }
    }

    /// First attached element with the given `id` attribute
    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .find(|&n| self.element_attribute(n, "id") == Some(id))
    }

    /// First attached element with the given tag
    pub fn first_by_tag(&self, tag: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .find(|&n| self.element_tag(n) == Some(tag))
    }

    pub fn set_selection(&mut self, text: &str) {
        self.selection = text.to_string();
    }

    /// Attached nodes under `start` (inclusive) in document order
    fn descendants(&self, start: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut stack = vec![start];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(self.nodes[node].children.iter().rev());
            Some(node)
        })
    }

    fn element_tag(&self, node: NodeId) -> Option<&str> {
        match &self.nodes[node].kind {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Text(_) => None,
        }
    }

    fn element_attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[node].kind {
            NodeKind::Element { attributes, .. } => attributes.get(name).map(String::as_str),
            NodeKind::Text(_) => None,
        }
    }

    fn declared_style(&self, node: NodeId) -> Style {
        match &self.nodes[node].kind {
            NodeKind::Element { style, .. } => *style,
            NodeKind::Text(_) => Style::default(),
        }
    }
}

fn element_kind(element: Element) -> NodeKind {
    NodeKind::Element {
        tag: element.tag,
        attributes: element.attributes,
        style: element.style,
        rect: element.rect,
        z_index: element.z_index,
    }
}

impl DomSurface for Document {
    fn elements_from_point(&self, x: f64, y: f64) -> Vec<NodeId> {
        // Paint order: document order, so later nodes sit on top at equal z
        let mut hits: Vec<(i32, usize, NodeId)> = self
            .descendants(self.root)
            .enumerate()
            .filter_map(|(order, id)| match &self.nodes[id].kind {
                NodeKind::Element { rect, z_index, .. } if rect.contains(x, y) => {
                    Some((*z_index, order, id))
                }
                _ => None,
            })
            .collect();
        hits.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));
        hits.into_iter().map(|(_, _, id)| id).collect()
    }

    fn tag(&self, node: NodeId) -> &str {
        match &self.nodes[node].kind {
            NodeKind::Element { tag, .. } => tag,
            NodeKind::Text(_) => "#text",
        }
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element_attribute(node, name)
    }

    fn text_content(&self, node: NodeId) -> String {
        self.descendants(node)
            .filter_map(|n| match &self.nodes[n].kind {
                NodeKind::Text(text) => Some(text.as_str()),
                NodeKind::Element { .. } => None,
            })
            .collect()
    }

    fn computed_style(&self, node: NodeId) -> ComputedStyle {
        let own = self.declared_style(node);
        let mut display = own.display;
        let mut visibility = own.visibility;

        let mut current = self.nodes[node].parent;
        while let Some(ancestor) = current {
            let style = self.declared_style(ancestor);
            // display:none on any ancestor takes the subtree out of rendering
            if style.display == Display::None {
                display = Display::None;
            }
            if visibility.is_none() {
                visibility = style.visibility;
            }
            current = self.nodes[ancestor].parent;
        }

        ComputedStyle {
            display,
            visibility: visibility.unwrap_or_default(),
            opacity: own.opacity,
        }
    }

    fn bounding_rect(&self, node: NodeId) -> Rect {
        match &self.nodes[node].kind {
            NodeKind::Element { rect, .. } => *rect,
            NodeKind::Text(_) => Rect::default(),
        }
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node].parent
    }

    fn interactive_elements(&self) -> Vec<NodeId> {
        self.descendants(self.root)
            .filter(|&n| matches!(self.element_tag(n), Some("a" | "button")))
            .collect()
    }

    fn selection_text(&self) -> String {
        self.selection.trim().to_string()
    }
}

// ============================================================================
// JSON page snapshots
// ============================================================================

/// A page as captured for offline use: the URL, current selection and tree
#[derive(Debug, Deserialize)]
pub struct PageSnapshot {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub selection: String,
    pub document: ElementSnapshot,
}

#[derive(Debug, Deserialize)]
pub struct ElementSnapshot {
    pub tag: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub rect: Rect,
    #[serde(default)]
    pub style: Style,
    #[serde(default)]
    pub z_index: i32,
    #[serde(default)]
    pub children: Vec<SnapshotNode>,
}

/// A child is either a bare string (text node) or a nested element
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SnapshotNode {
    Text(String),
    Element(ElementSnapshot),
}

impl PageSnapshot {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn into_document(self) -> Document {
        let mut doc = Document::new(snapshot_element(&self.document));
        let root = doc.root();
        append_children(&mut doc, root, self.document.children);
        doc.set_selection(&self.selection);
        doc
    }
}

fn snapshot_element(snapshot: &ElementSnapshot) -> Element {
    Element {
        tag: snapshot.tag.to_lowercase(),
        attributes: snapshot
            .attributes
            .iter()
            .map(|(k, v)| (k.to_lowercase(), v.clone()))
            .collect(),
        style: snapshot.style,
        rect: snapshot.rect,
        z_index: snapshot.z_index,
    }
}

fn append_children(doc: &mut Document, parent: NodeId, children: Vec<SnapshotNode>) {
    for child in children {
        match child {
            SnapshotNode::Text(text) => {
                doc.append_text(parent, &text);
            }
            SnapshotNode::Element(element) => {
                let id = doc.append(parent, snapshot_element(&element));
                append_children(doc, id, element.children);
            }
        }
    }
}
