//! Readable-element resolution - "what text is under the mouse?"
//!
//! Given a viewport point, walk the stack of elements under it front to back
//! and pick the first one that is visible, holds real content and has
//! speakable text. Elements without text of their own get a short walk up
//! their ancestors, bounded so a tiny empty icon never resolves to the whole
//! page wrapper.

use crate::dom::{DomSurface, NodeId};

/// Containers that never hold content worth reading
const SKIP_TAGS: [&str; 8] = [
    "script", "style", "noscript", "meta", "link", "head", "select", "textarea",
];

/// Controls whose authored label beats their inner text
const LABELLED_TAGS: [&str; 3] = ["button", "input", "a"];

/// Levels examined per candidate: the element itself plus two ancestors
const MAX_WALK: usize = 3;

/// A resolved readable container and its raw text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub node: NodeId,
    pub text: String,
}

/// Resolve the readable element at viewport point `(x, y)`.
pub fn resolve_at<D: DomSurface + ?Sized>(dom: &D, x: f64, y: f64) -> Option<Resolved> {
    dom.elements_from_point(x, y)
        .into_iter()
        .find_map(|candidate| readable_container(dom, candidate))
        .map(|node| Resolved {
            node,
            text: element_text(dom, node),
        })
}

/// Nearest readable node for one stacked candidate, if any.
pub fn readable_container<D: DomSurface + ?Sized>(dom: &D, candidate: NodeId) -> Option<NodeId> {
    if !is_rendered(dom, candidate) || is_skipped(dom, candidate) {
        return None;
    }

    let mut current = Some(candidate);
    for _ in 0..MAX_WALK {
        let node = current?;
        // Ancestors are not in the hit stack, so their style is checked here
        if !is_skipped(dom, node) && has_readable_text(dom, node) {
            return Some(node);
        }
        current = dom.parent(node);
    }
    None
}

/// Text to speak for an element: authored labels first for controls.
pub fn element_text<D: DomSurface + ?Sized>(dom: &D, node: NodeId) -> String {
    if LABELLED_TAGS.contains(&dom.tag(node)) {
        if let Some(title) = dom.attribute(node, "title") {
            return title.to_string();
        }
        if let Some(label) = dom.attribute(node, "aria-label") {
            return label.to_string();
        }
    }
    dom.text_content(node)
}

/// Has at least one letter or digit; whitespace, punctuation and symbol
/// runs are not worth speaking
pub fn is_readable_text(text: &str) -> bool {
    text.chars().any(char::is_alphanumeric)
}

fn has_readable_text<D: DomSurface + ?Sized>(dom: &D, node: NodeId) -> bool {
    is_readable_text(&element_text(dom, node))
}

/// Hidden by style or denylisted
fn is_skipped<D: DomSurface + ?Sized>(dom: &D, node: NodeId) -> bool {
    dom.computed_style(node).is_hidden() || SKIP_TAGS.contains(&dom.tag(node))
}

/// Has a non-empty layout box
fn is_rendered<D: DomSurface + ?Sized>(dom: &D, node: NodeId) -> bool {
    !dom.bounding_rect(node).is_empty()
}
