//! Pointer tracking for cursor reading

use crate::clean::ReadableSnippet;
use crate::dom::{DomSurface, NodeId};
use crate::resolve::resolve_at;

/// Last known pointer position and the element last read there
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CursorState {
    pub x: f64,
    pub y: f64,
    last_element: Option<NodeId>,
}

impl CursorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_to(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
    }

    pub fn last_element(&self) -> Option<NodeId> {
        self.last_element
    }

    /// Readable text under the pointer, only when it resolves to a different
    /// element than the previous probe. Staying on the same element, or
    /// resolving nothing, yields `None` and keeps the remembered element.
    pub fn probe<D: DomSurface + ?Sized>(&mut self, dom: &D) -> Option<ReadableSnippet> {
        let resolved = resolve_at(dom, self.x, self.y)?;
        if self.last_element == Some(resolved.node) {
            return None;
        }
        self.last_element = Some(resolved.node);
        Some(ReadableSnippet::new(resolved.text))
    }

    /// Forget the remembered element, e.g. after the page reloads
    pub fn reset(&mut self) {
        self.last_element = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Document, Element};

    fn two_paragraphs() -> Document {
        let mut doc = Document::new(Element::new("body"));
        let a = doc.append(doc.root(), Element::new("p").rect(0.0, 0.0, 800.0, 20.0));
        doc.append_text(a, "First   paragraph");
        let b = doc.append(doc.root(), Element::new("p").rect(0.0, 40.0, 800.0, 20.0));
        doc.append_text(b, "Second paragraph");
        doc
    }

    #[test]
    fn test_reports_only_on_element_change() {
        let doc = two_paragraphs();
        let mut cursor = CursorState::new();

        cursor.move_to(10.0, 10.0);
        let snippet = cursor.probe(&doc).unwrap();
        assert_eq!(snippet.cleaned_text, "First paragraph");

        cursor.move_to(200.0, 5.0);
        assert_eq!(cursor.probe(&doc), None);

        cursor.move_to(10.0, 45.0);
        assert_eq!(cursor.probe(&doc).unwrap().cleaned_text, "Second paragraph");
    }

    #[test]
    fn test_nothing_readable_keeps_last_element() {
        let doc = two_paragraphs();
        let mut cursor = CursorState::new();
        cursor.move_to(10.0, 10.0);
        let first = cursor.probe(&doc);
        assert!(first.is_some());
        let remembered = cursor.last_element();

        // Gap between paragraphs: nothing is stacked there
        cursor.move_to(10.0, 30.0);
        assert_eq!(cursor.probe(&doc), None);
        assert_eq!(cursor.last_element(), remembered);

        cursor.move_to(10.0, 10.0);
        assert_eq!(cursor.probe(&doc), None);
    }

    #[test]
    fn test_reset_rereads() {
        let doc = two_paragraphs();
        let mut cursor = CursorState::new();
        cursor.move_to(10.0, 10.0);
        assert!(cursor.probe(&doc).is_some());
        cursor.reset();
        assert!(cursor.probe(&doc).is_some());
    }
}
