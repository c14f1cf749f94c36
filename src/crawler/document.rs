//! Document-order navigation over a parsed page
//!
//! Catalog pages have no stable structure, so the locator reasons about
//! "the next N elements after an anchor" in document order. `PageIndex`
//! flattens the element tree once so those walks are slices.

use scraper::{ElementRef, Html};

/// Every element of a document in document (pre-)order
pub struct PageIndex<'a> {
    elements: Vec<ElementRef<'a>>,
}

impl<'a> PageIndex<'a> {
    pub fn new(document: &'a Html) -> Self {
        let elements = document
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .collect();
        Self { elements }
    }

    pub fn elements(&self) -> &[ElementRef<'a>] {
        &self.elements
    }

    pub fn position(&self, element: ElementRef<'a>) -> Option<usize> {
        self.elements.iter().position(|e| *e == element)
    }

    /// Elements after `element` in document order, starting with its own
    /// descendants
    pub fn following(&self, element: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> + '_ {
        let start = self
            .position(element)
            .map_or(self.elements.len(), |p| p + 1);
        self.elements[start..].iter().copied()
    }

    /// Elements with the given tag name, in document order
    pub fn named<'s>(&'s self, name: &'s str) -> impl Iterator<Item = ElementRef<'a>> + 's {
        self.elements.iter().copied().filter(move |e| is_tag(*e, name))
    }
}

pub fn is_tag(element: ElementRef<'_>, name: &str) -> bool {
    element.value().name().eq_ignore_ascii_case(name)
}

/// Descendants of `element` with the given tag name, excluding `element` itself
pub fn descendants_named<'a>(
    element: ElementRef<'a>,
    name: &'a str,
) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    element
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .filter(move |e| is_tag(*e, name))
}

/// Nearest ancestor with the given tag name
pub fn nearest_ancestor<'a>(element: ElementRef<'a>, name: &str) -> Option<ElementRef<'a>> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|e| is_tag(*e, name))
}

/// Following sibling elements
pub fn next_sibling_elements<'a>(element: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    element.next_siblings().filter_map(ElementRef::wrap)
}

pub fn parent_element<'a>(element: ElementRef<'a>) -> Option<ElementRef<'a>> {
    element.parent().and_then(ElementRef::wrap)
}

/// Text of an element with every text fragment trimmed and the fragments
/// joined without separator
pub fn cell_text(element: ElementRef<'_>) -> String {
    element.text().map(str::trim).collect()
}

/// Replaces non-breaking spaces with ordinary spaces
pub fn normalize_spaces(text: &str) -> String {
    text.replace('\u{a0}', " ")
}
