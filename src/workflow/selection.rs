//! Ordered, duplicate-free set of documents staged for ingestion.

use serde::Serialize;

use crate::workflow::types::Document;

/// Documents staged for ingestion, in insertion order, unique by `id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SelectionSet {
    documents: Vec<Document>,
}

impl SelectionSet {
    /// Create an empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `document` unless a document with the same id is already staged.
    ///
    /// Returns `true` when the selection changed.
    pub fn insert(&mut self, document: Document) -> bool {
        if self.contains(&document.id) {
            return false;
        }
        self.documents.push(document);
        true
    }

    /// Remove the document with `id`. Returns `true` when the selection changed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.documents.len();
        self.documents.retain(|document| document.id != id);
        before != self.documents.len()
    }

    /// Whether a document with `id` is staged.
    pub fn contains(&self, id: &str) -> bool {
        self.documents.iter().any(|document| document.id == id)
    }

    /// Drop every staged document.
    pub fn clear(&mut self) {
        self.documents.clear();
    }

    /// Number of staged documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Staged documents in insertion order.
    pub fn as_slice(&self) -> &[Document] {
        &self.documents
    }

    /// Iterate over staged documents in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Document> {
        self.documents.iter()
    }
}

impl FromIterator<Document> for SelectionSet {
    fn from_iter<I: IntoIterator<Item = Document>>(iter: I) -> Self {
        let mut selection = Self::new();
        for document in iter {
            selection.insert(document);
        }
        selection
    }
}

impl<'a> IntoIterator for &'a SelectionSet {
    type Item = &'a Document;
    type IntoIter = std::slice::Iter<'a, Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
