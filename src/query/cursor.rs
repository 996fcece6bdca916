use crate::collection::Collection;
use crate::document::Document;
use crate::types::DocumentId;
use std::sync::Arc;

/// A forward-only cursor over query results.
///
/// A lazy cursor holds only ids and fetches documents as it advances; a
/// materialized cursor (after sort or projection) already holds the final
/// documents.
#[derive(Clone)]
pub struct Cursor {
    collection: Arc<Collection>,
    ids: Vec<DocumentId>,
    pos: usize,
    docs: Option<Vec<Document>>,
}

impl Cursor {
    pub(crate) fn lazy(collection: Arc<Collection>, ids: Vec<DocumentId>) -> Self {
        Self { collection, ids, pos: 0, docs: None }
    }

    pub(crate) fn materialized(collection: Arc<Collection>, docs: Vec<Document>) -> Self {
        Self { collection, ids: Vec::new(), pos: 0, docs: Some(docs) }
    }

    pub fn advance(&mut self) -> Option<Document> {
        if let Some(docs) = &self.docs {
            let doc = docs.get(self.pos)?.clone();
            self.pos += 1;
            return Some(doc);
        }
        // A document deleted mid-iteration is skipped, not an error.
        while self.pos < self.ids.len() {
            let id = self.ids[self.pos].clone();
            self.pos += 1;
            if let Some(doc) = self.collection.find_document(&id) {
                return Some(doc);
            }
        }
        None
    }

    #[must_use]
    pub fn to_vec(mut self) -> Vec<Document> {
        if let Some(docs) = self.docs.take() {
            return docs;
        }
        let mut out = Vec::with_capacity(self.ids.len().saturating_sub(self.pos));
        while let Some(doc) = self.advance() {
            out.push(doc);
        }
        out
    }
}

impl Iterator for Cursor {
    type Item = Document;
    fn next(&mut self) -> Option<Self::Item> {
        self.advance()
    }
}
