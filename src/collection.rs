use crate::document::Document;
use crate::types::DocumentId;
use bson::{Bson, Document as BsonDocument};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Internal version marker stamped onto every stored payload. The default
/// projection strips it from read results.
pub const REVISION_FIELD: &str = "revision";

/// In-memory document store. Each call holds the collection lock for its
/// duration, so single-document operations are atomic; there are no
/// cross-call transaction guarantees.
pub struct Collection {
    name: String,
    docs: RwLock<BTreeMap<DocumentId, Document>>,
}

impl Collection {
    #[must_use]
    pub fn new(name: String) -> Self {
        Self { name, docs: RwLock::new(BTreeMap::new()) }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stores a new document and returns the stamped envelope.
    pub fn insert_document(&self, mut document: Document) -> Document {
        document.data.insert(REVISION_FIELD, Bson::Int64(0));
        let stored = document.clone();
        self.docs.write().insert(document.id.clone(), document);
        stored
    }

    #[must_use]
    pub fn find_document(&self, id: &DocumentId) -> Option<Document> {
        self.docs.read().get(id).cloned()
    }

    /// Replaces the payload of an existing document, bumping its revision
    /// marker, and returns the stored result. `None` if the id is unknown.
    pub fn update_document(&self, id: &DocumentId, mut new_data: BsonDocument) -> Option<Document> {
        let mut docs = self.docs.write();
        let doc = docs.get_mut(id)?;
        let revision = match doc.data.get(REVISION_FIELD) {
            Some(Bson::Int64(n)) => *n,
            _ => 0,
        };
        new_data.insert(REVISION_FIELD, Bson::Int64(revision + 1));
        doc.update(new_data);
        Some(doc.clone())
    }

    /// Removes a document, returning it. `None` if the id is unknown.
    pub fn delete_document(&self, id: &DocumentId) -> Option<Document> {
        self.docs.write().remove(id)
    }

    #[must_use]
    pub fn list_ids(&self) -> Vec<DocumentId> {
        self.docs.read().keys().cloned().collect()
    }

    #[must_use]
    pub fn get_all_documents(&self) -> Vec<Document> {
        self.docs.read().values().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }
}
