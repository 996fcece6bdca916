use crate::types::DocumentId;
use bson::Document as BsonDocument;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Metadata {
    #[must_use]
    pub fn new() -> Self {
        let now = Utc::now();
        Self { created_at: now, updated_at: now }
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::new()
    }
}

/// A stored record: BSON payload plus the envelope the store maintains.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub data: BsonDocument,
    pub metadata: Metadata,
}

impl Document {
    #[must_use]
    pub fn new(data: BsonDocument) -> Self {
        Self { id: DocumentId::new(), data, metadata: Metadata::new() }
    }

    /// Replaces the payload and bumps `updated_at`.
    pub fn update(&mut self, new_data: BsonDocument) {
        self.data = new_data;
        self.metadata.updated_at = Utc::now();
    }
}
