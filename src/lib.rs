pub mod aggregate;
pub mod collection;
pub mod document;
pub mod errors;
pub mod logger;
pub mod observe;
pub mod query;
pub mod tours;
pub mod types;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::collection::Collection;
use crate::observe::QueryObserver;
use crate::tours::Tours;

/// Name of the collection backing tour records.
pub const TOURS_COLLECTION: &str = "tours";

/// The catalog: a set of named collections plus the lifecycle-wrapped handle
/// for tour records.
pub struct Catalog {
    collections: RwLock<HashMap<String, Arc<Collection>>>,
}

impl Catalog {
    #[must_use]
    pub fn new() -> Self {
        Self { collections: RwLock::new(HashMap::new()) }
    }

    /// Creates the collection if missing and returns a handle to it.
    pub fn create_collection(&self, name: &str) -> Arc<Collection> {
        let mut collections = self.collections.write();
        collections
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Collection::new(name.to_string())))
            .clone()
    }

    /// Retrieves a collection by its name.
    #[must_use]
    pub fn collection(&self, name: &str) -> Option<Arc<Collection>> {
        self.collections.read().get(name).cloned()
    }

    /// Deletes a collection by its name.
    pub fn drop_collection(&self, name: &str) -> bool {
        self.collections.write().remove(name).is_some()
    }

    /// Lists the names of all collections.
    #[must_use]
    pub fn list_collection_names(&self) -> Vec<String> {
        self.collections.read().keys().cloned().collect()
    }

    /// Lifecycle-enforcing handle over the tour collection.
    #[must_use]
    pub fn tours(&self) -> Tours {
        Tours::new(self.create_collection(TOURS_COLLECTION))
    }

    /// Same handle with a custom timing observer.
    #[must_use]
    pub fn tours_with_observer(&self, observer: Arc<dyn QueryObserver>) -> Tours {
        Tours::with_observer(self.create_collection(TOURS_COLLECTION), observer)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

/// Initializes the logging system.
///
/// This function should be called once, before any other catalog operations.
///
/// # Errors
/// Returns an error if a global logger is already installed.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    logger::init()
}
