// lib/src/storage_engine/mod.rs

pub mod indexes;
pub mod inmemory_storage;
pub mod query;
pub mod sled_storage;
pub mod watch;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use models::{Collection, Document, Fields, HospitalError, HospitalResult};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::StorageSettings;

pub use indexes::{IndexRegistry, IndexSpec};
pub use inmemory_storage::InMemoryStorage;
pub use query::{Direction, FilterOp, Query};
pub use sled_storage::SledStorage;
pub use watch::{ChangeFeed, QueryWatch, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageEngineType {
    #[serde(alias = "in-memory", alias = "memory")]
    InMemory,
    Sled,
}

impl fmt::Display for StorageEngineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageEngineType::InMemory => write!(f, "inmemory"),
            StorageEngineType::Sled => write!(f, "sled"),
        }
    }
}

impl FromStr for StorageEngineType {
    type Err = HospitalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "inmemory" | "in-memory" | "memory" => Ok(StorageEngineType::InMemory),
            "sled" => Ok(StorageEngineType::Sled),
            other => Err(HospitalError::ConfigurationError(format!("Unknown storage engine '{}'", other))),
        }
    }
}

/// A document database with collections of schemaless records, structured
/// queries and live result sets.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    fn engine_type(&self) -> StorageEngineType;

    /// Stores a new document under a generated id and returns the id.
    async fn add(&self, collection: Collection, data: Fields) -> HospitalResult<String>;

    /// Creates or replaces the document with the given id.
    async fn set(&self, collection: Collection, id: &str, data: Fields) -> HospitalResult<()>;

    /// Merges `patch` into an existing document. Fails with `NotFound` if
    /// there is no such document.
    async fn update(&self, collection: Collection, id: &str, patch: Fields) -> HospitalResult<()>;

    /// Deleting a missing document is not an error.
    async fn delete(&self, collection: Collection, id: &str) -> HospitalResult<()>;

    async fn get(&self, collection: Collection, id: &str) -> HospitalResult<Option<Document>>;

    async fn query(&self, query: &Query) -> HospitalResult<Vec<Document>>;

    /// Starts a live query. The first snapshot arrives immediately and a new
    /// one after every write to the collection.
    async fn watch(&self, query: Query) -> HospitalResult<QueryWatch>;

    async fn flush(&self) -> HospitalResult<()> {
        Ok(())
    }
}

/// Shallow merge: top-level fields in `patch` replace those in `target`.
pub fn merge_fields(target: &mut Fields, patch: Fields) {
    for (key, value) in patch {
        target.insert(key, value);
    }
}

pub async fn create_store(settings: &StorageSettings) -> HospitalResult<Arc<dyn DocumentStore>> {
    let indexes = IndexRegistry::from_definitions(settings.strict_indexes, &settings.indexes);
    let store: Arc<dyn DocumentStore> = match settings.engine {
        StorageEngineType::InMemory => Arc::new(InMemoryStorage::new(indexes)),
        StorageEngineType::Sled => Arc::new(SledStorage::open(&settings.data_directory, indexes)?),
    };
    info!("Document store ready ({})", settings.engine);
    Ok(store)
}
