// lib/src/storage_engine/sled_storage.rs
//
// One sled tree per collection; values are MessagePack-encoded field maps.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use models::{generate_document_id, Collection, Document, Fields, HospitalError, HospitalResult};
use sled::{Db, Tree};
use tracing::{debug, info, warn};

use super::indexes::IndexRegistry;
use super::query::Query;
use super::watch::{spawn_query_watch, ChangeFeed, QueryWatch};
use super::{merge_fields, DocumentStore, StorageEngineType};

#[derive(Debug, Clone)]
pub struct SledStorage {
    db: Db,
    indexes: Arc<IndexRegistry>,
    feed: ChangeFeed,
}

impl SledStorage {
    pub fn open(path: &Path, indexes: IndexRegistry) -> HospitalResult<Self> {
        std::fs::create_dir_all(path)?;
        let db = sled::open(path)
            .map_err(|e| HospitalError::StorageError(format!("Failed to open sled database at {:?}: {}", path, e)))?;
        info!("Opened sled database at {:?}", path);
        Ok(Self::with_db(db, indexes))
    }

    /// A database that is removed when dropped.
    pub fn temporary(indexes: IndexRegistry) -> HospitalResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self::with_db(db, indexes))
    }

    fn with_db(db: Db, indexes: IndexRegistry) -> Self {
        SledStorage { db, indexes: Arc::new(indexes), feed: ChangeFeed::new() }
    }

    fn tree(db: &Db, collection: Collection) -> HospitalResult<Tree> {
        Ok(db.open_tree(collection.as_str())?)
    }

    fn encode(fields: &Fields) -> HospitalResult<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(fields)?)
    }

    fn decode(bytes: &[u8]) -> HospitalResult<Fields> {
        Ok(rmp_serde::from_slice(bytes)?)
    }

    /// Records that fail to decode are logged and skipped.
    fn scan(db: &Db, query: &Query) -> HospitalResult<Vec<Document>> {
        let tree = Self::tree(db, query.collection)?;
        let mut docs = Vec::new();
        for entry in tree.iter() {
            let (key, value) = entry?;
            let id = String::from_utf8_lossy(&key).into_owned();
            match Self::decode(&value) {
                Ok(data) => docs.push(Document::new(id, data)),
                Err(e) => warn!("Skipping unreadable {}/{}: {}", query.collection, id, e),
            }
        }
        Ok(query.apply(docs))
    }
}

#[async_trait]
impl DocumentStore for SledStorage {
    fn engine_type(&self) -> StorageEngineType {
        StorageEngineType::Sled
    }

    async fn add(&self, collection: Collection, data: Fields) -> HospitalResult<String> {
        let id = generate_document_id();
        self.set(collection, &id, data).await?;
        Ok(id)
    }

    async fn set(&self, collection: Collection, id: &str, data: Fields) -> HospitalResult<()> {
        let tree = Self::tree(&self.db, collection)?;
        tree.insert(id.as_bytes(), Self::encode(&data)?)?;
        debug!("Stored {}/{}", collection, id);
        self.feed.publish(collection);
        Ok(())
    }

    async fn update(&self, collection: Collection, id: &str, patch: Fields) -> HospitalResult<()> {
        let tree = Self::tree(&self.db, collection)?;
        let bytes = tree
            .get(id.as_bytes())?
            .ok_or_else(|| HospitalError::not_found(collection.as_str(), id))?;
        let mut data = Self::decode(&bytes)?;
        merge_fields(&mut data, patch);
        tree.insert(id.as_bytes(), Self::encode(&data)?)?;
        self.feed.publish(collection);
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> HospitalResult<()> {
        let tree = Self::tree(&self.db, collection)?;
        if tree.remove(id.as_bytes())?.is_some() {
            self.feed.publish(collection);
        }
        Ok(())
    }

    async fn get(&self, collection: Collection, id: &str) -> HospitalResult<Option<Document>> {
        let tree = Self::tree(&self.db, collection)?;
        match tree.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(Document::new(id, Self::decode(&bytes)?))),
            None => Ok(None),
        }
    }

    async fn query(&self, query: &Query) -> HospitalResult<Vec<Document>> {
        self.indexes.check(query)?;
        Self::scan(&self.db, query)
    }

    async fn watch(&self, query: Query) -> HospitalResult<QueryWatch> {
        self.indexes.check(&query)?;
        let db = self.db.clone();
        let changes = self.feed.subscribe();
        Ok(spawn_query_watch(query, changes, move |q| {
            let db = db.clone();
            async move { SledStorage::scan(&db, &q) }
        }))
    }

    async fn flush(&self) -> HospitalResult<()> {
        self.db.flush_async().await?;
        Ok(())
    }
}
