// lib/src/storage_engine/inmemory_storage.rs

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use models::{generate_document_id, Collection, Document, Fields, HospitalError, HospitalResult};
use tokio::sync::RwLock;
use tracing::debug;

use super::indexes::IndexRegistry;
use super::query::Query;
use super::watch::{spawn_query_watch, ChangeFeed, QueryWatch};
use super::{merge_fields, DocumentStore, StorageEngineType};

type Tables = HashMap<Collection, BTreeMap<String, Fields>>;

#[derive(Debug, Clone)]
pub struct InMemoryStorage {
    tables: Arc<RwLock<Tables>>,
    indexes: Arc<IndexRegistry>,
    feed: ChangeFeed,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        InMemoryStorage::new(IndexRegistry::permissive())
    }
}

impl InMemoryStorage {
    pub fn new(indexes: IndexRegistry) -> Self {
        InMemoryStorage {
            tables: Arc::new(RwLock::new(HashMap::new())),
            indexes: Arc::new(indexes),
            feed: ChangeFeed::new(),
        }
    }

    fn run(tables: &Tables, query: &Query) -> Vec<Document> {
        let docs = tables
            .get(&query.collection)
            .into_iter()
            .flat_map(|table| table.iter())
            .map(|(id, data)| Document::new(id.clone(), data.clone()));
        query.apply(docs)
    }
}

#[async_trait]
impl DocumentStore for InMemoryStorage {
    fn engine_type(&self) -> StorageEngineType {
        StorageEngineType::InMemory
    }

    async fn add(&self, collection: Collection, data: Fields) -> HospitalResult<String> {
        let id = generate_document_id();
        self.set(collection, &id, data).await?;
        Ok(id)
    }

    async fn set(&self, collection: Collection, id: &str, data: Fields) -> HospitalResult<()> {
        {
            let mut tables = self.tables.write().await;
            tables.entry(collection).or_default().insert(id.to_string(), data);
        }
        debug!("Stored {}/{}", collection, id);
        self.feed.publish(collection);
        Ok(())
    }

    async fn update(&self, collection: Collection, id: &str, patch: Fields) -> HospitalResult<()> {
        {
            let mut tables = self.tables.write().await;
            let existing = tables
                .get_mut(&collection)
                .and_then(|table| table.get_mut(id))
                .ok_or_else(|| HospitalError::not_found(collection.as_str(), id))?;
            merge_fields(existing, patch);
        }
        self.feed.publish(collection);
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> HospitalResult<()> {
        let removed = {
            let mut tables = self.tables.write().await;
            tables.get_mut(&collection).and_then(|table| table.remove(id)).is_some()
        };
        if removed {
            self.feed.publish(collection);
        }
        Ok(())
    }

    async fn get(&self, collection: Collection, id: &str) -> HospitalResult<Option<Document>> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(&collection)
            .and_then(|table| table.get(id))
            .map(|data| Document::new(id, data.clone())))
    }

    async fn query(&self, query: &Query) -> HospitalResult<Vec<Document>> {
        self.indexes.check(query)?;
        let tables = self.tables.read().await;
        Ok(Self::run(&tables, query))
    }

    async fn watch(&self, query: Query) -> HospitalResult<QueryWatch> {
        self.indexes.check(&query)?;
        let tables = self.tables.clone();
        let changes = self.feed.subscribe();
        Ok(spawn_query_watch(query, changes, move |q| {
            let tables = tables.clone();
            async move {
                let tables = tables.read().await;
                Ok(InMemoryStorage::run(&tables, &q))
            }
        }))
    }
}
