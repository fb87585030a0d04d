// lib/src/storage_engine/indexes.rs
//
// Composite index registry. A query over one field, or with nothing but
// equality filters and no ordering, is always served. Anything else needs a
// declared index on exactly the set of fields it references.

use std::collections::BTreeSet;

use models::{Collection, HospitalError, HospitalResult};
use tracing::warn;

use crate::config::IndexDefinition;
use crate::storage_engine::query::Query;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub collection: Collection,
    pub fields: BTreeSet<String>,
}

impl IndexSpec {
    pub fn new<S: Into<String>>(collection: Collection, fields: impl IntoIterator<Item = S>) -> Self {
        IndexSpec { collection, fields: fields.into_iter().map(Into::into).collect() }
    }

    fn describe(collection: Collection, fields: &[&str]) -> String {
        format!("{}({})", collection, fields.join(", "))
    }
}

#[derive(Debug, Clone)]
pub struct IndexRegistry {
    strict: bool,
    indexes: Vec<IndexSpec>,
}

impl Default for IndexRegistry {
    fn default() -> Self {
        IndexRegistry::permissive()
    }
}

impl IndexRegistry {
    /// Serves every query.
    pub fn permissive() -> Self {
        IndexRegistry { strict: false, indexes: Vec::new() }
    }

    pub fn strict(indexes: Vec<IndexSpec>) -> Self {
        IndexRegistry { strict: true, indexes }
    }

    /// Builds the registry from config. Entries naming an unknown collection
    /// are skipped with a warning.
    pub fn from_definitions(strict: bool, definitions: &[IndexDefinition]) -> Self {
        let indexes = definitions
            .iter()
            .filter_map(|def| match def.collection.parse::<Collection>() {
                Ok(collection) => Some(IndexSpec::new(collection, def.fields.iter().cloned())),
                Err(e) => {
                    warn!("Ignoring index definition: {}", e);
                    None
                }
            })
            .collect();
        IndexRegistry { strict, indexes }
    }

    pub fn declare(&mut self, spec: IndexSpec) {
        if !self.indexes.contains(&spec) {
            self.indexes.push(spec);
        }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Returns `MissingIndex` when the query needs an index nobody declared.
    pub fn check(&self, query: &Query) -> HospitalResult<()> {
        if !self.strict {
            return Ok(());
        }
        let fields = query.referenced_fields();
        let equality_only = query.order.is_empty() && query.filters.iter().all(|f| f.op.is_equality());
        if fields.len() <= 1 || equality_only {
            return Ok(());
        }
        let wanted: BTreeSet<String> = fields.iter().map(|f| f.to_string()).collect();
        let covered = self
            .indexes
            .iter()
            .any(|idx| idx.collection == query.collection && idx.fields == wanted);
        if covered {
            Ok(())
        } else {
            Err(HospitalError::MissingIndex(IndexSpec::describe(query.collection, &fields)))
        }
    }
}

/// The indexes the application's own queries rely on.
pub fn default_index_definitions() -> Vec<IndexDefinition> {
    let def = |fields: &[&str]| IndexDefinition {
        collection: Collection::Appointments.as_str().to_string(),
        fields: fields.iter().map(|f| f.to_string()).collect(),
    };
    vec![
        def(&["doctorId", "date", "time"]),
        def(&["patientId", "date", "time"]),
        def(&["date", "time"]),
        def(&["date", "status"]),
    ]
}
