//! In-process document store.
//!
//! `MemoryEngine` owns a set of named collections; `MemoryCollection` is a cheap handle to one
//! of them and implements [`Store`]. Documents keep insertion order, which is the natural order
//! of unsorted finds.

mod cursor;
mod eval;
mod exec;
mod filter;
mod update;

pub use cursor::MemoryCursor;
pub use eval::{eval_filter, text_score};
pub use filter::{CmpOp, Filter, parse_filter};
pub use update::UpdateDoc;

use crate::errors::StoreError;
use crate::store::{
    CountOptions, DeleteOptions, DeleteReport, FindOneOptions, FindOptions, InsertReport, Store,
    UpdateOptions, UpdateReport,
};
use crate::types::ID_FIELD;
use async_trait::async_trait;
use bson::{Bson, Document, oid::ObjectId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

type Collections = HashMap<String, Vec<Document>>;

/// A set of named in-memory collections.
#[derive(Debug, Clone, Default)]
pub struct MemoryEngine {
    collections: Arc<RwLock<Collections>>,
}

impl MemoryEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle to `name`, creating the collection if needed.
    pub fn create_collection(&self, name: &str) -> MemoryCollection {
        self.collections.write().entry(name.to_string()).or_default();
        MemoryCollection { name: name.to_string(), collections: Arc::clone(&self.collections) }
    }

    pub fn get_collection(&self, name: &str) -> Option<MemoryCollection> {
        self.collections.read().contains_key(name).then(|| MemoryCollection {
            name: name.to_string(),
            collections: Arc::clone(&self.collections),
        })
    }

    pub fn delete_collection(&self, name: &str) -> bool {
        self.collections.write().remove(name).is_some()
    }

    #[must_use]
    pub fn list_collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }
}

/// Handle to one collection of a `MemoryEngine`.
#[derive(Debug, Clone)]
pub struct MemoryCollection {
    name: String,
    collections: Arc<RwLock<Collections>>,
}

impl MemoryCollection {
    #[must_use]
    pub fn name_str(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.collections.read().get(&self.name).map_or(0, Vec::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all documents in natural order.
    #[must_use]
    pub fn get_all_documents(&self) -> Vec<Document> {
        self.collections.read().get(&self.name).cloned().unwrap_or_default()
    }

    fn find_sync(&self, filter: &Document, opts: &FindOptions) -> Result<Vec<Document>, StoreError> {
        let parsed = parse_filter(filter)?;
        let cols = self.collections.read();
        let docs = cols.get(&self.name).map(Vec::as_slice).unwrap_or_default();
        exec::find_docs(docs, &parsed, opts)
    }

    fn insert_sync(&self, documents: Vec<Document>) -> Result<InsertReport, StoreError> {
        let mut cols = self.collections.write();
        let docs = cols.entry(self.name.clone()).or_default();
        let mut inserted_ids = Vec::with_capacity(documents.len());
        for mut doc in documents {
            let id = match doc.get(ID_FIELD) {
                Some(id) => id.clone(),
                None => {
                    let id = Bson::ObjectId(ObjectId::new());
                    doc.insert(ID_FIELD, id.clone());
                    id
                }
            };
            if docs.iter().any(|d| d.get(ID_FIELD).is_some_and(|existing| eval::bson_equal(existing, &id))) {
                return Err(StoreError::DuplicateKey(format!("{}: _id {id}", self.name)));
            }
            docs.push(doc);
            inserted_ids.push(Some(id));
        }
        Ok(InsertReport { inserted_ids })
    }

    fn update_sync(
        &self,
        filter: &Document,
        update: &Document,
        options: &UpdateOptions,
    ) -> Result<UpdateReport, StoreError> {
        let parsed = parse_filter(filter)?;
        let changes = UpdateDoc::parse(update)?;
        if changes.set.iter().any(|(k, _)| k == ID_FIELD) || changes.unset.iter().any(|k| k == ID_FIELD) {
            return Err(StoreError::Malformed { what: "update", reason: "_id is immutable".into() });
        }
        let mut cols = self.collections.write();
        let docs = cols.entry(self.name.clone()).or_default();
        if let Some(doc) = docs.iter_mut().find(|d| eval_filter(d, &parsed)) {
            let modified = changes.apply(doc);
            return Ok(UpdateReport { matched: 1, modified: u64::from(modified), upserted_id: None });
        }
        if !options.upsert {
            return Ok(UpdateReport::default());
        }
        let mut doc = update::upsert_seed(filter);
        changes.apply(&mut doc);
        let id = match doc.get(ID_FIELD) {
            Some(id) => id.clone(),
            None => {
                let id = Bson::ObjectId(ObjectId::new());
                doc.insert(ID_FIELD, id.clone());
                id
            }
        };
        docs.push(doc);
        Ok(UpdateReport { matched: 0, modified: 0, upserted_id: Some(id) })
    }

    fn delete_sync(&self, filter: &Document, many: bool) -> Result<DeleteReport, StoreError> {
        let parsed = parse_filter(filter)?;
        let mut cols = self.collections.write();
        let Some(docs) = cols.get_mut(&self.name) else { return Ok(DeleteReport::default()) };
        let before = docs.len();
        if many {
            docs.retain(|d| !eval_filter(d, &parsed));
        } else if let Some(pos) = docs.iter().position(|d| eval_filter(d, &parsed)) {
            docs.remove(pos);
        }
        Ok(DeleteReport { deleted: (before - docs.len()) as u64 })
    }

    fn aggregate_sync(&self, pipeline: &[Document]) -> Result<Vec<Document>, StoreError> {
        let cols = self.collections.read();
        let input = cols.get(&self.name).cloned().unwrap_or_default();
        exec::run_pipeline(&cols, input, pipeline)
    }
}

#[async_trait]
impl Store for MemoryCollection {
    type Cursor = MemoryCursor;

    fn collection_name(&self) -> &str {
        &self.name
    }

    async fn find(&self, filter: Document, options: FindOptions) -> Result<MemoryCursor, StoreError> {
        self.find_sync(&filter, &options).map(MemoryCursor::new)
    }

    async fn find_one(
        &self,
        filter: Document,
        options: FindOneOptions,
    ) -> Result<Option<Document>, StoreError> {
        let opts = FindOptions { sort: options.sort, limit: Some(1), skip: 0, projection: options.projection };
        Ok(self.find_sync(&filter, &opts)?.into_iter().next())
    }

    async fn count_documents(&self, filter: Document, options: CountOptions) -> Result<u64, StoreError> {
        let opts = FindOptions {
            limit: options.limit.map(|l| i64::try_from(l).unwrap_or(i64::MAX)),
            skip: options.skip,
            ..FindOptions::default()
        };
        Ok(self.find_sync(&filter, &opts)?.len() as u64)
    }

    async fn insert_many(&self, documents: Vec<Document>) -> Result<InsertReport, StoreError> {
        self.insert_sync(documents)
    }

    async fn update_one(
        &self,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> Result<UpdateReport, StoreError> {
        self.update_sync(&filter, &update, &options)
    }

    async fn delete_one(&self, filter: Document, _options: DeleteOptions) -> Result<DeleteReport, StoreError> {
        self.delete_sync(&filter, false)
    }

    async fn delete_many(&self, filter: Document, _options: DeleteOptions) -> Result<DeleteReport, StoreError> {
        self.delete_sync(&filter, true)
    }

    async fn aggregate(&self, pipeline: Vec<Document>) -> Result<MemoryCursor, StoreError> {
        self.aggregate_sync(&pipeline).map(MemoryCursor::new)
    }
}
