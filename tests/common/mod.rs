#![allow(dead_code)]

use async_trait::async_trait;
use bson::{Document, oid::ObjectId};
use docrepo::store::{
    CountOptions, DeleteOptions, DeleteReport, FindOneOptions, FindOptions, InsertReport,
    MemoryCollection, MemoryCursor, UpdateOptions, UpdateReport,
};
use docrepo::{DocumentCursor, MemoryEngine, Store, StoreError, field_keys};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

field_keys! {
    pub enum UserField {
        Id => "_id",
        Name => "name",
        Status => "status",
        Age => "age",
        Tags => "tags",
        Bio => "bio",
        CreatedAt => "created_at",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    pub status: String,
    pub age: i32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub bio: String,
    pub created_at: i64,
}

pub fn user(name: &str, status: &str, age: i32, created_at: i64) -> User {
    User {
        id: None,
        name: name.to_string(),
        status: status.to_string(),
        age,
        tags: Vec::new(),
        bio: String::new(),
        created_at,
    }
}

pub fn users_collection() -> (MemoryEngine, MemoryCollection) {
    let engine = MemoryEngine::new();
    let users = engine.create_collection("users");
    (engine, users)
}

/// Wraps a `MemoryCollection`, recording the filters it receives and optionally failing cursor
/// closes or stalling every call.
#[derive(Clone)]
pub struct FaultyStore {
    inner: MemoryCollection,
    pub fail_close: bool,
    pub delay: Option<Duration>,
    pub calls: Arc<Mutex<Vec<(&'static str, Document)>>>,
    pub closes: Arc<AtomicUsize>,
}

impl FaultyStore {
    pub fn new(inner: MemoryCollection) -> Self {
        Self {
            inner,
            fail_close: false,
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn stalling(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<(&'static str, Document)> {
        self.calls.lock().clone()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    async fn enter(&self, op: &'static str, filter: &Document) {
        self.calls.lock().push((op, filter.clone()));
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
    }

    fn wrap(&self, inner: MemoryCursor) -> FaultyCursor {
        FaultyCursor { inner, fail_close: self.fail_close, closes: Arc::clone(&self.closes) }
    }
}

pub struct FaultyCursor {
    inner: MemoryCursor,
    fail_close: bool,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl DocumentCursor for FaultyCursor {
    async fn next_document(&mut self) -> Result<Option<Document>, StoreError> {
        self.inner.next_document().await
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.inner.close().await?;
        if self.fail_close {
            return Err(StoreError::Backend("connection reset while closing cursor".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for FaultyStore {
    type Cursor = FaultyCursor;

    fn collection_name(&self) -> &str {
        self.inner.collection_name()
    }

    async fn find(&self, filter: Document, options: FindOptions) -> Result<FaultyCursor, StoreError> {
        self.enter("find", &filter).await;
        Ok(self.wrap(self.inner.find(filter, options).await?))
    }

    async fn find_one(&self, filter: Document, options: FindOneOptions) -> Result<Option<Document>, StoreError> {
        self.enter("find_one", &filter).await;
        self.inner.find_one(filter, options).await
    }

    async fn count_documents(&self, filter: Document, options: CountOptions) -> Result<u64, StoreError> {
        self.enter("count_documents", &filter).await;
        self.inner.count_documents(filter, options).await
    }

    async fn insert_many(&self, documents: Vec<Document>) -> Result<InsertReport, StoreError> {
        self.enter("insert_many", &Document::new()).await;
        self.inner.insert_many(documents).await
    }

    async fn update_one(
        &self,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> Result<UpdateReport, StoreError> {
        self.enter("update_one", &filter).await;
        self.inner.update_one(filter, update, options).await
    }

    async fn delete_one(&self, filter: Document, options: DeleteOptions) -> Result<DeleteReport, StoreError> {
        self.enter("delete_one", &filter).await;
        self.inner.delete_one(filter, options).await
    }

    async fn delete_many(&self, filter: Document, options: DeleteOptions) -> Result<DeleteReport, StoreError> {
        self.enter("delete_many", &filter).await;
        self.inner.delete_many(filter, options).await
    }

    async fn aggregate(&self, pipeline: Vec<Document>) -> Result<FaultyCursor, StoreError> {
        self.enter("aggregate", &Document::new()).await;
        Ok(self.wrap(self.inner.aggregate(pipeline).await?))
    }
}
