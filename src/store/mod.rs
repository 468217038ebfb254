//! The document-store collaborator contract consumed by `Repository`, and an in-process
//! implementation of it.
//!
//! A `Store` is bound to one collection. Filters and pipelines are plain `bson` values
//! compiled by the query builder; the store owns execution, cursor mechanics and transport.

pub mod memory;
mod options;

use crate::errors::StoreError;
use async_trait::async_trait;
use bson::Document;

pub use memory::{MemoryCollection, MemoryCursor, MemoryEngine};
pub use options::{
    CountOptions, DeleteOptions, DeleteReport, FindOneOptions, FindOptions, InsertReport,
    UpdateOptions, UpdateReport,
};

/// A server-side iterator over a result set. Callers must `close` it when done.
#[async_trait]
pub trait DocumentCursor: Send {
    /// Returns the next document, or `None` once the result set is exhausted.
    async fn next_document(&mut self) -> Result<Option<Document>, StoreError>;

    /// Releases the cursor. Calling it more than once must be harmless.
    async fn close(&mut self) -> Result<(), StoreError>;
}

/// One collection of a document database.
#[async_trait]
pub trait Store: Send + Sync {
    type Cursor: DocumentCursor;

    /// Name of the bound collection, used in logs.
    fn collection_name(&self) -> &str;

    async fn find(&self, filter: Document, options: FindOptions) -> Result<Self::Cursor, StoreError>;

    async fn find_one(
        &self,
        filter: Document,
        options: FindOneOptions,
    ) -> Result<Option<Document>, StoreError>;

    async fn count_documents(&self, filter: Document, options: CountOptions) -> Result<u64, StoreError>;

    async fn insert_many(&self, documents: Vec<Document>) -> Result<InsertReport, StoreError>;

    async fn update_one(
        &self,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> Result<UpdateReport, StoreError>;

    async fn delete_one(&self, filter: Document, options: DeleteOptions) -> Result<DeleteReport, StoreError>;

    async fn delete_many(&self, filter: Document, options: DeleteOptions) -> Result<DeleteReport, StoreError>;

    async fn aggregate(&self, pipeline: Vec<Document>) -> Result<Self::Cursor, StoreError>;
}
