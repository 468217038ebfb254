//! Typed data access over one collection.
//!
//! `Repository<T, S>` encodes and decodes `T` through serde/bson and hands compiled `Query`
//! values to a [`Store`]. It holds no mutable state: clones and concurrent calls are
//! independent. Every operation runs under `RepositoryConfig::op_timeout`, emits one `dev6!`
//! trace line, and mutating operations write an audit line to `docrepo::audit`.

mod delete;
mod find;
mod pipeline;
mod write;

use crate::config::RepositoryConfig;
use crate::errors::{RepoError, StoreError};
use crate::store::{DocumentCursor, Store};
use bson::Document;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::marker::PhantomData;
use std::time::Instant;

pub struct Repository<T, S> {
    store: S,
    config: RepositoryConfig,
    _entity: PhantomData<fn() -> T>,
}

impl<T, S: Clone> Clone for Repository<T, S> {
    fn clone(&self) -> Self {
        Self { store: self.store.clone(), config: self.config.clone(), _entity: PhantomData }
    }
}

impl<T, S: Store> std::fmt::Debug for Repository<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("collection", &self.store.collection_name())
            .field("config", &self.config)
            .finish()
    }
}

impl<T, S: Store> Repository<T, S> {
    /// A repository with the default 15 second operation timeout.
    pub fn new(store: S) -> Self {
        Self::with_config(store, RepositoryConfig::default())
    }

    pub fn with_config(store: S, config: RepositoryConfig) -> Self {
        Self { store, config, _entity: PhantomData }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn collection_name(&self) -> &str {
        self.store.collection_name()
    }

    /// Runs `fut` under the operation timeout and records a trace line for it.
    async fn run<R, F>(&self, op: &'static str, fut: F) -> Result<R, RepoError>
    where
        F: Future<Output = Result<R, RepoError>>,
    {
        let started = Instant::now();
        let limit = self.config.op_timeout();
        let out = tokio::time::timeout(limit, fut).await.unwrap_or(Err(RepoError::Timeout(limit)));
        crate::dev6!(
            "{{\"bench\":\"repo\",\"op\":\"{}\",\"collection\":{:?},\"duration_ms\":{},\"ok\":{}}}",
            op,
            self.collection_name(),
            started.elapsed().as_millis(),
            out.is_ok()
        );
        if let Err(e) = &out {
            log::debug!("{op} on {} failed: {e}", self.collection_name());
        }
        out
    }
}

/// Decodes every remaining document of `cursor`.
async fn collect<R, C>(cursor: &mut C) -> Result<Vec<R>, RepoError>
where
    R: DeserializeOwned,
    C: DocumentCursor,
{
    let mut out = Vec::new();
    while let Some(doc) = cursor.next_document().await? {
        out.push(decode(doc)?);
    }
    Ok(out)
}

/// Drains `cursor`, then closes it whatever the outcome. A failed close is logged, not returned.
async fn drain_and_close<R, C>(cursor: &mut C, op: &str, collection: &str) -> Result<Vec<R>, RepoError>
where
    R: DeserializeOwned,
    C: DocumentCursor,
{
    let result = collect(cursor).await;
    if let Err(e) = cursor.close().await {
        log::warn!("{op} on {collection}: closing cursor failed: {e}");
    }
    result
}

fn decode<R: DeserializeOwned>(doc: Document) -> Result<R, RepoError> {
    bson::deserialize_from_document(doc).map_err(|e| RepoError::Store(StoreError::Bson(e)))
}
