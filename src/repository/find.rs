use super::{Repository, decode, drain_and_close};
use crate::errors::RepoError;
use crate::query::Query;
use crate::store::Store;
use serde::de::DeserializeOwned;

impl<T, S> Repository<T, S>
where
    T: DeserializeOwned + Send,
    S: Store,
{
    /// Every document matching `query`, decoded and fully materialized.
    ///
    /// Sort, skip, limit and projection come from the query's find options. The cursor is
    /// closed after the last document or the first error; a failed close is only logged.
    ///
    /// # Errors
    /// Store, decode and timeout errors.
    pub async fn find_all(&self, query: &Query) -> Result<Vec<T>, RepoError> {
        self.run("find_all", async {
            let mut cursor = self.store.find(query.filter(), query.find_options().clone()).await?;
            drain_and_close(&mut cursor, "find_all", self.collection_name()).await
        })
        .await
    }

    /// The first document matching `query` under its sort, or `None`.
    ///
    /// Limit and skip are ignored.
    ///
    /// # Errors
    /// Store, decode and timeout errors. No match is `Ok(None)`.
    pub async fn find_one(&self, query: &Query) -> Result<Option<T>, RepoError> {
        self.run("find_one", async {
            match self.store.find_one(query.filter(), query.find_one_options()).await? {
                Some(doc) => decode(doc).map(Some),
                None => Ok(None),
            }
        })
        .await
    }
}
