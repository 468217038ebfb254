use super::{Repository, drain_and_close};
use crate::errors::RepoError;
use crate::query::Query;
use crate::store::Store;
use serde::de::DeserializeOwned;

impl<T, S: Store> Repository<T, S> {
    /// Runs `query`'s aggregation pipeline and decodes each output document as `R`.
    ///
    /// `R` need not be `T`. The cursor is closed the same way as in `find_all`.
    ///
    /// # Errors
    /// Store, decode and timeout errors.
    pub async fn aggregate<R>(&self, query: &Query) -> Result<Vec<R>, RepoError>
    where
        R: DeserializeOwned + Send,
    {
        self.run("aggregate", async {
            let mut cursor = self.store.aggregate(query.pipeline().to_vec()).await?;
            drain_and_close(&mut cursor, "aggregate", self.collection_name()).await
        })
        .await
    }

    /// Number of documents matching `query`, honoring its limit and skip.
    ///
    /// # Errors
    /// Store and timeout errors.
    pub async fn count(&self, query: &Query) -> Result<u64, RepoError> {
        self.run("count", async {
            Ok(self.store.count_documents(query.filter(), query.count_options().clone()).await?)
        })
        .await
    }
}
