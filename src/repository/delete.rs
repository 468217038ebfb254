use super::Repository;
use crate::errors::RepoError;
use crate::logger::AUDIT_TARGET;
use crate::query::Query;
use crate::store::Store;

impl<T, S: Store> Repository<T, S> {
    /// Deletes the first document matching `query`'s effective filter.
    ///
    /// Sort, paging and aggregation stages of the query play no part.
    ///
    /// # Errors
    /// Store and timeout errors.
    pub async fn delete_one(&self, query: &Query) -> Result<(), RepoError> {
        self.run("delete_one", async {
            let report = self.store.delete_one(query.filter(), query.delete_options().clone()).await?;
            log::info!(
                target: AUDIT_TARGET,
                "delete_one collection={} mode={:?} deleted={}",
                self.collection_name(),
                query.filter_mode(),
                report.deleted
            );
            Ok(())
        })
        .await
    }

    /// Deletes every document matching `query`'s effective filter.
    ///
    /// # Errors
    /// Store and timeout errors.
    pub async fn delete_many(&self, query: &Query) -> Result<(), RepoError> {
        self.run("delete_many", async {
            let report = self.store.delete_many(query.filter(), query.delete_options().clone()).await?;
            log::info!(
                target: AUDIT_TARGET,
                "delete_many collection={} mode={:?} deleted={}",
                self.collection_name(),
                query.filter_mode(),
                report.deleted
            );
            Ok(())
        })
        .await
    }
}
