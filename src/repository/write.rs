use super::Repository;
use crate::errors::RepoError;
use crate::logger::AUDIT_TARGET;
use crate::store::{Store, UpdateOptions};
use crate::types::{ID_FIELD, parse_object_id};
use bson::{Bson, Document, doc, oid::ObjectId};
use serde::Serialize;

impl<T, S> Repository<T, S>
where
    T: Serialize + Sync,
    S: Store,
{
    /// Upserts `entity` at `id`, or at a freshly minted id when `id` is `None`.
    ///
    /// Only the fields `entity` serializes are written (`$set`); other stored fields survive.
    /// Any `_id` produced by the entity itself is ignored in favor of the resolved id.
    ///
    /// # Errors
    /// `RepoError::Compile` for a malformed `id` (the store is not called), otherwise store,
    /// codec and timeout errors.
    pub async fn save(&self, entity: &T, id: Option<&str>) -> Result<ObjectId, RepoError> {
        self.run("save", async {
            let oid = match id {
                Some(hex) => parse_object_id(hex)?,
                None => ObjectId::new(),
            };
            let mut fields = bson::serialize_to_document(entity)?;
            fields.remove(ID_FIELD);
            let report = self
                .store
                .update_one(doc! { "_id": oid }, doc! { "$set": fields }, UpdateOptions::upsert())
                .await?;
            let saved = match report.upserted_id {
                Some(Bson::ObjectId(upserted)) => upserted,
                _ => oid,
            };
            log::info!(
                target: AUDIT_TARGET,
                "save collection={} id={} matched={} upserted={}",
                self.collection_name(),
                saved,
                report.matched,
                report.matched == 0
            );
            Ok(saved)
        })
        .await
    }

    /// Inserts `entities` in order and returns the object ids the store assigned.
    ///
    /// Ids that are absent or not object ids are left out, so the result may be shorter than
    /// the input. An empty slice returns immediately.
    ///
    /// # Errors
    /// Store, codec and timeout errors.
    pub async fn insert_many(&self, entities: &[T]) -> Result<Vec<ObjectId>, RepoError> {
        self.run("insert_many", async {
            if entities.is_empty() {
                return Ok(Vec::new());
            }
            let docs = entities
                .iter()
                .map(bson::serialize_to_document)
                .collect::<Result<Vec<Document>, _>>()?;
            let report = self.store.insert_many(docs).await?;
            let ids: Vec<ObjectId> = report
                .inserted_ids
                .into_iter()
                .filter_map(|id| match id {
                    Some(Bson::ObjectId(oid)) => Some(oid),
                    _ => None,
                })
                .collect();
            log::info!(
                target: AUDIT_TARGET,
                "insert_many collection={} requested={} inserted={}",
                self.collection_name(),
                entities.len(),
                ids.len()
            );
            Ok(ids)
        })
        .await
    }
}
