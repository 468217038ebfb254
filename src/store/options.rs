use bson::{Bson, Document};

/// Options for a multi-document `find`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub sort: Option<Document>,
    /// `None` fetches every match. `Some(0)` is also unlimited.
    pub limit: Option<i64>,
    pub skip: u64,
    pub projection: Option<Document>,
}

impl FindOptions {
    /// Options for a single-document lookup: sort and projection carry over, paging does not.
    #[must_use]
    pub fn to_find_one(&self) -> FindOneOptions {
        FindOneOptions { sort: self.sort.clone(), projection: self.projection.clone() }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOneOptions {
    pub sort: Option<Document>,
    pub projection: Option<Document>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountOptions {
    pub limit: Option<u64>,
    pub skip: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    pub upsert: bool,
}

impl UpdateOptions {
    #[must_use]
    pub const fn upsert() -> Self {
        Self { upsert: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct DeleteOptions {}

/// Identifiers assigned by `insert_many`, one slot per input document in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertReport {
    pub inserted_ids: Vec<Option<Bson>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateReport {
    pub matched: u64,
    pub modified: u64,
    /// Set when an upsert inserted a new document.
    pub upserted_id: Option<Bson>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteReport {
    pub deleted: u64,
}
