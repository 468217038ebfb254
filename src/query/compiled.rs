use crate::store::{CountOptions, DeleteOptions, FindOneOptions, FindOptions, UpdateOptions};
use bson::{Bson, Document, doc};

/// Which of the mutually exclusive filter sources decides `Query::filter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// A caller-supplied document, used verbatim.
    Raw,
    /// `{key: {$in: [ids]}}` from `batch_get`.
    Batch,
    /// The conjunction of the accumulated fragments.
    Fragments,
    /// Matches every document.
    Empty,
}

/// The immutable output of `QueryBuilder::build` or `QueryBuilder::aggregate`.
///
/// Repository operations read the effective filter and the option bundle they need; nothing
/// here changes after compilation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub(crate) fragments: Vec<Document>,
    pub(crate) raw: Option<Document>,
    pub(crate) batch: Option<Document>,
    pub(crate) pipeline: Vec<Document>,
    pub(crate) find: FindOptions,
    pub(crate) count: CountOptions,
    pub(crate) update: UpdateOptions,
    pub(crate) delete: DeleteOptions,
}

impl Query {
    /// Predicate fragments in call order.
    #[must_use]
    pub fn fragments(&self) -> &[Document] {
        &self.fragments
    }

    #[must_use]
    pub const fn raw_filter(&self) -> Option<&Document> {
        self.raw.as_ref()
    }

    #[must_use]
    pub const fn batch_filter(&self) -> Option<&Document> {
        self.batch.as_ref()
    }

    /// Aggregation stages, including the trailing `$skip`/`$limit` pair when a limit was set.
    #[must_use]
    pub fn pipeline(&self) -> &[Document] {
        &self.pipeline
    }

    #[must_use]
    pub fn filter_mode(&self) -> FilterMode {
        if self.raw.is_some() {
            FilterMode::Raw
        } else if self.batch.is_some() {
            FilterMode::Batch
        } else if !self.fragments.is_empty() {
            FilterMode::Fragments
        } else {
            FilterMode::Empty
        }
    }

    /// The effective filter: raw, else batch, else `{$and: fragments}`, else `{}`.
    #[must_use]
    pub fn filter(&self) -> Document {
        match self.filter_mode() {
            FilterMode::Raw => self.raw.clone().unwrap_or_default(),
            FilterMode::Batch => self.batch.clone().unwrap_or_default(),
            FilterMode::Fragments => {
                let all: Vec<Bson> = self.fragments.iter().cloned().map(Bson::Document).collect();
                doc! { "$and": all }
            }
            FilterMode::Empty => Document::new(),
        }
    }

    #[must_use]
    pub const fn find_options(&self) -> &FindOptions {
        &self.find
    }

    /// Sort and projection of the find options. Limit and skip do not apply to a single lookup.
    #[must_use]
    pub fn find_one_options(&self) -> FindOneOptions {
        self.find.to_find_one()
    }

    #[must_use]
    pub const fn count_options(&self) -> &CountOptions {
        &self.count
    }

    #[must_use]
    pub const fn update_options(&self) -> &UpdateOptions {
        &self.update
    }

    #[must_use]
    pub const fn delete_options(&self) -> &DeleteOptions {
        &self.delete
    }
}
