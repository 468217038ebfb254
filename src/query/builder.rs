//! Fluent construction of filters, find options and aggregation pipelines.
//!
//! Every method consumes the builder and returns it, so calls chain freely. Methods whose input
//! means "no filter requested" (a `None`, a blank string, an empty set) leave the builder
//! untouched. Invalid input such as a malformed object id is recorded and reported by `build()`
//! or `aggregate()`; only the first such error is kept.

use super::compiled::Query;
use super::lookup::LookupModel;
use crate::errors::CompileError;
use crate::store::{CountOptions, DeleteOptions, FindOptions, UpdateOptions};
use crate::types::{Field, FieldKey, parse_object_id};
use bson::{Bson, Document, doc};

#[derive(Debug, Clone, Default)]
#[must_use]
pub struct QueryBuilder {
    fragments: Vec<Document>,
    raw: Option<Document>,
    batch: Option<Document>,
    stages: Vec<Document>,
    keyword: Option<String>,
    sort: Option<Document>,
    limit: Option<i64>,
    skip: u64,
    error: Option<CompileError>,
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

fn text_score_meta() -> Document {
    doc! { "score": { "$meta": "textScore" } }
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, fragment: Document) -> Self {
        self.fragments.push(fragment);
        self
    }

    fn push_op(self, key: &impl FieldKey, op: &str, value: Bson) -> Self {
        let mut inner = Document::new();
        inner.insert(op, value);
        let mut fragment = Document::new();
        fragment.insert(key.name(), inner);
        self.push(fragment)
    }

    fn push_eq(self, key: &impl FieldKey, value: Bson) -> Self {
        let mut fragment = Document::new();
        fragment.insert(key.name(), value);
        self.push(fragment)
    }

    fn record(mut self, err: CompileError) -> Self {
        if self.error.is_none() {
            self.error = Some(err);
        }
        self
    }

    /// Uses `filter` verbatim. A raw filter takes precedence over every other filter source.
    pub fn raw_query(mut self, filter: Option<Document>) -> Self {
        if let Some(filter) = filter {
            self.raw = Some(filter);
        }
        self
    }

    // ---- equality ----

    pub fn equals<V: Into<Bson>>(self, key: impl FieldKey, value: Option<V>) -> Self {
        match value {
            Some(v) => self.push_eq(&key, v.into()),
            None => self,
        }
    }

    pub fn equal<V: Into<Bson>>(self, key: impl FieldKey, value: V) -> Self {
        self.push_eq(&key, value.into())
    }

    pub fn equal_string(self, key: impl FieldKey, value: &str) -> Self {
        if is_blank(value) {
            return self;
        }
        self.push_eq(&key, Bson::String(value.to_string()))
    }

    pub fn equal_int(self, key: impl FieldKey, value: i64) -> Self {
        self.push_eq(&key, Bson::Int64(value))
    }

    /// Unsigned equality. Values above `i64::MAX` have no BSON integer form and are recorded as
    /// an invalid argument.
    pub fn equal_uint(self, key: impl FieldKey, value: u64) -> Self {
        match i64::try_from(value) {
            Ok(v) => self.push_eq(&key, Bson::Int64(v)),
            Err(_) => self.record(CompileError::InvalidArgument(format!(
                "{}: {value} does not fit a signed 64-bit integer",
                key.name()
            ))),
        }
    }

    pub fn equal_number(self, key: impl FieldKey, value: f64) -> Self {
        self.push_eq(&key, Bson::Double(value))
    }

    pub fn equals_bool(self, key: impl FieldKey, value: bool) -> Self {
        self.push_op(&key, "$eq", Bson::Boolean(value))
    }

    pub fn not_equals<V: Into<Bson>>(self, key: impl FieldKey, value: Option<V>) -> Self {
        match value {
            Some(v) => self.push_op(&key, "$ne", v.into()),
            None => self,
        }
    }

    pub fn not_equals_bool(self, key: impl FieldKey, value: bool) -> Self {
        self.push_op(&key, "$ne", Bson::Boolean(value))
    }

    /// Equality against an object id given as hex.
    pub fn equals_id_hex(self, key: impl FieldKey, id_hex: &str) -> Self {
        if is_blank(id_hex) {
            return self;
        }
        match parse_object_id(id_hex) {
            Ok(oid) => self.push_eq(&key, Bson::ObjectId(oid)),
            Err(e) => self.record(e),
        }
    }

    /// Matches documents whose array field `key` contains `value`.
    pub fn equal_string_array(self, key: impl FieldKey, value: &str) -> Self {
        if is_blank(value) {
            return self;
        }
        self.push_op(&key, "$in", Bson::Array(vec![Bson::String(value.to_string())]))
    }

    pub fn is_null(self, key: impl FieldKey) -> Self {
        self.push_eq(&key, Bson::Null)
    }

    // ---- ranges ----

    pub fn greater_than<V: Into<Bson>>(self, key: impl FieldKey, value: V) -> Self {
        self.push_op(&key, "$gt", value.into())
    }

    pub fn greater_than_or_equal_to<V: Into<Bson>>(self, key: impl FieldKey, value: V) -> Self {
        self.push_op(&key, "$gte", value.into())
    }

    pub fn less_than<V: Into<Bson>>(self, key: impl FieldKey, value: V) -> Self {
        self.push_op(&key, "$lt", value.into())
    }

    pub fn less_than_or_equal_to<V: Into<Bson>>(self, key: impl FieldKey, value: V) -> Self {
        self.push_op(&key, "$lte", value.into())
    }

    // ---- membership and existence ----

    /// Matches documents whose array field `key` holds `value` (`$all` of one element).
    pub fn in_array<V: Into<Bson>>(self, key: impl FieldKey, value: Option<V>) -> Self {
        match value {
            Some(v) => self.push_op(&key, "$all", Bson::Array(vec![v.into()])),
            None => self,
        }
    }

    /// Matches documents whose `key` equals any of `values`.
    pub fn match_any<V, I>(self, key: impl FieldKey, values: I) -> Self
    where
        V: Into<Bson>,
        I: IntoIterator<Item = V>,
    {
        let values: Vec<Bson> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return self;
        }
        self.push_op(&key, "$in", Bson::Array(values))
    }

    pub fn exists(self, key: impl FieldKey) -> Self {
        self.push_op(&key, "$exists", Bson::Boolean(true))
    }

    pub fn not_exists(self, key: impl FieldKey) -> Self {
        self.push_op(&key, "$exists", Bson::Boolean(false))
    }

    // ---- patterns and text ----

    /// Prefix match. `prefix` is matched literally.
    pub fn starts_with(self, key: impl FieldKey, prefix: &str) -> Self {
        if is_blank(prefix) {
            return self;
        }
        let pattern = format!("^{}", regex::escape(prefix));
        self.push_op(&key, "$regex", Bson::String(pattern))
    }

    /// Case-insensitive regex match of `keyword` against any of `keys`, as one `$or` fragment.
    pub fn regex_search<K: FieldKey>(self, keys: &[K], keyword: &str) -> Self {
        if is_blank(keyword) || keys.is_empty() {
            return self;
        }
        let any: Vec<Bson> = keys
            .iter()
            .map(|k| {
                let mut clause = Document::new();
                clause.insert(k.name(), doc! { "$regex": keyword, "$options": "i" });
                Bson::Document(clause)
            })
            .collect();
        self.push(doc! { "$or": any })
    }

    /// Adds a `$text` fragment and remembers the keyword for score projection and sorting.
    pub fn set_full_text_search(mut self, keyword: &str) -> Self {
        if is_blank(keyword) {
            return self;
        }
        self.keyword = Some(keyword.to_string());
        self.push(doc! { "$text": { "$search": keyword } })
    }

    // ---- id pagination ----

    /// Restricts results to ids greater than `id_hex`; pair with ascending `_id` sort.
    pub fn after_id(self, id_hex: &str) -> Self {
        self.id_bound("$gt", id_hex)
    }

    /// Restricts results to ids less than `id_hex`; pair with descending `_id` sort.
    pub fn before_id(self, id_hex: &str) -> Self {
        self.id_bound("$lt", id_hex)
    }

    fn id_bound(self, op: &str, id_hex: &str) -> Self {
        if is_blank(id_hex) {
            return self;
        }
        match parse_object_id(id_hex) {
            Ok(oid) => self.push_op(&Field::ID, op, Bson::ObjectId(oid)),
            Err(e) => self.record(e),
        }
    }

    /// Replaces the filter with `{key: {$in: ids}}` and discards accumulated fragments.
    ///
    /// An empty list does nothing. If any id fails to parse the error is recorded and the
    /// builder is left as it was.
    pub fn batch_get<S: AsRef<str>>(mut self, key: impl FieldKey, ids: &[S]) -> Self {
        if ids.is_empty() {
            return self;
        }
        let parsed: Result<Vec<Bson>, CompileError> =
            ids.iter().map(|id| parse_object_id(id.as_ref()).map(Bson::ObjectId)).collect();
        match parsed {
            Ok(oids) => {
                let mut filter = Document::new();
                filter.insert(key.name(), doc! { "$in": oids });
                self.batch = Some(filter);
                self.fragments.clear();
                self
            }
            Err(e) => self.record(e),
        }
    }

    // ---- sort and paging ----

    fn set_sort(mut self, sort: Document) -> Self {
        if self.sort.is_none() {
            self.sort = Some(sort);
        }
        self
    }

    /// Ascending sort on `key`. Only the first sort call of a chain takes effect.
    pub fn sort_asc(self, key: impl FieldKey) -> Self {
        let mut sort = Document::new();
        sort.insert(key.name(), 1);
        self.set_sort(sort)
    }

    /// Descending sort on `key`. Only the first sort call of a chain takes effect.
    pub fn sort_desc(self, key: impl FieldKey) -> Self {
        let mut sort = Document::new();
        sort.insert(key.name(), -1);
        self.set_sort(sort)
    }

    /// Orders by text relevance. Does nothing unless a full-text keyword was set first.
    pub fn sort_by_search_score(self) -> Self {
        if self.keyword.is_none() {
            return self;
        }
        self.set_sort(text_score_meta())
    }

    /// Caps the number of results. `limit(0)` means no cap but still counts as set.
    pub fn limit(mut self, count: i64) -> Self {
        self.limit = Some(count);
        self
    }

    pub fn skip(mut self, count: u64) -> Self {
        self.skip = count;
        self
    }

    // ---- aggregation stages ----

    fn push_stage(mut self, stage: Document) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn match_stage<V: Into<Bson>>(self, key: impl FieldKey, value: V) -> Self {
        let mut m = Document::new();
        m.insert(key.name(), value.into());
        self.push_stage(doc! { "$match": m })
    }

    pub fn not_equal_stage<V: Into<Bson>>(self, key: impl FieldKey, value: Option<V>) -> Self {
        let Some(value) = value else { return self };
        let value: Bson = value.into();
        let mut m = Document::new();
        m.insert(key.name(), doc! { "$ne": value });
        self.push_stage(doc! { "$match": m })
    }

    pub fn lookup(self, model: Option<LookupModel>) -> Self {
        let Some(model) = model else { return self };
        match model.to_stage() {
            Ok(stage) => self.push_stage(stage),
            Err(e) => self.record(e),
        }
    }

    pub fn sort_asc_stage(self, key: impl FieldKey) -> Self {
        self.sort_stage(&key, 1)
    }

    pub fn sort_desc_stage(self, key: impl FieldKey) -> Self {
        self.sort_stage(&key, -1)
    }

    fn sort_stage(self, key: &impl FieldKey, dir: i32) -> Self {
        if key.name().is_empty() {
            return self;
        }
        let mut sort = Document::new();
        sort.insert(key.name(), dir);
        self.push_stage(doc! { "$sort": sort })
    }

    // ---- compilers ----

    /// Compiles the filter state and find/count/update/delete options.
    ///
    /// # Errors
    /// Returns the first `CompileError` recorded during the chain.
    pub fn build(self) -> Result<Query, CompileError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let find = FindOptions {
            sort: self.sort,
            limit: self.limit,
            skip: self.skip,
            projection: self.keyword.as_ref().map(|_| text_score_meta()),
        };
        let count = CountOptions {
            limit: self.limit.filter(|n| *n > 0).map(i64::unsigned_abs),
            skip: self.skip,
        };
        Ok(Query {
            fragments: self.fragments,
            raw: self.raw,
            batch: self.batch,
            pipeline: Vec::new(),
            find,
            count,
            update: UpdateOptions::default(),
            delete: DeleteOptions::default(),
        })
    }

    /// Compiles the aggregation stages, appending `$skip` then `$limit` when a limit was set.
    ///
    /// # Errors
    /// Returns the first `CompileError` recorded during the chain.
    pub fn aggregate(self) -> Result<Query, CompileError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let mut pipeline = self.stages;
        if let Some(limit) = self.limit {
            pipeline.push(doc! { "$skip": skip_bson(self.skip) });
            pipeline.push(doc! { "$limit": limit });
        }
        Ok(Query { pipeline, ..Query::default() })
    }
}

fn skip_bson(skip: u64) -> Bson {
    i64::try_from(skip).map_or(Bson::Int64(i64::MAX), Bson::Int64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::FilterMode;
    use bson::oid::ObjectId;

    crate::field_keys! {
        enum K {
            Id => "_id",
            Status => "status",
            Age => "age",
            CreatedAt => "created_at",
            Tags => "tags",
            Name => "name",
            Email => "email",
        }
    }

    #[test]
    fn fragments_keep_call_order_and_options_compile() {
        let q = QueryBuilder::new()
            .equal_string(K::Status, "active")
            .greater_than(K::Age, 18)
            .sort_desc(K::CreatedAt)
            .limit(10)
            .build()
            .unwrap();
        assert_eq!(q.fragments(), &[doc! {"status": "active"}, doc! {"age": {"$gt": 18}}]);
        assert_eq!(q.filter(), doc! {"$and": [{"status": "active"}, {"age": {"$gt": 18}}]});
        let opts = q.find_options();
        assert_eq!(opts.sort, Some(doc! {"created_at": -1}));
        assert_eq!(opts.limit, Some(10));
        assert_eq!(opts.skip, 0);
        assert!(opts.projection.is_none());
        assert!(!q.update_options().upsert);
    }

    #[test]
    fn batch_get_discards_fragments() {
        let (a, b) = (ObjectId::new(), ObjectId::new());
        let q = QueryBuilder::new()
            .equal_string(K::Status, "active")
            .batch_get(K::Id, &[a.to_hex(), b.to_hex()])
            .build()
            .unwrap();
        assert_eq!(q.filter_mode(), FilterMode::Batch);
        assert!(q.fragments().is_empty());
        assert_eq!(q.filter(), doc! {"_id": {"$in": [a, b]}});
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let none: [&str; 0] = [];
        let q = QueryBuilder::new().equal_string(K::Status, "x").batch_get(K::Id, &none).build().unwrap();
        assert_eq!(q.filter_mode(), FilterMode::Fragments);
    }

    #[test]
    fn batch_with_bad_id_records_error_and_applies_nothing() {
        let good = ObjectId::new().to_hex();
        let b = QueryBuilder::new().equal_string(K::Status, "x").batch_get(K::Id, &[good.as_str(), "zz"]);
        assert_eq!(b.fragments.len(), 1);
        assert!(b.batch.is_none());
        assert!(matches!(b.build(), Err(CompileError::InvalidIdentifier { .. })));
    }

    #[test]
    fn raw_query_wins_regardless_of_order() {
        let q = QueryBuilder::new()
            .raw_query(Some(doc! {"x": 1}))
            .equal_string(K::Status, "a")
            .batch_get(K::Id, &[ObjectId::new().to_hex()])
            .build()
            .unwrap();
        assert_eq!(q.filter_mode(), FilterMode::Raw);
        assert_eq!(q.filter(), doc! {"x": 1});
        let q = QueryBuilder::new().raw_query(None).build().unwrap();
        assert_eq!(q.filter_mode(), FilterMode::Empty);
    }

    #[test]
    fn first_sort_wins() {
        let q = QueryBuilder::new().sort_asc(K::Name).sort_desc(K::Age).build().unwrap();
        assert_eq!(q.find_options().sort, Some(doc! {"name": 1}));
    }

    #[test]
    fn skip_without_limit_leaves_limit_unset() {
        let q = QueryBuilder::new().skip(20).build().unwrap();
        assert_eq!(q.find_options().limit, None);
        assert_eq!(q.find_options().skip, 20);
        assert_eq!(q.count_options(), &CountOptions { limit: None, skip: 20 });
        let q = QueryBuilder::new().limit(0).build().unwrap();
        assert_eq!(q.find_options().limit, Some(0));
        assert_eq!(q.count_options().limit, None);
    }

    #[test]
    fn none_and_blank_inputs_are_skipped() {
        let q = QueryBuilder::new()
            .equals(K::Age, None::<i32>)
            .not_equals(K::Age, None::<&str>)
            .in_array(K::Tags, None::<String>)
            .equal_string(K::Status, "   ")
            .equal_string_array(K::Tags, "")
            .equals_id_hex(K::Id, " ")
            .starts_with(K::Name, "")
            .regex_search(&[K::Name], "  ")
            .regex_search::<K>(&[], "bob")
            .set_full_text_search("")
            .after_id("")
            .match_any(K::Age, Vec::<i32>::new())
            .build()
            .unwrap();
        assert_eq!(q.filter_mode(), FilterMode::Empty);
        assert!(q.find_options().projection.is_none());
    }

    #[test]
    fn operator_fragments() {
        let q = QueryBuilder::new()
            .equals(K::Age, Some(3))
            .not_equals(K::Status, Some("gone"))
            .equals_bool(K::Status, true)
            .not_equals_bool(K::Status, false)
            .is_null(K::Email)
            .in_array(K::Tags, Some("rust"))
            .match_any(K::Age, [1, 2])
            .exists(K::Email)
            .not_exists(K::Name)
            .equal_string_array(K::Tags, "ops")
            .less_than_or_equal_to(K::Age, 65_i64)
            .equal_number(K::Age, 1.5)
            .equal_uint(K::Age, 7)
            .build()
            .unwrap();
        assert_eq!(
            q.fragments(),
            &[
                doc! {"age": 3},
                doc! {"status": {"$ne": "gone"}},
                doc! {"status": {"$eq": true}},
                doc! {"status": {"$ne": false}},
                doc! {"email": null},
                doc! {"tags": {"$all": ["rust"]}},
                doc! {"age": {"$in": [1, 2]}},
                doc! {"email": {"$exists": true}},
                doc! {"name": {"$exists": false}},
                doc! {"tags": {"$in": ["ops"]}},
                doc! {"age": {"$lte": 65_i64}},
                doc! {"age": 1.5},
                doc! {"age": 7_i64},
            ]
        );
    }

    #[test]
    fn oversized_uint_is_recorded() {
        let r = QueryBuilder::new().equal_uint(K::Age, u64::MAX).build();
        assert!(matches!(r, Err(CompileError::InvalidArgument(_))));
    }

    #[test]
    fn starts_with_escapes_and_regex_search_expands_to_or() {
        let q = QueryBuilder::new()
            .starts_with(K::Name, "a.b")
            .regex_search(&[K::Name, K::Email], "bob")
            .build()
            .unwrap();
        assert_eq!(q.fragments()[0], doc! {"name": {"$regex": "^a\\.b"}});
        assert_eq!(
            q.fragments()[1],
            doc! {"$or": [
                {"name": {"$regex": "bob", "$options": "i"}},
                {"email": {"$regex": "bob", "$options": "i"}},
            ]}
        );
    }

    #[test]
    fn full_text_adds_projection_and_enables_score_sort() {
        let q = QueryBuilder::new().sort_by_search_score().set_full_text_search("rust").build().unwrap();
        assert!(q.find_options().sort.is_none());
        assert_eq!(q.find_options().projection, Some(doc! {"score": {"$meta": "textScore"}}));

        let q = QueryBuilder::new().set_full_text_search("rust").sort_by_search_score().build().unwrap();
        assert_eq!(q.fragments(), &[doc! {"$text": {"$search": "rust"}}]);
        assert_eq!(q.find_options().sort, Some(doc! {"score": {"$meta": "textScore"}}));
    }

    #[test]
    fn id_bounds_and_sticky_errors() {
        let oid = ObjectId::new();
        let q = QueryBuilder::new().after_id(&oid.to_hex()).before_id(&oid.to_hex()).build().unwrap();
        assert_eq!(q.fragments(), &[doc! {"_id": {"$gt": oid}}, doc! {"_id": {"$lt": oid}}]);

        let err = QueryBuilder::new()
            .after_id("first-bad")
            .equals_id_hex(K::Id, "second-bad")
            .equal_string(K::Status, "still chains")
            .build()
            .unwrap_err();
        assert!(matches!(err, CompileError::InvalidIdentifier { ref value, .. } if value == "first-bad"));
    }

    #[test]
    fn aggregate_appends_skip_then_limit() {
        let q = QueryBuilder::new().match_stage(K::Status, "x").limit(5).aggregate().unwrap();
        assert_eq!(q.pipeline(), &[doc! {"$match": {"status": "x"}}, doc! {"$skip": 0_i64}, doc! {"$limit": 5_i64}]);
        assert_eq!(q.filter_mode(), FilterMode::Empty);

        let q = QueryBuilder::new().match_stage(K::Status, "x").skip(4).aggregate().unwrap();
        assert_eq!(q.pipeline().len(), 1);
    }

    #[test]
    fn stages_in_call_order() {
        let q = QueryBuilder::new()
            .not_equal_stage(K::Status, Some("deleted"))
            .not_equal_stage(K::Status, None::<&str>)
            .lookup(Some(LookupModel::new("orders", "_id", "user_id", "orders")))
            .lookup(None)
            .sort_desc_stage(K::CreatedAt)
            .sort_asc_stage(Field::new(""))
            .sort_asc_stage(K::Name)
            .aggregate()
            .unwrap();
        let names: Vec<&str> = q.pipeline().iter().filter_map(|s| s.keys().next().map(String::as_str)).collect();
        assert_eq!(names, ["$match", "$lookup", "$sort", "$sort"]);
        assert_eq!(q.pipeline()[0], doc! {"$match": {"status": {"$ne": "deleted"}}});
        assert_eq!(q.pipeline()[3], doc! {"$sort": {"name": 1}});
    }

    #[test]
    fn invalid_lookup_is_recorded() {
        let r = QueryBuilder::new().lookup(Some(LookupModel::default())).aggregate();
        assert!(matches!(r, Err(CompileError::InvalidArgument(_))));
    }
}
