use crate::errors::StoreError;
use bson::{Bson, Document};
use std::collections::HashMap;

use super::eval::{bson_equal, compare_docs, eval_filter, get_path, parse_sort, text_score};
use super::filter::{Filter, parse_filter};
use crate::store::FindOptions;

const MAX_LOOKUP_DEPTH: usize = 8;

/// Runs a find over `docs`: filter, sort, skip, limit, then projection.
///
/// # Errors
/// Returns an error if the filter, sort or projection document cannot be interpreted.
pub fn find_docs(docs: &[Document], filter: &Filter, opts: &FindOptions) -> Result<Vec<Document>, StoreError> {
    let terms = filter.text_terms();
    let mut hits: Vec<(Document, u32)> = docs
        .iter()
        .filter(|d| eval_filter(d, filter))
        .map(|d| (d.clone(), terms.map_or(0, |t| text_score(d, t))))
        .collect();

    if let Some(sort) = &opts.sort {
        let specs = parse_sort(sort);
        hits.sort_by(|a, b| compare_docs((&a.0, a.1), (&b.0, b.1), &specs));
    }

    let skip = usize::try_from(opts.skip).unwrap_or(usize::MAX);
    let limit = match opts.limit {
        Some(n) if n != 0 => usize::try_from(n.unsigned_abs()).unwrap_or(usize::MAX),
        _ => usize::MAX,
    };
    let page = hits.into_iter().skip(skip).take(limit);

    match &opts.projection {
        Some(projection) => page.map(|(d, score)| project(&d, projection, score)).collect(),
        None => Ok(page.map(|(d, _)| d).collect()),
    }
}

/// Applies a projection document. Inclusion and exclusion follow the usual rules: `_id` is kept
/// unless excluded, and `{$meta: "textScore"}` entries receive the computed score.
///
/// # Errors
/// Returns `StoreError::Malformed` when inclusions and exclusions are mixed.
pub fn project(doc: &Document, projection: &Document, score: u32) -> Result<Document, StoreError> {
    let mut include = Vec::new();
    let mut exclude = Vec::new();
    let mut meta = Vec::new();
    for (field, spec) in projection {
        match spec {
            Bson::Document(m) if m.contains_key("$meta") => meta.push(field.as_str()),
            Bson::Boolean(false) | Bson::Int32(0) | Bson::Int64(0) => exclude.push(field.as_str()),
            Bson::Double(f) if *f == 0.0 => exclude.push(field.as_str()),
            _ => include.push(field.as_str()),
        }
    }
    let include_id = !exclude.contains(&"_id");
    exclude.retain(|f| *f != "_id");
    if !include.is_empty() && !exclude.is_empty() {
        return Err(StoreError::Malformed {
            what: "projection",
            reason: "cannot mix inclusion and exclusion".into(),
        });
    }

    let mut out = if include.is_empty() {
        let mut d = doc.clone();
        for f in &exclude {
            d.remove(*f);
        }
        if !include_id {
            d.remove("_id");
        }
        d
    } else {
        let mut d = Document::new();
        if include_id {
            if let Some(id) = doc.get("_id") {
                d.insert("_id", id.clone());
            }
        }
        for f in include {
            if let Some(v) = get_path(doc, f) {
                d.insert(f, v.clone());
            }
        }
        d
    };
    for f in meta {
        out.insert(f, Bson::Double(f64::from(score)));
    }
    Ok(out)
}

/// Evaluates an aggregation pipeline. `collections` resolves `$lookup` sources.
///
/// # Errors
/// Returns `StoreError::UnsupportedOperator` for stages other than `$match`, `$lookup`,
/// `$sort`, `$skip` and `$limit`, and `StoreError::Malformed` for badly shaped stages.
pub fn run_pipeline(
    collections: &HashMap<String, Vec<Document>>,
    input: Vec<Document>,
    pipeline: &[Document],
) -> Result<Vec<Document>, StoreError> {
    run_stages(collections, input, pipeline, 0)
}

fn run_stages(
    collections: &HashMap<String, Vec<Document>>,
    mut docs: Vec<Document>,
    pipeline: &[Document],
    depth: usize,
) -> Result<Vec<Document>, StoreError> {
    if depth > MAX_LOOKUP_DEPTH {
        return Err(malformed("$lookup", "nested too deeply".into()));
    }
    for stage in pipeline {
        let mut entries = stage.iter();
        let (Some((name, arg)), None) = (entries.next(), entries.next()) else {
            return Err(malformed("stage", "a stage must have exactly one operator".into()));
        };
        docs = match (name.as_str(), arg) {
            ("$match", Bson::Document(f)) => {
                let filter = parse_filter(f)?;
                docs.into_iter().filter(|d| eval_filter(d, &filter)).collect()
            }
            ("$sort", Bson::Document(s)) => {
                let specs = parse_sort(s);
                docs.sort_by(|a, b| compare_docs((a, 0), (b, 0), &specs));
                docs
            }
            ("$skip", n) => {
                let n = count_arg("$skip", n)?;
                docs.into_iter().skip(n).collect()
            }
            ("$limit", n) => {
                let n = count_arg("$limit", n)?;
                // 0 is unlimited, as in find
                if n == 0 { docs } else { docs.into_iter().take(n).collect() }
            }
            ("$lookup", Bson::Document(spec)) => lookup(collections, docs, spec, depth)?,
            ("$match" | "$sort" | "$lookup", _) => {
                return Err(malformed("stage", format!("{name} requires a document")));
            }
            (other, _) => return Err(StoreError::UnsupportedOperator(other.to_string())),
        };
    }
    Ok(docs)
}

fn lookup(
    collections: &HashMap<String, Vec<Document>>,
    docs: Vec<Document>,
    spec: &Document,
    depth: usize,
) -> Result<Vec<Document>, StoreError> {
    let text = |key: &str| string_field(spec, key);
    let from = text("from")?.ok_or_else(|| malformed("$lookup", "missing from".into()))?;
    let as_field = text("as")?.ok_or_else(|| malformed("$lookup", "missing as".into()))?;
    let join = match (text("localField")?, text("foreignField")?) {
        (Some(local), Some(foreign)) => Some((local, foreign)),
        (None, None) => None,
        _ => return Err(malformed("$lookup", "localField and foreignField go together".into())),
    };
    let sub_pipeline: Vec<Document> = match spec.get("pipeline") {
        None => Vec::new(),
        Some(Bson::Array(stages)) => stages
            .iter()
            .map(|s| match s {
                Bson::Document(d) => Ok(d.clone()),
                _ => Err(malformed("$lookup", "pipeline stages must be documents".into())),
            })
            .collect::<Result<_, _>>()?,
        Some(_) => return Err(malformed("$lookup", "pipeline must be an array".into())),
    };
    let foreign_docs = collections.get(from).map(Vec::as_slice).unwrap_or_default();

    let mut out = Vec::with_capacity(docs.len());
    for mut doc in docs {
        let joined: Vec<Document> = match join {
            Some((local, foreign)) => {
                let local_val = get_path(&doc, local).cloned().unwrap_or(Bson::Null);
                foreign_docs
                    .iter()
                    .filter(|f| join_matches(&local_val, get_path(f, foreign).unwrap_or(&Bson::Null)))
                    .cloned()
                    .collect()
            }
            None => foreign_docs.to_vec(),
        };
        let joined = run_stages(collections, joined, &sub_pipeline, depth + 1)?;
        doc.insert(as_field, Bson::Array(joined.into_iter().map(Bson::Document).collect()));
        out.push(doc);
    }
    Ok(out)
}

fn string_field<'a>(spec: &'a Document, key: &str) -> Result<Option<&'a str>, StoreError> {
    match spec.get(key) {
        Some(Bson::String(s)) if !s.is_empty() => Ok(Some(s.as_str())),
        None | Some(Bson::String(_)) => Ok(None),
        Some(_) => Err(malformed("$lookup", format!("{key} must be a string"))),
    }
}

// Equality join; an array on either side matches when any element matches.
fn join_matches(local: &Bson, foreign: &Bson) -> bool {
    match (local, foreign) {
        (Bson::Array(ls), f) => ls.iter().any(|l| join_matches(l, f)),
        (l, Bson::Array(fs)) => fs.iter().any(|f| bson_equal(l, f)),
        (l, f) => bson_equal(l, f),
    }
}

fn count_arg(stage: &str, n: &Bson) -> Result<usize, StoreError> {
    let v = match n {
        Bson::Int32(i) => i64::from(*i),
        Bson::Int64(i) => *i,
        #[allow(clippy::cast_possible_truncation)]
        Bson::Double(f) if f.fract() == 0.0 => *f as i64,
        _ => return Err(malformed("stage", format!("{stage} requires an integer"))),
    };
    usize::try_from(v).map_err(|_| malformed("stage", format!("{stage} must not be negative")))
}

fn malformed(what: &'static str, reason: String) -> StoreError {
    StoreError::Malformed { what, reason }
}
