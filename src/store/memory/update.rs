use crate::errors::StoreError;
use bson::{Bson, Document};

use super::eval::{bson_equal, get_path};
use super::filter::MAX_PATH_DEPTH;

#[derive(Debug, Default, Clone)]
pub struct UpdateDoc {
    pub set: Vec<(String, Bson)>,
    pub inc: Vec<(String, Bson)>,
    pub unset: Vec<String>,
}

impl UpdateDoc {
    /// Reads an operator update document (`$set`, `$inc`, `$unset`).
    ///
    /// # Errors
    /// Returns `StoreError::Malformed` for replacement documents or wrongly shaped arguments and
    /// `StoreError::UnsupportedOperator` for other operators.
    pub fn parse(update: &Document) -> Result<Self, StoreError> {
        if update.is_empty() {
            return Err(malformed("update document is empty"));
        }
        let mut out = Self::default();
        for (op, arg) in update {
            let Bson::Document(fields) = arg else {
                if op.starts_with('$') {
                    return Err(malformed(&format!("{op} requires a document")));
                }
                return Err(malformed("replacement documents are not accepted by update_one"));
            };
            match op.as_str() {
                "$set" => {
                    out.set.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
                "$inc" => {
                    for (k, v) in fields {
                        if !matches!(v, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) {
                            return Err(malformed("$inc requires numeric"));
                        }
                        out.inc.push((k.clone(), v.clone()));
                    }
                }
                "$unset" => out.unset.extend(fields.keys().cloned()),
                other if other.starts_with('$') => {
                    return Err(StoreError::UnsupportedOperator(other.to_string()));
                }
                _ => return Err(malformed("replacement documents are not accepted by update_one")),
            }
        }
        Ok(out)
    }

    /// Applies the update in place; returns whether the document changed.
    pub fn apply(&self, doc: &mut Document) -> bool {
        let mut modified = false;
        for (path, val) in &self.set {
            modified |= set_path(doc, path, val.clone());
        }
        for (path, delta) in &self.inc {
            modified |= inc_path(doc, path, delta);
        }
        for path in &self.unset {
            modified |= unset_path(doc, path);
        }
        modified
    }
}

fn set_path(doc: &mut Document, path: &str, val: Bson) -> bool {
    let parts: Vec<&str> = path.split('.').collect();
    if parts.len() > MAX_PATH_DEPTH {
        return false;
    }
    let Some((last, parents)) = parts.split_last() else { return false };
    let mut cur = doc;
    for key in parents {
        if !matches!(cur.get(*key), Some(Bson::Document(_))) {
            cur.insert((*key).to_string(), Bson::Document(Document::new()));
        }
        match cur.get_mut(*key) {
            Some(Bson::Document(d)) => cur = d,
            _ => return false,
        }
    }
    let changed = cur.get(*last).is_none_or(|prev| !bson_equal(prev, &val));
    cur.insert((*last).to_string(), val);
    changed
}

fn inc_path(doc: &mut Document, path: &str, delta: &Bson) -> bool {
    let new_val = match (get_path(doc, path), delta) {
        (None, d) => d.clone(),
        (Some(Bson::Int32(a)), Bson::Int32(b)) => {
            a.checked_add(*b).map_or_else(|| Bson::Int64(i64::from(*a) + i64::from(*b)), Bson::Int32)
        }
        (Some(Bson::Int32(a)), Bson::Int64(b)) => Bson::Int64(i64::from(*a).saturating_add(*b)),
        (Some(Bson::Int64(a)), Bson::Int32(b)) => Bson::Int64(a.saturating_add(i64::from(*b))),
        (Some(Bson::Int64(a)), Bson::Int64(b)) => Bson::Int64(a.saturating_add(*b)),
        (Some(cur), d) => match (as_f64(cur), as_f64(d)) {
            (Some(a), Some(b)) => Bson::Double(a + b),
            _ => return false,
        },
    };
    set_path(doc, path, new_val)
}

#[allow(clippy::cast_precision_loss)]
fn as_f64(b: &Bson) -> Option<f64> {
    match b {
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(f) => Some(*f),
        _ => None,
    }
}

fn unset_path(doc: &mut Document, path: &str) -> bool {
    let parts: Vec<&str> = path.split('.').collect();
    let Some((last, parents)) = parts.split_last() else { return false };
    let mut cur = doc;
    for key in parents {
        match cur.get_mut(*key) {
            Some(Bson::Document(d)) => cur = d,
            _ => return false,
        }
    }
    cur.remove(*last).is_some()
}

/// Seed document for an upsert: the top-level equality conditions of `filter`.
pub fn upsert_seed(filter: &Document) -> Document {
    let mut seed = Document::new();
    for (key, value) in filter {
        if key.starts_with('$') || key.contains('.') {
            continue;
        }
        match value {
            Bson::Document(ops) if ops.keys().next().is_some_and(|k| k.starts_with('$')) => {
                if let Some(v) = ops.get("$eq") {
                    seed.insert(key.clone(), v.clone());
                }
            }
            v => {
                seed.insert(key.clone(), v.clone());
            }
        }
    }
    seed
}

fn malformed(reason: &str) -> StoreError {
    StoreError::Malformed { what: "update", reason: reason.to_string() }
}
