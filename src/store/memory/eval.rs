use bson::{Bson, Document};
use std::cmp::Ordering;

use super::filter::{CmpOp, Filter, MAX_PATH_DEPTH, tokenize};

#[must_use]
pub fn eval_filter(doc: &Document, filter: &Filter) -> bool {
    match filter {
        Filter::True => true,
        Filter::And(fs) => fs.iter().all(|f| eval_filter(doc, f)),
        Filter::Or(fs) => fs.iter().any(|f| eval_filter(doc, f)),
        Filter::Nor(fs) => !fs.iter().any(|f| eval_filter(doc, f)),
        Filter::Not(f) => !eval_filter(doc, f),
        Filter::Exists { path, exists } => get_path(doc, path).is_some() == *exists,
        Filter::In { path, values } => is_in_set(get_path(doc, path), values),
        Filter::Nin { path, values } => !is_in_set(get_path(doc, path), values),
        Filter::All { path, values } => match get_path(doc, path) {
            Some(v) => !values.is_empty() && values.iter().all(|x| matches_value(v, |e| bson_equal(e, x))),
            None => false,
        },
        Filter::Cmp { path, op, value } => {
            let found = get_path(doc, path);
            match op {
                CmpOp::Eq => eq_matches(found, value),
                CmpOp::Gt => cmp_matches(found, value, |o| o == Ordering::Greater),
                CmpOp::Gte => cmp_matches(found, value, |o| o != Ordering::Less),
                CmpOp::Lt => cmp_matches(found, value, |o| o == Ordering::Less),
                CmpOp::Lte => cmp_matches(found, value, |o| o != Ordering::Greater),
            }
        }
        Filter::Regex { path, regex } => get_path(doc, path).is_some_and(|v| {
            matches_value(v, |e| matches!(e, Bson::String(s) if regex.is_match(s)))
        }),
        Filter::Text { terms } => text_score(doc, terms) > 0,
    }
}

/// Number of word tokens across every string value of `doc` equal to one of `terms`.
#[must_use]
pub fn text_score(doc: &Document, terms: &[String]) -> u32 {
    fn walk(v: &Bson, terms: &[String], acc: &mut u32) {
        match v {
            Bson::String(s) => {
                let hits = tokenize(s).filter(|t| terms.contains(t)).count();
                *acc = acc.saturating_add(u32::try_from(hits).unwrap_or(u32::MAX));
            }
            Bson::Document(d) => d.values().for_each(|x| walk(x, terms, acc)),
            Bson::Array(a) => a.iter().for_each(|x| walk(x, terms, acc)),
            _ => {}
        }
    }
    let mut score = 0;
    for v in doc.values() {
        walk(v, terms, &mut score);
    }
    score
}

/// Resolves a dotted path. Depth beyond `MAX_PATH_DEPTH` resolves to nothing.
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    if path.is_empty() {
        return None;
    }
    let mut parts = path.split('.');
    let first = parts.next()?;
    let mut cur = doc.get(first);
    for (depth, part) in parts.enumerate() {
        if depth + 1 >= MAX_PATH_DEPTH {
            return None;
        }
        cur = match cur {
            Some(Bson::Document(d)) => d.get(part),
            _ => return None,
        };
    }
    cur
}

// A predicate on a field holds when it holds for the value itself or any element of an array value.
fn matches_value(v: &Bson, pred: impl Fn(&Bson) -> bool) -> bool {
    if pred(v) {
        return true;
    }
    match v {
        Bson::Array(items) => items.iter().any(pred),
        _ => false,
    }
}

fn eq_matches(found: Option<&Bson>, value: &Bson) -> bool {
    match found {
        None => matches!(value, Bson::Null),
        Some(v) => matches_value(v, |e| bson_equal(e, value)),
    }
}

fn cmp_matches(found: Option<&Bson>, value: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    found.is_some_and(|v| {
        matches_value(v, |e| same_class(e, value) && accept(compare_bson(e, value)))
    })
}

fn is_in_set(found: Option<&Bson>, set: &[Bson]) -> bool {
    set.iter().any(|x| eq_matches(found, x))
}

#[allow(clippy::cast_precision_loss)]
fn to_f64(b: &Bson) -> Option<f64> {
    match b {
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(f) => Some(*f),
        _ => None,
    }
}

#[allow(clippy::float_cmp)]
pub fn bson_equal(a: &Bson, b: &Bson) -> bool {
    match (to_f64(a), to_f64(b)) {
        (Some(x), Some(y)) => match (a, b) {
            (Bson::Int64(x), Bson::Int64(y)) => x == y,
            (Bson::Int64(x), Bson::Int32(y)) | (Bson::Int32(y), Bson::Int64(x)) => *x == i64::from(*y),
            _ => x == y,
        },
        _ => a == b,
    }
}

// Range operators only compare values of the same canonical type class.
fn same_class(a: &Bson, b: &Bson) -> bool {
    type_rank(a) == type_rank(b)
}

const fn type_rank(b: &Bson) -> u8 {
    match b {
        Bson::Null | Bson::Undefined => 0,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 1,
        Bson::String(_) | Bson::Symbol(_) => 2,
        Bson::Document(_) => 3,
        Bson::Array(_) => 4,
        Bson::Binary(_) => 5,
        Bson::ObjectId(_) => 6,
        Bson::Boolean(_) => 7,
        Bson::DateTime(_) => 8,
        Bson::Timestamp(_) => 9,
        Bson::RegularExpression(_) => 10,
        _ => 11,
    }
}

/// Total order over BSON values: type class first, then value within the class.
#[must_use]
pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    let (ra, rb) = (type_rank(a), type_rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    if let (Some(x), Some(y)) = (to_f64(a), to_f64(b)) {
        return match (a, b) {
            (Bson::Int64(x), Bson::Int64(y)) => x.cmp(y),
            _ => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        };
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.bytes().cmp(&y.bytes()),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.timestamp_millis().cmp(&y.timestamp_millis()),
        (Bson::Array(x), Bson::Array(y)) => {
            for (ex, ey) in x.iter().zip(y) {
                let o = compare_bson(ex, ey);
                if o != Ordering::Equal {
                    return o;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => Ordering::Equal,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortSpec {
    Field { path: String, order: Order },
    /// Descending by computed text score.
    TextScore,
}

/// Reads a sort document such as `{created_at: -1, name: 1}` or `{score: {$meta: "textScore"}}`.
pub fn parse_sort(sort: &Document) -> Vec<SortSpec> {
    sort.iter()
        .map(|(field, dir)| match dir {
            Bson::Document(meta) if matches!(meta.get("$meta"), Some(Bson::String(m)) if m == "textScore") => {
                SortSpec::TextScore
            }
            other => {
                let desc = to_f64(other).is_some_and(|d| d < 0.0);
                SortSpec::Field { path: field.clone(), order: if desc { Order::Desc } else { Order::Asc } }
            }
        })
        .collect()
}

/// Compares two `(document, text score)` pairs under `sort`.
pub fn compare_docs(a: (&Document, u32), b: (&Document, u32), sort: &[SortSpec]) -> Ordering {
    for s in sort {
        let ord = match s {
            SortSpec::TextScore => b.1.cmp(&a.1),
            SortSpec::Field { path, order } => {
                let o = compare_bson(
                    get_path(a.0, path).unwrap_or(&Bson::Null),
                    get_path(b.0, path).unwrap_or(&Bson::Null),
                );
                if *order == Order::Asc { o } else { o.reverse() }
            }
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}
