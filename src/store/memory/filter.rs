use crate::errors::StoreError;
use bson::{Bson, Document};
use regex::{Regex, RegexBuilder};

// Parser limit
pub(crate) const MAX_PATH_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// A parsed filter document.
#[derive(Debug, Clone)]
pub enum Filter {
    True,
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Nor(Vec<Filter>),
    Not(Box<Filter>),
    Exists { path: String, exists: bool },
    In { path: String, values: Vec<Bson> },
    Nin { path: String, values: Vec<Bson> },
    All { path: String, values: Vec<Bson> },
    Cmp { path: String, op: CmpOp, value: Bson },
    Regex { path: String, regex: Regex },
    Text { terms: Vec<String> },
}

impl Filter {
    /// Search terms of the first `$text` clause, if any.
    pub fn text_terms(&self) -> Option<&[String]> {
        match self {
            Self::Text { terms } => Some(terms),
            Self::And(fs) | Self::Or(fs) | Self::Nor(fs) => fs.iter().find_map(Self::text_terms),
            Self::Not(f) => f.text_terms(),
            _ => None,
        }
    }
}

/// Parses a query document into a `Filter`.
///
/// # Errors
/// Returns `StoreError::UnsupportedOperator` for operators outside the supported set and
/// `StoreError::Malformed` when an operator argument has the wrong shape.
pub fn parse_filter(doc: &Document) -> Result<Filter, StoreError> {
    let mut clauses = Vec::with_capacity(doc.len());
    for (key, value) in doc {
        clauses.push(parse_clause(key, value)?);
    }
    Ok(match clauses.len() {
        0 => Filter::True,
        1 => clauses.remove(0),
        _ => Filter::And(clauses),
    })
}

fn parse_clause(key: &str, value: &Bson) -> Result<Filter, StoreError> {
    match key {
        "$and" => Ok(Filter::And(parse_filter_list(key, value)?)),
        "$or" => Ok(Filter::Or(parse_filter_list(key, value)?)),
        "$nor" => Ok(Filter::Nor(parse_filter_list(key, value)?)),
        "$text" => parse_text(value),
        op if op.starts_with('$') => Err(StoreError::UnsupportedOperator(op.to_string())),
        path => parse_field(path, value),
    }
}

fn parse_filter_list(op: &str, value: &Bson) -> Result<Vec<Filter>, StoreError> {
    let Bson::Array(items) = value else {
        return Err(malformed("filter", format!("{op} requires an array")));
    };
    if items.is_empty() {
        return Err(malformed("filter", format!("{op} requires a non-empty array")));
    }
    items
        .iter()
        .map(|item| match item {
            Bson::Document(d) => parse_filter(d),
            _ => Err(malformed("filter", format!("{op} entries must be documents"))),
        })
        .collect()
}

fn parse_text(value: &Bson) -> Result<Filter, StoreError> {
    let search = match value {
        Bson::Document(d) => d.get("$search"),
        _ => None,
    };
    let Some(Bson::String(search)) = search else {
        return Err(malformed("filter", "$text requires a $search string".into()));
    };
    let terms = tokenize(search).collect();
    Ok(Filter::Text { terms })
}

fn parse_field(path: &str, value: &Bson) -> Result<Filter, StoreError> {
    if path.split('.').count() > MAX_PATH_DEPTH {
        return Err(malformed("filter", format!("path too deep: {path}")));
    }
    match value {
        Bson::Document(ops) if is_operator_doc(ops) => parse_operators(path, ops),
        other => Ok(Filter::Cmp { path: path.to_string(), op: CmpOp::Eq, value: other.clone() }),
    }
}

fn is_operator_doc(doc: &Document) -> bool {
    doc.keys().next().is_some_and(|k| k.starts_with('$'))
}

fn parse_operators(path: &str, ops: &Document) -> Result<Filter, StoreError> {
    let mut clauses = Vec::with_capacity(ops.len());
    for (op, arg) in ops {
        let p = path.to_string();
        let clause = match op.as_str() {
            "$eq" => Filter::Cmp { path: p, op: CmpOp::Eq, value: arg.clone() },
            "$ne" => Filter::Not(Box::new(Filter::Cmp { path: p, op: CmpOp::Eq, value: arg.clone() })),
            "$gt" => Filter::Cmp { path: p, op: CmpOp::Gt, value: arg.clone() },
            "$gte" => Filter::Cmp { path: p, op: CmpOp::Gte, value: arg.clone() },
            "$lt" => Filter::Cmp { path: p, op: CmpOp::Lt, value: arg.clone() },
            "$lte" => Filter::Cmp { path: p, op: CmpOp::Lte, value: arg.clone() },
            "$in" => Filter::In { path: p, values: array_arg(op, arg)? },
            "$nin" => Filter::Nin { path: p, values: array_arg(op, arg)? },
            "$all" => Filter::All { path: p, values: array_arg(op, arg)? },
            "$exists" => Filter::Exists { path: p, exists: truthy(arg) },
            "$regex" => {
                let options = match ops.get("$options") {
                    Some(Bson::String(o)) => o.as_str(),
                    Some(_) => return Err(malformed("regex", "$options must be a string".into())),
                    None => "",
                };
                Filter::Regex { path: p, regex: compile_regex(arg, options)? }
            }
            // consumed together with $regex
            "$options" if ops.contains_key("$regex") => continue,
            "$not" => match arg {
                Bson::Document(inner) if is_operator_doc(inner) => {
                    Filter::Not(Box::new(parse_operators(path, inner)?))
                }
                _ => return Err(malformed("filter", "$not requires an operator document".into())),
            },
            other => return Err(StoreError::UnsupportedOperator(other.to_string())),
        };
        clauses.push(clause);
    }
    Ok(if clauses.len() == 1 { clauses.remove(0) } else { Filter::And(clauses) })
}

fn array_arg(op: &str, arg: &Bson) -> Result<Vec<Bson>, StoreError> {
    match arg {
        Bson::Array(values) => Ok(values.clone()),
        _ => Err(malformed("filter", format!("{op} requires an array"))),
    }
}

fn truthy(arg: &Bson) -> bool {
    match arg {
        Bson::Boolean(b) => *b,
        Bson::Int32(i) => *i != 0,
        Bson::Int64(i) => *i != 0,
        Bson::Double(d) => *d != 0.0,
        Bson::Null | Bson::Undefined => false,
        _ => true,
    }
}

fn compile_regex(arg: &Bson, options: &str) -> Result<Regex, StoreError> {
    let Bson::String(pattern) = arg else {
        return Err(malformed("regex", "$regex requires a string pattern".into()));
    };
    let mut builder = RegexBuilder::new(pattern);
    for flag in options.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            other => return Err(malformed("regex", format!("unknown option {other:?}"))),
        };
    }
    builder.build().map_err(|e| malformed("regex", e.to_string()))
}

/// Lower-cased word tokens of a string, as used by full-text matching.
pub(crate) fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()).map(str::to_lowercase)
}

fn malformed(what: &'static str, reason: String) -> StoreError {
    StoreError::Malformed { what, reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn empty_document_is_true() {
        assert!(matches!(parse_filter(&doc! {}).unwrap(), Filter::True));
    }

    #[test]
    fn implicit_equality_and_operator_documents() {
        let f = parse_filter(&doc! {"status": "active", "age": {"$gt": 18, "$lt": 65}}).unwrap();
        let Filter::And(parts) = f else { panic!("expected $and") };
        assert_eq!(parts.len(), 2);
        assert!(matches!(&parts[0], Filter::Cmp { op: CmpOp::Eq, .. }));
        assert!(matches!(&parts[1], Filter::And(inner) if inner.len() == 2));
    }

    #[test]
    fn regex_consumes_options() {
        let f = parse_filter(&doc! {"name": {"$regex": "^al", "$options": "i"}}).unwrap();
        let Filter::Regex { regex, .. } = f else { panic!("expected regex") };
        assert!(regex.is_match("ALICE"));
    }

    #[test]
    fn long_patterns_compile() {
        let pattern = format!("^{}", "a".repeat(2048));
        let f = parse_filter(&doc! {"name": {"$regex": pattern}}).unwrap();
        let Filter::Regex { regex, .. } = f else { panic!("expected regex") };
        assert!(regex.is_match(&"a".repeat(2050)));
    }

    #[test]
    fn text_clause_tokenizes_search() {
        let f = parse_filter(&doc! {"$and": [{"$text": {"$search": "Rust, Tokio"}}]}).unwrap();
        assert_eq!(f.text_terms().unwrap(), ["rust".to_string(), "tokio".to_string()]);
    }

    #[test]
    fn unknown_operators_are_rejected() {
        assert!(matches!(
            parse_filter(&doc! {"$where": "1"}),
            Err(StoreError::UnsupportedOperator(op)) if op == "$where"
        ));
        assert!(matches!(
            parse_filter(&doc! {"a": {"$near": [0, 0]}}),
            Err(StoreError::UnsupportedOperator(_))
        ));
        assert!(matches!(parse_filter(&doc! {"$and": []}), Err(StoreError::Malformed { .. })));
        assert!(matches!(
            parse_filter(&doc! {"a": {"$in": 3}}),
            Err(StoreError::Malformed { .. })
        ));
    }
}
