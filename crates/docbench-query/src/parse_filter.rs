use bson::{Bson, Document};
use regex::Regex;

use crate::error::QueryError;
use crate::filter::{Clause, Filter, Predicate};
use crate::strictness::Strictness;

impl Filter {
    /// Decode a query document, ignoring unknown operators.
    pub fn parse(doc: &Document) -> Result<Filter, QueryError> {
        parse_filter(doc, Strictness::Permissive)
    }

    pub fn parse_with(doc: &Document, strictness: Strictness) -> Result<Filter, QueryError> {
        parse_filter(doc, strictness)
    }
}

/// Decode a query document into a [`Filter`].
///
/// Follows MongoDB query semantics:
/// - Top-level document is an implicit AND of all entries
/// - `{ "field": value }` is implicit `$eq`
/// - `{ "field": { "$gt": v } }` uses operator sub-documents
/// - `{ "$or": [...] }` / `{ "$and": [...] }` / `{ "$nor": [...] }` for explicit logical ops
/// - `{ "field": { "$regex": "pattern", "$options": "i" } }` for regex
pub fn parse_filter(doc: &Document, strictness: Strictness) -> Result<Filter, QueryError> {
    let mut clauses = Vec::with_capacity(doc.len());

    for (key, value) in doc {
        match key.as_str() {
            "$and" => clauses.push(Clause::And(parse_logical_array(key, value, strictness)?)),
            "$or" => clauses.push(Clause::Or(parse_logical_array(key, value, strictness)?)),
            "$nor" => clauses.push(Clause::Nor(parse_logical_array(key, value, strictness)?)),
            k if k.starts_with('$') => strictness.unknown(k)?,
            _ => clauses.push(parse_field_condition(key, value, strictness)?),
        }
    }

    Ok(Filter { clauses })
}

fn parse_logical_array(
    op: &str,
    value: &Bson,
    strictness: Strictness,
) -> Result<Vec<Filter>, QueryError> {
    let Bson::Array(items) = value else {
        return Err(QueryError::InvalidFilter(format!("{op} value must be an array")));
    };
    if items.is_empty() {
        return Err(QueryError::InvalidFilter(format!("{op} array must not be empty")));
    }

    items
        .iter()
        .map(|item| match item {
            Bson::Document(sub) => parse_filter(sub, strictness),
            _ => Err(QueryError::InvalidFilter(format!(
                "{op} array elements must be documents"
            ))),
        })
        .collect()
}

/// A value is an operator document when it is a document whose first key
/// starts with `$`. Anything else is an equality literal.
fn parse_field_condition(
    field: &str,
    value: &Bson,
    strictness: Strictness,
) -> Result<Clause, QueryError> {
    let predicates = match value {
        Bson::Document(sub) if sub.keys().next().is_some_and(|k| k.starts_with('$')) => {
            parse_operator_doc(sub, strictness)?
        }
        literal => vec![Predicate::Eq(literal.clone())],
    };

    Ok(Clause::Field {
        path: field.to_string(),
        predicates,
    })
}

fn parse_operator_doc(
    doc: &Document,
    strictness: Strictness,
) -> Result<Vec<Predicate>, QueryError> {
    let mut predicates = Vec::with_capacity(doc.len());

    for (op, operand) in doc {
        let predicate = match op.as_str() {
            "$eq" => Predicate::Eq(operand.clone()),
            "$ne" => Predicate::Ne(operand.clone()),
            "$gt" => Predicate::Gt(operand.clone()),
            "$gte" => Predicate::Gte(operand.clone()),
            "$lt" => Predicate::Lt(operand.clone()),
            "$lte" => Predicate::Lte(operand.clone()),
            "$in" => Predicate::In(array_operand(op, operand)?),
            "$nin" => Predicate::Nin(array_operand(op, operand)?),
            "$exists" => match operand {
                Bson::Boolean(b) => Predicate::Exists(*b),
                _ => {
                    return Err(QueryError::InvalidFilter(
                        "$exists value must be a boolean".into(),
                    ));
                }
            },
            "$regex" => parse_regex(operand, doc.get("$options"))?,
            "$options" => {
                if !doc.contains_key("$regex") {
                    return Err(QueryError::InvalidFilter("$options without $regex".into()));
                }
                continue;
            }
            k => {
                strictness.unknown(k)?;
                continue;
            }
        };
        predicates.push(predicate);
    }

    Ok(predicates)
}

fn array_operand(op: &str, operand: &Bson) -> Result<Vec<Bson>, QueryError> {
    match operand {
        Bson::Array(items) => Ok(items.clone()),
        _ => Err(QueryError::InvalidFilter(format!("{op} value must be an array"))),
    }
}

fn parse_regex(pattern: &Bson, options: Option<&Bson>) -> Result<Predicate, QueryError> {
    let Bson::String(pattern) = pattern else {
        return Err(QueryError::InvalidFilter("$regex value must be a string".into()));
    };

    let full_pattern = match options {
        None => pattern.clone(),
        Some(Bson::String(opts)) if opts.is_empty() => pattern.clone(),
        Some(Bson::String(opts)) => {
            let mut prefix = String::with_capacity(4 + opts.len() + pattern.len());
            prefix.push_str("(?");
            for ch in opts.chars() {
                match ch {
                    'i' | 's' | 'm' | 'x' => prefix.push(ch),
                    c => {
                        return Err(QueryError::InvalidFilter(format!(
                            "unknown regex option: {c}"
                        )));
                    }
                }
            }
            prefix.push(')');
            prefix.push_str(pattern);
            prefix
        }
        Some(_) => {
            return Err(QueryError::InvalidFilter("$options value must be a string".into()));
        }
    };

    let re = Regex::new(&full_pattern)
        .map_err(|e| QueryError::InvalidFilter(format!("invalid regex pattern: {e}")))?;
    Ok(Predicate::Regex(re))
}
