use bson::{Bson, Document};

use crate::ID_FIELD;
use crate::error::QueryError;
use crate::strictness::Strictness;
use crate::value::{add_numbers, is_numeric, resolve_parent_mut, to_f64, values_equal};

/// Recognized update operators, in the order they are applied.
const OPERATOR_ORDER: [&str; 8] = [
    "$set",
    "$unset",
    "$inc",
    "$push",
    "$pull",
    "$addToSet",
    "$rename",
    "$pop",
];

/// A single field-level update operator.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOp {
    /// Set a field to a value. Creates the field if it doesn't exist.
    Set(Bson),
    /// Remove a field from the document.
    Unset,
    /// Add a numeric delta. A missing field counts as zero.
    Inc(Bson),
    /// Append values to an array field, replacing a non-array value.
    Push(Vec<Bson>),
    /// Remove every element equal to the value.
    Pull(Bson),
    /// Append values that are not already present in the array.
    AddToSet(Vec<Bson>),
    /// Move a field to a new path.
    Rename(String),
    /// Remove the first or the last element of an array field.
    Pop(PopEnd),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopEnd {
    First,
    Last,
}

/// A single field + operator pair within an [`UpdateSpec`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldUpdate {
    pub field: String,
    pub op: UpdateOp,
}

/// A decoded update document.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateSpec {
    /// Operator updates, already sorted into application order.
    Operators(Vec<FieldUpdate>),
    /// No operator present: every field is shallow-assigned onto the target.
    Merge(Document),
}

impl UpdateSpec {
    pub fn parse(doc: &Document) -> Result<UpdateSpec, QueryError> {
        parse_update(doc, Strictness::Permissive)
    }

    pub fn parse_with(doc: &Document, strictness: Strictness) -> Result<UpdateSpec, QueryError> {
        parse_update(doc, strictness)
    }

    /// Convenience constructor for a `$set` of one field.
    pub fn set(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        UpdateSpec::Operators(vec![FieldUpdate {
            field: field.into(),
            op: UpdateOp::Set(value.into()),
        }])
    }

    /// Apply this update to `doc` in place.
    ///
    /// Returns `Ok(true)` if the document changed. The identity field is never
    /// touched.
    pub fn apply(&self, doc: &mut Document) -> Result<bool, QueryError> {
        match self {
            UpdateSpec::Merge(fields) => {
                let mut changed = false;
                for (key, value) in fields {
                    if doc.get(key) != Some(value) {
                        doc.insert(key.clone(), value.clone());
                        changed = true;
                    }
                }
                Ok(changed)
            }
            UpdateSpec::Operators(ops) => {
                let mut changed = false;
                for update in ops {
                    changed |= update.apply(doc)?;
                }
                Ok(changed)
            }
        }
    }
}

impl FieldUpdate {
    fn apply(&self, doc: &mut Document) -> Result<bool, QueryError> {
        let field = self.field.as_str();
        match &self.op {
            UpdateOp::Set(value) => {
                let (parent, leaf) = creating_parent(doc, field)?;
                if parent.get(leaf) == Some(value) {
                    return Ok(false);
                }
                parent.insert(leaf, value.clone());
                Ok(true)
            }
            UpdateOp::Unset => Ok(resolve_parent_mut(doc, field, false)
                .is_some_and(|(parent, leaf)| parent.remove(leaf).is_some())),
            UpdateOp::Inc(delta) => {
                let (parent, leaf) = creating_parent(doc, field)?;
                let next = match parent.get(leaf) {
                    None => delta.clone(),
                    Some(current) => add_numbers(current, delta).ok_or_else(|| {
                        QueryError::TypeMismatch(format!(
                            "cannot apply $inc to non-numeric field {field}"
                        ))
                    })?,
                };
                if parent.get(leaf) == Some(&next) {
                    return Ok(false);
                }
                parent.insert(leaf, next);
                Ok(true)
            }
            UpdateOp::Push(values) => {
                let (parent, leaf) = creating_parent(doc, field)?;
                match parent.get_mut(leaf) {
                    Some(Bson::Array(arr)) => {
                        arr.extend(values.iter().cloned());
                        Ok(!values.is_empty())
                    }
                    _ => {
                        parent.insert(leaf, Bson::Array(values.clone()));
                        Ok(true)
                    }
                }
            }
            UpdateOp::Pull(value) => match resolve_parent_mut(doc, field, false) {
                Some((parent, leaf)) => match parent.get_mut(leaf) {
                    Some(Bson::Array(arr)) => {
                        let before = arr.len();
                        arr.retain(|elem| !values_equal(elem, value));
                        Ok(arr.len() != before)
                    }
                    _ => Ok(false),
                },
                None => Ok(false),
            },
            UpdateOp::AddToSet(values) => {
                let (parent, leaf) = creating_parent(doc, field)?;
                let mut changed = false;
                if !matches!(parent.get(leaf), Some(Bson::Array(_))) {
                    parent.insert(leaf, Bson::Array(Vec::new()));
                    changed = true;
                }
                if let Some(Bson::Array(arr)) = parent.get_mut(leaf) {
                    for value in values {
                        if !arr.iter().any(|elem| values_equal(elem, value)) {
                            arr.push(value.clone());
                            changed = true;
                        }
                    }
                }
                Ok(changed)
            }
            UpdateOp::Rename(target) => {
                let moved = resolve_parent_mut(doc, field, false)
                    .and_then(|(parent, leaf)| parent.remove(leaf));
                let Some(value) = moved else {
                    return Ok(false);
                };
                let (parent, leaf) = creating_parent(doc, target)?;
                parent.insert(leaf, value);
                Ok(true)
            }
            UpdateOp::Pop(end) => match resolve_parent_mut(doc, field, false) {
                Some((parent, leaf)) => match parent.get_mut(leaf) {
                    Some(Bson::Array(arr)) if !arr.is_empty() => {
                        match end {
                            PopEnd::First => {
                                arr.remove(0);
                            }
                            PopEnd::Last => {
                                arr.pop();
                            }
                        }
                        Ok(true)
                    }
                    _ => Ok(false),
                },
                None => Ok(false),
            },
        }
    }
}

fn creating_parent<'a, 'p>(
    doc: &'a mut Document,
    path: &'p str,
) -> Result<(&'a mut Document, &'p str), QueryError> {
    resolve_parent_mut(doc, path, true).ok_or_else(|| {
        QueryError::TypeMismatch(format!("cannot traverse non-document value in path {path}"))
    })
}

/// Parse a BSON update document into an [`UpdateSpec`].
///
/// When the document contains any recognized operator key, the operators are
/// collected in the fixed order `$set`, `$unset`, `$inc`, `$push`, `$pull`,
/// `$addToSet`, `$rename`, `$pop`, regardless of the key order in `doc`. Bare
/// top-level fields are treated as implicit `$set`. Without any operator key
/// the whole document is a literal merge.
///
/// Updates targeting `_id` are dropped silently.
pub fn parse_update(doc: &Document, strictness: Strictness) -> Result<UpdateSpec, QueryError> {
    let has_operator = doc.keys().any(|k| OPERATOR_ORDER.contains(&k.as_str()));

    for key in doc.keys() {
        if key.starts_with('$') && !OPERATOR_ORDER.contains(&key.as_str()) {
            strictness.unknown(key)?;
        }
    }

    if !has_operator {
        let mut merge = Document::new();
        for (key, value) in doc {
            if key == ID_FIELD || key.starts_with('$') {
                continue;
            }
            merge.insert(key.clone(), value.clone());
        }
        return Ok(UpdateSpec::Merge(merge));
    }

    let mut ops = Vec::new();
    for name in OPERATOR_ORDER {
        if let Some(value) = doc.get(name) {
            parse_operator(name, value, &mut ops)?;
        }
        if name == "$set" {
            for (key, value) in doc {
                if !key.starts_with('$') {
                    ops.push(FieldUpdate {
                        field: key.clone(),
                        op: UpdateOp::Set(value.clone()),
                    });
                }
            }
        }
    }

    ops.retain(|update| !targets_identity(&update.field));
    Ok(UpdateSpec::Operators(ops))
}

/// Parse `update` and apply it to a copy of `doc`.
pub fn apply_update(doc: &Document, update: &Document) -> Result<Document, QueryError> {
    let mut updated = doc.clone();
    UpdateSpec::parse(update)?.apply(&mut updated)?;
    Ok(updated)
}

fn targets_identity(path: &str) -> bool {
    path.split('.').next() == Some(ID_FIELD)
}

fn parse_operator(name: &str, value: &Bson, ops: &mut Vec<FieldUpdate>) -> Result<(), QueryError> {
    let Bson::Document(fields) = value else {
        return Err(QueryError::InvalidUpdate(format!("{name} value must be a document")));
    };

    for (field, operand) in fields {
        let op = match name {
            "$set" => UpdateOp::Set(operand.clone()),
            "$unset" => UpdateOp::Unset,
            "$inc" => {
                if !is_numeric(operand) {
                    return Err(QueryError::InvalidUpdate(format!(
                        "$inc value for {field} must be numeric"
                    )));
                }
                UpdateOp::Inc(operand.clone())
            }
            "$push" => UpdateOp::Push(each_values(operand)?),
            "$pull" => UpdateOp::Pull(operand.clone()),
            "$addToSet" => UpdateOp::AddToSet(each_values(operand)?),
            "$rename" => match operand {
                Bson::String(target) if targets_identity(target) => continue,
                Bson::String(target) => UpdateOp::Rename(target.clone()),
                _ => {
                    return Err(QueryError::InvalidUpdate(format!(
                        "$rename target for {field} must be a string"
                    )));
                }
            },
            "$pop" => match to_f64(operand) {
                Some(n) if n > 0.0 => UpdateOp::Pop(PopEnd::Last),
                Some(n) if n < 0.0 => UpdateOp::Pop(PopEnd::First),
                _ => {
                    return Err(QueryError::InvalidUpdate(format!(
                        "$pop value for {field} must be 1 or -1"
                    )));
                }
            },
            _ => unreachable!("operator list and parser out of sync: {name}"),
        };
        ops.push(FieldUpdate {
            field: field.clone(),
            op,
        });
    }
    Ok(())
}

/// `{ "$each": [..] }` expands to its elements; any other operand is a single value.
fn each_values(operand: &Bson) -> Result<Vec<Bson>, QueryError> {
    match operand {
        Bson::Document(d) if d.keys().next().map(String::as_str) == Some("$each") => {
            match d.get("$each") {
                Some(Bson::Array(items)) => Ok(items.clone()),
                _ => Err(QueryError::InvalidUpdate("$each value must be an array".into())),
            }
        }
        other => Ok(vec![other.clone()]),
    }
}
