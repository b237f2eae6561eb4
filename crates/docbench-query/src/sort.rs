use std::cmp::Ordering;

use bson::Document;
use serde::{Deserialize, Serialize};

use crate::error::QueryError;
use crate::value::{get_path, sort_order, to_f64};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Parse a `{ field: 1 | -1, ... }` sort specification, keeping key order.
pub fn parse_sort(spec: &Document) -> Result<Vec<Sort>, QueryError> {
    spec.iter()
        .map(|(field, direction)| {
            let direction = match to_f64(direction) {
                Some(d) if d == 1.0 => SortDirection::Asc,
                Some(d) if d == -1.0 => SortDirection::Desc,
                _ => {
                    return Err(QueryError::InvalidPipeline(format!(
                        "sort direction for {field} must be 1 or -1"
                    )));
                }
            };
            Ok(Sort {
                field: field.clone(),
                direction,
            })
        })
        .collect()
}

/// Compare two documents key by key; the first non-equal key decides.
pub fn compare_documents(a: &Document, b: &Document, sorts: &[Sort]) -> Ordering {
    for sort in sorts {
        let ord = sort_order(get_path(a, &sort.field), get_path(b, &sort.field));
        let ord = match sort.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Stable multi-key sort. Documents equal on every key keep their relative order.
pub fn sort_documents(docs: &mut [Document], sorts: &[Sort]) {
    if sorts.is_empty() {
        return;
    }
    docs.sort_by(|a, b| compare_documents(a, b, sorts));
}

