use std::cmp::Ordering;

use bson::{Bson, Document};
use regex::Regex;

use crate::error::QueryError;
use crate::value::{compare_values, get_path, values_equal};

/// A decoded query document.
///
/// Top-level clauses are implicitly AND-ed. A filter with no clauses matches
/// every document.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub(crate) clauses: Vec<Clause>,
}

#[derive(Debug, Clone)]
pub enum Clause {
    /// All predicates must hold against the value at `path`.
    Field {
        path: String,
        predicates: Vec<Predicate>,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Nor(Vec<Filter>),
}

#[derive(Debug, Clone)]
pub enum Predicate {
    Eq(Bson),
    Ne(Bson),
    Gt(Bson),
    Gte(Bson),
    Lt(Bson),
    Lte(Bson),
    In(Vec<Bson>),
    Nin(Vec<Bson>),
    Exists(bool),
    Regex(Regex),
}

impl Filter {
    /// The empty filter.
    pub fn all() -> Self {
        Self::default()
    }

    /// Single equality condition, the shape used for point lookups.
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::field(field, vec![Predicate::Eq(value.into())])
    }

    pub fn field(field: impl Into<String>, predicates: Vec<Predicate>) -> Self {
        Self {
            clauses: vec![Clause::Field {
                path: field.into(),
                predicates,
            }],
        }
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.clauses.iter().all(|clause| clause.matches(doc))
    }
}

impl Clause {
    fn matches(&self, doc: &Document) -> bool {
        match self {
            Clause::Field { path, predicates } => {
                let value = get_path(doc, path);
                predicates.iter().all(|p| p.holds(value))
            }
            Clause::And(filters) => filters.iter().all(|f| f.matches(doc)),
            Clause::Or(filters) => filters.iter().any(|f| f.matches(doc)),
            Clause::Nor(filters) => !filters.iter().any(|f| f.matches(doc)),
        }
    }
}

impl Predicate {
    /// Evaluate against a field value; `None` means the field is absent.
    pub fn holds(&self, value: Option<&Bson>) -> bool {
        match self {
            Predicate::Eq(expected) => value.is_some_and(|v| values_equal(v, expected)),
            Predicate::Ne(expected) => !value.is_some_and(|v| values_equal(v, expected)),
            Predicate::Gt(bound) => ordered(value, bound, |o| o == Ordering::Greater),
            Predicate::Gte(bound) => ordered(value, bound, |o| o != Ordering::Less),
            Predicate::Lt(bound) => ordered(value, bound, |o| o == Ordering::Less),
            Predicate::Lte(bound) => ordered(value, bound, |o| o != Ordering::Greater),
            Predicate::In(list) => {
                value.is_some_and(|v| list.iter().any(|candidate| values_equal(v, candidate)))
            }
            Predicate::Nin(list) => {
                !value.is_some_and(|v| list.iter().any(|candidate| values_equal(v, candidate)))
            }
            Predicate::Exists(expected) => value.is_some() == *expected,
            Predicate::Regex(re) => match value {
                Some(Bson::String(s)) => re.is_match(s),
                _ => false,
            },
        }
    }
}

fn ordered(value: Option<&Bson>, bound: &Bson, predicate: fn(Ordering) -> bool) -> bool {
    value
        .and_then(|v| compare_values(v, bound))
        .is_some_and(predicate)
}

/// Parse `query` and evaluate it against `doc` in one step.
pub fn matches(doc: &Document, query: &Document) -> Result<bool, QueryError> {
    Ok(Filter::parse(query)?.matches(doc))
}
