use std::collections::HashMap;

use bson::{Bson, Document};

use crate::ID_FIELD;
use crate::error::QueryError;
use crate::pipeline::{Accumulator, Group, Pipeline, ProjectField, Projection, Stage};
use crate::sort::sort_documents;
use crate::value::{
    canonical_key, get_path, integer, resolve_parent_mut, sort_order, to_f64, values_equal,
};

/// Where the `_id` of the current documents came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Identity {
    /// Still the identity assigned by the store. Stripped from the output.
    Stored,
    /// Explicitly kept by a `$project` stage.
    Projected,
    /// Produced by `$group` / `$count`.
    Synthesized,
}

impl Pipeline {
    /// Run every stage in order over `docs`.
    pub fn run(&self, mut docs: Vec<Document>) -> Vec<Document> {
        let mut identity = Identity::Stored;

        for stage in &self.stages {
            docs = match stage {
                Stage::Match(filter) => docs.into_iter().filter(|d| filter.matches(d)).collect(),
                Stage::Group(group) => {
                    identity = Identity::Synthesized;
                    run_group(group, docs)
                }
                Stage::Sort(sorts) => {
                    sort_documents(&mut docs, sorts);
                    docs
                }
                Stage::Limit(n) => {
                    docs.truncate(*n);
                    docs
                }
                Stage::Skip(n) => {
                    let n = (*n).min(docs.len());
                    docs.drain(..n);
                    docs
                }
                Stage::Project(projection) => {
                    if identity == Identity::Stored
                        && (projection.include_id == Some(true) || computes_id(projection))
                    {
                        identity = Identity::Projected;
                    }
                    docs.iter().map(|d| project(projection, d)).collect()
                }
                Stage::Count(name) => {
                    identity = Identity::Synthesized;
                    if docs.is_empty() {
                        Vec::new()
                    } else {
                        let mut out = Document::new();
                        out.insert(name.clone(), integer(docs.len() as i64));
                        vec![out]
                    }
                }
            };
        }

        if identity == Identity::Stored {
            for doc in &mut docs {
                doc.remove(ID_FIELD);
            }
        }
        docs
    }
}

/// Parse `pipeline` and run it over `docs` in one step.
pub fn aggregate(docs: Vec<Document>, pipeline: &[Document]) -> Result<Vec<Document>, QueryError> {
    Ok(Pipeline::parse(pipeline)?.run(docs))
}

// ── $group ──────────────────────────────────────────────────────

#[derive(Debug)]
enum AccState {
    Sum {
        int: i64,
        float: f64,
        is_float: bool,
    },
    Avg { total: f64, count: u64 },
    Min(Option<Bson>),
    Max(Option<Bson>),
    Count(i64),
    Values { values: Vec<Bson>, distinct: bool },
    First(Option<Option<Bson>>),
    Last(Option<Bson>),
}

impl AccState {
    fn new(acc: &Accumulator) -> Self {
        match acc {
            Accumulator::Sum(_) => AccState::Sum {
                int: 0,
                float: 0.0,
                is_float: false,
            },
            Accumulator::Avg(_) => AccState::Avg {
                total: 0.0,
                count: 0,
            },
            Accumulator::Min(_) => AccState::Min(None),
            Accumulator::Max(_) => AccState::Max(None),
            Accumulator::Count => AccState::Count(0),
            Accumulator::AddToSet(_) => AccState::Values {
                values: Vec::new(),
                distinct: true,
            },
            Accumulator::Push(_) => AccState::Values {
                values: Vec::new(),
                distinct: false,
            },
            Accumulator::First(_) => AccState::First(None),
            Accumulator::Last(_) => AccState::Last(None),
        }
    }

    fn add(&mut self, acc: &Accumulator, doc: &Document) {
        let value = match acc {
            Accumulator::Count => None,
            Accumulator::Sum(e)
            | Accumulator::Avg(e)
            | Accumulator::Min(e)
            | Accumulator::Max(e)
            | Accumulator::AddToSet(e)
            | Accumulator::Push(e)
            | Accumulator::First(e)
            | Accumulator::Last(e) => e.eval(doc),
        };

        match self {
            AccState::Sum {
                int,
                float,
                is_float,
            } => match value {
                Some(Bson::Int32(n)) => add_int(int, float, is_float, n as i64),
                Some(Bson::Int64(n)) => add_int(int, float, is_float, n),
                Some(Bson::Double(f)) => {
                    *float += f;
                    *is_float = true;
                }
                // Literal operands such as `{ "$sum": 1 }` evaluate once per
                // member. Missing and non-numeric values contribute nothing.
                _ => {}
            },
            AccState::Avg { total, count } => {
                *total += value.as_ref().and_then(to_f64).unwrap_or(0.0);
                *count += 1;
            }
            AccState::Min(current) => keep_extreme(current, value, std::cmp::Ordering::Less),
            AccState::Max(current) => keep_extreme(current, value, std::cmp::Ordering::Greater),
            AccState::Count(n) => *n += 1,
            AccState::Values { values, distinct } => {
                if let Some(value) = value {
                    if !*distinct || !values.iter().any(|v| values_equal(v, &value)) {
                        values.push(value);
                    }
                }
            }
            AccState::First(first) => {
                if first.is_none() {
                    *first = Some(value);
                }
            }
            AccState::Last(last) => *last = value,
        }
    }

    fn finish(self) -> Bson {
        match self {
            AccState::Sum {
                int,
                float,
                is_float,
            } => {
                if is_float {
                    Bson::Double(float + int as f64)
                } else {
                    integer(int)
                }
            }
            AccState::Avg { total, count } => {
                if count == 0 {
                    Bson::Null
                } else {
                    Bson::Double(total / count as f64)
                }
            }
            AccState::Min(v) | AccState::Max(v) | AccState::Last(v) => v.unwrap_or(Bson::Null),
            AccState::First(v) => v.flatten().unwrap_or(Bson::Null),
            AccState::Count(n) => integer(n),
            AccState::Values { values, .. } => Bson::Array(values),
        }
    }
}

fn add_int(int: &mut i64, float: &mut f64, is_float: &mut bool, n: i64) {
    match int.checked_add(n) {
        Some(sum) => *int = sum,
        None => {
            *float += *int as f64 + n as f64;
            *int = 0;
            *is_float = true;
        }
    }
}

fn keep_extreme(current: &mut Option<Bson>, value: Option<Bson>, wanted: std::cmp::Ordering) {
    let Some(value) = value else { return };
    if value == Bson::Null {
        return;
    }
    let replace = match current {
        None => true,
        Some(existing) => sort_order(Some(&value), Some(existing)) == wanted,
    };
    if replace {
        *current = Some(value);
    }
}

struct Bucket {
    key: Bson,
    states: Vec<AccState>,
}

fn run_group(group: &Group, docs: Vec<Document>) -> Vec<Document> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut buckets: Vec<Bucket> = Vec::new();

    for doc in &docs {
        let key = group.key.eval(doc).unwrap_or(Bson::Null);
        let slot = *index.entry(canonical_key(&key)).or_insert_with(|| {
            buckets.push(Bucket {
                key,
                states: group
                    .accumulators
                    .iter()
                    .map(|(_, acc)| AccState::new(acc))
                    .collect(),
            });
            buckets.len() - 1
        });

        let bucket = &mut buckets[slot];
        for ((_, acc), state) in group.accumulators.iter().zip(bucket.states.iter_mut()) {
            state.add(acc, doc);
        }
    }

    buckets
        .into_iter()
        .map(|bucket| {
            let mut out = Document::new();
            out.insert(ID_FIELD, bucket.key);
            for ((name, _), state) in group.accumulators.iter().zip(bucket.states) {
                out.insert(name.clone(), state.finish());
            }
            out
        })
        .collect()
}

// ── $project ────────────────────────────────────────────────────

/// True when `_id` is replaced by an expression rather than kept or dropped.
fn computes_id(projection: &Projection) -> bool {
    projection
        .fields
        .iter()
        .any(|(path, field)| path == ID_FIELD && matches!(field, ProjectField::Computed(_)))
}

fn project(projection: &Projection, doc: &Document) -> Document {
    if projection.exclusion {
        let mut out = doc.clone();
        if projection.include_id == Some(false) {
            out.remove(ID_FIELD);
        }
        for (path, _) in &projection.fields {
            if let Some((parent, leaf)) = resolve_parent_mut(&mut out, path, false) {
                parent.remove(leaf);
            }
        }
        return out;
    }

    let mut out = Document::new();
    if projection.include_id != Some(false) && !computes_id(projection) {
        if let Some(id) = doc.get(ID_FIELD) {
            out.insert(ID_FIELD, id.clone());
        }
    }
    for (path, field) in &projection.fields {
        let value = match field {
            ProjectField::Include => get_path(doc, path).cloned(),
            ProjectField::Computed(expr) => expr.eval(doc),
            ProjectField::Exclude => None,
        };
        if let Some(value) = value {
            if let Some((parent, leaf)) = resolve_parent_mut(&mut out, path, true) {
                parent.insert(leaf, value);
            }
        }
    }
    out
}
