use bson::{Bson, Document};

use crate::ID_FIELD;
use crate::error::QueryError;
use crate::filter::Filter;
use crate::parse_filter::parse_filter;
use crate::sort::{Sort, parse_sort};
use crate::strictness::Strictness;
use crate::value::{get_path, is_truthy};

/// An ordered aggregation pipeline.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    pub(crate) stages: Vec<Stage>,
}

#[derive(Debug, Clone)]
pub enum Stage {
    Match(Filter),
    Group(Group),
    Sort(Vec<Sort>),
    Limit(usize),
    Skip(usize),
    Project(Projection),
    /// Replace the input with a single `{ name: count }` document.
    Count(String),
}

/// Value expression: a literal, a `"$field"` reference, or a document of
/// expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Bson),
    Field(String),
    Document(Vec<(String, Expr)>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    Sum(Expr),
    Avg(Expr),
    Min(Expr),
    Max(Expr),
    Count,
    AddToSet(Expr),
    Push(Expr),
    First(Expr),
    Last(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub key: Expr,
    pub accumulators: Vec<(String, Accumulator)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectField {
    Include,
    Exclude,
    Computed(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub fields: Vec<(String, ProjectField)>,
    /// `Some(true)` when `_id` is explicitly included, `Some(false)` when excluded.
    pub include_id: Option<bool>,
    pub exclusion: bool,
}

impl Expr {
    pub fn parse(value: &Bson) -> Expr {
        match value {
            Bson::String(s) if s.starts_with('$') && s.len() > 1 => Expr::Field(s[1..].to_string()),
            Bson::Document(doc) if !doc.keys().any(|k| k.starts_with('$')) => Expr::Document(
                doc.iter()
                    .map(|(k, v)| (k.clone(), Expr::parse(v)))
                    .collect(),
            ),
            literal => Expr::Literal(literal.clone()),
        }
    }

    /// Evaluate against a document. `None` means the referenced field is missing.
    pub fn eval(&self, doc: &Document) -> Option<Bson> {
        match self {
            Expr::Literal(value) => Some(value.clone()),
            Expr::Field(path) => get_path(doc, path).cloned(),
            Expr::Document(fields) => {
                let mut out = Document::new();
                for (key, expr) in fields {
                    if let Some(value) = expr.eval(doc) {
                        out.insert(key.clone(), value);
                    }
                }
                Some(Bson::Document(out))
            }
        }
    }
}

impl Pipeline {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    /// Decode pipeline stages, skipping unknown stages.
    pub fn parse(stages: &[Document]) -> Result<Pipeline, QueryError> {
        parse_pipeline(stages, Strictness::Permissive)
    }

    pub fn parse_with(stages: &[Document], strictness: Strictness) -> Result<Pipeline, QueryError> {
        parse_pipeline(stages, strictness)
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }
}

/// Decode an array of single-key stage documents into a [`Pipeline`].
pub fn parse_pipeline(stages: &[Document], strictness: Strictness) -> Result<Pipeline, QueryError> {
    let mut parsed = Vec::with_capacity(stages.len());

    for stage in stages {
        let mut entries = stage.iter();
        let (Some((name, spec)), None) = (entries.next(), entries.next()) else {
            return Err(QueryError::InvalidPipeline(
                "each stage must have exactly one key".into(),
            ));
        };

        let stage = match name.as_str() {
            "$match" => Stage::Match(parse_filter(stage_document(name, spec)?, strictness)?),
            "$group" => Stage::Group(parse_group(stage_document(name, spec)?, strictness)?),
            "$sort" => Stage::Sort(parse_sort(stage_document(name, spec)?)?),
            "$limit" => Stage::Limit(count_operand(name, spec)?),
            "$skip" => Stage::Skip(count_operand(name, spec)?),
            "$project" => Stage::Project(parse_projection(stage_document(name, spec)?)?),
            "$count" => match spec {
                Bson::String(field)
                    if !field.is_empty() && !field.starts_with('$') && !field.contains('.') =>
                {
                    Stage::Count(field.clone())
                }
                _ => {
                    return Err(QueryError::InvalidPipeline(
                        "$count requires a non-empty field name".into(),
                    ));
                }
            },
            other => {
                strictness.unknown(other)?;
                continue;
            }
        };
        parsed.push(stage);
    }

    Ok(Pipeline { stages: parsed })
}

fn stage_document<'a>(name: &str, spec: &'a Bson) -> Result<&'a Document, QueryError> {
    match spec {
        Bson::Document(doc) => Ok(doc),
        _ => Err(QueryError::InvalidPipeline(format!("{name} requires a document"))),
    }
}

fn count_operand(name: &str, spec: &Bson) -> Result<usize, QueryError> {
    let n = match spec {
        Bson::Int32(n) => Some(*n as i64),
        Bson::Int64(n) => Some(*n),
        Bson::Double(f) if f.fract() == 0.0 => Some(*f as i64),
        _ => None,
    };
    n.and_then(|n| usize::try_from(n).ok()).ok_or_else(|| {
        QueryError::InvalidPipeline(format!("{name} requires a non-negative integer"))
    })
}

fn parse_group(spec: &Document, strictness: Strictness) -> Result<Group, QueryError> {
    let key = spec
        .get(ID_FIELD)
        .map(Expr::parse)
        .ok_or_else(|| QueryError::InvalidPipeline("$group requires an _id expression".into()))?;

    let mut accumulators = Vec::new();
    for (name, value) in spec {
        if name == ID_FIELD {
            continue;
        }
        let Bson::Document(acc) = value else {
            return Err(QueryError::InvalidPipeline(format!(
                "accumulator {name} must be a document"
            )));
        };
        let mut entries = acc.iter();
        let (Some((op, operand)), None) = (entries.next(), entries.next()) else {
            return Err(QueryError::InvalidPipeline(format!(
                "accumulator {name} must have exactly one operator"
            )));
        };
        let operand = Expr::parse(operand);
        let accumulator = match op.as_str() {
            "$sum" => Accumulator::Sum(operand),
            "$avg" => Accumulator::Avg(operand),
            "$min" => Accumulator::Min(operand),
            "$max" => Accumulator::Max(operand),
            "$count" => Accumulator::Count,
            "$addToSet" => Accumulator::AddToSet(operand),
            "$push" => Accumulator::Push(operand),
            "$first" => Accumulator::First(operand),
            "$last" => Accumulator::Last(operand),
            other => {
                strictness.unknown(other)?;
                continue;
            }
        };
        accumulators.push((name.clone(), accumulator));
    }

    Ok(Group { key, accumulators })
}

fn parse_projection(spec: &Document) -> Result<Projection, QueryError> {
    let mut fields = Vec::with_capacity(spec.len());
    let mut include_id = None;

    for (key, value) in spec {
        let flag = matches!(
            value,
            Bson::Boolean(_) | Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)
        );
        if key == ID_FIELD && flag {
            include_id = Some(is_truthy(value));
            continue;
        }
        let field = if flag {
            if is_truthy(value) {
                ProjectField::Include
            } else {
                ProjectField::Exclude
            }
        } else {
            ProjectField::Computed(Expr::parse(value))
        };
        fields.push((key.clone(), field));
    }

    let excludes = fields.iter().any(|(_, f)| *f == ProjectField::Exclude);
    let includes = fields.iter().any(|(_, f)| *f != ProjectField::Exclude);
    if excludes && includes {
        return Err(QueryError::InvalidPipeline(
            "$project cannot mix inclusion and exclusion".into(),
        ));
    }

    Ok(Projection {
        fields,
        include_id,
        exclusion: excludes || (!includes && include_id == Some(false)),
    })
}
