mod aggregate;
mod error;
mod filter;
mod options;
mod parse_filter;
mod pipeline;
mod sort;
mod strictness;
pub mod update;
mod value;

pub use aggregate::aggregate;
pub use bson::{Bson, Document, doc};
pub use error::QueryError;
pub use filter::{Clause, Filter, Predicate, matches};
pub use options::{FindOptions, find_in};
pub use parse_filter::parse_filter;
pub use pipeline::{
    Accumulator, Expr, Group, Pipeline, ProjectField, Projection, Stage, parse_pipeline,
};
pub use sort::{Sort, SortDirection, compare_documents, parse_sort, sort_documents};
pub use strictness::Strictness;
pub use update::{FieldUpdate, PopEnd, UpdateOp, UpdateSpec, apply_update, parse_update};
pub use value::{compare_values, documents_equal, get_path, sort_order, values_equal};

/// Reserved field holding a document's identity.
pub const ID_FIELD: &str = "_id";
