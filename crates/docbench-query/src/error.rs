use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum QueryError {
    InvalidFilter(String),
    InvalidUpdate(String),
    InvalidPipeline(String),
    /// Raised in strict mode for operator or stage keys the engine does not know.
    UnknownOperator(String),
    TypeMismatch(String),
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::InvalidFilter(msg) => write!(f, "invalid filter: {msg}"),
            QueryError::InvalidUpdate(msg) => write!(f, "invalid update: {msg}"),
            QueryError::InvalidPipeline(msg) => write!(f, "invalid pipeline: {msg}"),
            QueryError::UnknownOperator(op) => write!(f, "unknown operator: {op}"),
            QueryError::TypeMismatch(msg) => write!(f, "type mismatch: {msg}"),
        }
    }
}

impl std::error::Error for QueryError {}
