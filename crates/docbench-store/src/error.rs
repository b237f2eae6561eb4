use std::fmt;

use docbench_query::QueryError;

use crate::adapter::Capability;

#[derive(Debug)]
pub enum AdapterError {
    /// The adapter does not advertise the capability the call needs.
    Unsupported(Capability),
    NotInitialized,
    Query(QueryError),
    Serialization(String),
    Storage(String),
    TransactionConsumed,
    Other(String),
}

impl AdapterError {
    pub fn is_unsupported(&self) -> bool {
        matches!(self, AdapterError::Unsupported(_))
    }
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterError::Unsupported(cap) => write!(f, "unsupported operation: {cap}"),
            AdapterError::NotInitialized => write!(f, "adapter not initialized"),
            AdapterError::Query(e) => write!(f, "{e}"),
            AdapterError::Serialization(msg) => write!(f, "serialization error: {msg}"),
            AdapterError::Storage(msg) => write!(f, "storage error: {msg}"),
            AdapterError::TransactionConsumed => write!(f, "transaction already consumed"),
            AdapterError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for AdapterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AdapterError::Query(e) => Some(e),
            _ => None,
        }
    }
}

impl From<QueryError> for AdapterError {
    fn from(e: QueryError) -> Self {
        AdapterError::Query(e)
    }
}

impl From<bson::error::Error> for AdapterError {
    fn from(e: bson::error::Error) -> Self {
        AdapterError::Serialization(e.to_string())
    }
}
