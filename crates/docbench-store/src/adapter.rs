use std::fmt;

use bson::Document;
use docbench_query::{Filter, FindOptions, Pipeline, UpdateSpec};
use serde::{Deserialize, Serialize};

use crate::error::AdapterError;
use crate::id::DocumentId;

/// An optional adapter feature, gated by [`Capabilities`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Transactions,
    Indexes,
    Aggregation,
    NativeQuery,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::Transactions => "transactions",
            Capability::Indexes => "indexes",
            Capability::Aggregation => "aggregation",
            Capability::NativeQuery => "native_query",
        };
        f.write_str(name)
    }
}

/// Capability descriptor declared once per adapter and consulted before any
/// capability-gated call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub transactions: bool,
    pub indexes: bool,
    pub aggregation: bool,
    /// The backend evaluates queries itself rather than through the embedded engine.
    pub native_query: bool,
}

impl Capabilities {
    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Transactions => self.transactions,
            Capability::Indexes => self.indexes,
            Capability::Aggregation => self.aggregation,
            Capability::NativeQuery => self.native_query,
        }
    }

    /// Error out unless `capability` is advertised.
    pub fn require(&self, capability: Capability) -> Result<(), AdapterError> {
        if self.supports(capability) {
            Ok(())
        } else {
            Err(AdapterError::Unsupported(capability))
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateResult {
    pub matched: u64,
    pub modified: u64,
}

impl UpdateResult {
    pub(crate) fn record(&mut self, changed: bool) {
        self.matched += 1;
        if changed {
            self.modified += 1;
        }
    }
}

/// Uniform interface over one storage backend.
///
/// Reads take `&self` and writes take `&mut self`; an adapter instance is
/// driven by one caller at a time. Natural order (no sort) is insertion order.
pub trait StorageAdapter {
    /// Stable name used in reports.
    fn name(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    /// Idempotent setup.
    fn init(&mut self) -> Result<(), AdapterError>;

    /// Remove every document. Identity values keep counting up.
    fn clear(&mut self) -> Result<(), AdapterError>;

    fn insert(&mut self, doc: Document) -> Result<DocumentId, AdapterError>;

    fn bulk_insert(&mut self, docs: Vec<Document>) -> Result<Vec<DocumentId>, AdapterError> {
        docs.into_iter().map(|doc| self.insert(doc)).collect()
    }

    fn find(&self, filter: &Filter, options: &FindOptions) -> Result<Vec<Document>, AdapterError>;

    fn find_one(&self, filter: &Filter) -> Result<Option<Document>, AdapterError> {
        let mut docs = self.find(filter, &FindOptions::default().limit(1))?;
        Ok(docs.pop())
    }

    fn find_by_id(&self, id: DocumentId) -> Result<Option<Document>, AdapterError>;

    fn update(&mut self, id: DocumentId, update: &UpdateSpec) -> Result<UpdateResult, AdapterError>;

    fn update_many(
        &mut self,
        filter: &Filter,
        update: &UpdateSpec,
    ) -> Result<UpdateResult, AdapterError>;

    fn delete(&mut self, id: DocumentId) -> Result<u64, AdapterError>;

    fn delete_many(&mut self, filter: &Filter) -> Result<u64, AdapterError>;

    fn count(&self, filter: &Filter) -> Result<u64, AdapterError> {
        Ok(self.find(filter, &FindOptions::default())?.len() as u64)
    }

    /// Returns a success indicator. Adapters that accept indexes without
    /// building anything still return `Ok(true)`.
    fn create_index(&mut self, name: &str, fields: &[String]) -> Result<bool, AdapterError> {
        let _ = (name, fields);
        self.capabilities().require(Capability::Indexes)?;
        Ok(true)
    }

    fn aggregate(&self, pipeline: &Pipeline) -> Result<Vec<Document>, AdapterError> {
        let _ = pipeline;
        Err(AdapterError::Unsupported(Capability::Aggregation))
    }

    fn begin_transaction(&mut self) -> Result<Box<dyn AdapterTransaction + '_>, AdapterError> {
        Err(AdapterError::Unsupported(Capability::Transactions))
    }
}

/// A unit of work against one adapter. Changes become visible on `commit`;
/// `rollback` or dropping the transaction discards them.
pub trait AdapterTransaction {
    fn insert(&mut self, doc: Document) -> Result<DocumentId, AdapterError>;

    fn find_by_id(&self, id: DocumentId) -> Result<Option<Document>, AdapterError>;

    fn update(&mut self, id: DocumentId, update: &UpdateSpec) -> Result<UpdateResult, AdapterError>;

    fn delete(&mut self, id: DocumentId) -> Result<u64, AdapterError>;

    fn commit(self: Box<Self>) -> Result<(), AdapterError>;

    fn rollback(self: Box<Self>) -> Result<(), AdapterError>;
}
