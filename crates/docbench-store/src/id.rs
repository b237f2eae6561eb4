use std::fmt;

use bson::{Bson, Document};
use docbench_query::ID_FIELD;
use serde::{Deserialize, Serialize};

/// Identity assigned to a document by its adapter on insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub u64);

impl DocumentId {
    pub fn to_bson(self) -> Bson {
        Bson::Int64(self.0 as i64)
    }

    /// Read the identity of a stored document.
    pub fn of(doc: &Document) -> Option<DocumentId> {
        match doc.get(ID_FIELD)? {
            Bson::Int64(n) => u64::try_from(*n).ok().map(DocumentId),
            Bson::Int32(n) => u64::try_from(*n).ok().map(DocumentId),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for DocumentId {
    fn from(n: u64) -> Self {
        DocumentId(n)
    }
}

/// Monotonic identity source. Values are never handed out twice, even across
/// `clear()` and rolled back transactions.
#[derive(Debug)]
pub(crate) struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub(crate) fn new() -> Self {
        Self { next: 1 }
    }

    pub(crate) fn allocate(&mut self) -> DocumentId {
        let id = DocumentId(self.next);
        self.next += 1;
        id
    }
}

/// Rebuild `doc` with `id` as its leading `_id`, discarding any caller-supplied one.
pub(crate) fn stamp(doc: Document, id: DocumentId) -> Document {
    let mut stamped = Document::new();
    stamped.insert(ID_FIELD, id.to_bson());
    for (key, value) in doc {
        if key != ID_FIELD {
            stamped.insert(key, value);
        }
    }
    stamped
}
