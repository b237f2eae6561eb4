use bson::Document;
use docbench_query::UpdateSpec;

use crate::adapter::{AdapterTransaction, UpdateResult};
use crate::error::AdapterError;
use crate::id::{DocumentId, stamp};

use super::adapter::{MemoryAdapter, Table, update_by_id};

/// Snapshot transaction over a [`MemoryAdapter`].
///
/// Writes go to a private copy of the table; commit swaps it in. Rollback,
/// or dropping the transaction, simply discards the copy. Identity values
/// allocated inside a rolled back transaction are not reused.
pub struct MemoryTransaction<'a> {
    adapter: &'a mut MemoryAdapter,
    working: Table,
}

impl<'a> MemoryTransaction<'a> {
    pub(crate) fn new(adapter: &'a mut MemoryAdapter) -> Self {
        let working = adapter.docs.clone();
        Self { adapter, working }
    }
}

impl AdapterTransaction for MemoryTransaction<'_> {
    fn insert(&mut self, doc: Document) -> Result<DocumentId, AdapterError> {
        let id = self.adapter.ids.allocate();
        self.working.insert(id.0, stamp(doc, id));
        Ok(id)
    }

    fn find_by_id(&self, id: DocumentId) -> Result<Option<Document>, AdapterError> {
        Ok(self.working.get(&id.0).cloned())
    }

    fn update(
        &mut self,
        id: DocumentId,
        update: &UpdateSpec,
    ) -> Result<UpdateResult, AdapterError> {
        update_by_id(&mut self.working, id, update)
    }

    fn delete(&mut self, id: DocumentId) -> Result<u64, AdapterError> {
        Ok(self.working.remove(&id.0).map_or(0, |_| 1))
    }

    fn commit(self: Box<Self>) -> Result<(), AdapterError> {
        let this = *self;
        this.adapter.docs = this.working;
        Ok(())
    }

    fn rollback(self: Box<Self>) -> Result<(), AdapterError> {
        Ok(())
    }
}
