use bson::Document;
use docbench_query::UpdateSpec;

use crate::adapter::{AdapterTransaction, UpdateResult};
use crate::error::AdapterError;
use crate::id::{DocumentId, IdAllocator, stamp};

use super::adapter::{DOCS, encode, get_document, storage_err, update_in_table};

/// Native redb write transaction. Dropping it without `commit` aborts.
pub struct RedbTransaction<'a> {
    txn: Option<redb::WriteTransaction>,
    ids: &'a mut IdAllocator,
}

impl<'a> RedbTransaction<'a> {
    pub(crate) fn new(txn: redb::WriteTransaction, ids: &'a mut IdAllocator) -> Self {
        Self {
            txn: Some(txn),
            ids,
        }
    }

    fn txn(&self) -> Result<&redb::WriteTransaction, AdapterError> {
        self.txn.as_ref().ok_or(AdapterError::TransactionConsumed)
    }
}

impl AdapterTransaction for RedbTransaction<'_> {
    fn insert(&mut self, doc: Document) -> Result<DocumentId, AdapterError> {
        let id = self.ids.allocate();
        let bytes = encode(&stamp(doc, id))?;
        let mut table = self.txn()?.open_table(DOCS).map_err(storage_err)?;
        table.insert(id.0, bytes.as_slice()).map_err(storage_err)?;
        Ok(id)
    }

    fn find_by_id(&self, id: DocumentId) -> Result<Option<Document>, AdapterError> {
        let table = self.txn()?.open_table(DOCS).map_err(storage_err)?;
        get_document(&table, id)
    }

    fn update(
        &mut self,
        id: DocumentId,
        update: &UpdateSpec,
    ) -> Result<UpdateResult, AdapterError> {
        let mut table = self.txn()?.open_table(DOCS).map_err(storage_err)?;
        update_in_table(&mut table, id, update)
    }

    fn delete(&mut self, id: DocumentId) -> Result<u64, AdapterError> {
        let mut table = self.txn()?.open_table(DOCS).map_err(storage_err)?;
        let removed = table.remove(id.0).map_err(storage_err)?;
        Ok(removed.map_or(0, |_| 1))
    }

    fn commit(mut self: Box<Self>) -> Result<(), AdapterError> {
        let txn = self.txn.take().ok_or(AdapterError::TransactionConsumed)?;
        txn.commit().map_err(storage_err)
    }

    fn rollback(mut self: Box<Self>) -> Result<(), AdapterError> {
        let txn = self.txn.take().ok_or(AdapterError::TransactionConsumed)?;
        txn.abort().map_err(storage_err)
    }
}
