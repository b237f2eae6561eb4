use std::collections::BTreeMap;

use bson::Document;
use docbench_query::{Filter, FindOptions, Pipeline, UpdateSpec};
use imbl::OrdMap;

use crate::adapter::{AdapterTransaction, Capabilities, StorageAdapter, UpdateResult};
use crate::error::AdapterError;
use crate::id::{DocumentId, IdAllocator, stamp};

use super::transaction::MemoryTransaction;

/// Identity → document table. Cloning is O(1) thanks to structural sharing,
/// which is what makes snapshots cheap.
pub(crate) type Table = OrdMap<u64, Document>;

/// Reference adapter: an owned in-memory table evaluated by the embedded
/// query engine. Supports every capability.
pub struct MemoryAdapter {
    name: String,
    pub(super) docs: Table,
    pub(super) ids: IdAllocator,
    indexes: BTreeMap<String, Vec<String>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::named("memory")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            docs: OrdMap::new(),
            ids: IdAllocator::new(),
            indexes: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Index definitions recorded by `create_index`, by name.
    pub fn indexes(&self) -> &BTreeMap<String, Vec<String>> {
        &self.indexes
    }
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageAdapter for MemoryAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            transactions: true,
            indexes: true,
            aggregation: true,
            native_query: false,
        }
    }

    fn init(&mut self) -> Result<(), AdapterError> {
        Ok(())
    }

    fn clear(&mut self) -> Result<(), AdapterError> {
        self.docs = OrdMap::new();
        Ok(())
    }

    fn insert(&mut self, doc: Document) -> Result<DocumentId, AdapterError> {
        let id = self.ids.allocate();
        self.docs.insert(id.0, stamp(doc, id));
        Ok(id)
    }

    fn bulk_insert(&mut self, docs: Vec<Document>) -> Result<Vec<DocumentId>, AdapterError> {
        let mut ids = Vec::with_capacity(docs.len());
        let entries = docs.into_iter().map(|doc| {
            let id = self.ids.allocate();
            ids.push(id);
            (id.0, stamp(doc, id))
        });
        let batch: Table = entries.collect();
        self.docs = std::mem::take(&mut self.docs).union(batch);
        Ok(ids)
    }

    fn find(&self, filter: &Filter, options: &FindOptions) -> Result<Vec<Document>, AdapterError> {
        Ok(options.apply(self.docs.values().filter(|d| filter.matches(d)).cloned()))
    }

    fn find_by_id(&self, id: DocumentId) -> Result<Option<Document>, AdapterError> {
        Ok(self.docs.get(&id.0).cloned())
    }

    fn update(
        &mut self,
        id: DocumentId,
        update: &UpdateSpec,
    ) -> Result<UpdateResult, AdapterError> {
        update_by_id(&mut self.docs, id, update)
    }

    fn update_many(
        &mut self,
        filter: &Filter,
        update: &UpdateSpec,
    ) -> Result<UpdateResult, AdapterError> {
        // Work on a snapshot so a failing update leaves the table untouched.
        let mut working = self.docs.clone();
        let mut result = UpdateResult::default();
        for (key, doc) in self.docs.iter() {
            if !filter.matches(doc) {
                continue;
            }
            let mut next = doc.clone();
            let changed = update.apply(&mut next)?;
            if changed {
                working.insert(*key, next);
            }
            result.record(changed);
        }
        self.docs = working;
        Ok(result)
    }

    fn delete(&mut self, id: DocumentId) -> Result<u64, AdapterError> {
        Ok(self.docs.remove(&id.0).map_or(0, |_| 1))
    }

    fn delete_many(&mut self, filter: &Filter) -> Result<u64, AdapterError> {
        let doomed: Vec<u64> = self
            .docs
            .iter()
            .filter(|(_, doc)| filter.matches(doc))
            .map(|(key, _)| *key)
            .collect();
        for key in &doomed {
            self.docs.remove(key);
        }
        Ok(doomed.len() as u64)
    }

    fn count(&self, filter: &Filter) -> Result<u64, AdapterError> {
        Ok(self.docs.values().filter(|d| filter.matches(d)).count() as u64)
    }

    fn create_index(&mut self, name: &str, fields: &[String]) -> Result<bool, AdapterError> {
        self.indexes.insert(name.to_string(), fields.to_vec());
        Ok(true)
    }

    fn aggregate(&self, pipeline: &Pipeline) -> Result<Vec<Document>, AdapterError> {
        Ok(pipeline.run(self.docs.values().cloned().collect()))
    }

    fn begin_transaction(&mut self) -> Result<Box<dyn AdapterTransaction + '_>, AdapterError> {
        Ok(Box::new(MemoryTransaction::new(self)))
    }
}

/// Apply `update` to one document, replacing it only when the update succeeds.
pub(super) fn update_by_id(
    docs: &mut Table,
    id: DocumentId,
    update: &UpdateSpec,
) -> Result<UpdateResult, AdapterError> {
    let mut result = UpdateResult::default();
    let Some(doc) = docs.get(&id.0) else {
        return Ok(result);
    };
    let mut next = doc.clone();
    let changed = update.apply(&mut next)?;
    if changed {
        docs.insert(id.0, next);
    }
    result.record(changed);
    Ok(result)
}
