//! Baseline adapter modelled on a plain string key/value store: every
//! document is stored as an encoded blob under its own key and decoded again
//! on each read. No transactions, no indexes, no aggregation.

use std::collections::BTreeMap;

use bson::Document;
use docbench_query::{Filter, FindOptions, UpdateSpec};

use crate::adapter::{Capabilities, StorageAdapter, UpdateResult};
use crate::error::AdapterError;
use crate::id::{DocumentId, IdAllocator, stamp};

const KEY_PREFIX: &str = "doc:";

pub struct KvAdapter {
    name: String,
    entries: BTreeMap<String, Vec<u8>>,
    ids: IdAllocator,
}

impl KvAdapter {
    pub fn new() -> Self {
        Self::named("kv")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: BTreeMap::new(),
            ids: IdAllocator::new(),
        }
    }

    fn put(&mut self, id: DocumentId, doc: &Document) -> Result<(), AdapterError> {
        let bytes = bson::serialize_to_vec(doc)?;
        self.entries.insert(key(id), bytes);
        Ok(())
    }

    /// Decode every stored document in key (= insertion) order.
    fn scan(&self) -> impl Iterator<Item = Result<(DocumentId, Document), AdapterError>> + '_ {
        self.entries.iter().map(|(k, bytes)| {
            let id = parse_key(k)?;
            Ok((id, decode(bytes)?))
        })
    }

    fn matching(&self, filter: &Filter) -> Result<Vec<(DocumentId, Document)>, AdapterError> {
        let mut out = Vec::new();
        for entry in self.scan() {
            let (id, doc) = entry?;
            if filter.matches(&doc) {
                out.push((id, doc));
            }
        }
        Ok(out)
    }
}

impl Default for KvAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// Zero padding keeps lexicographic key order equal to identity order.
fn key(id: DocumentId) -> String {
    format!("{KEY_PREFIX}{:020}", id.0)
}

fn parse_key(key: &str) -> Result<DocumentId, AdapterError> {
    key.strip_prefix(KEY_PREFIX)
        .and_then(|n| n.parse::<u64>().ok())
        .map(DocumentId)
        .ok_or_else(|| AdapterError::Storage(format!("malformed key: {key}")))
}

fn decode(bytes: &[u8]) -> Result<Document, AdapterError> {
    Ok(bson::deserialize_from_slice(bytes)?)
}

impl StorageAdapter for KvAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    fn init(&mut self) -> Result<(), AdapterError> {
        Ok(())
    }

    fn clear(&mut self) -> Result<(), AdapterError> {
        self.entries.clear();
        Ok(())
    }

    fn insert(&mut self, doc: Document) -> Result<DocumentId, AdapterError> {
        let id = self.ids.allocate();
        self.put(id, &stamp(doc, id))?;
        Ok(id)
    }

    fn find(&self, filter: &Filter, options: &FindOptions) -> Result<Vec<Document>, AdapterError> {
        let matched = self.matching(filter)?;
        Ok(options.apply(matched.into_iter().map(|(_, doc)| doc)))
    }

    fn find_by_id(&self, id: DocumentId) -> Result<Option<Document>, AdapterError> {
        self.entries.get(&key(id)).map(|bytes| decode(bytes)).transpose()
    }

    fn update(
        &mut self,
        id: DocumentId,
        update: &UpdateSpec,
    ) -> Result<UpdateResult, AdapterError> {
        let mut result = UpdateResult::default();
        let Some(mut doc) = self.find_by_id(id)? else {
            return Ok(result);
        };
        let changed = update.apply(&mut doc)?;
        if changed {
            self.put(id, &doc)?;
        }
        result.record(changed);
        Ok(result)
    }

    fn update_many(
        &mut self,
        filter: &Filter,
        update: &UpdateSpec,
    ) -> Result<UpdateResult, AdapterError> {
        let mut result = UpdateResult::default();
        let mut writes = Vec::new();
        for (id, mut doc) in self.matching(filter)? {
            let changed = update.apply(&mut doc)?;
            if changed {
                writes.push((id, doc));
            }
            result.record(changed);
        }
        for (id, doc) in &writes {
            self.put(*id, doc)?;
        }
        Ok(result)
    }

    fn delete(&mut self, id: DocumentId) -> Result<u64, AdapterError> {
        Ok(self.entries.remove(&key(id)).map_or(0, |_| 1))
    }

    fn delete_many(&mut self, filter: &Filter) -> Result<u64, AdapterError> {
        let doomed = self.matching(filter)?;
        for (id, _) in &doomed {
            self.entries.remove(&key(*id));
        }
        Ok(doomed.len() as u64)
    }
}
