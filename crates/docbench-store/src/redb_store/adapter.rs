use std::path::{Path, PathBuf};

use bson::Document;
use docbench_query::{Filter, FindOptions, Pipeline, UpdateSpec};
use redb::{Database, ReadableTable, TableDefinition};
use tempfile::TempDir;

use crate::adapter::{AdapterTransaction, Capabilities, StorageAdapter, UpdateResult};
use crate::error::AdapterError;
use crate::id::{DocumentId, IdAllocator, stamp};

use super::transaction::RedbTransaction;

pub(super) const DOCS: TableDefinition<u64, &[u8]> = TableDefinition::new("docs");

pub(super) fn storage_err(e: impl std::fmt::Display) -> AdapterError {
    AdapterError::Storage(e.to_string())
}

/// Embedded on-disk baseline: one redb table mapping identity to encoded
/// document bytes. Queries run through the embedded engine after decoding.
pub struct RedbAdapter {
    name: String,
    path: Option<PathBuf>,
    db: Option<Database>,
    ids: IdAllocator,
    // Held so the temporary database file outlives the adapter.
    _dir: Option<TempDir>,
}

impl RedbAdapter {
    /// Adapter over a database file at `path`, created on `init`.
    pub fn open(path: &Path) -> Self {
        Self {
            name: "redb".to_string(),
            path: Some(path.to_path_buf()),
            db: None,
            ids: IdAllocator::new(),
            _dir: None,
        }
    }

    /// Adapter over a database in a fresh temporary directory.
    pub fn temporary() -> Self {
        Self {
            name: "redb".to_string(),
            path: None,
            db: None,
            ids: IdAllocator::new(),
            _dir: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn db(&self) -> Result<&Database, AdapterError> {
        self.db.as_ref().ok_or(AdapterError::NotInitialized)
    }

    /// Run `f` inside one write transaction, committing only if it succeeds.
    fn write<T>(
        &self,
        f: impl FnOnce(&mut redb::Table<'_, u64, &'static [u8]>) -> Result<T, AdapterError>,
    ) -> Result<T, AdapterError> {
        let txn = self.db()?.begin_write().map_err(storage_err)?;
        let out = {
            let mut table = txn.open_table(DOCS).map_err(storage_err)?;
            f(&mut table)?
        };
        txn.commit().map_err(storage_err)?;
        Ok(out)
    }

    fn matching(&self, filter: &Filter) -> Result<Vec<(u64, Document)>, AdapterError> {
        let txn = self.db()?.begin_read().map_err(storage_err)?;
        let table = txn.open_table(DOCS).map_err(storage_err)?;
        collect_matching(&table, filter)
    }
}

pub(super) fn encode(doc: &Document) -> Result<Vec<u8>, AdapterError> {
    Ok(bson::serialize_to_vec(doc)?)
}

pub(super) fn decode(bytes: &[u8]) -> Result<Document, AdapterError> {
    Ok(bson::deserialize_from_slice(bytes)?)
}

/// Decode every document in key order and keep those matching `filter`.
pub(super) fn collect_matching<T: ReadableTable<u64, &'static [u8]>>(
    table: &T,
    filter: &Filter,
) -> Result<Vec<(u64, Document)>, AdapterError> {
    let mut out = Vec::new();
    for entry in table.iter().map_err(storage_err)? {
        let (key, value) = entry.map_err(storage_err)?;
        let doc = decode(value.value())?;
        if filter.matches(&doc) {
            out.push((key.value(), doc));
        }
    }
    Ok(out)
}

pub(super) fn get_document<T: ReadableTable<u64, &'static [u8]>>(
    table: &T,
    id: DocumentId,
) -> Result<Option<Document>, AdapterError> {
    let value = table.get(id.0).map_err(storage_err)?;
    value.map(|v| decode(v.value())).transpose()
}

/// Apply `update` to the document stored under `id`, writing it back when changed.
pub(super) fn update_in_table(
    table: &mut redb::Table<'_, u64, &'static [u8]>,
    id: DocumentId,
    update: &UpdateSpec,
) -> Result<UpdateResult, AdapterError> {
    let mut result = UpdateResult::default();
    let Some(mut doc) = get_document(&*table, id)? else {
        return Ok(result);
    };
    let changed = update.apply(&mut doc)?;
    if changed {
        table
            .insert(id.0, encode(&doc)?.as_slice())
            .map_err(storage_err)?;
    }
    result.record(changed);
    Ok(result)
}

impl StorageAdapter for RedbAdapter {
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
        if self.db.is_some() {
            return Ok(());
        }
        let path = match &self.path {
            Some(path) => path.clone(),
            None => {
                let dir = tempfile::tempdir().map_err(storage_err)?;
                let path = dir.path().join("docbench.redb");
                self._dir = Some(dir);
                path
            }
        };
        let db = Database::create(&path).map_err(storage_err)?;
        let txn = db.begin_write().map_err(storage_err)?;
        txn.open_table(DOCS).map_err(storage_err)?;
        txn.commit().map_err(storage_err)?;
        self.db = Some(db);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), AdapterError> {
        let txn = self.db()?.begin_write().map_err(storage_err)?;
        txn.delete_table(DOCS).map_err(storage_err)?;
        txn.open_table(DOCS).map_err(storage_err)?;
        txn.commit().map_err(storage_err)?;
        Ok(())
    }

    fn insert(&mut self, doc: Document) -> Result<DocumentId, AdapterError> {
        self.db()?;
        let id = self.ids.allocate();
        let bytes = encode(&stamp(doc, id))?;
        self.write(|table| {
            table.insert(id.0, bytes.as_slice()).map_err(storage_err)?;
            Ok(id)
        })
    }

    fn bulk_insert(&mut self, docs: Vec<Document>) -> Result<Vec<DocumentId>, AdapterError> {
        self.db()?;
        let mut batch = Vec::with_capacity(docs.len());
        for doc in docs {
            let id = self.ids.allocate();
            batch.push((id, encode(&stamp(doc, id))?));
        }
        self.write(|table| {
            for (id, bytes) in &batch {
                table.insert(id.0, bytes.as_slice()).map_err(storage_err)?;
            }
            Ok(batch.iter().map(|(id, _)| *id).collect())
        })
    }

    fn find(&self, filter: &Filter, options: &FindOptions) -> Result<Vec<Document>, AdapterError> {
        let matched = self.matching(filter)?;
        Ok(options.apply(matched.into_iter().map(|(_, doc)| doc)))
    }

    fn find_by_id(&self, id: DocumentId) -> Result<Option<Document>, AdapterError> {
        let txn = self.db()?.begin_read().map_err(storage_err)?;
        let table = txn.open_table(DOCS).map_err(storage_err)?;
        get_document(&table, id)
    }

    fn update(
        &mut self,
        id: DocumentId,
        update: &UpdateSpec,
    ) -> Result<UpdateResult, AdapterError> {
        self.write(|table| update_in_table(table, id, update))
    }

    fn update_many(
        &mut self,
        filter: &Filter,
        update: &UpdateSpec,
    ) -> Result<UpdateResult, AdapterError> {
        self.write(|table| {
            let mut result = UpdateResult::default();
            for (key, mut doc) in collect_matching(&*table, filter)? {
                let changed = update.apply(&mut doc)?;
                if changed {
                    table
                        .insert(key, encode(&doc)?.as_slice())
                        .map_err(storage_err)?;
                }
                result.record(changed);
            }
            Ok(result)
        })
    }

    fn delete(&mut self, id: DocumentId) -> Result<u64, AdapterError> {
        self.write(|table| {
            let removed = table.remove(id.0).map_err(storage_err)?;
            Ok(removed.map_or(0, |_| 1))
        })
    }

    fn delete_many(&mut self, filter: &Filter) -> Result<u64, AdapterError> {
        self.write(|table| {
            let doomed = collect_matching(&*table, filter)?;
            for (key, _) in &doomed {
                table.remove(*key).map_err(storage_err)?;
            }
            Ok(doomed.len() as u64)
        })
    }

    fn aggregate(&self, pipeline: &Pipeline) -> Result<Vec<Document>, AdapterError> {
        let docs = self.matching(&Filter::all())?;
        Ok(pipeline.run(docs.into_iter().map(|(_, doc)| doc).collect()))
    }

    fn begin_transaction(&mut self) -> Result<Box<dyn AdapterTransaction + '_>, AdapterError> {
        let txn = self.db()?.begin_write().map_err(storage_err)?;
        Ok(Box::new(RedbTransaction::new(txn, &mut self.ids)))
    }
}
