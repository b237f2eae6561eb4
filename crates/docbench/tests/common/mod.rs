#![allow(dead_code)]

use std::cell::Cell;
use std::time::Duration;

use bson::{Document, doc};
use docbench::{AdapterRegistry, BenchConfig, Scenario};
use docbench_query::{Filter, FindOptions, Pipeline, UpdateSpec};
use docbench_store::{
    AdapterError, AdapterTransaction, Capabilities, Capability, DocumentId, MemoryAdapter,
    StorageAdapter, UpdateResult,
};

pub fn small_config() -> BenchConfig {
    BenchConfig {
        iterations: 3,
        warmup: 1,
        data_size: 30,
        batch_size: 5,
        ..BenchConfig::default()
    }
}

pub fn register(registry: &mut AdapterRegistry, name: &str, make: impl Fn() -> Scripted + 'static) {
    registry.register(name, move || Ok(Box::new(make())));
}

// ── Scripted adapter ────────────────────────────────────────────

/// Memory-backed adapter whose `find` and `aggregate` can be told to
/// misbehave on a given call.
pub struct Scripted {
    inner: MemoryAdapter,
    capabilities: Capabilities,
    find_calls: Cell<usize>,
    fail_find_on: Option<usize>,
    panic_find_on: Option<usize>,
    refuse_aggregate: bool,
    fail_init: bool,
}

impl Scripted {
    pub fn new() -> Self {
        let inner = MemoryAdapter::new();
        let capabilities = inner.capabilities();
        Self {
            inner,
            capabilities,
            find_calls: Cell::new(0),
            fail_find_on: None,
            panic_find_on: None,
            refuse_aggregate: false,
            fail_init: false,
        }
    }

    /// The `call`-th `find` (1-based) returns an error.
    pub fn failing_find(mut self, call: usize) -> Self {
        self.fail_find_on = Some(call);
        self
    }

    /// The `call`-th `find` (1-based) panics.
    pub fn panicking_find(mut self, call: usize) -> Self {
        self.panic_find_on = Some(call);
        self
    }

    /// Advertise aggregation but refuse it when called.
    pub fn refusing_aggregate(mut self) -> Self {
        self.refuse_aggregate = true;
        self
    }

    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub fn without(mut self, capability: Capability) -> Self {
        match capability {
            Capability::Transactions => self.capabilities.transactions = false,
            Capability::Indexes => self.capabilities.indexes = false,
            Capability::Aggregation => self.capabilities.aggregation = false,
            Capability::NativeQuery => self.capabilities.native_query = false,
        }
        self
    }
}

impl StorageAdapter for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn init(&mut self) -> Result<(), AdapterError> {
        if self.fail_init {
            return Err(AdapterError::Storage("disk on fire".into()));
        }
        self.inner.init()
    }

    fn clear(&mut self) -> Result<(), AdapterError> {
        self.inner.clear()
    }

    fn insert(&mut self, doc: Document) -> Result<DocumentId, AdapterError> {
        self.inner.insert(doc)
    }

    fn bulk_insert(&mut self, docs: Vec<Document>) -> Result<Vec<DocumentId>, AdapterError> {
        self.inner.bulk_insert(docs)
    }

    fn find(&self, filter: &Filter, options: &FindOptions) -> Result<Vec<Document>, AdapterError> {
        let call = self.find_calls.get() + 1;
        self.find_calls.set(call);
        if self.panic_find_on == Some(call) {
            panic!("find call {call} blew up");
        }
        if self.fail_find_on == Some(call) {
            return Err(AdapterError::Other(format!("find call {call} failed")));
        }
        self.inner.find(filter, options)
    }

    fn find_by_id(&self, id: DocumentId) -> Result<Option<Document>, AdapterError> {
        self.inner.find_by_id(id)
    }

    fn update(
        &mut self,
        id: DocumentId,
        update: &UpdateSpec,
    ) -> Result<UpdateResult, AdapterError> {
        self.inner.update(id, update)
    }

    fn update_many(
        &mut self,
        filter: &Filter,
        update: &UpdateSpec,
    ) -> Result<UpdateResult, AdapterError> {
        self.inner.update_many(filter, update)
    }

    fn delete(&mut self, id: DocumentId) -> Result<u64, AdapterError> {
        self.inner.delete(id)
    }

    fn delete_many(&mut self, filter: &Filter) -> Result<u64, AdapterError> {
        self.inner.delete_many(filter)
    }

    fn aggregate(&self, pipeline: &Pipeline) -> Result<Vec<Document>, AdapterError> {
        if self.refuse_aggregate {
            return Err(AdapterError::Unsupported(Capability::Aggregation));
        }
        self.inner.aggregate(pipeline)
    }

    fn begin_transaction(&mut self) -> Result<Box<dyn AdapterTransaction + '_>, AdapterError> {
        self.capabilities.require(Capability::Transactions)?;
        self.inner.begin_transaction()
    }
}

// ── Test scenarios ──────────────────────────────────────────────

/// Seeds three documents, then one `find` per iteration.
pub struct FindAll;

impl Scenario for FindAll {
    fn name(&self) -> &str {
        "find_all"
    }

    fn ops_per_iteration(&self, _config: &BenchConfig) -> u64 {
        1
    }

    fn prepare(
        &mut self,
        adapter: &mut dyn StorageAdapter,
        _config: &BenchConfig,
    ) -> Result<(), AdapterError> {
        adapter.clear()?;
        adapter.bulk_insert(vec![doc! { "age": 20 }, doc! { "age": 30 }, doc! { "age": 40 }])?;
        Ok(())
    }

    fn run_iteration(
        &mut self,
        adapter: &mut dyn StorageAdapter,
        _config: &BenchConfig,
    ) -> Result<(), AdapterError> {
        let found = adapter.find(&Filter::all(), &FindOptions::default())?;
        assert_eq!(found.len(), 3);
        Ok(())
    }
}

/// Sleeps through every iteration.
pub struct Sleepy(pub Duration);

impl Scenario for Sleepy {
    fn name(&self) -> &str {
        "sleepy"
    }

    fn ops_per_iteration(&self, _config: &BenchConfig) -> u64 {
        1
    }

    fn prepare(
        &mut self,
        adapter: &mut dyn StorageAdapter,
        _config: &BenchConfig,
    ) -> Result<(), AdapterError> {
        adapter.clear()
    }

    fn run_iteration(
        &mut self,
        _adapter: &mut dyn StorageAdapter,
        _config: &BenchConfig,
    ) -> Result<(), AdapterError> {
        std::thread::sleep(self.0);
        Ok(())
    }
}
