use bson::{Bson, Document, doc};
use docbench_query::{Filter, FindOptions, Pipeline, Sort, UpdateSpec};
use docbench_store::{AdapterError, Capabilities, Capability, DocumentId, StorageAdapter};

use crate::config::BenchConfig;
use crate::datagen::DataGenerator;

/// Names of the built-in scenarios, in run order.
pub const BUILTIN_SCENARIOS: &[&str] = &[
    "insert",
    "bulk_insert",
    "query",
    "update",
    "delete",
    "aggregate",
    "transaction",
];

/// Capabilities a scenario needs from an adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requirements {
    capabilities: Vec<Capability>,
}

impl Requirements {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn needs(mut self, capability: Capability) -> Self {
        if !self.capabilities.contains(&capability) {
            self.capabilities.push(capability);
        }
        self
    }

    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Required capabilities that `caps` does not advertise.
    pub fn missing(&self, caps: &Capabilities) -> Vec<Capability> {
        self.capabilities
            .iter()
            .copied()
            .filter(|c| !caps.supports(*c))
            .collect()
    }
}

/// One operation class driven against an adapter.
///
/// The runner calls `prepare` once per adapter, then `before_iteration`
/// (untimed) and `run_iteration` (timed) for every warm-up and measured
/// iteration.
pub trait Scenario {
    fn name(&self) -> &str;

    fn requirements(&self) -> Requirements {
        Requirements::none()
    }

    /// Adapter operations one iteration performs. Read after `prepare`.
    fn ops_per_iteration(&self, config: &BenchConfig) -> u64;

    fn prepare(
        &mut self,
        adapter: &mut dyn StorageAdapter,
        config: &BenchConfig,
    ) -> Result<(), AdapterError>;

    fn before_iteration(
        &mut self,
        adapter: &mut dyn StorageAdapter,
        config: &BenchConfig,
    ) -> Result<(), AdapterError> {
        let _ = (adapter, config);
        Ok(())
    }

    fn run_iteration(
        &mut self,
        adapter: &mut dyn StorageAdapter,
        config: &BenchConfig,
    ) -> Result<(), AdapterError>;
}

pub fn builtin(name: &str) -> Option<Box<dyn Scenario>> {
    let scenario: Box<dyn Scenario> = match name {
        "insert" => Box::new(InsertScenario::new(false)),
        "bulk_insert" => Box::new(InsertScenario::new(true)),
        "query" => Box::new(QueryScenario::default()),
        "update" => Box::new(UpdateScenario::default()),
        "delete" => Box::new(DeleteScenario::default()),
        "aggregate" => Box::new(AggregateScenario::default()),
        "transaction" => Box::new(TransactionScenario::default()),
        _ => return None,
    };
    Some(scenario)
}

/// Clear the adapter and load the seeded dataset.
pub fn seed(
    adapter: &mut dyn StorageAdapter,
    config: &BenchConfig,
) -> Result<Vec<DocumentId>, AdapterError> {
    adapter.clear()?;
    adapter.bulk_insert(DataGenerator::new(config.seed).people(config.data_size))
}

/// Up to `n` ids spread evenly over `ids`.
fn spread(ids: &[DocumentId], n: usize) -> Vec<DocumentId> {
    if ids.is_empty() || n == 0 {
        return Vec::new();
    }
    let step = (ids.len() / n).max(1);
    ids.iter().step_by(step).take(n).copied().collect()
}

// ── Insert ──────────────────────────────────────────────────────

/// Insert `batch_size` fresh documents into an empty store, one at a time
/// or as a single bulk call.
pub struct InsertScenario {
    bulk: bool,
    batch: Vec<Document>,
    pending: Vec<Document>,
}

impl InsertScenario {
    pub fn new(bulk: bool) -> Self {
        Self {
            bulk,
            batch: Vec::new(),
            pending: Vec::new(),
        }
    }
}

impl Scenario for InsertScenario {
    fn name(&self) -> &str {
        if self.bulk { "bulk_insert" } else { "insert" }
    }

    fn ops_per_iteration(&self, config: &BenchConfig) -> u64 {
        if self.bulk { 1 } else { config.batch_size as u64 }
    }

    fn prepare(
        &mut self,
        adapter: &mut dyn StorageAdapter,
        config: &BenchConfig,
    ) -> Result<(), AdapterError> {
        adapter.clear()?;
        self.batch = DataGenerator::new(config.seed).people(config.batch_size);
        Ok(())
    }

    fn before_iteration(
        &mut self,
        adapter: &mut dyn StorageAdapter,
        _config: &BenchConfig,
    ) -> Result<(), AdapterError> {
        adapter.clear()?;
        self.pending = self.batch.clone();
        Ok(())
    }

    fn run_iteration(
        &mut self,
        adapter: &mut dyn StorageAdapter,
        _config: &BenchConfig,
    ) -> Result<(), AdapterError> {
        let docs = std::mem::take(&mut self.pending);
        if self.bulk {
            adapter.bulk_insert(docs)?;
        } else {
            for doc in docs {
                adapter.insert(doc)?;
            }
        }
        Ok(())
    }
}

// ── Query ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct QueryScenario {
    queries: Vec<(Filter, FindOptions)>,
    count_filter: Option<Filter>,
    lookups: Vec<DocumentId>,
}

impl Scenario for QueryScenario {
    fn name(&self) -> &str {
        "query"
    }

    fn ops_per_iteration(&self, _config: &BenchConfig) -> u64 {
        (self.queries.len() + self.lookups.len() + 1) as u64
    }

    fn prepare(
        &mut self,
        adapter: &mut dyn StorageAdapter,
        config: &BenchConfig,
    ) -> Result<(), AdapterError> {
        let ids = seed(adapter, config)?;
        if adapter.capabilities().supports(Capability::Indexes) {
            adapter.create_index("by_status", &["status".to_string()])?;
            adapter.create_index("by_age", &["age".to_string()])?;
        }

        self.queries = vec![
            (Filter::parse(&doc! { "status": "active" })?, FindOptions::default()),
            (
                Filter::parse(&doc! { "age": { "$gte": 30, "$lt": 40 } })?,
                FindOptions::default().sort(Sort::desc("score")).limit(10),
            ),
            (
                Filter::parse(&doc! {
                    "address.city": { "$in": ["Oslo", "Lisbon"] },
                    "notes": { "$exists": true },
                })?,
                FindOptions::default(),
            ),
            (
                Filter::parse(&doc! {
                    "department": { "$ne": "sales" },
                    "visits": { "$lte": 50 },
                })?,
                FindOptions::default().sort(Sort::asc("age")).skip(5).limit(20),
            ),
        ];
        self.count_filter = Some(Filter::parse(&doc! { "status": { "$nin": ["pending"] } })?);
        self.lookups = spread(&ids, 10);
        Ok(())
    }

    fn run_iteration(
        &mut self,
        adapter: &mut dyn StorageAdapter,
        _config: &BenchConfig,
    ) -> Result<(), AdapterError> {
        for (filter, options) in &self.queries {
            adapter.find(filter, options)?;
        }
        if let Some(filter) = &self.count_filter {
            adapter.count(filter)?;
        }
        for id in &self.lookups {
            adapter.find_by_id(*id)?;
        }
        Ok(())
    }
}

// ── Update ──────────────────────────────────────────────────────

#[derive(Default)]
pub struct UpdateScenario {
    bulk: Option<(Filter, UpdateSpec)>,
    single: Option<UpdateSpec>,
    targets: Vec<DocumentId>,
}

impl Scenario for UpdateScenario {
    fn name(&self) -> &str {
        "update"
    }

    fn ops_per_iteration(&self, _config: &BenchConfig) -> u64 {
        1 + self.targets.len() as u64
    }

    fn prepare(
        &mut self,
        adapter: &mut dyn StorageAdapter,
        config: &BenchConfig,
    ) -> Result<(), AdapterError> {
        let ids = seed(adapter, config)?;
        self.bulk = Some((
            Filter::parse(&doc! { "status": "pending" })?,
            UpdateSpec::parse(&doc! {
                "$inc": { "visits": 1 },
                "$set": { "touched": true },
            })?,
        ));
        self.single = Some(UpdateSpec::parse(&doc! {
            "$inc": { "score": 0.5 },
            "$addToSet": { "tags": "seen" },
        })?);
        self.targets = spread(&ids, config.batch_size);
        Ok(())
    }

    fn run_iteration(
        &mut self,
        adapter: &mut dyn StorageAdapter,
        _config: &BenchConfig,
    ) -> Result<(), AdapterError> {
        if let Some((filter, update)) = &self.bulk {
            adapter.update_many(filter, update)?;
        }
        if let Some(update) = &self.single {
            for id in &self.targets {
                adapter.update(*id, update)?;
            }
        }
        Ok(())
    }
}

// ── Delete ──────────────────────────────────────────────────────

/// Reseeds before every iteration so each one deletes from the same dataset.
#[derive(Default)]
pub struct DeleteScenario {
    filter: Option<Filter>,
    targets: Vec<DocumentId>,
}

impl Scenario for DeleteScenario {
    fn name(&self) -> &str {
        "delete"
    }

    fn ops_per_iteration(&self, config: &BenchConfig) -> u64 {
        1 + config.batch_size.min(config.data_size) as u64
    }

    fn prepare(
        &mut self,
        adapter: &mut dyn StorageAdapter,
        _config: &BenchConfig,
    ) -> Result<(), AdapterError> {
        adapter.clear()?;
        self.filter = Some(Filter::parse(&doc! { "status": "inactive" })?);
        Ok(())
    }

    fn before_iteration(
        &mut self,
        adapter: &mut dyn StorageAdapter,
        config: &BenchConfig,
    ) -> Result<(), AdapterError> {
        let ids = seed(adapter, config)?;
        self.targets = spread(&ids, config.batch_size);
        Ok(())
    }

    fn run_iteration(
        &mut self,
        adapter: &mut dyn StorageAdapter,
        _config: &BenchConfig,
    ) -> Result<(), AdapterError> {
        if let Some(filter) = &self.filter {
            adapter.delete_many(filter)?;
        }
        for id in &self.targets {
            adapter.delete(*id)?;
        }
        Ok(())
    }
}

// ── Aggregate ───────────────────────────────────────────────────

#[derive(Default)]
pub struct AggregateScenario {
    pipelines: Vec<Pipeline>,
}

impl Scenario for AggregateScenario {
    fn name(&self) -> &str {
        "aggregate"
    }

    fn requirements(&self) -> Requirements {
        Requirements::none().needs(Capability::Aggregation)
    }

    fn ops_per_iteration(&self, _config: &BenchConfig) -> u64 {
        self.pipelines.len() as u64
    }

    fn prepare(
        &mut self,
        adapter: &mut dyn StorageAdapter,
        config: &BenchConfig,
    ) -> Result<(), AdapterError> {
        seed(adapter, config)?;
        self.pipelines = vec![
            Pipeline::parse(&[
                doc! { "$match": { "age": { "$gte": 30 } } },
                doc! { "$group": {
                    "_id": "$department",
                    "count": { "$sum": 1 },
                    "avg_score": { "$avg": "$score" },
                    "max_visits": { "$max": "$visits" },
                } },
                doc! { "$sort": { "count": -1, "_id": 1 } },
                doc! { "$limit": 5 },
            ])?,
            Pipeline::parse(&[
                doc! { "$group": {
                    "_id": { "status": "$status", "city": "$address.city" },
                    "people": { "$sum": 1 },
                    "oldest": { "$max": "$age" },
                } },
                doc! { "$sort": { "people": -1 } },
                doc! { "$skip": 1 },
                doc! { "$limit": 10 },
            ])?,
            Pipeline::parse(&[
                doc! { "$match": { "status": "active" } },
                doc! { "$project": { "name": 1, "age": 1, "city": "$address.city" } },
                doc! { "$sort": { "age": 1 } },
                doc! { "$limit": 25 },
            ])?,
        ];
        Ok(())
    }

    fn run_iteration(
        &mut self,
        adapter: &mut dyn StorageAdapter,
        _config: &BenchConfig,
    ) -> Result<(), AdapterError> {
        for pipeline in &self.pipelines {
            adapter.aggregate(pipeline)?;
        }
        Ok(())
    }
}

// ── Transaction ─────────────────────────────────────────────────

/// One committed unit of work (inserts, an update, a delete) and one
/// rolled-back insert per iteration.
#[derive(Default)]
pub struct TransactionScenario {
    ids: Vec<DocumentId>,
    cursor: usize,
    batch: Vec<Document>,
    pending: Vec<Document>,
    bump: Option<UpdateSpec>,
}

const TXN_INSERTS: usize = 10;

impl Scenario for TransactionScenario {
    fn name(&self) -> &str {
        "transaction"
    }

    fn requirements(&self) -> Requirements {
        Requirements::none().needs(Capability::Transactions)
    }

    fn ops_per_iteration(&self, _config: &BenchConfig) -> u64 {
        2
    }

    fn prepare(
        &mut self,
        adapter: &mut dyn StorageAdapter,
        config: &BenchConfig,
    ) -> Result<(), AdapterError> {
        self.ids = seed(adapter, config)?;
        self.cursor = 0;
        self.batch = DataGenerator::new(config.seed.wrapping_add(1)).people(TXN_INSERTS);
        self.bump = Some(UpdateSpec::parse(&doc! { "$inc": { "visits": 1 } })?);
        Ok(())
    }

    fn before_iteration(
        &mut self,
        _adapter: &mut dyn StorageAdapter,
        _config: &BenchConfig,
    ) -> Result<(), AdapterError> {
        self.pending = self.batch.clone();
        Ok(())
    }

    fn run_iteration(
        &mut self,
        adapter: &mut dyn StorageAdapter,
        _config: &BenchConfig,
    ) -> Result<(), AdapterError> {
        let target = (!self.ids.is_empty()).then(|| self.ids[self.cursor % self.ids.len()]);
        self.cursor += 1;

        let mut txn = adapter.begin_transaction()?;
        let mut inserted = Vec::with_capacity(self.pending.len());
        for doc in std::mem::take(&mut self.pending) {
            inserted.push(txn.insert(doc)?);
        }
        if let (Some(id), Some(bump)) = (target, &self.bump) {
            txn.update(id, bump)?;
        }
        if let Some(first) = inserted.first() {
            txn.delete(*first)?;
        }
        txn.commit()?;

        let mut txn = adapter.begin_transaction()?;
        txn.insert(doc! { "name": "discarded", "status": Bson::Null })?;
        txn.rollback()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use docbench_store::{KvAdapter, MemoryAdapter};

    use super::*;

    fn small() -> BenchConfig {
        BenchConfig {
            data_size: 40,
            batch_size: 5,
            ..BenchConfig::default()
        }
    }

    fn drive(scenario: &mut dyn Scenario, adapter: &mut dyn StorageAdapter, config: &BenchConfig) {
        scenario.prepare(adapter, config).unwrap();
        for _ in 0..2 {
            scenario.before_iteration(adapter, config).unwrap();
            scenario.run_iteration(adapter, config).unwrap();
        }
    }

    #[test]
    fn every_builtin_resolves_by_name() {
        for name in BUILTIN_SCENARIOS {
            let scenario = builtin(name).unwrap();
            assert_eq!(scenario.name(), *name);
        }
        assert!(builtin("nope").is_none());
    }

    #[test]
    fn requirements_report_missing_capabilities() {
        let req = Requirements::none()
            .needs(Capability::Aggregation)
            .needs(Capability::Aggregation)
            .needs(Capability::Transactions);
        assert_eq!(req.capabilities().len(), 2);
        assert_eq!(
            req.missing(&KvAdapter::new().capabilities()),
            vec![Capability::Aggregation, Capability::Transactions]
        );
        assert!(req.missing(&MemoryAdapter::new().capabilities()).is_empty());
    }

    #[test]
    fn insert_leaves_one_batch() {
        let config = small();
        let mut adapter = MemoryAdapter::new();
        adapter.init().unwrap();
        for bulk in [false, true] {
            let mut scenario = InsertScenario::new(bulk);
            drive(&mut scenario, &mut adapter, &config);
            assert_eq!(adapter.count(&Filter::all()).unwrap(), 5);
        }
    }

    #[test]
    fn delete_removes_inactive_and_targets() {
        let config = small();
        let mut adapter = MemoryAdapter::new();
        adapter.init().unwrap();
        let mut scenario = DeleteScenario::default();
        drive(&mut scenario, &mut adapter, &config);

        let inactive = Filter::parse(&doc! { "status": "inactive" }).unwrap();
        assert_eq!(adapter.count(&inactive).unwrap(), 0);
        assert!(adapter.count(&Filter::all()).unwrap() <= 35);
    }

    #[test]
    fn update_touches_pending() {
        let config = small();
        let mut adapter = MemoryAdapter::new();
        adapter.init().unwrap();
        let mut scenario = UpdateScenario::default();
        drive(&mut scenario, &mut adapter, &config);

        let pending = Filter::parse(&doc! { "status": "pending" }).unwrap();
        let touched = Filter::parse(&doc! { "touched": true }).unwrap();
        assert_eq!(adapter.count(&pending).unwrap(), adapter.count(&touched).unwrap());
        assert_eq!(scenario.ops_per_iteration(&config), 6);
    }

    #[test]
    fn transaction_commits_and_rolls_back() {
        let config = small();
        let mut adapter = MemoryAdapter::new();
        adapter.init().unwrap();
        let mut scenario = TransactionScenario::default();
        drive(&mut scenario, &mut adapter, &config);

        // Each iteration commits nine net inserts; the rolled-back one is gone.
        assert_eq!(adapter.count(&Filter::all()).unwrap(), 40 + 2 * 9);
        let discarded = Filter::parse(&doc! { "name": "discarded" }).unwrap();
        assert_eq!(adapter.count(&discarded).unwrap(), 0);
    }

    #[test]
    fn query_and_aggregate_run_on_memory() {
        let config = small();
        let mut adapter = MemoryAdapter::new();
        adapter.init().unwrap();
        drive(&mut QueryScenario::default(), &mut adapter, &config);
        drive(&mut AggregateScenario::default(), &mut adapter, &config);
        assert_eq!(adapter.indexes().len(), 2);
    }
}
