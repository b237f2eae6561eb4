use docbench_store::{AdapterError, KvAdapter, MemoryAdapter, RedbAdapter, StorageAdapter};

pub type AdapterFactory = Box<dyn Fn() -> Result<Box<dyn StorageAdapter>, AdapterError>>;

/// Named adapter constructors. The runner builds a fresh instance of each
/// selected adapter per run.
#[derive(Default)]
pub struct AdapterRegistry {
    factories: Vec<(String, AdapterFactory)>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `memory`, `kv` and a temporary-directory `redb`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("memory", || Ok(Box::new(MemoryAdapter::new())));
        registry.register("kv", || Ok(Box::new(KvAdapter::new())));
        registry.register("redb", || Ok(Box::new(RedbAdapter::temporary())));
        registry
    }

    /// Register `factory` under `name`, replacing an earlier registration.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Result<Box<dyn StorageAdapter>, AdapterError> + 'static,
    {
        let name = name.into();
        self.factories.retain(|(existing, _)| *existing != name);
        self.factories.push((name, Box::new(factory)));
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.iter().any(|(n, _)| n == name)
    }

    /// `None` when nothing is registered under `name`.
    pub fn create(&self, name: &str) -> Option<Result<Box<dyn StorageAdapter>, AdapterError>> {
        self.factories
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, factory)| factory())
    }
}
