use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::BenchError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Measured iterations per (scenario, adapter).
    pub iterations: usize,
    /// Discarded iterations run before measuring.
    pub warmup: usize,
    /// Documents seeded before read and write scenarios.
    #[serde(alias = "dataSize")]
    pub data_size: usize,
    /// Documents written per insert iteration.
    #[serde(alias = "batchSize")]
    pub batch_size: usize,
    pub seed: u64,
    /// Adapter names to run. Empty runs every registered adapter.
    pub adapters: Vec<String>,
    /// Scenario names to run. Empty runs every built-in scenario.
    pub scenarios: Vec<String>,
    /// Soft per-iteration deadline; overruns are recorded as failures.
    #[serde(alias = "iterationTimeoutMs")]
    pub iteration_timeout_ms: Option<u64>,
    /// Where to write the JSON report.
    pub output: Option<PathBuf>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            warmup: 2,
            data_size: 1000,
            batch_size: 100,
            seed: 42,
            adapters: Vec::new(),
            scenarios: Vec::new(),
            iteration_timeout_ms: None,
            output: None,
        }
    }
}

impl BenchConfig {
    pub fn from_json(json: &str) -> Result<Self, BenchError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, BenchError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Defaults, then the file at `path` if any, then `DOCBENCH_*`
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, BenchError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides looked up by environment variable name.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), BenchError> {
        if let Some(v) = lookup("DOCBENCH_ITERATIONS") {
            self.iterations = parse_number("DOCBENCH_ITERATIONS", &v)?;
        }
        if let Some(v) = lookup("DOCBENCH_WARMUP") {
            self.warmup = parse_number("DOCBENCH_WARMUP", &v)?;
        }
        if let Some(v) = lookup("DOCBENCH_DATA_SIZE") {
            self.data_size = parse_number("DOCBENCH_DATA_SIZE", &v)?;
        }
        if let Some(v) = lookup("DOCBENCH_ADAPTERS") {
            self.adapters = split_list(&v);
        }
        if let Some(v) = lookup("DOCBENCH_SCENARIOS") {
            self.scenarios = split_list(&v);
        }
        if let Some(v) = lookup("DOCBENCH_OUTPUT") {
            self.output = Some(PathBuf::from(v));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), BenchError> {
        if self.iterations == 0 {
            return Err(BenchError::Config("iterations must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(BenchError::Config("batch_size must be at least 1".into()));
        }
        Ok(())
    }
}

fn parse_number(key: &str, value: &str) -> Result<usize, BenchError> {
    value
        .trim()
        .parse()
        .map_err(|_| BenchError::Config(format!("{key}: expected a number, got {value:?}")))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
