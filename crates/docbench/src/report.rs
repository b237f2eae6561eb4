use std::collections::BTreeMap;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use docbench_store::Capability;
use serde::{Deserialize, Serialize};

use crate::config::BenchConfig;
use crate::error::BenchError;
use crate::stats::Statistics;

/// Outcome of one (scenario, adapter) pair. Samples are milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub samples: Vec<f64>,
    pub stats: Statistics,
    /// Adapter operations per second at the mean iteration time.
    pub derived_throughput: f64,
    pub completed_iterations: usize,
    pub total_iterations: usize,
    pub errors: Vec<String>,
    pub partial: bool,
}

impl ScenarioResult {
    pub fn new(
        samples: Vec<f64>,
        total_iterations: usize,
        errors: Vec<String>,
        ops_per_iteration: u64,
    ) -> Self {
        let stats = Statistics::from_samples(&samples);
        let derived_throughput = if stats.mean > 0.0 {
            ops_per_iteration as f64 * 1000.0 / stats.mean
        } else {
            0.0
        };
        let completed_iterations = samples.len();
        Self {
            samples,
            stats,
            derived_throughput,
            completed_iterations,
            total_iterations,
            errors,
            partial: completed_iterations < total_iterations,
        }
    }
}

/// An adapter dropped from the run. `scenario` is `None` when it never
/// got past construction or `init`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterFailure {
    pub adapter: String,
    pub scenario: Option<String>,
    pub reason: String,
}

/// A pair not run because the adapter lacks capabilities the scenario needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRun {
    pub scenario: String,
    pub adapter: String,
    pub missing: Vec<Capability>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchReport {
    pub config: BenchConfig,
    /// Unix epoch milliseconds.
    pub started_at: u64,
    pub elapsed_ms: f64,
    /// scenario name → adapter name → result
    pub results: BTreeMap<String, BTreeMap<String, ScenarioResult>>,
    pub failures: Vec<AdapterFailure>,
    pub skipped: Vec<SkippedRun>,
}

impl BenchReport {
    pub fn new(config: BenchConfig) -> Self {
        let started_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self {
            config,
            started_at,
            elapsed_ms: 0.0,
            results: BTreeMap::new(),
            failures: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn result(&self, scenario: &str, adapter: &str) -> Option<&ScenarioResult> {
        self.results.get(scenario)?.get(adapter)
    }

    pub fn failure(&self, adapter: &str) -> Option<&AdapterFailure> {
        self.failures.iter().find(|f| f.adapter == adapter)
    }

    pub fn is_skipped(&self, scenario: &str, adapter: &str) -> bool {
        self.skipped
            .iter()
            .any(|s| s.scenario == scenario && s.adapter == adapter)
    }

    pub fn print(&self) {
        println!(
            "=== Results ({} iterations, {} warm-up, {} documents) ===",
            self.config.iterations, self.config.warmup, self.config.data_size
        );
        for (scenario, by_adapter) in &self.results {
            println!();
            println!("[{scenario}]");
            println!(
                "  {:<20} {:>10} {:>10} {:>10} {:>10} {:>10} {:>14}  {}",
                "adapter", "mean", "median", "std dev", "p95", "p99", "ops/s", "done"
            );
            for (adapter, r) in by_adapter {
                let s = &r.stats;
                println!(
                    "  {:<20} {:>8.3}ms {:>8.3}ms {:>8.3}ms {:>8.3}ms {:>8.3}ms {:>14.0}  {}/{}{}",
                    adapter,
                    s.mean,
                    s.median,
                    s.std_dev,
                    s.p95,
                    s.p99,
                    r.derived_throughput,
                    r.completed_iterations,
                    r.total_iterations,
                    if r.partial { " (partial)" } else { "" }
                );
            }
        }

        if !self.skipped.is_empty() {
            println!();
            println!("[skipped]");
            for s in &self.skipped {
                let missing: Vec<String> = s.missing.iter().map(ToString::to_string).collect();
                println!("  {:<20} {:<14} missing {}", s.adapter, s.scenario, missing.join(", "));
            }
        }

        if !self.failures.is_empty() {
            println!();
            println!("[failures]");
            for f in &self.failures {
                println!(
                    "  {:<20} {:<14} {}",
                    f.adapter,
                    f.scenario.as_deref().unwrap_or("-"),
                    f.reason
                );
            }
        }

        println!();
        println!("Total: {:.2}s", self.elapsed_ms / 1000.0);
    }

    pub fn to_json(&self) -> Result<String, BenchError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: &Path) -> Result<(), BenchError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
