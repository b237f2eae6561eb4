use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;

use docbench_store::{AdapterError, StorageAdapter};
use tracing::{debug, error, info, warn};

use crate::config::BenchConfig;
use crate::error::BenchError;
use crate::registry::AdapterRegistry;
use crate::report::{AdapterFailure, BenchReport, ScenarioResult, SkippedRun};
use crate::scenario::{BUILTIN_SCENARIOS, Scenario, builtin};

/// Lifecycle of one (scenario, adapter) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Preparing,
    WarmingUp,
    Measuring,
    Reporting,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Preparing => "preparing",
            Phase::WarmingUp => "warming_up",
            Phase::Measuring => "measuring",
            Phase::Reporting => "reporting",
        };
        f.write_str(name)
    }
}

/// Why a single iteration produced no sample.
#[derive(Debug, Clone, PartialEq)]
pub enum IterationFailure {
    Error(String),
    Panicked(String),
    DeadlineExceeded { elapsed_ms: f64, limit_ms: u64 },
}

impl fmt::Display for IterationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IterationFailure::Error(msg) => write!(f, "{msg}"),
            IterationFailure::Panicked(msg) => write!(f, "panicked: {msg}"),
            IterationFailure::DeadlineExceeded { elapsed_ms, limit_ms } => {
                write!(f, "took {elapsed_ms:.2}ms, over the {limit_ms}ms deadline")
            }
        }
    }
}

impl std::error::Error for IterationFailure {}

enum Attempt {
    /// Recorded and skipped; the adapter keeps running.
    Failed(IterationFailure),
    /// The adapter refused a capability-gated call; drop it from the run.
    Fatal(AdapterError),
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Run `f`, turning errors and panics into an [`Attempt`].
fn guarded<F>(f: F) -> Result<(), Attempt>
where
    F: FnOnce() -> Result<(), AdapterError>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) if e.is_unsupported() => Err(Attempt::Fatal(e)),
        Ok(Err(e)) => Err(Attempt::Failed(IterationFailure::Error(e.to_string()))),
        Err(payload) => Err(Attempt::Failed(IterationFailure::Panicked(panic_message(payload)))),
    }
}

/// One untimed `before_iteration` plus one timed `run_iteration`.
/// Returns the elapsed milliseconds.
fn iteration(
    config: &BenchConfig,
    scenario: &mut dyn Scenario,
    adapter: &mut dyn StorageAdapter,
) -> Result<f64, Attempt> {
    guarded(|| scenario.before_iteration(adapter, config))?;

    let start = Instant::now();
    let outcome = guarded(|| scenario.run_iteration(adapter, config));
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
    outcome?;

    // Soft deadline: checked after the fact, the iteration is never interrupted.
    if let Some(limit_ms) = config.iteration_timeout_ms {
        if elapsed_ms > limit_ms as f64 {
            return Err(Attempt::Failed(IterationFailure::DeadlineExceeded {
                elapsed_ms,
                limit_ms,
            }));
        }
    }
    Ok(elapsed_ms)
}

/// Drive one scenario against one adapter through every phase. An `Err`
/// is the reason the adapter must leave the run.
fn run_pair(
    config: &BenchConfig,
    scenario: &mut dyn Scenario,
    adapter: &mut dyn StorageAdapter,
    adapter_name: &str,
) -> Result<ScenarioResult, String> {
    let scenario_name = scenario.name().to_string();

    info!(scenario = %scenario_name, adapter = %adapter_name, phase = %Phase::Preparing, "phase");
    match guarded(|| scenario.prepare(adapter, config)) {
        Ok(()) => {}
        Err(Attempt::Fatal(e)) => return Err(e.to_string()),
        Err(Attempt::Failed(f)) => return Err(format!("prepare failed: {f}")),
    }

    let mut errors = Vec::new();

    info!(
        scenario = %scenario_name,
        adapter = %adapter_name,
        phase = %Phase::WarmingUp,
        iterations = config.warmup,
        "phase"
    );
    for n in 0..config.warmup {
        match iteration(config, scenario, adapter) {
            Ok(ms) => debug!(
                scenario = %scenario_name,
                adapter = %adapter_name,
                iteration = n,
                elapsed_ms = ms,
                "warm-up iteration"
            ),
            Err(Attempt::Fatal(e)) => return Err(e.to_string()),
            Err(Attempt::Failed(f)) => {
                warn!(
                    scenario = %scenario_name,
                    adapter = %adapter_name,
                    iteration = n,
                    error = %f,
                    "warm-up iteration failed"
                );
                errors.push(format!("warm-up {n}: {f}"));
            }
        }
    }

    info!(
        scenario = %scenario_name,
        adapter = %adapter_name,
        phase = %Phase::Measuring,
        iterations = config.iterations,
        "phase"
    );
    let mut samples = Vec::with_capacity(config.iterations);
    for n in 0..config.iterations {
        match iteration(config, scenario, adapter) {
            Ok(ms) => {
                debug!(
                    scenario = %scenario_name,
                    adapter = %adapter_name,
                    iteration = n,
                    elapsed_ms = ms,
                    "iteration"
                );
                samples.push(ms);
            }
            Err(Attempt::Fatal(e)) => return Err(e.to_string()),
            Err(Attempt::Failed(f)) => {
                warn!(
                    scenario = %scenario_name,
                    adapter = %adapter_name,
                    iteration = n,
                    error = %f,
                    "iteration failed"
                );
                errors.push(format!("iteration {n}: {f}"));
            }
        }
    }

    let result = ScenarioResult::new(
        samples,
        config.iterations,
        errors,
        scenario.ops_per_iteration(config),
    );
    info!(
        scenario = %scenario_name,
        adapter = %adapter_name,
        phase = %Phase::Reporting,
        completed = result.completed_iterations,
        total = result.total_iterations,
        mean_ms = result.stats.mean,
        ops_per_sec = result.derived_throughput,
        "phase"
    );
    Ok(result)
}

/// Runs every selected scenario against every selected adapter, one pair
/// at a time.
pub struct BenchmarkRunner {
    config: BenchConfig,
    registry: AdapterRegistry,
    scenarios: Vec<Box<dyn Scenario>>,
}

impl BenchmarkRunner {
    /// Built-in scenarios named by `config.scenarios`, or all of them when
    /// the list is empty.
    pub fn new(config: BenchConfig, registry: AdapterRegistry) -> Result<Self, BenchError> {
        let names: Vec<String> = if config.scenarios.is_empty() {
            BUILTIN_SCENARIOS.iter().map(|s| s.to_string()).collect()
        } else {
            config.scenarios.clone()
        };
        let mut scenarios = Vec::with_capacity(names.len());
        for name in &names {
            let scenario = builtin(name)
                .ok_or_else(|| BenchError::Config(format!("unknown scenario: {name}")))?;
            scenarios.push(scenario);
        }
        Ok(Self {
            config,
            registry,
            scenarios,
        })
    }

    /// No scenarios until added with [`BenchmarkRunner::with_scenario`].
    pub fn without_scenarios(config: BenchConfig, registry: AdapterRegistry) -> Self {
        Self {
            config,
            registry,
            scenarios: Vec::new(),
        }
    }

    pub fn with_scenario(mut self, scenario: Box<dyn Scenario>) -> Self {
        self.scenarios.push(scenario);
        self
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    pub fn scenario_names(&self) -> Vec<&str> {
        self.scenarios.iter().map(|s| s.name()).collect()
    }

    /// Always completes; broken adapters and iterations are recorded in the
    /// report instead of aborting.
    pub fn run(&mut self) -> BenchReport {
        let started = Instant::now();
        let mut report = BenchReport::new(self.config.clone());
        let mut adapters = self.open_adapters(&mut report);

        info!(
            adapters = adapters.len(),
            scenarios = self.scenarios.len(),
            iterations = self.config.iterations,
            warmup = self.config.warmup,
            "benchmark starting"
        );

        for scenario in self.scenarios.iter_mut() {
            let scenario_name = scenario.name().to_string();
            let requirements = scenario.requirements();
            let mut results = BTreeMap::new();
            let mut failed = Vec::new();

            for (name, adapter) in adapters.iter_mut() {
                let missing = requirements.missing(&adapter.capabilities());
                if !missing.is_empty() {
                    warn!(
                        scenario = %scenario_name,
                        adapter = %name,
                        ?missing,
                        "adapter lacks required capabilities, skipping"
                    );
                    report.skipped.push(SkippedRun {
                        scenario: scenario_name.clone(),
                        adapter: name.clone(),
                        missing,
                    });
                    continue;
                }

                match run_pair(&self.config, scenario.as_mut(), adapter.as_mut(), name) {
                    Ok(result) => {
                        results.insert(name.clone(), result);
                    }
                    Err(reason) => {
                        error!(
                            scenario = %scenario_name,
                            adapter = %name,
                            %reason,
                            "adapter failed, removing it from the run"
                        );
                        report.failures.push(AdapterFailure {
                            adapter: name.clone(),
                            scenario: Some(scenario_name.clone()),
                            reason,
                        });
                        failed.push(name.clone());
                    }
                }
            }

            adapters.retain(|(name, _)| !failed.contains(name));
            report.results.insert(scenario_name, results);
        }

        report.elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        info!(
            elapsed_ms = report.elapsed_ms,
            failures = report.failures.len(),
            "benchmark finished"
        );
        report
    }

    /// Build and initialize every selected adapter, recording the ones that
    /// cannot start.
    fn open_adapters(&self, report: &mut BenchReport) -> Vec<(String, Box<dyn StorageAdapter>)> {
        let names: Vec<String> = if self.config.adapters.is_empty() {
            self.registry.names().into_iter().map(String::from).collect()
        } else {
            self.config.adapters.clone()
        };

        let mut adapters = Vec::with_capacity(names.len());
        for name in names {
            let created = self.registry.create(&name).unwrap_or_else(|| {
                Err(AdapterError::Other(format!("no adapter registered as {name:?}")))
            });
            let opened = created.and_then(|mut adapter| {
                adapter.init()?;
                Ok(adapter)
            });
            match opened {
                Ok(adapter) => {
                    info!(adapter = %name, capabilities = ?adapter.capabilities(), "adapter ready");
                    adapters.push((name, adapter));
                }
                Err(e) => {
                    error!(adapter = %name, error = %e, "adapter failed to initialize");
                    report.failures.push(AdapterFailure {
                        adapter: name,
                        scenario: None,
                        reason: format!("init failed: {e}"),
                    });
                }
            }
        }
        adapters
    }
}
