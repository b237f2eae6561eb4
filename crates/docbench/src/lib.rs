mod config;
mod datagen;
mod error;
mod registry;
mod report;
mod runner;
pub mod scenario;
mod stats;

pub use config::BenchConfig;
pub use datagen::DataGenerator;
pub use error::BenchError;
pub use registry::{AdapterFactory, AdapterRegistry};
pub use report::{AdapterFailure, BenchReport, ScenarioResult, SkippedRun};
pub use runner::{BenchmarkRunner, IterationFailure, Phase};
pub use scenario::{BUILTIN_SCENARIOS, Requirements, Scenario};
pub use stats::{Statistics, percentile};
