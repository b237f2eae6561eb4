use std::path::PathBuf;
use std::process;

use docbench::{AdapterRegistry, BenchConfig, BenchmarkRunner};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("DOCBENCH_CONFIG").ok())
        .map(PathBuf::from);

    let config = match BenchConfig::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("docbench: {e}");
            process::exit(2);
        }
    };

    let registry = AdapterRegistry::with_defaults();
    for name in &config.adapters {
        if !registry.contains(name) {
            tracing::warn!(adapter = %name, known = ?registry.names(), "unknown adapter requested");
        }
    }

    let mut runner = match BenchmarkRunner::new(config, registry) {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("docbench: {e}");
            process::exit(2);
        }
    };

    println!("=== docbench ===");
    println!(
        "Scenarios: {}  |  iterations: {}  |  warm-up: {}  |  documents: {}",
        runner.scenario_names().join(", "),
        runner.config().iterations,
        runner.config().warmup,
        runner.config().data_size,
    );
    println!();

    let report = runner.run();
    report.print();

    if let Some(path) = &report.config.output {
        match report.write_json(path) {
            Ok(()) => tracing::info!(path = %path.display(), "report written"),
            Err(e) => {
                eprintln!("docbench: failed to write {}: {e}", path.display());
                process::exit(1);
            }
        }
    }
}
