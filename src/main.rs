//! threadfan CLI entry point

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use threadfan::config::cli::Cli;
use threadfan::config::{toml as config_toml, validator, MAX_THREADS};
use threadfan::coordinator::Coordinator;
use threadfan::output::{json, text};
use threadfan::worker::affinity;

fn main() -> Result<()> {
    // Parse CLI arguments; anything unparseable takes the usage path
    let cli = match Cli::try_parse_args() {
        Ok(cli) => cli,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
            _ => usage(),
        },
    };

    let config = config_toml::load_config(&cli)?;

    // A bad count takes the usage path before any other option is checked
    let count = match validator::resolve_count(&cli, &config) {
        Ok(count) => count,
        Err(e) => {
            if config.runtime.debug {
                eprintln!("DEBUG: rejected worker count: {}", e);
            }
            usage()
        }
    };

    validator::validate_config(&config).context("Configuration validation failed")?;
    validator::check_fail_rank(&config.workers, count);

    if config.runtime.debug {
        eprintln!(
            "DEBUG: {} workers requested, {} logical CPUs available",
            count,
            affinity::num_cpus()
        );
        affinity::warn_if_oversubscribed(count.get());
    }

    let coordinator = Coordinator::from_config(&config)?;
    let summary = coordinator.run_detailed(count);

    if !config.output.quiet_report {
        text::print_report(&summary);
    }

    if let Some(ref path) = config.output.json_output {
        let report = json::RunReport::from_summary(&summary);
        json::write_json_report(path, &report)?;
        println!("JSON report written to {}", path.display());
    }

    match summary.outcome.exit_code() {
        0 => Ok(()),
        code => std::process::exit(code),
    }
}

/// Print usage and exit with status 0 without launching any worker
fn usage() -> ! {
    let prog = std::env::args()
        .next()
        .unwrap_or_else(|| "threadfan".to_string());
    eprintln!("usage: {} <number of threads>", prog);
    eprintln!("0 < number of threads <= {}", MAX_THREADS);
    std::process::exit(0)
}
