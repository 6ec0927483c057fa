//! skewbench CLI entry point

use anyhow::Result;
use clap::Parser;
use skewbench::config::cli::Cli;
use skewbench::config::toml::load_config;
use skewbench::config::{Config, ExecutionMode};
use skewbench::counters::select_source;
use skewbench::harness::Runner;
use skewbench::oplog::writer::generate_log;
use skewbench::output::json::{write_json_output, JsonRunReport};
use skewbench::output::text;
use skewbench::sut::build_structure;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            use clap::error::ErrorKind;
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    let config = load_config(&cli);
    let debug = match config {
        Ok(ref config) => config.runtime.debug,
        Err(_) => cli.debug,
    };
    init_tracing(debug);

    let result = config.and_then(|config| match config.runtime.mode {
        ExecutionMode::Run => run(&config),
        ExecutionMode::Generate => generate(&config),
    });

    if let Err(e) = result {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing(debug: bool) {
    let default = if debug { "skewbench=debug" } else { "skewbench=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_seed(config: &Config) -> u64 {
    match config.runtime.seed {
        Some(seed) => seed,
        None => {
            let seed: u64 = rand::random();
            tracing::info!(seed, "no seed given, drew one from entropy");
            seed
        }
    }
}

/// Run every phase of the configured mode and report it
fn run(config: &Config) -> Result<()> {
    let seed = resolve_seed(config);
    let counters = select_source(config.runtime.counters)?;
    let sut = build_structure(config.runtime.structure);

    text::print_header(config, seed, counters.name());

    let mut json = JsonRunReport::new(config, seed, counters.name());
    let show_latency = config.output.show_latency;
    let reports = Runner::new(config, seed, sut.as_ref(), counters.as_ref())?
        .run(|report| text::print_report(report, show_latency))?;

    for report in reports {
        json.push_phase(report);
    }
    json.finish();

    if let Some(ref path) = config.output.json_output {
        write_json_output(path, &json, true)?;
    }
    Ok(())
}

/// Write an operation log instead of running
fn generate(config: &Config) -> Result<()> {
    let seed = resolve_seed(config);
    let count = config.workload.count.unwrap_or(0);
    let written = generate_log(&config.generate, count, seed)?;
    println!("Generated {} entries ({})", written, config.generate.key_format);
    Ok(())
}
