//! JSON output format
//!
//! One document per run: run metadata followed by one entry per phase.

use crate::config::Config;
use crate::stats::BenchmarkReport;
use crate::Result;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Run metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRunInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub version: String,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub seed: u64,
    pub threads: usize,
    pub structure: String,
    pub mode: String,
    pub counters: String,
    pub batch_count: usize,
}

/// Complete JSON report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRunReport {
    pub run_info: JsonRunInfo,
    pub phases: Vec<BenchmarkReport>,
}

impl JsonRunReport {
    /// Start a report for a run beginning now
    pub fn new(config: &Config, seed: u64, counters: &str) -> Self {
        let mode = match config.workload.run_mode() {
            Ok(mode) => mode.to_string(),
            Err(_) => "invalid".to_string(),
        };
        Self {
            run_info: JsonRunInfo {
                hostname: local_hostname(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                start_time: Utc::now(),
                end_time: None,
                seed,
                threads: config.workers.threads,
                structure: config.runtime.structure.to_string(),
                mode,
                counters: counters.to_string(),
                batch_count: config.workload.batch_count,
            },
            phases: Vec::new(),
        }
    }

    pub fn push_phase(&mut self, report: BenchmarkReport) {
        self.phases.push(report);
    }

    pub fn finish(&mut self) {
        self.run_info.end_time = Some(Utc::now());
    }
}

fn local_hostname() -> Option<String> {
    hostname::get()
        .ok()
        .map(|h| h.to_string_lossy().into_owned())
}

/// Write JSON output to file
pub fn write_json_output(output_path: &Path, report: &JsonRunReport, pretty: bool) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create JSON output: {}", output_path.display()))?;
    let writer = BufWriter::new(file);

    if pretty {
        serde_json::to_writer_pretty(writer, report)?;
    } else {
        serde_json::to_writer(writer, report)?;
    }

    tracing::info!(path = %output_path.display(), phases = report.phases.len(), "wrote JSON report");
    Ok(())
}
