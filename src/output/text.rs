//! Human-readable text output

use crate::config::Config;
use crate::stats::BenchmarkReport;
use std::fmt::Write as _;

const RULE: &str = "═══════════════════════════════════════════════════════════";

/// Print the run header before the first phase
pub fn print_header(config: &Config, seed: u64, counters: &str) {
    println!("skewbench v{}", env!("CARGO_PKG_VERSION"));
    println!();
    print!("{}", config);
    println!("  Seed: {}", seed);
    println!("  Counter backend: {}", counters);
    println!();
}

/// Print one phase report to the console
pub fn print_report(report: &BenchmarkReport, show_latency: bool) {
    print!("{}", render_report(report, show_latency));
}

/// The console rendering of a phase report
pub fn render_report(report: &BenchmarkReport, show_latency: bool) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = write_report(&mut out, report, show_latency);
    out
}

fn write_report(out: &mut String, report: &BenchmarkReport, show_latency: bool) -> std::fmt::Result {
    writeln!(out, "{}", RULE)?;
    writeln!(
        out,
        "  PHASE: {} ({}, {} threads)",
        report.phase.to_uppercase(),
        report.structure,
        report.threads
    )?;
    writeln!(out, "{}", RULE)?;
    writeln!(out)?;

    writeln!(out, "Operations:   {}", format_number(report.total_ops))?;
    if report.skipped > 0 {
        writeln!(out, "  Skipped:    {} (empty records)", format_number(report.skipped))?;
    }
    writeln!(
        out,
        "Throughput:   {:.3} ops/ms (sum of per-thread rates)",
        report.throughput_ops_per_ms
    )?;
    writeln!(out, "Slowest thread: {:.3} ms", report.slowest_thread_ms)?;
    if let Some(ratio) = report.hit_ratio() {
        writeln!(
            out,
            "Lookups:      {} ({:.2}% hit)",
            format_number(report.lookups),
            ratio * 100.0
        )?;
    }
    writeln!(out)?;

    writeln!(out, "Hardware counters (per operation):")?;
    if report.counters.is_empty() {
        writeln!(out, "  not measured")?;
    } else {
        for c in &report.counters {
            writeln!(
                out,
                "  {:<14} {:>12.3}   (total {})",
                c.event.name(),
                c.per_op,
                format_number(c.total)
            )?;
        }
    }
    writeln!(out)?;

    if show_latency {
        writeln!(out, "Latency:")?;
        match report.latency {
            Some(ref l) => {
                writeln!(out, "  Mean:   {:.1} ns", l.mean_ns)?;
                writeln!(out, "  p50:    {} ns", l.p50_ns)?;
                writeln!(out, "  p90:    {} ns", l.p90_ns)?;
                writeln!(out, "  p99:    {} ns", l.p99_ns)?;
                writeln!(out, "  p99.9:  {} ns", l.p999_ns)?;
                writeln!(out, "  Max:    {} ns", l.max_ns)?;
            }
            None => writeln!(out, "  No latency data collected")?,
        }
        writeln!(out)?;
    }

    Ok(())
}

/// Format a number with thousands separators
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();

    for (count, c) in s.chars().rev().enumerate() {
        if count > 0 && count % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }

    result.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::HwEvent;
    use crate::stats::CounterRate;

    fn report() -> BenchmarkReport {
        BenchmarkReport {
            phase: "search".into(),
            structure: "skiplist".into(),
            threads: 4,
            total_ops: 1_234_567,
            throughput_ops_per_ms: 2.5,
            counters: vec![CounterRate {
                event: HwEvent::LlcMisses,
                total: 2_469_134,
                per_op: 2.0,
            }],
            latency: None,
            lookups: 1_234_567,
            hits: 617_283,
            skipped: 0,
            slowest_thread_ms: 12.0,
        }
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn test_render_report() {
        let text = render_report(&report(), false);
        assert!(text.contains("PHASE: SEARCH (skiplist, 4 threads)"));
        assert!(text.contains("Operations:   1,234,567"));
        assert!(text.contains("2.500 ops/ms"));
        assert!(text.contains("llc_misses"));
        assert!(!text.contains("Latency:"));
    }

    #[test]
    fn test_render_without_counters() {
        let mut r = report();
        r.counters.clear();
        let text = render_report(&r, true);
        assert!(text.contains("not measured"));
        assert!(text.contains("No latency data collected"));
    }
}
