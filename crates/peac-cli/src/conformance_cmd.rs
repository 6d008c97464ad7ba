use std::path::Path;

use anyhow::Result;
use peac_core::conformance::run_suite;

use crate::{ReportFormat, EXIT_PASS, EXIT_VERIFY_FAIL};

pub(crate) fn run(dir: &Path, level: &str, category: Option<&str>, output: ReportFormat) -> Result<u8> {
    let level_dir = dir.join(level);
    let suite_dir = if level_dir.is_dir() { level_dir } else { dir.to_path_buf() };

    let mut report = run_suite(&suite_dir, concat!("peac-cli/", env!("CARGO_PKG_VERSION")))?;

    if let Some(category) = category {
        report.results.retain(|r| r.category == category);
        report.summary.total = report.results.len();
        report.summary.passed = report.results.iter().filter(|r| r.passed).count();
        report.summary.failed = report.summary.total - report.summary.passed;
    }

    match output {
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        ReportFormat::Markdown => print_markdown(&report),
        ReportFormat::Text => print_text(&report),
    }

    Ok(if report.summary.failed == 0 { EXIT_PASS } else { EXIT_VERIFY_FAIL })
}

fn print_text(report: &peac_core::conformance::ConformanceReport) {
    println!("suite: {} ({})", report.suite.name, report.suite.vectors_digest);
    for r in &report.results {
        let status = if r.passed { "ok" } else { "FAIL" };
        println!("  [{status}] {}/{}", r.category, r.fixture);
        if let Some(mismatch) = &r.mismatch {
            println!("         {mismatch}");
        }
    }
    println!("{}/{} passed", report.summary.passed, report.summary.total);
}

fn print_markdown(report: &peac_core::conformance::ConformanceReport) {
    println!("# Conformance: {}\n", report.suite.name);
    println!("`vectors_digest={}`\n", report.suite.vectors_digest);
    println!("| category | fixture | result |");
    println!("|---|---|---|");
    for r in &report.results {
        println!("| {} | {} | {} |", r.category, r.fixture, if r.passed { "pass" } else { "fail" });
    }
    println!("\n**{}/{} passed**", report.summary.passed, report.summary.total);
}
