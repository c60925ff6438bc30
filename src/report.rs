//! Run summary printing and export writing

use std::path::Path;

use anyhow::{Context, Result};
use rehearse_core_types::StepStatus;
use rehearse_run::RunExport;

/// Print a human-readable run summary to stdout.
pub fn print_summary(export: &RunExport) {
    println!();
    println!("Run {}", export.run_id);
    println!(
        "  status:   {}  ({} passed, {} failed, {} skipped)",
        export.status, export.passed, export.failed, export.skipped
    );
    println!("  duration: {}ms", export.duration_ms);

    for row in &export.row_results {
        println!(
            "  row {:>3}: {:<7} {} passed, {} failed, {} skipped ({}ms)",
            row.row_index, row.status, row.passed, row.failed, row.skipped, row.duration_ms
        );
    }

    let problems: Vec<_> = export
        .step_results
        .iter()
        .filter(|r| r.status != StepStatus::Passed)
        .collect();
    if !problems.is_empty() {
        println!();
        for result in problems {
            println!(
                "  {} step {} '{}' (row {:?}): {}",
                result.status,
                result.step_index,
                result.label,
                result.row_index,
                result.error.as_deref().unwrap_or("-")
            );
        }
    }
    println!();
}

/// Write the structured export as pretty JSON.
pub fn write_export(path: &Path, export: &RunExport) -> Result<()> {
    let json = serde_json::to_string_pretty(export).context("failed to serialize run export")?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write export to {}", path.display()))?;
    Ok(())
}
