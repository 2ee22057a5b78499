//! Markdown and JSON report generation.
//!
//! This module renders a [`RunReport`] for the terminal or a file.

use crate::models::{RunMetadata, RunReport};
use anyhow::Result;
use std::io::Write;
use std::path::Path;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &RunReport, show_completion_order: bool) -> String {
    let mut output = String::new();

    output.push_str("# Fanout Run Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_result_section(report));

    if show_completion_order {
        output.push_str(&generate_completion_section(report));
    }

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &RunMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Policy:** `{}`\n", metadata.policy));
    section.push_str(&format!("- **Workers:** {}\n", metadata.workers));
    section.push_str(&format!(
        "- **Started:** {}\n",
        metadata.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Duration:** {:.3}s (limit {}s)\n",
        metadata.duration_seconds, metadata.timeout_seconds
    ));
    section.push('\n');

    section
}

/// Generate the result section.
fn generate_result_section(report: &RunReport) -> String {
    let mut section = String::new();

    section.push_str("## Result\n\n");
    section.push_str(&format!(
        "**Status:** {} {}\n\n",
        report.status.emoji(),
        report.status
    ));

    match (&report.output, &report.error) {
        (Some(output), _) => {
            section.push_str(&format!("**Tokens:** {}\n\n", report.tokens));
            section.push_str("```\n");
            section.push_str(output);
            section.push_str("\n```\n\n");
        }
        (None, Some(error)) => {
            section.push_str(&format!("> **Error:** {}\n\n", error));
        }
        (None, None) => {}
    }

    section
}

/// Generate the completion order section.
fn generate_completion_section(report: &RunReport) -> String {
    let mut section = String::new();

    section.push_str("## Completion Order\n\n");

    if report.completion_order.is_empty() {
        section.push_str("No worker completions were observed.\n\n");
        return section;
    }

    section.push_str("| Rank | Worker |\n");
    section.push_str("|:---:|:---:|\n");
    for (rank, index) in report.completion_order.iter().enumerate() {
        section.push_str(&format!("| {} | svc-{} |\n", rank + 1, index));
    }
    section.push('\n');

    if !report.settled {
        let missing = report
            .metadata
            .workers
            .saturating_sub(report.completion_order.len());
        section.push_str(&format!(
            "*{} worker(s) were still running when the aggregate resolved.*\n\n",
            missing
        ));
    }

    section
}

/// Generate a JSON report.
pub fn generate_json_report(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Write rendered report content to a file.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(content.as_bytes())?;

    Ok(())
}
