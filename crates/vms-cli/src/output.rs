use std::fmt::Write as _;

use serde::Serialize;
use serde_json::Value;
use vms_core::{RunReport, VmRecord};

use crate::cli::OutputFormat;

/// Print a value as pretty JSON, or as text via `text`.
pub fn output<T: Serialize + ?Sized>(
    value: &T,
    format: OutputFormat,
    text: impl FnOnce(&T) -> String,
) -> anyhow::Result<()> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Text => text(value),
    };
    println!("{rendered}");
    Ok(())
}

pub fn report_text(report: &RunReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "scope:        {}", report.scope);
    let _ = writeln!(out, "state:        {}", report.state);
    let _ = writeln!(out, "discovered:   {}", report.discovered);
    let _ = writeln!(out, "transformed:  {}", report.transformed);
    let _ = writeln!(out, "upserted:     {}", report.upserted);
    let _ = writeln!(out, "deleted:      {}", report.deleted);
    let _ = writeln!(
        out,
        "batches:      {} ({} failed)",
        report.batches.len(),
        report.failed_batches()
    );
    let _ = write!(
        out,
        "elapsed:      {} ({:.2} s/VM)",
        report.elapsed_hms(),
        report.seconds_per_item()
    );
    if let Some(reason) = &report.delete_skipped {
        let _ = write!(out, "\ndelete skipped: {reason}");
    }
    if let Some(error) = &report.delete_error {
        let _ = write!(out, "\ndelete failed: {error}");
    }
    if !report.failed_items.is_empty() {
        let _ = write!(out, "\nfailed items ({}):", report.failure_count());
        for failure in &report.failed_items {
            let _ = write!(out, "\n  {}  {}", failure.identifier, failure.reason);
        }
    }
    out
}

pub fn records_text(records: &[VmRecord]) -> String {
    if records.is_empty() {
        return String::from("(no rows)");
    }
    records
        .iter()
        .map(|r| format!("{}  {}  {}  {}", r.vm_uuid, r.name, r.powerstate, r.vm_host))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn scopes_text(scopes: &[(String, usize)]) -> String {
    if scopes.is_empty() {
        return String::from("(no rows)");
    }
    scopes
        .iter()
        .map(|(scope, count)| format!("{scope}  {count}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `section.key = value`, one line per leaf.
pub fn flat_text<T: Serialize>(value: &T) -> String {
    let mut lines = Vec::new();
    match serde_json::to_value(value) {
        Ok(value) => flatten("", &value, &mut lines),
        Err(e) => lines.push(format!("(unprintable: {e})")),
    }
    lines.join("\n")
}

fn flatten(prefix: &str, value: &Value, lines: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten(&path, child, lines);
            }
        }
        Value::String(s) => lines.push(format!("{prefix} = {s:?}")),
        other => lines.push(format!("{prefix} = {other}")),
    }
}
