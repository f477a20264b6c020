//! Report export: JSON, one CSV per table, and a Markdown summary.
//!
//! The JSON form carries `schema_version`; newer versions are rejected on load.

use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::report::generator::{Report, SCHEMA_VERSION};
use crate::report::table::ReportTable;

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize report to JSON")
}

/// Deserialize a report, rejecting schema versions newer than this build.
pub fn import_json(json: &str) -> Result<Report> {
    let report: Report = serde_json::from_str(json).context("failed to deserialize report from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// One table as CSV: a header of column names, then one record per row.
pub fn table_to_csv(table: &ReportTable) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(&table.columns)?;
    for row in &table.rows {
        wtr.write_record(row.iter().map(|c| c.to_string()))?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Files ──────────────────────────────────────────────────────────

/// Write `report.json`, `summary.md` and `tables/<name>.csv` under `output_dir`.
pub fn save_report(report: &Report, output_dir: &Path) -> Result<()> {
    let tables_dir = output_dir.join("tables");
    std::fs::create_dir_all(&tables_dir)
        .with_context(|| format!("failed to create output dir: {}", tables_dir.display()))?;

    let json = export_json(report)?;
    std::fs::write(output_dir.join("report.json"), json)
        .with_context(|| format!("failed to write report.json in {}", output_dir.display()))?;
    std::fs::write(output_dir.join("summary.md"), generate_markdown(report))
        .with_context(|| format!("failed to write summary.md in {}", output_dir.display()))?;

    for table in &report.tables {
        let path = tables_dir.join(format!("{}.csv", table.name));
        std::fs::write(&path, table_to_csv(table)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(())
}

pub fn load_report(dir: &Path) -> Result<Report> {
    let path = dir.join("report.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

// ─── Markdown summary ───────────────────────────────────────────────

pub fn generate_markdown(report: &Report) -> String {
    let mut md = String::with_capacity(2048);

    md.push_str("# Portfolio Report\n\n");

    md.push_str("## Metadata\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Period | {} to {} |\n", report.from, report.to));
    md.push_str(&format!("| Base Currency | {} |\n", report.base_currency));
    md.push_str(&format!("| Trades | {} |\n", report.trade_count));
    if !report.strategies.is_empty() {
        md.push_str(&format!("| Strategies | {} |\n", report.strategies.join(", ")));
    }
    md.push('\n');

    md.push_str("## Performance Summary\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    for line in &report.summary {
        md.push_str(&format!(
            "| {} | {} |\n",
            line.stat,
            line.display.as_deref().unwrap_or("n/a")
        ));
    }
    md.push('\n');

    md.push_str("## Tables\n\n");
    md.push_str("| Table | Rows |\n");
    md.push_str("| --- | --- |\n");
    for table in &report.tables {
        md.push_str(&format!("| {} | {} |\n", table.name, table.len()));
    }
    md.push('\n');

    if !report.fallback_instruments.is_empty() {
        md.push_str("## Data Quality\n\n");
        for id in &report.fallback_instruments {
            md.push_str(&format!("- instrument {id} priced from prior position snapshots\n"));
        }
        md.push('\n');
    }

    if !report.errors.is_empty() {
        md.push_str("## Section Errors\n\n");
        for e in &report.errors {
            md.push_str(&format!("- **{}**: {}\n", e.section, e.message));
        }
        md.push('\n');
    }

    md
}
