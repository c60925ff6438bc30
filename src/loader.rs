//! Input loaders: recording JSON, page fixtures, CSV data, mappings

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use rehearse_core_types::Step;
use rehearse_dom::NodeSpec;
use tracing::info;

/// Load a recorded step sequence from JSON.
pub fn load_steps(path: &Path) -> Result<Vec<Step>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read steps file {}", path.display()))?;
    let steps: Vec<Step> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse steps file {}", path.display()))?;
    info!(count = steps.len(), file = %path.display(), "loaded recording");
    Ok(steps)
}

/// Load a page fixture (list of node specs) for offline dry-runs.
pub fn load_page(path: &Path) -> Result<Vec<NodeSpec>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read page fixture {}", path.display()))?;
    let specs: Vec<NodeSpec> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse page fixture {}", path.display()))?;
    info!(nodes = specs.len(), file = %path.display(), "loaded page fixture");
    Ok(specs)
}

/// Load data rows from a CSV file, one dictionary per record keyed by
/// the header row.
pub fn load_rows(path: &Path) -> Result<Vec<HashMap<String, String>>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open data file {}", path.display()))?;
    let headers = reader
        .headers()
        .context("data file has no header row")?
        .clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.context("malformed CSV record")?;
        let row: HashMap<String, String> = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.to_string(), v.to_string()))
            .collect();
        rows.push(row);
    }
    info!(rows = rows.len(), file = %path.display(), "loaded data rows");
    Ok(rows)
}

/// Load the field-mapping table (CSV column → step label) from JSON.
pub fn load_mappings(path: &Path) -> Result<HashMap<String, String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read mapping file {}", path.display()))?;
    let mappings: HashMap<String, String> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse mapping file {}", path.display()))?;
    Ok(mappings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn csv_rows_are_keyed_by_header() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Username,Password").unwrap();
        writeln!(file, "ada,lovelace").unwrap();
        writeln!(file, "grace,hopper").unwrap();

        let rows = load_rows(file.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["Username"], "ada");
        assert_eq!(rows[1]["Password"], "hopper");
    }

    #[test]
    fn steps_parse_with_sparse_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"event":"click","label":"Log in","bundle":{{"id":"login"}}}}]"#
        )
        .unwrap();

        let steps = load_steps(file.path()).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].bundle.id.as_deref(), Some("login"));
        assert!(steps[0].path.is_empty());
    }
}
