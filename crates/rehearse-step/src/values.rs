//! Value resolution for input/enter steps
//!
//! Priority order: explicitly injected value, CSV value keyed by the
//! exact step label, CSV value reached through the field-mapping table
//! (column → label), then the originally recorded value. The chosen
//! source is reported on the step result for auditability.

use rehearse_core_types::{Step, ValueSource};

use crate::types::StepContext;

fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(value)
}

/// Resolve the value a step should type, and where it came from.
///
/// Blank CSV cells fall through to the next source so a sparse data
/// table keeps the recorded value for the columns it leaves empty.
pub fn resolve_value(step: &Step, ctx: &StepContext) -> Option<(String, ValueSource)> {
    if let Some(injected) = ctx.injected_value.as_deref().and_then(non_blank) {
        return Some((injected.to_string(), ValueSource::Injected));
    }

    if let Some(rows) = &ctx.row_values {
        if let Some(direct) = rows.get(&step.label).map(String::as_str).and_then(non_blank) {
            return Some((direct.to_string(), ValueSource::CsvDirect));
        }

        if let Some(mappings) = &ctx.field_mappings {
            // Stable order so duplicate mappings to one label resolve
            // deterministically.
            let mut columns: Vec<&String> = mappings
                .iter()
                .filter(|(_, label)| **label == step.label)
                .map(|(column, _)| column)
                .collect();
            columns.sort();
            for column in columns {
                if let Some(mapped) = rows.get(column).map(String::as_str).and_then(non_blank) {
                    return Some((mapped.to_string(), ValueSource::CsvMapped));
                }
            }
        }
    }

    step.value
        .as_deref()
        .and_then(non_blank)
        .map(|recorded| (recorded.to_string(), ValueSource::Recorded))
}
