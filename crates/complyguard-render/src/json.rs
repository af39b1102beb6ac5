use complyguard_types::ComplianceReport;
use serde_json::{Map, Value};

/// Render the report as canonical JSON: object keys sorted at every depth, two-space
/// indentation, trailing newline.
///
/// Parsing the output and rendering it again yields the same bytes.
pub fn render_json(report: &ComplianceReport) -> serde_json::Result<Vec<u8>> {
    let value = canonicalize(serde_json::to_value(report)?);
    let mut out = serde_json::to_vec_pretty(&value)?;
    out.push(b'\n');
    Ok(out)
}

/// Rebuild every object with its keys in sorted order.
pub fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, canonicalize(v)))
                    .collect::<Map<_, _>>(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
