use serde_json::Value;

/// Headline figures in priority order. Each key is looked up on the result
/// first and then on its method detail, so an LBO prints its IRR and a DCF
/// its per-share value.
const PRIORITY_KEYS: [&str; 5] = [
    "wacc",
    "irr",
    "value_per_share",
    "equity_value",
    "enterprise_value",
];

/// Print just the key answer value from the output.
pub fn print_minimal(value: &Value) {
    println!("{}", minimal_line(value));
}

fn minimal_line(value: &Value) -> String {
    // Batch output: one headline per row
    if let Value::Array(rows) = value {
        return rows
            .iter()
            .map(minimal_line)
            .collect::<Vec<_>>()
            .join("\n");
    }

    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);
    let detail = result_obj.get("detail");

    for key in PRIORITY_KEYS {
        let found = result_obj
            .get(key)
            .filter(|v| !v.is_null())
            .or_else(|| detail.and_then(|d| d.get(key)).filter(|v| !v.is_null()));
        if let Some(val) = found {
            return format_minimal(val);
        }
    }

    if let Value::Object(map) = result_obj {
        if let Some(Value::String(err)) = map.get("error") {
            return format!("error: {err}");
        }
        if let Some((key, val)) = map.iter().next() {
            return format!("{}: {}", key, format_minimal(val));
        }
    }

    format_minimal(result_obj)
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
