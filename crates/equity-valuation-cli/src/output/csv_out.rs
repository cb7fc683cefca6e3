use serde_json::{Map, Value};
use std::io;

/// Write output as CSV to stdout.
///
/// A single valuation becomes `field,value` rows with the method detail
/// flattened under dotted keys (`detail.irr`); yearly and per-peer lists
/// are emitted as indexed rows (`detail.schedule.0.closing_debt`). Batch
/// output is one row per request.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    match value {
        Value::Object(map) => {
            let root = match map.get("result") {
                Some(Value::Object(result)) => result,
                _ => map,
            };
            let _ = wtr.write_record(["field", "value"]);
            for (key, val) in flatten(root) {
                let _ = wtr.write_record([key.as_str(), val.as_str()]);
            }
        }
        Value::Array(arr) => write_array_csv(&mut wtr, arr),
        _ => {
            let _ = wtr.write_record([&format_csv_value(value)]);
        }
    }

    let _ = wtr.flush();
}

fn flatten(map: &Map<String, Value>) -> Vec<(String, String)> {
    let mut rows = Vec::new();
    for (key, val) in map {
        flatten_into(key.clone(), val, &mut rows);
    }
    rows
}

fn flatten_into(prefix: String, value: &Value, rows: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, val) in map {
                flatten_into(format!("{prefix}.{key}"), val, rows);
            }
        }
        Value::Array(items) if items.iter().any(|v| v.is_object() || v.is_array()) => {
            for (i, val) in items.iter().enumerate() {
                flatten_into(format!("{prefix}.{i}"), val, rows);
            }
        }
        _ => rows.push((prefix, format_csv_value(value))),
    }
}

fn write_array_csv<W: io::Write>(wtr: &mut csv::Writer<W>, arr: &[Value]) {
    if arr.is_empty() {
        return;
    }

    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
        let _ = wtr.write_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(*h).map(format_csv_value).unwrap_or_default())
                    .collect();
                let _ = wtr.write_record(&row);
            }
        }
    } else {
        for item in arr {
            let _ = wtr.write_record([&format_csv_value(item)]);
        }
    }
}

fn format_csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(items) => items
            .iter()
            .map(format_csv_value)
            .collect::<Vec<_>>()
            .join(";"),
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
