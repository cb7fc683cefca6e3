use serde_json::Value;
use std::io::{self, Read};

/// Read piped input from stdin: JSON, or YAML when it does not parse as
/// JSON. Returns None if stdin is a TTY (interactive) or empty.
pub fn read_stdin() -> Result<Option<Value>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    parse_piped(&buffer)
}

fn parse_piped(buffer: &str) -> Result<Option<Value>, Box<dyn std::error::Error>> {
    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    match serde_json::from_str(trimmed) {
        Ok(value) => Ok(Some(value)),
        Err(json_err) => {
            tracing::debug!(error = %json_err, "stdin is not JSON; trying YAML");
            let value: Value = serde_yaml::from_str(trimmed)
                .map_err(|_| format!("Failed to parse stdin as JSON: {json_err}"))?;
            Ok(Some(value))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert!(parse_piped("  \n").unwrap().is_none());
    }

    #[test]
    fn test_json_input() {
        let v = parse_piped(r#"{"tax_rate": "0.25"}"#).unwrap().unwrap();
        assert_eq!(v["tax_rate"], "0.25");
    }

    #[test]
    fn test_yaml_input() {
        let v = parse_piped("tax_rate: '0.25'\nhorizon_years: 5\n").unwrap().unwrap();
        assert_eq!(v["tax_rate"], "0.25");
        assert_eq!(v["horizon_years"], 5);
    }
}
