use crate::core::{DataValue, EnsembleError, KeyValues, Result, Value, parse_number};
use tracing::{Level, event};

/// Parses `<key> <value>` lines.
///
/// Blank lines are ignored and a file without data rows gives an empty
/// mapping. Lines that do not split into exactly two whitespace separated
/// tokens are skipped with a warning. A repeated key keeps its last value.
pub fn parse_keyvalue(bytes: &[u8], numeric: bool) -> KeyValues {
    let text = String::from_utf8_lossy(bytes);
    let mut values = KeyValues::new();
    for (lineno, line) in text.lines().enumerate() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.as_slice() {
            [] => continue,
            [key, value] => {
                let value = if numeric {
                    parse_number(value)
                } else {
                    Value::Text(value.to_string())
                };
                values.insert(key.to_string(), value);
            }
            _ => {
                event!(
                    Level::WARN,
                    line = lineno + 1,
                    tokens = tokens.len(),
                    "skipping malformed key-value line"
                );
            }
        }
    }
    values
}

/// Parses a file holding a single value.
///
/// An empty file is `Absent` when read as text. Read numerically, empty
/// or non-numeric content is a parse error.
pub fn parse_scalar(bytes: &[u8], numeric: bool) -> Result<DataValue> {
    let text = String::from_utf8_lossy(bytes);
    let content = text.lines().map(str::trim).find(|l| !l.is_empty());
    match (content, numeric) {
        (None, false) => Ok(DataValue::Absent),
        (None, true) => Err(EnsembleError::ParseError("scalar file is empty".into())),
        (Some(raw), false) => Ok(DataValue::Scalar(Value::Text(raw.to_string()))),
        (Some(raw), true) => match parse_number(raw) {
            Value::Text(_) => Err(EnsembleError::ParseError(format!(
                "scalar value '{}' is not numeric",
                raw
            ))),
            number => Ok(DataValue::Scalar(number)),
        },
    }
}
