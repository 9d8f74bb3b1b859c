//! Delimited tabular text.
//!
//! Column types are inferred per column like the JSON schema inference
//! strategies do per field: every non-empty cell votes for Integer, Float
//! or Text and the most general type wins.

use crate::core::{DataType, Result, Row, Value};
use crate::storage::Table;

/// Parses comma separated text with a header row.
///
/// Returns `None` when the input holds no header at all, which is
/// distinct from a header-only input (a table with zero rows). With
/// `numeric` unset every cell is kept as text. Empty cells are NULL.
pub fn parse_table(bytes: &[u8], numeric: bool) -> Result<Option<Table>> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut cells: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record?;
        cells.push(record.iter().map(str::to_string).collect());
    }

    let types: Vec<DataType> = (0..headers.len())
        .map(|col| {
            if numeric {
                infer_column(cells.iter().map(|row| row[col].as_str()))
            } else {
                DataType::Text
            }
        })
        .collect();

    let rows: Vec<Row> = cells
        .into_iter()
        .map(|row| {
            row.into_iter()
                .zip(&types)
                .map(|(cell, data_type)| convert_cell(cell, *data_type))
                .collect()
        })
        .collect();

    Table::new(headers, rows).map(Some)
}

fn cell_type(cell: &str) -> Option<DataType> {
    if cell.is_empty() {
        None
    } else if cell.parse::<i64>().is_ok() {
        Some(DataType::Integer)
    } else if cell.parse::<f64>().is_ok() {
        Some(DataType::Float)
    } else {
        Some(DataType::Text)
    }
}

fn infer_column<'a>(cells: impl Iterator<Item = &'a str>) -> DataType {
    let types: Vec<DataType> = cells.filter_map(cell_type).collect();
    DataType::most_general(&types).unwrap_or(DataType::Text)
}

fn convert_cell(cell: String, data_type: DataType) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    match data_type {
        DataType::Integer => cell.parse().map(Value::Integer).unwrap_or(Value::Text(cell)),
        DataType::Float => cell.parse().map(Value::Float).unwrap_or(Value::Text(cell)),
        _ => Value::Text(cell),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VOLUMES: &str = "\
ZONE,REGION,FIPNUM,STOIIP_OIL,PORV
UpperReek,1,1,1.5e6,
MidReek,1,2,2.25e6,300
LowerReek,2,3,0,410.5
";

    #[test]
    fn test_numeric_inference() {
        let table = parse_table(VOLUMES.as_bytes(), true).unwrap().unwrap();
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.column_type("ZONE"), Some(DataType::Text));
        assert_eq!(table.column_type("FIPNUM"), Some(DataType::Integer));
        assert_eq!(table.column_type("STOIIP_OIL"), Some(DataType::Float));
        assert_eq!(table.column_type("PORV"), Some(DataType::Float));
        assert!(table.value(0, "PORV").unwrap().is_null());
    }

    #[test]
    fn test_string_forced_columns() {
        let table = parse_table(VOLUMES.as_bytes(), false).unwrap().unwrap();
        assert_eq!(table.column_type("FIPNUM"), Some(DataType::Text));
        assert_eq!(table.value(1, "STOIIP_OIL"), Some(&Value::from("2.25e6")));
    }

    #[test]
    fn test_absent_versus_empty() {
        assert!(parse_table(b"", true).unwrap().is_none());
        assert!(parse_table(b"\n\n", true).unwrap().is_none());
        let header_only = parse_table(b"A,B\n", true).unwrap().unwrap();
        assert_eq!(header_only.column_count(), 2);
        assert!(header_only.is_empty());
    }

    #[test]
    fn test_ragged_rows_are_errors() {
        assert!(parse_table(b"A,B\n1,2,3\n", true).is_err());
    }
}
