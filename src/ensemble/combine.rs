//! Cross-realization combination of cached values.
//!
//! Combined tables always get their REAL column here; per-realization
//! data never carries it.

use crate::core::{DataValue, EnsembleError, KeyValues, Result, Row, Value};
use crate::expression::Statistic;
use crate::realization::{Realization, VirtualRealization};
use crate::storage::{DataStore, Table};
use std::collections::{BTreeSet, HashMap};
use tracing::{Level, event};

/// Realization index column of combined tables.
pub const REAL: &str = "REAL";

/// Copy of `table` with a leading REAL column holding `index`.
pub fn tag_table(table: &Table, index: usize) -> Result<Table> {
    let mut tagged = table.clone();
    tagged.drop_column(REAL);
    tagged.insert_column(0, REAL, Value::from(index))?;
    Ok(tagged)
}

/// Combines one key's values from several realizations into a table
/// tagged with REAL.
///
/// Tables are stacked, key-value mappings become one row per
/// realization and scalars a `REAL, <name>` table. Absent values are
/// skipped. The first value decides the shape; values of another shape
/// are skipped with a warning.
pub fn combine_values<'a>(
    name: &str,
    values: impl IntoIterator<Item = (usize, &'a DataValue)>,
) -> Result<Table> {
    let values: Vec<(usize, &DataValue)> = values.into_iter().filter(|(_, v)| !v.is_absent()).collect();
    let Some((_, first)) = values.first() else {
        return Ok(Table::empty());
    };
    let shape = first.kind();
    let values: Vec<(usize, &DataValue)> = values
        .iter()
        .copied()
        .filter(|(index, value)| {
            let same = value.kind() == shape;
            if !same {
                event!(Level::WARN, key = name, real = index, kind = value.kind(), expected = shape, "skipping value of different shape");
            }
            same
        })
        .collect();

    match first {
        DataValue::Table(_) => {
            let tagged = values
                .iter()
                .filter_map(|(index, value)| value.as_table().map(|t| tag_table(t, *index)))
                .collect::<Result<Vec<Table>>>()?;
            Ok(Table::concat(&tagged))
        }
        DataValue::KeyValues(_) => {
            let rows: Vec<(usize, &KeyValues)> = values
                .iter()
                .filter_map(|(index, value)| value.as_key_values().map(|kv| (*index, kv)))
                .collect();
            key_values_table(&rows)
        }
        DataValue::Scalar(_) => {
            let mut table = Table::with_columns([REAL, name]);
            for (index, value) in &values {
                if let Some(scalar) = value.as_scalar() {
                    table.push_row(vec![Value::from(*index), scalar.clone()])?;
                }
            }
            Ok(table)
        }
        DataValue::Absent => Ok(Table::empty()),
    }
}

fn key_values_table(rows: &[(usize, &KeyValues)]) -> Result<Table> {
    let mut keys: BTreeSet<&str> = rows.iter().flat_map(|(_, kv)| kv.keys().map(String::as_str)).collect();
    if keys.remove(REAL) {
        event!(Level::WARN, "dropping {} entry from realization data", REAL);
    }
    let mut table = Table::with_columns(std::iter::once(REAL).chain(keys.iter().copied()));
    for (index, kv) in rows {
        let mut row: Row = vec![Value::from(*index)];
        row.extend(keys.iter().map(|k| kv.get(*k).cloned().unwrap_or(Value::Null)));
        table.push_row(row)?;
    }
    Ok(table)
}

/// Reduces one key's values across realizations with `stat`.
///
/// Returns `None` when there is nothing numeric to reduce.
pub fn aggregate_values(name: &str, values: &[&DataValue], stat: Statistic) -> Result<Option<DataValue>> {
    let values: Vec<&DataValue> = values.iter().copied().filter(|v| !v.is_absent()).collect();
    let Some(first) = values.first() else {
        return Ok(None);
    };
    if let Some(other) = values.iter().find(|v| v.kind() != first.kind()) {
        return Err(EnsembleError::TypeMismatch(format!(
            "'{}' is a {} in some realizations and a {} in others",
            name,
            first.kind(),
            other.kind()
        )));
    }

    match first {
        DataValue::Table(_) => {
            let tables: Vec<&Table> = values.iter().filter_map(|v| v.as_table()).collect();
            Ok(Some(DataValue::Table(aggregate_tables(&tables, stat)?)))
        }
        DataValue::KeyValues(_) => {
            let mappings: Vec<&KeyValues> = values.iter().filter_map(|v| v.as_key_values()).collect();
            let keys: BTreeSet<&String> = mappings.iter().flat_map(|kv| kv.keys()).collect();
            let mut reduced = KeyValues::new();
            for key in keys {
                let cells: Vec<&Value> = mappings.iter().filter_map(|kv| kv.get(key)).collect();
                // Mappings mixing text and numbers cannot be reduced
                if cells.iter().any(|v| !v.is_numeric() && !v.is_missing()) {
                    continue;
                }
                reduced.insert(key.clone(), reduce_cells(cells.into_iter(), stat));
            }
            Ok(Some(DataValue::KeyValues(reduced)))
        }
        DataValue::Scalar(_) => {
            let cells: Vec<&Value> = values.iter().filter_map(|v| v.as_scalar()).collect();
            if cells.iter().any(|v| !v.is_numeric() && !v.is_missing()) {
                return Ok(None);
            }
            Ok(Some(DataValue::Scalar(reduce_cells(cells.into_iter(), stat))))
        }
        DataValue::Absent => Ok(None),
    }
}

fn reduce_cells<'a>(cells: impl Iterator<Item = &'a Value>, stat: Statistic) -> Value {
    let numbers: Vec<f64> = cells.filter_map(Value::as_f64).collect();
    stat.reduce(&numbers).map_or(Value::Null, Value::Float)
}

/// Reduces tables row-wise.
///
/// Rows are matched across the tables by their non-numeric cells (text,
/// dates) and by how often that identity has already occurred in the
/// same table, so two rows of one table never share a group. Tables
/// without any non-numeric column are therefore matched by row position.
/// Numeric columns are reduced within each group.
pub fn aggregate_tables(tables: &[&Table], stat: Statistic) -> Result<Table> {
    let stacked = Table::concat(tables.iter().copied());
    let columns: Vec<String> = stacked.columns().iter().filter(|c| c.as_str() != REAL).cloned().collect();
    let numeric: Vec<bool> = columns
        .iter()
        .map(|c| stacked.column_type(c).is_some_and(|t| t.is_numeric()))
        .collect();

    // Group key -> (identifying cells, collected numeric cells per column)
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, (Row, Vec<Vec<f64>>)> = HashMap::new();

    for table in tables {
        let indices: Vec<Option<usize>> = columns.iter().map(|c| table.column_index(c)).collect();
        let mut seen: HashMap<String, usize> = HashMap::new();
        for row in table.rows() {
            let cells: Vec<Value> = indices
                .iter()
                .map(|idx| idx.map_or(Value::Null, |i| row[i].clone()))
                .collect();
            let identity = cells
                .iter()
                .zip(&numeric)
                .filter(|(_, n)| !**n)
                .map(|(v, _)| v.to_string())
                .collect::<Vec<_>>()
                .join("\u{1f}");
            let occurrence = seen.entry(identity.clone()).or_insert(0);
            let key = format!("{}\u{1e}{}", identity, occurrence);
            *occurrence += 1;

            let group = groups.entry(key.clone()).or_insert_with(|| {
                order.push(key);
                (cells.clone(), vec![Vec::new(); columns.len()])
            });
            for (col, cell) in cells.iter().enumerate() {
                if numeric[col]
                    && let Some(number) = cell.as_f64()
                {
                    group.1[col].push(number);
                }
            }
        }
    }

    let mut result = Table::with_columns(columns.clone());
    for key in order {
        let Some((identity, numbers)) = groups.remove(&key) else {
            continue;
        };
        let row: Row = identity
            .into_iter()
            .enumerate()
            .map(|(col, cell)| {
                if numeric[col] {
                    stat.reduce(&numbers[col]).map_or(Value::Null, Value::Float)
                } else {
                    cell
                }
            })
            .collect();
        result.push_row(row)?;
    }
    Ok(result)
}

/// Sorted union of the members' keys.
pub fn union_keys<'a, R: Realization + 'a>(members: impl IntoIterator<Item = &'a R>) -> Vec<String> {
    let keys: BTreeSet<String> = members.into_iter().flat_map(|m| m.keys()).collect();
    keys.into_iter().collect()
}

/// The REAL-tagged table of `key` over all members holding it.
pub fn combined_get<'a, R: Realization + 'a>(
    members: impl IntoIterator<Item = (usize, &'a R)>,
    key: &str,
) -> Result<Table> {
    let mut values = Vec::new();
    for (index, member) in members {
        match member.get(key) {
            Ok(value) => values.push((index, value)),
            Err(EnsembleError::KeyNotFound(_)) => continue,
            Err(err) => return Err(err),
        }
    }
    if values.is_empty() {
        return Err(EnsembleError::KeyNotFound(key.to_string()));
    }
    combine_values(key, values)
}

/// `key` reduced across members, as a table.
pub fn combined_aggregate<'a, R: Realization + 'a>(
    members: impl IntoIterator<Item = (usize, &'a R)>,
    key: &str,
    stat: Statistic,
) -> Result<Table> {
    let mut values = Vec::new();
    for (_, member) in members {
        match member.get(key) {
            Ok(value) => values.push(value),
            Err(EnsembleError::KeyNotFound(_)) => continue,
            Err(err) => return Err(err),
        }
    }
    if values.is_empty() {
        return Err(EnsembleError::KeyNotFound(key.to_string()));
    }
    match aggregate_values(key, &values, stat)? {
        Some(DataValue::Table(table)) => Ok(table),
        Some(DataValue::KeyValues(kv)) => {
            let mut table = Table::with_columns(kv.keys().cloned());
            table.push_row(kv.into_values().collect())?;
            Ok(table)
        }
        Some(DataValue::Scalar(value)) => {
            let mut table = Table::with_columns([key]);
            table.push_row(vec![value])?;
            Ok(table)
        }
        Some(DataValue::Absent) | None => Ok(Table::empty()),
    }
}

/// A virtual realization holding `stat` of every key. Keys that cannot
/// be reduced are left out with a warning.
pub fn combined_agg<'a, R: Realization + 'a>(
    members: impl IntoIterator<Item = &'a R>,
    stat: Statistic,
    name: &str,
) -> Result<VirtualRealization> {
    let members: Vec<&R> = members.into_iter().collect();
    let mut data = DataStore::new();
    for key in union_keys(members.iter().copied()) {
        let values: Vec<&DataValue> = members.iter().filter_map(|m| m.data().get_exact(&key)).collect();
        match aggregate_values(&key, &values, stat) {
            Ok(Some(value)) => data.insert(key, value),
            Ok(None) => {}
            Err(err) => {
                event!(Level::WARN, key = %key, error = %err, "cannot aggregate key");
            }
        }
    }
    Ok(VirtualRealization::new(name, data))
}
