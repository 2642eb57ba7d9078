//! CSV ⇄ `Table`.
//!
//! Cells are text unless their column is listed as numeric: geography codes
//! and identifiers keep leading zeros. An empty cell is `Null` either way.
//! Writing renders `Null` as an empty field and preserves column order.

use std::path::Path;

use sp_core::{Table, Value};

use crate::canonical_json::atomic_write;
use crate::IoError;

fn csv_err(path: &Path, msg: impl ToString) -> IoError {
    IoError::Csv { path: path.display().to_string(), msg: msg.to_string() }
}

/// Read a headed CSV file; `numeric` columns parse as `Int`/`Float`.
pub fn read_table(path: &Path, numeric: &[String]) -> Result<Table, IoError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_path(path)
        .map_err(|e| csv_err(path, e))?;

    let names: Vec<String> = rdr.headers().map_err(|e| csv_err(path, e))?.iter().map(str::to_owned).collect();
    if let Some(missing) = numeric.iter().find(|c| !names.contains(c)) {
        return Err(csv_err(path, format!("numeric column {missing} not in header")));
    }
    let is_numeric: Vec<bool> = names.iter().map(|n| numeric.contains(n)).collect();

    let mut rows = Vec::new();
    for (line, rec) in rdr.records().enumerate() {
        let rec = rec.map_err(|e| csv_err(path, e))?;
        let row = rec
            .iter()
            .zip(names.iter().zip(&is_numeric))
            .map(|(raw, (name, &num))| {
                if num {
                    Value::parse_numeric(name, raw).map_err(|e| csv_err(path, format!("record {}: {e}", line + 1)))
                } else {
                    Ok(Value::parse_text(raw))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(row);
    }

    Table::from_rows(names, rows).map_err(|e| csv_err(path, e))
}

/// Render `table` as CSV bytes (header plus one record per row).
pub fn to_csv_bytes(table: &Table) -> Result<Vec<u8>, IoError> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(table.names()).map_err(|e| IoError::Csv { path: "<memory>".into(), msg: e.to_string() })?;
    for r in 0..table.n_rows() {
        wtr.write_record(table.row(r).map(|v| v.to_string()))
            .map_err(|e| IoError::Csv { path: "<memory>".into(), msg: e.to_string() })?;
    }
    wtr.into_inner().map_err(|e| IoError::Csv { path: "<memory>".into(), msg: e.to_string() })
}

/// Write `table` to `path` atomically; returns the bytes written.
pub fn write_table(path: &Path, table: &Table) -> Result<Vec<u8>, IoError> {
    let bytes = to_csv_bytes(table)?;
    atomic_write(path, &bytes)?;
    Ok(bytes)
}
