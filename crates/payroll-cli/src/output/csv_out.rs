use serde_json::Value;
use std::io;

use super::{cell, payload, DETAIL_KEYS};

/// Write output as CSV to stdout. A result with a detail array (e.g. an
/// amortization schedule) becomes one row per element; anything else a
/// two-column field/value listing.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    let _ = write_csv(&mut wtr, payload(value));
    let _ = wtr.flush();
}

fn write_csv<W: io::Write>(wtr: &mut csv::Writer<W>, value: &Value) -> csv::Result<()> {
    match value {
        Value::Object(map) => {
            let detail = DETAIL_KEYS
                .iter()
                .find_map(|k| map.get(*k).and_then(Value::as_array));
            match detail {
                Some(rows) => write_rows(wtr, rows),
                None => {
                    wtr.write_record(["field", "value"])?;
                    for (key, val) in map {
                        wtr.write_record([key.as_str(), &cell(val)])?;
                    }
                    Ok(())
                }
            }
        }
        Value::Array(rows) => write_rows(wtr, rows),
        other => wtr.write_record([cell(other)]),
    }
}

fn write_rows<W: io::Write>(wtr: &mut csv::Writer<W>, rows: &[Value]) -> csv::Result<()> {
    let Some(Value::Object(first)) = rows.first() else {
        for item in rows {
            wtr.write_record([cell(item)])?;
        }
        return Ok(());
    };

    let headers: Vec<&str> = first.keys().map(String::as_str).collect();
    wtr.write_record(&headers)?;
    for map in rows.iter().filter_map(Value::as_object) {
        let row: Vec<String> = headers
            .iter()
            .map(|h| map.get(*h).map(cell).unwrap_or_default())
            .collect();
        wtr.write_record(&row)?;
    }
    Ok(())
}
