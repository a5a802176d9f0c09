//! JSON and CSV export for a fully materialized [`Table`].

use std::io;

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::convenience::Table;
use crate::value::Value;

/// A serializable stand-in for [`Value`], since `Value` itself carries no
/// `serde` impls (the core decoder stays free of the export feature).
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum SerializableValue {
    /// `Value::Null`
    Null,
    /// `Value::Int64`
    Int64(i64),
    /// `Value::Float64`
    Float64(f64),
    /// `Value::Bool`
    Bool(bool),
    /// `Value::Text`
    Text(String),
    /// `Value::Bytes`/`Value::Blob`, base64-free: rendered as a byte array
    Bytes(Vec<u8>),
}

impl From<&Value> for SerializableValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => SerializableValue::Null,
            Value::Int64(n) => SerializableValue::Int64(*n),
            Value::Float64(n) => SerializableValue::Float64(*n),
            Value::Bool(b) => SerializableValue::Bool(*b),
            Value::Date(days) => SerializableValue::Int64(*days),
            Value::Timestamp(secs) => SerializableValue::Int64(*secs),
            Value::TimeOfDay(secs) => SerializableValue::Float64(*secs),
            Value::Text(s) => SerializableValue::Text(s.clone()),
            Value::Bytes(b) => SerializableValue::Bytes(b.clone()),
        }
    }
}

/// Export every record of `table` as a JSON array of field-name-keyed objects.
#[cfg(feature = "serde")]
pub fn export_to_json<W: io::Write>(table: &Table, writer: W) -> Result<(), io::Error> {
    use std::collections::HashMap;

    let field_names: Vec<&str> = table.metadata.fields.iter().map(|f| f.name.as_str()).collect();

    let mut rows = Vec::with_capacity(table.records.len());
    for record in &table.records {
        let mut row = HashMap::with_capacity(field_names.len());
        for (name, value) in field_names.iter().zip(record.values().iter()) {
            row.insert(name.to_string(), SerializableValue::from(value));
        }
        rows.push(row);
    }

    serde_json::to_writer_pretty(writer, &rows).map_err(io::Error::other)
}

/// Export every record of `table` as CSV, one column per field.
#[cfg(feature = "csv_export")]
pub fn export_to_csv<W: io::Write>(table: &Table, writer: W) -> Result<(), io::Error> {
    let field_names: Vec<&str> = table.metadata.fields.iter().map(|f| f.name.as_str()).collect();

    let mut csv_writer = csv::WriterBuilder::new().has_headers(true).from_writer(writer);
    csv_writer.write_record(&field_names)?;

    for record in &table.records {
        let row: Vec<String> = record.values().iter().map(|v| v.to_string()).collect();
        csv_writer.write_record(&row)?;
    }

    csv_writer.flush()
}
