//! Conversion of PostgreSQL result rows into [`SourceRow`]s.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{Map, Number, Value};
use sync_core::{Origin, SourceRow, SyncError};
use tokio_postgres::types::{FromSql, Type};
use tokio_postgres::Row;

/// Column every change query must return.
pub const MODIFIED_COLUMN: &str = "modified";

/// Convert one change-query row, lifting `modified` out of the columns.
pub fn to_source_row(row: &Row) -> Result<SourceRow, SyncError> {
    let mut modified = None;
    let mut columns = Map::new();

    for (index, column) in row.columns().iter().enumerate() {
        if column.name() == MODIFIED_COLUMN {
            modified = read_modified(row, index)?;
            continue;
        }
        let value = convert_postgres_value(row, index)?;
        columns.insert(column.name().to_string(), value);
    }

    let modified = modified.ok_or_else(|| {
        SyncError::integrity(
            Origin::Source,
            format!("Change row has no non-null '{MODIFIED_COLUMN}' column"),
        )
    })?;

    Ok(SourceRow { modified, columns })
}

/// Read a `modified`-style timestamp column. Naive timestamps are taken as UTC.
pub fn read_modified(row: &Row, index: usize) -> Result<Option<DateTime<Utc>>, SyncError> {
    let column = &row.columns()[index];
    match *column.type_() {
        Type::TIMESTAMPTZ => get::<Option<DateTime<Utc>>>(row, index),
        Type::TIMESTAMP => Ok(get::<Option<NaiveDateTime>>(row, index)?
            .map(|ts| DateTime::<Utc>::from_naive_utc_and_offset(ts, Utc))),
        ref other => Err(SyncError::integrity(
            Origin::Source,
            format!(
                "Column '{}' has type {other}, expected a timestamp",
                column.name()
            ),
        )),
    }
}

/// Convert a PostgreSQL value to a JSON value
fn convert_postgres_value(row: &Row, index: usize) -> Result<Value, SyncError> {
    let column = &row.columns()[index];

    match *column.type_() {
        Type::BOOL => Ok(get::<Option<bool>>(row, index)?.map_or(Value::Null, Value::Bool)),
        Type::INT2 => Ok(get::<Option<i16>>(row, index)?.map_or(Value::Null, Value::from)),
        Type::INT4 => Ok(get::<Option<i32>>(row, index)?.map_or(Value::Null, Value::from)),
        Type::INT8 => Ok(get::<Option<i64>>(row, index)?.map_or(Value::Null, Value::from)),
        Type::FLOAT4 => match get::<Option<f32>>(row, index)? {
            Some(f) => float_to_json(column.name(), f as f64),
            None => Ok(Value::Null),
        },
        Type::FLOAT8 => match get::<Option<f64>>(row, index)? {
            Some(f) => float_to_json(column.name(), f),
            None => Ok(Value::Null),
        },
        Type::NUMERIC => match get::<Option<Decimal>>(row, index)? {
            Some(decimal) => match decimal.to_f64() {
                Some(f) => float_to_json(column.name(), f),
                None => Err(SyncError::integrity(
                    Origin::Source,
                    format!(
                        "NUMERIC value {decimal} in column '{}' does not fit a float",
                        column.name()
                    ),
                )),
            },
            None => Ok(Value::Null),
        },
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => {
            Ok(get::<Option<String>>(row, index)?.map_or(Value::Null, Value::String))
        }
        Type::UUID => Ok(get::<Option<uuid::Uuid>>(row, index)?
            .map_or(Value::Null, |id| Value::String(id.to_string()))),
        Type::TIMESTAMP | Type::TIMESTAMPTZ => Ok(read_modified(row, index)?
            .map_or(Value::Null, |ts| {
                Value::String(ts.to_rfc3339_opts(SecondsFormat::Micros, false))
            })),
        Type::DATE => Ok(get::<Option<NaiveDate>>(row, index)?
            .map_or(Value::Null, |date| Value::String(date.to_string()))),
        Type::JSON | Type::JSONB => {
            Ok(get::<Option<Value>>(row, index)?.unwrap_or(Value::Null))
        }
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY => {
            match get::<Option<Vec<Option<String>>>>(row, index)? {
                Some(items) => Ok(Value::Array(
                    items
                        .into_iter()
                        .map(|item| item.map_or(Value::Null, Value::String))
                        .collect(),
                )),
                None => Ok(Value::Null),
            }
        }
        Type::UUID_ARRAY => match get::<Option<Vec<Option<uuid::Uuid>>>>(row, index)? {
            Some(items) => Ok(Value::Array(
                items
                    .into_iter()
                    .map(|item| item.map_or(Value::Null, |id| Value::String(id.to_string())))
                    .collect(),
            )),
            None => Ok(Value::Null),
        },
        ref other => Err(SyncError::integrity(
            Origin::Source,
            format!(
                "Unsupported PostgreSQL type {other} in column '{}'",
                column.name()
            ),
        )),
    }
}

fn get<'a, T: FromSql<'a>>(row: &'a Row, index: usize) -> Result<T, SyncError> {
    row.try_get::<_, T>(index)
        .map_err(|e| SyncError::integrity(Origin::Source, e))
}

fn float_to_json(column: &str, f: f64) -> Result<Value, SyncError> {
    Number::from_f64(f).map(Value::Number).ok_or_else(|| {
        SyncError::integrity(
            Origin::Source,
            format!("Non-finite float {f} in column '{column}'"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_core::ErrorKind;

    #[test]
    fn test_float_to_json() {
        assert_eq!(float_to_json("rating", 8.5).unwrap(), serde_json::json!(8.5));
    }

    #[test]
    fn test_non_finite_float_is_rejected() {
        let err = float_to_json("rating", f64::NAN).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataIntegrity);
        assert!(err.to_string().contains("'rating'"));
    }
}
