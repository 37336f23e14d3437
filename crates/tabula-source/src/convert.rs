//! Conversions between Tabula values and SQLite storage classes.

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::{Value as SqlValue, ValueRef};

use tabula_core::types::{DataType, Value, DATE_FORMAT, TIMESTAMP_FORMAT};

/// Timestamp layouts accepted when reading `TIMESTAMP`/`DATETIME` text.
const TIMESTAMP_INPUT_FORMATS: &[&str] = &[TIMESTAMP_FORMAT, "%Y-%m-%dT%H:%M:%S%.f"];

/// Convert a stored SQLite value into a [`Value`], guided by the column's
/// declared type when one is known.
pub fn from_sql(raw: ValueRef<'_>, declared: Option<DataType>) -> Value {
    match raw {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => match declared {
            Some(DataType::Boolean) => Value::Boolean(i != 0),
            Some(DataType::Float) => Value::Float(i as f64),
            _ => Value::Integer(i),
        },
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes).into_owned();
            match declared {
                Some(DataType::Date) => parse_date(&text)
                    .map(Value::Date)
                    .unwrap_or(Value::Text(text)),
                Some(DataType::Timestamp) => parse_timestamp(&text)
                    .map(Value::Timestamp)
                    .unwrap_or(Value::Text(text)),
                _ => Value::Text(text),
            }
        }
        ValueRef::Blob(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
    }
}

/// Convert a [`Value`] into a SQLite parameter.
///
/// Booleans are stored as 0/1 and temporal values as ISO-8601 text, which
/// keeps them usable with SQLite's date functions.
pub fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::Boolean(b) => SqlValue::Integer(i64::from(*b)),
        Value::Date(d) => SqlValue::Text(d.format(DATE_FORMAT).to_string()),
        Value::Timestamp(ts) => SqlValue::Text(ts.format(TIMESTAMP_FORMAT).to_string()),
        Value::Text(s) => SqlValue::Text(s.clone()),
    }
}

/// Guess a column type from its values when SQLite reports no declared type
/// (expressions, aggregates).
pub fn infer_type<'a>(values: impl IntoIterator<Item = &'a Value>) -> DataType {
    values
        .into_iter()
        .find(|v| !v.is_null())
        .map(|v| match v {
            Value::Integer(_) => DataType::Integer,
            Value::Float(_) => DataType::Float,
            Value::Boolean(_) => DataType::Boolean,
            Value::Date(_) => DataType::Date,
            Value::Timestamp(_) => DataType::Timestamp,
            _ => DataType::Text,
        })
        .unwrap_or(DataType::Text)
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, DATE_FORMAT).ok()
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| parse_date(text).and_then(|d| d.and_hms_opt(0, 0, 0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_with_boolean_declared_type() {
        assert_eq!(
            from_sql(ValueRef::Integer(1), Some(DataType::Boolean)),
            Value::Boolean(true)
        );
        assert_eq!(
            from_sql(ValueRef::Integer(0), Some(DataType::Boolean)),
            Value::Boolean(false)
        );
    }

    #[test]
    fn test_integer_with_float_declared_type() {
        assert_eq!(
            from_sql(ValueRef::Integer(3), Some(DataType::Float)),
            Value::Float(3.0)
        );
    }

    #[test]
    fn test_text_with_date_declared_type() {
        let v = from_sql(ValueRef::Text(b"1912-04-15"), Some(DataType::Date));
        assert_eq!(
            v,
            Value::Date(NaiveDate::from_ymd_opt(1912, 4, 15).unwrap())
        );
    }

    #[test]
    fn test_unparseable_date_stays_text() {
        let v = from_sql(ValueRef::Text(b"April 15"), Some(DataType::Date));
        assert_eq!(v, Value::Text("April 15".to_string()));
    }

    #[test]
    fn test_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        for raw in ["2024-01-02 03:04:05", "2024-01-02T03:04:05", "2024-01-02 03:04:05.000"] {
            assert_eq!(
                from_sql(ValueRef::Text(raw.as_bytes()), Some(DataType::Timestamp)),
                Value::Timestamp(expected),
                "{raw}"
            );
        }
    }

    #[test]
    fn test_timestamp_from_bare_date() {
        let v = from_sql(ValueRef::Text(b"2024-01-02"), Some(DataType::Timestamp));
        assert!(matches!(v, Value::Timestamp(_)));
    }

    #[test]
    fn test_to_sql_storage_classes() {
        assert_eq!(to_sql(&Value::Boolean(true)), SqlValue::Integer(1));
        assert_eq!(to_sql(&Value::Null), SqlValue::Null);
        let d = NaiveDate::from_ymd_opt(2020, 2, 29).unwrap();
        assert_eq!(
            to_sql(&Value::Date(d)),
            SqlValue::Text("2020-02-29".to_string())
        );
    }

    #[test]
    fn test_temporal_values_survive_storage() {
        let ts = NaiveDate::from_ymd_opt(2020, 2, 29)
            .unwrap()
            .and_hms_milli_opt(12, 30, 0, 250)
            .unwrap();
        let stored = match to_sql(&Value::Timestamp(ts)) {
            SqlValue::Text(s) => s,
            other => panic!("unexpected storage class: {other:?}"),
        };
        let read = from_sql(ValueRef::Text(stored.as_bytes()), Some(DataType::Timestamp));
        assert_eq!(read, Value::Timestamp(ts));
    }

    #[test]
    fn test_infer_type_skips_nulls() {
        let values = [Value::Null, Value::Float(1.5)];
        assert_eq!(infer_type(values.iter()), DataType::Float);
        assert_eq!(infer_type([Value::Null].iter()), DataType::Text);
        assert_eq!(infer_type(std::iter::empty()), DataType::Text);
    }
}
