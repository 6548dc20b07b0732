//! Rendering of DuckDB result values as display strings.

use duckdb::types::{TimeUnit, ValueRef};

/// Render one result value. NULL is rendered as `NULL`.
pub fn value_to_string(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Boolean(b) => b.to_string(),
        ValueRef::TinyInt(n) => n.to_string(),
        ValueRef::SmallInt(n) => n.to_string(),
        ValueRef::Int(n) => n.to_string(),
        ValueRef::BigInt(n) => n.to_string(),
        ValueRef::HugeInt(n) => n.to_string(),
        ValueRef::UTinyInt(n) => n.to_string(),
        ValueRef::USmallInt(n) => n.to_string(),
        ValueRef::UInt(n) => n.to_string(),
        ValueRef::UBigInt(n) => n.to_string(),
        ValueRef::Float(f) => f.to_string(),
        ValueRef::Double(f) => f.to_string(),
        ValueRef::Decimal(d) => d.to_string(),
        ValueRef::Text(s) => String::from_utf8_lossy(s).into_owned(),
        ValueRef::Blob(b) => format!("<blob {} bytes>", b.len()),
        ValueRef::Timestamp(unit, value) => format_timestamp(to_micros(unit, value)),
        ValueRef::Date32(days) => format_date(days),
        ValueRef::Time64(unit, value) => format_time(to_micros(unit, value)),
        other => format!("{:?}", other),
    }
}

fn to_micros(unit: TimeUnit, value: i64) -> i64 {
    match unit {
        TimeUnit::Second => value.saturating_mul(1_000_000),
        TimeUnit::Millisecond => value.saturating_mul(1_000),
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    }
}

/// Microseconds since the Unix epoch
fn format_timestamp(micros: i64) -> String {
    let secs = micros.div_euclid(1_000_000);
    let nanos = (micros.rem_euclid(1_000_000) * 1000) as u32;
    match chrono::DateTime::from_timestamp(secs, nanos) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => micros.to_string(),
    }
}

/// Days since 1970-01-01
fn format_date(days: i32) -> String {
    // 719163 days from 0001-01-01 to 1970-01-01
    match chrono::NaiveDate::from_num_days_from_ce_opt(719_163 + days) {
        Some(date) => date.format("%Y-%m-%d").to_string(),
        None => days.to_string(),
    }
}

/// Microseconds since midnight
fn format_time(micros: i64) -> String {
    let secs = (micros / 1_000_000) as u32;
    let nanos = ((micros % 1_000_000) * 1000) as u32;
    match chrono::NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos) {
        Some(time) => time.format("%H:%M:%S").to_string(),
        None => micros.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_values() {
        assert_eq!(value_to_string(ValueRef::Null), "NULL");
        assert_eq!(value_to_string(ValueRef::Int(42)), "42");
        assert_eq!(value_to_string(ValueRef::Boolean(true)), "true");
        assert_eq!(value_to_string(ValueRef::Text(b"hi")), "hi");
        assert_eq!(value_to_string(ValueRef::Blob(&[1, 2, 3])), "<blob 3 bytes>");
    }

    #[test]
    fn test_temporal_values() {
        assert_eq!(format_date(0), "1970-01-01");
        assert_eq!(format_date(19_723), "2024-01-01");
        assert_eq!(format_timestamp(1_704_067_200_000_000), "2024-01-01 00:00:00");
        assert_eq!(format_time(3_661_000_000), "01:01:01");
    }

    #[test]
    fn test_timestamp_units() {
        let expected = "2024-01-01 00:00:00";
        for (unit, value) in [
            (TimeUnit::Second, 1_704_067_200),
            (TimeUnit::Millisecond, 1_704_067_200_000),
            (TimeUnit::Microsecond, 1_704_067_200_000_000),
            (TimeUnit::Nanosecond, 1_704_067_200_000_000_000),
        ] {
            assert_eq!(value_to_string(ValueRef::Timestamp(unit, value)), expected);
        }
        assert_eq!(
            value_to_string(ValueRef::Time64(TimeUnit::Nanosecond, 3_661_000_000_000)),
            "01:01:01"
        );
    }
}
