use chrono::{DateTime, Utc};

/// Format a DateTime to a human-readable string
pub fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Format an optional timestamp, using a dash when absent
pub fn format_optional_datetime(dt: Option<DateTime<Utc>>) -> String {
    dt.map(format_datetime).unwrap_or_else(|| "-".to_string())
}

/// Format a millisecond duration in human-readable form
pub fn format_duration_ms(ms: Option<i64>) -> String {
    match ms {
        None => "-".to_string(),
        Some(ms) if ms < 1_000 => format!("{ms}ms"),
        Some(ms) if ms < 60_000 => format!("{:.1}s", ms as f64 / 1_000.0),
        Some(ms) => format!("{}m {}s", ms / 60_000, (ms % 60_000) / 1_000),
    }
}
