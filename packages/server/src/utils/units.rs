const MIB: f64 = 1024.0 * 1024.0;
const GIB: f64 = MIB * 1024.0;

/// Bytes as mebibytes, rounded to two decimals.
pub fn bytes_to_mb(bytes: i64) -> f64 {
    (bytes as f64 / MIB * 100.0).round() / 100.0
}

/// Bytes as gibibytes, rounded to two decimals.
pub fn bytes_to_gb(bytes: i64) -> f64 {
    (bytes as f64 / GIB * 100.0).round() / 100.0
}

/// Share of `limit` used by `used`, as a percentage rounded to one decimal.
/// `None` when the limit is unlimited.
pub fn usage_percentage(used: i64, limit: Option<i64>) -> Option<f64> {
    match limit {
        Some(limit) if limit > 0 => Some((used as f64 / limit as f64 * 1000.0).round() / 10.0),
        Some(_) => Some(100.0),
        None => None,
    }
}
