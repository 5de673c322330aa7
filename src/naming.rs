//! Unique upload names built from the original filename and a timestamp.

use time::macros::format_description;
use time::OffsetDateTime;

/// Compact `YYYYMMDD_HHMMSS` form of `now`.
pub fn timestamp(now: OffsetDateTime) -> String {
    let format = format_description!("[year][month][day]_[hour][minute][second]");
    now.format(format).unwrap_or_else(|_| now.unix_timestamp().to_string())
}

/// Insert a timestamp before the final extension of `original`.
///
/// A name whose only dot is the leading one (`.env`) has no extension, so the
/// timestamp goes at the end.
pub fn mint(original: &str, now: OffsetDateTime) -> String {
    let ts = timestamp(now);
    match original.rfind('.') {
        Some(k) if k > 0 => format!("{}_{}{}", &original[..k], ts, &original[k..]),
        _ => format!("{}_{}", original, ts),
    }
}
