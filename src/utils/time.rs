//! Time and timestamp utilities

use chrono::{DateTime, Utc};

/// Layout of the `server_time` stamp, e.g. `2024-03-01 12:30:05.000123`
pub const SERVER_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Format a UTC instant as a `server_time` stamp
pub fn format_server_time(at: DateTime<Utc>) -> String {
    at.format(SERVER_TIME_FORMAT).to_string()
}

/// The current UTC time as a `server_time` stamp
pub fn server_time() -> String {
    format_server_time(Utc::now())
}
