//! Utility functions for the lobby warden

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique reconciliation run ID
pub fn generate_run_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Parse a comma separated list of values, skipping empty entries
pub fn parse_list<T>(raw: &str) -> std::result::Result<Vec<T>, T::Err>
where
    T: std::str::FromStr,
{
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}
