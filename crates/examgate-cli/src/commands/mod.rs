pub mod check;
pub mod grade;
pub mod init;
pub mod validate;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

/// Parse an optional `--at` RFC 3339 timestamp, defaulting to now.
pub fn parse_at(at: Option<&str>) -> Result<DateTime<Utc>> {
    match at {
        Some(s) => Ok(DateTime::parse_from_rfc3339(s)
            .with_context(|| format!("invalid --at timestamp '{s}', expected RFC 3339"))?
            .with_timezone(&Utc)),
        None => Ok(Utc::now()),
    }
}
