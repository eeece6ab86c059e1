//! Windows FILETIME conversion.
//!
//! Active Directory timestamps (`pwdLastSet`, `lastLogonTimestamp`,
//! `accountExpires`, `lockoutTime`) count 100-nanosecond intervals since
//! 1601-01-01 UTC. `0` and `i64::MAX` both mean "not set" / "never".

use chrono::{DateTime, Utc};
use ic_directory::{DirectoryError, DirectoryResult};

/// 100ns intervals between 1601-01-01 and 1970-01-01.
const UNIX_EPOCH_OFFSET: i64 = 116_444_736_000_000_000;

const TICKS_PER_SECOND: i64 = 10_000_000;

/// Value meaning "never" (for example an account that never expires).
pub const NEVER: i64 = i64::MAX;

/// Converts a FILETIME value. Returns `None` for unset and "never" values.
#[must_use]
pub fn from_filetime(value: i64) -> Option<DateTime<Utc>> {
    if value <= 0 || value == NEVER {
        return None;
    }
    let since_unix = value - UNIX_EPOCH_OFFSET;
    let nanos = u32::try_from(since_unix.rem_euclid(TICKS_PER_SECOND) * 100).ok()?;
    DateTime::from_timestamp(since_unix.div_euclid(TICKS_PER_SECOND), nanos)
}

/// Converts a timestamp to FILETIME, truncated to 100ns.
#[must_use]
pub fn to_filetime(time: DateTime<Utc>) -> i64 {
    time.timestamp() * TICKS_PER_SECOND
        + i64::from(time.timestamp_subsec_nanos() / 100)
        + UNIX_EPOCH_OFFSET
}

/// Parses the raw attribute text of a FILETIME.
pub fn parse_filetime(attribute: &str, value: &str) -> DirectoryResult<Option<DateTime<Utc>>> {
    value
        .trim()
        .parse::<i64>()
        .map(from_filetime)
        .map_err(|_| DirectoryError::mapping(format!("{attribute} is not a timestamp: '{value}'")))
}
