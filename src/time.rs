use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::DateTime;

/// Nanoseconds, either since the unix epoch or since the start of a session
pub type Nanos = i64;

pub const NANOS_PER_SEC: Nanos = 1_000_000_000;

/// Time since the unix epoch according to the system clock.
///
/// Clocks set before 1970 yield a negative value.
pub fn since_epoch() -> Nanos {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(since) => nanos_from(since),
        Err(before) => -nanos_from(before.duration()),
    }
}

fn nanos_from(duration: std::time::Duration) -> Nanos {
    Nanos::try_from(duration.as_nanos()).unwrap_or(Nanos::MAX)
}

static PROCESS_START: OnceLock<Nanos> = OnceLock::new();

/// The moment this process first asked for its start time.
///
/// Probes stamp this into every tick header they write so all tasks of one
/// process share a session start. Call it early (for example first thing in
/// `main`) if the value should be close to the real process start.
pub fn process_start_time() -> Nanos {
    *PROCESS_START.get_or_init(since_epoch)
}

/// Compact ISO 8601 form (`20240131T235959Z`), whole seconds in UTC.
///
/// Returns `None` if the instant lies outside what chrono can represent.
pub fn format_iso_timestamp(timestamp: Nanos) -> Option<String> {
    let secs = timestamp.div_euclid(NANOS_PER_SEC);
    let utc = DateTime::from_timestamp(secs, 0)?;
    Some(utc.format("%Y%m%dT%H%M%SZ").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_timestamp_truncates_to_seconds() {
        let ts = 1_706_745_599 * NANOS_PER_SEC + 999_999_999;
        assert_eq!(
            format_iso_timestamp(ts).as_deref(),
            Some("20240131T235959Z")
        );
    }

    #[test]
    fn iso_timestamp_of_epoch() {
        assert_eq!(format_iso_timestamp(0).as_deref(), Some("19700101T000000Z"));
    }

    #[test]
    fn process_start_is_stable() {
        let first = process_start_time();
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert_eq!(first, process_start_time());
        assert!(since_epoch() > first);
    }
}
