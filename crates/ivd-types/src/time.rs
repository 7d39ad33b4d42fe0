//! Timestamp helper shared by seals, timelines, and the overwrite log.

use chrono::Utc;

/// Current UTC time in nanoseconds since the Unix epoch.
///
/// Saturates at `u64::MAX` rather than panicking near the chrono range limit.
pub fn now_nanos() -> u64 {
    Utc::now()
        .timestamp_nanos_opt()
        .map(|n| n.max(0) as u64)
        .unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_monotone_enough() {
        let a = now_nanos();
        let b = now_nanos();
        assert!(b >= a);
        // Sanity: after 2020-01-01 in nanoseconds.
        assert!(a > 1_577_836_800_000_000_000);
    }
}
