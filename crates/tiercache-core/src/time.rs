use time::OffsetDateTime;

/// Current wall-clock time in milliseconds since the Unix epoch.
///
/// Used for expiries that are persisted and compared across processes, so it
/// must not come from a monotonic clock.
pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_millis_is_recent() {
        // 2020-01-01T00:00:00Z
        assert!(now_millis() > 1_577_836_800_000);
    }
}
