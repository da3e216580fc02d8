use chrono::{DateTime, Duration, DurationRound, Utc};

/// Generates a random ID.
pub fn random_id() -> u32 {
    rand::random()
}

/// Truncates `at` to the start of its minute, so that ranges line up with candle boundaries.
pub fn floor_minute(at: DateTime<Utc>) -> DateTime<Utc> {
    at.duration_trunc(Duration::minutes(1)).unwrap_or(at)
}

/// `[now - days, now)` with both ends on minute boundaries.
pub fn last_days(now: DateTime<Utc>, days: i64) -> (DateTime<Utc>, DateTime<Utc>) {
    let end = floor_minute(now);
    (end - Duration::days(days), end)
}
