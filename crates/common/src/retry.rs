use std::time::Duration;

/// Cap on any single backoff step.
const MAX_BACKOFF_MS: u64 = 60_000;

/// Exponential backoff delay for the given zero-based attempt number.
pub fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    let ms = base_ms.saturating_mul(factor).min(MAX_BACKOFF_MS);
    Duration::from_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_per_attempt() {
        assert_eq!(backoff_delay(500, 0), Duration::from_millis(500));
        assert_eq!(backoff_delay(500, 1), Duration::from_millis(1_000));
        assert_eq!(backoff_delay(500, 2), Duration::from_millis(2_000));
    }

    #[test]
    fn saturates_at_cap() {
        assert_eq!(backoff_delay(500, 40), Duration::from_millis(MAX_BACKOFF_MS));
        assert_eq!(backoff_delay(500, 255), Duration::from_millis(MAX_BACKOFF_MS));
    }
}
