//! Timestamp helpers. Native-only — this crate has no WASM target.

/// Current time as Unix milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_millis_is_in_a_sane_range() {
        let ts = now_millis();
        // 2020-01-01T00:00:00Z
        assert!(ts > 1_577_836_800_000);
    }
}
