use std::time::Duration;

pub const DEFAULT_SLOW_CALL_MS: u64 = 2_000;

#[derive(Clone, Debug)]
pub struct SwapServiceConfig {
    /// Operations taking longer than this emit a `performance` warning.
    ///
    /// Env: `SWAP_SLOW_CALL_MS`.
    pub slow_call_threshold: Duration,

    /// One JSON object per log line instead of the pretty format.
    ///
    /// Env: `SWAP_LOG_JSON=true`, implied by `APP_ENV=production`.
    pub log_json: bool,
}

impl Default for SwapServiceConfig {
    fn default() -> Self {
        Self {
            slow_call_threshold: Duration::from_millis(DEFAULT_SLOW_CALL_MS),
            log_json: false,
        }
    }
}

impl SwapServiceConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Unset or malformed
    /// values fall back to defaults.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let slow_call_ms = get("SWAP_SLOW_CALL_MS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_SLOW_CALL_MS);

        let production = get("APP_ENV").is_some_and(|v| v.eq_ignore_ascii_case("production"));
        let log_json = get("SWAP_LOG_JSON")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(production);

        Self {
            slow_call_threshold: Duration::from_millis(slow_call_ms),
            log_json,
        }
    }
}
