//! Engine configuration: integer env keys with component defaults.

use std::time::Duration;

/// Tunables for the trend engine and its collaborators.
///
/// Built once and passed at construction; there is no dynamic reloading.
/// The rate-limit pair is carried for the HTTP framing layer in front of
/// the engine, which owns enforcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub fresh_ttl_secs: u64,
    pub stale_ttl_secs: u64,
    pub max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub blocked_penalty_ms: u64,
    pub request_delay_ms: u64,
    pub gate_permits: usize,
    pub rate_limit_window_secs: u64,
    pub rate_limit_max_requests: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fresh_ttl_secs: 86_400,
            stale_ttl_secs: 172_800,
            max_attempts: 3,
            retry_base_delay_ms: 5_000,
            blocked_penalty_ms: 3_000,
            request_delay_ms: 4_000,
            gate_permits: 1,
            rate_limit_window_secs: 60,
            rate_limit_max_requests: 10,
        }
    }
}

impl EngineConfig {
    /// Read the recognized environment keys, falling back to defaults.
    ///
    /// An unparseable value logs a warning and keeps the default rather
    /// than failing startup.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            fresh_ttl_secs: env_u64("TREND_CACHE_FRESH_TTL_SECS", defaults.fresh_ttl_secs),
            stale_ttl_secs: env_u64("TREND_CACHE_STALE_TTL_SECS", defaults.stale_ttl_secs),
            max_attempts: env_u32("TREND_RETRY_MAX_ATTEMPTS", defaults.max_attempts),
            retry_base_delay_ms: env_u64("TREND_RETRY_BASE_DELAY_MS", defaults.retry_base_delay_ms),
            blocked_penalty_ms: env_u64(
                "TREND_RETRY_BLOCKED_PENALTY_MS",
                defaults.blocked_penalty_ms,
            ),
            request_delay_ms: env_u64("TREND_REQUEST_DELAY_MS", defaults.request_delay_ms),
            gate_permits: env_u64("TREND_GATE_PERMITS", defaults.gate_permits as u64).max(1)
                as usize,
            rate_limit_window_secs: env_u64(
                "TREND_RATE_LIMIT_WINDOW_SECS",
                defaults.rate_limit_window_secs,
            ),
            rate_limit_max_requests: env_u32(
                "TREND_RATE_LIMIT_MAX_REQUESTS",
                defaults.rate_limit_max_requests,
            ),
        }
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn blocked_penalty(&self) -> Duration {
        Duration::from_millis(self.blocked_penalty_ms)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, default, "unparseable config value, using default");
            default
        }),
        Err(_) => default,
    }
}

fn env_u32(key: &str, default: u32) -> u32 {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, default, "unparseable config value, using default");
            default
        }),
        Err(_) => default,
    }
}
