//! Runtime configuration for the gateway, loaded from environment variables
//! with typed defaults. Mirrors the env-var-driven half of
//! `codex_core::config::Config::load_with_cli_overrides`: the process
//! environment supplies the base, and a caller (the `gateway-cli` binary)
//! may layer explicit overrides on top before constructing a provider
//! gateway or playbook executor.

use std::time::Duration;

use crate::policy::SecurityMode;

const DEFAULT_MAX_WALL_CLOCK_SECS: u64 = 30;
const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;
const DEFAULT_MAX_CONCURRENT_PLAYBOOKS: usize = 16;
const DEFAULT_MAX_CONCURRENT_CHILDREN: usize = 64;

/// Process-wide limits and policy knobs. Constructed once and shared
/// read-only for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub security_mode: SecurityMode,
    pub max_wall_clock: Duration,
    pub max_output_bytes: usize,
    pub max_concurrent_playbooks: usize,
    pub max_concurrent_children: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            security_mode: SecurityMode::Strict,
            max_wall_clock: Duration::from_secs(DEFAULT_MAX_WALL_CLOCK_SECS),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            max_concurrent_playbooks: DEFAULT_MAX_CONCURRENT_PLAYBOOKS,
            max_concurrent_children: DEFAULT_MAX_CONCURRENT_CHILDREN,
        }
    }
}

/// Overrides a caller may supply on top of the environment, e.g. CLI flags
/// parsed by `gateway-cli`. `None` fields fall back to env/default.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub security_mode: Option<SecurityMode>,
    pub max_wall_clock_secs: Option<u64>,
    pub max_output_bytes: Option<usize>,
    pub max_concurrent_playbooks: Option<usize>,
    pub max_concurrent_children: Option<usize>,
}

impl GatewayConfig {
    /// Loads configuration from the process environment, then applies
    /// `overrides` on top. Unrecognized or malformed env values fall back
    /// to the default rather than erroring, since these are soft runtime
    /// limits, not user-facing request data.
    pub fn load_with_overrides(overrides: ConfigOverrides) -> Self {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("SECURITY_MODE") {
            if let Some(mode) = SecurityMode::parse(&raw) {
                config.security_mode = mode;
            } else {
                tracing::warn!(value = %raw, "ignoring unrecognized SECURITY_MODE");
            }
        }
        if let Some(secs) = env_u64("MAX_WALL_CLOCK_SECS") {
            config.max_wall_clock = Duration::from_secs(secs);
        }
        if let Some(bytes) = env_usize("MAX_OUTPUT_BYTES") {
            config.max_output_bytes = bytes;
        }
        if let Some(n) = env_usize("MAX_CONCURRENT_PLAYBOOKS") {
            config.max_concurrent_playbooks = n;
        }
        if let Some(n) = env_usize("MAX_CONCURRENT_CHILDREN") {
            config.max_concurrent_children = n;
        }

        if let Some(mode) = overrides.security_mode {
            config.security_mode = mode;
        }
        if let Some(secs) = overrides.max_wall_clock_secs {
            config.max_wall_clock = Duration::from_secs(secs);
        }
        if let Some(bytes) = overrides.max_output_bytes {
            config.max_output_bytes = bytes;
        }
        if let Some(n) = overrides.max_concurrent_playbooks {
            config.max_concurrent_playbooks = n;
        }
        if let Some(n) = overrides.max_concurrent_children {
            config.max_concurrent_children = n;
        }

        config
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|raw| match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(%key, value = %raw, "ignoring malformed integer env var");
            None
        }
    })
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|raw| match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(%key, value = %raw, "ignoring malformed integer env var");
            None
        }
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = GatewayConfig::default();
        assert_eq!(config.max_wall_clock, Duration::from_secs(30));
        assert_eq!(config.max_output_bytes, 1024 * 1024);
        assert_eq!(config.security_mode, SecurityMode::Strict);
    }

    #[test]
    fn overrides_win_over_default() {
        let config = GatewayConfig::load_with_overrides(ConfigOverrides {
            max_wall_clock_secs: Some(5),
            ..Default::default()
        });
        assert_eq!(config.max_wall_clock, Duration::from_secs(5));
    }
}
