//! # Environment Configuration
//!
//! Loads the toggles in spec §6.1 from the process environment. Follows the
//! parent stack's config-loading convention: parse what's there, fall back to
//! a typed default and log a warning on anything malformed — configuration
//! errors never panic the process.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which task source(s) the reconciliation loop polls each tick (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    Internal,
    Flex,
    Auto,
}

impl FromStr for SourceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "internal" => Ok(Self::Internal),
            "flex" => Ok(Self::Flex),
            "auto" => Ok(Self::Auto),
            other => Err(format!("unrecognized TASKS_AUTO_SOURCE value: {other}")),
        }
    }
}

impl Default for SourceMode {
    fn default() -> Self {
        Self::Auto
    }
}

/// Orchestrator configuration, resolved once at startup from the
/// environment. Cheap to clone; held by the dispatcher and handed to each
/// pipeline invocation.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// `TASKS_AUTO_ENABLED` — master toggle for the reconciliation loop.
    pub auto_enabled: bool,
    /// `TASKS_AUTO_POLL_INTERVAL_MS` — tick period.
    pub poll_interval: Duration,
    /// `TASKS_AUTO_BATCH_SIZE` — internal tasks fetched per tick.
    pub batch_size: u32,
    /// `TASKS_AUTO_SOURCE` — internal | flex | auto.
    pub source_mode: SourceMode,
    /// `TASKS_FLEX_POLL_LIMIT` — provider tasks fetched per tick.
    pub flex_poll_limit: u32,
    /// `TASKS_FLEX_CLOSE_CONVERSATION` — close the conversation on inactivity.
    pub flex_close_conversation: bool,
    /// `TASKS_FLEX_COMPLETE_TASK` — complete the provider task on inactivity.
    pub flex_complete_task: bool,
    /// `TASKS_AUTOMATION_AUTHOR` — author string for automation-originated
    /// messages when no worker identity resolves. Not used for greetings in
    /// the flex path (those always require a resolved worker identity).
    pub automation_author: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            auto_enabled: true,
            poll_interval: Duration::from_millis(1000),
            batch_size: 100,
            source_mode: SourceMode::Auto,
            flex_poll_limit: 50,
            flex_close_conversation: true,
            flex_complete_task: true,
            automation_author: "System".to_string(),
        }
    }
}

impl OrchestratorConfig {
    /// Load from environment variables, falling back field-by-field to the
    /// default on anything missing or malformed.
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            auto_enabled: env_bool("TASKS_AUTO_ENABLED", default.auto_enabled),
            poll_interval: env_millis("TASKS_AUTO_POLL_INTERVAL_MS", default.poll_interval),
            batch_size: env_u32("TASKS_AUTO_BATCH_SIZE", default.batch_size),
            source_mode: env_source_mode("TASKS_AUTO_SOURCE", default.source_mode),
            flex_poll_limit: env_u32("TASKS_FLEX_POLL_LIMIT", default.flex_poll_limit),
            flex_close_conversation: env_bool(
                "TASKS_FLEX_CLOSE_CONVERSATION",
                default.flex_close_conversation,
            ),
            flex_complete_task: env_bool("TASKS_FLEX_COMPLETE_TASK", default.flex_complete_task),
            automation_author: std::env::var("TASKS_AUTOMATION_AUTHOR")
                .unwrap_or(default.automation_author),
        }
    }
}

/// `TASKS_AUTO_ENABLED` and friends default to `true` unless the literal
/// string `"false"` is present — matches spec §6.1 precisely (any other
/// value, including garbage, is truthy).
fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => v.to_ascii_lowercase() != "false",
        Err(_) => default,
    }
}

fn env_u32(key: &str, default: u32) -> u32 {
    match std::env::var(key) {
        Ok(v) => v.parse().unwrap_or_else(|e| {
            tracing::warn!(key, value = %v, error = %e, "invalid env var, using default");
            default
        }),
        Err(_) => default,
    }
}

fn env_millis(key: &str, default: Duration) -> Duration {
    match std::env::var(key) {
        Ok(v) => match v.parse::<u64>() {
            Ok(ms) => Duration::from_millis(ms),
            Err(e) => {
                tracing::warn!(key, value = %v, error = %e, "invalid env var, using default");
                default
            }
        },
        Err(_) => default,
    }
}

fn env_source_mode(key: &str, default: SourceMode) -> SourceMode {
    match std::env::var(key) {
        Ok(v) => v.parse().unwrap_or_else(|e| {
            tracing::warn!(key, value = %v, error = %e, "invalid env var, using default");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variable mutation is process-global; serialize these tests.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn with_env<F: FnOnce()>(vars: &[(&str, &str)], f: F) {
        let _guard = ENV_LOCK.lock().unwrap();
        for (k, v) in vars {
            std::env::set_var(k, v);
        }
        f();
        for (k, _) in vars {
            std::env::remove_var(k);
        }
    }

    #[test]
    fn defaults_match_spec() {
        let config = OrchestratorConfig::default();
        assert!(config.auto_enabled);
        assert_eq!(config.poll_interval, Duration::from_millis(1000));
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.source_mode, SourceMode::Auto);
        assert_eq!(config.flex_poll_limit, 50);
        assert!(config.flex_close_conversation);
        assert!(config.flex_complete_task);
        assert_eq!(config.automation_author, "System");
    }

    #[test]
    fn auto_enabled_false_only_on_literal_false() {
        with_env(&[("TASKS_AUTO_ENABLED", "false")], || {
            assert!(!OrchestratorConfig::from_env().auto_enabled);
        });
        with_env(&[("TASKS_AUTO_ENABLED", "FALSE")], || {
            assert!(!OrchestratorConfig::from_env().auto_enabled);
        });
        with_env(&[("TASKS_AUTO_ENABLED", "nope")], || {
            assert!(OrchestratorConfig::from_env().auto_enabled);
        });
    }

    #[test]
    fn source_mode_parses_case_insensitively() {
        with_env(&[("TASKS_AUTO_SOURCE", "FLEX")], || {
            assert_eq!(OrchestratorConfig::from_env().source_mode, SourceMode::Flex);
        });
        with_env(&[("TASKS_AUTO_SOURCE", "internal")], || {
            assert_eq!(
                OrchestratorConfig::from_env().source_mode,
                SourceMode::Internal
            );
        });
    }

    #[test]
    fn malformed_source_mode_falls_back_to_default() {
        with_env(&[("TASKS_AUTO_SOURCE", "bogus")], || {
            assert_eq!(OrchestratorConfig::from_env().source_mode, SourceMode::Auto);
        });
    }

    #[test]
    fn malformed_numeric_falls_back_to_default() {
        with_env(&[("TASKS_AUTO_BATCH_SIZE", "not-a-number")], || {
            assert_eq!(OrchestratorConfig::from_env().batch_size, 100);
        });
    }

    #[test]
    fn poll_interval_reads_milliseconds() {
        with_env(&[("TASKS_AUTO_POLL_INTERVAL_MS", "2500")], || {
            assert_eq!(
                OrchestratorConfig::from_env().poll_interval,
                Duration::from_millis(2500)
            );
        });
    }
}
