//! Configuration loading and representation.
//!
//! Everything is read from the environment with production defaults; a malformed
//! value is an error rather than a silent fallback.

use std::net::SocketAddr;
use std::time::Duration;

use tracing::warn;

#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid value for {key}: {message}")]
pub struct ConfigError {
    pub key: String,
    pub message: String,
}

/// Reputation deltas and the score new participants start with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrustPolicy {
    pub initial: u8,
    pub on_approved: i32,
    pub on_cheated: i32,
}

impl Default for TrustPolicy {
    fn default() -> Self {
        Self { initial: 50, on_approved: 1, on_cheated: -10 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// Pause before reading the ledger in `confirm_create`, to let the chain settle.
    pub confirm_grace: Duration,
    /// Delay before the one-shot creation re-check scheduled by `prepare`.
    pub creation_recheck_delay: Duration,
    /// Attempts for picking an unused contract job id.
    pub id_allocation_attempts: u32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            confirm_grace: Duration::from_secs(2),
            creation_recheck_delay: Duration::from_secs(3 * 60),
            id_allocation_attempts: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub verification_timeout: Duration,
    /// Bounded hand-off queue between `submit` and the verification worker.
    pub queue_capacity: usize,
    pub max_concurrent_verifications: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            verification_timeout: Duration::from_secs(5 * 60),
            queue_capacity: 256,
            max_concurrent_verifications: 4,
        }
    }
}

/// Retry budgets and staleness windows of the repair sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerConfig {
    pub creation_max_retries: u32,
    pub creation_retry_interval: Duration,
    pub verification_max_retries: u32,
    pub verification_retry_interval: Duration,
    pub approval_max_retries: u32,
    pub approval_retry_interval: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            creation_max_retries: 2,
            creation_retry_interval: Duration::from_secs(3 * 60),
            verification_max_retries: 3,
            verification_retry_interval: Duration::from_secs(5 * 60),
            approval_max_retries: 3,
            approval_retry_interval: Duration::from_secs(3 * 60),
        }
    }
}

/// How often each periodic sweep runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub overdue_interval: Duration,
    pub creation_interval: Duration,
    pub verification_interval: Duration,
    pub approval_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            overdue_interval: Duration::from_secs(60),
            creation_interval: Duration::from_secs(3 * 60),
            verification_interval: Duration::from_secs(5 * 60),
            approval_interval: Duration::from_secs(3 * 60),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerSettings {
    pub rpc_url: Option<String>,
    pub contract_address: Option<String>,
    pub operator_key: Option<String>,
}

impl LedgerSettings {
    pub fn is_configured(&self) -> bool {
        self.rpc_url.is_some() && self.contract_address.is_some() && self.operator_key.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: crate::oracle::DEFAULT_MODEL.to_string(),
            base_url: crate::oracle::DEFAULT_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub default_filter: String,
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self { default_filter: "info".to_string(), format: LogFormat::Json }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub http_addr: SocketAddr,
    pub database_url: Option<String>,
    pub trust: TrustPolicy,
    pub lifecycle: LifecycleConfig,
    pub pipeline: PipelineConfig,
    pub reconciler: ReconcilerConfig,
    pub scheduler: SchedulerConfig,
    pub ledger: LedgerSettings,
    pub oracle: OracleSettings,
    pub log: LogSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            database_url: None,
            trust: TrustPolicy::default(),
            lifecycle: LifecycleConfig::default(),
            pipeline: PipelineConfig::default(),
            reconciler: ReconcilerConfig::default(),
            scheduler: SchedulerConfig::default(),
            ledger: LedgerSettings::default(),
            oracle: OracleSettings::default(),
            log: LogSettings::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (tests pass a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env { lookup: &lookup };
        let defaults = AppConfig::default();

        let trust = TrustPolicy {
            initial: env.parse("TRUST_INITIAL", defaults.trust.initial)?,
            on_approved: env.parse("TRUST_ON_APPROVED", defaults.trust.on_approved)?,
            on_cheated: env.parse("TRUST_ON_CHEATED", defaults.trust.on_cheated)?,
        };
        if trust.initial > 100 {
            return Err(ConfigError {
                key: "TRUST_INITIAL".into(),
                message: "must be between 0 and 100".into(),
            });
        }

        let config = AppConfig {
            http_addr: env.parse("HTTP_ADDR", defaults.http_addr)?,
            database_url: env.get("DATABASE_URL"),
            trust,
            lifecycle: LifecycleConfig {
                confirm_grace: env.secs("CONFIRM_GRACE_SECS", defaults.lifecycle.confirm_grace)?,
                creation_recheck_delay: env.secs(
                    "CREATION_RECHECK_DELAY_SECS",
                    defaults.lifecycle.creation_recheck_delay,
                )?,
                id_allocation_attempts: env
                    .parse("ID_ALLOCATION_ATTEMPTS", defaults.lifecycle.id_allocation_attempts)?,
            },
            pipeline: PipelineConfig {
                verification_timeout: env.secs(
                    "VERIFICATION_TIMEOUT_SECS",
                    defaults.pipeline.verification_timeout,
                )?,
                queue_capacity: env
                    .parse("VERIFICATION_QUEUE_CAPACITY", defaults.pipeline.queue_capacity)?
                    .max(1),
                max_concurrent_verifications: env
                    .parse(
                        "VERIFICATION_CONCURRENCY",
                        defaults.pipeline.max_concurrent_verifications,
                    )?
                    .max(1),
            },
            reconciler: ReconcilerConfig {
                creation_max_retries: env
                    .parse("CREATION_MAX_RETRIES", defaults.reconciler.creation_max_retries)?,
                creation_retry_interval: env.secs(
                    "CREATION_RETRY_INTERVAL_SECS",
                    defaults.reconciler.creation_retry_interval,
                )?,
                verification_max_retries: env.parse(
                    "VERIFICATION_MAX_RETRIES",
                    defaults.reconciler.verification_max_retries,
                )?,
                verification_retry_interval: env.secs(
                    "VERIFICATION_RETRY_INTERVAL_SECS",
                    defaults.reconciler.verification_retry_interval,
                )?,
                approval_max_retries: env
                    .parse("APPROVAL_MAX_RETRIES", defaults.reconciler.approval_max_retries)?,
                approval_retry_interval: env.secs(
                    "APPROVAL_RETRY_INTERVAL_SECS",
                    defaults.reconciler.approval_retry_interval,
                )?,
            },
            scheduler: SchedulerConfig {
                overdue_interval: env
                    .secs("OVERDUE_SWEEP_SECS", defaults.scheduler.overdue_interval)?,
                creation_interval: env
                    .secs("CREATION_SWEEP_SECS", defaults.scheduler.creation_interval)?,
                verification_interval: env
                    .secs("VERIFICATION_SWEEP_SECS", defaults.scheduler.verification_interval)?,
                approval_interval: env
                    .secs("APPROVAL_SWEEP_SECS", defaults.scheduler.approval_interval)?,
            },
            ledger: LedgerSettings {
                rpc_url: env.get("LEDGER_RPC_URL"),
                contract_address: env.get("LEDGER_CONTRACT_ADDRESS"),
                operator_key: env.get("LEDGER_OPERATOR_KEY"),
            },
            oracle: OracleSettings {
                api_key: env.get("GEMINI_API_KEY").unwrap_or_default(),
                model: env.get("GEMINI_MODEL").unwrap_or(defaults.oracle.model),
                base_url: env.get("GEMINI_BASE_URL").unwrap_or(defaults.oracle.base_url),
            },
            log: LogSettings {
                default_filter: env.get("LOG_DEFAULT_FILTER").unwrap_or(defaults.log.default_filter),
                format: match env.get("LOG_FORMAT").as_deref() {
                    None | Some("json") => LogFormat::Json,
                    Some("pretty") | Some("text") => LogFormat::Pretty,
                    Some(other) => {
                        return Err(ConfigError {
                            key: "LOG_FORMAT".into(),
                            message: format!("expected json or pretty, got '{other}'"),
                        });
                    }
                },
            },
        };

        if config.oracle.api_key.is_empty() {
            warn!("GEMINI_API_KEY is not set; verifications will stay pending until it is");
        }
        Ok(config)
    }
}

struct Env<'a, F: Fn(&str) -> Option<String>> {
    lookup: &'a F,
}

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    fn parse<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError {
                key: key.to_string(),
                message: e.to_string(),
            }),
        }
    }

    fn secs(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        self.parse(key, default.as_secs()).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn test_config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_match_production_constants() {
        let config = test_config(&[]).unwrap();
        assert_eq!(config.trust, TrustPolicy { initial: 50, on_approved: 1, on_cheated: -10 });
        assert_eq!(config.reconciler.creation_max_retries, 2);
        assert_eq!(config.reconciler.approval_max_retries, 3);
        assert_eq!(config.pipeline.verification_timeout, Duration::from_secs(300));
        assert_eq!(config.scheduler.overdue_interval, Duration::from_secs(60));
        assert!(config.database_url.is_none());
        assert!(!config.ledger.is_configured());
    }

    #[test]
    fn overrides_are_applied() {
        let config = test_config(&[
            ("APPROVAL_MAX_RETRIES", "5"),
            ("OVERDUE_SWEEP_SECS", "10"),
            ("LOG_FORMAT", "pretty"),
            ("DATABASE_URL", "postgres://localhost/gigs"),
        ])
        .unwrap();
        assert_eq!(config.reconciler.approval_max_retries, 5);
        assert_eq!(config.scheduler.overdue_interval, Duration::from_secs(10));
        assert_eq!(config.log.format, LogFormat::Pretty);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/gigs"));
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = test_config(&[("APPROVAL_MAX_RETRIES", "many")]).unwrap_err();
        assert_eq!(err.key, "APPROVAL_MAX_RETRIES");
        assert!(test_config(&[("TRUST_INITIAL", "150")]).is_err());
        assert!(test_config(&[("LOG_FORMAT", "xml")]).is_err());
    }
}
