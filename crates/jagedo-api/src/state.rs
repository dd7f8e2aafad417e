//! # Application State
//!
//! Shared state for the Axum application: the lifecycle engine, the
//! in-memory event window behind `/v1/events`, the metrics registry, and
//! the configuration they were built from.

use std::sync::Arc;

use jagedo_core::Rate;
use jagedo_lifecycle::{EventSink, FanOutSink, InMemorySink, LifecycleEngine, TracingSink};
use jagedo_settlement::DiscountPolicy;
use thiserror::Error;

use crate::middleware::metrics::ApiMetrics;

// ── Configuration ───────────────────────────────────────────────────────

/// Log line format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::Invalid {
                key: "LOG_FORMAT",
                value: s.to_string(),
                reason: "expected pretty or json".into(),
            }),
        }
    }
}

/// Configuration errors raised while reading the environment.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is set but cannot be used.
    #[error("invalid {key}={value:?}: {reason}")]
    Invalid {
        /// Environment variable name.
        key: &'static str,
        /// The raw value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Log line format.
    pub log_format: LogFormat,
    /// Discount applied to SELF-managed requests viewed by customers.
    pub self_managed_discount: Rate,
    /// How many recent outbound events `/v1/events` retains.
    pub event_log_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            log_format: LogFormat::Pretty,
            self_managed_discount: Rate::DEFAULT_DISCOUNT,
            event_log_capacity: 1_000,
        }
    }
}

impl AppConfig {
    /// Read `PORT`, `LOG_FORMAT`, `SELF_MANAGED_DISCOUNT_BPS` and
    /// `EVENT_LOG_CAPACITY`. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(raw) = lookup("PORT") {
            config.port = parse_number("PORT", &raw)?;
        }
        if let Some(raw) = lookup("LOG_FORMAT") {
            config.log_format = raw.parse()?;
        }
        if let Some(raw) = lookup("SELF_MANAGED_DISCOUNT_BPS") {
            let bps: u32 = parse_number("SELF_MANAGED_DISCOUNT_BPS", &raw)?;
            config.self_managed_discount = Rate::from_bps(bps).map_err(|e| ConfigError::Invalid {
                key: "SELF_MANAGED_DISCOUNT_BPS",
                value: raw.clone(),
                reason: e.to_string(),
            })?;
        }
        if let Some(raw) = lookup("EVENT_LOG_CAPACITY") {
            config.event_log_capacity = parse_number("EVENT_LOG_CAPACITY", &raw)?;
            if config.event_log_capacity == 0 {
                return Err(ConfigError::Invalid {
                    key: "EVENT_LOG_CAPACITY",
                    value: raw,
                    reason: "must be at least 1".into(),
                });
            }
        }
        Ok(config)
    }
}

fn parse_number<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

// ── State ───────────────────────────────────────────────────────────────

/// Shared application state passed to all route handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub engine: Arc<LifecycleEngine>,
    pub events: Arc<InMemorySink>,
    pub metrics: ApiMetrics,
    pub config: AppConfig,
}

impl AppState {
    /// State with the default configuration.
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::with_config(AppConfig::default())
    }

    /// Build the engine and its event sinks from `config`. Events go to the
    /// tracing log and to the in-memory window.
    pub fn with_config(config: AppConfig) -> Result<Self, prometheus::Error> {
        let events = Arc::new(InMemorySink::new(config.event_log_capacity));
        let sink = FanOutSink::default()
            .with(Arc::new(TracingSink))
            .with(events.clone() as Arc<dyn EventSink>);
        let engine = LifecycleEngine::new(Arc::new(sink))
            .with_discount_policy(DiscountPolicy::new(config.self_managed_discount));
        Ok(Self {
            engine: Arc::new(engine),
            events,
            metrics: ApiMetrics::new()?,
            config,
        })
    }
}
