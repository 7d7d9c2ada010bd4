//! Tracing subscriber setup.

use std::fmt;
use tracing::info;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Level used when neither `RUST_LOG` nor the configured level parses.
const FALLBACK_LEVEL: &str = "info";

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

impl LogFormat {
    /// Format selected by the `LOG_JSON` flag.
    #[must_use]
    pub const fn from_json_flag(json: bool) -> Self {
        if json { Self::Json } else { Self::Text }
    }

    /// Stable name for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subscriber settings for the identity service.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Service name attached to the startup event
    pub service_name: String,
    /// Default filter directive, overridden by `RUST_LOG`
    pub log_level: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            service_name: env!("CARGO_PKG_NAME").to_string(),
            log_level: FALLBACK_LEVEL.to_string(),
            format: LogFormat::Text,
        }
    }
}

impl TracingConfig {
    /// Set the default filter directive.
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set the output format.
    #[must_use]
    pub const fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Filter from `env_directive` (usually `RUST_LOG`), then the configured
    /// level, then `info`. Invalid directives fall through to the next source.
    #[must_use]
    pub fn filter(&self, env_directive: Option<&str>) -> EnvFilter {
        env_directive
            .and_then(|d| EnvFilter::try_new(d).ok())
            .or_else(|| EnvFilter::try_new(&self.log_level).ok())
            .unwrap_or_else(|| EnvFilter::new(FALLBACK_LEVEL))
    }
}

/// Install the global subscriber and log a startup event carrying the
/// service name. Call once at startup.
///
/// # Errors
///
/// Returns an error if a global subscriber is already set.
pub fn init_tracing(config: &TracingConfig) -> Result<(), TryInitError> {
    let env_directive = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = config.filter(env_directive.as_deref());

    let registry = tracing_subscriber::registry().with(filter);
    match config.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .try_init()?,
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init()?,
    }

    info!(
        service = %config.service_name,
        format = %config.format,
        level = %config.log_level,
        "Tracing initialized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn test_default_config() {
        let config = TracingConfig::default();
        assert_eq!(config.service_name, "identity-service");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.format, LogFormat::Text);
    }

    #[test]
    fn test_format_from_flag() {
        assert_eq!(LogFormat::from_json_flag(true), LogFormat::Json);
        assert_eq!(LogFormat::from_json_flag(false).to_string(), "text");
    }

    #[test]
    fn test_filter_precedence() {
        let config = TracingConfig::default().with_log_level("debug");

        assert_eq!(config.filter(Some("warn")).max_level_hint(), Some(LevelFilter::WARN));
        assert_eq!(config.filter(None).max_level_hint(), Some(LevelFilter::DEBUG));
        assert_eq!(config.filter(Some("identity=loud")).max_level_hint(), Some(LevelFilter::DEBUG));

        let broken = TracingConfig::default().with_log_level("identity=loud");
        assert_eq!(broken.filter(None).max_level_hint(), Some(LevelFilter::INFO));
    }

    #[test]
    fn test_second_init_fails() {
        let config = TracingConfig::default().with_log_level("off");
        let _ = init_tracing(&config);
        assert!(init_tracing(&config).is_err());
    }
}
