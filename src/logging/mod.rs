pub mod config;
mod filters;
mod formatter;

pub use self::config::{LogFormat, LoggingConfig};
use herald_error::{ErrorExt, StatusCode};
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Ошибки настройки логирования.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log level '{0}'")]
    InvalidLevel(String),

    #[error("invalid log format '{0}'")]
    InvalidFormat(String),

    #[error("failed to install global subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

impl ErrorExt for LoggingError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidLevel(_) | Self::InvalidFormat(_) => StatusCode::ConfigInvalid,
            Self::Init(_) => StatusCode::LoggingInitFailed,
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Устанавливает глобальный `tracing`-подписчик.
///
/// `RUST_LOG` имеет приоритет над уровнем из конфигурации. Повторный вызов
/// возвращает [`LoggingError::Init`], а не паникует.
pub fn init_logging(config: LoggingConfig) -> Result<(), LoggingError> {
    config.validate()?;

    tracing_subscriber::registry()
        .with(filters::build_filter_from_config(&config))
        .with(formatter::build_formatter_from_config(&config))
        .try_init()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_level = %config.level,
        log_format = %config.format,
        "Logging system initialized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_is_rejected_before_install() {
        let cfg = LoggingConfig {
            level: "verbose".into(),
            ..Default::default()
        };
        let err = init_logging(cfg).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::ConfigInvalid);
    }

    /// Тест проверяет, что повторная инициализация даёт ошибку, а не
    /// панику.
    #[test]
    fn test_second_init_is_an_error() {
        let _ = init_logging(LoggingConfig::default());
        let err = init_logging(LoggingConfig::default()).unwrap_err();
        assert!(matches!(err, LoggingError::Init(_)));
        assert_eq!(err.status_code(), StatusCode::LoggingInitFailed);
    }
}
