use config::{Config, Environment};
use herald_error::{ErrorExt, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::{LogFormat, LoggingConfig, LoggingError};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error(transparent)]
    Logging(#[from] LoggingError),
}

impl ErrorExt for SettingsError {
    fn status_code(&self) -> StatusCode {
        StatusCode::ConfigInvalid
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Настройки процесса.
///
/// Источники по порядку: значения по умолчанию, затем переменные
/// окружения с префиксом `HERALD_` (например `HERALD_LOG_LEVEL=debug`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    pub log_level: String,
    pub log_format: String,
    /// Каналы `Logs` не пишут в консоль.
    pub logs_silent: bool,
    /// Канал `Errors` не дублирует ошибки в `Logs`.
    pub errors_silent: bool,
    /// Вести историю публикаций в каналах `Logs` и `Errors`.
    pub track_publishes: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "compact".to_string(),
            logs_silent: false,
            errors_silent: false,
            track_publishes: true,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self, SettingsError> {
        let cfg = Config::builder()
            // Значения по умолчанию
            .set_default("log_level", "info")?
            .set_default("log_format", "compact")?
            .set_default("logs_silent", false)?
            .set_default("errors_silent", false)?
            .set_default("track_publishes", true)?
            // Переменные окружения с префиксом HERALD_
            .add_source(Environment::with_prefix("HERALD").try_parsing(true))
            .build()?;

        Ok(cfg.try_deserialize()?)
    }

    /// Конфигурация логирования, собранная из настроек.
    pub fn logging_config(&self) -> Result<LoggingConfig, SettingsError> {
        let config = LoggingConfig {
            level: self.log_level.clone(),
            format: self.log_format.parse::<LogFormat>()?,
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }
}
