use std::fmt;

use num_enum::TryFromPrimitive;
#[cfg(feature = "serde_repr")]
use serde_repr::{Deserialize_repr, Serialize_repr};
#[cfg(feature = "strum")]
use strum_macros::{AsRefStr, EnumIter};

/// Коды статуса для категоризации ошибок.
///
/// # Диапазоны:
/// - 0xxx: Успех
/// - 1xxx: Общие ошибки
/// - 2xxx: Словарь событий (неизвестные события, реестры)
/// - 3xxx: Ошибки обработчиков (подписчиков)
/// - 4xxx: Конфигурация и окружение
///
/// # Реализация:
/// - `num_enum::TryFromPrimitive` даёт нативную реализацию `TryFrom<u32>`.
/// - опционально: `strum` для `AsRefStr`/`EnumIter` (feature = "strum").
/// - опционально: `serde_repr` для сериализации в виде числового значения
///   (feature = "serde_repr").
#[cfg_attr(feature = "strum", derive(AsRefStr, EnumIter))]
#[cfg_attr(feature = "serde_repr", derive(Serialize_repr, Deserialize_repr))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
#[non_exhaustive]
pub enum StatusCode {
    // === 0xxx: Успех ===
    Success = 0,

    // === 1xxx: Общие ошибки ===
    Unknown = 1000,
    Unsupported = 1001,
    Unexpected = 1002,
    Internal = 1003,
    InvalidArgs = 1004,

    // === 2xxx: Словарь событий ===
    UnknownEvent = 2000,
    RegistryNotFound = 2001,
    InvalidValue = 2002,

    // === 3xxx: Обработчики ===
    HandlerFailed = 3000,
    HandlerPanicked = 3001,
    HandlerThrewValue = 3002,
    CaptureDepthExceeded = 3003,

    // === 4xxx: Конфигурация/окружение ===
    ConfigInvalid = 4000,
    LoggingInitFailed = 4001,
    SerializationFailed = 4002,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl StatusCode {
    /// Числовое представление кода статуса.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Пытается получить вариант `StatusCode` из `u32`.
    pub fn from_u32(v: u32) -> Option<Self> {
        Self::try_from(v).ok()
    }

    /// Вернёт `true`, если переданный `code` означает успешный результат.
    pub fn is_success(code: u32) -> bool {
        Self::Success as u32 == code
    }

    /// Нарушение контракта вызывающей стороной (неизвестное событие,
    /// неверные аргументы). Такие ошибки всегда возвращаются вызывающему.
    pub fn is_contract_error(&self) -> bool {
        matches!(self, Self::InvalidArgs) || (2000..=2999).contains(&self.code())
    }

    /// Сбой подписчика (диапазон 3xxx). Никогда не пробрасывается
    /// публикующему, только передаётся в коллектор ошибок.
    pub fn is_handler_fault(&self) -> bool {
        (3000..=3999).contains(&self.code())
    }

    /// Рекомендуемый уровень логирования для данного кода.
    pub fn log_level(&self) -> LogLevel {
        match self {
            Self::Success => LogLevel::Trace,
            Self::RegistryNotFound => LogLevel::Debug,
            Self::UnknownEvent | Self::InvalidArgs | Self::InvalidValue => LogLevel::Info,
            Self::HandlerFailed | Self::HandlerThrewValue | Self::CaptureDepthExceeded => {
                LogLevel::Warn
            }
            Self::Internal | Self::HandlerPanicked | Self::LoggingInitFailed => LogLevel::Error,
            _ => LogLevel::Warn,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для StatusCode
////////////////////////////////////////////////////////////////////////////////

impl From<StatusCode> for u32 {
    fn from(c: StatusCode) -> Self {
        c.code()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        #[cfg(feature = "strum")]
        {
            write!(f, "{} ({})", self.as_ref(), self.code())
        }
        #[cfg(not(feature = "strum"))]
        {
            write!(f, "{:?} ({})", self, self.code())
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
