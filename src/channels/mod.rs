//! Готовые каналы поверх реестра: логи и ошибки.

pub mod console;
pub mod errors;
pub mod logs;

pub use console::{Console, Level, TracingConsole};
pub use errors::{Errors, MAX_CAPTURE_DEPTH};
pub use logs::{ConsoleGuard, Logs};

use crate::config::Settings;

/// Настройки для глобальных каналов. Если загрузить их не удалось,
/// используются значения по умолчанию.
fn global_settings() -> Settings {
    Settings::load().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "Falling back to default settings");
        Settings::default()
    })
}
