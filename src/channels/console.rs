//! Процесс-глобальная "консоль": то, куда пишут каналы логов.
//!
//! По умолчанию это [`TracingConsole`]. Канал [`Logs`](super::Logs) может
//! временно подменить консоль на перехватчик и затем вернуть исходную.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pubsub::handler::value_text;

/// Уровень записи; совпадает с именами событий канала логов.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Log,
    Info,
    Warn,
    Error,
    Trace,
}

impl Level {
    pub const ALL: [Level; 5] = [Self::Log, Self::Info, Self::Warn, Self::Error, Self::Trace];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Trace => "trace",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait Console: Send + Sync {
    async fn write(
        &self,
        level: Level,
        args: &[Value],
    );
}

/// Консоль по умолчанию: пишет через `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingConsole;

#[async_trait]
impl Console for TracingConsole {
    async fn write(
        &self,
        level: Level,
        args: &[Value],
    ) {
        let line = render(args);
        match level {
            Level::Log | Level::Info => tracing::info!(target: "herald::console", "{line}"),
            Level::Warn => tracing::warn!(target: "herald::console", "{line}"),
            Level::Error => tracing::error!(target: "herald::console", "{line}"),
            Level::Trace => tracing::trace!(target: "herald::console", "{line}"),
        }
    }
}

/// Аргументы через пробел; строки без кавычек.
pub fn render(args: &[Value]) -> String {
    args.iter().map(value_text).collect::<Vec<_>>().join(" ")
}

static CONSOLE: Lazy<RwLock<Arc<dyn Console>>> = Lazy::new(|| RwLock::new(Arc::new(TracingConsole)));

/// Снятые не по порядку перехватчики по адресу: сам перехватчик и консоль,
/// которую он когда-то заменил. Запись держит перехватчик живым, поэтому
/// адрес не может достаться другому объекту.
static DETACHED: Lazy<DashMap<usize, (Arc<dyn Console>, Arc<dyn Console>)>> =
    Lazy::new(DashMap::new);

fn address<T: ?Sized>(ptr: *const T) -> usize {
    ptr as *const () as usize
}

pub fn current() -> Arc<dyn Console> {
    CONSOLE.read().clone()
}

/// Устанавливает консоль и возвращает предыдущую.
pub fn set(console: Arc<dyn Console>) -> Arc<dyn Console> {
    std::mem::replace(&mut *CONSOLE.write(), console)
}

/// Запись в текущую консоль.
pub async fn write(
    level: Level,
    args: &[Value],
) {
    let console = current();
    console.write(level, args).await;
}

/// Снимает перехватчик `layer`, который заменил консоль `replaced`.
///
/// Если `layer` всё ещё установлен, на его место возвращается `replaced`
/// (или то, на что она сама указывает, если тоже снята). Иначе поверх него
/// стоит другой перехватчик: `layer` остаётся в цепочке, но дальше только
/// передаёт записи в `replaced`.
pub(crate) fn unlink(
    layer: &Arc<dyn Console>,
    replaced: Arc<dyn Console>,
) {
    let mut slot = CONSOLE.write();
    if address(Arc::as_ptr(&*slot)) == address(Arc::as_ptr(layer)) {
        *slot = resolve(replaced);
    } else {
        DETACHED.insert(address(Arc::as_ptr(layer)), (Arc::clone(layer), replaced));
    }
}

/// Консоль, в которую передаёт записи снятый перехватчик по адресу `layer`.
pub(crate) fn detached_target<T: ?Sized>(layer: *const T) -> Option<Arc<dyn Console>> {
    DETACHED
        .get(&address(layer))
        .map(|entry| Arc::clone(&entry.value().1))
}

fn resolve(mut console: Arc<dyn Console>) -> Arc<dyn Console> {
    while let Some((_, (_, next))) = DETACHED.remove(&address(Arc::as_ptr(&console))) {
        console = next;
    }
    console
}
