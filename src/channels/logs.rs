use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Weak,
};

use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde_json::{json, Value};

use super::{
    console::{self, Console, Level},
    global_settings,
};
use crate::{
    config::Settings,
    pubsub::{default_error_sink, ErrorSink, Fault, PubSub, PubSubResult},
};

static GLOBAL_LOGS: Lazy<Arc<Logs>> = Lazy::new(|| Logs::new("Logs", &global_settings()));

/// Канал логов: реестр с событиями `log`, `info`, `warn`, `error`,
/// `trace`.
///
/// Каждая запись пишется в консоль (если канал не в режиме `silent`) и
/// публикуется как `{"level", "timestamp", "args"}`. Поле `timestamp`
/// содержит миллисекунды с начала эпохи.
pub struct Logs {
    me: Weak<Logs>,
    pubsub: Arc<PubSub>,
    silent: AtomicBool,
    replacement: Mutex<Option<Replacement>>,
}

/// Активная подмена консоли.
struct Replacement {
    /// Консоль, которая была установлена до `replace`.
    original: Arc<dyn Console>,
    forward: Arc<dyn Console>,
}

impl Logs {
    pub fn new(
        name: impl Into<String>,
        settings: &Settings,
    ) -> Arc<Self> {
        let pubsub = PubSub::builder(name)
            .events(Level::ALL.map(Level::as_str))
            .track_publishes(settings.track_publishes)
            .build();

        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            pubsub,
            silent: AtomicBool::new(settings.logs_silent),
            replacement: Mutex::new(None),
        })
    }

    /// Процесс-глобальный канал `Logs`.
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL_LOGS)
    }

    pub fn pubsub(&self) -> &Arc<PubSub> {
        &self.pubsub
    }

    pub fn history(
        &self,
        level: Level,
    ) -> PubSubResult<Option<Vec<Vec<Value>>>> {
        self.pubsub.history(level.as_str())
    }

    pub fn is_silent(&self) -> bool {
        self.silent.load(Ordering::Relaxed)
    }

    pub fn set_silent(
        &self,
        silent: bool,
    ) {
        self.silent.store(silent, Ordering::Relaxed);
    }

    pub async fn log(
        &self,
        args: Vec<Value>,
    ) -> Vec<Value> {
        self.emit(Level::Log, args).await
    }

    pub async fn info(
        &self,
        args: Vec<Value>,
    ) -> Vec<Value> {
        self.emit(Level::Info, args).await
    }

    pub async fn warn(
        &self,
        args: Vec<Value>,
    ) -> Vec<Value> {
        self.emit(Level::Warn, args).await
    }

    pub async fn error(
        &self,
        args: Vec<Value>,
    ) -> Vec<Value> {
        self.emit(Level::Error, args).await
    }

    pub async fn trace(
        &self,
        args: Vec<Value>,
    ) -> Vec<Value> {
        self.emit(Level::Trace, args).await
    }

    /// Пишет запись в консоль и публикует её. Возвращает результаты
    /// подписчиков.
    pub async fn emit(
        &self,
        level: Level,
        args: Vec<Value>,
    ) -> Vec<Value> {
        if !self.is_silent() {
            self.console().write(level, &args).await;
        }

        let record = json!({
            "level": level,
            "timestamp": Utc::now().timestamp_millis(),
            "args": args,
        });
        match self.pubsub.fire(level.as_str(), vec![record]).await {
            Ok(results) => results,
            Err(err) => {
                default_error_sink().capture(Fault::from(err)).await;
                Vec::new()
            }
        }
    }

    /// Куда писать: консоль до подмены, если канал её подменил, иначе
    /// текущая.
    fn console(&self) -> Arc<dyn Console> {
        match &*self.replacement.lock() {
            Some(replacement) => Arc::clone(&replacement.original),
            None => console::current(),
        }
    }

    pub fn is_replaced(&self) -> bool {
        self.replacement.lock().is_some()
    }

    /// Подменяет процесс-глобальную консоль: всё, что пишется в неё, идёт
    /// через этот канал. Возвращает `false`, если подмена уже сделана.
    pub fn replace(&self) -> bool {
        let mut replacement = self.replacement.lock();
        if replacement.is_some() {
            return false;
        }
        let forward: Arc<dyn Console> = Arc::new(ForwardToLogs {
            logs: self.me.clone(),
        });
        let original = console::set(Arc::clone(&forward));
        *replacement = Some(Replacement { original, forward });
        tracing::debug!(channel = self.pubsub.name(), "Console replaced");
        true
    }

    /// Снимает подмену, сделанную `replace`. Без подмены ничего не делает.
    ///
    /// Если поверх этого канала консоль подменил другой, она остаётся за
    /// ним; этот канал просто выходит из цепочки, и после снятия всех
    /// подмен в любом порядке на месте оказывается исходная консоль.
    pub fn restore(&self) -> bool {
        match self.replacement.lock().take() {
            Some(Replacement { original, forward }) => {
                console::unlink(&forward, original);
                tracing::debug!(channel = self.pubsub.name(), "Console restored");
                true
            }
            None => false,
        }
    }

    /// Подмена консоли на время жизни guard.
    pub fn intercept(self: &Arc<Self>) -> ConsoleGuard {
        let restore = self.replace();
        ConsoleGuard {
            logs: Arc::clone(self),
            restore,
        }
    }
}

impl std::fmt::Debug for Logs {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Logs")
            .field("name", &self.pubsub.name())
            .field("silent", &self.is_silent())
            .field("replaced", &self.is_replaced())
            .finish()
    }
}

/// Возвращает консоль при уничтожении.
#[must_use = "console is restored as soon as the guard is dropped"]
pub struct ConsoleGuard {
    logs: Arc<Logs>,
    restore: bool,
}

impl Drop for ConsoleGuard {
    fn drop(&mut self) {
        if self.restore {
            self.logs.restore();
        }
    }
}

struct ForwardToLogs {
    logs: Weak<Logs>,
}

#[async_trait]
impl Console for ForwardToLogs {
    async fn write(
        &self,
        level: Level,
        args: &[Value],
    ) {
        if let Some(target) = console::detached_target(self as *const Self) {
            return target.write(level, args).await;
        }
        match self.logs.upgrade() {
            Some(logs) => {
                logs.emit(level, args.to_vec()).await;
            }
            None => console::TracingConsole.write(level, args).await,
        }
    }
}
