use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_trait::async_trait;
use chrono::Utc;
use herald_error::{ErrorExt, PubSubError};
use once_cell::sync::Lazy;
use serde_json::{json, Value};

use super::{global_settings, Logs};
use crate::{
    config::Settings,
    pubsub::{ErrorSink, Fault, PubSub, PubSubResult, TracingSink},
};

/// Предельная вложенность `capture`: обработчик события `error`, который
/// сам сообщает об ошибке, не может зациклить канал.
pub const MAX_CAPTURE_DEPTH: usize = 8;

tokio::task_local! {
    static CAPTURE_DEPTH: usize;
}

static GLOBAL_ERRORS: Lazy<Arc<Errors>> =
    Lazy::new(|| Errors::new("Errors", Logs::global(), &global_settings()));

/// Канал ошибок: реестр с единственным событием `error`.
///
/// Глобальный экземпляр ([`Errors::global`]) служит коллектором по
/// умолчанию для всех реестров без собственного коллектора, пока через
/// [`set_default_error_sink`](crate::pubsub::set_default_error_sink) не
/// установлен другой. Сбои подписчиков самого канала уходят в
/// [`TracingSink`].
pub struct Errors {
    pubsub: Arc<PubSub>,
    logs: Arc<Logs>,
    silent: AtomicBool,
}

impl Errors {
    pub fn new(
        name: impl Into<String>,
        logs: Arc<Logs>,
        settings: &Settings,
    ) -> Arc<Self> {
        let pubsub = PubSub::builder(name)
            .event("error")
            .track_publishes(settings.track_publishes)
            .error_sink(Arc::new(TracingSink))
            .build();

        Arc::new(Self {
            pubsub,
            logs,
            silent: AtomicBool::new(settings.errors_silent),
        })
    }

    /// Процесс-глобальный канал `Errors`.
    pub fn global() -> Arc<Self> {
        Arc::clone(&GLOBAL_ERRORS)
    }

    pub fn pubsub(&self) -> &Arc<PubSub> {
        &self.pubsub
    }

    pub fn logs(&self) -> &Arc<Logs> {
        &self.logs
    }

    pub fn history(&self) -> PubSubResult<Option<Vec<Vec<Value>>>> {
        self.pubsub.history("error")
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

    /// Фиксирует ошибку: пишет её в канал логов (если канал не в режиме
    /// `silent`) и публикует `{"timestamp", "error", "registry"?, "event"?}`.
    ///
    /// Значения, которые не являются ошибками, оборачиваются.
    pub async fn capture(
        &self,
        fault: impl Into<Fault>,
    ) -> Vec<Value> {
        let fault = fault.into();
        let depth = CAPTURE_DEPTH.try_with(|depth| *depth).unwrap_or(0);
        if depth >= MAX_CAPTURE_DEPTH {
            let err = PubSubError::CaptureDepthExceeded {
                depth,
                reason: fault.message(),
            };
            tracing::error!(
                channel = self.pubsub.name(),
                code = err.status_code().code(),
                error = %err,
                "Dropping nested error capture"
            );
            return Vec::new();
        }

        CAPTURE_DEPTH.scope(depth + 1, self.record(fault)).await
    }

    async fn record(
        &self,
        fault: Fault,
    ) -> Vec<Value> {
        if !self.is_silent() {
            self.logs.error(vec![Value::String(fault.to_string())]).await;
        }

        let mut record = json!({
            "timestamp": Utc::now().timestamp_millis(),
            "error": fault.to_json(),
        });
        if let Some(origin) = fault.origin() {
            record["registry"] = json!(origin.registry);
            record["event"] = json!(origin.event);
        }

        match self.pubsub.fire("error", vec![record]).await {
            Ok(results) => results,
            Err(err) => {
                TracingSink.capture(Fault::from(err)).await;
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl ErrorSink for Errors {
    async fn capture(
        &self,
        fault: Fault,
    ) {
        Errors::capture(self, fault).await;
    }
}

impl std::fmt::Debug for Errors {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Errors")
            .field("name", &self.pubsub.name())
            .field("silent", &self.is_silent())
            .finish()
    }
}
