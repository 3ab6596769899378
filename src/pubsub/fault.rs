use std::{fmt, sync::Arc};

use async_trait::async_trait;
use herald_error::PubSubError;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{json, Value};

use super::handler::{value_text, HandlerError};
use crate::channels::Errors;

/// Как появился сбой.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultKind {
    Error,
    Thrown,
    Panicked,
}

/// Где произошёл сбой: реестр и событие, при диспетчеризации которого
/// обработчик упал.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaultOrigin {
    pub registry: String,
    pub event: String,
}

/// Нормализованная ошибка для коллектора ошибок.
///
/// Значения, которые не являются ошибками (брошенный `Value`, сообщение
/// паники), оборачиваются в `anyhow::Error` с их текстом. Исходное
/// брошенное значение сохраняется в [`Fault::thrown_value`].
#[derive(Debug, Clone)]
pub struct Fault {
    error: Arc<anyhow::Error>,
    kind: FaultKind,
    thrown: Option<Value>,
    origin: Option<FaultOrigin>,
}

impl Fault {
    pub fn from_error(error: anyhow::Error) -> Self {
        Self {
            error: Arc::new(error),
            kind: FaultKind::Error,
            thrown: None,
            origin: None,
        }
    }

    pub fn from_value(value: Value) -> Self {
        Self {
            error: Arc::new(anyhow::anyhow!("{}", value_text(&value))),
            kind: FaultKind::Thrown,
            thrown: Some(value),
            origin: None,
        }
    }

    pub fn from_panic(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            error: Arc::new(anyhow::anyhow!("handler panicked: {message}")),
            kind: FaultKind::Panicked,
            thrown: None,
            origin: None,
        }
    }

    pub fn with_origin(
        mut self,
        registry: impl Into<String>,
        event: impl Into<String>,
    ) -> Self {
        self.origin = Some(FaultOrigin {
            registry: registry.into(),
            event: event.into(),
        });
        self
    }

    pub fn error(&self) -> &anyhow::Error {
        &self.error
    }

    pub fn message(&self) -> String {
        self.error.to_string()
    }

    pub fn kind(&self) -> FaultKind {
        self.kind
    }

    pub fn thrown_value(&self) -> Option<&Value> {
        self.thrown.as_ref()
    }

    pub fn origin(&self) -> Option<&FaultOrigin> {
        self.origin.as_ref()
    }

    /// Типизированная ошибка реестра, если сбой пришёл из диспетчера.
    pub fn to_pubsub_error(&self) -> Option<PubSubError> {
        let origin = self.origin.as_ref()?;
        let registry = origin.registry.clone();
        let event = origin.event.clone();
        Some(match self.kind {
            FaultKind::Panicked => PubSubError::HandlerPanicked {
                registry,
                event,
                message: self.message(),
            },
            FaultKind::Error | FaultKind::Thrown => PubSubError::HandlerFailed {
                registry,
                event,
                reason: self.message(),
            },
        })
    }

    /// JSON-представление для публикации в канал ошибок.
    pub fn to_json(&self) -> Value {
        let mut record = json!({
            "message": self.message(),
            "kind": self.kind,
        });
        if let Some(origin) = &self.origin {
            record["registry"] = json!(origin.registry);
            record["event"] = json!(origin.event);
        }
        if let Some(value) = &self.thrown {
            record["thrown"] = value.clone();
        }
        record
    }
}

impl fmt::Display for Fault {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match &self.origin {
            Some(origin) => write!(f, "[{}.{}] {}", origin.registry, origin.event, self.error),
            None => write!(f, "{}", self.error),
        }
    }
}

impl From<HandlerError> for Fault {
    fn from(err: HandlerError) -> Self {
        match err {
            HandlerError::Fault(error) => Self::from_error(error),
            HandlerError::Thrown(value) => Self::from_value(value),
            HandlerError::Panicked(message) => Self::from_panic(message),
        }
    }
}

impl From<anyhow::Error> for Fault {
    fn from(error: anyhow::Error) -> Self {
        Self::from_error(error)
    }
}

impl From<PubSubError> for Fault {
    fn from(error: PubSubError) -> Self {
        Self::from_error(anyhow::Error::new(error))
    }
}

impl From<Value> for Fault {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

impl From<&str> for Fault {
    fn from(message: &str) -> Self {
        Self::from_value(Value::String(message.to_string()))
    }
}

impl From<String> for Fault {
    fn from(message: String) -> Self {
        Self::from_value(Value::String(message))
    }
}

/// Коллектор ошибок обработчиков.
///
/// Диспетчер вызывает `capture` для каждого упавшего обработчика и
/// продолжает работу; ошибка никогда не возвращается публикующему.
#[async_trait]
pub trait ErrorSink: Send + Sync {
    async fn capture(
        &self,
        fault: Fault,
    );
}

/// Коллектор, который пишет сбой в `tracing` на уровне `error`.
///
/// Им пользуется собственный реестр канала [`Errors`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl ErrorSink for TracingSink {
    async fn capture(
        &self,
        fault: Fault,
    ) {
        let (registry, event) = fault
            .origin()
            .map(|o| (o.registry.as_str(), o.event.as_str()))
            .unwrap_or(("-", "-"));
        tracing::error!(
            registry,
            event,
            kind = ?fault.kind(),
            error = %fault.error(),
            "Unhandled handler fault"
        );
    }
}

static DEFAULT_SINK: Lazy<RwLock<Option<Arc<dyn ErrorSink>>>> = Lazy::new(|| RwLock::new(None));

/// Устанавливает процесс-глобальный коллектор, используемый реестрами без
/// собственного коллектора, вместо канала [`Errors::global`]. Возвращает
/// предыдущий.
pub fn set_default_error_sink(sink: Arc<dyn ErrorSink>) -> Option<Arc<dyn ErrorSink>> {
    DEFAULT_SINK.write().replace(sink)
}

/// Снимает установленный коллектор; сбои снова уходят в
/// [`Errors::global`].
pub fn clear_default_error_sink() -> Option<Arc<dyn ErrorSink>> {
    DEFAULT_SINK.write().take()
}

/// Установленный коллектор или глобальный канал [`Errors`].
pub fn default_error_sink() -> Arc<dyn ErrorSink> {
    if let Some(sink) = DEFAULT_SINK.read().clone() {
        return sink;
    }
    Errors::global()
}
