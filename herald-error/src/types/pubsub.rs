use std::any::Any;

use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Ошибки реестра событий.
///
/// `UnknownEvent` это единственная ошибка, которую получает вызывающий код
/// `listen`/`unlisten`/`publish`/`reduce`. Варианты `Handler*` описывают
/// сбои подписчиков: они никогда не пробрасываются публикующему, а
/// передаются в коллектор ошибок.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PubSubError {
    #[error("PubSub {registry} does not track {event}")]
    UnknownEvent { registry: String, event: String },

    #[error("handler for {registry}.{event} failed: {reason}")]
    HandlerFailed {
        registry: String,
        event: String,
        reason: String,
    },

    #[error("handler for {registry}.{event} panicked: {message}")]
    HandlerPanicked {
        registry: String,
        event: String,
        message: String,
    },

    #[error("error capture nested {depth} levels deep, dropped: {reason}")]
    CaptureDepthExceeded { depth: usize, reason: String },
}

impl PubSubError {
    /// Имя реестра, к которому относится ошибка (если есть).
    pub fn registry(&self) -> Option<&str> {
        match self {
            Self::UnknownEvent { registry, .. }
            | Self::HandlerFailed { registry, .. }
            | Self::HandlerPanicked { registry, .. } => Some(registry),
            Self::CaptureDepthExceeded { .. } => None,
        }
    }
}

impl ErrorExt for PubSubError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::UnknownEvent { .. } => StatusCode::UnknownEvent,
            Self::HandlerFailed { .. } => StatusCode::HandlerFailed,
            Self::HandlerPanicked { .. } => StatusCode::HandlerPanicked,
            Self::CaptureDepthExceeded { .. } => StatusCode::CaptureDepthExceeded,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("error_type", "pubsub".to_string()),
            ("status_code", self.status_code().to_string()),
        ];

        match self {
            Self::UnknownEvent { registry, event }
            | Self::HandlerFailed {
                registry, event, ..
            }
            | Self::HandlerPanicked {
                registry, event, ..
            } => {
                tags.push(("registry", registry.clone()));
                tags.push(("event", event.clone()));
            }
            Self::CaptureDepthExceeded { depth, .. } => {
                tags.push(("depth", depth.to_string()));
            }
        }

        tags
    }
}
