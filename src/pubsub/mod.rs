//! Реестры событий publish–subscribe.
//!
//! - `registry`: [`PubSub`], словарь событий, доставка, свёртка, история.
//! - `event`: ключи событий (строки и уникальные символы).
//! - `handler`: обработчики и их вызов.
//! - `subscriber`: подписки, параметры `listen_with`, отписка.
//! - `fault`: нормализация сбоев обработчиков и коллектор ошибок.
//! - `directory`: процесс-глобальный каталог реестров по имени.
//! - `intern` (приватный): интернирование имён событий.

pub mod directory;
pub mod event;
pub mod fault;
pub mod handler;
mod intern;
pub mod registry;
pub mod subscriber;

pub use event::{EventKey, Symbol};
pub use fault::{
    clear_default_error_sink, default_error_sink, set_default_error_sink, ErrorSink, Fault,
    FaultKind, FaultOrigin, TracingSink,
};
pub use handler::{Call, Context, Handler, HandlerError, HandlerFuture, HandlerResult};
pub use registry::{PubSub, PubSubBuilder, PubSubOptions, PubSubResult};
pub(crate) use subscriber::{SubscriberList, Subscription};
pub use subscriber::{ListenOptions, Subscriber, Unsubscribe};
