/// Ready-made channels: console interception, Logs, Errors.
pub mod channels;
/// Process settings loading.
pub mod config;
/// Logging setup (formatting, filters).
pub mod logging;
/// Pub/Sub: named registries, subscriptions, dispatch, history.
pub mod pubsub;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// Channels built on top of the registry.
pub use channels::{Console, ConsoleGuard, Errors, Level, Logs, TracingConsole};
/// config
pub use crate::config::{Settings, SettingsError};
/// Operation errors and status codes.
pub use herald_error::{ErrorExt, PubSubError, StatusCode};
/// Logging initialization.
pub use logging::{init_logging, LogFormat, LoggingConfig, LoggingError};
/// Pub/Sub API.
pub use pubsub::{
    Call, Context, ErrorSink, EventKey, Fault, FaultKind, Handler, HandlerError, HandlerResult,
    ListenOptions, PubSub, PubSubBuilder, PubSubOptions, Subscriber, Symbol, TracingSink,
    Unsubscribe,
};
