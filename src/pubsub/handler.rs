use std::{
    any::Any,
    fmt,
    future::Future,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use futures::{future::BoxFuture, FutureExt};
use serde_json::Value;

/// Контекст, к которому привязан обработчик (аналог получателя `this`).
///
/// Сравнивается по указателю, поэтому два разных `Arc` с одинаковым
/// содержимым считаются разными контекстами.
pub type Context = Arc<dyn Any + Send + Sync>;

pub type HandlerResult = Result<Value, HandlerError>;
pub type HandlerFuture = BoxFuture<'static, HandlerResult>;

type HandlerFn = dyn Fn(Call) -> HandlerFuture + Send + Sync;

/// Один вызов обработчика: аргументы публикации и привязанный контекст.
#[derive(Clone)]
pub struct Call {
    pub context: Option<Context>,
    pub args: Vec<Value>,
}

impl Call {
    pub fn new(
        context: Option<Context>,
        args: Vec<Value>,
    ) -> Self {
        Self { context, args }
    }

    pub fn arg(
        &self,
        index: usize,
    ) -> Option<&Value> {
        self.args.get(index)
    }

    /// Первый аргумент или `Null`, если аргументов нет.
    pub fn first(&self) -> &Value {
        self.args.first().unwrap_or(&Value::Null)
    }

    /// Контекст, приведённый к конкретному типу.
    pub fn context_as<T: Any>(&self) -> Option<&T> {
        self.context.as_deref()?.downcast_ref::<T>()
    }
}

impl fmt::Debug for Call {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Call")
            .field("has_context", &self.context.is_some())
            .field("args", &self.args)
            .finish()
    }
}

/// Ошибка, которой завершился обработчик.
#[derive(Debug)]
pub enum HandlerError {
    /// Обычная ошибка.
    Fault(anyhow::Error),
    /// Обработчик "бросил" значение, которое не является ошибкой.
    Thrown(Value),
    /// Обработчик запаниковал.
    Panicked(String),
}

impl HandlerError {
    pub fn msg(message: impl fmt::Display) -> Self {
        Self::Fault(anyhow::anyhow!("{message}"))
    }

    pub fn thrown(value: impl Into<Value>) -> Self {
        Self::Thrown(value.into())
    }
}

impl<E> From<E> for HandlerError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        Self::Fault(anyhow::Error::new(err))
    }
}

impl fmt::Display for HandlerError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::Fault(err) => write!(f, "{err}"),
            Self::Thrown(value) => f.write_str(&value_text(value)),
            Self::Panicked(message) => write!(f, "handler panicked: {message}"),
        }
    }
}

/// Текстовое представление значения: строки без кавычек, остальное как JSON.
pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Обработчик события.
///
/// Синхронные и асинхронные обработчики исполняются одинаково: вызов
/// всегда возвращает future, который диспетчер дожидается перед переходом
/// к следующему подписчику. Обработчик идентифицируется по внутреннему
/// `Arc`, поэтому клоны считаются тем же обработчиком.
#[derive(Clone)]
pub struct Handler {
    inner: Arc<HandlerFn>,
}

impl Handler {
    /// Синхронный обработчик.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Call) -> HandlerResult + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Self {
            inner: Arc::new(move |call| {
                let f = Arc::clone(&f);
                async move { (*f)(call) }.boxed()
            }),
        }
    }

    /// Асинхронный обработчик.
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(Call) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            inner: Arc::new(move |call| f(call).boxed()),
        }
    }

    pub fn ptr_eq(
        &self,
        other: &Handler,
    ) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.inner), Arc::as_ptr(&other.inner))
    }

    /// Вызывает обработчик, превращая панику в [`HandlerError::Panicked`].
    pub(crate) async fn invoke(
        &self,
        call: Call,
    ) -> HandlerResult {
        let fut = match panic::catch_unwind(AssertUnwindSafe(|| (self.inner)(call))) {
            Ok(fut) => fut,
            Err(payload) => return Err(HandlerError::Panicked(panic_message(payload))),
        };

        match AssertUnwindSafe(fut).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => Err(HandlerError::Panicked(panic_message(payload))),
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "Handler({:p})", Arc::as_ptr(&self.inner) as *const ())
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_sync_and_async_share_one_path() {
        let sync = Handler::new(|call| Ok(json!(call.first().as_i64().unwrap_or(0) + 1)));
        let asynchronous = Handler::from_async(|call: Call| async move {
            tokio::task::yield_now().await;
            Ok(json!(call.args.len()))
        });

        let call = Call::new(None, vec![json!(41), json!("x")]);
        assert_eq!(sync.invoke(call.clone()).await.unwrap(), json!(42));
        assert_eq!(asynchronous.invoke(call).await.unwrap(), json!(2));
    }

    #[test]
    fn test_identity_survives_clone() {
        let h1 = Handler::new(|_| Ok(Value::Null));
        let h2 = h1.clone();
        let h3 = Handler::new(|_| Ok(Value::Null));
        assert!(h1.ptr_eq(&h2));
        assert!(!h1.ptr_eq(&h3));
    }

    fn explode_now(_: Call) -> HandlerResult {
        panic!("boom")
    }

    async fn explode_later() -> HandlerResult {
        tokio::task::yield_now().await;
        panic!("{}", String::from("later"))
    }

    /// Тест проверяет, что паника и в синхронном обработчике, и внутри
    /// future превращается в ошибку, а не роняет вызывающего.
    #[tokio::test]
    async fn test_panics_become_errors() {
        let sync = Handler::new(explode_now);
        let asynchronous = Handler::from_async(|_| explode_later());

        match sync.invoke(Call::new(None, vec![])).await {
            Err(HandlerError::Panicked(msg)) => assert_eq!(msg, "boom"),
            other => panic!("expected panic error, got {other:?}"),
        }
        match asynchronous.invoke(Call::new(None, vec![])).await {
            Err(HandlerError::Panicked(msg)) => assert_eq!(msg, "later"),
            other => panic!("expected panic error, got {other:?}"),
        }
    }

    #[test]
    fn test_context_downcast() {
        let ctx: Context = Arc::new(7u32);
        let call = Call::new(Some(ctx), vec![]);
        assert_eq!(call.context_as::<u32>(), Some(&7));
        assert_eq!(call.context_as::<String>(), None);
        assert_eq!(call.first(), &Value::Null);
    }

    #[test]
    fn test_error_display() {
        let io = std::io::Error::other("disk gone");
        assert_eq!(HandlerError::from(io).to_string(), "disk gone");
        assert_eq!(HandlerError::thrown("plain").to_string(), "plain");
        assert_eq!(HandlerError::thrown(json!({"a": 1})).to_string(), r#"{"a":1}"#);
        assert!(HandlerError::Panicked("x".into()).to_string().contains("panicked"));
    }
}
