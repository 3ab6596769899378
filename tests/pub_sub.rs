use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use herald::{
    channels::console, Call, ErrorExt, Errors, EventKey, Handler, HandlerError, Level,
    ListenOptions, Logs, PubSub, PubSubError, PubSubOptions, Settings, StatusCode, Subscriber,
    Symbol,
};
use parking_lot::Mutex;
use rstest::rstest;
use serde_json::{json, Value};
use serial_test::serial;

fn counter(calls: &Arc<AtomicUsize>) -> Handler {
    let calls = Arc::clone(calls);
    Handler::new(move |call| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(call.first().clone())
    })
}

/// Тест проверяет базовый сценарий: подписчик вызывается ровно один раз с
/// аргументами публикации, а его результат возвращается публикующему.
#[tokio::test]
async fn test_listen_then_publish() {
    let ps = PubSub::create("it-basic", ["e"], PubSubOptions::default());
    let calls = Arc::new(AtomicUsize::new(0));
    ps.listen("e", counter(&calls), None).unwrap();

    let results = ps.publish("e", vec![json!({"id": 1})]).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(results, vec![json!({"id": 1})]);
}

#[tokio::test]
async fn test_unsubscribe_handle() {
    let ps = PubSub::create("it-unsubscribe", ["e"], PubSubOptions::default());
    let calls = Arc::new(AtomicUsize::new(0));
    let handle = ps.listen("e", counter(&calls), None).unwrap();

    assert!(handle.unsubscribe());
    assert!(!handle.unsubscribe());
    ps.publish("e", vec![]).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_once_then_never_again() {
    let ps = PubSub::create("it-once", ["e"], PubSubOptions::default());
    let calls = Arc::new(AtomicUsize::new(0));
    ps.listen_with("e", counter(&calls), None, ListenOptions::once())
        .await
        .unwrap();

    ps.publish("e", vec![]).await.unwrap();
    ps.fire("e", vec![]).await.unwrap();
    ps.trigger("e", vec![]).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// Тест проверяет, что поздний подписчик получает все прошлые публикации
/// по порядку, а история при этом не растёт.
#[tokio::test]
async fn test_late_subscriber_replay() {
    let ps = PubSub::create("it-replay", ["e"], PubSubOptions::tracked());
    for n in 1..=3 {
        ps.publish("e", vec![json!(n)]).await.unwrap();
    }

    let seen = Arc::new(Mutex::new(Vec::new()));
    let handler = {
        let seen = Arc::clone(&seen);
        Handler::new(move |call| {
            seen.lock().push(call.first().clone());
            Ok(Value::Null)
        })
    };
    ps.listen_with("e", handler, None, ListenOptions::replay())
        .await
        .unwrap();

    assert_eq!(*seen.lock(), vec![json!(1), json!(2), json!(3)]);
    assert_eq!(ps.history("e").unwrap().unwrap().len(), 3);
}

#[rstest]
#[case::name(EventKey::from("missing"))]
#[case::symbol(EventKey::from(Symbol::new("e")))]
#[tokio::test]
async fn test_unknown_event_fails(#[case] key: EventKey) {
    let ps = PubSub::create("it-unknown", ["e"], PubSubOptions::default());

    let err = ps.publish(key.clone(), vec![]).await.unwrap_err();
    assert!(matches!(err, PubSubError::UnknownEvent { .. }));
    assert_eq!(err.to_string(), format!("PubSub it-unknown does not track {key}"));

    assert_eq!(err.status_code(), StatusCode::UnknownEvent);
    assert_eq!(err.registry(), Some("it-unknown"));
}

#[tokio::test]
async fn test_reduce_adds_up() {
    let ps = PubSub::create("it-reduce", ["e"], PubSubOptions::default());
    let add = |n: i64| {
        Handler::new(move |call: Call| {
            let x = call.first().as_i64().ok_or_else(|| HandlerError::msg("not a number"))?;
            Ok(json!(x + n))
        })
    };
    ps.listen("e", add(1), None).unwrap();
    ps.listen("e", add(2), None).unwrap();

    assert_eq!(ps.reduce("e", json!(0)).await.unwrap(), json!(3));
}

/// Тест проверяет изоляцию сбоев: паника и ошибка первых подписчиков не
/// мешают последнему и не доходят до публикующего.
#[tokio::test]
async fn test_throwing_subscriber_is_isolated() {
    let ps = PubSub::create("it-isolation", ["e"], PubSubOptions::default());
    let calls = Arc::new(AtomicUsize::new(0));
    ps.listen("e", Handler::new(|_| Err(HandlerError::thrown("nope"))), None)
        .unwrap();
    ps.listen(
        "e",
        Handler::from_async(|_| async { Err(HandlerError::msg("async nope")) }),
        None,
    )
    .unwrap();
    ps.listen("e", counter(&calls), None).unwrap();

    let results = ps.publish("e", vec![json!("ok")]).await.unwrap();
    assert_eq!(results, vec![json!("ok")]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_get_and_last_writer_wins() {
    let first = PubSub::create("it-directory", ["e"], PubSubOptions::default());
    assert!(Arc::ptr_eq(&PubSub::get("it-directory").unwrap(), &first));

    let second = PubSub::create("it-directory", ["e"], PubSubOptions::default());
    assert!(Arc::ptr_eq(&PubSub::get("it-directory").unwrap(), &second));
    assert!(PubSub::get("it-never-registered").is_none());
}

#[tokio::test]
async fn test_bound_context_reaches_handler() {
    struct Account {
        owner: &'static str,
    }

    let ps = PubSub::create("it-context", ["save"], PubSubOptions::default());
    let handler = Handler::new(|call| {
        let account = call
            .context_as::<Account>()
            .ok_or_else(|| HandlerError::msg("no account"))?;
        Ok(json!(account.owner))
    });
    ps.listen("save", Subscriber::bound(handler, Arc::new(Account { owner: "ada" })), None)
        .unwrap();

    assert_eq!(ps.publish("save", vec![]).await.unwrap(), vec![json!("ada")]);
}

/// Тест проверяет, что одновременные публикации из разных задач вызывают
/// `once`-подписчика ровно один раз.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_publish_respects_once() {
    let ps = PubSub::create("it-concurrent", ["e"], PubSubOptions::default());
    let calls = Arc::new(AtomicUsize::new(0));
    ps.listen_once("e", counter(&calls), None).unwrap();

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let ps = Arc::clone(&ps);
            tokio::spawn(async move { ps.publish("e", vec![]).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// Тест проверяет, что глобальный канал `Errors` становится коллектором
/// по умолчанию и получает сбои реестров без собственного коллектора.
#[tokio::test]
#[serial]
async fn test_global_errors_collects_faults() {
    let errors = Errors::global();
    errors.set_silent(true);

    let ps = PubSub::create("it-global-errors", ["boom"], PubSubOptions::default());
    ps.listen("boom", Handler::new(|_| Err(HandlerError::msg("kaput"))), None)
        .unwrap();
    ps.publish("boom", vec![]).await.unwrap();

    let history = errors.history().unwrap().unwrap_or_default();
    let record = history
        .iter()
        .map(|args| &args[0])
        .find(|record| record["registry"] == "it-global-errors")
        .expect("fault was not captured");
    assert_eq!(record["event"], "boom");
    assert_eq!(record["error"]["message"], "kaput");
    errors.set_silent(false);
}

/// Тест проверяет, что сбой, случившийся до первого обращения к
/// `Errors::global()`, всё равно попадает в канал и виден позднему
/// подписчику через повтор истории.
#[tokio::test]
#[serial]
async fn test_fault_reaches_errors_before_channel_is_touched() {
    let ps = PubSub::create("it-early-fault", ["boom"], PubSubOptions::default());
    ps.listen("boom", Handler::new(|_| Err(HandlerError::msg("early"))), None)
        .unwrap();
    ps.publish("boom", vec![]).await.unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = {
        let seen = Arc::clone(&seen);
        Handler::new(move |call| {
            seen.lock().push(call.first().clone());
            Ok(Value::Null)
        })
    };
    let handle = Errors::global()
        .pubsub()
        .listen_with("error", recorder, None, ListenOptions::replay())
        .await
        .unwrap();
    handle.unsubscribe();

    let seen = seen.lock();
    let record = seen
        .iter()
        .find(|record| record["registry"] == "it-early-fault")
        .expect("fault was not captured");
    assert_eq!(record["event"], "boom");
    assert_eq!(record["error"]["message"], "early");
}

#[tokio::test]
#[serial]
async fn test_logs_intercepts_console() {
    let settings = Settings {
        logs_silent: true,
        ..Settings::default()
    };
    let logs = Logs::new("it-logs", &settings);

    {
        let _guard = logs.intercept();
        console::write(Level::Info, &[json!("hello"), json!(42)]).await;
    }
    console::write(Level::Info, &[json!("not captured")]).await;

    let history = logs.history(Level::Info).unwrap().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0][0]["args"], json!(["hello", 42]));
    assert_eq!(history[0][0]["level"], "info");
}
