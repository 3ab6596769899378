use std::sync::Arc;

use dashmap::DashMap;
use herald_error::PubSubError;
use parking_lot::Mutex;
use serde_json::Value;

use super::{
    default_error_sink, directory, Call, Context, ErrorSink, EventKey, Fault, HandlerError,
    ListenOptions, Subscriber, SubscriberList, Subscription, Unsubscribe,
};

pub type PubSubResult<T> = Result<T, PubSubError>;

/// Параметры создания реестра.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PubSubOptions {
    /// Хранить аргументы каждой публикации для повторной отправки поздним
    /// подписчикам. Без этого флага история не ведётся вовсе.
    pub track_publishes: bool,
}

impl PubSubOptions {
    pub fn tracked() -> Self {
        Self {
            track_publishes: true,
        }
    }
}

/// Состояние одного события: подписчики и (опционально) история.
pub(crate) struct EventSlot {
    subscribers: Arc<SubscriberList>,
    history: Option<Mutex<Vec<Vec<Value>>>>,
}

impl EventSlot {
    fn new(track_publishes: bool) -> Self {
        Self {
            subscribers: Arc::new(SubscriberList::default()),
            history: track_publishes.then(|| Mutex::new(Vec::new())),
        }
    }

    fn record(
        &self,
        snapshot: &[Value],
    ) {
        if let Some(history) = &self.history {
            history.lock().push(snapshot.to_vec());
        }
    }

    fn history(&self) -> Option<Vec<Vec<Value>>> {
        self.history.as_ref().map(|h| h.lock().clone())
    }
}

/// Именованный реестр событий (pub/sub).
///
/// Поддерживает:
/// - фиксированный, но расширяемый словарь событий
/// - последовательную доставку в порядке регистрации
/// - одноразовые подписки
/// - историю публикаций и её повторную отправку поздним подписчикам
/// - свёртку (`reduce`) результатов подписчиков
///
/// Каждый созданный реестр попадает в процесс-глобальный каталог и
/// доступен через [`PubSub::get`].
pub struct PubSub {
    name: Arc<str>,
    events: DashMap<EventKey, Arc<EventSlot>>,
    track_publishes: bool,
    error_sink: Option<Arc<dyn ErrorSink>>,
}

/// Построитель реестра.
pub struct PubSubBuilder {
    name: String,
    events: Vec<EventKey>,
    options: PubSubOptions,
    error_sink: Option<Arc<dyn ErrorSink>>,
}

impl PubSubBuilder {
    pub fn event(
        mut self,
        key: impl Into<EventKey>,
    ) -> Self {
        self.events.push(key.into());
        self
    }

    pub fn events<I>(
        mut self,
        keys: I,
    ) -> Self
    where
        I: IntoIterator,
        I::Item: Into<EventKey>,
    {
        self.events.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn track_publishes(
        mut self,
        track: bool,
    ) -> Self {
        self.options.track_publishes = track;
        self
    }

    /// Собственный коллектор ошибок вместо глобального.
    pub fn error_sink(
        mut self,
        sink: Arc<dyn ErrorSink>,
    ) -> Self {
        self.error_sink = Some(sink);
        self
    }

    /// Создаёт реестр и регистрирует его в каталоге под его именем.
    pub fn build(self) -> Arc<PubSub> {
        let events = DashMap::new();
        for key in self.events {
            events
                .entry(key)
                .or_insert_with(|| Arc::new(EventSlot::new(self.options.track_publishes)));
        }

        let pubsub = Arc::new(PubSub {
            name: Arc::from(self.name),
            events,
            track_publishes: self.options.track_publishes,
            error_sink: self.error_sink,
        });
        directory::register(&pubsub);
        pubsub
    }
}

impl PubSub {
    pub fn builder(name: impl Into<String>) -> PubSubBuilder {
        PubSubBuilder {
            name: name.into(),
            events: Vec::new(),
            options: PubSubOptions::default(),
            error_sink: None,
        }
    }

    /// Создаёт реестр со словарём `events`.
    pub fn create<I>(
        name: impl Into<String>,
        events: I,
        options: PubSubOptions,
    ) -> Arc<Self>
    where
        I: IntoIterator,
        I::Item: Into<EventKey>,
    {
        Self::builder(name)
            .events(events)
            .track_publishes(options.track_publishes)
            .build()
    }

    /// Экземпляр, зарегистрированный под `name`, или `None`.
    pub fn get(name: &str) -> Option<Arc<Self>> {
        directory::lookup(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tracks_publishes(&self) -> bool {
        self.track_publishes
    }

    pub fn has_event(
        &self,
        key: impl Into<EventKey>,
    ) -> bool {
        self.events.contains_key(&key.into())
    }

    /// Словарь событий (порядок не определён).
    pub fn events(&self) -> Vec<EventKey> {
        self.events.iter().map(|e| e.key().clone()).collect()
    }

    pub fn subscriber_count(
        &self,
        key: impl Into<EventKey>,
    ) -> PubSubResult<usize> {
        Ok(self.slot(&key.into())?.subscribers.len())
    }

    /// Добавляет событие в словарь, если его ещё нет (существующий список
    /// подписчиков не трогается), и подписывает на него `subscribers` с
    /// параметрами по умолчанию.
    pub fn add_event<I>(
        &self,
        key: impl Into<EventKey>,
        subscribers: I,
    ) -> PubSubResult<Vec<Unsubscribe>>
    where
        I: IntoIterator,
        I::Item: Into<Subscriber>,
    {
        let key = key.into();
        self.events
            .entry(key.clone())
            .or_insert_with(|| Arc::new(EventSlot::new(self.track_publishes)));

        subscribers
            .into_iter()
            .map(|sub| self.listen(&key, sub, None))
            .collect()
    }

    /// Подписка с параметрами по умолчанию.
    pub fn listen(
        &self,
        key: impl Into<EventKey>,
        subscriber: impl Into<Subscriber>,
        context: Option<Context>,
    ) -> PubSubResult<Unsubscribe> {
        let (unsub, _) = self.register(&key.into(), subscriber.into(), context, false)?;
        Ok(unsub)
    }

    /// Одноразовая подписка.
    pub fn listen_once(
        &self,
        key: impl Into<EventKey>,
        subscriber: impl Into<Subscriber>,
        context: Option<Context>,
    ) -> PubSubResult<Unsubscribe> {
        let (unsub, _) = self.register(&key.into(), subscriber.into(), context, true)?;
        Ok(unsub)
    }

    /// Подписка с явными параметрами.
    ///
    /// При `replay_previous_events` и включённой истории новый обработчик
    /// до возврата получает все сохранённые публикации по порядку. Повторы
    /// не попадают в историю и не расходуют `once`. Без истории повтор
    /// ничего не делает.
    pub async fn listen_with(
        &self,
        key: impl Into<EventKey>,
        subscriber: impl Into<Subscriber>,
        context: Option<Context>,
        options: ListenOptions,
    ) -> PubSubResult<Unsubscribe> {
        let key = key.into();
        let (unsub, sub) = self.register(&key, subscriber.into(), context, options.once)?;

        if options.replay_previous_events {
            let history = self.slot(&key)?.history().unwrap_or_default();
            for args in history {
                let call = Call::new(sub.context.clone(), args);
                if let Err(err) = sub.handler.invoke(call).await {
                    self.report(&key, err).await;
                }
            }
        }

        Ok(unsub)
    }

    fn register(
        &self,
        key: &EventKey,
        subscriber: Subscriber,
        context: Option<Context>,
        once: bool,
    ) -> PubSubResult<(Unsubscribe, Arc<Subscription>)> {
        let slot = self.slot(key)?;
        let (handler, context) = subscriber.resolve(context);
        let sub = Arc::new(Subscription::new(handler, context, once));
        slot.subscribers.push(Arc::clone(&sub));

        tracing::trace!(registry = %self.name, event = %key, id = sub.id, once, "Listen");
        Ok((Unsubscribe::new(&slot.subscribers, &sub), sub))
    }

    /// Снимает первую подписку с данным обработчиком (и контекстом, если он
    /// указан в записи) или, при `None`, все подписки события.
    pub fn unlisten(
        &self,
        key: impl Into<EventKey>,
        subscriber: Option<Subscriber>,
    ) -> PubSubResult<()> {
        let key = key.into();
        let slot = self.slot(&key)?;

        match subscriber {
            Some(Subscriber::Handler(handler)) => {
                slot.subscribers.remove_first(&handler, None);
            }
            Some(Subscriber::Bound { handler, context }) => {
                slot.subscribers.remove_first(&handler, context.as_ref());
            }
            None => {
                let removed = slot.subscribers.clear();
                tracing::trace!(registry = %self.name, event = %key, removed, "Unlisten all");
            }
        }
        Ok(())
    }

    pub fn unlisten_all(
        &self,
        key: impl Into<EventKey>,
    ) -> PubSubResult<()> {
        self.unlisten(key, None)
    }

    /// Публикует событие.
    ///
    /// Подписчики вызываются строго по очереди в порядке регистрации,
    /// каждый следующий после завершения предыдущего. Ошибка обработчика
    /// уходит в коллектор ошибок и не прерывает доставку. Возвращает
    /// результаты успешных обработчиков по порядку; упавшие обработчики
    /// записи не дают.
    pub async fn publish(
        &self,
        key: impl Into<EventKey>,
        args: Vec<Value>,
    ) -> PubSubResult<Vec<Value>> {
        let key = key.into();
        let slot = self.slot(&key)?;
        slot.record(&args);

        let snapshot = slot.subscribers.snapshot();
        tracing::trace!(
            registry = %self.name,
            event = %key,
            subscribers = snapshot.len(),
            "Publish"
        );

        let mut results = Vec::with_capacity(snapshot.len());
        for sub in snapshot {
            if !sub.try_begin() {
                continue;
            }
            let outcome = sub
                .handler
                .invoke(Call::new(sub.context.clone(), args.clone()))
                .await;
            if sub.once {
                slot.subscribers.remove(sub.id);
            }
            match outcome {
                Ok(value) => results.push(value),
                Err(err) => self.report(&key, err).await,
            }
        }
        Ok(results)
    }

    /// Синоним [`PubSub::publish`].
    pub async fn fire(
        &self,
        key: impl Into<EventKey>,
        args: Vec<Value>,
    ) -> PubSubResult<Vec<Value>> {
        self.publish(key, args).await
    }

    /// Синоним [`PubSub::publish`].
    pub async fn trigger(
        &self,
        key: impl Into<EventKey>,
        args: Vec<Value>,
    ) -> PubSubResult<Vec<Value>> {
        self.publish(key, args).await
    }

    /// Проводит аккумулятор через всех подписчиков по порядку: каждый
    /// получает текущее значение первым аргументом, его результат
    /// становится новым значением. Упавший обработчик оставляет
    /// аккумулятор без изменений.
    pub async fn reduce(
        &self,
        key: impl Into<EventKey>,
        initial: Value,
    ) -> PubSubResult<Value> {
        let key = key.into();
        let slot = self.slot(&key)?;
        slot.record(std::slice::from_ref(&initial));

        let mut accumulator = initial;
        for sub in slot.subscribers.snapshot() {
            if !sub.try_begin() {
                continue;
            }
            let outcome = sub
                .handler
                .invoke(Call::new(sub.context.clone(), vec![accumulator.clone()]))
                .await;
            if sub.once {
                slot.subscribers.remove(sub.id);
            }
            match outcome {
                Ok(next) => accumulator = next,
                Err(err) => self.report(&key, err).await,
            }
        }
        Ok(accumulator)
    }

    /// История публикаций события; `None`, если история не ведётся.
    pub fn history(
        &self,
        key: impl Into<EventKey>,
    ) -> PubSubResult<Option<Vec<Vec<Value>>>> {
        Ok(self.slot(&key.into())?.history())
    }

    fn slot(
        &self,
        key: &EventKey,
    ) -> PubSubResult<Arc<EventSlot>> {
        self.events
            .get(key)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| PubSubError::UnknownEvent {
                registry: self.name.to_string(),
                event: key.to_string(),
            })
    }

    async fn report(
        &self,
        key: &EventKey,
        err: HandlerError,
    ) {
        let fault = Fault::from(err).with_origin(self.name.as_ref(), key.to_string());
        tracing::debug!(registry = %self.name, event = %key, error = %fault, "Handler fault");

        let sink = match &self.error_sink {
            Some(sink) => Arc::clone(sink),
            None => default_error_sink(),
        };
        sink.capture(fault).await;
    }
}

impl std::fmt::Debug for PubSub {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("PubSub")
            .field("name", &self.name)
            .field("events", &self.events.len())
            .field("track_publishes", &self.track_publishes)
            .finish()
    }
}
