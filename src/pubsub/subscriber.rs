use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Weak,
};

use parking_lot::Mutex;

use super::handler::{Context, Handler};

static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

/// Подписчик в том виде, в котором его передаёт пользователь: голый
/// обработчик или обработчик вместе с контекстом.
///
/// Разбирается один раз при регистрации в [`Subscription`].
#[derive(Debug, Clone)]
pub enum Subscriber {
    Handler(Handler),
    Bound {
        handler: Handler,
        context: Option<Context>,
    },
}

impl Subscriber {
    pub fn bound(
        handler: Handler,
        context: Context,
    ) -> Self {
        Self::Bound {
            handler,
            context: Some(context),
        }
    }

    pub fn handler(&self) -> &Handler {
        match self {
            Self::Handler(handler) | Self::Bound { handler, .. } => handler,
        }
    }

    /// Разбирает подписчика; явный `context` имеет приоритет над контекстом
    /// из записи.
    pub(crate) fn resolve(
        self,
        context: Option<Context>,
    ) -> (Handler, Option<Context>) {
        match self {
            Self::Handler(handler) => (handler, context),
            Self::Bound {
                handler,
                context: own,
            } => (handler, context.or(own)),
        }
    }
}

impl From<Handler> for Subscriber {
    fn from(handler: Handler) -> Self {
        Self::Handler(handler)
    }
}

impl From<&Handler> for Subscriber {
    fn from(handler: &Handler) -> Self {
        Self::Handler(handler.clone())
    }
}

impl From<(Handler, Context)> for Subscriber {
    fn from((handler, context): (Handler, Context)) -> Self {
        Self::bound(handler, context)
    }
}

/// Параметры `listen_with`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenOptions {
    /// Подписка удаляется сразу после первого срабатывания.
    pub once: bool,
    /// Новый обработчик сразу получает все сохранённые публикации.
    pub replay_previous_events: bool,
}

impl ListenOptions {
    pub fn once() -> Self {
        Self {
            once: true,
            ..Self::default()
        }
    }

    pub fn replay() -> Self {
        Self {
            replay_previous_events: true,
            ..Self::default()
        }
    }

    pub fn with_once(
        mut self,
        once: bool,
    ) -> Self {
        self.once = once;
        self
    }

    pub fn with_replay(
        mut self,
        replay: bool,
    ) -> Self {
        self.replay_previous_events = replay;
        self
    }
}

/// Зарегистрированная подписка.
pub(crate) struct Subscription {
    pub(crate) id: u64,
    pub(crate) handler: Handler,
    pub(crate) context: Option<Context>,
    pub(crate) once: bool,
    active: AtomicBool,
    claimed: AtomicBool,
}

impl Subscription {
    pub(crate) fn new(
        handler: Handler,
        context: Option<Context>,
        once: bool,
    ) -> Self {
        Self {
            id: NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed),
            handler,
            context,
            once,
            active: AtomicBool::new(true),
            claimed: AtomicBool::new(false),
        }
    }

    /// Совпадение по обработчику и, если задан, по контексту.
    pub(crate) fn matches(
        &self,
        handler: &Handler,
        context: Option<&Context>,
    ) -> bool {
        if !self.handler.ptr_eq(handler) {
            return false;
        }
        match (context, &self.context) {
            (None, _) => true,
            (Some(wanted), Some(own)) => Arc::ptr_eq(wanted, own),
            (Some(_), None) => false,
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Право на вызов в текущем проходе диспетчера.
    ///
    /// Для `once` право получает ровно один проход, даже если два прохода
    /// по одному событию идут одновременно.
    pub(crate) fn try_begin(&self) -> bool {
        if !self.is_active() {
            return false;
        }
        if !self.once {
            return true;
        }
        self.claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }
}

/// Упорядоченный список подписок одного события.
///
/// Диспетчер работает со снимком списка, поэтому изменения во время
/// прохода (включая отписку изнутри обработчика) не ломают итерацию.
#[derive(Default)]
pub(crate) struct SubscriberList {
    entries: Mutex<Vec<Arc<Subscription>>>,
}

impl SubscriberList {
    pub(crate) fn push(
        &self,
        sub: Arc<Subscription>,
    ) {
        self.entries.lock().push(sub);
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<Subscription>> {
        self.entries.lock().clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Удаляет подписку по идентификатору. `false`, если её уже нет.
    pub(crate) fn remove(
        &self,
        id: u64,
    ) -> bool {
        let mut entries = self.entries.lock();
        match entries.iter().position(|s| s.id == id) {
            Some(index) => {
                entries.remove(index).deactivate();
                true
            }
            None => false,
        }
    }

    /// Удаляет первую подписку с данным обработчиком (и контекстом, если он
    /// указан).
    pub(crate) fn remove_first(
        &self,
        handler: &Handler,
        context: Option<&Context>,
    ) -> bool {
        let mut entries = self.entries.lock();
        match entries.iter().position(|s| s.matches(handler, context)) {
            Some(index) => {
                entries.remove(index).deactivate();
                true
            }
            None => false,
        }
    }

    pub(crate) fn clear(&self) -> usize {
        let drained: Vec<_> = self.entries.lock().drain(..).collect();
        for sub in &drained {
            sub.deactivate();
        }
        drained.len()
    }
}

/// Отписка конкретной подписки.
///
/// Не зависит от того, зарегистрирован ли тот же обработчик ещё раз или с
/// другим контекстом. Повторный вызов ничего не делает.
#[derive(Clone)]
pub struct Unsubscribe {
    list: Weak<SubscriberList>,
    sub: Weak<Subscription>,
    id: u64,
}

impl Unsubscribe {
    pub(crate) fn new(
        list: &Arc<SubscriberList>,
        sub: &Arc<Subscription>,
    ) -> Self {
        Self {
            list: Arc::downgrade(list),
            sub: Arc::downgrade(sub),
            id: sub.id,
        }
    }

    /// Снимает подписку. Возвращает `true`, если она была активна.
    pub fn unsubscribe(&self) -> bool {
        match self.list.upgrade() {
            Some(list) => list.remove(self.id),
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.sub.upgrade().is_some_and(|s| s.is_active())
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl std::fmt::Debug for Unsubscribe {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
