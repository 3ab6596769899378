use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

/// Пул для повторного использования Arc<str> по одинаковым именам событий.
static EVENT_NAME_INTERN: Lazy<DashMap<Box<str>, Arc<str>>> = Lazy::new(DashMap::new);

/// Возвращает interned Arc<str> для имени события.
///
/// При первом вызове для нового имени создаёт Arc<str> и сохраняет его в пуле.
/// Гонка двух потоков за одно имя разрешается через `entry`, поэтому
/// оба получат один и тот же указатель.
#[inline]
pub(crate) fn intern_event_name<S: AsRef<str>>(name: S) -> Arc<str> {
    let key = name.as_ref();
    if let Some(existing) = EVENT_NAME_INTERN.get(key) {
        return existing.clone();
    }
    EVENT_NAME_INTERN
        .entry(Box::from(key))
        .or_insert_with(|| Arc::from(key))
        .clone()
}
