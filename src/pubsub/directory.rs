//! Процесс-глобальный каталог реестров по имени.
//!
//! Каталог заполняется при создании реестра и никогда не очищается сам.
//! Тесты, создающие реестры, должны давать им уникальные имена или
//! вызывать [`remove`], чтобы не мешать друг другу.

use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use super::PubSub;

static DIRECTORY: Lazy<DashMap<Arc<str>, Arc<PubSub>>> = Lazy::new(DashMap::new);

/// Регистрирует реестр под его именем. Последняя запись выигрывает;
/// возвращается вытесненный экземпляр.
pub(crate) fn register(pubsub: &Arc<PubSub>) -> Option<Arc<PubSub>> {
    let name: Arc<str> = Arc::from(pubsub.name());
    let previous = DIRECTORY.insert(name, Arc::clone(pubsub));
    if previous.is_some() {
        tracing::debug!(name = pubsub.name(), "Replaced registered PubSub");
    } else {
        tracing::debug!(name = pubsub.name(), "Registered PubSub");
    }
    previous
}

pub fn lookup(name: &str) -> Option<Arc<PubSub>> {
    DIRECTORY.get(name).map(|entry| Arc::clone(entry.value()))
}

/// Убирает реестр из каталога.
pub fn remove(name: &str) -> Option<Arc<PubSub>> {
    DIRECTORY.remove(name).map(|(_, pubsub)| pubsub)
}

pub fn names() -> Vec<String> {
    DIRECTORY.iter().map(|entry| entry.key().to_string()).collect()
}
