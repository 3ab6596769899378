use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use super::intern::intern_event_name;

static NEXT_SYMBOL_ID: AtomicU64 = AtomicU64::new(1);

/// Уникальный ключ события, аналог символа.
///
/// Два символа с одинаковым описанием считаются разными ключами. Равенство
/// определяется только идентификатором, выданным при создании.
#[derive(Clone)]
pub struct Symbol {
    id: u64,
    description: Arc<str>,
}

impl Symbol {
    pub fn new(description: impl AsRef<str>) -> Self {
        Self {
            id: NEXT_SYMBOL_ID.fetch_add(1, Ordering::Relaxed),
            description: Arc::from(description.as_ref()),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl PartialEq for Symbol {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.id == other.id
    }
}

impl Eq for Symbol {}

impl std::hash::Hash for Symbol {
    fn hash<H: std::hash::Hasher>(
        &self,
        state: &mut H,
    ) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "Symbol({})#{}", self.description, self.id)
    }
}

/// Имя события в словаре реестра: строка или символ.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKey {
    Name(Arc<str>),
    Symbol(Symbol),
}

impl EventKey {
    /// Строковое имя, если ключ не является символом.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            Self::Symbol(_) => None,
        }
    }
}

impl fmt::Display for EventKey {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Symbol(sym) => write!(f, "Symbol({})", sym.description),
        }
    }
}

impl From<&str> for EventKey {
    fn from(name: &str) -> Self {
        Self::Name(intern_event_name(name))
    }
}

impl From<String> for EventKey {
    fn from(name: String) -> Self {
        Self::Name(intern_event_name(name))
    }
}

impl From<&String> for EventKey {
    fn from(name: &String) -> Self {
        Self::Name(intern_event_name(name))
    }
}

impl From<Symbol> for EventKey {
    fn from(sym: Symbol) -> Self {
        Self::Symbol(sym)
    }
}

impl From<&Symbol> for EventKey {
    fn from(sym: &Symbol) -> Self {
        Self::Symbol(sym.clone())
    }
}

impl From<&EventKey> for EventKey {
    fn from(key: &EventKey) -> Self {
        key.clone()
    }
}
