use std::fmt;
use std::sync::Arc;

use crate::entry::Action;

/// Shared, clonable error source. Coalesced callers each receive a copy of the
///  same failure, so backend errors are kept behind an `Arc`.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Opaque failure reported by a backend client.
///
/// The core never reinterprets the source; it only records which entry and
///  which action were being served when the failure happened.
#[derive(Debug, Clone)]
pub struct BackendError {
    entry: Option<String>,
    action: Option<Action>,
    source: SharedError,
}

impl BackendError {
    pub fn new<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            entry: None,
            action: None,
            source: Arc::new(source),
        }
    }

    /// Wrap an `anyhow::Error` coming out of a backend client
    pub fn from_anyhow(err: anyhow::Error) -> Self {
        let boxed: Box<dyn std::error::Error + Send + Sync + 'static> = err.into();
        Self {
            entry: None,
            action: None,
            source: Arc::from(boxed),
        }
    }

    /// Build a backend error out of a plain message
    pub fn msg(message: impl Into<String>) -> Self {
        Self::from_anyhow(anyhow::anyhow!(message.into()))
    }

    /// Attach the entry and action being served. Existing context is kept,
    ///  the innermost call site knows best.
    pub fn with_context(mut self, entry: impl Into<String>, action: Action) -> Self {
        if self.entry.is_none() {
            self.entry = Some(entry.into());
            self.action = Some(action);
        }
        self
    }

    pub fn entry(&self) -> Option<&str> {
        self.entry.as_deref()
    }

    pub fn action(&self) -> Option<Action> {
        self.action
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.entry, self.action) {
            (Some(entry), Some(action)) => write!(f, "{} {}: {}", action, entry, self.source),
            _ => write!(f, "{}", self.source),
        }
    }
}

impl std::error::Error for BackendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err)
    }
}
