use crate::error::BackendError;
use crate::sandbox::SandboxError;
use crate::volume::StatError;

use super::Action;

#[derive(Debug, Clone, thiserror::Error)]
pub enum EntryError {
    #[error("entry name must not be empty")]
    InvalidName,
    #[error("{0:?} cannot stand in for the path separator")]
    InvalidSeparatorSubstitute(char),
    #[error("{entry} does not support {action}")]
    Unsupported { entry: String, action: Action },
    #[error("path not found: {0}")]
    NotFound(String),
    #[error("duplicate canonical name {cname:?} while listing {parent}")]
    DuplicateCanonicalName { parent: String, cname: String },
    #[error(transparent)]
    Stat(#[from] StatError),
    #[error(transparent)]
    Sandbox(#[from] SandboxError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl EntryError {
    /// Wrap any backend client failure
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        EntryError::Backend(BackendError::new(err))
    }

    pub fn unsupported(entry: impl Into<String>, action: Action) -> Self {
        EntryError::Unsupported {
            entry: entry.into(),
            action,
        }
    }

    /// Attach entry/action context to opaque backend failures. Every other
    ///  variant is already specific and is passed through untouched.
    pub(crate) fn in_context(self, entry: &str, action: Action) -> Self {
        match self {
            EntryError::Backend(err) => EntryError::Backend(err.with_context(entry, action)),
            EntryError::Sandbox(SandboxError::Backend(err)) => {
                EntryError::Sandbox(SandboxError::Backend(err.with_context(entry, action)))
            }
            other => other,
        }
    }
}

impl From<anyhow::Error> for EntryError {
    fn from(err: anyhow::Error) -> Self {
        EntryError::Backend(BackendError::from_anyhow(err))
    }
}
