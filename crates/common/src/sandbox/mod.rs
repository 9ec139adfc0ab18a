use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::error::BackendError;

pub mod local;
mod orchestrator;
mod session;

pub use local::LocalScheduler;
pub use orchestrator::{Orchestrator, RunOutput, SandboxPolicy};
pub use session::SessionState;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountMode {
    ReadOnly,
    ReadWrite,
}

/// What to run, and against which resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSpec {
    /// Resource mounted into the session
    pub target: String,
    pub mountpoint: String,
    pub mount: MountMode,
    pub command: Vec<String>,
}

/// Phase of a session as reported by the scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    Scheduled,
    Running,
    Succeeded,
    Failed { exit_code: Option<i32> },
    Unknown,
}

impl SessionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::Succeeded | SessionPhase::Failed { .. })
    }
}

pub type PhaseStream = BoxStream<'static, Result<SessionPhase, SandboxError>>;
pub type OutputStream = BoxStream<'static, Result<Bytes, SandboxError>>;

/// Runs commands in short-lived sessions bound to a target resource.
///
/// This is the one thing an exec-capable backend has to provide: a pod
///  scheduler, a container runtime or plain local processes.
#[async_trait]
pub trait Scheduler: Send + Sync + 'static {
    async fn create(&self, spec: &SessionSpec) -> Result<SessionId, SandboxError>;

    /// Phase changes of the session, starting with the current phase
    async fn watch(&self, id: &SessionId) -> Result<PhaseStream, SandboxError>;

    /// Combined stdout and stderr. With `follow` the stream stays open
    ///  until the command exits.
    async fn output(&self, id: &SessionId, follow: bool) -> Result<OutputStream, SandboxError>;

    async fn delete(&self, id: &SessionId) -> Result<(), SandboxError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SandboxError {
    #[error("timed out after {after:?} waiting for session {session}")]
    Timeout { session: SessionId, after: Duration },
    /// Displays as the captured output so the remote reason reaches the user verbatim
    #[error("{output}")]
    CommandFailed {
        output: String,
        exit_code: Option<i32>,
    },
    #[error("watch on session {0} closed before the command finished")]
    WatchClosed(SessionId),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl SandboxError {
    /// Whether running the same command again may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, SandboxError::Timeout { .. } | SandboxError::WatchClosed(_))
    }
}
