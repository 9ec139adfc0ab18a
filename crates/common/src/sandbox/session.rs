use std::sync::Arc;

use super::{SandboxError, Scheduler, SessionId, SessionPhase, SessionSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Scheduled,
    Running,
    Succeeded,
    Failed,
    TimedOut,
    Deleted,
}

impl SessionState {
    fn from_phase(phase: &SessionPhase) -> Option<Self> {
        match phase {
            SessionPhase::Scheduled => Some(SessionState::Scheduled),
            SessionPhase::Running => Some(SessionState::Running),
            SessionPhase::Succeeded => Some(SessionState::Succeeded),
            SessionPhase::Failed { .. } => Some(SessionState::Failed),
            SessionPhase::Unknown => None,
        }
    }
}

/// Exclusive handle on a created session.
///
/// Teardown runs exactly once: through [`Session::teardown`], or in the
///  background when the handle is dropped without it.
pub(crate) struct Session<S: Scheduler> {
    id: SessionId,
    scheduler: Arc<S>,
    state: SessionState,
    torn_down: bool,
}

impl<S: Scheduler> Session<S> {
    pub async fn create(scheduler: Arc<S>, spec: &SessionSpec) -> Result<Self, SandboxError> {
        let id = scheduler.create(spec).await?;
        tracing::debug!(
            session = %id,
            resource = %spec.target,
            command = ?spec.command,
            "created session"
        );
        Ok(Self {
            id,
            scheduler,
            state: SessionState::Created,
            torn_down: false,
        })
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn observe(&mut self, phase: &SessionPhase) {
        match SessionState::from_phase(phase) {
            Some(state) if state != self.state => {
                tracing::debug!(session = %self.id, ?state, "session changed state");
                self.state = state;
            }
            Some(_) => {}
            None => tracing::debug!(session = %self.id, "session in unknown state"),
        }
    }

    pub fn timed_out(&mut self) {
        self.state = SessionState::TimedOut;
    }

    /// Delete the session. Later calls, and the drop, do nothing.
    pub async fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        tracing::debug!(session = %self.id, state = ?self.state, "tearing down session");
        delete(self.scheduler.as_ref(), &self.id).await;
        self.state = SessionState::Deleted;
    }
}

async fn delete<S: Scheduler>(scheduler: &S, id: &SessionId) {
    match scheduler.delete(id).await {
        Ok(()) => tracing::debug!(session = %id, "deleted session"),
        Err(err) => tracing::warn!(session = %id, error = %err, "failed to delete session"),
    }
}

impl<S: Scheduler> Drop for Session<S> {
    fn drop(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.state = SessionState::Deleted;

        let scheduler = self.scheduler.clone();
        let id = self.id.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { delete(scheduler.as_ref(), &id).await });
            }
            Err(_) => tracing::warn!(session = %id, "session dropped outside a runtime, leaking it"),
        }
    }
}
