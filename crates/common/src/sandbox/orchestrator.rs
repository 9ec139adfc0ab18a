use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::{FutureExt, Stream, StreamExt};
use tokio::time::{timeout_at, Instant};

use crate::entry::{ByteStream, EntryError};

use super::session::Session;
use super::{OutputStream, PhaseStream, SandboxError, Scheduler, SessionId, SessionPhase, SessionSpec};

#[derive(Debug, Clone)]
pub struct SandboxPolicy {
    /// How long to wait for a session to finish, or to start streaming
    pub timeout: Duration,
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    pub output: Bytes,
    pub exit_code: i32,
}

/// Runs commands in ephemeral sessions.
///
/// Every session is created for a single call and torn down exactly once,
///  whatever the outcome. Teardown failures are logged and never replace
///  the result of the call.
pub struct Orchestrator<S: Scheduler> {
    scheduler: Arc<S>,
    policy: SandboxPolicy,
}

impl<S: Scheduler> Clone for Orchestrator<S> {
    fn clone(&self) -> Self {
        Self {
            scheduler: self.scheduler.clone(),
            policy: self.policy.clone(),
        }
    }
}

impl<S: Scheduler> Orchestrator<S> {
    pub fn new(scheduler: Arc<S>) -> Self {
        Self {
            scheduler,
            policy: SandboxPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: SandboxPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn scheduler(&self) -> &Arc<S> {
        &self.scheduler
    }

    pub fn policy(&self) -> &SandboxPolicy {
        &self.policy
    }

    /// Run a command to completion and return its output. A command that
    ///  fails yields [`SandboxError::CommandFailed`] carrying its output.
    pub async fn run(&self, spec: &SessionSpec) -> Result<RunOutput, SandboxError> {
        let mut session = Session::create(self.scheduler.clone(), spec).await?;
        let result = self.run_session(&mut session).await;
        tracing::debug!(session = %session.id(), state = ?session.state(), "command finished");
        session.teardown().await;
        result
    }

    /// Start a long-running command and follow its output. The session
    ///  lives until the returned stream is closed.
    pub async fn stream(&self, spec: &SessionSpec) -> Result<ByteStream, SandboxError> {
        let mut session = Session::create(self.scheduler.clone(), spec).await?;
        let (phases, output) = match self.start_stream(&mut session).await {
            Ok(started) => started,
            Err(err) => {
                session.teardown().await;
                return Err(err);
            }
        };

        let follow = Follow {
            scheduler: self.scheduler.clone(),
            id: session.id().clone(),
            phases: Some(phases),
            output,
            done: false,
        };
        Ok(ByteStream::new(follow.into_stream()).with_cleanup(move || async move {
            session.teardown().await;
        }))
    }

    async fn run_session(&self, session: &mut Session<S>) -> Result<RunOutput, SandboxError> {
        let mut phases = self.scheduler.watch(session.id()).await?;
        let phase = self
            .wait_for(session, &mut phases, SessionPhase::is_terminal)
            .await?;

        let output = collect(self.scheduler.output(session.id(), false).await?).await?;
        match phase {
            SessionPhase::Failed { exit_code } => Err(command_failed(&output, exit_code)),
            _ => Ok(RunOutput {
                output,
                exit_code: 0,
            }),
        }
    }

    async fn start_stream(
        &self,
        session: &mut Session<S>,
    ) -> Result<(PhaseStream, OutputStream), SandboxError> {
        let mut phases = self.scheduler.watch(session.id()).await?;
        let phase = self
            .wait_for(session, &mut phases, |phase| {
                *phase == SessionPhase::Running || phase.is_terminal()
            })
            .await?;

        if let SessionPhase::Failed { exit_code } = phase {
            let output = collect(self.scheduler.output(session.id(), false).await?).await?;
            return Err(command_failed(&output, exit_code));
        }
        let output = self.scheduler.output(session.id(), true).await?;
        Ok((phases, output))
    }

    async fn wait_for<F>(
        &self,
        session: &mut Session<S>,
        phases: &mut PhaseStream,
        reached: F,
    ) -> Result<SessionPhase, SandboxError>
    where
        F: Fn(&SessionPhase) -> bool,
    {
        let deadline = Instant::now() + self.policy.timeout;
        let waited = timeout_at(deadline, async {
            while let Some(phase) = phases.next().await {
                let phase = phase?;
                session.observe(&phase);
                if reached(&phase) {
                    return Ok(phase);
                }
            }
            Err(SandboxError::WatchClosed(session.id().clone()))
        })
        .await;

        match waited {
            Ok(result) => result,
            Err(_) => {
                session.timed_out();
                Err(SandboxError::Timeout {
                    session: session.id().clone(),
                    after: self.policy.timeout,
                })
            }
        }
    }
}

/// Output of a running session, watching its phase as it goes
struct Follow<S: Scheduler> {
    scheduler: Arc<S>,
    id: SessionId,
    phases: Option<PhaseStream>,
    output: OutputStream,
    done: bool,
}

impl<S: Scheduler> Follow<S> {
    fn into_stream(self) -> impl Stream<Item = Result<Bytes, EntryError>> + Send + 'static {
        futures::stream::unfold(self, |mut follow| async move {
            if follow.done {
                return None;
            }
            match follow.next_item().await? {
                Ok(chunk) => Some((Ok(chunk), follow)),
                Err(err) => {
                    follow.done = true;
                    Some((Err(EntryError::Sandbox(err)), follow))
                }
            }
        })
    }

    async fn next_item(&mut self) -> Option<Result<Bytes, SandboxError>> {
        if let Some(exit_code) = self.failed_since_last_chunk() {
            return Some(Err(self.drain_failure(exit_code).await));
        }
        match self.output.next().await {
            Some(item) => Some(item),
            None => self.failure_at_exit().await.map(Err),
        }
    }

    /// Check for a failure without waiting on the watch
    fn failed_since_last_chunk(&mut self) -> Option<Option<i32>> {
        let phases = self.phases.as_mut()?;
        while let Some(next) = phases.next().now_or_never() {
            match next {
                Some(Ok(SessionPhase::Failed { exit_code })) => return Some(exit_code),
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    tracing::debug!(session = %self.id, error = %err, "lost watch on session");
                    self.phases = None;
                    return None;
                }
                None => {
                    self.phases = None;
                    return None;
                }
            }
        }
        None
    }

    async fn drain_failure(&mut self, exit_code: Option<i32>) -> SandboxError {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.output.next().await {
            match chunk {
                Ok(chunk) => buf.extend_from_slice(&chunk),
                Err(err) => return err,
            }
        }
        command_failed(&buf, exit_code)
    }

    /// Once the output ends, wait for the exit status and report a failure
    async fn failure_at_exit(&mut self) -> Option<SandboxError> {
        let phases = self.phases.as_mut()?;
        while let Some(phase) = phases.next().await {
            match phase {
                Ok(SessionPhase::Failed { exit_code }) => {
                    let output = match self.scheduler.output(&self.id, false).await {
                        Ok(output) => collect(output).await,
                        Err(err) => Err(err),
                    };
                    return Some(match output {
                        Ok(output) => command_failed(&output, exit_code),
                        Err(err) => err,
                    });
                }
                Ok(SessionPhase::Succeeded) => return None,
                Ok(_) => {}
                Err(err) => return Some(err),
            }
        }
        None
    }
}

async fn collect(mut output: OutputStream) -> Result<Bytes, SandboxError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = output.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf.freeze())
}

fn command_failed(output: &[u8], exit_code: Option<i32>) -> SandboxError {
    SandboxError::CommandFailed {
        output: String::from_utf8_lossy(output)
            .trim_end_matches('\n')
            .to_string(),
        exit_code,
    }
}
