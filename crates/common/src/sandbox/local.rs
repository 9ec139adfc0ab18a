//! Sessions as local child processes
//!
//! The session's target is a host directory and the mountpoint is that same
//! directory, so volume commands address host paths directly. Mount modes
//! are not enforced.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::BackendError;

use super::{
    OutputStream, PhaseStream, SandboxError, Scheduler, SessionId, SessionPhase, SessionSpec,
};

const READ_CHUNK: usize = 8 * 1024;

#[derive(Debug, Clone)]
struct Progress {
    written: usize,
    phase: SessionPhase,
}

struct LocalSession {
    buffer: Arc<Mutex<Vec<u8>>>,
    progress: watch::Receiver<Progress>,
    task: JoinHandle<()>,
}

/// Scheduler running every session as a child process of this one
#[derive(Default)]
pub struct LocalScheduler {
    sessions: Mutex<HashMap<SessionId, LocalSession>>,
}

impl LocalScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn session<T>(
        &self,
        id: &SessionId,
        f: impl FnOnce(&LocalSession) -> T,
    ) -> Result<T, SandboxError> {
        let sessions = self.sessions.lock();
        sessions
            .get(id)
            .map(f)
            .ok_or_else(|| BackendError::msg(format!("no such session: {id}")).into())
    }
}

#[async_trait]
impl Scheduler for LocalScheduler {
    async fn create(&self, spec: &SessionSpec) -> Result<SessionId, SandboxError> {
        let (program, args) = spec
            .command
            .split_first()
            .ok_or_else(|| BackendError::msg("empty command"))?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(BackendError::from)?;

        let id = SessionId::new(format!("local-{}", uuid::Uuid::new_v4()));
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = watch::channel(Progress {
            written: 0,
            phase: SessionPhase::Running,
        });

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let task_buffer = buffer.clone();
        let task = tokio::spawn(async move {
            tokio::join!(
                pump(stdout, &task_buffer, &tx),
                pump(stderr, &task_buffer, &tx)
            );
            let phase = match child.wait().await {
                Ok(status) if status.success() => SessionPhase::Succeeded,
                Ok(status) => SessionPhase::Failed {
                    exit_code: status.code(),
                },
                Err(err) => {
                    tracing::warn!(error = %err, "failed to wait on local session");
                    SessionPhase::Failed { exit_code: None }
                }
            };
            tx.send_modify(|progress| progress.phase = phase);
        });

        self.sessions.lock().insert(
            id.clone(),
            LocalSession {
                buffer,
                progress: rx,
                task,
            },
        );
        Ok(id)
    }

    async fn watch(&self, id: &SessionId) -> Result<PhaseStream, SandboxError> {
        let rx = self.session(id, |session| session.progress.clone())?;
        let phases = stream::unfold((rx, None::<SessionPhase>), |(mut rx, last)| async move {
            loop {
                let phase = rx.borrow_and_update().phase.clone();
                if last.as_ref() != Some(&phase) {
                    if last.as_ref().is_some_and(SessionPhase::is_terminal) {
                        return None;
                    }
                    return Some((Ok::<_, SandboxError>(phase.clone()), (rx, Some(phase))));
                }
                if phase.is_terminal() || rx.changed().await.is_err() {
                    return None;
                }
            }
        });
        Ok(Box::pin(phases))
    }

    async fn output(&self, id: &SessionId, follow: bool) -> Result<OutputStream, SandboxError> {
        let (buffer, rx) =
            self.session(id, |session| (session.buffer.clone(), session.progress.clone()))?;

        if !follow {
            let data = Bytes::copy_from_slice(&buffer.lock());
            return Ok(Box::pin(stream::iter([Ok::<_, SandboxError>(data)])));
        }

        let chunks = stream::unfold((buffer, rx, 0usize), |(buffer, mut rx, offset)| async move {
            loop {
                let (written, finished) = {
                    let progress = rx.borrow_and_update();
                    (progress.written, progress.phase.is_terminal())
                };
                if written > offset {
                    let chunk = Bytes::copy_from_slice(&buffer.lock()[offset..written]);
                    return Some((Ok::<_, SandboxError>(chunk), (buffer, rx, written)));
                }
                if finished || rx.changed().await.is_err() {
                    return None;
                }
            }
        });
        Ok(Box::pin(chunks))
    }

    async fn delete(&self, id: &SessionId) -> Result<(), SandboxError> {
        let session = self
            .sessions
            .lock()
            .remove(id)
            .ok_or_else(|| BackendError::msg(format!("no such session: {id}")))?;
        // dropping the child kills it
        session.task.abort();
        Ok(())
    }
}

async fn pump<R>(reader: Option<R>, buffer: &Mutex<Vec<u8>>, tx: &watch::Sender<Progress>)
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return;
    };
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => return,
            Ok(n) => {
                let written = {
                    let mut buffer = buffer.lock();
                    buffer.extend_from_slice(&chunk[..n]);
                    buffer.len()
                };
                tx.send_modify(|progress| progress.written = written);
            }
            Err(err) => {
                tracing::debug!(error = %err, "local session output closed");
                return;
            }
        }
    }
}
