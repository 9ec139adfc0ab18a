use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;

use crate::error::BackendError;
use crate::sandbox::{
    OutputStream, PhaseStream, SandboxError, Scheduler, SessionId, SessionPhase, SessionSpec,
};

const EPOCH: i64 = 1_700_000_000;
const DIR_MODE: u32 = 0o040755;
const FILE_MODE: u32 = 0o100644;
const DIR_SIZE: usize = 4096;

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File(Bytes),
}

/// What a session will do once created
#[derive(Debug, Clone)]
struct Script {
    phases: Vec<SessionPhase>,
    output: Bytes,
    /// Keep following output after it has all been written
    follow_forever: bool,
}

impl Script {
    fn finished(output: impl Into<Bytes>, exit_code: i32) -> Self {
        let last = if exit_code == 0 {
            SessionPhase::Succeeded
        } else {
            SessionPhase::Failed {
                exit_code: Some(exit_code),
            }
        };
        Self {
            phases: vec![SessionPhase::Scheduled, SessionPhase::Running, last],
            output: output.into(),
            follow_forever: false,
        }
    }
}

/// Scheduler double simulating a volume tree mounted at a fixed mountpoint.
///
/// It understands the commands an exec volume runs: `find ... -exec stat`,
///  `cat`, `tail -f` and `rm -rf`, and answers them the way busybox would.
///  Every created and deleted session is counted.
pub struct FakeScheduler {
    mountpoint: String,
    tree: Mutex<BTreeMap<String, Node>>,
    sessions: Mutex<HashMap<SessionId, Script>>,
    specs: Mutex<Vec<SessionSpec>>,
    creates: AtomicUsize,
    deletes: AtomicUsize,
    hang: AtomicBool,
    fail_delete: AtomicBool,
    stream_failure: Mutex<Option<i32>>,
}

impl FakeScheduler {
    pub fn new(mountpoint: &str) -> Self {
        let mountpoint = mountpoint.trim_end_matches('/').to_string();
        let mut tree = BTreeMap::new();
        tree.insert(mountpoint.clone(), Node::Dir);
        Self {
            mountpoint,
            tree: Mutex::new(tree),
            sessions: Mutex::new(HashMap::new()),
            specs: Mutex::new(Vec::new()),
            creates: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            hang: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            stream_failure: Mutex::new(None),
        }
    }

    /// Add a file at a path relative to the mountpoint, creating parents
    pub fn with_file(self, path: &str, content: impl Into<Bytes>) -> Self {
        let full = self.full_path(path);
        self.add_parents(&full);
        self.tree.lock().insert(full, Node::File(content.into()));
        self
    }

    pub fn with_dir(self, path: &str) -> Self {
        let full = self.full_path(path);
        self.add_parents(&full);
        self.tree.lock().insert(full, Node::Dir);
        self
    }

    /// Sessions never reach a terminal phase
    pub fn hang(self) -> Self {
        self.hang.store(true, Ordering::SeqCst);
        self
    }

    /// Deleting a session fails, after it has been counted
    pub fn fail_delete(self) -> Self {
        self.fail_delete.store(true, Ordering::SeqCst);
        self
    }

    /// `tail -f` sessions start, write the file and then fail
    pub fn fail_streams(self, exit_code: i32) -> Self {
        *self.stream_failure.lock() = Some(exit_code);
        self
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Sessions created and not yet deleted
    pub fn live_sessions(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn specs(&self) -> Vec<SessionSpec> {
        self.specs.lock().clone()
    }

    /// Whether a path relative to the mountpoint exists
    pub fn exists(&self, path: &str) -> bool {
        self.tree.lock().contains_key(&self.full_path(path))
    }

    fn full_path(&self, path: &str) -> String {
        let path = path.trim_matches('/');
        if path.is_empty() {
            self.mountpoint.clone()
        } else {
            format!("{}/{}", self.mountpoint, path)
        }
    }

    fn add_parents(&self, full: &str) {
        let mut tree = self.tree.lock();
        let mut parent = full;
        while let Some(idx) = parent.rfind('/') {
            parent = &full[..idx];
            if parent.len() <= self.mountpoint.len() {
                break;
            }
            tree.entry(parent.to_string()).or_insert(Node::Dir);
        }
    }

    fn script(&self, command: &[String]) -> Script {
        let args: Vec<&str> = command.iter().map(String::as_str).collect();
        match args.as_slice() {
            ["find", root, "-mindepth", "1", "-maxdepth", depth, "-exec", "stat", "-c", _, "{}", "+"] => {
                match depth.parse::<usize>() {
                    Ok(depth) => self.find(root, depth),
                    Err(_) => Script::finished(format!("find: invalid depth '{depth}'\n"), 1),
                }
            }
            ["cat", path] => self.cat(path),
            ["tail", "-f", path] => self.tail(path),
            ["rm", "-rf", path] => {
                let path = path.trim_end_matches('/');
                let prefix = format!("{path}/");
                self.tree
                    .lock()
                    .retain(|key, _| key != path && !key.starts_with(&prefix));
                Script::finished(Bytes::new(), 0)
            }
            [program, ..] => Script::finished(format!("sh: {program}: not found\n"), 127),
            [] => Script::finished("sh: empty command\n", 127),
        }
    }

    fn find(&self, root: &str, max_depth: usize) -> Script {
        let tree = self.tree.lock();
        if !matches!(tree.get(root), Some(Node::Dir)) {
            return Script::finished(format!("find: {root}: No such file or directory\n"), 1);
        }

        let prefix = format!("{root}/");
        let mut output = String::new();
        for (path, node) in tree.range(prefix.clone()..) {
            let Some(relative) = path.strip_prefix(&prefix) else {
                break;
            };
            if relative.split('/').count() > max_depth {
                continue;
            }
            let (size, mode) = match node {
                Node::Dir => (DIR_SIZE, DIR_MODE),
                Node::File(content) => (content.len(), FILE_MODE),
            };
            output.push_str(&format!("{size} {EPOCH} {EPOCH} {EPOCH} {mode:x} {path}\n"));
        }
        Script::finished(output, 0)
    }

    fn cat(&self, path: &str) -> Script {
        match self.tree.lock().get(path) {
            Some(Node::File(content)) => Script::finished(content.clone(), 0),
            Some(Node::Dir) => Script::finished("cat: read error: Is a directory\n", 1),
            None => Script::finished(
                format!("cat: can't open '{path}': No such file or directory\n"),
                1,
            ),
        }
    }

    fn tail(&self, path: &str) -> Script {
        let content = match self.tree.lock().get(path) {
            Some(Node::File(content)) => content.clone(),
            _ => {
                return Script::finished(
                    format!(
                        "tail: can't open '{path}': No such file or directory\ntail: no files\n"
                    ),
                    1,
                )
            }
        };

        match *self.stream_failure.lock() {
            Some(exit_code) => Script {
                phases: vec![
                    SessionPhase::Scheduled,
                    SessionPhase::Running,
                    SessionPhase::Failed {
                        exit_code: Some(exit_code),
                    },
                ],
                output: content,
                follow_forever: false,
            },
            None => Script {
                phases: vec![SessionPhase::Scheduled, SessionPhase::Running],
                output: content,
                follow_forever: true,
            },
        }
    }

    fn session(&self, id: &SessionId) -> Result<Script, SandboxError> {
        self.sessions
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| BackendError::msg(format!("no such session: {id}")).into())
    }
}

#[async_trait]
impl Scheduler for FakeScheduler {
    async fn create(&self, spec: &SessionSpec) -> Result<SessionId, SandboxError> {
        let n = self.creates.fetch_add(1, Ordering::SeqCst);
        let id = SessionId::new(format!("fake-{n}"));
        let script = self.script(&spec.command);

        self.specs.lock().push(spec.clone());
        self.sessions.lock().insert(id.clone(), script);
        Ok(id)
    }

    async fn watch(&self, id: &SessionId) -> Result<PhaseStream, SandboxError> {
        let script = self.session(id)?;
        if self.hang.load(Ordering::SeqCst) {
            let scheduled = stream::iter([Ok(SessionPhase::Scheduled)]);
            return Ok(scheduled.chain(stream::pending()).boxed());
        }

        let terminal = script.phases.last().is_some_and(SessionPhase::is_terminal);
        let phases = stream::iter(script.phases.into_iter().map(Ok));
        if terminal {
            Ok(phases.boxed())
        } else {
            // still running: the watch stays open
            Ok(phases.chain(stream::pending()).boxed())
        }
    }

    async fn output(&self, id: &SessionId, follow: bool) -> Result<OutputStream, SandboxError> {
        let script = self.session(id)?;
        let output = stream::iter([Ok(script.output)]);
        if follow && script.follow_forever {
            Ok(output.chain(stream::pending()).boxed())
        } else {
            Ok(output.boxed())
        }
    }

    async fn delete(&self, id: &SessionId) -> Result<(), SandboxError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.sessions.lock().remove(id).is_none() {
            return Err(BackendError::msg(format!("no such session: {id}")).into());
        }
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(BackendError::msg(format!("failed to delete session {id}")).into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(scheduler: &FakeScheduler, command: &[&str]) -> Script {
        let command: Vec<String> = command.iter().map(|s| s.to_string()).collect();
        scheduler.script(&command)
    }

    #[test]
    fn test_find_respects_depth() {
        let scheduler = FakeScheduler::new("/mnt")
            .with_file("a.txt", "0123456789")
            .with_file("b/c.txt", "c")
            .with_file("b/d/e.txt", "e");

        let command = crate::volume::stat_cmd("/mnt", 2);
        let args: Vec<&str> = command.iter().map(String::as_str).collect();
        let script = run(&scheduler, &args);
        let output = String::from_utf8(script.output.to_vec()).unwrap();

        assert_eq!(
            output,
            "10 1700000000 1700000000 1700000000 81a4 /mnt/a.txt\n\
             4096 1700000000 1700000000 1700000000 41ed /mnt/b\n\
             1 1700000000 1700000000 1700000000 81a4 /mnt/b/c.txt\n\
             4096 1700000000 1700000000 1700000000 41ed /mnt/b/d\n"
        );
    }

    #[test]
    fn test_rm_removes_subtree() {
        let scheduler = FakeScheduler::new("/mnt")
            .with_file("b/c.txt", "c")
            .with_file("bc.txt", "bc");

        run(&scheduler, &["rm", "-rf", "/mnt/b"]);
        assert!(!scheduler.exists("b"));
        assert!(!scheduler.exists("b/c.txt"));
        assert!(scheduler.exists("bc.txt"));
    }

    #[test]
    fn test_unknown_command() {
        let scheduler = FakeScheduler::new("/mnt");
        let script = run(&scheduler, &["ls", "/mnt"]);
        assert_eq!(&script.output[..], b"sh: ls: not found\n");
        assert_eq!(
            script.phases.last(),
            Some(&SessionPhase::Failed {
                exit_code: Some(127)
            })
        );
    }
}
