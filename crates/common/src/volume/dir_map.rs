use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::entry::Attributes;

const S_IFMT: u32 = 0o170000;
const S_IFDIR: u32 = 0o040000;

/// One line of stat output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatRecord {
    pub name: String,
    pub size: u64,
    pub atime: DateTime<Utc>,
    pub mtime: DateTime<Utc>,
    pub ctime: DateTime<Utc>,
    pub mode: u32,
}

impl StatRecord {
    pub fn is_dir(&self) -> bool {
        self.mode & S_IFMT == S_IFDIR
    }

    pub fn attributes(&self) -> Attributes {
        let mut attributes = Attributes::new();
        attributes
            .set_atime(self.atime)
            .set_mtime(self.mtime)
            .set_ctime(self.ctime)
            .set_mode(self.mode)
            .set_size(self.size);
        attributes
    }
}

/// Snapshot of a remote directory tree.
///
/// Keys are `/`-joined paths relative to the listed directory (`"a.txt"`,
///  `"b/c.txt"`); the listed directory itself is `""`. A directory is explored
///  when its contents were captured by the walk that produced the map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirMap {
    records: BTreeMap<String, StatRecord>,
    explored: BTreeSet<String>,
}

impl DirMap {
    pub(crate) fn new() -> Self {
        let mut map = Self::default();
        map.explored.insert(String::new());
        map
    }

    pub(crate) fn insert(&mut self, path: String, record: StatRecord) {
        self.records.insert(path, record);
    }

    pub(crate) fn mark_explored(&mut self, path: String) {
        self.explored.insert(path);
    }

    pub fn get(&self, path: &str) -> Option<&StatRecord> {
        self.records.get(path)
    }

    /// True for the root and for any recorded directory
    pub fn is_dir(&self, path: &str) -> bool {
        path.is_empty() || self.records.get(path).is_some_and(StatRecord::is_dir)
    }

    pub fn is_explored(&self, path: &str) -> bool {
        self.explored.contains(path)
    }

    /// Direct children of `dir`, as (relative path, record) pairs
    pub fn children<'a>(
        &'a self,
        dir: &'a str,
    ) -> Box<dyn Iterator<Item = (&'a str, &'a StatRecord)> + 'a> {
        if dir.is_empty() {
            return Box::new(
                self.records
                    .iter()
                    .filter(|(path, _)| !path.contains('/'))
                    .map(|(path, record)| (path.as_str(), record)),
            );
        }

        let prefix = format!("{dir}/");
        let start = prefix.clone();
        Box::new(
            self.records
                .range(start..)
                .take_while(move |(path, _)| path.starts_with(&prefix))
                .filter(move |(path, _)| !path[dir.len() + 1..].contains('/'))
                .map(|(path, record)| (path.as_str(), record)),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StatRecord)> {
        self.records.iter().map(|(path, record)| (path.as_str(), record))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
