use chrono::{DateTime, Utc};

use super::{DirMap, StatRecord};

/// Format handed to `stat -c`: size, atime, mtime, ctime, raw mode, name
const STAT_FORMAT: &str = "%s %X %Y %Z %f %n";
const FIELDS: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatError {
    #[error("malformed stat output {line:?}: {reason}")]
    MalformedStatOutput { line: String, reason: String },
}

impl StatError {
    fn malformed(line: &str, reason: impl Into<String>) -> Self {
        StatError::MalformedStatOutput {
            line: line.to_string(),
            reason: reason.into(),
        }
    }
}

/// Command that walks `root` down to `max_depth` levels and stats every
///  entry it finds, one line per entry.
pub fn stat_cmd(root: &str, max_depth: usize) -> Vec<String> {
    let depth = max_depth.to_string();
    [
        "find",
        root,
        "-mindepth",
        "1",
        "-maxdepth",
        depth.as_str(),
        "-exec",
        "stat",
        "-c",
        STAT_FORMAT,
        "{}",
        "+",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Parse the output of [`stat_cmd`] run against `mountpoint + path`.
///
/// Paths in the map are relative to `path`. Directories shallower than
///  `max_depth` are marked explored; deeper ones are recorded but their
///  contents are unknown. Any line that cannot be interpreted fails the
///  whole parse.
pub fn parse_stat_output(
    output: &[u8],
    mountpoint: &str,
    path: &str,
    max_depth: usize,
) -> Result<DirMap, StatError> {
    let root = format!("{mountpoint}{path}");
    let mut map = DirMap::new();

    for raw in output.split(|b| *b == b'\n') {
        let line = std::str::from_utf8(raw).map_err(|err| {
            StatError::malformed(&String::from_utf8_lossy(raw), format!("invalid utf-8: {err}"))
        })?;
        if line.trim().is_empty() {
            continue;
        }

        let (relative, record) = parse_line(line, &root)?;
        let parent = match relative.rfind('/') {
            Some(idx) => &relative[..idx],
            None => "",
        };
        if !map.is_dir(parent) {
            return Err(StatError::malformed(
                line,
                format!("parent directory {parent:?} was not listed before it"),
            ));
        }

        let depth = relative.split('/').count();
        if record.is_dir() && depth < max_depth {
            map.mark_explored(relative.clone());
        }
        map.insert(relative, record);
    }

    Ok(map)
}

fn parse_line(line: &str, root: &str) -> Result<(String, StatRecord), StatError> {
    let fields: Vec<&str> = line.splitn(FIELDS, ' ').collect();
    if fields.len() != FIELDS {
        return Err(StatError::malformed(
            line,
            format!("expected {FIELDS} fields, found {}", fields.len()),
        ));
    }

    let size = fields[0]
        .parse::<u64>()
        .map_err(|err| StatError::malformed(line, format!("bad size: {err}")))?;
    let atime = parse_epoch(line, "atime", fields[1])?;
    let mtime = parse_epoch(line, "mtime", fields[2])?;
    let ctime = parse_epoch(line, "ctime", fields[3])?;
    let mode = u32::from_str_radix(fields[4], 16)
        .map_err(|err| StatError::malformed(line, format!("bad mode: {err}")))?;

    let full = fields[5];
    let relative = full
        .strip_prefix(root)
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|rest| !rest.is_empty())
        .ok_or_else(|| StatError::malformed(line, format!("path is not under {root:?}")))?;
    let name = relative.rsplit('/').next().unwrap_or(relative);
    if name.is_empty() {
        return Err(StatError::malformed(line, "empty file name"));
    }

    let record = StatRecord {
        name: name.to_string(),
        size,
        atime,
        mtime,
        ctime,
        mode,
    };
    Ok((relative.to_string(), record))
}

fn parse_epoch(line: &str, field: &str, value: &str) -> Result<DateTime<Utc>, StatError> {
    let secs = value
        .parse::<i64>()
        .map_err(|err| StatError::malformed(line, format!("bad {field}: {err}")))?;
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| StatError::malformed(line, format!("{field} out of range")))
}
