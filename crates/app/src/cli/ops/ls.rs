use clap::Args;

use common::prelude::{Action, EntryError, EntryRef, Namespace};

const DATE_FORMAT: &str = "%d %b %Y %H:%M";
const UNKNOWN: &str = "<unknown>";

#[derive(Args, Debug, Clone)]
pub struct Ls {
    /// Path to list, made of canonical names
    #[arg(default_value = "/")]
    pub path: String,
}

#[derive(Debug, thiserror::Error)]
pub enum LsError {
    #[error(transparent)]
    Entry(#[from] EntryError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Ls {
    type Error = LsError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let ns = ctx.namespace()?;
        Ok(listing(&ns, &self.path).await?)
    }
}

struct Row {
    name: String,
    modified: String,
    actions: String,
}

impl Row {
    fn new(name: String, entry: &EntryRef) -> Self {
        let modified = entry
            .attributes()
            .mtime()
            .map(|mtime| mtime.format(DATE_FORMAT).to_string())
            .unwrap_or_else(|| UNKNOWN.to_string());
        Self {
            name,
            modified,
            actions: entry.actions().names().join(", "),
        }
    }
}

/// Render the entry at `path` and, if it can be listed, its children
pub async fn listing(ns: &Namespace, path: &str) -> Result<String, EntryError> {
    let entry = ns.find(path).await?;
    if !entry.supports(Action::List) {
        return Ok(table(&[Row::new(entry.display_name(), &entry)]));
    }

    let children = ns.cache().list(&entry).await?;
    let mut rows = vec![Row::new(".".to_string(), &entry)];
    rows.extend(
        children
            .values()
            .map(|child| Row::new(child.display_name(), child)),
    );
    Ok(table(&rows))
}

fn table(rows: &[Row]) -> String {
    let name_width = rows.iter().map(|row| row.name.len()).max().unwrap_or(0).max(4);
    let modified_width = rows
        .iter()
        .map(|row| row.modified.len())
        .max()
        .unwrap_or(0)
        .max(8);

    let header = format!("{:name_width$}  {:modified_width$}  ACTIONS", "NAME", "MODIFIED");
    std::iter::once(header)
        .chain(rows.iter().map(|row| {
            format!(
                "{:name_width$}  {:modified_width$}  {}",
                row.name, row.modified, row.actions
            )
        }))
        .map(|line| line.trim_end().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use common::prelude::{ActionCache, Entry, Registry};
    use common::testkit::{MemDir, MemFile};

    use super::*;

    fn namespace() -> Namespace {
        let file = MemFile::new("web/1", "log line\n");
        file.base().update_attributes(|attributes| {
            attributes.set_mtime(Utc.timestamp_opt(1_700_000_000, 0).unwrap());
        });

        let registry = Registry::new().unwrap();
        registry
            .register(Arc::new(MemDir::new("docker").with_dir(
                MemDir::new("containers").with_file("web/1", "log line\n"),
            )))
            .unwrap();
        registry.register(Arc::new(file)).unwrap();
        Namespace::new(Arc::new(registry), ActionCache::default())
    }

    #[tokio::test]
    async fn test_listing_directory() {
        let output = listing(&namespace(), "/docker").await.unwrap();
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("NAME"));
        assert!(lines[0].ends_with("MODIFIED   ACTIONS"));
        assert_eq!(
            lines[1].split_whitespace().collect::<Vec<_>>(),
            vec![".", "<unknown>", "list,", "delete,", "metadata"]
        );
        assert!(lines[2].starts_with("containers/ "));
    }

    #[tokio::test]
    async fn test_listing_file() {
        let output = listing(&namespace(), "/web#1").await.unwrap();
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("web#1  14 Nov 2023 22:13  read, stream"));
    }

    #[tokio::test]
    async fn test_listing_missing_path() {
        assert!(matches!(
            listing(&namespace(), "/nope").await,
            Err(EntryError::NotFound(_))
        ));
    }
}
