use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::info;

const HEADER: &str = "epoch,direction,user_id,name,type,text";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::In => write!(f, "in"),
            Direction::Out => write!(f, "out"),
        }
    }
}

/// One row of the dialog audit trail.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub epoch: i64,
    pub direction: Direction,
    pub user_id: i64,
    pub name: String,
    pub content_type: String,
    pub text: String,
}

impl LogRecord {
    fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{},{},{}\n",
            self.epoch,
            self.direction,
            self.user_id,
            csv_field(&self.name),
            csv_field(&self.content_type),
            csv_field(&self.text),
        )
    }
}

/// Quote a field when it contains a delimiter, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Append-only CSV log. The file is reopened for every record.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    /// Create the log file with its header row if it does not exist yet.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create audit log directory: {}", parent.display())
                })?;
            }
            let mut file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create audit log: {}", path.display()))?;
            writeln!(file, "{}", HEADER)
                .with_context(|| format!("Failed to write audit log header: {}", path.display()))?;
            info!("Created audit log at: {}", path.display());
        }

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, record: &LogRecord) -> Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open audit log: {}", self.path.display()))?;
        file.write_all(record.to_csv_row().as_bytes())
            .await
            .with_context(|| format!("Failed to append to audit log: {}", self.path.display()))?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(text: &str) -> LogRecord {
        LogRecord {
            epoch: 1_700_000_000,
            direction: Direction::In,
            user_id: 123456,
            name: "Ada Lovelace".to_string(),
            content_type: "text".to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_open_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");

        AuditLog::open(&path).unwrap();
        AuditLog::open(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, format!("{}\n", HEADER));
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/logs/dialog.csv");

        AuditLog::open(&path).unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_append_adds_rows_after_header() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::open(&dir.path().join("log.csv")).unwrap();

        log.append(&record("hello")).await.unwrap();
        let mut out = record("bye");
        out.direction = Direction::Out;
        out.name = "admin".to_string();
        log.append(&out).await.unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "1700000000,in,123456,Ada Lovelace,text,hello");
        assert_eq!(lines[2], "1700000000,out,123456,admin,text,bye");
    }

    #[test]
    fn test_fields_with_delimiters_are_quoted() {
        let row = record("hi, \"friend\"\nsecond line").to_csv_row();
        assert_eq!(
            row,
            "1700000000,in,123456,Ada Lovelace,text,\"hi, \"\"friend\"\"\nsecond line\"\n"
        );
    }
}
