//! Append-only JSON-lines history store.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, instrument, warn};

use crate::collaborator_traits::{CollaboratorResult, HistoryStore};
use crate::schema::{HistoryRecord, SubjectId};

/// File-backed [`HistoryStore`]: one JSON document per line.
///
/// Each append runs to completion on the blocking pool even if the caller
/// stops waiting, and appends are serialized so lines never interleave. A
/// line left without its newline is terminated before the next append.
/// Unparseable lines are skipped on read.
pub struct JsonlHistoryStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl JsonlHistoryStore {
    /// Open (or lazily create) a history file. Creates parent directories.
    pub async fn open(path: impl AsRef<Path>) -> CollaboratorResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        Ok(Self {
            path,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl HistoryStore for JsonlHistoryStore {
    #[instrument(skip(self, record), fields(subject_id = %record.subject_id))]
    async fn append(&self, record: &HistoryRecord) -> CollaboratorResult<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let path = self.path.clone();
        let lock = Arc::clone(&self.write_lock);
        tokio::task::spawn_blocking(move || {
            let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            append_line(&path, &line)
        })
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))??;
        debug!("history record appended");
        Ok(())
    }

    async fn recent_for(
        &self,
        subject_id: &SubjectId,
        limit: usize,
    ) -> CollaboratorResult<Vec<HistoryRecord>> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut matching = Vec::new();
        for (line_no, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<HistoryRecord>(line) {
                Ok(record) if &record.subject_id == subject_id => matching.push(record),
                Ok(_) => {}
                Err(e) => warn!(line = line_no + 1, error = %e, "skipping malformed history line"),
            }
        }

        matching.sort_by(|a, b| b.timestamp_millis.cmp(&a.timestamp_millis));
        matching.truncate(limit);
        Ok(matching)
    }
}

fn append_line(path: &Path, line: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)?;
    if file.metadata()?.len() > 0 {
        let mut last = [0u8; 1];
        file.seek(SeekFrom::End(-1))?;
        file.read_exact(&mut last)?;
        if last[0] != b'\n' {
            file.write_all(b"\n")?;
        }
    }
    file.write_all(line)?;
    file.flush()
}
