//! Hand-off of finished sessions to persistent storage

use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::{fs::OpenOptions, io::AsyncWriteExt};
use tracing::{debug, info};

use crate::error::RecorderError;

/// Summary of a confirmed session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: u64,
    pub mood: Option<String>,
    pub protocol: Option<String>,
    pub notes: Option<String>,
    pub duration_seconds: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Destination for finished session summaries
#[async_trait]
pub trait SessionRecorder: Send + Sync {
    async fn record(&self, summary: &SessionSummary) -> Result<(), RecorderError>;
}

/// Appends one JSON object per line to a log file
#[derive(Debug, Clone)]
pub struct JsonlSessionLog {
    path: PathBuf,
}

impl JsonlSessionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SessionRecorder for JsonlSessionLog {
    async fn record(&self, summary: &SessionSummary) -> Result<(), RecorderError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut line = serde_json::to_vec(summary)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;

        info!(
            "Recorded session {} ({}s) to {}",
            summary.session_id,
            summary.duration_seconds,
            self.path.display()
        );
        Ok(())
    }
}

/// Keeps summaries in memory
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    summaries: Mutex<Vec<SessionSummary>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summaries(&self) -> Vec<SessionSummary> {
        self.summaries
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SessionRecorder for MemoryRecorder {
    async fn record(&self, summary: &SessionSummary) -> Result<(), RecorderError> {
        debug!("Keeping session {} in memory", summary.session_id);
        if let Ok(mut summaries) = self.summaries.lock() {
            summaries.push(summary.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(session_id: u64) -> SessionSummary {
        let now = Utc::now();
        SessionSummary {
            session_id,
            mood: Some("calm".to_string()),
            protocol: Some("1.3 ATA".to_string()),
            notes: None,
            duration_seconds: 3600,
            started_at: now,
            finished_at: now,
        }
    }

    #[tokio::test]
    async fn jsonl_log_appends_one_line_per_session() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlSessionLog::new(dir.path().join("nested").join("sessions.jsonl"));

        log.record(&summary(1)).await.unwrap();
        log.record(&summary(2)).await.unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        let parsed: Vec<SessionSummary> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].session_id, 1);
        assert_eq!(parsed[1].protocol.as_deref(), Some("1.3 ATA"));
    }

    #[tokio::test]
    async fn memory_recorder_keeps_summaries() {
        let recorder = MemoryRecorder::new();
        let expected = summary(7);
        recorder.record(&expected).await.unwrap();
        assert_eq!(recorder.summaries(), vec![expected]);
    }
}
