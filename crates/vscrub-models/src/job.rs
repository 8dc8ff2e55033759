//! Processing jobs and their lifecycle states.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a processing job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Requested processing operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    /// Blur out a burned-in watermark.
    #[default]
    RemoveWatermark,
    /// Strip subtitle tracks without re-encoding.
    RemoveSubtitle,
    /// Standard transcode for multi-file batches.
    Batch,
    /// High-quality transcode.
    Custom,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::RemoveWatermark => "remove-watermark",
            Operation::RemoveSubtitle => "remove-subtitle",
            Operation::Batch => "batch",
            Operation::Custom => "custom",
        }
    }

    /// Parse from the wire form; unknown values are rejected.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "remove-watermark" => Some(Operation::RemoveWatermark),
            "remove-subtitle" => Some(Operation::RemoveSubtitle),
            "batch" => Some(Operation::Batch),
            "custom" => Some(Operation::Custom),
            _ => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Job lifecycle state.
///
/// Legal transitions: `pending → running → {completed, failed, cancelled}`
/// and `pending → cancelled`. Terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Accepted, engine not yet started.
    #[default]
    Pending,
    /// The external engine acknowledged start.
    Running,
    /// Output artifact is ready for download.
    Completed,
    /// The engine reported an error.
    Failed,
    /// Cancelled before the engine started.
    Cancelled,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        }
    }

    /// Check if this is a terminal state (no more updates accepted).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One asynchronous processing task.
///
/// Owned exclusively by the job tracker; the API reads consistent
/// snapshots for status and download.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    pub id: JobId,
    pub user_id: String,
    pub operation: Operation,
    #[serde(default)]
    pub state: JobState,
    /// Progress percentage (0-100), non-decreasing while running.
    #[serde(default)]
    pub progress: u8,
    /// Uploaded artifact on local disk; removed when the job leaves
    /// `running`.
    #[serde(skip)]
    pub input_path: PathBuf,
    /// Original upload filename, used for the download disposition.
    pub input_name: String,
    /// Output artifact; set only when completed.
    #[serde(skip)]
    pub output_path: PathBuf,
    /// Engine error detail; set only when failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a new pending job.
    pub fn new(
        user_id: impl Into<String>,
        operation: Operation,
        input_path: impl Into<PathBuf>,
        input_name: impl Into<String>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: JobId::new(),
            user_id: user_id.into(),
            operation,
            state: JobState::Pending,
            progress: 0,
            input_path: input_path.into(),
            input_name: input_name.into(),
            output_path: output_path.into(),
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
