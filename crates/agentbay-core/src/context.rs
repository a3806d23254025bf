//! Context sync bindings and the per-path status records the service reports.

use serde::{Deserialize, Serialize};

use crate::error::AgentBayError;
use crate::policy::SyncPolicy;

/// Binds a context to a mount path inside a session.
///
/// Configuration only: attached at session creation, never persisted by itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContextSync {
    pub context_id: String,
    pub path: String,
    #[serde(default)]
    pub policy: SyncPolicy,
}

impl ContextSync {
    pub fn new(context_id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            context_id: context_id.into(),
            path: path.into(),
            policy: SyncPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: SyncPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn validate(&self) -> Result<(), AgentBayError> {
        if self.context_id.trim().is_empty() {
            return Err(AgentBayError::Validation(
                "context sync requires a context id".to_string(),
            ));
        }
        if self.path.trim().is_empty() {
            return Err(AgentBayError::Validation(
                "context sync requires a mount path".to_string(),
            ));
        }
        self.policy.validate()
    }

    pub fn target(&self) -> SyncTarget {
        SyncTarget {
            context_id: self.context_id.clone(),
            path: self.path.clone(),
        }
    }
}

/// A `(context, path)` pair whose sync progress is being awaited.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SyncTarget {
    pub context_id: String,
    pub path: String,
}

/// Direction of a context sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    Upload,
    Download,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Upload => "upload",
            SyncMode::Download => "download",
        }
    }
}

/// Status of one sync task. `Success` and `Failed` are terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SyncStatus {
    Pending,
    Running,
    Syncing,
    Success,
    Failed,
    Other(String),
}

impl SyncStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncStatus::Success | SyncStatus::Failed)
    }
}

impl From<String> for SyncStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Pending" => SyncStatus::Pending,
            "Running" => SyncStatus::Running,
            "Syncing" => SyncStatus::Syncing,
            "Success" => SyncStatus::Success,
            "Failed" => SyncStatus::Failed,
            _ => SyncStatus::Other(s),
        }
    }
}

impl From<SyncStatus> for String {
    fn from(status: SyncStatus) -> Self {
        match status {
            SyncStatus::Pending => "Pending".to_string(),
            SyncStatus::Running => "Running".to_string(),
            SyncStatus::Syncing => "Syncing".to_string(),
            SyncStatus::Success => "Success".to_string(),
            SyncStatus::Failed => "Failed".to_string(),
            SyncStatus::Other(s) => s,
        }
    }
}

/// One per-path record returned by the context status query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextStatusData {
    pub context_id: String,
    pub path: String,
    pub status: SyncStatus,
    #[serde(default)]
    pub error_message: Option<String>,
    /// `upload` or `download`
    #[serde(default)]
    pub task_type: Option<String>,
    #[serde(default)]
    pub start_time: Option<i64>,
    #[serde(default)]
    pub finish_time: Option<i64>,
}

impl ContextStatusData {
    pub fn matches(&self, target: &SyncTarget) -> bool {
        self.context_id == target.context_id && self.path == target.path
    }
}
