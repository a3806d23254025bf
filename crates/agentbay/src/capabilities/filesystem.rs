//! File operations inside a session.

use std::collections::HashMap;
use std::time::Duration;

use agentbay_core::{AgentBayError, ApiResult};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{instrument, warn};

use crate::session::Session;
use crate::watch::{self, FileChangeEvent, WatchHandle};

/// How `write_file` treats existing content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    #[default]
    Overwrite,
    Append,
}

impl WriteMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteMode::Overwrite => "overwrite",
            WriteMode::Append => "append",
        }
    }
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub is_directory: bool,
}

/// Metadata reported by `get_file_info`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub is_directory: bool,
    pub modified: Option<String>,
    pub permissions: Option<String>,
    /// Every `key: value` pair the tool returned, unparsed.
    pub raw: HashMap<String, String>,
}

pub struct FileSystem<'a> {
    session: &'a Session,
}

impl<'a> FileSystem<'a> {
    pub(crate) fn new(session: &'a Session) -> Self {
        Self { session }
    }

    async fn call(&self, tool: &str, args: serde_json::Value) -> ApiResult<String> {
        self.session
            .call_tool(tool, args)
            .await
            .map_err(|e| e.into_capability(AgentBayError::File))
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn read_file(&self, path: &str) -> ApiResult<String> {
        if path.is_empty() {
            return ApiResult::invalid("path must not be empty");
        }
        self.call("read_file", json!({ "path": path })).await
    }

    #[instrument(skip(self, content), fields(bytes = content.len()), level = "debug")]
    pub async fn write_file(&self, path: &str, content: &str, mode: WriteMode) -> ApiResult<()> {
        if path.is_empty() {
            return ApiResult::invalid("path must not be empty");
        }
        self.call(
            "write_file",
            json!({ "path": path, "content": content, "mode": mode.as_str() }),
        )
        .await
        .map(|_| ())
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn create_directory(&self, path: &str) -> ApiResult<()> {
        if path.is_empty() {
            return ApiResult::invalid("path must not be empty");
        }
        self.call("create_directory", json!({ "path": path }))
            .await
            .map(|_| ())
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn list_directory(&self, path: &str) -> ApiResult<Vec<DirectoryEntry>> {
        if path.is_empty() {
            return ApiResult::invalid("path must not be empty");
        }
        self.call("list_directory", json!({ "path": path }))
            .await
            .map(|text| parse_directory_listing(&text))
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn move_file(&self, source: &str, destination: &str) -> ApiResult<()> {
        if source.is_empty() || destination.is_empty() {
            return ApiResult::invalid("source and destination must not be empty");
        }
        self.call(
            "move_file",
            json!({ "source": source, "destination": destination }),
        )
        .await
        .map(|_| ())
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn get_file_info(&self, path: &str) -> ApiResult<FileInfo> {
        if path.is_empty() {
            return ApiResult::invalid("path must not be empty");
        }
        self.call("get_file_info", json!({ "path": path }))
            .await
            .map(|text| parse_file_info(&text, path))
    }

    /// Poll `path` for changes every `interval` and hand each non-empty
    /// batch of events to `callback` until the returned handle is stopped
    /// or dropped.
    ///
    /// The poller runs on the current tokio runtime; calling this outside
    /// one fails with a validation error.
    pub fn watch_directory<F>(
        &self,
        path: &str,
        interval: Duration,
        callback: F,
    ) -> Result<WatchHandle<'a>, AgentBayError>
    where
        F: Fn(Vec<FileChangeEvent>) + Send + Sync + 'static,
    {
        if path.is_empty() {
            return Err(AgentBayError::Validation("path must not be empty".to_string()));
        }
        self.session.ensure_live()?;
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(AgentBayError::Validation(
                "watch_directory must be called within a tokio runtime".to_string(),
            ));
        }
        Ok(watch::spawn(self.session, path, interval, callback))
    }
}

/// Lines look like `[DIR] name` or `[FILE] name`; anything else is skipped.
fn parse_directory_listing(text: &str) -> Vec<DirectoryEntry> {
    text.lines()
        .filter_map(|line| {
            let line = line.trim();
            if let Some(name) = line.strip_prefix("[DIR]") {
                Some(DirectoryEntry {
                    name: name.trim().to_string(),
                    is_directory: true,
                })
            } else if let Some(name) = line.strip_prefix("[FILE]") {
                Some(DirectoryEntry {
                    name: name.trim().to_string(),
                    is_directory: false,
                })
            } else {
                None
            }
        })
        .filter(|entry| !entry.name.is_empty())
        .collect()
}

fn parse_file_info(text: &str, path: &str) -> FileInfo {
    let raw: HashMap<String, String> = text
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect();

    let size = match raw.get("size") {
        Some(size) => size.parse().unwrap_or_else(|_| {
            warn!("Unparsable file size {:?} for {}", size, path);
            0
        }),
        None => 0,
    };

    FileInfo {
        name: raw
            .get("name")
            .cloned()
            .unwrap_or_else(|| path.rsplit('/').next().unwrap_or(path).to_string()),
        path: raw.get("path").cloned().unwrap_or_else(|| path.to_string()),
        size,
        is_directory: raw
            .get("isDirectory")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false),
        modified: raw.get("modified").cloned(),
        permissions: raw.get("permissions").cloned(),
        raw,
    }
}
