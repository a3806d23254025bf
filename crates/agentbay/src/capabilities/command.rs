use agentbay_core::{AgentBayError, ApiResult};
use serde_json::json;
use tracing::instrument;

use crate::session::Session;

pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Shell command execution inside a session.
pub struct Command<'a> {
    session: &'a Session,
}

impl<'a> Command<'a> {
    pub(crate) fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// Run `command` and return its output. `timeout_ms` defaults to one
    /// second.
    #[instrument(skip(self), fields(session_id = %self.session.session_id()), level = "debug")]
    pub async fn execute(&self, command: &str, timeout_ms: Option<u64>) -> ApiResult<String> {
        if command.trim().is_empty() {
            return ApiResult::invalid("command must not be empty");
        }
        self.session
            .call_tool(
                "shell",
                json!({
                    "command": command,
                    "timeout_ms": timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
                }),
            )
            .await
            .map_err(|e| e.into_capability(AgentBayError::Command))
    }
}
