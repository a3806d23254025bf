//! A live handle to a remote session and its lifecycle operations.
//!
//! States: `Active <-> Paused -> Deleted`. Lifecycle changes take
//! `&mut self`, so a session cannot be paused, resumed or deleted while
//! capability objects or watches borrowed from it are alive. Capability
//! calls take `&self` and may run concurrently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use agentbay_core::{AgentBayError, ApiResult, ContextSync, RawEnvelope, SyncMode, SyncTarget};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::capabilities::{Code, Command, FileSystem, Oss};
use crate::client::ApiClient;
use crate::context_sync::{ContextManager, SyncWaitOptions};

pub const STATUS_RUNNING: &str = "RUNNING";
pub const STATUS_PAUSING: &str = "PAUSING";
pub const STATUS_PAUSED: &str = "PAUSED";
pub const STATUS_RESUMING: &str = "RESUMING";

/// Local view of the session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Paused,
    Deleted,
}

/// Timeout and poll interval for pause/resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionOptions {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for TransitionOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(600),
            poll_interval: Duration::from_secs(2),
        }
    }
}

/// Session details as reported by `GetSession`.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
pub struct SessionInfo {
    pub session_id: String,
    pub status: String,
    pub resource_url: String,
    pub app_instance_id: Option<String>,
    pub resource_id: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum Transition {
    Pause,
    Resume,
}

impl Transition {
    fn name(self) -> &'static str {
        match self {
            Transition::Pause => "pause",
            Transition::Resume => "resume",
        }
    }

    fn action(self) -> &'static str {
        match self {
            Transition::Pause => "PauseSessionAsync",
            Transition::Resume => "ResumeSessionAsync",
        }
    }

    fn target(self) -> &'static str {
        match self {
            Transition::Pause => STATUS_PAUSED,
            Transition::Resume => STATUS_RUNNING,
        }
    }

    /// Statuses that mean "not there yet" rather than "went wrong".
    fn in_progress(self, status: &str) -> bool {
        match self {
            Transition::Pause => status == STATUS_PAUSING || status == STATUS_RUNNING,
            Transition::Resume => status == STATUS_RESUMING || status == STATUS_PAUSED,
        }
    }

    fn reached(self) -> SessionState {
        match self {
            Transition::Pause => SessionState::Paused,
            Transition::Resume => SessionState::Active,
        }
    }
}

pub struct Session {
    client: Arc<ApiClient>,
    session_id: String,
    resource_url: String,
    image_id: Option<String>,
    context_syncs: Vec<ContextSync>,
    state: SessionState,
    created_at: DateTime<Utc>,
    initial_sync: Option<ApiResult<()>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &self.session_id)
            .field("resource_url", &self.resource_url)
            .field("state", &self.state)
            .finish()
    }
}

impl Session {
    pub(crate) fn new(
        client: Arc<ApiClient>,
        session_id: String,
        resource_url: String,
        image_id: Option<String>,
        context_syncs: Vec<ContextSync>,
    ) -> Self {
        Self {
            client,
            session_id,
            resource_url,
            image_id,
            context_syncs,
            state: SessionState::Active,
            created_at: Utc::now(),
            initial_sync: None,
        }
    }

    pub(crate) fn with_state(mut self, state: SessionState) -> Self {
        self.state = state;
        self
    }

    pub(crate) fn set_initial_sync(&mut self, outcome: ApiResult<()>) {
        self.initial_sync = Some(outcome);
    }

    pub(crate) fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn resource_url(&self) -> &str {
        &self.resource_url
    }

    pub fn image_id(&self) -> Option<&str> {
        self.image_id.as_deref()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn context_syncs(&self) -> &[ContextSync] {
        &self.context_syncs
    }

    /// Outcome of the sync wait performed at creation, when context syncs
    /// were attached.
    pub fn initial_sync(&self) -> Option<&ApiResult<()>> {
        self.initial_sync.as_ref()
    }

    pub(crate) fn ensure_live(&self) -> Result<(), AgentBayError> {
        if self.state == SessionState::Deleted {
            return Err(AgentBayError::Validation(format!(
                "session {} has been deleted",
                self.session_id
            )));
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Tool invocation
    // ---------------------------------------------------------------------

    /// Issue one tool call and return the raw envelope.
    pub async fn invoke_tool(&self, tool_name: &str, args: &Value) -> Result<RawEnvelope, AgentBayError> {
        self.ensure_live()?;
        self.client.invoke_tool(&self.session_id, tool_name, args).await
    }

    /// Invoke a tool and parse the text of its first content item.
    pub async fn call_tool(&self, tool_name: &str, args: Value) -> ApiResult<String> {
        if let Err(e) = self.ensure_live() {
            return ApiResult::failure("", e);
        }
        self.client.call_tool(&self.session_id, tool_name, args).await
    }

    /// Invoke a tool and return its structured `Data` object.
    pub async fn call_tool_data(&self, tool_name: &str, args: Value) -> ApiResult<Value> {
        if let Err(e) = self.ensure_live() {
            return ApiResult::failure("", e);
        }
        self.client
            .call_tool_data(&self.session_id, tool_name, args)
            .await
    }

    pub fn command(&self) -> Command<'_> {
        Command::new(self)
    }

    pub fn filesystem(&self) -> FileSystem<'_> {
        FileSystem::new(self)
    }

    pub fn code(&self) -> Code<'_> {
        Code::new(self)
    }

    pub fn oss(&self) -> Oss<'_> {
        Oss::new(self)
    }

    pub fn context(&self) -> ContextManager<'_> {
        ContextManager::new(&self.client, &self.session_id)
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    #[instrument(skip(self), fields(session_id = %self.session_id), level = "debug")]
    pub async fn info(&self) -> ApiResult<SessionInfo> {
        if let Err(e) = self.ensure_live() {
            return ApiResult::failure("", e);
        }
        fetch_info(&self.client, &self.session_id).await
    }

    #[instrument(skip(self, labels), fields(session_id = %self.session_id), level = "debug")]
    pub async fn set_labels(&self, labels: &HashMap<String, String>) -> ApiResult<()> {
        if let Err(e) = self.ensure_live().and_then(|_| validate_labels(labels)) {
            return ApiResult::failure("", e);
        }
        let encoded = match serde_json::to_string(labels) {
            Ok(encoded) => encoded,
            Err(e) => return ApiResult::invalid(format!("labels are not serializable: {}", e)),
        };

        self.client
            .call(
                "SetLabel",
                json!({ "SessionId": self.session_id, "Labels": encoded }),
            )
            .await
            .map(|_| ())
    }

    #[instrument(skip(self), fields(session_id = %self.session_id), level = "debug")]
    pub async fn get_labels(&self) -> ApiResult<HashMap<String, String>> {
        if let Err(e) = self.ensure_live() {
            return ApiResult::failure("", e);
        }
        self.client
            .call("GetLabel", json!({ "SessionId": self.session_id }))
            .await
            .and_then(|data| {
                let labels = match data.get("Labels") {
                    Some(Value::String(s)) if s.is_empty() => return Ok(HashMap::new()),
                    Some(Value::String(s)) => serde_json::from_str::<Value>(s)
                        .map_err(|e| AgentBayError::Api(format!("invalid labels payload: {}", e)))?,
                    Some(v) => v.clone(),
                    None => return Ok(HashMap::new()),
                };
                serde_json::from_value(labels)
                    .map_err(|e| AgentBayError::Api(format!("invalid labels payload: {}", e)))
            })
    }

    /// Access URL for the session, optionally for a specific protocol/port.
    #[instrument(skip(self), fields(session_id = %self.session_id), level = "debug")]
    pub async fn get_link(&self, protocol: Option<&str>, port: Option<u16>) -> ApiResult<String> {
        if let Err(e) = self.ensure_live() {
            return ApiResult::failure("", e);
        }
        if let Some(port) = port {
            if !(30100..=30199).contains(&port) {
                return ApiResult::invalid(format!(
                    "port must be in the range [30100, 30199], got {}",
                    port
                ));
            }
        }

        let mut params = Map::new();
        params.insert("SessionId".to_string(), json!(self.session_id));
        if let Some(protocol) = protocol {
            params.insert("ProtocolType".to_string(), json!(protocol));
        }
        if let Some(port) = port {
            params.insert("Port".to_string(), json!(port));
        }

        self.client
            .call("GetLink", Value::Object(params))
            .await
            .and_then(|data| {
                data.get("Url")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| AgentBayError::Api("link response has no Url".to_string()))
            })
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Pause the session and wait until it reports `PAUSED`.
    pub async fn pause(&mut self, options: TransitionOptions) -> ApiResult<String> {
        self.transition(Transition::Pause, options).await
    }

    /// Resume the session and wait until it reports `RUNNING`.
    pub async fn resume(&mut self, options: TransitionOptions) -> ApiResult<String> {
        self.transition(Transition::Resume, options).await
    }

    #[instrument(skip(self), fields(session_id = %self.session_id), level = "debug")]
    async fn transition(&mut self, transition: Transition, options: TransitionOptions) -> ApiResult<String> {
        if let Err(e) = self.ensure_live() {
            return ApiResult::failure("", e);
        }

        // Already there: repeated calls are no-ops.
        if let ApiResult::Success { request_id, data } = fetch_info(&self.client, &self.session_id).await {
            if data.status == transition.target() {
                debug!(
                    "Session {} already {}, skipping {}",
                    self.session_id,
                    data.status,
                    transition.name()
                );
                self.state = transition.reached();
                return ApiResult::success(request_id, data.status);
            }
        }

        let request_id = match self
            .client
            .call(transition.action(), json!({ "SessionId": self.session_id }))
            .await
        {
            ApiResult::Success { request_id, .. } => request_id,
            ApiResult::Failure { request_id, error } => {
                return ApiResult::failure(request_id, error);
            }
        };

        info!("Requested {} of session {}", transition.name(), self.session_id);

        let started = Instant::now();
        let mut last_status = None;
        loop {
            tokio::time::sleep(options.poll_interval).await;

            match fetch_info(&self.client, &self.session_id).await {
                ApiResult::Success { data, .. } => {
                    if data.status == transition.target() {
                        self.state = transition.reached();
                        info!(
                            "Session {} reached {} after {:?}",
                            self.session_id,
                            data.status,
                            started.elapsed()
                        );
                        return ApiResult::success(request_id, data.status);
                    }
                    if !transition.in_progress(&data.status) {
                        warn!(
                            "Session {} {} ended in unexpected status {}",
                            self.session_id,
                            transition.name(),
                            data.status
                        );
                        return ApiResult::failure(
                            request_id,
                            AgentBayError::Api(format!(
                                "{} failed: session entered status {}",
                                transition.name(),
                                data.status
                            )),
                        );
                    }
                    debug!("Session {} status {}", self.session_id, data.status);
                    last_status = Some(data.status);
                }
                ApiResult::Failure { error, .. } => {
                    warn!("Status query for session {} failed: {}", self.session_id, error);
                }
            }

            if started.elapsed() >= options.timeout {
                break;
            }
        }

        warn!(
            "{} of session {} timed out after {:?}",
            transition.name(),
            self.session_id,
            options.timeout
        );
        ApiResult::failure(
            request_id,
            AgentBayError::Timeout {
                operation: transition.name().to_string(),
                last_status,
            },
        )
    }

    /// Release the session. With `sync_context`, pending context data is
    /// flushed (uploaded) and awaited before the release call is issued.
    pub async fn delete(&mut self, sync_context: bool) -> ApiResult<()> {
        self.delete_with(sync_context, SyncWaitOptions::on_delete())
            .await
    }

    #[instrument(skip(self), fields(session_id = %self.session_id), level = "debug")]
    pub async fn delete_with(&mut self, sync_context: bool, options: SyncWaitOptions) -> ApiResult<()> {
        if let Err(e) = self.ensure_live() {
            return ApiResult::failure("", e);
        }

        if sync_context {
            let targets: Vec<SyncTarget> = self.context_syncs.iter().map(ContextSync::target).collect();
            let flushed = self
                .context()
                .sync_and_wait(None, None, SyncMode::Upload, &targets, options)
                .await;
            if let Some(error) = flushed.error() {
                warn!(
                    "Context flush before deleting session {} failed: {}; deleting anyway",
                    self.session_id, error
                );
            }
        }

        let result = self
            .client
            .call("ReleaseMcpSession", json!({ "SessionId": self.session_id }))
            .await;

        if result.is_success() {
            self.state = SessionState::Deleted;
            info!("Deleted session {}", self.session_id);
        }
        result.map(|_| ())
    }
}

pub(crate) async fn fetch_info(client: &ApiClient, session_id: &str) -> ApiResult<SessionInfo> {
    client
        .call("GetSession", json!({ "SessionId": session_id }))
        .await
        .and_then(|data| {
            serde_json::from_value::<SessionInfo>(data)
                .map_err(|e| AgentBayError::Api(format!("invalid session payload: {}", e)))
        })
}

pub(crate) fn validate_labels(labels: &HashMap<String, String>) -> Result<(), AgentBayError> {
    if labels.is_empty() {
        return Err(AgentBayError::Validation("labels must not be empty".to_string()));
    }
    for (key, value) in labels {
        if key.trim().is_empty() {
            return Err(AgentBayError::Validation("label keys must not be empty".to_string()));
        }
        if value.trim().is_empty() {
            return Err(AgentBayError::Validation(format!(
                "label value for {} must not be empty",
                key
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{api_fail, api_ok, context_status, session_status, ScriptedTransport};

    fn session_with(transport: &Arc<ScriptedTransport>, syncs: Vec<ContextSync>) -> Session {
        let client = Arc::new(ApiClient::new(transport.clone()));
        Session::new(client, "s-1".to_string(), String::new(), None, syncs)
    }

    const FAST: TransitionOptions = TransitionOptions {
        timeout: Duration::from_secs(10),
        poll_interval: Duration::from_secs(1),
    };

    #[tokio::test(start_paused = true)]
    async fn test_pause_polls_until_paused() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push("GetSession", session_status("r0", "s-1", STATUS_RUNNING));
        transport.push("GetSession", session_status("r1", "s-1", STATUS_PAUSING));
        transport.push("GetSession", session_status("r2", "s-1", STATUS_PAUSED));
        transport.push("PauseSessionAsync", api_ok("req-pause", Value::Null));
        let mut session = session_with(&transport, vec![]);

        let result = session.pause(FAST).await;
        assert_eq!(result, ApiResult::success("req-pause", STATUS_PAUSED.to_string()));
        assert_eq!(session.state(), SessionState::Paused);
        assert_eq!(transport.count("PauseSessionAsync"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_is_noop_when_already_paused() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push("GetSession", session_status("r0", "s-1", STATUS_PAUSED));
        let mut session = session_with(&transport, vec![]);

        assert!(session.pause(FAST).await.is_success());
        assert!(session.pause(FAST).await.is_success());
        assert_eq!(transport.count("PauseSessionAsync"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_timeout_carries_last_status() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push("GetSession", session_status("r0", "s-1", STATUS_PAUSING));
        transport.push("PauseSessionAsync", api_ok("req-pause", Value::Null));
        let mut session = session_with(&transport, vec![]);

        let result = session.pause(FAST).await;
        assert_eq!(
            result.error(),
            Some(&AgentBayError::Timeout {
                operation: "pause".to_string(),
                last_status: Some(STATUS_PAUSING.to_string()),
            })
        );
        assert_eq!(session.state(), SessionState::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_unexpected_status_is_distinct_failure() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push("GetSession", session_status("r0", "s-1", STATUS_PAUSED));
        transport.push("GetSession", session_status("r1", "s-1", "DELETED"));
        transport.push("ResumeSessionAsync", api_ok("req-resume", Value::Null));
        let mut session = session_with(&transport, vec![]).with_state(SessionState::Paused);

        let result = session.resume(FAST).await;
        assert!(matches!(result.error(), Some(AgentBayError::Api(_))));
        assert_eq!(session.state(), SessionState::Paused);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_with_sync_flushes_before_release() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push("SyncContext", api_ok("r-sync", Value::Null));
        transport.push(
            "GetContextInfo",
            context_status("r1", &[("ctx", "/data", "Running", "upload")]),
        );
        transport.push(
            "GetContextInfo",
            context_status("r2", &[("ctx", "/data", "Success", "upload")]),
        );
        transport.push("ReleaseMcpSession", api_ok("r-del", Value::Null));
        let mut session = session_with(&transport, vec![ContextSync::new("ctx", "/data")]);

        let result = session
            .delete_with(true, SyncWaitOptions::new(10, Duration::from_secs(1)))
            .await;
        assert_eq!(result, ApiResult::success("r-del", ()));
        assert_eq!(
            transport.actions(),
            vec!["SyncContext", "GetContextInfo", "GetContextInfo", "ReleaseMcpSession"]
        );
        assert_eq!(transport.calls()[0].1["Mode"], "upload");
        assert_eq!(session.state(), SessionState::Deleted);

        let again = session.call_tool("shell", json!({})).await;
        assert!(matches!(again.error(), Some(AgentBayError::Validation(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_without_mounts_waits_for_upload_task() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push("SyncContext", api_ok("r-sync", Value::Null));
        transport.push("GetContextInfo", context_status("r1", &[]));
        transport.push(
            "GetContextInfo",
            context_status("r2", &[("ctx", "/data", "Running", "upload")]),
        );
        transport.push(
            "GetContextInfo",
            context_status("r3", &[("ctx", "/data", "Success", "upload")]),
        );
        transport.push("ReleaseMcpSession", api_ok("r-del", Value::Null));
        let mut session = session_with(&transport, vec![]);

        let result = session
            .delete_with(true, SyncWaitOptions::new(10, Duration::from_secs(1)))
            .await;
        assert_eq!(result, ApiResult::success("r-del", ()));
        assert_eq!(
            transport.actions(),
            vec![
                "SyncContext",
                "GetContextInfo",
                "GetContextInfo",
                "GetContextInfo",
                "ReleaseMcpSession"
            ]
        );
        assert_eq!(session.state(), SessionState::Deleted);
    }

    #[tokio::test]
    async fn test_delete_failure_keeps_session_usable() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push("ReleaseMcpSession", api_fail("r-del", "session busy"));
        let mut session = session_with(&transport, vec![]);

        let result = session.delete(false).await;
        assert_eq!(result.error_message().as_deref(), Some("session busy"));
        assert_eq!(result.request_id(), "r-del");
        assert_eq!(session.state(), SessionState::Active);
    }

    #[tokio::test]
    async fn test_labels_round_trip_through_string_payload() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push("SetLabel", api_ok("r1", Value::Null));
        transport.push(
            "GetLabel",
            api_ok("r2", json!({ "Labels": "{\"team\":\"infra\"}" })),
        );
        let session = session_with(&transport, vec![]);

        let labels = HashMap::from([("team".to_string(), "infra".to_string())]);
        assert!(session.set_labels(&labels).await.is_success());
        assert_eq!(session.get_labels().await.into_result().unwrap(), labels);

        let empty = session.set_labels(&HashMap::new()).await;
        assert!(matches!(empty.error(), Some(AgentBayError::Validation(_))));
        assert_eq!(transport.count("SetLabel"), 1);
    }

    #[tokio::test]
    async fn test_get_link_validates_port() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push("GetLink", api_ok("r1", json!({ "Url": "wss://link" })));
        let session = session_with(&transport, vec![]);

        assert!(!session.get_link(None, Some(8080)).await.is_success());
        let link = session.get_link(Some("https"), Some(30150)).await;
        assert_eq!(link.data().map(String::as_str), Some("wss://link"));
        assert_eq!(transport.calls()[0].1["Port"], 30150);
    }
}
