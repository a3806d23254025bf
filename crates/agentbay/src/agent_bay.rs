//! Entry point: session creation, lookup, listing and batch operations.

use std::collections::HashMap;
use std::sync::Arc;

use agentbay_core::{AgentBayError, ApiResult, ContextSync, SyncMode, SyncTarget, Transport};
use futures::future::join_all;
use serde_json::{json, Map, Value};
use tracing::{info, instrument, warn};

use crate::client::ApiClient;
use crate::config::Config;
use crate::context::ContextService;
use crate::context_sync::SyncWaitOptions;
use crate::http::HttpTransport;
use crate::session::{self, Session, SessionState, STATUS_PAUSED};

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Parameters for [`AgentBay::create`].
#[derive(Debug, Clone, Default)]
pub struct CreateSessionParams {
    pub image_id: Option<String>,
    pub labels: HashMap<String, String>,
    pub context_syncs: Vec<ContextSync>,
    pub is_vpc: bool,
    pub sync_wait: SyncWaitOptions,
}

impl CreateSessionParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(mut self, image_id: impl Into<String>) -> Self {
        self.image_id = Some(image_id.into());
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_context_sync(mut self, sync: ContextSync) -> Self {
        self.context_syncs.push(sync);
        self
    }

    pub fn with_vpc(mut self, is_vpc: bool) -> Self {
        self.is_vpc = is_vpc;
        self
    }

    pub fn with_sync_wait(mut self, options: SyncWaitOptions) -> Self {
        self.sync_wait = options;
        self
    }

    fn validate(&self) -> Result<(), AgentBayError> {
        if !self.labels.is_empty() {
            session::validate_labels(&self.labels)?;
        }
        for sync in &self.context_syncs {
            sync.validate()?;
        }
        Ok(())
    }

    fn to_request(&self) -> Result<Value, AgentBayError> {
        let mut params = Map::new();
        if let Some(image_id) = &self.image_id {
            params.insert("ImageId".to_string(), json!(image_id));
        }
        if !self.labels.is_empty() {
            let labels = serde_json::to_string(&self.labels)
                .map_err(|e| AgentBayError::Validation(format!("labels are not serializable: {}", e)))?;
            params.insert("Labels".to_string(), json!(labels));
        }
        if !self.context_syncs.is_empty() {
            let syncs = serde_json::to_value(&self.context_syncs).map_err(|e| {
                AgentBayError::Validation(format!("context syncs are not serializable: {}", e))
            })?;
            params.insert("ContextSyncs".to_string(), syncs);
        }
        if self.is_vpc {
            params.insert("VpcResource".to_string(), json!(true));
        }
        Ok(Value::Object(params))
    }
}

/// One page of `ListSession`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionListPage {
    pub session_ids: Vec<String>,
    pub next_token: Option<String>,
    pub max_results: u32,
    pub total_count: u32,
}

impl SessionListPage {
    fn from_body(body: &Value, limit: u32) -> Self {
        let session_ids = body
            .get("Data")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get("SessionId").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            session_ids,
            next_token: non_empty_token(body),
            max_results: as_u32(body.get("MaxResults")).unwrap_or(limit),
            total_count: as_u32(body.get("TotalCount")).unwrap_or(0),
        }
    }
}

fn non_empty_token(body: &Value) -> Option<String> {
    body.get("NextToken")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn as_u32(value: Option<&Value>) -> Option<u32> {
    value
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
}

/// Client for the AgentBay service.
#[derive(Clone)]
pub struct AgentBay {
    client: Arc<ApiClient>,
}

impl AgentBay {
    pub fn new(config: Config) -> Result<Self, AgentBayError> {
        let transport = HttpTransport::new(&config)?;
        info!(
            "AgentBay client for {} (region {})",
            config.base_url(),
            config.region_id
        );
        Ok(Self::with_transport(Arc::new(transport)))
    }

    /// Resolve configuration from the environment and `.env`.
    pub fn from_env() -> Result<Self, AgentBayError> {
        Self::new(Config::from_env()?)
    }

    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            client: Arc::new(ApiClient::new(transport)),
        }
    }

    pub fn context(&self) -> ContextService<'_> {
        ContextService::new(&self.client)
    }

    /// Create a session. With context syncs attached, waits for the
    /// initial download before returning; the outcome is available from
    /// [`Session::initial_sync`] and does not fail the create.
    #[instrument(skip(self, params), level = "debug")]
    pub async fn create(&self, params: CreateSessionParams) -> ApiResult<Session> {
        if let Err(e) = params.validate() {
            return ApiResult::failure("", e);
        }
        let request = match params.to_request() {
            Ok(request) => request,
            Err(e) => return ApiResult::failure("", e),
        };

        let created = self
            .client
            .call("CreateMcpSession", request)
            .await
            .and_then(|data| {
                if data.get("Success").and_then(Value::as_bool) == Some(false) {
                    let message = data
                        .get("ErrMsg")
                        .and_then(Value::as_str)
                        .unwrap_or("session creation failed");
                    return Err(AgentBayError::Api(message.to_string()));
                }
                let session_id = data
                    .get("SessionId")
                    .and_then(Value::as_str)
                    .filter(|id| !id.is_empty())
                    .ok_or_else(|| AgentBayError::Api("SessionId not found in response".to_string()))?;
                let resource_url = data
                    .get("ResourceUrl")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                Ok((session_id.to_string(), resource_url.to_string()))
            });

        let (request_id, (session_id, resource_url)) = match created {
            ApiResult::Success { request_id, data } => (request_id, data),
            ApiResult::Failure { request_id, error } => {
                warn!("Session creation failed: {}", error);
                return ApiResult::failure(request_id, error);
            }
        };

        info!("Created session {}", session_id);
        let mut session = Session::new(
            self.client.clone(),
            session_id,
            resource_url,
            params.image_id,
            params.context_syncs,
        );

        // Mounts without auto download never produce a download task.
        let targets: Vec<SyncTarget> = session
            .context_syncs()
            .iter()
            .filter(|sync| sync.policy.download_policy.auto_download)
            .map(ContextSync::target)
            .collect();
        if !targets.is_empty() {
            let outcome = session
                .context()
                .await_completion(&targets, Some(SyncMode::Download), params.sync_wait)
                .await;
            if let Some(error) = outcome.error() {
                warn!(
                    "Initial context sync for session {} did not complete: {}",
                    session.session_id(),
                    error
                );
            }
            session.set_initial_sync(outcome);
        }

        ApiResult::success(request_id, session)
    }

    /// Create several sessions concurrently. One result per input, in
    /// input order; individual failures do not abort the batch.
    pub async fn create_many(&self, params: Vec<CreateSessionParams>) -> Vec<ApiResult<Session>> {
        join_all(params.into_iter().map(|p| self.create(p))).await
    }

    /// Attach to an existing session.
    #[instrument(skip(self), level = "debug")]
    pub async fn get(&self, session_id: &str) -> ApiResult<Session> {
        if session_id.is_empty() {
            return ApiResult::invalid("session id is required");
        }
        session::fetch_info(&self.client, session_id)
            .await
            .map(|info| {
                let state = if info.status == STATUS_PAUSED {
                    SessionState::Paused
                } else {
                    SessionState::Active
                };
                Session::new(
                    self.client.clone(),
                    session_id.to_string(),
                    info.resource_url,
                    None,
                    Vec::new(),
                )
                .with_state(state)
            })
    }

    /// List sessions, optionally filtered by labels. `page` is 1-based and
    /// is reached by following `NextToken` from the first page.
    #[instrument(skip(self, labels), level = "debug")]
    pub async fn list(
        &self,
        labels: Option<&HashMap<String, String>>,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> ApiResult<SessionListPage> {
        let page = page.unwrap_or(1);
        if page < 1 {
            return ApiResult::invalid("page must be >= 1");
        }
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE);
        let labels = match labels.map(serde_json::to_string).transpose() {
            Ok(labels) => labels,
            Err(e) => return ApiResult::invalid(format!("labels are not serializable: {}", e)),
        };

        let mut token: Option<String> = None;
        for current in 1..page {
            let body = match self.list_call(labels.as_deref(), limit, token.as_deref()).await {
                ApiResult::Success { data, .. } => data,
                failure => return failure.map(|_| SessionListPage::default()),
            };
            match non_empty_token(&body) {
                Some(next) => token = Some(next),
                None => {
                    return ApiResult::failure(
                        "",
                        AgentBayError::Api(format!(
                            "page {} is out of range: listing ended at page {}",
                            page, current
                        )),
                    );
                }
            }
        }

        self.list_call(labels.as_deref(), limit, token.as_deref())
            .await
            .map(|body| SessionListPage::from_body(&body, limit))
    }

    /// Every session id matching `labels`, across all pages.
    pub async fn list_all(&self, labels: Option<&HashMap<String, String>>) -> ApiResult<Vec<String>> {
        let labels = match labels.map(serde_json::to_string).transpose() {
            Ok(labels) => labels,
            Err(e) => return ApiResult::invalid(format!("labels are not serializable: {}", e)),
        };

        let mut ids = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let (request_id, body) = match self
                .list_call(labels.as_deref(), DEFAULT_PAGE_SIZE, token.as_deref())
                .await
            {
                ApiResult::Success { request_id, data } => (request_id, data),
                ApiResult::Failure { request_id, error } => {
                    return ApiResult::failure(request_id, error)
                }
            };
            let page = SessionListPage::from_body(&body, DEFAULT_PAGE_SIZE);
            ids.extend(page.session_ids);
            match page.next_token {
                Some(next) => token = Some(next),
                None => return ApiResult::success(request_id, ids),
            }
        }
    }

    async fn list_call(&self, labels: Option<&str>, limit: u32, token: Option<&str>) -> ApiResult<Value> {
        let mut params = Map::new();
        if let Some(labels) = labels {
            params.insert("Labels".to_string(), json!(labels));
        }
        params.insert("MaxResults".to_string(), json!(limit));
        if let Some(token) = token {
            params.insert("NextToken".to_string(), json!(token));
        }
        self.client.call_body("ListSession", Value::Object(params)).await
    }

    pub async fn delete(&self, session: &mut Session, sync_context: bool) -> ApiResult<()> {
        session.delete(sync_context).await
    }

    /// Delete several sessions concurrently, one result per session.
    pub async fn delete_many(&self, sessions: &mut [Session], sync_context: bool) -> Vec<ApiResult<()>> {
        join_all(sessions.iter_mut().map(|s| s.delete(sync_context))).await
    }
}
