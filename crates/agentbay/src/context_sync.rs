//! Context sync engine: trigger a sync and poll per-path status until every
//! awaited path is terminal or the retry budget runs out.
//!
//! Per path: `Unsynced -> Triggered -> Polling -> { Success | Failed }`.
//! Polling is strictly sequential: one status query, then `poll_interval`
//! before the next.

use std::time::Duration;

use agentbay_core::{AgentBayError, ApiResult, ContextStatusData, SyncMode, SyncStatus, SyncTarget};
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::client::ApiClient;

/// Retry budget for a completion wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWaitOptions {
    pub max_retries: u32,
    pub poll_interval: Duration,
}

impl SyncWaitOptions {
    pub const fn new(max_retries: u32, poll_interval: Duration) -> Self {
        Self {
            max_retries,
            poll_interval,
        }
    }

    /// Wait applied after session creation (download direction).
    pub const fn on_create() -> Self {
        Self::new(150, Duration::from_millis(1500))
    }

    /// Flush applied before session deletion (upload direction).
    pub const fn on_delete() -> Self {
        Self::new(150, Duration::from_secs(2))
    }
}

impl Default for SyncWaitOptions {
    fn default() -> Self {
        Self::on_create()
    }
}

#[derive(Debug, PartialEq)]
enum Progress {
    Pending,
    Done,
    Failed(Vec<String>),
}

/// Polls a freshly triggered, untargeted sync may answer with no task of
/// the awaited direction before an empty report is accepted as complete.
pub const EMPTY_REPORT_GRACE: u32 = 5;

fn of_task(record: &ContextStatusData, task_type: Option<SyncMode>) -> bool {
    match (task_type, record.task_type.as_deref()) {
        (Some(mode), Some(kind)) => kind.eq_ignore_ascii_case(mode.as_str()),
        _ => true,
    }
}

fn reports_task(records: &[ContextStatusData], task_type: Option<SyncMode>) -> bool {
    records.iter().any(|r| of_task(r, task_type))
}

/// Decide where a set of awaited paths stands given the latest records.
///
/// With no explicit targets every reported record must be terminal; an
/// empty report counts as complete.
fn evaluate(
    targets: &[SyncTarget],
    records: &[ContextStatusData],
    task_type: Option<SyncMode>,
) -> Progress {
    let relevant: Vec<&ContextStatusData> = records
        .iter()
        .filter(|r| of_task(r, task_type))
        .collect();

    let latest: Vec<Option<&ContextStatusData>> = if targets.is_empty() {
        relevant.iter().map(|r| Some(*r)).collect()
    } else {
        targets
            .iter()
            .map(|t| relevant.iter().rev().find(|r| r.matches(t)).copied())
            .collect()
    };

    let mut pending = false;
    let mut errors = Vec::new();
    for record in latest {
        match record.map(|r| (&r.status, r)) {
            Some((SyncStatus::Success, _)) => {}
            Some((SyncStatus::Failed, r)) => errors.push(format!(
                "{}: {}",
                r.path,
                r.error_message.as_deref().unwrap_or("sync failed")
            )),
            // Absent means the task has not started yet.
            _ => pending = true,
        }
    }

    if pending {
        Progress::Pending
    } else if errors.is_empty() {
        Progress::Done
    } else {
        Progress::Failed(errors)
    }
}

/// Context sync operations scoped to one session.
pub struct ContextManager<'a> {
    client: &'a ApiClient,
    session_id: &'a str,
}

impl<'a> ContextManager<'a> {
    pub fn new(client: &'a ApiClient, session_id: &'a str) -> Self {
        Self { client, session_id }
    }

    /// Fire a one-shot sync. Does not wait for completion.
    #[instrument(skip(self), fields(session_id = %self.session_id), level = "debug")]
    pub async fn sync(
        &self,
        context_id: Option<&str>,
        path: Option<&str>,
        mode: Option<SyncMode>,
    ) -> ApiResult<()> {
        let mut params = Map::new();
        params.insert("SessionId".to_string(), json!(self.session_id));
        if let Some(context_id) = context_id {
            params.insert("ContextId".to_string(), json!(context_id));
        }
        if let Some(path) = path {
            params.insert("Path".to_string(), json!(path));
        }
        if let Some(mode) = mode {
            params.insert("Mode".to_string(), json!(mode.as_str()));
        }

        let result = self.client.call("SyncContext", Value::Object(params)).await;
        if result.is_success() {
            debug!("Triggered context sync for session {}", self.session_id);
        }
        result.map(|_| ())
    }

    /// Query per-path sync status records.
    #[instrument(skip(self), fields(session_id = %self.session_id), level = "debug")]
    pub async fn info(
        &self,
        context_id: Option<&str>,
        path: Option<&str>,
        task_type: Option<SyncMode>,
    ) -> ApiResult<Vec<ContextStatusData>> {
        let mut params = Map::new();
        params.insert("SessionId".to_string(), json!(self.session_id));
        if let Some(context_id) = context_id {
            params.insert("ContextId".to_string(), json!(context_id));
        }
        if let Some(path) = path {
            params.insert("Path".to_string(), json!(path));
        }
        if let Some(task_type) = task_type {
            params.insert("TaskType".to_string(), json!(task_type.as_str()));
        }

        self.client
            .call("GetContextInfo", Value::Object(params))
            .await
            .map(|data| parse_status_records(&data))
    }

    /// Poll until every target is terminal.
    ///
    /// Succeeds only if every target reports `Success`. Fails with
    /// `SyncFailed` once all targets are terminal and any of them failed,
    /// or with `SyncTimeout` after exactly `max_retries` status queries.
    /// A failed status query uses up one attempt and is retried.
    pub async fn await_completion(
        &self,
        targets: &[SyncTarget],
        task_type: Option<SyncMode>,
        options: SyncWaitOptions,
    ) -> ApiResult<()> {
        self.poll_until_terminal(targets, task_type, options, false)
            .await
    }

    /// With `just_triggered` and no explicit targets, an empty report is
    /// only trusted once a task of `task_type` has been listed or after
    /// [`EMPTY_REPORT_GRACE`] polls; before that the task may not exist yet.
    #[instrument(skip(self, targets), fields(session_id = %self.session_id, targets = targets.len()), level = "debug")]
    async fn poll_until_terminal(
        &self,
        targets: &[SyncTarget],
        task_type: Option<SyncMode>,
        options: SyncWaitOptions,
        just_triggered: bool,
    ) -> ApiResult<()> {
        let mut last_statuses = Vec::new();
        let mut last_request_id = String::new();
        let mut task_listed = !just_triggered || !targets.is_empty();
        let mut empty_reports = 0;

        for attempt in 1..=options.max_retries {
            match self.info(None, None, None).await {
                ApiResult::Success { request_id, data } => {
                    task_listed |= reports_task(&data, task_type);
                    let progress = match evaluate(targets, &data, task_type) {
                        Progress::Done if !task_listed && empty_reports < EMPTY_REPORT_GRACE => {
                            empty_reports += 1;
                            debug!(
                                "No {} task listed yet ({}/{})",
                                task_type.map(|m| m.as_str()).unwrap_or("sync"),
                                empty_reports,
                                EMPTY_REPORT_GRACE
                            );
                            Progress::Pending
                        }
                        progress => progress,
                    };
                    match progress {
                        Progress::Done => {
                            info!(
                                "Context sync completed for session {} after {} poll(s)",
                                self.session_id, attempt
                            );
                            return ApiResult::success(request_id, ());
                        }
                        Progress::Failed(errors) => {
                            warn!(
                                "Context sync failed for session {}: {}",
                                self.session_id,
                                errors.join("; ")
                            );
                            return ApiResult::failure(request_id, AgentBayError::SyncFailed { errors });
                        }
                        Progress::Pending => {
                            debug!(
                                "Context sync in progress (attempt {}/{})",
                                attempt, options.max_retries
                            );
                        }
                    }
                    last_request_id = request_id;
                    last_statuses = data;
                }
                ApiResult::Failure { request_id, error } => {
                    warn!(
                        "Context status query failed (attempt {}/{}): {}",
                        attempt, options.max_retries, error
                    );
                    if !request_id.is_empty() {
                        last_request_id = request_id;
                    }
                }
            }

            if attempt < options.max_retries {
                tokio::time::sleep(options.poll_interval).await;
            }
        }

        warn!(
            "Context sync for session {} did not finish within {} polls",
            self.session_id, options.max_retries
        );
        ApiResult::failure(
            last_request_id,
            AgentBayError::SyncTimeout {
                retries: options.max_retries,
                last_statuses,
            },
        )
    }

    /// Trigger a sync and wait for it.
    ///
    /// Without targets, a report listing no task of `mode` right after the
    /// trigger is treated as pending for up to [`EMPTY_REPORT_GRACE`] polls.
    pub async fn sync_and_wait(
        &self,
        context_id: Option<&str>,
        path: Option<&str>,
        mode: SyncMode,
        targets: &[SyncTarget],
        options: SyncWaitOptions,
    ) -> ApiResult<()> {
        let triggered = self.sync(context_id, path, Some(mode)).await;
        if !triggered.is_success() {
            return triggered;
        }
        self.poll_until_terminal(targets, Some(mode), options, true)
            .await
    }
}

/// Records arrive either as an array or as a JSON-encoded string.
/// Entries that do not parse are skipped.
fn parse_status_records(data: &Value) -> Vec<ContextStatusData> {
    let raw = match data.get("ContextStatusData") {
        Some(Value::String(s)) => serde_json::from_str::<Value>(s).unwrap_or(Value::Null),
        Some(v) => v.clone(),
        None => Value::Null,
    };

    let mut records = Vec::new();
    for item in raw.as_array().cloned().unwrap_or_default() {
        match serde_json::from_value::<ContextStatusData>(item) {
            Ok(record) => records.push(record),
            Err(e) => warn!("Failed to parse context status record: {}", e),
        }
    }
    records
}
