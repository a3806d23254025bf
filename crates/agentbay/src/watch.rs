//! Polling directory watch.
//!
//! A spawned task calls the `get_file_change` tool every interval and hands
//! non-empty batches to a callback. The task stops when the handle is
//! stopped or dropped.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use agentbay_core::ApiResult;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::ApiClient;
use crate::session::Session;

pub const FILE_CHANGE_TOOL: &str = "get_file_change";

/// One change reported by the sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChangeEvent {
    pub event_type: String,
    pub path: String,
    #[serde(default)]
    pub path_type: String,
}

impl FileChangeEvent {
    pub fn is_directory(&self) -> bool {
        self.path_type == "directory"
    }
}

/// Handle to a running watch. Borrows the session it watches, so the
/// session cannot be deleted while the watch is alive.
pub struct WatchHandle<'a> {
    id: String,
    path: String,
    stop_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
    _session: PhantomData<&'a Session>,
}

impl WatchHandle<'_> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Signal the task to stop and wait for it to exit.
    pub async fn stop(mut self) {
        let _ = self.stop_tx.send(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Watch task {} ended abnormally: {}", self.id, e);
            }
        }
        info!("Stopped watching {} ({})", self.path, self.id);
    }
}

impl Drop for WatchHandle<'_> {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(true);
    }
}

pub(crate) fn spawn<'a, F>(
    session: &'a Session,
    path: &str,
    interval: Duration,
    callback: F,
) -> WatchHandle<'a>
where
    F: Fn(Vec<FileChangeEvent>) + Send + Sync + 'static,
{
    let id = uuid::Uuid::new_v4().to_string();
    let (stop_tx, stop_rx) = watch::channel(false);

    let task = tokio::spawn(poll_changes(
        session.client().clone(),
        session.session_id().to_string(),
        path.to_string(),
        interval,
        stop_rx,
        callback,
    ));

    info!(
        "Watching {} in session {} every {:?} ({})",
        path,
        session.session_id(),
        interval,
        id
    );

    WatchHandle {
        id,
        path: path.to_string(),
        stop_tx,
        task: Some(task),
        _session: PhantomData,
    }
}

async fn poll_changes<F>(
    client: Arc<ApiClient>,
    session_id: String,
    path: String,
    interval: Duration,
    mut stop_rx: watch::Receiver<bool>,
    callback: F,
) where
    F: Fn(Vec<FileChangeEvent>) + Send + Sync + 'static,
{
    loop {
        tokio::select! {
            _ = stop_rx.changed() => break,
            _ = tokio::time::sleep(interval) => {}
        }

        let result = tokio::select! {
            _ = stop_rx.changed() => break,
            result = client.call_tool(&session_id, FILE_CHANGE_TOOL, json!({ "path": path })) => result,
        };

        match result {
            ApiResult::Success { data, .. } => {
                let events = parse_events(&data);
                if !events.is_empty() {
                    debug!("{} change(s) under {}", events.len(), path);
                    callback(events);
                }
            }
            ApiResult::Failure { error, .. } => {
                debug!("Change query for {} failed: {}", path, error);
            }
        }
    }
}

/// The tool answers with a JSON array; an empty or unparsable reply means
/// no changes.
fn parse_events(text: &str) -> Vec<FileChangeEvent> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<Vec<FileChangeEvent>>(text) {
        Ok(events) => events,
        Err(e) => {
            warn!("Ignoring unparsable file change payload: {}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::client::CALL_TOOL_ACTION;
    use crate::mock::{tool_text, ScriptedTransport};

    #[test]
    fn test_parse_events() {
        let events = parse_events(
            r#"[{"eventType":"create","path":"/data/a.txt","pathType":"file"},
                {"eventType":"modify","path":"/data/sub","pathType":"directory"}]"#,
        );
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "create");
        assert!(events[1].is_directory());

        assert!(parse_events("").is_empty());
        assert!(parse_events("not json").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_delivers_batches_until_stopped() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(
            CALL_TOOL_ACTION,
            tool_text(
                "r1",
                r#"[{"eventType":"create","path":"/data/a.txt","pathType":"file"}]"#,
            ),
        );
        let session = Session::new(
            Arc::new(ApiClient::new(transport.clone())),
            "s-1".to_string(),
            String::new(),
            None,
            vec![],
        );

        let seen: Arc<Mutex<Vec<FileChangeEvent>>> = Arc::default();
        let sink = seen.clone();
        let handle = session
            .filesystem()
            .watch_directory("/data", Duration::from_secs(1), move |events| {
                sink.lock().unwrap().extend(events);
            })
            .unwrap();

        tokio::time::sleep(Duration::from_millis(2500)).await;
        handle.stop().await;

        let seen = seen.lock().unwrap().clone();
        assert!(!seen.is_empty());
        assert_eq!(seen[0].path, "/data/a.txt");

        let polls = transport.count(CALL_TOOL_ACTION);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(transport.count(CALL_TOOL_ACTION), polls);
    }
}
