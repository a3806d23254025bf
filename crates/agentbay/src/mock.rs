//! Scripted in-memory transport for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use agentbay_core::{AgentBayError, RawEnvelope, Transport};
use async_trait::async_trait;
use serde_json::{json, Value};

type Reply = Result<RawEnvelope, AgentBayError>;

/// Replies are queued per action. The last queued reply for an action is
/// sticky so poll loops can be scripted as "N in-progress, then done".
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, action: &str, envelope: RawEnvelope) {
        self.enqueue(action, Ok(envelope));
    }

    pub fn push_err(&self, action: &str, message: &str) {
        self.enqueue(action, Err(AgentBayError::Transport(message.to_string())));
    }

    fn enqueue(&self, action: &str, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .entry(action.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn actions(&self) -> Vec<String> {
        self.calls().into_iter().map(|(action, _)| action).collect()
    }

    pub fn count(&self, action: &str) -> usize {
        self.calls().iter().filter(|(a, _)| a == action).count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn call(&self, action: &str, params: Value) -> Result<RawEnvelope, AgentBayError> {
        self.calls
            .lock()
            .unwrap()
            .push((action.to_string(), params));

        let mut replies = self.replies.lock().unwrap();
        let queue = replies
            .get_mut(action)
            .unwrap_or_else(|| panic!("no scripted reply for {}", action));
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue
                .front()
                .cloned()
                .unwrap_or_else(|| panic!("no scripted reply for {}", action))
        }
    }
}

pub fn api_ok(request_id: &str, data: Value) -> RawEnvelope {
    RawEnvelope::new(
        200,
        json!({ "RequestId": request_id, "Success": true, "Data": data }),
    )
}

pub fn api_fail(request_id: &str, message: &str) -> RawEnvelope {
    RawEnvelope::new(
        200,
        json!({ "RequestId": request_id, "Success": false, "Code": "Failed", "ErrorMessage": message }),
    )
}

pub fn tool_text(request_id: &str, text: &str) -> RawEnvelope {
    api_ok(
        request_id,
        json!({ "content": [{ "type": "text", "text": text }], "isError": false }),
    )
}

pub fn tool_error(request_id: &str, texts: &[&str]) -> RawEnvelope {
    let content: Vec<Value> = texts.iter().map(|t| json!({ "type": "text", "text": t })).collect();
    api_ok(request_id, json!({ "content": content, "isError": true }))
}

pub fn session_created(request_id: &str, session_id: &str) -> RawEnvelope {
    api_ok(
        request_id,
        json!({ "SessionId": session_id, "ResourceUrl": format!("https://res/{}", session_id) }),
    )
}

pub fn session_status(request_id: &str, session_id: &str, status: &str) -> RawEnvelope {
    api_ok(request_id, json!({ "SessionId": session_id, "Status": status }))
}

/// A `GetContextInfo` reply with `(contextId, path, status, taskType)` records.
pub fn context_status(request_id: &str, records: &[(&str, &str, &str, &str)]) -> RawEnvelope {
    let items: Vec<Value> = records
        .iter()
        .map(|(context_id, path, status, task_type)| {
            let mut item = json!({
                "contextId": context_id,
                "path": path,
                "status": status,
                "taskType": task_type,
            });
            if *status == "Failed" {
                item["errorMessage"] = json!(format!("sync of {} failed", path));
            }
            item
        })
        .collect();
    api_ok(request_id, json!({ "ContextStatusData": items }))
}
