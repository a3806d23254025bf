//! Shared API client: management calls and the tool invoker.

use std::sync::Arc;

use agentbay_core::envelope::{
    parse_api_body, parse_api_response, parse_tool_data, parse_tool_response,
};
use agentbay_core::{AgentBayError, ApiResult, RawEnvelope, Transport};
use serde_json::{json, Value};
use tracing::{debug, instrument};

/// Action name used for every tool invocation.
pub const CALL_TOOL_ACTION: &str = "CallMcpTool";

/// Thin layer over a [`Transport`] shared by the client, sessions and
/// capability objects.
pub struct ApiClient {
    transport: Arc<dyn Transport>,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Execute a management action and parse its reply.
    ///
    /// Transport failures become a `Failure` with an empty request id.
    pub async fn call(&self, action: &str, params: Value) -> ApiResult<Value> {
        match self.transport.call(action, params).await {
            Ok(envelope) => parse_api_response(Some(&envelope.to_value())),
            Err(error) => ApiResult::failure("", error),
        }
    }

    /// Execute a management action and return the whole reply body.
    pub async fn call_body(&self, action: &str, params: Value) -> ApiResult<Value> {
        match self.transport.call(action, params).await {
            Ok(envelope) => parse_api_body(Some(&envelope.to_value())),
            Err(error) => ApiResult::failure("", error),
        }
    }

    /// Issue exactly one tool call and return the raw envelope.
    ///
    /// This is the only layer that separates "could not reach the service"
    /// (`Err`) from "the service replied with an error" (`Ok` envelope).
    #[instrument(skip(self, args), level = "debug")]
    pub async fn invoke_tool(
        &self,
        session_id: &str,
        tool_name: &str,
        args: &Value,
    ) -> Result<RawEnvelope, AgentBayError> {
        if session_id.is_empty() {
            return Err(AgentBayError::Validation(
                "tool invocation requires a session id".to_string(),
            ));
        }
        if tool_name.is_empty() {
            return Err(AgentBayError::Validation("tool name is required".to_string()));
        }

        let encoded = serde_json::to_string(args)
            .map_err(|e| AgentBayError::Validation(format!("tool arguments are not serializable: {}", e)))?;

        debug!("Invoking tool {} in session {}", tool_name, session_id);
        self.transport
            .call(
                CALL_TOOL_ACTION,
                json!({
                    "SessionId": session_id,
                    "Name": tool_name,
                    "Args": encoded,
                }),
            )
            .await
    }

    /// Invoke a tool and parse the first content text.
    pub async fn call_tool(&self, session_id: &str, tool_name: &str, args: Value) -> ApiResult<String> {
        match self.invoke_tool(session_id, tool_name, &args).await {
            Ok(envelope) => parse_tool_response(Some(&envelope.to_value())),
            Err(error) => ApiResult::failure("", error),
        }
    }

    /// Invoke a tool and return the whole structured `Data` object.
    pub async fn call_tool_data(
        &self,
        session_id: &str,
        tool_name: &str,
        args: Value,
    ) -> ApiResult<Value> {
        match self.invoke_tool(session_id, tool_name, &args).await {
            Ok(envelope) => parse_tool_data(Some(&envelope.to_value())),
            Err(error) => ApiResult::failure("", error),
        }
    }
}
