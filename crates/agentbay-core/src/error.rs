use crate::context::ContextStatusData;

/// Errors surfaced by the SDK.
///
/// Ordinary remote-reported failures travel inside [`crate::ApiResult::Failure`]
/// rather than as `Err`, so the enum is `Clone` to let results be copied
/// into batch reports.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AgentBayError {
    /// The service could not be reached or the reply could not be read.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A tool call replied with `isError` or with a malformed body.
    #[error("{0}")]
    Tool(String),

    /// A management call (session, context, label) reported a failure.
    #[error("{0}")]
    Api(String),

    #[error("Context sync did not complete after {retries} polls")]
    SyncTimeout {
        retries: u32,
        last_statuses: Vec<ContextStatusData>,
    },

    #[error("Context sync failed: {}", errors.join("; "))]
    SyncFailed { errors: Vec<String> },

    #[error("{operation} timed out (last status: {})", last_status.as_deref().unwrap_or("unknown"))]
    Timeout {
        operation: String,
        last_status: Option<String>,
    },

    #[error("Invalid argument: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File error: {0}")]
    File(String),

    #[error("Command error: {0}")]
    Command(String),

    #[error("OSS error: {0}")]
    Oss(String),
}

impl AgentBayError {
    /// Re-tag a tool failure as a capability-specific error, keeping the message.
    pub fn into_capability(self, wrap: fn(String) -> AgentBayError) -> AgentBayError {
        match self {
            AgentBayError::Tool(message) => wrap(message),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_error_retagged_as_capability_error() {
        let err = AgentBayError::Tool("permission denied".to_string());
        assert_eq!(
            err.into_capability(AgentBayError::File),
            AgentBayError::File("permission denied".to_string())
        );

        let transport = AgentBayError::Transport("connection reset".to_string());
        assert_eq!(
            transport.clone().into_capability(AgentBayError::File),
            transport
        );
    }

    #[test]
    fn test_timeout_message_includes_last_status() {
        let err = AgentBayError::Timeout {
            operation: "pause".to_string(),
            last_status: Some("PAUSING".to_string()),
        };
        assert_eq!(err.to_string(), "pause timed out (last status: PAUSING)");
    }
}
