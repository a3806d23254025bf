use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::AgentBayError;

/// A service reply as received, before any interpretation.
///
/// `body` holds the decoded JSON reply (or `Null` when the reply had no
/// JSON body); the parser only ever looks at it through [`RawEnvelope::to_value`].
#[derive(Debug, Clone, PartialEq)]
pub struct RawEnvelope {
    pub status_code: u16,
    pub body: Value,
}

impl RawEnvelope {
    pub fn new(status_code: u16, body: Value) -> Self {
        Self { status_code, body }
    }

    /// The mapped form `{ "statusCode": .., "body": .. }` consumed by the parser.
    pub fn to_value(&self) -> Value {
        json!({
            "statusCode": self.status_code,
            "body": self.body,
        })
    }
}

/// Transport abstraction for talking to the AgentBay service.
///
/// Implementations perform exactly one outbound call per invocation and
/// never retry. A failure to reach the service is an `Err`; anything the
/// service replied with, including reported errors, is an `Ok` envelope.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute a single API action with the given JSON body.
    async fn call(&self, action: &str, params: Value) -> Result<RawEnvelope, AgentBayError>;
}
