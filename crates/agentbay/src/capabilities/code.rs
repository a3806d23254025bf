use std::fmt;
use std::str::FromStr;

use agentbay_core::{AgentBayError, ApiResult};
use serde_json::json;
use tracing::instrument;

use crate::session::Session;

pub const DEFAULT_TIMEOUT_S: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeLanguage {
    Python,
    JavaScript,
}

impl CodeLanguage {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeLanguage::Python => "python",
            CodeLanguage::JavaScript => "javascript",
        }
    }
}

impl fmt::Display for CodeLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CodeLanguage {
    type Err = AgentBayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "python" => Ok(CodeLanguage::Python),
            "javascript" => Ok(CodeLanguage::JavaScript),
            other => Err(AgentBayError::Validation(format!(
                "unsupported language {:?}, expected python or javascript",
                other
            ))),
        }
    }
}

/// Code execution inside a session.
pub struct Code<'a> {
    session: &'a Session,
}

impl<'a> Code<'a> {
    pub(crate) fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// Run `code` with the named interpreter. Unsupported languages fail
    /// locally without a remote call.
    #[instrument(skip(self, code), level = "debug")]
    pub async fn run_code(&self, code: &str, language: &str, timeout_s: Option<u64>) -> ApiResult<String> {
        let language = match language.parse::<CodeLanguage>() {
            Ok(language) => language,
            Err(e) => return ApiResult::failure("", e),
        };
        self.session
            .call_tool(
                "run_code",
                json!({
                    "code": code,
                    "language": language.as_str(),
                    "timeout_s": timeout_s.unwrap_or(DEFAULT_TIMEOUT_S),
                }),
            )
            .await
            .map_err(|e| e.into_capability(AgentBayError::Command))
    }
}
