use crate::error::AgentBayError;

/// Outcome of a remote operation.
///
/// Both variants carry the request id that produced them so failures can
/// be correlated with service-side logs. The request id is empty when the
/// failure was detected locally before any call was made.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResult<T> {
    Success { request_id: String, data: T },
    Failure {
        request_id: String,
        error: AgentBayError,
    },
}

impl<T> ApiResult<T> {
    pub fn success(request_id: impl Into<String>, data: T) -> Self {
        ApiResult::Success {
            request_id: request_id.into(),
            data,
        }
    }

    pub fn failure(request_id: impl Into<String>, error: AgentBayError) -> Self {
        ApiResult::Failure {
            request_id: request_id.into(),
            error,
        }
    }

    /// A failure detected before talking to the service.
    pub fn invalid(message: impl Into<String>) -> Self {
        ApiResult::failure("", AgentBayError::Validation(message.into()))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ApiResult::Success { .. })
    }

    pub fn request_id(&self) -> &str {
        match self {
            ApiResult::Success { request_id, .. } | ApiResult::Failure { request_id, .. } => {
                request_id
            }
        }
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            ApiResult::Success { data, .. } => Some(data),
            ApiResult::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&AgentBayError> {
        match self {
            ApiResult::Success { .. } => None,
            ApiResult::Failure { error, .. } => Some(error),
        }
    }

    pub fn error_message(&self) -> Option<String> {
        self.error().map(|e| e.to_string())
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResult<U> {
        match self {
            ApiResult::Success { request_id, data } => ApiResult::Success {
                request_id,
                data: f(data),
            },
            ApiResult::Failure { request_id, error } => ApiResult::Failure { request_id, error },
        }
    }

    /// Chain a fallible conversion of the payload, keeping the request id.
    pub fn and_then<U>(self, f: impl FnOnce(T) -> Result<U, AgentBayError>) -> ApiResult<U> {
        match self {
            ApiResult::Success { request_id, data } => match f(data) {
                Ok(data) => ApiResult::Success { request_id, data },
                Err(error) => ApiResult::Failure { request_id, error },
            },
            ApiResult::Failure { request_id, error } => ApiResult::Failure { request_id, error },
        }
    }

    pub fn map_err(self, f: impl FnOnce(AgentBayError) -> AgentBayError) -> ApiResult<T> {
        match self {
            ApiResult::Failure { request_id, error } => ApiResult::Failure {
                request_id,
                error: f(error),
            },
            success => success,
        }
    }

    pub fn into_result(self) -> Result<T, AgentBayError> {
        match self {
            ApiResult::Success { data, .. } => Ok(data),
            ApiResult::Failure { error, .. } => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let ok: ApiResult<u32> = ApiResult::success("req-1", 7);
        assert!(ok.is_success());
        assert_eq!(ok.request_id(), "req-1");
        assert_eq!(ok.data(), Some(&7));
        assert!(ok.error_message().is_none());

        let failed: ApiResult<u32> =
            ApiResult::failure("req-2", AgentBayError::Tool("boom".to_string()));
        assert!(!failed.is_success());
        assert_eq!(failed.request_id(), "req-2");
        assert_eq!(failed.error_message().as_deref(), Some("boom"));
    }

    #[test]
    fn test_and_then_keeps_request_id_on_conversion_error() {
        let ok: ApiResult<&str> = ApiResult::success("req-3", "not a number");
        let parsed = ok.and_then(|s| {
            s.parse::<u32>()
                .map_err(|e| AgentBayError::Tool(e.to_string()))
        });
        assert!(!parsed.is_success());
        assert_eq!(parsed.request_id(), "req-3");
    }

    #[test]
    fn test_invalid_has_empty_request_id() {
        let r: ApiResult<()> = ApiResult::invalid("session id is required");
        assert_eq!(r.request_id(), "");
        assert!(matches!(r.error(), Some(AgentBayError::Validation(_))));
    }
}
