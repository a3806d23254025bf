//! Object storage transfers between a session and OSS.

use agentbay_core::{AgentBayError, ApiResult};
use serde_json::{json, Map, Value};
use tracing::instrument;

use crate::session::Session;

pub struct Oss<'a> {
    session: &'a Session,
}

impl<'a> Oss<'a> {
    pub(crate) fn new(session: &'a Session) -> Self {
        Self { session }
    }

    async fn call(&self, tool: &str, args: Value) -> ApiResult<String> {
        self.session
            .call_tool(tool, args)
            .await
            .map_err(|e| e.into_capability(AgentBayError::Oss))
    }

    /// Install credentials for subsequent transfers. Endpoint and region
    /// fall back to the sandbox defaults when omitted.
    #[instrument(skip(self, access_key_secret, security_token), level = "debug")]
    pub async fn env_init(
        &self,
        access_key_id: &str,
        access_key_secret: &str,
        security_token: &str,
        endpoint: Option<&str>,
        region: Option<&str>,
    ) -> ApiResult<String> {
        if access_key_id.is_empty() || access_key_secret.is_empty() {
            return ApiResult::invalid("access key id and secret are required");
        }
        let mut args = Map::new();
        args.insert("access_key_id".to_string(), json!(access_key_id));
        args.insert("access_key_secret".to_string(), json!(access_key_secret));
        args.insert("security_token".to_string(), json!(security_token));
        if let Some(endpoint) = endpoint {
            args.insert("endpoint".to_string(), json!(endpoint));
        }
        if let Some(region) = region {
            args.insert("region".to_string(), json!(region));
        }
        self.call("oss_env_init", Value::Object(args)).await
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn upload(&self, bucket: &str, object: &str, path: &str) -> ApiResult<String> {
        if bucket.is_empty() || object.is_empty() || path.is_empty() {
            return ApiResult::invalid("bucket, object and path are required");
        }
        self.call(
            "oss_upload",
            json!({ "bucket": bucket, "object": object, "path": path }),
        )
        .await
    }

    /// Upload through a presigned URL; no credentials needed.
    #[instrument(skip(self), level = "debug")]
    pub async fn upload_anonymous(&self, url: &str, path: &str) -> ApiResult<String> {
        if url.is_empty() || path.is_empty() {
            return ApiResult::invalid("url and path are required");
        }
        self.call("oss_upload_annon", json!({ "url": url, "path": path }))
            .await
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn download(&self, bucket: &str, object: &str, path: &str) -> ApiResult<String> {
        if bucket.is_empty() || object.is_empty() || path.is_empty() {
            return ApiResult::invalid("bucket, object and path are required");
        }
        self.call(
            "oss_download",
            json!({ "bucket": bucket, "object": object, "path": path }),
        )
        .await
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn download_anonymous(&self, url: &str, path: &str) -> ApiResult<String> {
        if url.is_empty() || path.is_empty() {
            return ApiResult::invalid("url and path are required");
        }
        self.call("oss_download_annon", json!({ "url": url, "path": path }))
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::client::{ApiClient, CALL_TOOL_ACTION};
    use crate::mock::{tool_error, tool_text, ScriptedTransport};

    fn session(transport: &Arc<ScriptedTransport>) -> Session {
        Session::new(
            Arc::new(ApiClient::new(transport.clone())),
            "s-1".to_string(),
            String::new(),
            None,
            vec![],
        )
    }

    #[tokio::test]
    async fn test_env_init_omits_unset_fields() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(CALL_TOOL_ACTION, tool_text("r1", "initialized"));
        let session = session(&transport);

        let out = session.oss().env_init("id", "secret", "token", None, Some("cn-hangzhou")).await;
        assert!(out.is_success());

        let args: Value =
            serde_json::from_str(transport.calls()[0].1["Args"].as_str().unwrap()).unwrap();
        assert_eq!(args["region"], "cn-hangzhou");
        assert!(args.get("endpoint").is_none());
        assert_eq!(transport.calls()[0].1["Name"], "oss_env_init");
    }

    #[tokio::test]
    async fn test_anonymous_download_failure_becomes_oss_error() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(CALL_TOOL_ACTION, tool_error("r1", &["403 Forbidden"]));
        let session = session(&transport);

        let out = session
            .oss()
            .download_anonymous("https://bucket/obj?sig=x", "/tmp/obj")
            .await;
        assert_eq!(out.error(), Some(&AgentBayError::Oss("403 Forbidden".to_string())));
        assert_eq!(transport.calls()[0].1["Name"], "oss_download_annon");
    }
}
