//! Persistent contexts: named storage that outlives sessions.

use agentbay_core::{AgentBayError, ApiResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, instrument};

use crate::client::ApiClient;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Context {
    pub id: String,
    pub name: String,
    pub state: String,
    #[serde(rename = "CreateTime")]
    pub created_at: Option<String>,
    #[serde(rename = "LastUsedTime")]
    pub last_used_at: Option<String>,
    pub os_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextListPage {
    pub contexts: Vec<Context>,
    pub next_token: Option<String>,
    pub max_results: u32,
    pub total_count: u32,
}

/// A file stored in a context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContextFileEntry {
    pub file_id: String,
    pub file_name: String,
    pub file_path: String,
    pub file_type: Option<String>,
    pub gmt_create: Option<String>,
    pub gmt_modified: Option<String>,
    pub size: Option<u64>,
    pub status: Option<String>,
}

/// A presigned transfer URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct FileUrl {
    pub url: String,
    pub expire_time: Option<i64>,
}

/// Context management, independent of any session.
pub struct ContextService<'a> {
    client: &'a ApiClient,
}

impl<'a> ContextService<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn list(&self, max_results: Option<u32>, next_token: Option<&str>) -> ApiResult<ContextListPage> {
        let limit = max_results.unwrap_or(10);
        let mut params = Map::new();
        params.insert("MaxResults".to_string(), json!(limit));
        if let Some(token) = next_token {
            params.insert("NextToken".to_string(), json!(token));
        }

        self.client
            .call_body("ListContexts", Value::Object(params))
            .await
            .and_then(|body| {
                let contexts = match body.get("Data") {
                    Some(Value::Array(items)) => items
                        .iter()
                        .map(|item| serde_json::from_value(item.clone()))
                        .collect::<Result<Vec<Context>, _>>()
                        .map_err(|e| AgentBayError::Api(format!("invalid context payload: {}", e)))?,
                    _ => Vec::new(),
                };
                Ok(ContextListPage {
                    contexts,
                    next_token: body
                        .get("NextToken")
                        .and_then(Value::as_str)
                        .filter(|t| !t.is_empty())
                        .map(str::to_string),
                    max_results: body
                        .get("MaxResults")
                        .and_then(Value::as_u64)
                        .and_then(|n| u32::try_from(n).ok())
                        .unwrap_or(limit),
                    total_count: body
                        .get("TotalCount")
                        .and_then(Value::as_u64)
                        .and_then(|n| u32::try_from(n).ok())
                        .unwrap_or(0),
                })
            })
    }

    /// Look up a context by name, creating it when `allow_create` is set.
    #[instrument(skip(self), level = "debug")]
    pub async fn get(&self, name: &str, allow_create: bool) -> ApiResult<Context> {
        if name.trim().is_empty() {
            return ApiResult::invalid("context name is required");
        }
        self.client
            .call("GetContext", json!({ "Name": name, "AllowCreate": allow_create }))
            .await
            .and_then(decode_context)
    }

    pub async fn create(&self, name: &str) -> ApiResult<Context> {
        let created = self.get(name, true).await;
        if let Some(context) = created.data() {
            info!("Context {} ready ({})", context.name, context.id);
        }
        created
    }

    /// Rename a context.
    #[instrument(skip(self, context), fields(context_id = %context.id), level = "debug")]
    pub async fn update(&self, context: &Context) -> ApiResult<()> {
        if context.id.is_empty() || context.name.trim().is_empty() {
            return ApiResult::invalid("context id and name are required");
        }
        self.client
            .call("ModifyContext", json!({ "Id": context.id, "Name": context.name }))
            .await
            .map(|_| ())
    }

    #[instrument(skip(self, context), fields(context_id = %context.id), level = "debug")]
    pub async fn delete(&self, context: &Context) -> ApiResult<()> {
        if context.id.is_empty() {
            return ApiResult::invalid("context id is required");
        }
        let result = self
            .client
            .call("DeleteContext", json!({ "Id": context.id }))
            .await
            .map(|_| ());
        if result.is_success() {
            info!("Deleted context {}", context.id);
        }
        result
    }

    pub async fn get_file_download_url(&self, context_id: &str, file_path: &str) -> ApiResult<FileUrl> {
        self.file_url("GetContextFileDownloadUrl", context_id, file_path)
            .await
    }

    pub async fn get_file_upload_url(&self, context_id: &str, file_path: &str) -> ApiResult<FileUrl> {
        self.file_url("GetContextFileUploadUrl", context_id, file_path)
            .await
    }

    #[instrument(skip(self), level = "debug")]
    async fn file_url(&self, action: &str, context_id: &str, file_path: &str) -> ApiResult<FileUrl> {
        if context_id.is_empty() || file_path.is_empty() {
            return ApiResult::invalid("context id and file path are required");
        }
        self.client
            .call(action, json!({ "ContextId": context_id, "FilePath": file_path }))
            .await
            .and_then(|data| {
                let url: FileUrl = serde_json::from_value(data)
                    .map_err(|e| AgentBayError::Api(format!("invalid file url payload: {}", e)))?;
                if url.url.is_empty() {
                    return Err(AgentBayError::Api(format!("{} returned no Url", action)));
                }
                Ok(url)
            })
    }

    /// List files under `parent_folder_path`; pages are 1-based.
    #[instrument(skip(self), level = "debug")]
    pub async fn list_files(
        &self,
        context_id: &str,
        parent_folder_path: &str,
        page_number: u32,
        page_size: u32,
    ) -> ApiResult<Vec<ContextFileEntry>> {
        if context_id.is_empty() {
            return ApiResult::invalid("context id is required");
        }
        if page_number < 1 || page_size < 1 {
            return ApiResult::invalid("page number and page size must be >= 1");
        }
        self.client
            .call(
                "DescribeContextFiles",
                json!({
                    "ContextId": context_id,
                    "ParentFolderPath": parent_folder_path,
                    "PageNumber": page_number,
                    "PageSize": page_size,
                }),
            )
            .await
            .and_then(|data| match data {
                Value::Null => Ok(Vec::new()),
                data => serde_json::from_value(data)
                    .map_err(|e| AgentBayError::Api(format!("invalid file listing: {}", e))),
            })
    }

    #[instrument(skip(self), level = "debug")]
    pub async fn delete_file(&self, context_id: &str, file_path: &str) -> ApiResult<()> {
        if context_id.is_empty() || file_path.is_empty() {
            return ApiResult::invalid("context id and file path are required");
        }
        self.client
            .call(
                "DeleteContextFile",
                json!({ "ContextId": context_id, "FilePath": file_path }),
            )
            .await
            .map(|_| ())
    }
}

fn decode_context(data: Value) -> Result<Context, AgentBayError> {
    let context: Context = serde_json::from_value(data)
        .map_err(|e| AgentBayError::Api(format!("invalid context payload: {}", e)))?;
    if context.id.is_empty() {
        return Err(AgentBayError::Api("context not found".to_string()));
    }
    Ok(context)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use agentbay_core::RawEnvelope;

    use super::*;
    use crate::mock::{api_ok, ScriptedTransport};

    fn client(transport: &Arc<ScriptedTransport>) -> ApiClient {
        ApiClient::new(transport.clone())
    }

    #[tokio::test]
    async fn test_get_with_create() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(
            "GetContext",
            api_ok(
                "r1",
                json!({ "Id": "ctx-1", "Name": "work", "State": "available", "OsType": "linux" }),
            ),
        );
        let client = client(&transport);

        let context = ContextService::new(&client).create("work").await.into_result().unwrap();
        assert_eq!(context.id, "ctx-1");
        assert_eq!(context.os_type.as_deref(), Some("linux"));
        assert_eq!(transport.calls()[0].1["AllowCreate"], true);
    }

    #[tokio::test]
    async fn test_get_missing_context_is_failure() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push("GetContext", api_ok("r1", Value::Null));
        let client = client(&transport);

        let result = ContextService::new(&client).get("absent", false).await;
        assert_eq!(result.request_id(), "r1");
        assert!(!result.is_success());
    }

    #[tokio::test]
    async fn test_list_reads_paging_fields() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(
            "ListContexts",
            RawEnvelope::new(
                200,
                json!({
                    "RequestId": "r1",
                    "Success": true,
                    "Data": [{ "Id": "c1", "Name": "one" }, { "Id": "c2", "Name": "two" }],
                    "NextToken": "next",
                    "MaxResults": 2,
                    "TotalCount": 7,
                }),
            ),
        );
        let client = client(&transport);

        let page = ContextService::new(&client).list(Some(2), None).await.into_result().unwrap();
        assert_eq!(page.contexts.len(), 2);
        assert_eq!(page.contexts[1].name, "two");
        assert_eq!(page.next_token.as_deref(), Some("next"));
        assert_eq!(page.total_count, 7);
    }

    #[tokio::test]
    async fn test_download_url_and_file_listing() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(
            "GetContextFileDownloadUrl",
            api_ok("r1", json!({ "Url": "https://oss/file?sig=1", "ExpireTime": 3600 })),
        );
        transport.push(
            "DescribeContextFiles",
            api_ok(
                "r2",
                json!([{ "FileId": "f1", "FileName": "a.txt", "FilePath": "/data/a.txt", "Size": 12 }]),
            ),
        );
        let client = client(&transport);
        let service = ContextService::new(&client);

        let url = service.get_file_download_url("c1", "/data/a.txt").await;
        assert_eq!(url.data().map(|u| u.url.as_str()), Some("https://oss/file?sig=1"));

        let files = service.list_files("c1", "/data", 1, 50).await.into_result().unwrap();
        assert_eq!(files[0].file_name, "a.txt");
        assert_eq!(files[0].size, Some(12));

        assert!(service.list_files("c1", "/data", 0, 50).await.error().is_some());
        assert_eq!(transport.count("DescribeContextFiles"), 1);
    }
}
