//! Decoding of the service response envelope.
//!
//! Every reply has the shape
//! `{ "body": { "RequestId": .., "Success": .., "Data": { "content": [{ "text": .. }], "isError": .. } } }`.
//! The functions here turn it into an [`ApiResult`] and never panic, whatever
//! the input looks like.

use std::borrow::Cow;

use serde_json::Value;

use crate::error::AgentBayError;
use crate::result::ApiResult;

const INVALID_BODY: &str = "invalid response body";
const NO_CONTENT: &str = "no content found";
const NO_TEXT: &str = "no text field in first content item";

/// Extract `body.RequestId`, defaulting to `""`.
pub fn extract_request_id(envelope: Option<&Value>) -> String {
    envelope
        .and_then(|e| e.get("body"))
        .and_then(|b| b.get("RequestId"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Parse a tool call reply into the text of its first content item.
pub fn parse_tool_response(envelope: Option<&Value>) -> ApiResult<String> {
    let request_id = extract_request_id(envelope);
    let data = match tool_data(envelope) {
        Ok(data) => data,
        Err(error) => return ApiResult::failure(request_id, error),
    };

    let first = match data.get("content").and_then(Value::as_array) {
        Some(items) if !items.is_empty() => &items[0],
        _ => return ApiResult::failure(request_id, AgentBayError::Tool(NO_CONTENT.to_string())),
    };

    match first.get("text").and_then(Value::as_str) {
        Some(text) => ApiResult::success(request_id, text.to_string()),
        None => ApiResult::failure(request_id, AgentBayError::Tool(NO_TEXT.to_string())),
    }
}

/// Parse a tool call reply, returning the whole `Data` object on success.
pub fn parse_tool_data(envelope: Option<&Value>) -> ApiResult<Value> {
    let request_id = extract_request_id(envelope);
    match tool_data(envelope) {
        Ok(data) => ApiResult::success(request_id, data.into_owned()),
        Err(error) => ApiResult::failure(request_id, error),
    }
}

/// Parse a management call reply (session, context, label actions).
///
/// Fails when `body.Success` is `false`; on success yields `body.Data`
/// (decoded if it was sent as a JSON string), or `Null` when absent.
pub fn parse_api_response(envelope: Option<&Value>) -> ApiResult<Value> {
    parse_api_body(envelope).map(|body| {
        body.get("Data")
            .map(decode_data)
            .map(Cow::into_owned)
            .unwrap_or(Value::Null)
    })
}

/// Like [`parse_api_response`] but yields the whole `body`, for replies
/// that carry paging fields (`NextToken`, `TotalCount`) next to `Data`.
pub fn parse_api_body(envelope: Option<&Value>) -> ApiResult<Value> {
    let request_id = extract_request_id(envelope);
    let body = match envelope.and_then(|e| e.get("body")).filter(|b| b.is_object()) {
        Some(body) => body,
        None => {
            return ApiResult::failure(request_id, AgentBayError::Api(INVALID_BODY.to_string()))
        }
    };

    let status_code = envelope
        .and_then(|e| e.get("statusCode"))
        .and_then(Value::as_u64)
        .unwrap_or(200);
    let success = body.get("Success").and_then(Value::as_bool);
    if success == Some(false) || (status_code >= 400 && success != Some(true)) {
        let message = match server_message(body) {
            Some(msg) => msg.to_string(),
            None if status_code >= 400 => format!("HTTP {}", status_code),
            None => "unknown error".to_string(),
        };
        return ApiResult::failure(request_id, AgentBayError::Api(message));
    }

    ApiResult::success(request_id, body.clone())
}

/// Locate and validate `body.Data` of a tool reply.
fn tool_data(envelope: Option<&Value>) -> Result<Cow<'_, Value>, AgentBayError> {
    let body = envelope
        .and_then(|e| e.get("body"))
        .ok_or_else(|| AgentBayError::Tool(INVALID_BODY.to_string()))?;

    let data = match body.get("Data").map(decode_data) {
        Some(data) if data.is_object() => data,
        _ => {
            let message = match server_message(body) {
                Some(msg) => format!("{}: {}", INVALID_BODY, msg),
                None => INVALID_BODY.to_string(),
            };
            return Err(AgentBayError::Tool(message));
        }
    };

    if data.get("isError").and_then(Value::as_bool) == Some(true) {
        return Err(AgentBayError::Tool(join_content_text(&data)));
    }

    Ok(data)
}

/// `Data` is occasionally sent as a JSON-encoded string.
fn decode_data(data: &Value) -> Cow<'_, Value> {
    match data {
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(decoded) => Cow::Owned(decoded),
            Err(_) => Cow::Borrowed(data),
        },
        _ => Cow::Borrowed(data),
    }
}

fn join_content_text(data: &Value) -> String {
    data.get("content")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter(|item| item.is_object())
                .filter_map(|item| item.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("; ")
        })
        .unwrap_or_default()
}

fn server_message(body: &Value) -> Option<&str> {
    ["ErrorMessage", "Message", "Code"]
        .iter()
        .filter_map(|key| body.get(*key).and_then(Value::as_str))
        .find(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(data: Value) -> Value {
        json!({ "statusCode": 200, "body": { "RequestId": "req-42", "Data": data } })
    }

    #[test]
    fn test_success_takes_first_text() {
        let env = envelope(json!({
            "content": [{ "text": "hello" }, { "text": "ignored" }],
            "isError": false
        }));
        let result = parse_tool_response(Some(&env));
        assert_eq!(result, ApiResult::success("req-42", "hello".to_string()));
    }

    #[test]
    fn test_error_joins_all_texts_and_skips_non_objects() {
        let env = envelope(json!({
            "content": [{ "text": "first" }, "stray", { "text": "second" }, { "type": "x" }],
            "isError": true
        }));
        let result = parse_tool_response(Some(&env));
        assert_eq!(result.request_id(), "req-42");
        assert_eq!(
            result.error(),
            Some(&AgentBayError::Tool("first; second".to_string()))
        );
    }

    #[test]
    fn test_missing_data_is_invalid_body() {
        let env = json!({ "body": { "RequestId": "req-1" } });
        let result = parse_tool_response(Some(&env));
        assert_eq!(result.request_id(), "req-1");
        assert_eq!(result.error_message().as_deref(), Some("invalid response body"));
    }

    #[test]
    fn test_missing_data_reports_server_message() {
        let env = json!({ "body": { "RequestId": "req-1", "Success": false, "Message": "session not found" } });
        let result = parse_tool_response(Some(&env));
        assert_eq!(
            result.error_message().as_deref(),
            Some("invalid response body: session not found")
        );
    }

    #[test]
    fn test_empty_and_missing_content_share_one_message() {
        for data in [json!({ "content": [], "isError": false }), json!({ "isError": false })] {
            let result = parse_tool_response(Some(&envelope(data)));
            assert_eq!(result.error_message().as_deref(), Some("no content found"));
        }
    }

    #[test]
    fn test_first_item_without_text_fails() {
        let env = envelope(json!({ "content": [{ "type": "image" }], "isError": false }));
        let result = parse_tool_response(Some(&env));
        assert!(!result.is_success());
        assert_eq!(result.request_id(), "req-42");
    }

    #[test]
    fn test_none_and_malformed_never_panic() {
        let none = parse_tool_response(None);
        assert_eq!(none.request_id(), "");
        assert!(!none.is_success());

        for bad in [json!("just a string"), json!([1, 2, 3]), json!({ "body": 5 }), Value::Null] {
            assert_eq!(extract_request_id(Some(&bad)), "");
            let result = parse_tool_response(Some(&bad));
            assert!(!result.is_success());
            assert_eq!(result.request_id(), "");
        }
    }

    #[test]
    fn test_data_sent_as_string_is_decoded() {
        let encoded = json!({ "content": [{ "text": "ok" }], "isError": false }).to_string();
        let env = envelope(Value::String(encoded));
        assert_eq!(parse_tool_response(Some(&env)).data().map(String::as_str), Some("ok"));
    }

    #[test]
    fn test_structured_data_returns_whole_object() {
        let env = envelope(json!({ "content": [{ "text": "a" }], "isError": false, "extra": 1 }));
        let result = parse_tool_data(Some(&env));
        assert_eq!(result.data().and_then(|d| d.get("extra")), Some(&json!(1)));
    }

    #[test]
    fn test_api_response_failure_uses_error_message() {
        let env = json!({ "body": { "RequestId": "r", "Success": false, "Code": "InvalidApiKey", "ErrorMessage": "bad key" } });
        let result = parse_api_response(Some(&env));
        assert_eq!(result.error(), Some(&AgentBayError::Api("bad key".to_string())));

        let env = json!({ "body": { "RequestId": "r", "Success": false, "Code": "InvalidApiKey" } });
        assert_eq!(
            parse_api_response(Some(&env)).error_message().as_deref(),
            Some("InvalidApiKey")
        );
    }

    #[test]
    fn test_api_response_http_error_without_success_flag_fails() {
        let env = json!({ "statusCode": 403, "body": { "RequestId": "r", "Code": "Forbidden" } });
        assert_eq!(
            parse_api_response(Some(&env)).error_message().as_deref(),
            Some("Forbidden")
        );

        let env = json!({ "statusCode": 502, "body": {} });
        assert_eq!(
            parse_api_response(Some(&env)).error_message().as_deref(),
            Some("HTTP 502")
        );
    }

    #[test]
    fn test_api_response_success_without_data_is_null() {
        let env = json!({ "body": { "RequestId": "r", "Success": true } });
        assert_eq!(parse_api_response(Some(&env)), ApiResult::success("r", Value::Null));
    }
}
