mod config;

use std::collections::HashMap;
use std::time::Duration;

use agentbay::{
    AgentBay, ApiResult, Config as ClientConfig, ConfigOverrides, ContextSync,
    CreateSessionParams, TransitionOptions,
};
use anyhow::anyhow;
use clap::Parser;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::{Command, Config};

/// Turn a failed call into an error that keeps the request id.
fn into_anyhow<T>(result: ApiResult<T>) -> anyhow::Result<T> {
    match result {
        ApiResult::Success { data, .. } => Ok(data),
        ApiResult::Failure { request_id, error } if request_id.is_empty() => Err(anyhow!(error)),
        ApiResult::Failure { request_id, error } => {
            Err(anyhow!("{} (request id: {})", error, request_id))
        }
    }
}

fn print_json(value: serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::parse();

    let client_config = ClientConfig::load(&ConfigOverrides {
        api_key: config.api_key.clone(),
        endpoint: config.endpoint.clone(),
        region_id: config.region_id.clone(),
        timeout_ms: config.timeout_ms,
    })?;
    info!("Using endpoint {}", client_config.base_url());

    let bay = AgentBay::new(client_config)?;

    match config.command {
        Command::Create {
            image,
            labels,
            contexts,
        } => {
            let mut params = CreateSessionParams::new();
            if let Some(image) = image {
                params = params.with_image(image);
            }
            for (key, value) in labels {
                params = params.with_label(key, value);
            }
            for (context_id, path) in contexts {
                params = params.with_context_sync(ContextSync::new(context_id, path));
            }

            let session = into_anyhow(bay.create(params).await)?;
            let initial_sync = session
                .initial_sync()
                .map(|outcome| match outcome.error() {
                    None => "success".to_string(),
                    Some(error) => error.to_string(),
                });
            print_json(json!({
                "sessionId": session.session_id(),
                "resourceUrl": session.resource_url(),
                "initialSync": initial_sync,
            }))?;
        }

        Command::List {
            labels,
            page,
            limit,
            all,
        } => {
            let labels: HashMap<String, String> = labels.into_iter().collect();
            let filter = (!labels.is_empty()).then_some(&labels);
            if all {
                let ids = into_anyhow(bay.list_all(filter).await)?;
                print_json(json!({ "sessionIds": ids, "totalCount": ids.len() }))?;
            } else {
                let page_result = into_anyhow(bay.list(filter, page, limit).await)?;
                print_json(json!({
                    "sessionIds": page_result.session_ids,
                    "nextToken": page_result.next_token,
                    "maxResults": page_result.max_results,
                    "totalCount": page_result.total_count,
                }))?;
            }
        }

        Command::Info { session_id } => {
            let session = into_anyhow(bay.get(&session_id).await)?;
            let details = into_anyhow(session.info().await)?;
            print_json(json!({
                "sessionId": details.session_id,
                "status": details.status,
                "resourceUrl": details.resource_url,
                "appInstanceId": details.app_instance_id,
                "resourceId": details.resource_id,
            }))?;
        }

        Command::Pause {
            session_id,
            timeout_secs,
        } => {
            let mut session = into_anyhow(bay.get(&session_id).await)?;
            let options = TransitionOptions {
                timeout: Duration::from_secs(timeout_secs),
                ..TransitionOptions::default()
            };
            let status = into_anyhow(session.pause(options).await)?;
            print_json(json!({ "sessionId": session_id, "status": status }))?;
        }

        Command::Resume {
            session_id,
            timeout_secs,
        } => {
            let mut session = into_anyhow(bay.get(&session_id).await)?;
            let options = TransitionOptions {
                timeout: Duration::from_secs(timeout_secs),
                ..TransitionOptions::default()
            };
            let status = into_anyhow(session.resume(options).await)?;
            print_json(json!({ "sessionId": session_id, "status": status }))?;
        }

        Command::Delete { session_id, sync } => {
            let mut session = into_anyhow(bay.get(&session_id).await)?;
            into_anyhow(bay.delete(&mut session, sync).await)?;
            print_json(json!({ "sessionId": session_id, "deleted": true }))?;
        }

        Command::Exec {
            session_id,
            command,
            timeout_ms,
        } => {
            let session = into_anyhow(bay.get(&session_id).await)?;
            let output = into_anyhow(session.command().execute(&command, Some(timeout_ms)).await)?;
            print!("{}", output);
        }
    }

    Ok(())
}
