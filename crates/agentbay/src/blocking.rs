//! Blocking facade over the async client.
//!
//! Each client owns a multi-thread tokio runtime and drives every call to
//! completion with `block_on`, so behavior matches the async API exactly.
//! Do not use these types from inside an async runtime.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use agentbay_core::{AgentBayError, ApiResult, ContextStatusData, SyncMode, SyncTarget};
use tokio::runtime::Runtime;

use crate::agent_bay::{self, CreateSessionParams, SessionListPage};
use crate::capabilities::{DirectoryEntry, FileInfo, WriteMode};
use crate::config::Config;
use crate::context::{Context, ContextFileEntry, ContextListPage, FileUrl};
use crate::context_sync::SyncWaitOptions;
use crate::session::{self, SessionInfo, SessionState, TransitionOptions};
use crate::watch::{self, FileChangeEvent};

fn build_runtime() -> Result<Runtime, AgentBayError> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("agentbay-blocking")
        .build()
        .map_err(|e| AgentBayError::Config(format!("Failed to create runtime: {}", e)))
}

pub struct AgentBay {
    inner: agent_bay::AgentBay,
    runtime: Arc<Runtime>,
}

impl AgentBay {
    pub fn new(config: Config) -> Result<Self, AgentBayError> {
        Self::from_async(agent_bay::AgentBay::new(config)?)
    }

    pub fn from_env() -> Result<Self, AgentBayError> {
        Self::new(Config::from_env()?)
    }

    /// Wrap an existing async client.
    pub fn from_async(inner: agent_bay::AgentBay) -> Result<Self, AgentBayError> {
        Ok(Self {
            inner,
            runtime: Arc::new(build_runtime()?),
        })
    }

    fn wrap(&self, session: session::Session) -> Session {
        Session {
            inner: session,
            runtime: self.runtime.clone(),
        }
    }

    pub fn create(&self, params: CreateSessionParams) -> ApiResult<Session> {
        self.runtime
            .block_on(self.inner.create(params))
            .map(|s| self.wrap(s))
    }

    pub fn create_many(&self, params: Vec<CreateSessionParams>) -> Vec<ApiResult<Session>> {
        self.runtime
            .block_on(self.inner.create_many(params))
            .into_iter()
            .map(|r| r.map(|s| self.wrap(s)))
            .collect()
    }

    pub fn get(&self, session_id: &str) -> ApiResult<Session> {
        self.runtime
            .block_on(self.inner.get(session_id))
            .map(|s| self.wrap(s))
    }

    pub fn list(
        &self,
        labels: Option<&HashMap<String, String>>,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> ApiResult<SessionListPage> {
        self.runtime.block_on(self.inner.list(labels, page, limit))
    }

    pub fn list_all(&self, labels: Option<&HashMap<String, String>>) -> ApiResult<Vec<String>> {
        self.runtime.block_on(self.inner.list_all(labels))
    }

    pub fn delete(&self, session: &mut Session, sync_context: bool) -> ApiResult<()> {
        session.delete(sync_context)
    }

    pub fn delete_many(&self, sessions: &mut [Session], sync_context: bool) -> Vec<ApiResult<()>> {
        let runtime = self.runtime.clone();
        runtime.block_on(futures::future::join_all(
            sessions.iter_mut().map(|s| s.inner.delete(sync_context)),
        ))
    }

    pub fn context(&self) -> ContextService<'_> {
        ContextService { bay: self }
    }
}

/// Blocking view of [`crate::context::ContextService`].
pub struct ContextService<'a> {
    bay: &'a AgentBay,
}

impl ContextService<'_> {
    pub fn list(&self, max_results: Option<u32>, next_token: Option<&str>) -> ApiResult<ContextListPage> {
        self.bay
            .runtime
            .block_on(self.bay.inner.context().list(max_results, next_token))
    }

    pub fn get(&self, name: &str, allow_create: bool) -> ApiResult<Context> {
        self.bay
            .runtime
            .block_on(self.bay.inner.context().get(name, allow_create))
    }

    pub fn create(&self, name: &str) -> ApiResult<Context> {
        self.bay.runtime.block_on(self.bay.inner.context().create(name))
    }

    pub fn update(&self, context: &Context) -> ApiResult<()> {
        self.bay.runtime.block_on(self.bay.inner.context().update(context))
    }

    pub fn delete(&self, context: &Context) -> ApiResult<()> {
        self.bay.runtime.block_on(self.bay.inner.context().delete(context))
    }

    pub fn get_file_download_url(&self, context_id: &str, file_path: &str) -> ApiResult<FileUrl> {
        self.bay.runtime.block_on(
            self.bay
                .inner
                .context()
                .get_file_download_url(context_id, file_path),
        )
    }

    pub fn get_file_upload_url(&self, context_id: &str, file_path: &str) -> ApiResult<FileUrl> {
        self.bay.runtime.block_on(
            self.bay
                .inner
                .context()
                .get_file_upload_url(context_id, file_path),
        )
    }

    pub fn list_files(
        &self,
        context_id: &str,
        parent_folder_path: &str,
        page_number: u32,
        page_size: u32,
    ) -> ApiResult<Vec<ContextFileEntry>> {
        self.bay.runtime.block_on(self.bay.inner.context().list_files(
            context_id,
            parent_folder_path,
            page_number,
            page_size,
        ))
    }

    pub fn delete_file(&self, context_id: &str, file_path: &str) -> ApiResult<()> {
        self.bay
            .runtime
            .block_on(self.bay.inner.context().delete_file(context_id, file_path))
    }
}

pub struct Session {
    inner: session::Session,
    runtime: Arc<Runtime>,
}

impl Session {
    pub fn session_id(&self) -> &str {
        self.inner.session_id()
    }

    pub fn resource_url(&self) -> &str {
        self.inner.resource_url()
    }

    pub fn state(&self) -> SessionState {
        self.inner.state()
    }

    pub fn initial_sync(&self) -> Option<&ApiResult<()>> {
        self.inner.initial_sync()
    }

    /// The async session behind this handle.
    pub fn as_async(&self) -> &session::Session {
        &self.inner
    }

    pub fn call_tool(&self, tool_name: &str, args: serde_json::Value) -> ApiResult<String> {
        self.runtime.block_on(self.inner.call_tool(tool_name, args))
    }

    pub fn info(&self) -> ApiResult<SessionInfo> {
        self.runtime.block_on(self.inner.info())
    }

    pub fn set_labels(&self, labels: &HashMap<String, String>) -> ApiResult<()> {
        self.runtime.block_on(self.inner.set_labels(labels))
    }

    pub fn get_labels(&self) -> ApiResult<HashMap<String, String>> {
        self.runtime.block_on(self.inner.get_labels())
    }

    pub fn get_link(&self, protocol: Option<&str>, port: Option<u16>) -> ApiResult<String> {
        self.runtime.block_on(self.inner.get_link(protocol, port))
    }

    pub fn pause(&mut self, options: TransitionOptions) -> ApiResult<String> {
        self.runtime.block_on(self.inner.pause(options))
    }

    pub fn resume(&mut self, options: TransitionOptions) -> ApiResult<String> {
        self.runtime.block_on(self.inner.resume(options))
    }

    pub fn delete(&mut self, sync_context: bool) -> ApiResult<()> {
        self.runtime.block_on(self.inner.delete(sync_context))
    }

    pub fn delete_with(&mut self, sync_context: bool, options: SyncWaitOptions) -> ApiResult<()> {
        self.runtime
            .block_on(self.inner.delete_with(sync_context, options))
    }

    // Context sync

    pub fn sync_context(
        &self,
        context_id: Option<&str>,
        path: Option<&str>,
        mode: Option<SyncMode>,
    ) -> ApiResult<()> {
        self.runtime
            .block_on(self.inner.context().sync(context_id, path, mode))
    }

    pub fn context_info(
        &self,
        context_id: Option<&str>,
        path: Option<&str>,
        task_type: Option<SyncMode>,
    ) -> ApiResult<Vec<ContextStatusData>> {
        self.runtime
            .block_on(self.inner.context().info(context_id, path, task_type))
    }

    pub fn await_context_sync(
        &self,
        targets: &[SyncTarget],
        task_type: Option<SyncMode>,
        options: SyncWaitOptions,
    ) -> ApiResult<()> {
        self.runtime.block_on(
            self.inner
                .context()
                .await_completion(targets, task_type, options),
        )
    }

    // Capabilities

    pub fn execute_command(&self, command: &str, timeout_ms: Option<u64>) -> ApiResult<String> {
        self.runtime
            .block_on(self.inner.command().execute(command, timeout_ms))
    }

    pub fn run_code(&self, code: &str, language: &str, timeout_s: Option<u64>) -> ApiResult<String> {
        self.runtime
            .block_on(self.inner.code().run_code(code, language, timeout_s))
    }

    pub fn read_file(&self, path: &str) -> ApiResult<String> {
        self.runtime.block_on(self.inner.filesystem().read_file(path))
    }

    pub fn write_file(&self, path: &str, content: &str, mode: WriteMode) -> ApiResult<()> {
        self.runtime
            .block_on(self.inner.filesystem().write_file(path, content, mode))
    }

    pub fn create_directory(&self, path: &str) -> ApiResult<()> {
        self.runtime
            .block_on(self.inner.filesystem().create_directory(path))
    }

    pub fn list_directory(&self, path: &str) -> ApiResult<Vec<DirectoryEntry>> {
        self.runtime
            .block_on(self.inner.filesystem().list_directory(path))
    }

    pub fn move_file(&self, source: &str, destination: &str) -> ApiResult<()> {
        self.runtime
            .block_on(self.inner.filesystem().move_file(source, destination))
    }

    pub fn get_file_info(&self, path: &str) -> ApiResult<FileInfo> {
        self.runtime
            .block_on(self.inner.filesystem().get_file_info(path))
    }

    pub fn watch_directory<F>(
        &self,
        path: &str,
        interval: Duration,
        callback: F,
    ) -> Result<WatchHandle<'_>, AgentBayError>
    where
        F: Fn(Vec<FileChangeEvent>) + Send + Sync + 'static,
    {
        let _guard = self.runtime.enter();
        let inner = self
            .inner
            .filesystem()
            .watch_directory(path, interval, callback)?;
        Ok(WatchHandle {
            inner,
            runtime: &self.runtime,
        })
    }
}

/// Blocking handle to a directory watch.
pub struct WatchHandle<'a> {
    inner: watch::WatchHandle<'a>,
    runtime: &'a Runtime,
}

impl WatchHandle<'_> {
    pub fn id(&self) -> &str {
        self.inner.id()
    }

    /// Signal the watch task and wait for it to exit.
    pub fn stop(self) {
        self.runtime.block_on(self.inner.stop());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::CALL_TOOL_ACTION;
    use crate::mock::{api_ok, session_created, tool_text, ScriptedTransport};

    #[test]
    fn test_blocking_create_execute_delete() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push("CreateMcpSession", session_created("r1", "s-1"));
        transport.push(CALL_TOOL_ACTION, tool_text("r2", "ok"));
        transport.push("ReleaseMcpSession", api_ok("r3", serde_json::Value::Null));

        let bay = AgentBay::from_async(agent_bay::AgentBay::with_transport(transport.clone())).unwrap();
        let mut session = bay.create(CreateSessionParams::new()).into_result().unwrap();
        assert_eq!(session.session_id(), "s-1");

        let out = session.execute_command("true", None);
        assert_eq!(out, ApiResult::success("r2", "ok".to_string()));

        assert!(bay.delete(&mut session, false).is_success());
        assert_eq!(session.state(), SessionState::Deleted);
        assert_eq!(
            transport.actions(),
            vec!["CreateMcpSession", CALL_TOOL_ACTION, "ReleaseMcpSession"]
        );
    }
}
