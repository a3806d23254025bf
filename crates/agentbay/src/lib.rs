//! Client SDK for AgentBay cloud sessions.
//!
//! - [`AgentBay`]: create, look up, list and delete sessions
//! - [`Session`]: tool invocation, capability adapters, pause/resume
//! - [`ContextManager`]: trigger context sync and wait for completion
//! - [`blocking`]: the same API driven by an owned runtime

mod agent_bay;
pub mod blocking;
pub mod capabilities;
mod client;
pub mod config;
pub mod context;
pub mod context_sync;
pub mod http;
mod session;
mod watch;

#[cfg(test)]
mod mock;

pub use agent_bay::{AgentBay, CreateSessionParams, SessionListPage, DEFAULT_PAGE_SIZE};
pub use client::{ApiClient, CALL_TOOL_ACTION};
pub use config::{Config, ConfigOverrides};
pub use context::{Context, ContextFileEntry, ContextListPage, ContextService, FileUrl};
pub use context_sync::{ContextManager, SyncWaitOptions};
pub use session::{Session, SessionInfo, SessionState, TransitionOptions};
pub use watch::{FileChangeEvent, WatchHandle};

pub use agentbay_core::{
    AgentBayError, ApiResult, BwList, ContextStatusData, ContextSync, DeletePolicy,
    DownloadPolicy, DownloadStrategy, ExtractPolicy, Lifecycle, RawEnvelope, RecyclePolicy,
    SyncMode, SyncPolicy, SyncStatus, SyncTarget, Transport, UploadMode, UploadPolicy,
    UploadStrategy, WhiteList,
};
