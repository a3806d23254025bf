//! Core traits and types for the AgentBay SDK.
//!
//! This crate defines the pieces shared by every layer of the SDK:
//! - `Transport`: one authenticated RPC per call, returning a raw envelope
//! - `envelope`: decoding of the nested `{ body: { Data, RequestId } }` response
//! - `ApiResult`: the success/failure result every public operation returns
//! - `policy`: context sync policies with total defaults
//! - `context`: context sync bindings and per-path status records

pub mod context;
pub mod envelope;
mod error;
pub mod policy;
mod result;
mod transport;

pub use context::{ContextStatusData, ContextSync, SyncMode, SyncStatus, SyncTarget};
pub use error::AgentBayError;
pub use policy::{
    BwList, DeletePolicy, DownloadPolicy, DownloadStrategy, ExtractPolicy, Lifecycle,
    RecyclePolicy, SyncPolicy, UploadMode, UploadPolicy, UploadStrategy, WhiteList,
};
pub use result::ApiResult;
pub use transport::{RawEnvelope, Transport};
