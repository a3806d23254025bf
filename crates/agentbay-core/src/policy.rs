//! Context sync policies.
//!
//! Every sub-policy has a total default and every struct deserializes with
//! `#[serde(default)]`, so a partially specified policy always completes to
//! a valid one. The JSON shape is what the service expects in
//! `ContextSyncs[].Policy`.

use serde::{Deserialize, Serialize};

use crate::error::AgentBayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum UploadStrategy {
    #[default]
    UploadBeforeResourceRelease,
    PeriodicUpload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum UploadMode {
    #[default]
    File,
    Archive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DownloadStrategy {
    #[default]
    DownloadAsync,
}

/// When and how local changes are persisted back to the context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UploadPolicy {
    pub auto_upload: bool,
    pub upload_strategy: UploadStrategy,
    /// Upload period in minutes, only meaningful for `PeriodicUpload`.
    pub period: u32,
    pub upload_mode: UploadMode,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            auto_upload: true,
            upload_strategy: UploadStrategy::UploadBeforeResourceRelease,
            period: 30,
            upload_mode: UploadMode::File,
        }
    }
}

impl UploadPolicy {
    /// Upload every `period_minutes` instead of only before release.
    pub fn periodic(period_minutes: u32) -> Self {
        Self {
            upload_strategy: UploadStrategy::PeriodicUpload,
            period: period_minutes,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DownloadPolicy {
    pub auto_download: bool,
    pub download_strategy: DownloadStrategy,
}

impl Default for DownloadPolicy {
    fn default() -> Self {
        Self {
            auto_download: true,
            download_strategy: DownloadStrategy::DownloadAsync,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeletePolicy {
    /// Propagate local deletions to the context.
    pub sync_local_file: bool,
}

impl Default for DeletePolicy {
    fn default() -> Self {
        Self {
            sync_local_file: true,
        }
    }
}

/// Archive handling for downloaded context content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExtractPolicy {
    pub extract: bool,
    pub delete_src_file: bool,
    pub extract_to_current_folder: bool,
}

impl Default for ExtractPolicy {
    fn default() -> Self {
        Self {
            extract: true,
            delete_src_file: true,
            extract_to_current_folder: false,
        }
    }
}

/// How long persisted data is kept before the service recycles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Lifecycle {
    #[serde(rename = "Lifecycle_1Day")]
    OneDay,
    #[serde(rename = "Lifecycle_3Days")]
    ThreeDays,
    #[serde(rename = "Lifecycle_5Days")]
    FiveDays,
    #[serde(rename = "Lifecycle_10Days")]
    TenDays,
    #[serde(rename = "Lifecycle_15Days")]
    FifteenDays,
    #[serde(rename = "Lifecycle_30Days")]
    ThirtyDays,
    #[serde(rename = "Lifecycle_90Days")]
    NinetyDays,
    #[serde(rename = "Lifecycle_180Days")]
    OneHundredEightyDays,
    #[serde(rename = "Lifecycle_360Days")]
    ThreeHundredSixtyDays,
    #[default]
    #[serde(rename = "Lifecycle_Forever")]
    Forever,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecyclePolicy {
    pub lifecycle: Lifecycle,
    /// Paths the lifecycle applies to; `""` means the whole mount.
    pub paths: Vec<String>,
}

impl Default for RecyclePolicy {
    fn default() -> Self {
        Self {
            lifecycle: Lifecycle::Forever,
            paths: vec![String::new()],
        }
    }
}

impl RecyclePolicy {
    pub fn validate(&self) -> Result<(), AgentBayError> {
        for path in &self.paths {
            if path.contains(['*', '?', '[', ']']) {
                return Err(AgentBayError::Validation(format!(
                    "wildcard patterns are not supported in recycle policy paths: {}",
                    path
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct WhiteList {
    pub path: String,
    pub exclude_paths: Vec<String>,
}

/// Black/white list narrowing which files are synced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BwList {
    pub white_lists: Vec<WhiteList>,
}

impl Default for BwList {
    /// One catch-all entry: everything, nothing excluded.
    fn default() -> Self {
        Self {
            white_lists: vec![WhiteList::default()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncPolicy {
    pub upload_policy: UploadPolicy,
    pub download_policy: DownloadPolicy,
    pub delete_policy: DeletePolicy,
    pub extract_policy: ExtractPolicy,
    pub recycle_policy: RecyclePolicy,
    pub bw_list: BwList,
}

impl SyncPolicy {
    pub fn with_upload(mut self, upload_policy: UploadPolicy) -> Self {
        self.upload_policy = upload_policy;
        self
    }

    pub fn with_download(mut self, download_policy: DownloadPolicy) -> Self {
        self.download_policy = download_policy;
        self
    }

    pub fn with_recycle(mut self, recycle_policy: RecyclePolicy) -> Self {
        self.recycle_policy = recycle_policy;
        self
    }

    /// Restrict syncing to the given white-list entries.
    pub fn with_white_lists(mut self, white_lists: Vec<WhiteList>) -> Self {
        self.bw_list = BwList { white_lists };
        self
    }

    pub fn validate(&self) -> Result<(), AgentBayError> {
        self.recycle_policy.validate()
    }
}
