//! Client configuration.
//!
//! Resolution is a pure function over three snapshots so it can be tested
//! without touching the process environment. Precedence, highest first:
//! explicit overrides, process environment, `.env` dotfile, built-in defaults.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use agentbay_core::AgentBayError;
use tracing::debug;

pub const ENV_API_KEY: &str = "AGENTBAY_API_KEY";
pub const ENV_ENDPOINT: &str = "AGENTBAY_ENDPOINT";
pub const ENV_REGION_ID: &str = "AGENTBAY_REGION_ID";
pub const ENV_TIMEOUT_MS: &str = "AGENTBAY_TIMEOUT_MS";

pub const DEFAULT_ENDPOINT: &str = "wuyingai.cn-shanghai.aliyuncs.com";
pub const DEFAULT_REGION_ID: &str = "cn-shanghai";
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

const DOTFILE_NAME: &str = ".env";

/// Values supplied directly by the caller. Unset fields fall through to
/// the environment, the dotfile and finally the defaults.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub region_id: Option<String>,
    pub timeout_ms: Option<u64>,
}

/// Fully resolved client configuration.
#[derive(Clone)]
pub struct Config {
    pub api_key: String,
    pub endpoint: String,
    pub region_id: String,
    pub timeout_ms: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("region_id", &self.region_id)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl Config {
    /// Merge the three sources into one fully defaulted config.
    pub fn resolve(
        explicit: &ConfigOverrides,
        env: &HashMap<String, String>,
        dotfile: &HashMap<String, String>,
    ) -> Result<Config, AgentBayError> {
        let lookup = |key: &str| -> Option<String> {
            env.get(key)
                .or_else(|| dotfile.get(key))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = explicit
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| lookup(ENV_API_KEY))
            .ok_or_else(|| {
                AgentBayError::Config(format!(
                    "API key is required: pass it explicitly or set {}",
                    ENV_API_KEY
                ))
            })?;

        let endpoint = explicit
            .endpoint
            .clone()
            .or_else(|| lookup(ENV_ENDPOINT))
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        let region_id = explicit
            .region_id
            .clone()
            .or_else(|| lookup(ENV_REGION_ID))
            .unwrap_or_else(|| DEFAULT_REGION_ID.to_string());

        let timeout_ms = match explicit.timeout_ms {
            Some(ms) => ms,
            None => match lookup(ENV_TIMEOUT_MS) {
                Some(raw) => raw.parse::<u64>().map_err(|_| {
                    AgentBayError::Config(format!("{} must be an integer, got {:?}", ENV_TIMEOUT_MS, raw))
                })?,
                None => DEFAULT_TIMEOUT_MS,
            },
        };

        Ok(Config {
            api_key,
            endpoint,
            region_id,
            timeout_ms,
        })
    }

    /// Resolve against the live process environment and the nearest `.env`.
    pub fn load(explicit: &ConfigOverrides) -> Result<Config, AgentBayError> {
        let env = env_snapshot();
        let dotfile = std::env::current_dir()
            .ok()
            .and_then(|cwd| find_dotfile(&cwd))
            .map(|path| dotfile_snapshot(&path))
            .unwrap_or_default();
        Self::resolve(explicit, &env, &dotfile)
    }

    pub fn from_env() -> Result<Config, AgentBayError> {
        Self::load(&ConfigOverrides::default())
    }

    /// Base URL for API calls; bare hosts are assumed to speak HTTPS.
    pub fn base_url(&self) -> String {
        let endpoint = self.endpoint.trim_end_matches('/');
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!("https://{}", endpoint)
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Snapshot of the `AGENTBAY_*` process environment variables.
pub fn env_snapshot() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(key, _)| key.starts_with("AGENTBAY_"))
        .collect()
}

/// Parse a dotfile into a key/value snapshot. A missing or unreadable file
/// yields an empty snapshot; malformed lines are skipped.
pub fn dotfile_snapshot(path: &Path) -> HashMap<String, String> {
    match dotenvy::from_path_iter(path) {
        Ok(iter) => iter.filter_map(Result::ok).collect(),
        Err(e) => {
            debug!("No dotfile loaded from {}: {}", path.display(), e);
            HashMap::new()
        }
    }
}

/// Search `start` and its ancestors for a `.env` file.
pub fn find_dotfile(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(DOTFILE_NAME))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_precedence_explicit_env_dotfile_default() {
        let explicit = ConfigOverrides {
            api_key: Some("explicit-key".to_string()),
            ..Default::default()
        };
        let env = snapshot(&[(ENV_API_KEY, "env-key"), (ENV_ENDPOINT, "env.example.com")]);
        let dotfile = snapshot(&[
            (ENV_API_KEY, "file-key"),
            (ENV_ENDPOINT, "file.example.com"),
            (ENV_REGION_ID, "ap-southeast-1"),
        ]);

        let config = Config::resolve(&explicit, &env, &dotfile).unwrap();
        assert_eq!(config.api_key, "explicit-key");
        assert_eq!(config.endpoint, "env.example.com");
        assert_eq!(config.region_id, "ap-southeast-1");
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let result = Config::resolve(&ConfigOverrides::default(), &HashMap::new(), &HashMap::new());
        assert!(matches!(result, Err(AgentBayError::Config(_))));
    }

    #[test]
    fn test_invalid_timeout_is_config_error() {
        let env = snapshot(&[(ENV_API_KEY, "k"), (ENV_TIMEOUT_MS, "soon")]);
        let result = Config::resolve(&ConfigOverrides::default(), &env, &HashMap::new());
        assert!(matches!(result, Err(AgentBayError::Config(_))));
    }

    #[test]
    fn test_base_url() {
        let mut config = Config::resolve(
            &ConfigOverrides {
                api_key: Some("k".to_string()),
                ..Default::default()
            },
            &HashMap::new(),
            &HashMap::new(),
        )
        .unwrap();
        assert_eq!(config.base_url(), "https://wuyingai.cn-shanghai.aliyuncs.com");

        config.endpoint = "http://127.0.0.1:8080/".to_string();
        assert_eq!(config.base_url(), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = Config {
            api_key: "akm-secret".to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            region_id: DEFAULT_REGION_ID.to_string(),
            timeout_ms: 1,
        };
        assert!(!format!("{:?}", config).contains("akm-secret"));
    }

    #[test]
    fn test_dotfile_snapshot_and_discovery() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(
            temp_dir.path().join(".env"),
            "AGENTBAY_API_KEY=from-file\nAGENTBAY_TIMEOUT_MS=1500\n",
        )
        .unwrap();

        let found = find_dotfile(&nested).unwrap();
        let file = dotfile_snapshot(&found);
        assert_eq!(file.get(ENV_API_KEY).map(String::as_str), Some("from-file"));

        let config = Config::resolve(&ConfigOverrides::default(), &HashMap::new(), &file).unwrap();
        assert_eq!(config.api_key, "from-file");
        assert_eq!(config.timeout_ms, 1500);

        assert!(dotfile_snapshot(&temp_dir.path().join("missing.env")).is_empty());
    }
}
