use clap::{Parser, Subcommand};

/// Command-line options for the agentbay tool.
#[derive(Parser, Debug, Clone)]
#[command(name = "agentbay")]
#[command(about = "Create, inspect and tear down AgentBay cloud sessions")]
pub struct Config {
    /// API key (falls back to .env when unset)
    #[arg(long, env = "AGENTBAY_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// API endpoint host or URL
    #[arg(long, env = "AGENTBAY_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Region ID
    #[arg(long, env = "AGENTBAY_REGION_ID")]
    pub region_id: Option<String>,

    /// Request timeout (milliseconds)
    #[arg(long, env = "AGENTBAY_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create a session
    Create {
        /// Image to boot
        #[arg(long)]
        image: Option<String>,

        /// Label as KEY=VALUE (repeatable)
        #[arg(long = "label", value_parser = parse_key_value)]
        labels: Vec<(String, String)>,

        /// Context to mount as CONTEXT_ID:PATH (repeatable)
        #[arg(long = "context", value_parser = parse_context_mount)]
        contexts: Vec<(String, String)>,
    },

    /// List session IDs
    List {
        /// Label filter as KEY=VALUE (repeatable)
        #[arg(long = "label", value_parser = parse_key_value)]
        labels: Vec<(String, String)>,

        /// Page number, starting at 1
        #[arg(long)]
        page: Option<u32>,

        /// Page size
        #[arg(long)]
        limit: Option<u32>,

        /// Follow every page
        #[arg(long, conflicts_with = "page")]
        all: bool,
    },

    /// Show session details
    Info { session_id: String },

    /// Pause a session and wait for it
    Pause {
        session_id: String,

        /// Give up after this many seconds
        #[arg(long, default_value = "600")]
        timeout_secs: u64,
    },

    /// Resume a paused session and wait for it
    Resume {
        session_id: String,

        #[arg(long, default_value = "600")]
        timeout_secs: u64,
    },

    /// Release a session
    Delete {
        session_id: String,

        /// Upload context data before releasing
        #[arg(long)]
        sync: bool,
    },

    /// Run a shell command inside a session
    Exec {
        session_id: String,

        command: String,

        #[arg(long, default_value = "1000")]
        timeout_ms: u64,
    },
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() && !value.is_empty() => {
            Ok((key.to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got {:?}", raw)),
    }
}

fn parse_context_mount(raw: &str) -> Result<(String, String), String> {
    match raw.split_once(':') {
        Some((context_id, path)) if !context_id.is_empty() && path.starts_with('/') => {
            Ok((context_id.to_string(), path.to_string()))
        }
        _ => Err(format!("expected CONTEXT_ID:/absolute/path, got {:?}", raw)),
    }
}
