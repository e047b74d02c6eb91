use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── Wire ──

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub command: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum CommandResponse {
    Data { data: Value },
    Error { error: String },
}

impl CommandResponse {
    pub fn data(data: Value) -> Self {
        Self::Data { data }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// The one-shot transport prints results without the `data` wrapper.
    pub fn into_bare(self) -> Value {
        match self {
            Self::Data { data } => data,
            Self::Error { error } => serde_json::json!({ "error": error }),
        }
    }
}

// ── Config ──

#[derive(Debug, Clone)]
pub struct Config {
    pub http_timeout_secs: u64,
    pub default_environment: Option<String>,
    pub grvt_edge_url: Option<String>,
    pub grvt_trades_url: Option<String>,
    pub grvt_market_data_url: Option<String>,
    pub extended_api_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_timeout_secs: 15,
            default_environment: None,
            grvt_edge_url: None,
            grvt_trades_url: None,
            grvt_market_data_url: None,
            extended_api_url: None,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let http_timeout_secs = match std::env::var("BRIDGE_HTTP_TIMEOUT_SECS") {
            Ok(v) => v
                .parse()
                .map_err(|_| anyhow::anyhow!("BRIDGE_HTTP_TIMEOUT_SECS must be an integer, got {:?}", v))?,
            Err(_) => 15,
        };

        Ok(Self {
            http_timeout_secs,
            default_environment: non_empty_var("BRIDGE_ENVIRONMENT"),
            grvt_edge_url: non_empty_var("GRVT_EDGE_URL"),
            grvt_trades_url: non_empty_var("GRVT_TRADES_URL"),
            grvt_market_data_url: non_empty_var("GRVT_MARKET_DATA_URL"),
            extended_api_url: non_empty_var("EXTENDED_API_URL"),
        })
    }

    pub fn http_client(&self) -> anyhow::Result<reqwest::Client> {
        Ok(reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(self.http_timeout_secs))
            .user_agent(concat!("perp-bridge/", env!("CARGO_PKG_VERSION")))
            .build()?)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
