use crate::core::types::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrvtEnv {
    Testnet,
    Staging,
    Prod,
}

impl GrvtEnv {
    /// `mainnet`/`prod` and `staging` are recognised; anything else is testnet.
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("mainnet") | Some("prod") | Some("production") => GrvtEnv::Prod,
            Some("staging") => GrvtEnv::Staging,
            _ => GrvtEnv::Testnet,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GrvtEnv::Testnet => "testnet",
            GrvtEnv::Staging => "staging",
            GrvtEnv::Prod => "mainnet",
        }
    }

    /// EIP-712 domain chain id.
    pub fn chain_id(self) -> u64 {
        match self {
            GrvtEnv::Prod => 325,
            GrvtEnv::Testnet => 326,
            GrvtEnv::Staging => 327,
        }
    }

    fn hosts(self) -> (&'static str, &'static str, &'static str) {
        match self {
            GrvtEnv::Prod => (
                "https://edge.grvt.io",
                "https://trades.grvt.io",
                "https://market-data.grvt.io",
            ),
            GrvtEnv::Testnet => (
                "https://edge.testnet.grvt.io",
                "https://trades.testnet.grvt.io",
                "https://market-data.testnet.grvt.io",
            ),
            GrvtEnv::Staging => (
                "https://edge.staging.gravitymarkets.io",
                "https://trades.staging.gravitymarkets.io",
                "https://market-data.staging.gravitymarkets.io",
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Endpoints {
    pub edge: String,
    pub trades: String,
    pub market_data: String,
}

impl Endpoints {
    pub fn resolve(env: GrvtEnv, config: &Config) -> Self {
        let (edge, trades, market_data) = env.hosts();
        let pick = |over: &Option<String>, default: &str| {
            over.as_deref()
                .unwrap_or(default)
                .trim_end_matches('/')
                .to_string()
        };
        Self {
            edge: pick(&config.grvt_edge_url, edge),
            trades: pick(&config.grvt_trades_url, trades),
            market_data: pick(&config.grvt_market_data_url, market_data),
        }
    }
}
