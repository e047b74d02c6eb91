use crate::core::types::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendedEnv {
    Testnet,
    Mainnet,
}

impl ExtendedEnv {
    /// Absent means testnet; any name other than `testnet` is mainnet.
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw {
            None => ExtendedEnv::Testnet,
            Some(name) if name.trim().eq_ignore_ascii_case("testnet") => ExtendedEnv::Testnet,
            Some(_) => ExtendedEnv::Mainnet,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ExtendedEnv::Testnet => "testnet",
            ExtendedEnv::Mainnet => "mainnet",
        }
    }

    pub fn api_url(self) -> &'static str {
        match self {
            ExtendedEnv::Testnet => "https://api.starknet.sepolia.extended.exchange/api/v1",
            ExtendedEnv::Mainnet => "https://api.starknet.extended.exchange/api/v1",
        }
    }

    /// Starknet chain id the settlement signatures are bound to.
    pub fn chain_id(self) -> &'static str {
        match self {
            ExtendedEnv::Testnet => "SN_SEPOLIA",
            ExtendedEnv::Mainnet => "SN_MAIN",
        }
    }

    pub fn base_url(self, config: &Config) -> String {
        config
            .extended_api_url
            .as_deref()
            .unwrap_or(self.api_url())
            .trim_end_matches('/')
            .to_string()
    }
}
