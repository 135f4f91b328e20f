use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Chains a contribution can be recorded against. The set is closed: the
/// tracker rejects anything else.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Ethereum,
    Solana,
}

impl Network {
    pub fn all() -> &'static [Network] {
        &[Network::Ethereum, Network::Solana]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Ethereum => "ethereum",
            Network::Solana => "solana",
        }
    }

    /// Symbol of the chain's gas-paying asset.
    pub fn native_symbol(&self) -> &'static str {
        match self {
            Network::Ethereum => "ETH",
            Network::Solana => "SOL",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownNetwork(pub String);

impl fmt::Display for UnknownNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported network '{}'", self.0)
    }
}

impl std::error::Error for UnknownNetwork {}

impl FromStr for Network {
    type Err = UnknownNetwork;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ethereum" => Ok(Network::Ethereum),
            "solana" => Ok(Network::Solana),
            other => Err(UnknownNetwork(other.to_string())),
        }
    }
}

/// Which asset a transfer moves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetKind {
    /// The chain's base currency, sent as a plain value transfer.
    #[default]
    Native,
    /// The configured fungible-token contract, sent via `transfer(address,uint256)`.
    Token,
}

/// An ERC-20 contract the client may transfer instead of the native asset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
    pub symbol: String,
    pub contract: String,
    pub decimals: u32,
}

impl TokenConfig {
    /// Chainlink LINK on Sepolia.
    pub fn sepolia_link() -> Self {
        Self {
            symbol: "LINK".to_string(),
            contract: "0x779877a7b0d9e8603169ddbd7836e478b4624789".to_string(),
            decimals: 18,
        }
    }
}

/// Parameters the wallet needs to validate, switch to, or register a chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainParams {
    pub network: Network,
    pub chain_id: u64,
    pub chain_name: String,
    pub rpc_urls: Vec<String>,
    pub currency_symbol: String,
    pub currency_decimals: u32,
    /// Explorer base URL, e.g. `https://sepolia.etherscan.io`. Display only.
    pub explorer_url: String,
}

impl ChainParams {
    pub fn sepolia() -> Self {
        Self {
            network: Network::Ethereum,
            chain_id: 11_155_111,
            chain_name: "Sepolia".to_string(),
            rpc_urls: vec!["https://rpc.sepolia.org".to_string()],
            currency_symbol: "ETH".to_string(),
            currency_decimals: 18,
            explorer_url: "https://sepolia.etherscan.io".to_string(),
        }
    }

    /// Anvil/Hardhat development chain.
    pub fn local_dev(rpc_url: &str) -> Self {
        Self {
            network: Network::Ethereum,
            chain_id: 31_337,
            chain_name: "Local".to_string(),
            rpc_urls: vec![rpc_url.to_string()],
            currency_symbol: "ETH".to_string(),
            currency_decimals: 18,
            explorer_url: String::new(),
        }
    }

    /// `0x`-prefixed hex chain id, as wallet RPC methods expect it.
    pub fn chain_id_hex(&self) -> String {
        format!("{:#x}", self.chain_id)
    }

    /// Link to a transaction on the chain explorer, if one is configured.
    pub fn explorer_tx_url(&self, tx_hash: &str) -> Option<String> {
        if self.explorer_url.is_empty() {
            return None;
        }
        Some(format!(
            "{}/tx/{}",
            self.explorer_url.trim_end_matches('/'),
            tx_hash
        ))
    }
}
