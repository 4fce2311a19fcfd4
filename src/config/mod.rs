//! Client configuration.
//!
//! Network-specific constants (RPC endpoint, protocol fee wallet, USDC mint)
//! come as a fixed triple per network. The triples are never mixed: choosing
//! a network picks all three, and individual overrides replace a member
//! without touching the others.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Target Solana cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Devnet,
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Devnet => write!(f, "devnet"),
        }
    }
}

/// Which settlement protocol `invoke()` runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolVariant {
    /// Client builds, signs, submits, and confirms the payment itself, then
    /// calls the service with the confirmed signature as proof.
    ///
    /// Input validation only happens at the service call, after funds have
    /// moved. Malformed input can strand the payment.
    SelfAuthorized,

    /// Platform builds the transaction after validating the input, the
    /// client only signs, and a relay submits on the client's behalf.
    /// Invalid input fails before any funds move.
    #[default]
    FailFast,
}

/// Per-network constant triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Default JSON-RPC endpoint.
    pub rpc_url: String,
    /// Platform fee-recipient wallet (base58).
    pub protocol_wallet: String,
    /// USDC mint address on this network (base58).
    pub usdc_mint: String,
}

impl NetworkConfig {
    /// The fixed triple for a network.
    pub fn for_network(network: Network) -> Self {
        match network {
            Network::Mainnet => Self {
                rpc_url: "https://api.mainnet-beta.solana.com".to_string(),
                protocol_wallet: "CYSnefexbvrRU6VxzGfvZqKYM4UixupvDeZg3sUSWm84".to_string(),
                usdc_mint: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".to_string(),
            },
            Network::Devnet => Self {
                rpc_url: "https://api.devnet.solana.com".to_string(),
                protocol_wallet: "BubFsAG8cSEH7NkLpZijctRpsZkCiaWqCdRfh8kUpXEt".to_string(),
                usdc_mint: "EGzSiubUqhzWFR2KxWCx6jHD6XNsVhKrnebjcQdN6qK4".to_string(),
            },
        }
    }
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Marketplace API base URL (e.g. "https://agora.example").
    pub api_url: String,

    /// Target network; selects the default constant triple.
    pub network: Network,

    /// Settlement protocol variant.
    pub variant: ProtocolVariant,

    /// Resolved network constants (defaults for `network`, with overrides
    /// applied).
    pub network_config: NetworkConfig,

    /// Per-request timeout for every network call.
    pub request_timeout: Duration,

    /// Upper bound on confirmation polling (self-authorized variant only).
    pub confirm_timeout: Duration,
}

impl ClientConfig {
    /// Configuration for an API endpoint and network, with defaults for
    /// everything else.
    pub fn new(api_url: impl Into<String>, network: Network) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            network,
            variant: ProtocolVariant::default(),
            network_config: NetworkConfig::for_network(network),
            request_timeout: Duration::from_secs(30),
            confirm_timeout: Duration::from_secs(60),
        }
    }

    /// Select the settlement protocol variant.
    pub fn with_variant(mut self, variant: ProtocolVariant) -> Self {
        self.variant = variant;
        self
    }

    /// Override the ledger RPC endpoint.
    pub fn with_rpc_url(mut self, rpc_url: impl Into<String>) -> Self {
        self.network_config.rpc_url = rpc_url.into();
        self
    }

    /// Override the protocol fee wallet.
    pub fn with_protocol_wallet(mut self, wallet: impl Into<String>) -> Self {
        self.network_config.protocol_wallet = wallet.into();
        self
    }

    /// Override the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Override the confirmation polling bound.
    pub fn with_confirm_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_timeout = timeout;
        self
    }

    /// Validate URL shapes before constructing a client.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.api_url)
            .map_err(|e| Error::Config(format!("invalid api_url '{}': {}", self.api_url, e)))?;
        url::Url::parse(&self.network_config.rpc_url).map_err(|e| {
            Error::Config(format!(
                "invalid rpc_url '{}': {}",
                self.network_config.rpc_url, e
            ))
        })?;
        Ok(())
    }
}
