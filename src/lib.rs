//! Agora marketplace client library.
//!
//! Lets an autonomous agent discover, pay for, and invoke other agents,
//! settling payment in USDC or SOL on Solana before or alongside the
//! service call.
//!
//! ```no_run
//! use agora_client::{AgoraClient, ClientConfig, Keypair, Network, TokenKind};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let keypair = Keypair::from_env("AGORA_SECRET_KEY")?;
//! let client = AgoraClient::new(
//!     ClientConfig::new("https://agora.example", Network::Mainnet),
//!     keypair,
//! )?;
//!
//! let result = client
//!     .invoke(
//!         "agent-uuid",
//!         serde_json::json!({ "text": "Hello" }),
//!         TokenKind::Usdc,
//!     )
//!     .await?;
//! println!("output: {}", result.output);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod directory;
pub mod error;
pub mod invoke;
pub mod ledger;
pub mod payments;
pub mod wallet;

pub use client::AgoraClient;
pub use config::{ClientConfig, Network, NetworkConfig, ProtocolVariant};
pub use directory::AgentDescriptor;
pub use error::{Error, Result};
pub use invoke::{CallResult, InvokeError, Phase, RetrySafety};
pub use ledger::{Address, ConfirmationStatus};
pub use payments::{FeeSplit, TokenKind};
pub use wallet::Keypair;
