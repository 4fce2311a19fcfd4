//! Error taxonomy for the client.
//!
//! Every variant tells the caller whether funds could have moved; the
//! per-phase retry guidance lives in [`crate::invoke::InvokeError`].

use thiserror::Error;

/// Errors surfaced by the Agora client.
#[derive(Debug, Error)]
pub enum Error {
    /// Key material missing, malformed, or inconsistent. Fatal, no retry.
    #[error("key load error: {0}")]
    KeyLoad(String),

    /// Token outside the supported set. Caller must switch token.
    #[error("unsupported token: {0}")]
    UnsupportedToken(String),

    /// Unknown agent id, or the directory said so.
    #[error("agent not found: {0}")]
    ServiceNotFound(String),

    /// Platform rejected the input before any transaction was built.
    /// Zero funds moved; fix the input and retry freely.
    #[error("input rejected before payment: {0}")]
    InputValidation(String),

    /// The recent blockhash expired before submission. Rebuild and resubmit
    /// with a fresh checkpoint.
    #[error("transaction checkpoint expired; rebuild and resubmit")]
    StaleCheckpoint,

    /// The network rejected the transaction outright. Funds did not move.
    #[error("transaction submission rejected: {0}")]
    Submission(String),

    /// Confirmation polling hit its bound. The transaction was broadcast and
    /// may still land; reconcile via signature lookup before retrying.
    #[error("confirmation timed out for {signature}; outcome unknown")]
    ConfirmationTimeout { signature: String },

    /// Payment settled but the service call failed. Funds already moved;
    /// never retried silently.
    #[error("service call failed after payment {signature}: {message}")]
    ServiceInvocation { signature: String, message: String },

    /// Fee basis points outside [0, 10000].
    #[error("fee basis points {0} out of range (0-10000)")]
    InvalidFeeBps(u32),

    /// Price or exchange rate that cannot be converted to base units.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Ledger JSON-RPC failure (transport or protocol).
    #[error("ledger RPC error: {0}")]
    Rpc(String),

    /// Marketplace API returned an error envelope.
    #[error("marketplace API error: {0}")]
    Api(String),

    /// A transaction payload could not be parsed or signed in place.
    #[error("malformed transaction payload: {0}")]
    Payload(String),

    /// Invalid base58 address text or length.
    #[error("invalid address: {0}")]
    Address(String),

    /// Invalid client configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
