//! Ledger JSON-RPC submission client.
//!
//! # Responsibilities
//! - Fetch a recent blockhash (the freshness checkpoint for new transactions)
//! - Broadcast signed transactions
//! - Poll for confirmation with a bounded timeout
//!
//! Hitting the polling bound yields [`ConfirmationStatus::Unknown`], never
//! `Failed`: a broadcast transaction may still land, and the caller must
//! reconcile via [`RpcClient::signature_status`] before retrying.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};
use tokio::time::{interval, timeout};

use crate::error::{Error, Result};
use crate::ledger::transaction::Blockhash;

/// Commitment level a confirmation must reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Commitment {
    Processed,
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "processed" => Some(Commitment::Processed),
            "confirmed" => Some(Commitment::Confirmed),
            "finalized" => Some(Commitment::Finalized),
            _ => None,
        }
    }
}

/// Outcome of a confirmation query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationStatus {
    /// Reached the requested commitment.
    Confirmed { slot: u64 },
    /// The ledger executed the transaction and it failed.
    Failed(String),
    /// The ledger has no record of the signature (yet).
    NotFound,
    /// The polling bound elapsed without a definite answer.
    Unknown,
}

/// JSON-RPC client for the ledger network.
#[derive(Debug, Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    url: String,
    request_timeout: Duration,
}

impl RpcClient {
    pub fn new(http: reqwest::Client, url: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            http,
            url: url.into(),
            request_timeout,
        }
    }

    /// One JSON-RPC round trip with a per-request timeout.
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let fut = async {
            let response = self.http.post(&self.url).json(&body).send().await?;
            let payload: Value = response.json().await?;
            Ok::<Value, Error>(payload)
        };

        let payload = timeout(self.request_timeout, fut)
            .await
            .map_err(|_| Error::Rpc(format!("{} timed out", method)))??;

        if let Some(err) = payload.get("error") {
            let message = err
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown RPC error")
                .to_string();
            if message.contains("BlockhashNotFound") || message.contains("Blockhash not found") {
                return Err(Error::StaleCheckpoint);
            }
            return Err(Error::Rpc(message));
        }

        payload
            .get("result")
            .cloned()
            .ok_or_else(|| Error::Rpc(format!("{}: response missing result", method)))
    }

    /// Fetch a recent blockhash at the given commitment.
    pub async fn latest_blockhash(&self, commitment: Commitment) -> Result<Blockhash> {
        let result = self
            .call(
                "getLatestBlockhash",
                json!([{ "commitment": commitment.as_str() }]),
            )
            .await?;
        let hash = result
            .pointer("/value/blockhash")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Rpc("malformed getLatestBlockhash response".to_string()))?;
        Blockhash::from_base58(hash)
    }

    /// Broadcast serialized transaction bytes. Returns the base58 signature.
    ///
    /// Rejections map to [`Error::Submission`] (funds did not move) except
    /// for an expired blockhash, which stays [`Error::StaleCheckpoint`] so
    /// the caller knows a rebuild is enough.
    pub async fn send_transaction(&self, tx_bytes: &[u8]) -> Result<String> {
        let encoded = BASE64.encode(tx_bytes);
        let result = self
            .call(
                "sendTransaction",
                json!([encoded, { "encoding": "base64" }]),
            )
            .await
            .map_err(|e| match e {
                Error::StaleCheckpoint => Error::StaleCheckpoint,
                Error::Rpc(message) => Error::Submission(message),
                other => other,
            })?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::Rpc("malformed sendTransaction response".to_string()))
    }

    /// Current status of a signature, without waiting.
    pub async fn signature_status(&self, signature: &str) -> Result<ConfirmationStatus> {
        let result = self
            .call(
                "getSignatureStatuses",
                json!([[signature], { "searchTransactionHistory": true }]),
            )
            .await?;
        let entry = result
            .pointer("/value/0")
            .ok_or_else(|| Error::Rpc("malformed getSignatureStatuses response".to_string()))?;
        Ok(parse_signature_status(entry, Commitment::Confirmed))
    }

    /// Poll until the signature reaches `commitment` or `bound` elapses.
    pub async fn confirm(
        &self,
        signature: &str,
        commitment: Commitment,
        bound: Duration,
    ) -> Result<ConfirmationStatus> {
        let poll = async {
            let mut ticker = interval(Duration::from_secs(2));
            loop {
                ticker.tick().await;
                let result = self
                    .call(
                        "getSignatureStatuses",
                        json!([[signature], { "searchTransactionHistory": false }]),
                    )
                    .await?;
                let entry = result
                    .pointer("/value/0")
                    .cloned()
                    .unwrap_or(Value::Null);
                match parse_signature_status(&entry, commitment) {
                    ConfirmationStatus::Confirmed { slot } => {
                        return Ok(ConfirmationStatus::Confirmed { slot });
                    }
                    ConfirmationStatus::Failed(reason) => {
                        return Ok(ConfirmationStatus::Failed(reason));
                    }
                    ConfirmationStatus::NotFound | ConfirmationStatus::Unknown => {
                        tracing::debug!(signature, "transaction not yet confirmed");
                    }
                }
            }
        };

        match timeout(bound, poll).await {
            Ok(status) => status,
            // Unknown, not Failed: the transaction was broadcast and may
            // still land after the bound.
            Err(_) => Ok(ConfirmationStatus::Unknown),
        }
    }
}

/// Interpret one `getSignatureStatuses` entry against a minimum commitment.
fn parse_signature_status(entry: &Value, min: Commitment) -> ConfirmationStatus {
    if entry.is_null() {
        return ConfirmationStatus::NotFound;
    }
    if let Some(err) = entry.get("err") {
        if !err.is_null() {
            return ConfirmationStatus::Failed(err.to_string());
        }
    }
    let reached = entry
        .get("confirmationStatus")
        .and_then(Value::as_str)
        .and_then(Commitment::from_str);
    match reached {
        Some(level) if level >= min => ConfirmationStatus::Confirmed {
            slot: entry.get("slot").and_then(Value::as_u64).unwrap_or(0),
        },
        _ => ConfirmationStatus::Unknown,
    }
}
