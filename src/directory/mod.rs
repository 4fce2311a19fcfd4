//! Marketplace HTTP API: agent directory reads and the call endpoints.
//!
//! Every response is an `{ok, ...}` envelope; `ok: false` carries an error
//! string. Descriptors are fetched fresh per call, since price and fee may
//! change between invocations, so nothing is cached.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::payments::types::PriceQuote;

/// A priced, invocable agent as listed by the directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Wallet receiving the service share of each payment.
    pub owner_wallet: String,
    pub price_usd: f64,
    /// Platform fee in basis points; the directory may omit it.
    #[serde(default = "default_fee_bps")]
    pub fee_bps: u32,
    #[serde(default)]
    pub accepted_tokens: Vec<String>,
    #[serde(default)]
    pub primary_display_token: Option<String>,
    /// Declared input schema, used server-side for pre-payment validation.
    #[serde(default)]
    pub input_schema: Option<Value>,
}

fn default_fee_bps() -> u32 {
    1000
}

/// Final outcome of a paid call, as returned by the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallOutcome {
    #[serde(default)]
    pub output: Value,
    pub tx_signature: String,
    #[serde(default)]
    pub receipt_id: String,
    #[serde(default)]
    pub explorer_url: String,
    #[serde(default)]
    pub agent_received: u64,
    #[serde(default)]
    pub protocol_fee: u64,
}

/// Platform-built unsigned transaction (fail-fast variant).
#[derive(Debug, Clone, Deserialize)]
pub struct BuiltTransaction {
    pub payment_intent_id: String,
    /// Base64 wire transaction, ready to sign.
    pub transaction: String,
    #[serde(default)]
    pub amount_base: u64,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    rest: Value,
}

impl Envelope {
    fn into_field<T: serde::de::DeserializeOwned>(self, field: &str) -> Result<T> {
        if !self.ok {
            return Err(Error::Api(
                self.error.unwrap_or_else(|| "request failed".to_string()),
            ));
        }
        let value = self
            .rest
            .get(field)
            .cloned()
            .ok_or_else(|| Error::Api(format!("response missing '{}'", field)))?;
        Ok(serde_json::from_value(value)?)
    }

    fn into_value(self) -> Result<Value> {
        if !self.ok {
            return Err(Error::Api(
                self.error.unwrap_or_else(|| "request failed".to_string()),
            ));
        }
        Ok(self.rest)
    }
}

/// Reqwest-backed marketplace client.
#[derive(Debug, Clone)]
pub struct MarketplaceHttp {
    http: reqwest::Client,
    api_url: String,
}

impl MarketplaceHttp {
    pub fn new(http: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            http,
            api_url: api_url.into(),
        }
    }

    async fn get(&self, path: &str) -> Result<(reqwest::StatusCode, Envelope)> {
        let response = self
            .http
            .get(format!("{}{}", self.api_url, path))
            .send()
            .await?;
        let status = response.status();
        Ok((status, response.json().await?))
    }

    async fn post(&self, path: &str, body: &Value) -> Result<(reqwest::StatusCode, Envelope)> {
        let response = self
            .http
            .post(format!("{}{}", self.api_url, path))
            .json(body)
            .send()
            .await?;
        let status = response.status();
        Ok((status, response.json().await?))
    }

    /// All active agents. Lazy network call, never cached.
    pub async fn list_agents(&self) -> Result<Vec<AgentDescriptor>> {
        let (_, envelope) = self.get("/api/agents").await?;
        envelope.into_field("agents")
    }

    /// One agent by id.
    pub async fn get_agent(&self, agent_id: &str) -> Result<AgentDescriptor> {
        let (status, envelope) = self.get(&format!("/api/agents/{}", agent_id)).await?;
        match envelope.into_field("agent") {
            Ok(agent) => Ok(agent),
            Err(Error::Api(message)) => Err(classify_agent_error(status, agent_id, message)),
            Err(other) => Err(other),
        }
    }

    /// Live native-token quote from the platform.
    pub async fn sol_price(&self) -> Result<PriceQuote> {
        let (_, envelope) = self.get("/api/price/sol").await?;
        let value = envelope.into_value()?;
        let price = value
            .get("price")
            .and_then(Value::as_f64)
            .ok_or_else(|| Error::Api("price quote missing 'price'".to_string()))?;
        Ok(PriceQuote { usd_per_sol: price })
    }

    /// Self-authorized call: present the settled signature as proof of
    /// payment alongside the raw input.
    pub async fn call_with_proof(
        &self,
        agent_id: &str,
        input: &Value,
        caller_wallet: &str,
        tx_signature: &str,
        selected_token: &str,
    ) -> Result<CallOutcome> {
        let body = serde_json::json!({
            "agent_id": agent_id,
            "input": input,
            "caller_wallet": caller_wallet,
            "tx_signature": tx_signature,
            "selected_token": selected_token,
        });
        let (_, envelope) = self.post("/api/agents/call", &body).await?;
        Ok(serde_json::from_value(envelope.into_value()?)?)
    }

    /// Fail-fast build step: the platform validates `input` against the
    /// agent's schema before it returns a transaction, so a rejection here
    /// means zero funds moved.
    pub async fn build_transaction(
        &self,
        agent_id: &str,
        payer_wallet: &str,
        selected_token: &str,
        input: &Value,
    ) -> Result<BuiltTransaction> {
        let body = serde_json::json!({
            "payer_wallet": payer_wallet,
            "selected_token": selected_token,
            "input": input,
        });
        let (status, envelope) = self
            .post(&format!("/api/agents/{}/build-transaction", agent_id), &body)
            .await?;
        if !envelope.ok {
            return Err(classify_build_rejection(
                status,
                envelope.error.unwrap_or_else(|| "input rejected".to_string()),
            ));
        }
        Ok(serde_json::from_value(envelope.into_value()?)?)
    }

    /// Fail-fast settle step: hand the signed transaction back to the relay,
    /// which submits it and returns the final outcome.
    pub async fn relay_signed(
        &self,
        payment_intent_id: &str,
        signed_transaction_b64: &str,
    ) -> Result<CallOutcome> {
        let body = serde_json::json!({
            "payment_intent_id": payment_intent_id,
            "signed_transaction": signed_transaction_b64,
        });
        let (_, envelope) = self.post("/api/agents/call", &body).await?;
        Ok(serde_json::from_value(envelope.into_value()?)?)
    }
}

/// Decide whether a directory lookup failure means the agent does not exist.
///
/// Only a 404 or an explicit not-found message becomes [`Error::ServiceNotFound`];
/// anything else (rate limiting, platform faults) stays [`Error::Api`] so the
/// caller does not conclude the agent is gone.
fn classify_agent_error(status: reqwest::StatusCode, agent_id: &str, message: String) -> Error {
    if status == reqwest::StatusCode::NOT_FOUND || message.to_lowercase().contains("not found") {
        Error::ServiceNotFound(format!("{}: {}", agent_id, message))
    } else {
        Error::Api(message)
    }
}

/// Decide whether a build rejection is an input problem or a platform fault.
///
/// A server-side failure must not masquerade as input validation: the input
/// may be fine and a later retry against a healthy platform can succeed.
fn classify_build_rejection(status: reqwest::StatusCode, message: String) -> Error {
    if status.is_server_error() {
        Error::Api(message)
    } else {
        Error::InputValidation(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_defaults() {
        let agent: AgentDescriptor = serde_json::from_value(serde_json::json!({
            "id": "a-1",
            "name": "TitleGenerator",
            "owner_wallet": "BubFsAG8cSEH7NkLpZijctRpsZkCiaWqCdRfh8kUpXEt",
            "price_usd": 0.25
        }))
        .unwrap();
        assert_eq!(agent.fee_bps, 1000);
        assert!(agent.accepted_tokens.is_empty());
        assert!(agent.input_schema.is_none());
    }

    #[test]
    fn test_envelope_error_propagates_message() {
        let envelope: Envelope =
            serde_json::from_value(serde_json::json!({ "ok": false, "error": "nope" })).unwrap();
        match envelope.into_value() {
            Err(Error::Api(message)) => assert_eq!(message, "nope"),
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_envelope_extracts_field() {
        let envelope: Envelope = serde_json::from_value(serde_json::json!({
            "ok": true,
            "agents": [{
                "id": "a-1",
                "name": "Echo",
                "owner_wallet": "w",
                "price_usd": 1.0
            }]
        }))
        .unwrap();
        let agents: Vec<AgentDescriptor> = envelope.into_field("agents").unwrap();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].name, "Echo");
    }

    #[test]
    fn test_agent_error_classification() {
        use reqwest::StatusCode;

        assert!(matches!(
            classify_agent_error(StatusCode::NOT_FOUND, "a-1", "gone".to_string()),
            Error::ServiceNotFound(_)
        ));
        assert!(matches!(
            classify_agent_error(StatusCode::OK, "a-1", "Agent not found".to_string()),
            Error::ServiceNotFound(_)
        ));
        // A throttled or failing platform is not a missing agent.
        assert!(matches!(
            classify_agent_error(StatusCode::TOO_MANY_REQUESTS, "a-1", "rate limited".to_string()),
            Error::Api(_)
        ));
        assert!(matches!(
            classify_agent_error(StatusCode::BAD_GATEWAY, "a-1", "upstream error".to_string()),
            Error::Api(_)
        ));
    }

    #[test]
    fn test_build_rejection_classification() {
        use reqwest::StatusCode;

        assert!(matches!(
            classify_build_rejection(StatusCode::BAD_REQUEST, "missing field 'text'".to_string()),
            Error::InputValidation(_)
        ));
        assert!(matches!(
            classify_build_rejection(StatusCode::OK, "input does not match schema".to_string()),
            Error::InputValidation(_)
        ));
        // A 5xx is a platform fault, not bad input.
        assert!(matches!(
            classify_build_rejection(StatusCode::INTERNAL_SERVER_ERROR, "db down".to_string()),
            Error::Api(_)
        ));
    }

    #[test]
    fn test_call_outcome_parses_platform_response() {
        let outcome: CallOutcome = serde_json::from_value(serde_json::json!({
            "output": { "title": "Hello" },
            "tx_signature": "5sig",
            "receipt_id": "r-9",
            "explorer_url": "https://explorer.example/tx/5sig",
            "agent_received": 900000u64,
            "protocol_fee": 100000u64
        }))
        .unwrap();
        assert_eq!(outcome.agent_received, 900_000);
        assert_eq!(outcome.output["title"], "Hello");
    }
}
