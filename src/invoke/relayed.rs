//! Relayed, fail-fast settlement: the platform builds and submits.
//!
//! The build endpoint validates the input against the agent's declared
//! schema *before* returning a transaction, so bad input costs nothing. The
//! client's only cryptographic act is signing the returned payload; the
//! relay owns submission and confirmation, and the client never talks to
//! the ledger network.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::Value;

use crate::directory::AgentDescriptor;
use crate::error::Error;
use crate::invoke::{
    fail, CallResult, InvokeError, Phase, SettlementContext, SettlementStrategy,
};
use crate::ledger::transaction::sign_wire_transaction;
use crate::payments::types::TokenKind;

/// Variant that delegates submission to the platform relay.
#[derive(Debug, Default)]
pub struct RelayedSettlement;

#[async_trait]
impl SettlementStrategy for RelayedSettlement {
    async fn settle(
        &self,
        ctx: &SettlementContext,
        agent: &AgentDescriptor,
        input: &Value,
        token: TokenKind,
    ) -> std::result::Result<CallResult, InvokeError> {
        // BUILDING: the platform validates input first. A rejection here is
        // always pre-payment.
        let built = ctx
            .marketplace
            .build_transaction(
                &agent.id,
                &ctx.keypair.address().to_string(),
                token.as_str(),
                input,
            )
            .await
            .map_err(fail(Phase::Building))?;
        tracing::debug!(
            payment_intent_id = %built.payment_intent_id,
            amount_base = built.amount_base,
            "platform built payment transaction"
        );

        // SIGNING: the payload stays opaque beyond locating our signer slot.
        let wire = BASE64
            .decode(&built.transaction)
            .map_err(|e| InvokeError::new(Phase::Signing, Error::Payload(e.to_string())))?;
        let (signed, signature) =
            sign_wire_transaction(&wire, &ctx.keypair).map_err(fail(Phase::Signing))?;

        // SUBMITTING: one intent, one signed payload, submitted once by the
        // relay. A rejection may or may not have moved funds, so it maps to
        // a fresh-intent retry, never a resubmission of the same bytes.
        let outcome = ctx
            .marketplace
            .relay_signed(&built.payment_intent_id, &BASE64.encode(&signed))
            .await
            .map_err(|e| match e {
                Error::Api(message) => {
                    InvokeError::new(Phase::Submitting, Error::Submission(message))
                }
                other => InvokeError::new(Phase::Submitting, other),
            })?;

        tracing::debug!(%signature, tx_signature = %outcome.tx_signature, "relay settled call");

        Ok(CallResult::from_outcome(outcome, token))
    }
}
