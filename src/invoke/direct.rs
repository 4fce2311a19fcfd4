//! Self-authorized settlement: the client moves the funds itself.
//!
//! The payment is built, signed, submitted, and confirmed locally before the
//! service endpoint ever sees the input. The service call only happens with
//! a settled signature in hand, which also means malformed input is only
//! discovered *after* funds have moved. That is the known weakness of this
//! variant; the relayed strategy exists to close it.
//!
//! Dropping the future between signing and confirmation cannot retract a
//! broadcast transaction.

use async_trait::async_trait;
use serde_json::Value;

use crate::directory::AgentDescriptor;
use crate::error::Error;
use crate::invoke::{
    fail, CallResult, InvokeError, Phase, SettlementContext, SettlementStrategy,
};
use crate::ledger::rpc::ConfirmationStatus;
use crate::payments::builder::{build_payment, PaymentRequest};
use crate::payments::types::TokenKind;

/// Variant that talks to the ledger network directly.
#[derive(Debug, Default)]
pub struct DirectSettlement;

#[async_trait]
impl SettlementStrategy for DirectSettlement {
    async fn settle(
        &self,
        ctx: &SettlementContext,
        agent: &AgentDescriptor,
        input: &Value,
        token: TokenKind,
    ) -> std::result::Result<CallResult, InvokeError> {
        // BUILDING: resolve addresses and a fresh checkpoint, then construct
        // the two-way transfer. A new blockhash per call keeps every
        // invocation's payload single-use.
        let service_wallet = agent
            .owner_wallet
            .parse()
            .map_err(fail(Phase::Building))?;

        let usd_per_sol = match token {
            TokenKind::Sol => Some(
                ctx.marketplace
                    .sol_price()
                    .await
                    .map_err(fail(Phase::Building))?
                    .usd_per_sol,
            ),
            TokenKind::Usdc => None,
        };

        let request = PaymentRequest {
            payer: ctx.keypair.address(),
            service_wallet,
            protocol_wallet: ctx.protocol_wallet,
            price_usd: agent.price_usd,
            token,
            fee_bps: agent.fee_bps,
            usdc_mint: ctx.usdc_mint,
            usd_per_sol,
        };

        let recent_blockhash = ctx
            .ledger
            .latest_blockhash()
            .await
            .map_err(fail(Phase::Building))?;
        let (mut tx, split) =
            build_payment(&request, recent_blockhash).map_err(fail(Phase::Building))?;

        // SIGNING
        tx.sign(&ctx.keypair).map_err(fail(Phase::Signing))?;

        // SUBMITTING
        let signature = ctx
            .ledger
            .send_transaction(&tx.serialize())
            .await
            .map_err(fail(Phase::Submitting))?;
        tracing::debug!(%signature, "payment broadcast");

        // CONFIRMING: a timeout is an unknown outcome, not a failure.
        let status = ctx
            .ledger
            .confirm(&signature)
            .await
            .map_err(fail(Phase::Confirming))?;
        match status {
            ConfirmationStatus::Confirmed { slot } => {
                tracing::debug!(%signature, slot, "payment confirmed");
            }
            ConfirmationStatus::Failed(reason) => {
                // Executed and failed atomically: funds did not move.
                return Err(InvokeError::new(Phase::Confirming, Error::Submission(reason)));
            }
            ConfirmationStatus::Unknown | ConfirmationStatus::NotFound => {
                return Err(InvokeError::new(
                    Phase::Confirming,
                    Error::ConfirmationTimeout { signature },
                ));
            }
        }

        // CALLING_SERVICE: funds have moved; any failure past this point is
        // surfaced distinctly so the caller reconciles instead of retrying.
        let outcome = ctx
            .marketplace
            .call_with_proof(
                &agent.id,
                input,
                &ctx.keypair.address().to_string(),
                &signature,
                token.as_str(),
            )
            .await
            .map_err(|e| {
                let message = e.to_string();
                InvokeError::new(
                    Phase::CallingService,
                    Error::ServiceInvocation {
                        signature: signature.clone(),
                        message,
                    },
                )
            })?;

        tracing::debug!(
            agent_received = split.service_amount,
            protocol_fee = split.protocol_fee,
            "payment split settled"
        );

        Ok(CallResult::from_outcome(outcome, token))
    }
}
