//! The authorize-then-settle orchestration behind `invoke()`.
//!
//! Two settlement protocols share one contract (see [`SettlementStrategy`]):
//!
//! - [`direct::DirectSettlement`]: the client builds, signs, submits, and
//!   confirms the payment itself, then calls the service with the settled
//!   signature as proof.
//! - [`relayed::RelayedSettlement`]: the platform builds the transaction
//!   after validating the input, the client signs, and a relay submits.
//!
//! Every failure carries the [`Phase`] it happened in, because the phase
//! decides whether retrying is free, needs a fresh transaction, or needs
//! reconciliation first.

pub mod direct;
pub mod relayed;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::directory::{AgentDescriptor, BuiltTransaction, CallOutcome, MarketplaceHttp};
use crate::error::{Error, Result};
use crate::ledger::rpc::{Commitment, ConfirmationStatus, RpcClient};
use crate::ledger::transaction::Blockhash;
use crate::ledger::Address;
use crate::payments::types::{PriceQuote, TokenKind};
use crate::wallet::Keypair;

/// Where an invocation is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Init,
    Describing,
    Building,
    Signing,
    Submitting,
    Confirming,
    CallingService,
    Done,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Phase::Init => "init",
            Phase::Describing => "describing",
            Phase::Building => "building",
            Phase::Signing => "signing",
            Phase::Submitting => "submitting",
            Phase::Confirming => "confirming",
            Phase::CallingService => "calling_service",
            Phase::Done => "done",
        };
        f.write_str(label)
    }
}

/// What a caller may safely do after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrySafety {
    /// No funds moved. Retry freely (after fixing the cause).
    Safe,
    /// Funds may have moved. Retry only with a freshly built transaction;
    /// never resubmit the same signed payload.
    FreshIntentOnly,
    /// Funds moved, or the outcome is unknown. Look up the signature or
    /// receipt before doing anything else.
    ReconcileFirst,
}

/// An invocation failure tagged with the phase it happened in.
#[derive(Debug, thiserror::Error)]
#[error("invoke failed while {phase}: {source}")]
pub struct InvokeError {
    pub phase: Phase,
    #[source]
    pub source: Error,
}

impl InvokeError {
    pub fn new(phase: Phase, source: Error) -> Self {
        Self { phase, source }
    }

    /// Retry guidance per the phase table, with error-specific overrides.
    pub fn retry_safety(&self) -> RetrySafety {
        match &self.source {
            // Pre-payment rejection by definition.
            Error::InputValidation(_) => RetrySafety::Safe,
            // Expired checkpoint or outright rejection: rebuild, resubmit.
            Error::StaleCheckpoint | Error::Submission(_) => RetrySafety::FreshIntentOnly,
            Error::ConfirmationTimeout { .. } | Error::ServiceInvocation { .. } => {
                RetrySafety::ReconcileFirst
            }
            _ => match self.phase {
                Phase::Init | Phase::Describing | Phase::Building => RetrySafety::Safe,
                Phase::Signing | Phase::Submitting => RetrySafety::FreshIntentOnly,
                Phase::Confirming | Phase::CallingService | Phase::Done => {
                    RetrySafety::ReconcileFirst
                }
            },
        }
    }
}

/// Tag an error with its phase.
pub(crate) fn fail(phase: Phase) -> impl FnOnce(Error) -> InvokeError {
    move |source| InvokeError::new(phase, source)
}

/// Result of a successful paid invocation. Immutable; one per call.
#[derive(Debug, Clone)]
pub struct CallResult {
    /// The service's output payload.
    pub output: Value,
    /// Settled ledger transaction signature.
    pub tx_signature: String,
    /// Platform receipt correlating payment to invocation.
    pub receipt_id: String,
    pub explorer_url: String,
    /// Base units received by the agent owner.
    pub agent_received: u64,
    /// Base units taken as protocol fee.
    pub protocol_fee: u64,
    pub token: TokenKind,
}

impl CallResult {
    pub(crate) fn from_outcome(outcome: CallOutcome, token: TokenKind) -> Self {
        Self {
            output: outcome.output,
            tx_signature: outcome.tx_signature,
            receipt_id: outcome.receipt_id,
            explorer_url: outcome.explorer_url,
            agent_received: outcome.agent_received,
            protocol_fee: outcome.protocol_fee,
            token,
        }
    }
}

/// Marketplace API surface the orchestrator needs. Object-safe so tests can
/// substitute counting fakes.
#[async_trait]
pub trait MarketplaceApi: Send + Sync {
    async fn get_agent(&self, agent_id: &str) -> Result<AgentDescriptor>;
    async fn sol_price(&self) -> Result<PriceQuote>;
    async fn call_with_proof(
        &self,
        agent_id: &str,
        input: &Value,
        caller_wallet: &str,
        tx_signature: &str,
        selected_token: &str,
    ) -> Result<CallOutcome>;
    async fn build_transaction(
        &self,
        agent_id: &str,
        payer_wallet: &str,
        selected_token: &str,
        input: &Value,
    ) -> Result<BuiltTransaction>;
    async fn relay_signed(
        &self,
        payment_intent_id: &str,
        signed_transaction_b64: &str,
    ) -> Result<CallOutcome>;
}

#[async_trait]
impl MarketplaceApi for MarketplaceHttp {
    async fn get_agent(&self, agent_id: &str) -> Result<AgentDescriptor> {
        MarketplaceHttp::get_agent(self, agent_id).await
    }

    async fn sol_price(&self) -> Result<PriceQuote> {
        MarketplaceHttp::sol_price(self).await
    }

    async fn call_with_proof(
        &self,
        agent_id: &str,
        input: &Value,
        caller_wallet: &str,
        tx_signature: &str,
        selected_token: &str,
    ) -> Result<CallOutcome> {
        MarketplaceHttp::call_with_proof(self, agent_id, input, caller_wallet, tx_signature, selected_token)
            .await
    }

    async fn build_transaction(
        &self,
        agent_id: &str,
        payer_wallet: &str,
        selected_token: &str,
        input: &Value,
    ) -> Result<BuiltTransaction> {
        MarketplaceHttp::build_transaction(self, agent_id, payer_wallet, selected_token, input).await
    }

    async fn relay_signed(
        &self,
        payment_intent_id: &str,
        signed_transaction_b64: &str,
    ) -> Result<CallOutcome> {
        MarketplaceHttp::relay_signed(self, payment_intent_id, signed_transaction_b64).await
    }
}

/// Ledger surface the self-authorized strategy needs.
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    async fn latest_blockhash(&self) -> Result<Blockhash>;
    async fn send_transaction(&self, tx_bytes: &[u8]) -> Result<String>;
    async fn confirm(&self, signature: &str) -> Result<ConfirmationStatus>;
}

/// [`RpcClient`] adapter carrying the commitment level and polling bound.
#[derive(Debug, Clone)]
pub struct HttpLedger {
    pub rpc: RpcClient,
    pub commitment: Commitment,
    pub confirm_timeout: std::time::Duration,
}

#[async_trait]
impl LedgerRpc for HttpLedger {
    async fn latest_blockhash(&self) -> Result<Blockhash> {
        self.rpc.latest_blockhash(self.commitment).await
    }

    async fn send_transaction(&self, tx_bytes: &[u8]) -> Result<String> {
        self.rpc.send_transaction(tx_bytes).await
    }

    async fn confirm(&self, signature: &str) -> Result<ConfirmationStatus> {
        self.rpc
            .confirm(signature, self.commitment, self.confirm_timeout)
            .await
    }
}

/// Shared dependencies for either settlement strategy.
pub struct SettlementContext {
    pub marketplace: Arc<dyn MarketplaceApi>,
    pub ledger: Arc<dyn LedgerRpc>,
    pub keypair: Keypair,
    pub protocol_wallet: Address,
    pub usdc_mint: Address,
}

/// One settlement protocol behind the shared `invoke()` contract.
#[async_trait]
pub trait SettlementStrategy: Send + Sync {
    async fn settle(
        &self,
        ctx: &SettlementContext,
        agent: &AgentDescriptor,
        input: &Value,
        token: TokenKind,
    ) -> std::result::Result<CallResult, InvokeError>;
}

/// Fetch the descriptor and run the configured strategy.
///
/// The descriptor is fetched fresh per call; failures here are always
/// pre-payment.
pub async fn invoke(
    ctx: &SettlementContext,
    strategy: &dyn SettlementStrategy,
    agent_id: &str,
    input: &Value,
    token: TokenKind,
) -> std::result::Result<CallResult, InvokeError> {
    let agent = ctx
        .marketplace
        .get_agent(agent_id)
        .await
        .map_err(fail(Phase::Describing))?;

    tracing::info!(
        agent = %agent.name,
        price_usd = agent.price_usd,
        fee_bps = agent.fee_bps,
        token = %token,
        "invoking agent"
    );

    let result = strategy.settle(ctx, &agent, input, token).await?;

    tracing::info!(
        tx_signature = %result.tx_signature,
        receipt_id = %result.receipt_id,
        "agent call settled"
    );

    Ok(result)
}
