//! The top-level marketplace client.

use std::sync::Arc;

use serde_json::Value;

use crate::config::{ClientConfig, Network, ProtocolVariant};
use crate::directory::{AgentDescriptor, MarketplaceHttp};
use crate::error::Result;
use crate::invoke::direct::DirectSettlement;
use crate::invoke::relayed::RelayedSettlement;
use crate::invoke::{
    CallResult, HttpLedger, InvokeError, SettlementContext, SettlementStrategy,
};
use crate::ledger::rpc::{Commitment, ConfirmationStatus, RpcClient};
use crate::ledger::Address;
use crate::payments::types::{PriceQuote, TokenKind};
use crate::wallet::Keypair;

/// Client for discovering, paying, and invoking marketplace agents.
///
/// The HTTP transport is scoped to the client: one pooled connection set,
/// acquired at construction and released when the client is dropped, even if
/// an `invoke()` fails partway through. Concurrent `invoke()` calls are
/// independent: each gets its own transaction and checkpoint, sharing only
/// the read-only keypair.
///
/// # Cancellation
///
/// Abandoning an in-flight `invoke()` after signing but before confirmation
/// cannot retract a broadcast transaction. If in doubt, reconcile the
/// signature with [`AgoraClient::reconcile`].
pub struct AgoraClient {
    config: ClientConfig,
    rpc: RpcClient,
    marketplace: MarketplaceHttp,
    ctx: SettlementContext,
    strategy: Box<dyn SettlementStrategy>,
}

impl AgoraClient {
    /// Construct a client for the configured network and protocol variant.
    pub fn new(config: ClientConfig, keypair: Keypair) -> Result<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        let protocol_wallet: Address = config.network_config.protocol_wallet.parse()?;
        let usdc_mint: Address = config.network_config.usdc_mint.parse()?;

        let marketplace = MarketplaceHttp::new(http.clone(), config.api_url.clone());
        let rpc = RpcClient::new(http, &config.network_config.rpc_url, config.request_timeout);
        let ledger = HttpLedger {
            rpc: rpc.clone(),
            commitment: Commitment::Confirmed,
            confirm_timeout: config.confirm_timeout,
        };

        let strategy: Box<dyn SettlementStrategy> = match config.variant {
            ProtocolVariant::SelfAuthorized => Box::new(DirectSettlement),
            ProtocolVariant::FailFast => Box::new(RelayedSettlement),
        };

        let ctx = SettlementContext {
            marketplace: Arc::new(marketplace.clone()),
            ledger: Arc::new(ledger),
            keypair,
            protocol_wallet,
            usdc_mint,
        };

        tracing::info!(
            api_url = %config.api_url,
            network = %config.network,
            variant = ?config.variant,
            wallet = %ctx.keypair.address(),
            "client initialized"
        );

        Ok(Self {
            config,
            rpc,
            marketplace,
            ctx,
            strategy,
        })
    }

    /// The wallet address paying for calls.
    pub fn address(&self) -> Address {
        self.ctx.keypair.address()
    }

    pub fn network(&self) -> Network {
        self.config.network
    }

    pub fn variant(&self) -> ProtocolVariant {
        self.config.variant
    }

    /// All active agents. Fresh fetch every time.
    pub async fn list_agents(&self) -> Result<Vec<AgentDescriptor>> {
        self.marketplace.list_agents().await
    }

    /// One agent by id.
    pub async fn get_agent(&self, agent_id: &str) -> Result<AgentDescriptor> {
        self.marketplace.get_agent(agent_id).await
    }

    /// Live USD quote for the native token.
    pub async fn sol_price(&self) -> Result<PriceQuote> {
        self.marketplace.sol_price().await
    }

    /// Call an agent, settling payment per the configured variant.
    ///
    /// No automatic retries: on failure, inspect
    /// [`InvokeError::retry_safety`]; blind retries after payment risk
    /// paying twice.
    pub async fn invoke(
        &self,
        agent_id: &str,
        input: Value,
        token: TokenKind,
    ) -> std::result::Result<CallResult, InvokeError> {
        crate::invoke::invoke(&self.ctx, self.strategy.as_ref(), agent_id, &input, token).await
    }

    /// Look up a signature after an unknown outcome (confirmation timeout),
    /// before deciding whether to retry.
    pub async fn reconcile(&self, signature: &str) -> Result<ConfirmationStatus> {
        self.rpc.signature_status(signature).await
    }
}

impl std::fmt::Debug for AgoraClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgoraClient")
            .field("api_url", &self.config.api_url)
            .field("network", &self.config.network)
            .field("variant", &self.config.variant)
            .field("wallet", &self.ctx.keypair.address().to_string())
            .finish()
    }
}
