//! Shared fakes and mock backends for the integration tests. Not every test
//! binary uses every helper.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use agora_client::directory::{AgentDescriptor, BuiltTransaction, CallOutcome};
use agora_client::error::{Error, Result};
use agora_client::invoke::{LedgerRpc, MarketplaceApi};
use agora_client::ledger::transaction::{Blockhash, Transaction};
use agora_client::ledger::{Address, ConfirmationStatus};
use agora_client::payments::builder::{build_payment, PaymentRequest};
use agora_client::payments::types::{PriceQuote, TokenKind};
use agora_client::wallet::Keypair;

pub const DEVNET_USDC: &str = "EGzSiubUqhzWFR2KxWCx6jHD6XNsVhKrnebjcQdN6qK4";
pub const DEVNET_PROTOCOL: &str = "BubFsAG8cSEH7NkLpZijctRpsZkCiaWqCdRfh8kUpXEt";

/// Start a mock JSON-RPC endpoint that answers every request with `body`.
/// Returns the base URL.
pub async fn start_mock_rpc(body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;
                        let response = format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    format!("http://{}", addr)
}

pub fn test_keypair(seed: u8) -> Keypair {
    let signing = ed25519_dalek::SigningKey::from_bytes(&[seed; 32]);
    let mut bytes = signing.to_bytes().to_vec();
    bytes.extend_from_slice(signing.verifying_key().as_bytes());
    Keypair::from_bytes(&bytes).unwrap()
}

pub fn test_agent() -> AgentDescriptor {
    AgentDescriptor {
        id: "agent-1".to_string(),
        name: "TitleGenerator".to_string(),
        description: Some("Generates titles".to_string()),
        owner_wallet: DEVNET_PROTOCOL.to_string(),
        price_usd: 1.0,
        fee_bps: 1000,
        accepted_tokens: vec!["USDC".to_string(), "SOL".to_string()],
        primary_display_token: Some("USDC".to_string()),
        input_schema: Some(json!({ "required": ["text"] })),
    }
}

/// Marketplace fake: counts calls, optionally rejects input pre-payment,
/// optionally fails the post-payment service call.
#[derive(Default)]
pub struct FakeMarketplace {
    pub agent: Option<AgentDescriptor>,
    pub reject_input: bool,
    pub fail_service_call: bool,
    pub build_calls: AtomicUsize,
    pub relay_calls: AtomicUsize,
    pub proof_calls: AtomicUsize,
    intent_counter: AtomicUsize,
}

impl FakeMarketplace {
    pub fn with_agent(agent: AgentDescriptor) -> Self {
        Self {
            agent: Some(agent),
            ..Self::default()
        }
    }

    fn outcome(tx_signature: String) -> CallOutcome {
        CallOutcome {
            output: json!({ "title": "A Great Title" }),
            tx_signature,
            receipt_id: "receipt-1".to_string(),
            explorer_url: "https://explorer.example/tx".to_string(),
            agent_received: 900_000,
            protocol_fee: 100_000,
        }
    }
}

#[async_trait]
impl MarketplaceApi for FakeMarketplace {
    async fn get_agent(&self, agent_id: &str) -> Result<AgentDescriptor> {
        match &self.agent {
            Some(agent) if agent.id == agent_id => Ok(agent.clone()),
            _ => Err(Error::ServiceNotFound(agent_id.to_string())),
        }
    }

    async fn sol_price(&self) -> Result<PriceQuote> {
        Ok(PriceQuote { usd_per_sol: 100.0 })
    }

    async fn call_with_proof(
        &self,
        _agent_id: &str,
        _input: &Value,
        _caller_wallet: &str,
        tx_signature: &str,
        _selected_token: &str,
    ) -> Result<CallOutcome> {
        self.proof_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_service_call {
            return Err(Error::Api("agent execution crashed".to_string()));
        }
        Ok(Self::outcome(tx_signature.to_string()))
    }

    async fn build_transaction(
        &self,
        _agent_id: &str,
        payer_wallet: &str,
        selected_token: &str,
        input: &Value,
    ) -> Result<BuiltTransaction> {
        self.build_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_input || input.get("text").is_none() {
            return Err(Error::InputValidation(
                "input does not match agent schema".to_string(),
            ));
        }

        // Build a real unsigned payload the client can sign in place.
        let intent = self.intent_counter.fetch_add(1, Ordering::SeqCst);
        let agent = self.agent.as_ref().expect("agent configured");
        let request = PaymentRequest {
            payer: payer_wallet.parse()?,
            service_wallet: agent.owner_wallet.parse()?,
            protocol_wallet: DEVNET_PROTOCOL.parse()?,
            price_usd: agent.price_usd,
            token: TokenKind::parse(selected_token)?,
            fee_bps: agent.fee_bps,
            usdc_mint: DEVNET_USDC.parse()?,
            usd_per_sol: Some(100.0),
        };
        let mut checkpoint = [0u8; 32];
        checkpoint[0] = intent as u8 + 1;
        let (tx, split) = build_payment(&request, Blockhash(checkpoint))?;

        use base64::Engine as _;
        Ok(BuiltTransaction {
            payment_intent_id: format!("intent-{}", intent),
            transaction: base64::engine::general_purpose::STANDARD.encode(tx.serialize()),
            amount_base: split.total,
            token: Some(selected_token.to_string()),
        })
    }

    async fn relay_signed(
        &self,
        _payment_intent_id: &str,
        signed_transaction_b64: &str,
    ) -> Result<CallOutcome> {
        self.relay_calls.fetch_add(1, Ordering::SeqCst);

        use base64::Engine as _;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(signed_transaction_b64)
            .map_err(|e| Error::Api(e.to_string()))?;
        // First signature slot must be filled: the relay refuses unsigned
        // payloads.
        let signature = &bytes[1..65];
        if signature.iter().all(|&b| b == 0) {
            return Err(Error::Api("transaction is not signed".to_string()));
        }
        Ok(Self::outcome(bs58::encode(signature).into_string()))
    }
}

/// What the fake ledger should do at each step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LedgerMode {
    #[default]
    Confirm,
    ConfirmTimeout,
    RejectSubmission,
    StaleCheckpoint,
}

/// Ledger fake: hands out distinct checkpoints and records every submission.
#[derive(Default)]
pub struct FakeLedger {
    pub mode: LedgerMode,
    pub submissions: Mutex<Vec<String>>,
    blockhash_counter: AtomicUsize,
}

impl FakeLedger {
    pub fn with_mode(mode: LedgerMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }
}

#[async_trait]
impl LedgerRpc for FakeLedger {
    async fn latest_blockhash(&self) -> Result<Blockhash> {
        let n = self.blockhash_counter.fetch_add(1, Ordering::SeqCst);
        let mut hash = [0u8; 32];
        hash[0] = n as u8 + 1;
        Ok(Blockhash(hash))
    }

    async fn send_transaction(&self, tx_bytes: &[u8]) -> Result<String> {
        match self.mode {
            LedgerMode::RejectSubmission => {
                return Err(Error::Submission("insufficient funds".to_string()))
            }
            LedgerMode::StaleCheckpoint => return Err(Error::StaleCheckpoint),
            _ => {}
        }
        // Signature identifies the transaction on the ledger.
        let signature = bs58::encode(&tx_bytes[1..65]).into_string();
        self.submissions.lock().unwrap().push(signature.clone());
        Ok(signature)
    }

    async fn confirm(&self, _signature: &str) -> Result<ConfirmationStatus> {
        match self.mode {
            LedgerMode::ConfirmTimeout => Ok(ConfirmationStatus::Unknown),
            _ => Ok(ConfirmationStatus::Confirmed { slot: 42 }),
        }
    }
}

/// Convenience: a signed-transaction shaped like the direct strategy built
/// it, for fixture assertions.
pub fn signed_fixture(keypair: &Keypair, service_wallet: &Address) -> Transaction {
    let request = PaymentRequest {
        payer: keypair.address(),
        service_wallet: *service_wallet,
        protocol_wallet: DEVNET_PROTOCOL.parse().unwrap(),
        price_usd: 1.0,
        token: TokenKind::Usdc,
        fee_bps: 1000,
        usdc_mint: DEVNET_USDC.parse().unwrap(),
        usd_per_sol: None,
    };
    let (mut tx, _) = build_payment(&request, Blockhash([5u8; 32])).unwrap();
    tx.sign(keypair).unwrap();
    tx
}
