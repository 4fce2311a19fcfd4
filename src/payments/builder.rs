//! Builds the unsigned payment transaction for the self-authorized flow.
//!
//! Every payment is two transfers in one atomic transaction: the service's
//! share to the agent owner and the protocol fee to the platform wallet.
//! Stable-token payments move between associated token accounts; native
//! payments move between the wallets themselves.

use crate::error::Result;
use crate::ledger::address::{associated_token_address, Address, SYSTEM_PROGRAM_ID, TOKEN_PROGRAM_ID};
use crate::ledger::transaction::{AccountMeta, Blockhash, Instruction, Message, Transaction};
use crate::payments::types::{usd_to_base_units, FeeSplit, TokenKind};

/// SPL token TransferChecked instruction tag.
const TRANSFER_CHECKED_TAG: u8 = 12;

/// System program transfer instruction index.
const SYSTEM_TRANSFER_INDEX: u32 = 2;

/// Everything needed to build one payment.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub payer: Address,
    pub service_wallet: Address,
    pub protocol_wallet: Address,
    pub price_usd: f64,
    pub token: TokenKind,
    pub fee_bps: u32,
    /// Stable-token mint for the target network.
    pub usdc_mint: Address,
    /// Live USD rate for native settlement; unused for the stable token.
    pub usd_per_sol: Option<f64>,
}

/// Build the unsigned transaction and its fee split.
///
/// Pure except for the caller-supplied blockhash: no network access, fully
/// deterministic for a given request and checkpoint.
pub fn build_payment(
    request: &PaymentRequest,
    recent_blockhash: Blockhash,
) -> Result<(Transaction, FeeSplit)> {
    let total = usd_to_base_units(request.price_usd, request.token, request.usd_per_sol)?;
    let split = FeeSplit::compute(total, request.fee_bps)?;

    let instructions = match request.token {
        TokenKind::Usdc => {
            let payer_ata = associated_token_address(&request.payer, &request.usdc_mint)?;
            let service_ata = associated_token_address(&request.service_wallet, &request.usdc_mint)?;
            let protocol_ata =
                associated_token_address(&request.protocol_wallet, &request.usdc_mint)?;
            vec![
                transfer_checked(
                    &payer_ata,
                    &request.usdc_mint,
                    &service_ata,
                    &request.payer,
                    split.service_amount,
                    request.token.decimals(),
                ),
                transfer_checked(
                    &payer_ata,
                    &request.usdc_mint,
                    &protocol_ata,
                    &request.payer,
                    split.protocol_fee,
                    request.token.decimals(),
                ),
            ]
        }
        TokenKind::Sol => vec![
            system_transfer(&request.payer, &request.service_wallet, split.service_amount),
            system_transfer(&request.payer, &request.protocol_wallet, split.protocol_fee),
        ],
    };

    tracing::debug!(
        token = %request.token,
        total,
        service_amount = split.service_amount,
        protocol_fee = split.protocol_fee,
        "payment transaction built"
    );

    let message = Message::compile(&request.payer, &instructions, recent_blockhash);
    Ok((Transaction::new_unsigned(message), split))
}

/// SPL TransferChecked between token accounts, authorized by `owner`.
fn transfer_checked(
    source: &Address,
    mint: &Address,
    destination: &Address,
    owner: &Address,
    amount: u64,
    decimals: u8,
) -> Instruction {
    let mut data = Vec::with_capacity(10);
    data.push(TRANSFER_CHECKED_TAG);
    data.extend_from_slice(&amount.to_le_bytes());
    data.push(decimals);

    Instruction {
        program_id: TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(*source, false),
            AccountMeta::readonly(*mint, false),
            AccountMeta::writable(*destination, false),
            AccountMeta::readonly(*owner, true),
        ],
        data,
    }
}

/// Native transfer between wallets.
fn system_transfer(from: &Address, to: &Address, lamports: u64) -> Instruction {
    let mut data = Vec::with_capacity(12);
    data.extend_from_slice(&SYSTEM_TRANSFER_INDEX.to_le_bytes());
    data.extend_from_slice(&lamports.to_le_bytes());

    Instruction {
        program_id: SYSTEM_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(*from, true),
            AccountMeta::writable(*to, false),
        ],
        data,
    }
}
