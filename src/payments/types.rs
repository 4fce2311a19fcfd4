//! Payment amounts, tokens, and the fee split.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Basis-points denominator.
const BPS_DENOMINATOR: u128 = 10_000;

/// Tokens the marketplace settles in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    /// Stable token, 6 decimals, 1 USD = 1 unit.
    #[serde(rename = "USDC")]
    Usdc,
    /// Native token, 9 decimals, converted through an injected USD rate.
    #[serde(rename = "SOL")]
    Sol,
}

impl TokenKind {
    /// Decimal exponent of the smallest unit.
    pub fn decimals(&self) -> u8 {
        match self {
            TokenKind::Usdc => 6,
            TokenKind::Sol => 9,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Usdc => "USDC",
            TokenKind::Sol => "SOL",
        }
    }

    /// Parse a token label; anything outside the closed set is unsupported.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "USDC" => Ok(TokenKind::Usdc),
            "SOL" => Ok(TokenKind::Sol),
            other => Err(Error::UnsupportedToken(other.to_string())),
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A platform price quote for the native token.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    /// USD per whole native token.
    pub usd_per_sol: f64,
}

/// Deterministic split of a payment between service and protocol.
///
/// Invariant: `service_amount + protocol_fee == total`, exactly, for every
/// total and every fee in [0, 10000] bps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSplit {
    pub total: u64,
    pub service_amount: u64,
    pub protocol_fee: u64,
}

impl FeeSplit {
    /// Split `total` base units at `fee_bps` basis points.
    ///
    /// The protocol fee floors; the service amount absorbs the remainder so
    /// the parts always sum back to the total.
    pub fn compute(total: u64, fee_bps: u32) -> Result<Self> {
        if fee_bps > BPS_DENOMINATOR as u32 {
            return Err(Error::InvalidFeeBps(fee_bps));
        }
        let protocol_fee = (total as u128 * fee_bps as u128 / BPS_DENOMINATOR) as u64;
        Ok(Self {
            total,
            service_amount: total - protocol_fee,
            protocol_fee,
        })
    }
}

/// Convert a USD price to base units of `token`.
///
/// The native token needs `usd_per_sol` from a live price source; there is
/// deliberately no built-in rate.
pub fn usd_to_base_units(price_usd: f64, token: TokenKind, usd_per_sol: Option<f64>) -> Result<u64> {
    if !price_usd.is_finite() || price_usd < 0.0 {
        return Err(Error::InvalidAmount(format!("price {} USD", price_usd)));
    }
    match token {
        TokenKind::Usdc => Ok((price_usd * 1_000_000.0).round() as u64),
        TokenKind::Sol => {
            let rate = usd_per_sol.ok_or_else(|| {
                Error::InvalidAmount("SOL settlement requires a USD exchange rate".to_string())
            })?;
            if !rate.is_finite() || rate <= 0.0 {
                return Err(Error::InvalidAmount(format!("exchange rate {} USD/SOL", rate)));
            }
            Ok((price_usd / rate * 1_000_000_000.0).round() as u64)
        }
    }
}
