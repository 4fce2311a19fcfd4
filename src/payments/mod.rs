//! Payment construction: tokens, fee splitting, and transaction building.

pub mod builder;
pub mod types;

pub use builder::{build_payment, PaymentRequest};
pub use types::{usd_to_base_units, FeeSplit, PriceQuote, TokenKind};
