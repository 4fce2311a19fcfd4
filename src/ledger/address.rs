//! Ledger addresses and deterministic address derivation.
//!
//! An [`Address`] is the 32-byte account key used everywhere on the ledger,
//! rendered as base58 text. Token balances do not live on the wallet itself:
//! each (owner, mint) pair maps to a deterministic associated token account,
//! derived off-line with no network call.

use ed25519_dalek::VerifyingKey;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// SPL token program.
pub const TOKEN_PROGRAM_ID: Address = Address([
    6, 221, 246, 225, 215, 101, 161, 147, 217, 203, 225, 70, 206, 235, 121, 172, 28, 180, 133,
    237, 95, 91, 55, 145, 58, 140, 245, 133, 126, 255, 0, 169,
]);

/// Associated token account program.
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Address = Address([
    140, 151, 37, 143, 78, 36, 137, 241, 187, 61, 16, 41, 20, 142, 13, 131, 11, 90, 19, 153, 218,
    255, 16, 132, 4, 142, 123, 216, 219, 233, 248, 89,
]);

/// System program (native transfers).
pub const SYSTEM_PROGRAM_ID: Address = Address([0u8; 32]);

/// Domain separator appended when hashing program-derived address candidates.
const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

/// A 32-byte ledger account key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address(pub [u8; 32]);

impl Address {
    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parse from base58 text.
    pub fn from_base58(s: &str) -> Result<Self> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| Error::Address(format!("'{}': {}", s, e)))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| Error::Address(format!("'{}': {} bytes, expected 32", s, v.len())))?;
        Ok(Self(arr))
    }

    /// Whether these bytes decompress to a point on the ed25519 curve.
    ///
    /// Program-derived addresses must be off-curve so no private key can
    /// ever sign for them.
    fn is_on_curve(bytes: &[u8; 32]) -> bool {
        VerifyingKey::from_bytes(bytes).is_ok()
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", bs58::encode(&self.0).into_string())
    }
}

impl std::fmt::Debug for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl std::str::FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_base58(s)
    }
}

/// Derive a program-owned address from seeds.
///
/// Pure function: hashes the seeds with a bump byte (highest first) and the
/// owning program id, taking the first candidate that lands off the ed25519
/// curve. Returns the address and the bump that produced it.
pub fn find_program_address(seeds: &[&[u8]], program_id: &Address) -> Result<(Address, u8)> {
    for bump in (0..=255u8).rev() {
        let mut hasher = Sha256::new();
        for seed in seeds {
            hasher.update(seed);
        }
        hasher.update([bump]);
        hasher.update(program_id.as_bytes());
        hasher.update(PDA_MARKER);
        let candidate: [u8; 32] = hasher.finalize().into();
        if !Address::is_on_curve(&candidate) {
            return Ok((Address(candidate), bump));
        }
    }
    Err(Error::Address(
        "no off-curve bump found for seeds".to_string(),
    ))
}

/// The associated token account holding `mint` balances for `owner`.
///
/// Deterministic and idempotent: same (owner, mint) always yields the same
/// address, with no network round trip.
pub fn associated_token_address(owner: &Address, mint: &Address) -> Result<Address> {
    let seeds: [&[u8]; 3] = [
        owner.as_bytes(),
        TOKEN_PROGRAM_ID.as_bytes(),
        mint.as_bytes(),
    ];
    Ok(find_program_address(&seeds, &ASSOCIATED_TOKEN_PROGRAM_ID)?.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAINNET_USDC: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
    const MAINNET_PROTOCOL: &str = "CYSnefexbvrRU6VxzGfvZqKYM4UixupvDeZg3sUSWm84";

    #[test]
    fn test_base58_round_trip() {
        let addr: Address = MAINNET_USDC.parse().unwrap();
        assert_eq!(addr.to_string(), MAINNET_USDC);
    }

    #[test]
    fn test_program_id_constants_render() {
        assert_eq!(
            TOKEN_PROGRAM_ID.to_string(),
            "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA"
        );
        assert_eq!(
            ASSOCIATED_TOKEN_PROGRAM_ID.to_string(),
            "ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL"
        );
        assert_eq!(
            SYSTEM_PROGRAM_ID.to_string(),
            "11111111111111111111111111111111"
        );
    }

    #[test]
    fn test_rejects_wrong_length_and_alphabet() {
        assert!("abc".parse::<Address>().is_err());
        // 'l' and '0' are not in the base58 alphabet
        assert!("l0l0l0l0l0l0l0l0l0l0l0l0l0l0l0l0".parse::<Address>().is_err());
    }

    #[test]
    fn test_associated_token_address_reference_vectors() {
        let usdc: Address = MAINNET_USDC.parse().unwrap();
        let protocol: Address = MAINNET_PROTOCOL.parse().unwrap();
        let ata = associated_token_address(&protocol, &usdc).unwrap();
        assert_eq!(ata.to_string(), "7dh1gsnnjokpMBcw3PEEmyFK3ZkZv5EPntPfxGSLiyuP");

        let devnet_usdc: Address = "EGzSiubUqhzWFR2KxWCx6jHD6XNsVhKrnebjcQdN6qK4".parse().unwrap();
        let devnet_protocol: Address =
            "BubFsAG8cSEH7NkLpZijctRpsZkCiaWqCdRfh8kUpXEt".parse().unwrap();
        let ata = associated_token_address(&devnet_protocol, &devnet_usdc).unwrap();
        assert_eq!(ata.to_string(), "CZuqPrV6yQdCPfD7fBZjqmt6a6pFv3FciFGMNNDmJhsQ");
    }

    #[test]
    fn test_derivation_is_deterministic_and_injective() {
        let usdc: Address = MAINNET_USDC.parse().unwrap();
        let a: Address = MAINNET_PROTOCOL.parse().unwrap();
        let b: Address = "BubFsAG8cSEH7NkLpZijctRpsZkCiaWqCdRfh8kUpXEt".parse().unwrap();

        let ata_a1 = associated_token_address(&a, &usdc).unwrap();
        let ata_a2 = associated_token_address(&a, &usdc).unwrap();
        assert_eq!(ata_a1, ata_a2);

        let ata_b = associated_token_address(&b, &usdc).unwrap();
        assert_ne!(ata_a1, ata_b);
    }

    #[test]
    fn test_derived_addresses_are_off_curve() {
        let usdc: Address = MAINNET_USDC.parse().unwrap();
        let owner: Address = MAINNET_PROTOCOL.parse().unwrap();
        let ata = associated_token_address(&owner, &usdc).unwrap();
        assert!(!Address::is_on_curve(ata.as_bytes()));
    }
}
