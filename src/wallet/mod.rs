//! Wallet keypair loading and signing.
//!
//! # Security
//! - Secret material is loaded from a file or an environment variable and
//!   held in memory for the process lifetime; the library never persists it.
//! - Keys are never logged or serialized.
//!
//! The on-disk format is the conventional 64-byte JSON integer array
//! (32-byte seed followed by the 32-byte public key).

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;

use crate::error::{Error, Result};
use crate::ledger::address::Address;

/// Default environment variable holding the secret key array.
pub const SECRET_KEY_ENV_VAR: &str = "AGORA_SECRET_KEY";

/// Expected secret key length: seed plus embedded public key.
const SECRET_KEY_LEN: usize = 64;

/// An ed25519 signing keypair.
///
/// Signing is stateless (`&self`) and safe to share across concurrent
/// invocations.
#[derive(Clone)]
pub struct Keypair {
    signing: SigningKey,
}

impl Keypair {
    /// Build from a 64-byte secret key array.
    ///
    /// Fails if the length is wrong or the embedded public key does not
    /// match the one derived from the seed.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SECRET_KEY_LEN {
            return Err(Error::KeyLoad(format!(
                "secret key is {} bytes, expected {}",
                bytes.len(),
                SECRET_KEY_LEN
            )));
        }
        let seed: [u8; 32] = bytes[..32]
            .try_into()
            .map_err(|_| Error::KeyLoad("unreachable seed slice".to_string()))?;
        let signing = SigningKey::from_bytes(&seed);
        let derived = signing.verifying_key();
        if derived.as_bytes() != &bytes[32..] {
            return Err(Error::KeyLoad(
                "embedded public key does not match the seed".to_string(),
            ));
        }
        Ok(Self { signing })
    }

    /// Load from a file containing a JSON integer array.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::KeyLoad(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json_array(&raw)
    }

    /// Load from an environment variable containing a JSON integer array.
    pub fn from_env(var: &str) -> Result<Self> {
        let raw = std::env::var(var)
            .map_err(|_| Error::KeyLoad(format!("environment variable {} not set", var)))?;
        Self::from_json_array(&raw)
    }

    /// Generate a fresh random keypair.
    ///
    /// The resulting address holds no funds; it cannot pay for anything
    /// until topped up out of band.
    pub fn generate() -> Self {
        let signing = SigningKey::generate(&mut OsRng);
        let keypair = Self { signing };
        tracing::warn!(
            address = %keypair.address(),
            "generated a new keypair; the address is unfunded"
        );
        keypair
    }

    fn from_json_array(raw: &str) -> Result<Self> {
        let bytes: Vec<u8> = serde_json::from_str(raw)
            .map_err(|e| Error::KeyLoad(format!("not a JSON byte array: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    /// Public address of this keypair.
    pub fn address(&self) -> Address {
        Address(self.signing.verifying_key().to_bytes())
    }

    /// Sign arbitrary message bytes, returning the 64-byte signature.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing.sign(message).to_bytes()
    }

    /// Verifying half, for signature checks.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Secret material stays out of Debug output.
        f.debug_struct("Keypair")
            .field("address", &self.address().to_string())
            .finish()
    }
}
