//! Legacy transaction wire format: message compilation, serialization, and
//! signing.
//!
//! A transaction is a shortvec of 64-byte signatures followed by the message
//! bytes. The message carries a three-byte header, the deduplicated account
//! table, a recent blockhash (the freshness checkpoint bounding the replay
//! window), and the compiled instructions. Signatures are ed25519 over the
//! serialized message.

use crate::error::{Error, Result};
use crate::ledger::address::Address;
use crate::wallet::Keypair;

/// A recent ledger checkpoint. Transactions referencing an expired one are
/// rejected at submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blockhash(pub [u8; 32]);

impl Blockhash {
    /// Parse from base58 text (as returned by the RPC).
    pub fn from_base58(s: &str) -> Result<Self> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| Error::Payload(format!("blockhash '{}': {}", s, e)))?;
        let arr: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            Error::Payload(format!("blockhash '{}': {} bytes, expected 32", s, v.len()))
        })?;
        Ok(Self(arr))
    }
}

impl std::fmt::Display for Blockhash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", bs58::encode(&self.0).into_string())
    }
}

/// How an instruction touches an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountMeta {
    pub pubkey: Address,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    /// Writable account.
    pub fn writable(pubkey: Address, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: true,
        }
    }

    /// Read-only account.
    pub fn readonly(pubkey: Address, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: false,
        }
    }
}

/// A single program invocation before compilation.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub program_id: Address,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

/// Message header: signature count and read-only partitioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub num_required_signatures: u8,
    pub num_readonly_signed: u8,
    pub num_readonly_unsigned: u8,
}

/// Instruction with accounts resolved to indices into the account table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub account_indexes: Vec<u8>,
    pub data: Vec<u8>,
}

/// A compiled, unsigned message.
#[derive(Debug, Clone)]
pub struct Message {
    pub header: MessageHeader,
    pub account_keys: Vec<Address>,
    pub recent_blockhash: Blockhash,
    pub instructions: Vec<CompiledInstruction>,
}

impl Message {
    /// Compile instructions into a message with `payer` as the fee payer.
    ///
    /// Accounts are deduplicated with privilege escalation (an account that
    /// is writable or a signer anywhere stays so) and ordered writable
    /// signers, read-only signers, writable non-signers, read-only
    /// non-signers. The payer always occupies slot zero.
    pub fn compile(payer: &Address, instructions: &[Instruction], recent_blockhash: Blockhash) -> Self {
        let mut metas: Vec<AccountMeta> = vec![AccountMeta::writable(*payer, true)];

        for ix in instructions {
            for meta in &ix.accounts {
                match metas.iter_mut().find(|m| m.pubkey == meta.pubkey) {
                    Some(existing) => {
                        existing.is_signer |= meta.is_signer;
                        existing.is_writable |= meta.is_writable;
                    }
                    None => metas.push(meta.clone()),
                }
            }
            if !metas.iter().any(|m| m.pubkey == ix.program_id) {
                metas.push(AccountMeta::readonly(ix.program_id, false));
            }
        }

        // Stable sort keeps the payer first within the writable-signer group.
        metas.sort_by_key(|m| match (m.is_signer, m.is_writable) {
            (true, true) => 0u8,
            (true, false) => 1,
            (false, true) => 2,
            (false, false) => 3,
        });

        let header = MessageHeader {
            num_required_signatures: metas.iter().filter(|m| m.is_signer).count() as u8,
            num_readonly_signed: metas
                .iter()
                .filter(|m| m.is_signer && !m.is_writable)
                .count() as u8,
            num_readonly_unsigned: metas
                .iter()
                .filter(|m| !m.is_signer && !m.is_writable)
                .count() as u8,
        };

        let account_keys: Vec<Address> = metas.iter().map(|m| m.pubkey).collect();
        let index_of = |key: &Address| -> u8 {
            account_keys.iter().position(|k| k == key).unwrap_or(0) as u8
        };

        let compiled = instructions
            .iter()
            .map(|ix| CompiledInstruction {
                program_id_index: index_of(&ix.program_id),
                account_indexes: ix.accounts.iter().map(|m| index_of(&m.pubkey)).collect(),
                data: ix.data.clone(),
            })
            .collect();

        Self {
            header,
            account_keys,
            recent_blockhash,
            instructions: compiled,
        }
    }

    /// Serialize to the wire byte layout (the bytes that get signed).
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128);
        out.push(self.header.num_required_signatures);
        out.push(self.header.num_readonly_signed);
        out.push(self.header.num_readonly_unsigned);

        encode_shortvec_len(&mut out, self.account_keys.len());
        for key in &self.account_keys {
            out.extend_from_slice(key.as_bytes());
        }

        out.extend_from_slice(&self.recent_blockhash.0);

        encode_shortvec_len(&mut out, self.instructions.len());
        for ix in &self.instructions {
            out.push(ix.program_id_index);
            encode_shortvec_len(&mut out, ix.account_indexes.len());
            out.extend_from_slice(&ix.account_indexes);
            encode_shortvec_len(&mut out, ix.data.len());
            out.extend_from_slice(&ix.data);
        }

        out
    }
}

/// A message plus its signature slots.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub signatures: Vec<[u8; 64]>,
    pub message: Message,
}

impl Transaction {
    /// Wrap a message with zeroed signature slots.
    pub fn new_unsigned(message: Message) -> Self {
        let slots = message.header.num_required_signatures as usize;
        Self {
            signatures: vec![[0u8; 64]; slots],
            message,
        }
    }

    /// Sign the message with `keypair`, filling its signature slot.
    ///
    /// Fails if the keypair's address is not among the required signers.
    pub fn sign(&mut self, keypair: &Keypair) -> Result<()> {
        let address = keypair.address();
        let signers = self.message.header.num_required_signatures as usize;
        let slot = self.message.account_keys[..signers.min(self.message.account_keys.len())]
            .iter()
            .position(|k| *k == address)
            .ok_or_else(|| {
                Error::Payload(format!("{} is not a required signer", address))
            })?;
        let message_bytes = self.message.serialize();
        self.signatures[slot] = keypair.sign(&message_bytes);
        Ok(())
    }

    /// First signature, base58: the transaction's identifier on the ledger.
    pub fn signature_base58(&self) -> Option<String> {
        self.signatures
            .first()
            .map(|sig| bs58::encode(sig).into_string())
    }

    /// Serialize signatures plus message to wire bytes.
    pub fn serialize(&self) -> Vec<u8> {
        let message_bytes = self.message.serialize();
        let mut out = Vec::with_capacity(1 + self.signatures.len() * 64 + message_bytes.len());
        encode_shortvec_len(&mut out, self.signatures.len());
        for sig in &self.signatures {
            out.extend_from_slice(sig);
        }
        out.extend_from_slice(&message_bytes);
        out
    }
}

/// Sign a serialized transaction in place without rebuilding it.
///
/// Used for platform-built payloads: the bytes stay opaque except for
/// locating this keypair's signer slot. Returns the re-serialized
/// transaction and the base58 signature.
pub fn sign_wire_transaction(bytes: &[u8], keypair: &Keypair) -> Result<(Vec<u8>, String)> {
    let (sig_count, sig_offset) = decode_shortvec_len(bytes)?;
    let message_offset = sig_offset + sig_count * 64;
    if bytes.len() <= message_offset {
        return Err(Error::Payload("truncated signature section".to_string()));
    }
    let message = &bytes[message_offset..];

    // Parse just enough of the message to find our signer slot.
    if message.len() < 3 {
        return Err(Error::Payload("truncated message header".to_string()));
    }
    let num_required = message[0] as usize;
    let (key_count, keys_offset) = decode_shortvec_len(&message[3..])?;
    let keys_start = 3 + keys_offset;
    if message.len() < keys_start + key_count * 32 {
        return Err(Error::Payload("truncated account table".to_string()));
    }
    if num_required > key_count {
        return Err(Error::Payload("signer count exceeds account table".to_string()));
    }

    let address = keypair.address();
    let slot = (0..num_required)
        .find(|i| {
            let start = keys_start + i * 32;
            message[start..start + 32] == address.as_bytes()[..]
        })
        .ok_or_else(|| Error::Payload(format!("{} is not a required signer", address)))?;

    let signature = keypair.sign(message);

    let mut signatures = vec![[0u8; 64]; num_required];
    for (i, sig) in signatures.iter_mut().enumerate().take(sig_count) {
        let start = sig_offset + i * 64;
        sig.copy_from_slice(&bytes[start..start + 64]);
    }
    signatures[slot] = signature;

    let mut out = Vec::with_capacity(1 + signatures.len() * 64 + message.len());
    encode_shortvec_len(&mut out, signatures.len());
    for sig in &signatures {
        out.extend_from_slice(sig);
    }
    out.extend_from_slice(message);

    Ok((out, bs58::encode(signature).into_string()))
}

/// Append a shortvec (compact-u16) length prefix.
fn encode_shortvec_len(out: &mut Vec<u8>, mut len: usize) {
    loop {
        let mut byte = (len & 0x7f) as u8;
        len >>= 7;
        if len != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if len == 0 {
            break;
        }
    }
}

/// Decode a shortvec length prefix, returning (length, bytes consumed).
fn decode_shortvec_len(bytes: &[u8]) -> Result<(usize, usize)> {
    let mut len = 0usize;
    for (i, &byte) in bytes.iter().enumerate().take(3) {
        len |= ((byte & 0x7f) as usize) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((len, i + 1));
        }
    }
    Err(Error::Payload("invalid shortvec length prefix".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signature, Verifier};

    fn keypair() -> Keypair {
        let signing = ed25519_dalek::SigningKey::from_bytes(&[9u8; 32]);
        let mut bytes = signing.to_bytes().to_vec();
        bytes.extend_from_slice(signing.verifying_key().as_bytes());
        Keypair::from_bytes(&bytes).unwrap()
    }

    fn addr(fill: u8) -> Address {
        Address([fill; 32])
    }

    fn transfer_like(program: Address, from: Address, to: Address, data: Vec<u8>) -> Instruction {
        Instruction {
            program_id: program,
            accounts: vec![
                AccountMeta::writable(from, true),
                AccountMeta::writable(to, false),
            ],
            data,
        }
    }

    #[test]
    fn test_shortvec_encoding_vectors() {
        for (len, expected) in [
            (0usize, vec![0u8]),
            (5, vec![5]),
            (0x7f, vec![0x7f]),
            (0x80, vec![0x80, 0x01]),
            (0xff, vec![0xff, 0x01]),
            (0x4000, vec![0x80, 0x80, 0x01]),
        ] {
            let mut out = Vec::new();
            encode_shortvec_len(&mut out, len);
            assert_eq!(out, expected, "len {}", len);
            let (decoded, consumed) = decode_shortvec_len(&out).unwrap();
            assert_eq!(decoded, len);
            assert_eq!(consumed, expected.len());
        }
    }

    #[test]
    fn test_compile_orders_and_dedups_accounts() {
        let payer = keypair().address();
        let program = addr(0xaa);
        let dest_a = addr(1);
        let dest_b = addr(2);

        let instructions = vec![
            transfer_like(program, payer, dest_a, vec![1]),
            transfer_like(program, payer, dest_b, vec![2]),
        ];
        let message = Message::compile(&payer, &instructions, Blockhash([3u8; 32]));

        // payer, two writable destinations, read-only program; payer deduped.
        assert_eq!(message.account_keys.len(), 4);
        assert_eq!(message.account_keys[0], payer);
        assert_eq!(message.header.num_required_signatures, 1);
        assert_eq!(message.header.num_readonly_signed, 0);
        assert_eq!(message.header.num_readonly_unsigned, 1);
        assert_eq!(*message.account_keys.last().unwrap(), program);

        // Both instructions reference the same payer index.
        assert_eq!(message.instructions[0].account_indexes[0], 0);
        assert_eq!(message.instructions[1].account_indexes[0], 0);
        assert_eq!(
            message.instructions[0].program_id_index,
            message.instructions[1].program_id_index
        );
    }

    #[test]
    fn test_signature_covers_message_bytes() {
        let kp = keypair();
        let ix = transfer_like(addr(0xaa), kp.address(), addr(1), vec![2, 0, 0, 0]);
        let message = Message::compile(&kp.address(), &[ix], Blockhash([7u8; 32]));
        let mut tx = Transaction::new_unsigned(message);
        tx.sign(&kp).unwrap();

        let signature = Signature::from_bytes(&tx.signatures[0]);
        assert!(kp
            .verifying_key()
            .verify(&tx.message.serialize(), &signature)
            .is_ok());
        assert!(tx.signature_base58().is_some());
    }

    #[test]
    fn test_sign_rejects_non_signer() {
        let kp = keypair();
        let other = addr(0x42);
        let ix = transfer_like(addr(0xaa), other, addr(1), vec![]);
        let message = Message::compile(&other, &[ix], Blockhash([7u8; 32]));
        let mut tx = Transaction::new_unsigned(message);
        assert!(matches!(tx.sign(&kp), Err(Error::Payload(_))));
    }

    #[test]
    fn test_serialized_layout_round_trips_through_wire_signing() {
        let kp = keypair();
        let ix = transfer_like(addr(0xaa), kp.address(), addr(1), vec![12, 1, 2, 3]);
        let message = Message::compile(&kp.address(), &[ix], Blockhash([7u8; 32]));
        let unsigned = Transaction::new_unsigned(message).serialize();

        let (signed, sig_b58) = sign_wire_transaction(&unsigned, &kp).unwrap();
        assert_eq!(signed.len(), unsigned.len());

        // Signature slot 0 now holds a signature that verifies over the
        // message section.
        let (count, offset) = decode_shortvec_len(&signed).unwrap();
        assert_eq!(count, 1);
        let sig_bytes: [u8; 64] = signed[offset..offset + 64].try_into().unwrap();
        let message_bytes = &signed[offset + 64..];
        let signature = Signature::from_bytes(&sig_bytes);
        assert!(kp.verifying_key().verify(message_bytes, &signature).is_ok());
        assert_eq!(sig_b58, bs58::encode(sig_bytes).into_string());
    }

    #[test]
    fn test_wire_signing_rejects_garbage() {
        let kp = keypair();
        assert!(matches!(
            sign_wire_transaction(&[0x80], &kp),
            Err(Error::Payload(_))
        ));
        assert!(matches!(
            sign_wire_transaction(&[1, 0, 0], &kp),
            Err(Error::Payload(_))
        ));
    }

    #[test]
    fn test_wire_signing_rejects_foreign_payer() {
        let kp = keypair();
        let other = addr(0x42);
        let ix = transfer_like(addr(0xaa), other, addr(1), vec![]);
        let message = Message::compile(&other, &[ix], Blockhash([7u8; 32]));
        let unsigned = Transaction::new_unsigned(message).serialize();
        assert!(matches!(
            sign_wire_transaction(&unsigned, &kp),
            Err(Error::Payload(_))
        ));
    }
}
