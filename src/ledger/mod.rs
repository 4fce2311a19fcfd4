//! Ledger primitives: addresses, the transaction wire format, and the
//! JSON-RPC submission client.

pub mod address;
pub mod rpc;
pub mod transaction;

pub use address::{associated_token_address, find_program_address, Address};
pub use rpc::{Commitment, ConfirmationStatus, RpcClient};
pub use transaction::{sign_wire_transaction, Blockhash, Instruction, Message, Transaction};
