//! The Strata SDK.
//!
//! Types shared by every crate of the ledger core: hashes and addresses,
//! ed25519 keys, transactions and their receipts, blocks, and the account
//! permission structure signatures are checked against.

pub mod account;
pub mod block;
pub mod hash;
pub mod pubkey;
pub mod receipt;
pub mod signature;
pub mod transaction;

