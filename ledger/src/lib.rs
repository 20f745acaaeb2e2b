pub mod block_producer;
mod blockstore_processor;
pub mod consensus;
pub mod error;
pub mod fork_db;
mod fork_switch;
pub mod genesis_config;
pub mod ledger;

pub use {
    block_producer::PackingSource,
    error::{BlockError, PushOutcome, Result},
    ledger::{Ledger, LedgerConfig},
};
