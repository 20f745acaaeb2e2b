//! Applying transactions to versioned state.

pub mod actuator;
pub mod state;
pub mod status_cache;
pub mod transaction_processor;
pub mod trigger;

#[macro_use]
extern crate serde_derive;
