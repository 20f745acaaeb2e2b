pub mod manager;
pub mod node;
pub mod node_config;
pub mod repush_service;
pub mod txpool;

#[macro_use]
extern crate serde_derive;
