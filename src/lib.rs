//! elohim-chain: source chain validation and DHT replication core
//!
//! Each agent holds an append-only chain of signed entries. Entries of
//! public types are mirrored into a content-addressed DHT shared with peers.
//! The [`Host`] turns actions (commit, modify, delete, get, bundles) into
//! validated chain appends and resolves reads against the chain, an open
//! bundle and the network.

pub mod action;
pub mod api;
pub mod chain;
pub mod config;
pub mod dht;
pub mod entry;
pub mod error;
pub mod hash;
pub mod header;
pub mod host;
pub mod network;
pub mod peer;
pub mod registry;
pub mod signing;
pub mod validate;

pub use error::{ChainError, Result};
pub use host::{Host, HostBuilder};
