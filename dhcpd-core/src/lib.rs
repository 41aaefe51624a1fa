//! # dhcpd-core
//!
//! The DHCPv4 protocol state machine: message dispatch, address allocation,
//! and lease lifecycle management over a pluggable relational store.
#![warn(
    missing_debug_implementations,
    missing_docs,
    missing_copy_implementations,
    rust_2018_idioms,
    unreachable_pub,
    non_snake_case,
    non_upper_case_globals
)]
#![allow(clippy::cognitive_complexity)]
#![deny(rustdoc::broken_intra_doc_links)]

pub use anyhow;
pub use async_trait::async_trait;
pub use dhcproto;
pub use mac_address;
pub use tokio;
pub use tracing;

pub mod acl;
pub mod allocator;
pub mod codec;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod lease_manager;
pub mod metrics;
pub mod model;
pub mod options_cache;
pub mod prelude;
pub mod reply;
pub mod server;
pub mod store;
pub mod sweeper;

pub use error::Error;
