#![forbid(unsafe_code)]

//! Off-chain relay for the inter-chain channel.
//!
//! One relay process sits next to each chain. Peer relays connect over
//! binary websockets, introduce themselves with a `hello`, keep the link
//! alive with coded pings, and exchange headers, packets, receipts and
//! cleanups. The [`coordinator`] owns all shared state on a single task and
//! turns peer messages into transactions against the local channel contract
//! through a [`chain::ChainHandle`].

pub mod chain;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod message;
pub mod session;
pub mod supervisor;
pub mod util;
