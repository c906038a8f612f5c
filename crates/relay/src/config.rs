//! Relay configuration: a `[global]` section for transport tuning and a
//! `[chain]` section naming the local chain, the contracts, and the peers.

use core::time::Duration;
use std::fs;
use std::path::Path;

use serde_derive::{Deserialize, Serialize};

use icp_channel::identifier::{AccountId, ChainId};

use crate::error::Error;

pub mod default {
    pub fn ping_interval_secs() -> u64 {
        3
    }

    pub fn reconnect_delay_secs() -> u64 {
        5
    }

    pub fn max_frame_bytes() -> usize {
        16 * 1024 * 1024
    }

    /// Sized to absorb block bursts without waiting on acks; larger values
    /// raise the latency of small urgent messages.
    pub fn socket_buffer_bytes() -> u32 {
        1024 * 1024
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub global: GlobalConfig,
    pub chain: ChainConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    pub ping_interval_secs: u64,
    pub reconnect_delay_secs: u64,
    pub max_frame_bytes: usize,
    pub socket_buffer_bytes: u32,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: default::ping_interval_secs(),
            reconnect_delay_secs: default::reconnect_delay_secs(),
            max_frame_bytes: default::max_frame_bytes(),
            socket_buffer_bytes: default::socket_buffer_bytes(),
        }
    }
}

impl GlobalConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChainConfig {
    /// Identifier of the chain this relay submits to.
    pub id: ChainId,
    /// The channel contract on the local chain.
    pub local_contract: AccountId,
    /// The channel contract on the peer chain.
    pub peer_contract: AccountId,
    /// Address to accept peer relays on, `host:port`. `None` disables the
    /// listener; the relay then only dials out.
    #[serde(default)]
    pub listen_addr: Option<String>,
    /// Peer relay endpoints to dial, `host:port`.
    #[serde(default)]
    pub peers: Vec<String>,
}

/// Attempt to load and parse the TOML config file at the given path.
pub fn load(path: impl AsRef<Path>) -> Result<Config, Error> {
    let config_toml = fs::read_to_string(&path).map_err(Error::config_io)?;
    toml::from_str(&config_toml).map_err(Error::config_decode)
}

/// Serialize the given `Config` as TOML to the given file path.
pub fn store(config: &Config, path: impl AsRef<Path>) -> Result<(), Error> {
    let contents = toml::to_string_pretty(config).map_err(Error::config_encode)?;
    fs::write(path, contents).map_err(Error::config_io)
}
