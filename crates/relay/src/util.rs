use std::time::{SystemTime, UNIX_EPOCH};

use icp_channel::merkle::Digest;
use icp_channel::timestamp::Timestamp;

/// Wall-clock time as a channel timestamp. Only used for liveness probes,
/// never for proof gating.
pub fn host_now() -> Timestamp {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    Timestamp::from_unix_seconds(secs)
}

/// A fresh random digest, for relay ids and ping codes.
pub fn random_digest() -> Digest {
    Digest::from(rand::random::<[u8; 32]>())
}
