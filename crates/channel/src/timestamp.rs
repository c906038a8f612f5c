use core::fmt::{self, Display};

use codec::{Decode, Encode};

/// A second-resolution timestamp, as the host chain stamps blocks and packet
/// expirations.
///
/// The zero value means "not set" and never compares as expired or
/// non-expired; see [`Expiry::InvalidTimestamp`].
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode,
)]
pub struct Timestamp(u64);

/// The expiry result when comparing an expiration against the host clock.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Expiry {
    Expired,
    NotExpired,
    InvalidTimestamp,
}

impl Timestamp {
    pub const fn from_unix_seconds(secs: u64) -> Self {
        Self(secs)
    }

    pub const fn none() -> Self {
        Self(0)
    }

    pub fn as_unix_seconds(&self) -> u64 {
        self.0
    }

    pub fn is_set(&self) -> bool {
        self.0 != 0
    }

    pub fn plus_seconds(&self, secs: u64) -> Timestamp {
        Timestamp(self.0.saturating_add(secs))
    }

    /// Compares `self`, interpreted as an expiration, against `now`.
    ///
    /// A packet expires the moment the host clock reaches its expiration.
    pub fn check_expiry(&self, now: Timestamp) -> Expiry {
        if !self.is_set() || !now.is_set() {
            Expiry::InvalidTimestamp
        } else if now.0 >= self.0 {
            Expiry::Expired
        } else {
            Expiry::NotExpired
        }
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_set() {
            write!(f, "{}", self.0)
        } else {
            write!(f, "none")
        }
    }
}
