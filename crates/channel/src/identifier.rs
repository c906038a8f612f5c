use core::fmt::{self, Display};
use core::str::FromStr;

use codec::{Decode, Encode};
use serde_derive::{Deserialize, Serialize};

use crate::error::Error;

const MAX_IDENTIFIER_LEN: usize = 64;

/// Characters permitted in chain and account identifiers.
///
/// The host chain almost certainly enforces a narrower alphabet; this crate
/// only needs identifiers to be non-empty, bounded, and free of separators
/// used in wire addresses and log lines.
fn validate_identifier(id: &str) -> Result<(), Error> {
    let valid = !id.is_empty()
        && id.len() <= MAX_IDENTIFIER_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));

    if valid {
        Ok(())
    } else {
        Err(Error::invalid_identifier(id.to_string()))
    }
}

/// Identifier of a chain, as carried in the relay handshake.
#[derive(
    Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct ChainId(String);

impl ChainId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ChainId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate_identifier(s)?;
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for ChainId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        validate_identifier(&s)?;
        Ok(Self(s))
    }
}

impl From<ChainId> for String {
    fn from(id: ChainId) -> Self {
        id.0
    }
}

impl Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of an on-chain account: a block producer, the channel contract, or
/// the peer channel contract.
#[derive(
    Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for AccountId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate_identifier(s)?;
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for AccountId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        validate_identifier(&s)?;
        Ok(Self(s))
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.0
    }
}

impl Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_validation() {
        assert!("ictest".parse::<ChainId>().is_ok());
        assert!("relay-1.mainnet".parse::<ChainId>().is_ok());
        assert!("".parse::<ChainId>().is_err());
        assert!("bad space".parse::<ChainId>().is_err());
        assert!("x".repeat(MAX_IDENTIFIER_LEN + 1).parse::<AccountId>().is_err());
    }

    #[test]
    fn account_round_trip() {
        let id: AccountId = "icp.bridge".parse().unwrap();
        assert_eq!(id.as_str(), "icp.bridge");
        assert_eq!(String::from(id.clone()), "icp.bridge".to_string());
        assert_eq!(id.to_string(), "icp.bridge");
    }
}
