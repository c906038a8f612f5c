//! The peer record and the packet meter, the two channel singletons.

use codec::{Decode, Encode};

use crate::error::Error;
use crate::identifier::AccountId;
use crate::packet::Sequence;

/// The authoritative cursors of the channel. Consumption out of order with
/// any of the four sequences is rejected.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct PeerRecord {
    pub peer_contract: Option<AccountId>,
    pub last_outgoing_packet_seq: Sequence,
    pub last_incoming_packet_seq: Sequence,
    pub last_outgoing_receipt_seq: Sequence,
    pub last_incoming_receipt_seq: Sequence,
}

/// Bounds the number of unreceipted packets in flight.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct Meter {
    pub max_packets: u32,
    pub current_packets: u32,
}

impl Default for Meter {
    fn default() -> Self {
        // Unlimited until the owner configures a bound.
        Self {
            max_packets: u32::MAX,
            current_packets: 0,
        }
    }
}

impl Meter {
    pub fn is_saturated(&self) -> bool {
        self.current_packets >= self.max_packets
    }

    pub fn add(&mut self) -> Result<(), Error> {
        if self.is_saturated() {
            return Err(Error::rate_limited(self.max_packets));
        }
        self.current_packets += 1;
        Ok(())
    }

    pub fn remove(&mut self) -> Result<(), Error> {
        if self.current_packets == 0 {
            return Err(Error::meter_underflow());
        }
        self.current_packets -= 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meter_bounds() {
        let mut meter = Meter {
            max_packets: 2,
            current_packets: 0,
        };

        assert!(meter.add().is_ok());
        assert!(meter.add().is_ok());
        assert!(meter.add().is_err());
        assert_eq!(meter.current_packets, 2);

        assert!(meter.remove().is_ok());
        assert!(meter.add().is_ok());

        meter.remove().unwrap();
        meter.remove().unwrap();
        assert!(meter.remove().is_err());
    }
}
