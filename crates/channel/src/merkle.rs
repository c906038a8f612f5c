//! Action Merkle tree, as committed to by block headers.
//!
//! The tree hashes pairs of digests with a canonical left/right flag folded
//! into the first byte, so that a proof cannot reuse a node on the wrong
//! side. The root over an odd layer duplicates the trailing digest.

use core::fmt::{self, Display};

use codec::{Decode, Encode};
use sha2::{Digest as _, Sha256};

/// A 32-byte SHA-256 digest.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode)]
pub struct Digest([u8; 32]);

impl Digest {
    pub const fn zero() -> Self {
        Self([0; 32])
    }

    pub fn of(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 32]
    }
}

impl From<[u8; 32]> for Digest {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self)
    }
}

const CANONICAL_FLAG: u8 = 0x80;

fn make_canonical_left(d: &Digest) -> Digest {
    let mut bytes = d.0;
    bytes[0] &= !CANONICAL_FLAG;
    Digest(bytes)
}

fn make_canonical_right(d: &Digest) -> Digest {
    let mut bytes = d.0;
    bytes[0] |= CANONICAL_FLAG;
    Digest(bytes)
}

/// Hashes a left/right pair after folding in the canonical flags.
pub fn hash_pair(left: &Digest, right: &Digest) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(make_canonical_left(left).as_bytes());
    hasher.update(make_canonical_right(right).as_bytes());
    Digest(hasher.finalize().into())
}

/// Computes the Merkle root over the given digests.
///
/// A single digest is its own root; an empty list commits to the zero
/// digest.
pub fn merkle_root(digests: &[Digest]) -> Digest {
    if digests.is_empty() {
        return Digest::zero();
    }

    let mut layer = digests.to_vec();
    while layer.len() > 1 {
        if layer.len() % 2 != 0 {
            let last = layer[layer.len() - 1];
            layer.push(last);
        }
        let half = layer.len() / 2;
        for i in 0..half {
            let (left, right) = (layer[2 * i], layer[2 * i + 1]);
            layer[i] = hash_pair(&left, &right);
        }
        layer.truncate(half);
    }
    layer[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(n: u8) -> Vec<Digest> {
        (0..n).map(|i| Digest::of(&[i])).collect()
    }

    #[test]
    fn empty_and_singleton() {
        assert_eq!(merkle_root(&[]), Digest::zero());

        let one = leaves(1);
        assert_eq!(merkle_root(&one), one[0]);
    }

    #[test]
    fn root_is_deterministic() {
        let ds = leaves(7);
        assert_eq!(merkle_root(&ds), merkle_root(&ds.clone()));
    }

    #[test]
    fn root_depends_on_order() {
        let ds = leaves(4);
        let mut swapped = ds.clone();
        swapped.swap(1, 2);
        assert_ne!(merkle_root(&ds), merkle_root(&swapped));
    }

    #[test]
    fn pair_sides_are_distinguished() {
        let a = Digest::of(b"a");
        let b = Digest::of(b"b");
        assert_ne!(hash_pair(&a, &b), hash_pair(&b, &a));
    }

    #[test]
    fn odd_layer_duplicates_tail() {
        let ds = leaves(3);
        let padded = vec![ds[0], ds[1], ds[2], ds[2]];
        assert_eq!(merkle_root(&ds), merkle_root(&padded));
    }
}
