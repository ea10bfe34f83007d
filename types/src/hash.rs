//! Digest types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 32-byte ballot key: `H(voter_id || poll_id)`.
///
/// The only link between a voter and a ballot. Opaque to callers; the engine
/// never returns it alongside a user identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VoterHash([u8; 32]);

impl VoterHash {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }
}

impl fmt::Debug for VoterHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VoterHash({})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for VoterHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let h = VoterHash::new([7u8; 32]);
        assert_eq!(VoterHash::from_hex(&h.to_hex()), Some(h));
        assert_eq!(VoterHash::from_hex("abcd"), None);
    }
}
