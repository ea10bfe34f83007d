//! Blake2b hashing for ballot keys.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use chama_types::{PollId, UserId, VoterHash};

type Blake2b256 = Blake2b<U32>;

/// Compute a 256-bit Blake2b hash of arbitrary data.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    let mut output = [0u8; 32];
    output.copy_from_slice(&hasher.finalize());
    output
}

/// Hash multiple byte slices in sequence (avoids concatenation allocation).
pub fn blake2b_256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    let mut output = [0u8; 32];
    output.copy_from_slice(&hasher.finalize());
    output
}

/// Ballot key for `voter` on `poll`: `H(voter_id || poll_id)`.
///
/// Both ids are fixed-width (16-byte UUIDs) so the concatenation is unambiguous.
pub fn voter_hash(voter: &UserId, poll: &PollId) -> VoterHash {
    VoterHash::new(blake2b_256_multi(&[
        voter.as_uuid().as_bytes().as_slice(),
        poll.as_uuid().as_bytes().as_slice(),
    ]))
}
