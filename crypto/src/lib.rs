//! Cryptographic helpers for the chama core.
//!
//! - Blake2b-256 digests, used for anonymous ballot keys
//! - Share certificate numbers

pub mod certificate;
pub mod hash;

pub use certificate::{certificate_number, is_certificate_number};
pub use hash::{blake2b_256, blake2b_256_multi, voter_hash};
