use crate::hasher::Digest;
use serde::{Deserialize, Serialize};

/// Length in bytes of every nonce drawn by the search.
pub const NONCE_LEN: usize = 32;

pub type Nonce = [u8; NONCE_LEN];

/// Two nonces claimed to share a truncated digest.
///
/// `a` is the nonce drawn last, `b` the one recorded earlier for the same digest.
/// Holding a `Proof` says nothing about its validity; run it through the verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Proof {
    pub a: Nonce,
    pub b: Nonce,
}

impl Proof {
    pub fn new(a: Nonce, b: Nonce) -> Self {
        Self { a, b }
    }

    pub fn nonces(&self) -> [Nonce; 2] {
        [self.a, self.b]
    }

    /// Whether the two nonces differ byte-wise.
    pub fn is_distinct(&self) -> bool {
        self.a != self.b
    }
}

/// A solved puzzle: the colliding digest, the proof, and its transport form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    pub digest: Digest,
    pub proof: Proof,
    pub encoded: String,
    /// Hashes generated before the collision, when known.
    pub draws: Option<u64>,
}
