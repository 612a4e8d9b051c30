//! Birthday-bound collision search over truncated digests.
use crate::context::NonceSource;
use crate::hasher::{Digest, HashBackend};
use crate::puzzle::Puzzle;
use crate::types::{Nonce, Proof};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::debug;

/// Upper bound on the digest map pre-allocation.
const MAX_CAPACITY_HINT: usize = 1 << 16;

/// First collision found by a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    pub digest: Digest,
    pub proof: Proof,
    /// Nonces drawn, including the colliding one.
    pub draws: u64,
}

/// Draws nonces until two distinct ones share a truncated digest.
///
/// There is no iteration cap: cost is tuned only through the puzzle difficulty,
/// and the expected number of draws is about the square root of the truncated
/// digest space. Each search owns its digest map.
#[derive(Debug, Clone, Copy)]
pub struct CollisionSearcher<'a> {
    puzzle: &'a Puzzle,
}

impl<'a> CollisionSearcher<'a> {
    pub fn new(puzzle: &'a Puzzle) -> Self {
        Self { puzzle }
    }

    pub fn search<S: NonceSource + ?Sized>(&self, source: &mut S) -> Collision {
        let mut seen: HashMap<Digest, Nonce> = HashMap::with_capacity(capacity_hint(
            self.puzzle.backend(),
            self.puzzle.difficulty(),
        ));
        let mut draws: u64 = 0;

        let (nonce, earlier, digest) = loop {
            let nonce = source.next_nonce();
            draws += 1;
            let digest = self.puzzle.digest(&nonce);
            match seen.entry(digest) {
                Entry::Vacant(slot) => {
                    slot.insert(nonce);
                }
                // Drawing the stored nonce again is not a collision.
                Entry::Occupied(slot) if *slot.get() == nonce => {}
                Entry::Occupied(slot) => break (nonce, *slot.get(), slot.key().clone()),
            }
        };

        debug!(
            difficulty = self.puzzle.difficulty(),
            backend = ?self.puzzle.backend(),
            distinct_digests = seen.len(),
            draws,
            "collision found"
        );
        Collision {
            digest,
            proof: Proof::new(nonce, earlier),
            draws,
        }
    }
}

/// Search `puzzle` with nonces from `source`.
pub fn search<S: NonceSource + ?Sized>(puzzle: &Puzzle, source: &mut S) -> Collision {
    CollisionSearcher::new(puzzle).search(source)
}

/// Expected draws before a collision, about `sqrt(space)`, capped.
fn capacity_hint(backend: HashBackend, difficulty: usize) -> usize {
    let bits_per_unit: u32 = match backend {
        HashBackend::Sha256Hex => 4,
        HashBackend::Blake2b => 8,
    };
    let half_bits = (difficulty as u32).saturating_mul(bits_per_unit) / 2;
    if half_bits >= MAX_CAPACITY_HINT.trailing_zeros() {
        MAX_CAPACITY_HINT
    } else {
        (1usize << half_bits) * 2
    }
}
