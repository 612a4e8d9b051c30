use crate::codec::{self, Base64Segments, SegmentCodec};
use crate::error::{Error, VerifyError};
use crate::hasher::Digest;
use crate::puzzle::Puzzle;
use crate::types::{Nonce, Proof};
use std::collections::HashSet;

/// Anything the verifier accepts: a structured proof, a nonce list, or its text form.
#[derive(Debug, Clone, Copy)]
pub enum Candidate<'a> {
    Proof(&'a Proof),
    Nonces(&'a [Nonce]),
    Encoded(&'a str),
}

impl<'a> From<&'a Proof> for Candidate<'a> {
    fn from(proof: &'a Proof) -> Self {
        Candidate::Proof(proof)
    }
}

impl<'a> From<&'a [Nonce]> for Candidate<'a> {
    fn from(nonces: &'a [Nonce]) -> Self {
        Candidate::Nonces(nonces)
    }
}

impl<'a> From<&'a Vec<Nonce>> for Candidate<'a> {
    fn from(nonces: &'a Vec<Nonce>) -> Self {
        Candidate::Nonces(nonces)
    }
}

impl<'a> From<&'a str> for Candidate<'a> {
    fn from(encoded: &'a str) -> Self {
        Candidate::Encoded(encoded)
    }
}

impl<'a> From<&'a String> for Candidate<'a> {
    fn from(encoded: &'a String) -> Self {
        Candidate::Encoded(encoded)
    }
}

/// Recomputes digests for a candidate and checks the collision predicate.
///
/// Accepts iff there are at least two nonces, no nonce repeats, and every nonce
/// maps to the same truncated digest. Digests carried alongside a proof are never
/// trusted; see [`Verifier::check_reported`].
#[derive(Debug, Clone, Copy)]
pub struct Verifier<'a> {
    puzzle: &'a Puzzle,
    codec: &'a dyn SegmentCodec,
}

impl<'a> Verifier<'a> {
    pub fn new(puzzle: &'a Puzzle) -> Self {
        Self {
            puzzle,
            codec: &Base64Segments,
        }
    }

    pub fn with_codec(puzzle: &'a Puzzle, codec: &'a dyn SegmentCodec) -> Self {
        Self { puzzle, codec }
    }

    /// Check a nonce list and return the digest they share.
    pub fn check_nonces(&self, nonces: &[Nonce]) -> Result<Digest, VerifyError> {
        if nonces.len() < 2 {
            return Err(VerifyError::TooFewNonces(nonces.len()));
        }
        let mut unique = HashSet::with_capacity(nonces.len());
        if !nonces.iter().all(|n| unique.insert(n)) {
            return Err(VerifyError::DuplicateNonce);
        }

        let first = self.puzzle.digest(&nonces[0]);
        if nonces[1..].iter().any(|n| self.puzzle.digest(n) != first) {
            return Err(VerifyError::DigestMismatch);
        }
        Ok(first)
    }

    pub fn check_proof(&self, proof: &Proof) -> Result<Digest, VerifyError> {
        self.check_nonces(&proof.nonces())
    }

    /// Decode `encoded` and check the resulting nonces.
    pub fn check_encoded(&self, encoded: &str) -> Result<Digest, Error> {
        let nonces = codec::decode_nonces_with(self.codec, encoded)?;
        Ok(self.check_nonces(&nonces)?)
    }

    pub fn check<'c>(&self, candidate: impl Into<Candidate<'c>>) -> Result<Digest, Error> {
        match candidate.into() {
            Candidate::Proof(proof) => Ok(self.check_proof(proof)?),
            Candidate::Nonces(nonces) => Ok(self.check_nonces(nonces)?),
            Candidate::Encoded(encoded) => self.check_encoded(encoded),
        }
    }

    /// Check a proof and require that `reported` equals the recomputed digest.
    pub fn check_reported(&self, proof: &Proof, reported: &[u8]) -> Result<Digest, VerifyError> {
        let digest = self.check_proof(proof)?;
        if digest.as_bytes() != reported {
            return Err(VerifyError::DigestDisagrees);
        }
        Ok(digest)
    }

    pub fn verify<'c>(&self, candidate: impl Into<Candidate<'c>>) -> bool {
        self.check(candidate).is_ok()
    }
}

impl Puzzle {
    /// Whether `candidate` is a valid collision for this puzzle.
    pub fn verify<'c>(&self, candidate: impl Into<Candidate<'c>>) -> bool {
        Verifier::new(self).verify(candidate)
    }
}
