//! Capability boundary for randomness and delegation policy.
//!
//! The core never probes ambient state to decide whether it may hand work to a
//! parallel worker or where its random bytes come from; both questions are
//! answered by an injected [`ExecutionContext`].
use crate::types::{Nonce, NONCE_LEN};
use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Source of independent nonces for the collision search.
pub trait NonceSource {
    fn next_nonce(&mut self) -> Nonce;
}

/// Environment capabilities the dispatcher and search rely on.
pub trait ExecutionContext: Send + Sync + fmt::Debug {
    /// Whether a parallel delegate may be used from this context.
    ///
    /// Must be `false` inside a delegate so that a delegate never delegates again.
    fn can_delegate(&self) -> bool;

    /// Fill `dest` with random bytes.
    fn fill_bytes(&self, dest: &mut [u8]);

    fn random_bytes(&self, len: usize) -> Vec<u8> {
        let mut out = vec![0u8; len];
        self.fill_bytes(&mut out);
        out
    }
}

/// Adapts an [`ExecutionContext`] into a [`NonceSource`].
pub struct ContextNonces<'a, C: ExecutionContext + ?Sized> {
    context: &'a C,
}

impl<'a, C: ExecutionContext + ?Sized> ContextNonces<'a, C> {
    pub fn new(context: &'a C) -> Self {
        Self { context }
    }
}

impl<C: ExecutionContext + ?Sized> NonceSource for ContextNonces<'_, C> {
    fn next_nonce(&mut self) -> Nonce {
        let mut nonce = [0u8; NONCE_LEN];
        self.context.fill_bytes(&mut nonce);
        nonce
    }
}

/// Any `rand` generator as a nonce source.
#[derive(Debug, Clone)]
pub struct RngNonces<R: RngCore>(pub R);

impl<R: RngCore> NonceSource for RngNonces<R> {
    fn next_nonce(&mut self) -> Nonce {
        let mut nonce = [0u8; NONCE_LEN];
        self.0.fill_bytes(&mut nonce);
        nonce
    }
}

/// Operating-system randomness.
#[derive(Debug, Clone, Copy)]
pub struct OsContext {
    delegation: bool,
}

impl OsContext {
    /// A context that permits handing the search to a delegate.
    pub fn delegating() -> Self {
        Self { delegation: true }
    }

    /// A context that always searches on the calling thread.
    pub fn inline() -> Self {
        Self { delegation: false }
    }
}

impl Default for OsContext {
    fn default() -> Self {
        Self::delegating()
    }
}

impl ExecutionContext for OsContext {
    fn can_delegate(&self) -> bool {
        self.delegation
    }

    fn fill_bytes(&self, dest: &mut [u8]) {
        OsRng.fill_bytes(dest);
    }
}

/// Pseudo-random fallback: nonces only need to be independent, not unpredictable.
///
/// Seeded construction makes searches reproducible.
#[derive(Debug)]
pub struct SeededContext {
    rng: Mutex<StdRng>,
    delegation: bool,
}

impl SeededContext {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            delegation: false,
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
            delegation: false,
        }
    }

    pub fn with_delegation(mut self, delegation: bool) -> Self {
        self.delegation = delegation;
        self
    }
}

impl ExecutionContext for SeededContext {
    fn can_delegate(&self) -> bool {
        self.delegation
    }

    fn fill_bytes(&self, dest: &mut [u8]) {
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .fill_bytes(dest);
    }
}

/// The context a delegate runs its search in. Never delegates.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkerContext;

impl ExecutionContext for WorkerContext {
    fn can_delegate(&self) -> bool {
        false
    }

    fn fill_bytes(&self, dest: &mut [u8]) {
        OsRng.fill_bytes(dest);
    }
}
