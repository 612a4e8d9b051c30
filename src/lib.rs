//! Client-side hash-collision proof of work.
//!
//! A [`Puzzle`] fixes a keyed, salted hash truncated to `difficulty` units. Solving
//! means finding two distinct 32-byte nonces whose truncated digests collide;
//! verifying means recomputing both digests. A [`Dispatcher`] runs the search
//! inline or hands it to a [`Delegate`], and re-verifies anything a delegate
//! returns before resolving.
//!
//! ```no_run
//! use hardlock::{Dispatcher, Puzzle};
//!
//! let puzzle = Puzzle::new(3, "issued-salt", "issued-key")?;
//! let solution = Dispatcher::new(puzzle.clone()).solve_blocking()?;
//! assert!(puzzle.verify(&solution.encoded));
//! # Ok::<(), hardlock::Error>(())
//! ```
pub mod codec;
pub mod context;
pub mod delegate;
pub mod dispatch;
pub mod error;
pub mod hasher;
pub mod puzzle;
pub mod search;
pub mod types;
pub mod verify;
pub mod wire;

pub use codec::{decode, decode_nonces, encode, Base64Segments, HexSegments, SegmentCodec};
pub use context::{ExecutionContext, NonceSource, OsContext, RngNonces, SeededContext};
pub use delegate::{Delegate, DelegateLink, ThreadDelegate};
pub use dispatch::{DispatchState, Dispatcher, DispatcherBuilder, SolveHandle};
pub use error::{Error, VerifyError};
pub use hasher::{Digest, HashBackend, KeyedHasher, PERSONALIZATION};
pub use puzzle::{Puzzle, PuzzleBuilder, PuzzleParams};
pub use search::{search, Collision, CollisionSearcher};
pub use types::{Nonce, Proof, Solution, NONCE_LEN};
pub use verify::{Candidate, Verifier};
