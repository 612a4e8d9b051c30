use crate::error::Error;
use blake2::digest::Mac;
use blake2::Blake2bMac512;
use serde::{Deserialize, Serialize};
use sha2::Digest as _;
use sha2::Sha256;
use std::fmt;

/// Fixed personalization mixed into every digest (`"hardlock"`).
pub const PERSONALIZATION: [u8; 8] = *b"hardlock";

/// Hex characters in a full SHA-256 digest.
const SHA256_HEX_LEN: usize = 64;
/// Bytes in a full BLAKE2b-512 digest.
const BLAKE2B_LEN: usize = 64;
const BLAKE2B_MAX_SALT: usize = 16;
const BLAKE2B_MAX_KEY: usize = 64;

/// A digest truncated to the puzzle difficulty.
///
/// For [`HashBackend::Sha256Hex`] the bytes are lowercase ASCII hex characters,
/// for [`HashBackend::Blake2b`] they are raw digest bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Digest(Vec<u8>);

impl Digest {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for Digest {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

/// Keyed hash over `(salt, personalization, key, nonce)`, truncated to the difficulty.
///
/// Implementations absorb salt, personalization and key once at construction and
/// only hash the nonce per call.
pub trait KeyedHasher: Send + Sync + fmt::Debug {
    fn digest(&self, nonce: &[u8]) -> Digest;

    /// Truncation length, in backend units (hex chars or bytes).
    fn difficulty(&self) -> usize;
}

/// Hash backend selection for a puzzle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HashBackend {
    /// SHA-256 over `salt || personalization || key || nonce`, hex encoded,
    /// truncated to `difficulty` characters.
    #[default]
    Sha256Hex,
    /// BLAKE2b-512 keyed with `key`, salted with `salt` and personalized,
    /// truncated to `difficulty` bytes.
    Blake2b,
}

impl HashBackend {
    /// Largest difficulty the backend can express.
    pub fn max_difficulty(&self) -> usize {
        match self {
            Self::Sha256Hex => SHA256_HEX_LEN,
            Self::Blake2b => BLAKE2B_LEN,
        }
    }

    /// Name of the truncation unit, for diagnostics.
    pub fn unit(&self) -> &'static str {
        match self {
            Self::Sha256Hex => "hex chars",
            Self::Blake2b => "bytes",
        }
    }

    /// Check that `difficulty`, `salt` and `key` fit this backend.
    pub fn validate(&self, difficulty: usize, salt: &[u8], key: &[u8]) -> Result<(), Error> {
        if difficulty == 0 {
            return Err(Error::InvalidConfig("difficulty must be >= 1".into()));
        }
        if difficulty > self.max_difficulty() {
            return Err(Error::InvalidConfig(format!(
                "difficulty must be <= {} {}",
                self.max_difficulty(),
                self.unit()
            )));
        }
        if let Self::Blake2b = self {
            if salt.len() > BLAKE2B_MAX_SALT {
                return Err(Error::InvalidConfig(format!(
                    "blake2b salt must be <= {BLAKE2B_MAX_SALT} bytes"
                )));
            }
            if key.len() > BLAKE2B_MAX_KEY {
                return Err(Error::InvalidConfig(format!(
                    "blake2b key must be <= {BLAKE2B_MAX_KEY} bytes"
                )));
            }
        }
        Ok(())
    }

    /// Validate the inputs and build the keyed hasher for this backend.
    pub fn prepare(
        &self,
        difficulty: usize,
        salt: &[u8],
        key: &[u8],
    ) -> Result<Box<dyn KeyedHasher>, Error> {
        self.validate(difficulty, salt, key)?;
        match self {
            Self::Sha256Hex => Ok(Box::new(Sha256HexHasher::new(difficulty, salt, key))),
            Self::Blake2b => Ok(Box::new(Blake2bHasher::new(difficulty, salt, key)?)),
        }
    }
}

/// Generic-hash backend: prefix state over `salt || personalization || key`.
#[derive(Clone)]
pub struct Sha256HexHasher {
    prefix: Sha256,
    difficulty: usize,
}

impl Sha256HexHasher {
    pub fn new(difficulty: usize, salt: &[u8], key: &[u8]) -> Self {
        let mut prefix = Sha256::new();
        prefix.update(salt);
        prefix.update(PERSONALIZATION);
        prefix.update(key);
        Self {
            prefix,
            difficulty: difficulty.min(SHA256_HEX_LEN),
        }
    }
}

impl KeyedHasher for Sha256HexHasher {
    fn digest(&self, nonce: &[u8]) -> Digest {
        let mut hasher = self.prefix.clone();
        hasher.update(nonce);
        let mut hex = hex::encode(hasher.finalize()).into_bytes();
        hex.truncate(self.difficulty);
        Digest(hex)
    }

    fn difficulty(&self) -> usize {
        self.difficulty
    }
}

impl fmt::Debug for Sha256HexHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sha256HexHasher")
            .field("difficulty", &self.difficulty)
            .finish_non_exhaustive()
    }
}

/// Native keyed/salted/personalized backend.
#[derive(Clone)]
pub struct Blake2bHasher {
    keyed: Blake2bMac512,
    difficulty: usize,
}

impl Blake2bHasher {
    pub fn new(difficulty: usize, salt: &[u8], key: &[u8]) -> Result<Self, Error> {
        let keyed = Blake2bMac512::new_with_salt_and_personal(key, salt, &PERSONALIZATION)
            .map_err(|err| Error::InvalidConfig(format!("blake2b parameters: {err}")))?;
        Ok(Self {
            keyed,
            difficulty: difficulty.min(BLAKE2B_LEN),
        })
    }
}

impl KeyedHasher for Blake2bHasher {
    fn digest(&self, nonce: &[u8]) -> Digest {
        let mut mac = self.keyed.clone();
        mac.update(nonce);
        let full = mac.finalize().into_bytes();
        Digest(full[..self.difficulty].to_vec())
    }

    fn difficulty(&self) -> usize {
        self.difficulty
    }
}

impl fmt::Debug for Blake2bHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blake2bHasher")
            .field("difficulty", &self.difficulty)
            .finish_non_exhaustive()
    }
}
