use crate::error::Error;
use crate::hasher::{Digest, HashBackend, KeyedHasher, PERSONALIZATION};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Issuance parameters for a puzzle, as handed out by the issuing server.
///
/// `salt` and `key` accept text or bytes through the builder setters.
#[derive(Builder, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[builder(name = "PuzzleBuilder", pattern = "owned")]
pub struct PuzzleParams {
    pub difficulty: usize,
    #[builder(setter(into))]
    pub salt: Vec<u8>,
    #[builder(setter(into))]
    pub key: Vec<u8>,
    #[builder(default)]
    #[serde(default)]
    pub backend: HashBackend,
}

impl PuzzleBuilder {
    fn validate(&self) -> Result<(), Error> {
        if self.difficulty.unwrap_or(0) == 0 {
            return Err(Error::InvalidConfig("difficulty must be >= 1".into()));
        }
        if self.salt.is_none() {
            return Err(Error::InvalidConfig("salt must be provided".into()));
        }
        if self.key.is_none() {
            return Err(Error::InvalidConfig("key must be provided".into()));
        }
        Ok(())
    }

    pub fn build_validated(self) -> Result<Puzzle, Error> {
        self.validate()?;
        let params = self
            .build()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        Puzzle::from_params(params)
    }
}

/// An issued challenge. Immutable once built and reusable for verification.
#[derive(Debug, Clone)]
pub struct Puzzle {
    params: PuzzleParams,
    hasher: Arc<dyn KeyedHasher>,
}

impl Puzzle {
    /// Build a puzzle on the default SHA-256 hex backend.
    pub fn new(
        difficulty: usize,
        salt: impl Into<Vec<u8>>,
        key: impl Into<Vec<u8>>,
    ) -> Result<Self, Error> {
        Self::builder()
            .difficulty(difficulty)
            .salt(salt)
            .key(key)
            .build_validated()
    }

    pub fn builder() -> PuzzleBuilder {
        PuzzleBuilder::default()
    }

    pub fn from_params(params: PuzzleParams) -> Result<Self, Error> {
        let hasher = params
            .backend
            .prepare(params.difficulty, &params.salt, &params.key)?;
        Ok(Self {
            params,
            hasher: Arc::from(hasher),
        })
    }

    pub fn difficulty(&self) -> usize {
        self.params.difficulty
    }

    pub fn salt(&self) -> &[u8] {
        &self.params.salt
    }

    pub fn key(&self) -> &[u8] {
        &self.params.key
    }

    pub fn backend(&self) -> HashBackend {
        self.params.backend
    }

    pub fn personalization(&self) -> &'static [u8; 8] {
        &PERSONALIZATION
    }

    pub fn params(&self) -> &PuzzleParams {
        &self.params
    }

    /// Truncated digest of `nonce` under this puzzle's salt, key and backend.
    pub fn digest(&self, nonce: &[u8]) -> Digest {
        self.hasher.digest(nonce)
    }
}

impl PartialEq for Puzzle {
    fn eq(&self, other: &Self) -> bool {
        self.params == other.params
    }
}

impl Eq for Puzzle {}

impl TryFrom<PuzzleParams> for Puzzle {
    type Error = Error;

    fn try_from(params: PuzzleParams) -> Result<Self, Self::Error> {
        Self::from_params(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_and_bytes_inputs_are_equivalent() {
        let from_text = Puzzle::new(4, "saltsalt", "key").unwrap();
        let from_bytes = Puzzle::new(4, b"saltsalt".to_vec(), vec![b'k', b'e', b'y']).unwrap();
        assert_eq!(from_text, from_bytes);
        let nonce = [7u8; 32];
        assert_eq!(from_text.digest(&nonce), from_bytes.digest(&nonce));
    }

    #[test]
    fn builder_selects_backend() {
        let puzzle = Puzzle::builder()
            .difficulty(3)
            .salt([1u8, 2, 3, 4, 5, 6, 7, 8])
            .key([9u8, 9])
            .backend(HashBackend::Blake2b)
            .build_validated()
            .expect("valid puzzle");
        assert_eq!(puzzle.backend(), HashBackend::Blake2b);
        assert_eq!(puzzle.digest(&[0u8; 32]).len(), 3);
        assert_eq!(puzzle.personalization(), b"hardlock");
    }

    #[test]
    fn default_backend_truncates_hex_chars() {
        let puzzle = Puzzle::new(5, [1u8; 8], [2u8; 4]).unwrap();
        assert_eq!(puzzle.backend(), HashBackend::Sha256Hex);
        let digest = puzzle.digest(&[0u8; 32]);
        assert_eq!(digest.len(), 5);
        assert!(digest.as_bytes().iter().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn builder_rejects_missing_fields_and_zero_difficulty() {
        let err = Puzzle::builder()
            .difficulty(0)
            .salt("s")
            .key("k")
            .build_validated()
            .expect_err("zero difficulty");
        assert!(matches!(err, Error::InvalidConfig(_)));

        let err = Puzzle::builder()
            .difficulty(2)
            .key("k")
            .build_validated()
            .expect_err("missing salt");
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn params_serde_defaults_backend() {
        let params: PuzzleParams =
            serde_json::from_str(r#"{"difficulty":2,"salt":[1,2],"key":[3]}"#).unwrap();
        assert_eq!(params.backend, HashBackend::Sha256Hex);
        let puzzle = Puzzle::try_from(params.clone()).unwrap();
        assert_eq!(puzzle.params(), &params);
        assert_eq!(puzzle.salt(), &[1u8, 2]);
        assert_eq!(puzzle.key(), &[3u8]);
    }
}
