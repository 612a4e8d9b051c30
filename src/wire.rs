//! JSON messages exchanged between a dispatcher and its delegate.
//!
//! Byte sequences are written as plain arrays. On input they may also arrive
//! as index-keyed objects (`{"0": 12, "1": 7}`); both shapes go through one
//! decode path and anything else is a protocol error.
use crate::error::Error;
use crate::hasher::{Digest, HashBackend};
use crate::puzzle::PuzzleParams;
use crate::search::Collision;
use crate::types::{Nonce, Proof};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Byte sequence on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct WireBytes(pub Vec<u8>);

#[derive(Deserialize)]
#[serde(untagged)]
enum WireBytesRepr {
    Array(Vec<u8>),
    Indexed(BTreeMap<String, u8>),
}

impl<'de> Deserialize<'de> for WireBytes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match WireBytesRepr::deserialize(deserializer)? {
            WireBytesRepr::Array(bytes) => Ok(Self(bytes)),
            WireBytesRepr::Indexed(map) => indexed_bytes(map).map(Self).map_err(de::Error::custom),
        }
    }
}

fn indexed_bytes(map: BTreeMap<String, u8>) -> Result<Vec<u8>, String> {
    let expected = map.len();
    let mut by_index = BTreeMap::new();
    for (key, value) in map {
        let idx: usize = key
            .parse()
            .map_err(|_| format!("non-numeric byte index {key:?}"))?;
        by_index.insert(idx, value);
    }
    if by_index.len() != expected {
        return Err("duplicate byte index".to_owned());
    }
    if by_index.keys().enumerate().any(|(pos, idx)| pos != *idx) {
        return Err("byte indices are not contiguous from 0".to_owned());
    }
    Ok(by_index.into_values().collect())
}

impl From<Vec<u8>> for WireBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for WireBytes {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

/// Puzzle parameters sent to a delegate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegateRequest {
    pub difficulty: usize,
    pub salt: WireBytes,
    pub key: WireBytes,
    #[serde(default)]
    pub backend: HashBackend,
}

impl From<&PuzzleParams> for DelegateRequest {
    fn from(params: &PuzzleParams) -> Self {
        Self {
            difficulty: params.difficulty,
            salt: params.salt.clone().into(),
            key: params.key.clone().into(),
            backend: params.backend,
        }
    }
}

impl From<DelegateRequest> for PuzzleParams {
    fn from(req: DelegateRequest) -> Self {
        Self {
            difficulty: req.difficulty,
            salt: req.salt.0,
            key: req.key.0,
            backend: req.backend,
        }
    }
}

/// A delegate's successful answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolvedMessage {
    pub digest: WireBytes,
    pub nonces: Vec<WireBytes>,
    pub encoded: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draws: Option<u64>,
}

impl SolvedMessage {
    pub fn from_collision(collision: &Collision, encoded: String) -> Self {
        Self {
            digest: collision.digest.as_bytes().into(),
            nonces: collision
                .proof
                .nonces()
                .iter()
                .map(|n| WireBytes::from(n.as_slice()))
                .collect(),
            encoded,
            draws: Some(collision.draws),
        }
    }

    /// Reshape into a candidate proof. Structure only; no cryptographic checks.
    pub fn to_proof(&self) -> Result<Proof, Error> {
        let [a, b] = self.nonces.as_slice() else {
            return Err(Error::DelegateProtocol(format!(
                "expected 2 nonces, got {}",
                self.nonces.len()
            )));
        };
        Ok(Proof::new(to_nonce(a)?, to_nonce(b)?))
    }

    pub fn digest(&self) -> Digest {
        Digest::from(self.digest.0.clone())
    }
}

fn to_nonce(bytes: &WireBytes) -> Result<Nonce, Error> {
    Nonce::try_from(bytes.0.as_slice()).map_err(|_| {
        Error::DelegateProtocol(format!("nonce has {} bytes", bytes.0.len()))
    })
}

/// Terminal message from a delegate; exactly one is sent per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DelegateResponse {
    Solved(SolvedMessage),
    Failed { error: String },
}

pub fn encode_request(params: &PuzzleParams) -> Result<String, Error> {
    serde_json::to_string(&DelegateRequest::from(params))
        .map_err(|e| Error::DelegateProtocol(format!("encode request: {e}")))
}

pub fn decode_request(message: &str) -> Result<PuzzleParams, Error> {
    serde_json::from_str::<DelegateRequest>(message)
        .map(PuzzleParams::from)
        .map_err(|e| Error::DelegateProtocol(format!("decode request: {e}")))
}

pub fn encode_response(response: &DelegateResponse) -> Result<String, Error> {
    serde_json::to_string(response)
        .map_err(|e| Error::DelegateProtocol(format!("encode response: {e}")))
}

pub fn decode_response(message: &str) -> Result<DelegateResponse, Error> {
    serde_json::from_str(message)
        .map_err(|e| Error::DelegateProtocol(format!("decode response: {e}")))
}
