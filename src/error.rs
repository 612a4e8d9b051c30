/// Reasons a candidate proof is rejected by the verifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("malformed proof: {0}")]
    Malformed(String),
    #[error("proof needs at least two nonces, got {0}")]
    TooFewNonces(usize),
    #[error("proof repeats a nonce")]
    DuplicateNonce,
    #[error("nonce digests do not collide")]
    DigestMismatch,
    #[error("reported digest does not match the recomputed digest")]
    DigestDisagrees,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("malformed proof: {0}")]
    MalformedProof(String),
    #[error("verification failed: {0}")]
    VerificationFailed(VerifyError),
    #[error("delegate unavailable: {0}")]
    DelegateUnavailable(String),
    #[error("delegate protocol error: {0}")]
    DelegateProtocol(String),
    #[error("delegate reported failure: {0}")]
    DelegateFailed(String),
    #[error("solver channel closed")]
    ChannelClosed,
}

impl From<VerifyError> for Error {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::Malformed(msg) => Error::MalformedProof(msg),
            other => Error::VerificationFailed(other),
        }
    }
}
