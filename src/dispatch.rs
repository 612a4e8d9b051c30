//! Inline-or-delegated solving with re-verification of delegated results.
use crate::codec::{self, Base64Segments, SegmentCodec};
use crate::context::{ContextNonces, ExecutionContext, OsContext};
use crate::delegate::Delegate;
use crate::error::Error;
use crate::puzzle::Puzzle;
use crate::search::CollisionSearcher;
use crate::types::{Nonce, Solution};
use crate::verify::{Candidate, Verifier};
use crate::wire::{self, DelegateResponse, SolvedMessage};
use derive_builder::Builder;
use flume::Receiver;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Delegating,
    AwaitingResult,
    Verifying,
    Resolved,
    Failed,
}

/// Chooses between searching on the caller's thread and handing the search to a delegate.
///
/// A delegated result is never trusted: it is verified locally against the
/// puzzle before the handle resolves.
#[derive(Builder, Debug, Clone)]
#[builder(pattern = "owned")]
pub struct Dispatcher {
    puzzle: Puzzle,
    #[builder(default = "Arc::new(OsContext::default())")]
    context: Arc<dyn ExecutionContext>,
    #[builder(default, setter(strip_option))]
    delegate: Option<Arc<dyn Delegate>>,
    #[builder(default = "Arc::new(Base64Segments)")]
    codec: Arc<dyn SegmentCodec>,
}

impl DispatcherBuilder {
    pub fn build_validated(self) -> Result<Dispatcher, Error> {
        if self.puzzle.is_none() {
            return Err(Error::InvalidConfig("puzzle must be provided".into()));
        }
        self.build()
            .map_err(|e| Error::InvalidConfig(e.to_string()))
    }
}

impl Dispatcher {
    /// Inline-only dispatcher with OS randomness.
    pub fn new(puzzle: Puzzle) -> Self {
        Self {
            puzzle,
            context: Arc::new(OsContext::default()),
            delegate: None,
            codec: Arc::new(Base64Segments),
        }
    }

    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    pub fn puzzle(&self) -> &Puzzle {
        &self.puzzle
    }

    /// Start a solve. Delegation happens here; an inline search runs when the handle is waited on.
    pub fn solve(&self) -> SolveHandle {
        let mut handle = SolveHandle {
            puzzle: self.puzzle.clone(),
            context: self.context.clone(),
            codec: self.codec.clone(),
            state: DispatchState::Idle,
            pending: Some(Pending::Inline),
        };

        let Some(delegate) = self.delegate.as_ref() else {
            return handle;
        };
        if !self.context.can_delegate() {
            debug!("context forbids delegation; solving inline");
            return handle;
        }

        handle.transition(DispatchState::Delegating);
        match self.start_delegate(delegate.as_ref()) {
            Ok(responses) => {
                handle.pending = Some(Pending::Delegated(responses));
                handle.transition(DispatchState::AwaitingResult);
            }
            Err(err) => {
                warn!(error = %err, "delegate unavailable; falling back to inline search");
                handle.transition(DispatchState::Idle);
            }
        }
        handle
    }

    fn start_delegate(&self, delegate: &dyn Delegate) -> Result<Receiver<String>, Error> {
        let link = delegate.connect()?;
        let request = wire::encode_request(self.puzzle.params())?;
        link.requests
            .send(request)
            .map_err(|_| Error::DelegateUnavailable("delegate closed its request channel".into()))?;
        Ok(link.responses)
    }

    /// Solve and block until the result is available.
    pub fn solve_blocking(&self) -> Result<Solution, Error> {
        self.solve().wait()
    }

    pub fn verify<'c>(&self, candidate: impl Into<Candidate<'c>>) -> bool {
        Verifier::with_codec(&self.puzzle, self.codec.as_ref()).verify(candidate)
    }

    pub fn encode(&self, nonces: &[Nonce]) -> String {
        codec::encode_with(self.codec.as_ref(), nonces)
    }

    pub fn decode(&self, encoded: &str) -> Result<Vec<Vec<u8>>, Error> {
        codec::decode_with(self.codec.as_ref(), encoded)
    }
}

#[derive(Debug)]
enum Pending {
    Inline,
    Delegated(Receiver<String>),
}

/// An in-flight solve.
///
/// Dropping the handle discards the result. The search itself keeps running
/// until it finds a collision; there is no cancellation.
#[derive(Debug)]
pub struct SolveHandle {
    puzzle: Puzzle,
    context: Arc<dyn ExecutionContext>,
    codec: Arc<dyn SegmentCodec>,
    state: DispatchState,
    pending: Option<Pending>,
}

impl SolveHandle {
    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn is_delegated(&self) -> bool {
        matches!(self.pending, Some(Pending::Delegated(_)))
    }

    /// Block until the solve resolves or fails.
    ///
    /// A second call after the handle has settled returns [`Error::ChannelClosed`].
    pub fn wait(&mut self) -> Result<Solution, Error> {
        match self.pending.take() {
            None => Err(Error::ChannelClosed),
            Some(Pending::Inline) => self.solve_inline(),
            Some(Pending::Delegated(responses)) => {
                let message = responses.recv().ok();
                self.settle_delegated(message)
            }
        }
    }

    /// Await the result without blocking the executor while a delegate works.
    ///
    /// An inline solve still runs on the polling thread.
    pub async fn wait_async(&mut self) -> Result<Solution, Error> {
        match self.pending.take() {
            None => Err(Error::ChannelClosed),
            Some(Pending::Inline) => self.solve_inline(),
            Some(Pending::Delegated(responses)) => {
                let message = responses.recv_async().await.ok();
                self.settle_delegated(message)
            }
        }
    }

    fn transition(&mut self, next: DispatchState) {
        debug!(from = ?self.state, to = ?next, "dispatch state");
        self.state = next;
    }

    fn fail(&mut self, err: Error) -> Result<Solution, Error> {
        self.transition(DispatchState::Failed);
        Err(err)
    }

    fn solve_inline(&mut self) -> Result<Solution, Error> {
        let collision = CollisionSearcher::new(&self.puzzle)
            .search(&mut ContextNonces::new(self.context.as_ref()));
        self.transition(DispatchState::Verifying);
        let digest = match Verifier::new(&self.puzzle).check_proof(&collision.proof) {
            Ok(digest) => digest,
            Err(err) => return self.fail(err.into()),
        };
        let encoded = codec::encode_with(self.codec.as_ref(), &collision.proof.nonces());
        self.transition(DispatchState::Resolved);
        Ok(Solution {
            digest,
            proof: collision.proof,
            encoded,
            draws: Some(collision.draws),
        })
    }

    fn settle_delegated(&mut self, message: Option<String>) -> Result<Solution, Error> {
        let Some(message) = message else {
            return self.fail(Error::DelegateProtocol(
                "delegate exited without a response".into(),
            ));
        };
        let solved = match wire::decode_response(&message) {
            Ok(DelegateResponse::Solved(solved)) => solved,
            Ok(DelegateResponse::Failed { error }) => {
                warn!(%error, "delegate reported failure");
                return self.fail(Error::DelegateFailed(error));
            }
            Err(err) => return self.fail(err),
        };
        self.transition(DispatchState::Verifying);
        match self.check_delegated(solved) {
            Ok(solution) => {
                self.transition(DispatchState::Resolved);
                Ok(solution)
            }
            Err(err) => {
                warn!(error = %err, "rejected delegated proof");
                self.fail(err)
            }
        }
    }

    fn check_delegated(&self, solved: SolvedMessage) -> Result<Solution, Error> {
        let proof = solved.to_proof()?;
        let verifier = Verifier::with_codec(&self.puzzle, self.codec.as_ref());
        let digest = verifier
            .check_reported(&proof, &solved.digest.0)
            .map_err(Error::VerificationFailed)?;
        let decoded = codec::decode_nonces_with(self.codec.as_ref(), &solved.encoded)
            .map_err(|e| Error::DelegateProtocol(format!("encoded field: {e}")))?;
        if decoded != proof.nonces() {
            return Err(Error::DelegateProtocol(
                "encoded field does not match nonces".into(),
            ));
        }
        Ok(Solution {
            digest,
            proof,
            encoded: solved.encoded,
            draws: solved.draws,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SeededContext;
    use crate::delegate::{handle_request, DelegateLink, ThreadDelegate};
    use crate::error::VerifyError;
    use std::time::Duration;

    fn puzzle() -> Puzzle {
        Puzzle::new(2, [1u8, 2, 3, 4, 5, 6, 7, 8], [9u8, 9]).unwrap()
    }

    fn delegating_context(seed: u64) -> Arc<dyn ExecutionContext> {
        Arc::new(SeededContext::new(seed).with_delegation(true))
    }

    /// Answers every request with a fixed message.
    #[derive(Debug)]
    struct CannedDelegate(String);

    impl Delegate for CannedDelegate {
        fn connect(&self) -> Result<DelegateLink, Error> {
            let (req_tx, req_rx) = flume::bounded::<String>(1);
            let (resp_tx, resp_rx) = flume::bounded::<String>(1);
            let reply = self.0.clone();
            std::thread::spawn(move || {
                if req_rx.recv().is_ok() {
                    let _ = resp_tx.send(reply);
                }
            });
            Ok(DelegateLink {
                requests: req_tx,
                responses: resp_rx,
            })
        }
    }

    #[derive(Debug)]
    struct Unreachable;

    impl Delegate for Unreachable {
        fn connect(&self) -> Result<DelegateLink, Error> {
            Err(Error::DelegateUnavailable("no worker support".into()))
        }
    }

    /// Accepts a request, then goes away without answering.
    #[derive(Debug)]
    struct Silent;

    impl Delegate for Silent {
        fn connect(&self) -> Result<DelegateLink, Error> {
            let (req_tx, req_rx) = flume::bounded::<String>(1);
            let (resp_tx, resp_rx) = flume::bounded::<String>(1);
            std::thread::spawn(move || {
                let _ = req_rx.recv();
                drop(resp_tx);
            });
            Ok(DelegateLink {
                requests: req_tx,
                responses: resp_rx,
            })
        }
    }

    fn dispatcher_with(delegate: Arc<dyn Delegate>) -> Dispatcher {
        Dispatcher::builder()
            .puzzle(puzzle())
            .context(delegating_context(3))
            .delegate(delegate)
            .build_validated()
            .unwrap()
    }

    #[test]
    fn inline_solve_resolves_with_verified_proof() {
        let dispatcher = Dispatcher::builder()
            .puzzle(puzzle())
            .context(Arc::new(SeededContext::new(1)))
            .build_validated()
            .unwrap();
        let mut handle = dispatcher.solve();
        assert!(!handle.is_delegated());
        assert_eq!(handle.state(), DispatchState::Idle);

        let solution = handle.wait().unwrap();
        assert_eq!(handle.state(), DispatchState::Resolved);
        assert_eq!(solution.digest.len(), 2);
        assert!(solution.proof.is_distinct());
        assert!(dispatcher.verify(&solution.proof));
        assert!(dispatcher.verify(&solution.encoded));
        assert_eq!(
            dispatcher.decode(&solution.encoded).unwrap().len(),
            2
        );
        assert!(matches!(handle.wait(), Err(Error::ChannelClosed)));
    }

    #[test]
    fn thread_delegate_result_is_verified_and_accepted() {
        let dispatcher = dispatcher_with(Arc::new(ThreadDelegate::new()));
        let mut handle = dispatcher.solve();
        assert!(handle.is_delegated());
        assert_eq!(handle.state(), DispatchState::AwaitingResult);

        let solution = handle.wait().unwrap();
        assert_eq!(handle.state(), DispatchState::Resolved);
        assert!(dispatcher.puzzle().verify(&solution.proof));
        assert_eq!(solution.encoded, dispatcher.encode(&solution.proof.nonces()));
        assert!(solution.draws.is_some());
    }

    #[test]
    fn bogus_delegated_proof_fails_verification() {
        let bogus = format!(
            r#"{{"digest":[48,48],"nonces":[{a:?},{a:?}],"encoded":""}}"#,
            a = vec![5u8; 32]
        );
        let mut handle = dispatcher_with(Arc::new(CannedDelegate(bogus))).solve();
        let err = handle.wait().unwrap_err();
        assert_eq!(
            err,
            Error::VerificationFailed(VerifyError::DuplicateNonce)
        );
        assert_eq!(handle.state(), DispatchState::Failed);
    }

    #[test]
    fn lying_digest_is_rejected() {
        let ctx = SeededContext::new(21);
        let reply = handle_request(
            &wire::encode_request(puzzle().params()).unwrap(),
            &ctx,
            &Base64Segments,
        );
        let DelegateResponse::Solved(mut solved) = wire::decode_response(&reply).unwrap() else {
            panic!("expected solved response");
        };
        solved.digest = b"zz".to_vec().into();
        let tampered = wire::encode_response(&DelegateResponse::Solved(solved)).unwrap();

        let mut handle = dispatcher_with(Arc::new(CannedDelegate(tampered))).solve();
        assert_eq!(
            handle.wait().unwrap_err(),
            Error::VerificationFailed(VerifyError::DigestDisagrees)
        );
    }

    #[test]
    fn mismatched_encoded_field_is_a_protocol_error() {
        let ctx = SeededContext::new(22);
        let reply = handle_request(
            &wire::encode_request(puzzle().params()).unwrap(),
            &ctx,
            &Base64Segments,
        );
        let DelegateResponse::Solved(mut solved) = wire::decode_response(&reply).unwrap() else {
            panic!("expected solved response");
        };
        solved.encoded = codec::encode(&[[0u8; 32], [1u8; 32]]);
        let tampered = wire::encode_response(&DelegateResponse::Solved(solved)).unwrap();

        let mut handle = dispatcher_with(Arc::new(CannedDelegate(tampered))).solve();
        assert!(matches!(handle.wait(), Err(Error::DelegateProtocol(_))));
    }

    #[test]
    fn unreachable_delegate_falls_back_to_inline() {
        let dispatcher = dispatcher_with(Arc::new(Unreachable));
        let mut handle = dispatcher.solve();
        assert!(!handle.is_delegated());
        assert_eq!(handle.state(), DispatchState::Idle);
        let solution = handle.wait().unwrap();
        assert!(dispatcher.verify(&solution.proof));
    }

    #[test]
    fn silent_delegate_is_a_protocol_error() {
        let mut handle = dispatcher_with(Arc::new(Silent)).solve();
        assert!(matches!(handle.wait(), Err(Error::DelegateProtocol(_))));
        assert_eq!(handle.state(), DispatchState::Failed);
    }

    #[test]
    fn reported_failure_is_distinct_from_bad_proof() {
        let canned = CannedDelegate(r#"{"error":"out of memory"}"#.into());
        let mut handle = dispatcher_with(Arc::new(canned)).solve();
        assert_eq!(
            handle.wait().unwrap_err(),
            Error::DelegateFailed("out of memory".into())
        );
        assert_eq!(handle.state(), DispatchState::Failed);
    }

    #[test]
    fn context_without_delegation_never_connects() {
        let dispatcher = Dispatcher::builder()
            .puzzle(puzzle())
            .context(Arc::new(SeededContext::new(4)))
            .delegate(Arc::new(Unreachable) as Arc<dyn Delegate>)
            .build_validated()
            .unwrap();
        let mut handle = dispatcher.solve();
        assert!(!handle.is_delegated());
        assert!(handle.wait().is_ok());
    }

    #[test]
    fn builder_requires_puzzle() {
        assert!(matches!(
            Dispatcher::builder().build_validated(),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn wait_async_resolves_delegated_solve() {
        let dispatcher = dispatcher_with(Arc::new(ThreadDelegate::new()));
        let mut handle = dispatcher.solve();
        let solution = tokio::time::timeout(Duration::from_secs(30), handle.wait_async())
            .await
            .expect("delegate answered in time")
            .unwrap();
        assert!(dispatcher.verify(&solution.proof));
    }

    #[tokio::test]
    async fn timeout_discards_a_stuck_delegate() {
        /// Keeps the response channel open and never answers.
        #[derive(Debug)]
        struct Stuck(std::sync::Mutex<Vec<(flume::Receiver<String>, flume::Sender<String>)>>);

        impl Delegate for Stuck {
            fn connect(&self) -> Result<DelegateLink, Error> {
                let (req_tx, req_rx) = flume::bounded(1);
                let (resp_tx, resp_rx) = flume::bounded(1);
                self.0.lock().unwrap().push((req_rx, resp_tx));
                Ok(DelegateLink {
                    requests: req_tx,
                    responses: resp_rx,
                })
            }
        }

        let dispatcher = dispatcher_with(Arc::new(Stuck(Default::default())));
        let mut handle = dispatcher.solve();
        let outcome =
            tokio::time::timeout(Duration::from_millis(50), handle.wait_async()).await;
        assert!(outcome.is_err());
        assert_eq!(handle.state(), DispatchState::AwaitingResult);
    }
}
