//! Delegated execution: a parallel worker that runs the search for a dispatcher.
//!
//! Each request gets its own channel pair. The worker reads one request,
//! writes one terminal response and exits; no state outlives the request.
use crate::codec::{self, Base64Segments, SegmentCodec};
use crate::context::{ContextNonces, ExecutionContext, WorkerContext};
use crate::error::Error;
use crate::puzzle::Puzzle;
use crate::search::CollisionSearcher;
use crate::wire::{self, DelegateResponse, SolvedMessage};
use flume::{Receiver, Sender};
use std::fmt;
use std::sync::Arc;
use std::thread;
use tracing::{debug, warn};

/// Channel pair to one delegate, valid for a single request.
#[derive(Debug)]
pub struct DelegateLink {
    pub requests: Sender<String>,
    pub responses: Receiver<String>,
}

/// Something that can run a search in parallel with the caller.
pub trait Delegate: Send + Sync + fmt::Debug {
    /// Establish a fresh delegate for one request.
    ///
    /// Fails with [`Error::DelegateUnavailable`] when no parallel context can be set up.
    fn connect(&self) -> Result<DelegateLink, Error>;
}

/// Runs each request on a freshly spawned OS thread.
#[derive(Debug, Clone)]
pub struct ThreadDelegate {
    codec: Arc<dyn SegmentCodec>,
}

impl ThreadDelegate {
    pub fn new() -> Self {
        Self::with_codec(Arc::new(Base64Segments))
    }

    pub fn with_codec(codec: Arc<dyn SegmentCodec>) -> Self {
        Self { codec }
    }
}

impl Default for ThreadDelegate {
    fn default() -> Self {
        Self::new()
    }
}

impl Delegate for ThreadDelegate {
    fn connect(&self) -> Result<DelegateLink, Error> {
        let (req_tx, req_rx) = flume::bounded::<String>(1);
        let (resp_tx, resp_rx) = flume::bounded::<String>(1);
        let codec = self.codec.clone();
        thread::Builder::new()
            .name("hardlock-delegate".into())
            .spawn(move || worker_loop(req_rx, resp_tx, codec))
            .map_err(|e| Error::DelegateUnavailable(e.to_string()))?;
        Ok(DelegateLink {
            requests: req_tx,
            responses: resp_rx,
        })
    }
}

fn worker_loop(requests: Receiver<String>, responses: Sender<String>, codec: Arc<dyn SegmentCodec>) {
    let Ok(message) = requests.recv() else {
        debug!("dispatcher dropped before sending a request");
        return;
    };
    let reply = handle_request(&message, &WorkerContext, codec.as_ref());
    if responses.send(reply).is_err() {
        debug!("dispatcher dropped before the response arrived");
    }
}

/// Worker side of the protocol: answer one request message with one response message.
///
/// The search always runs here, in `context`; a worker never delegates further.
pub fn handle_request(
    message: &str,
    context: &dyn ExecutionContext,
    codec: &dyn SegmentCodec,
) -> String {
    let response = match solve_request(message, context, codec) {
        Ok(solved) => DelegateResponse::Solved(solved),
        Err(err) => {
            warn!(error = %err, "delegate request failed");
            DelegateResponse::Failed {
                error: err.to_string(),
            }
        }
    };
    wire::encode_response(&response)
        .unwrap_or_else(|err| serde_json::json!({ "error": err.to_string() }).to_string())
}

fn solve_request(
    message: &str,
    context: &dyn ExecutionContext,
    codec: &dyn SegmentCodec,
) -> Result<SolvedMessage, Error> {
    let params = wire::decode_request(message)?;
    let puzzle = Puzzle::from_params(params)?;
    debug!(
        difficulty = puzzle.difficulty(),
        backend = ?puzzle.backend(),
        "delegate searching"
    );
    let collision = CollisionSearcher::new(&puzzle).search(&mut ContextNonces::new(context));
    let encoded = codec::encode_with(codec, &collision.proof.nonces());
    Ok(SolvedMessage::from_collision(&collision, encoded))
}
