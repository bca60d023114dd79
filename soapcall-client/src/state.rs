//! Engine mode, the capture queue and the forced-response slot.
//!
//! All three live behind one mutex that is never held across an await. Mode
//! changes go through [`ModeGuard`] and the forced slot through [`ForcedGuard`],
//! both of which restore the idle state when dropped, including on early return
//! or panic.

use indexmap::IndexMap;
use soapcall_core::{LogicalCall, RequestId, SoapError};
use soapcall_transport::{PreparedRequest, RawResponse, TransportError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineMode {
    /// Calls run to completion one at a time.
    #[default]
    Idle,
    /// Calls are prepared and queued but not sent.
    Capturing,
    /// Queued requests are in flight and original calls are being replayed.
    Executing,
}

/// A captured call waiting for its network operation.
#[derive(Debug)]
pub(crate) struct QueueEntry {
    pub request: Arc<PreparedRequest>,
    pub call: LogicalCall,
    /// Index of the call in capture order.
    pub position: usize,
}

/// Everything a capture pass produced.
#[derive(Debug, Default)]
pub(crate) struct Capture {
    pub queue: IndexMap<RequestId, QueueEntry>,
    /// Calls that failed before they could be queued, with their positions.
    pub failed: Vec<(usize, SoapError)>,
    /// Number of calls issued, queued or failed.
    pub total: usize,
}

#[derive(Debug)]
struct ForcedResponse {
    request: Arc<PreparedRequest>,
    outcome: Option<Result<RawResponse, TransportError>>,
}

#[derive(Debug, Default)]
struct EngineState {
    mode: EngineMode,
    capture: Capture,
    forced: Option<ForcedResponse>,
}

#[derive(Debug, Default)]
pub(crate) struct Engine {
    state: Mutex<EngineState>,
}

impl Engine {
    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn mode(&self) -> EngineMode {
        self.lock().mode
    }

    /// Leave idle for `mode`; fails with [`SoapError::Nesting`] unless idle.
    pub fn enter(&self, mode: EngineMode) -> Result<ModeGuard<'_>, SoapError> {
        let mut state = self.lock();
        if state.mode != EngineMode::Idle {
            return Err(SoapError::Nesting);
        }
        state.mode = mode;
        state.capture = Capture::default();
        Ok(ModeGuard { engine: self })
    }

    /// Queue a captured call and return its position.
    pub fn enqueue(&self, request: Arc<PreparedRequest>, call: LogicalCall) -> usize {
        let mut state = self.lock();
        let position = state.capture.total;
        state.capture.total += 1;
        state.capture.queue.insert(
            request.id,
            QueueEntry {
                request,
                call,
                position,
            },
        );
        position
    }

    /// Reserve the next position for a call that failed before it was queued.
    pub fn enqueue_failed(&self, err: SoapError) -> usize {
        let mut state = self.lock();
        let position = state.capture.total;
        state.capture.total += 1;
        state.capture.failed.push((position, err));
        position
    }

    pub fn take_capture(&self) -> Capture {
        std::mem::take(&mut self.lock().capture)
    }

    /// Calls issued so far in the current capture pass.
    pub fn queued(&self) -> usize {
        self.lock().capture.total
    }

    /// Install the outcome the next replay of `request` must observe.
    pub fn force(
        &self,
        request: Arc<PreparedRequest>,
        outcome: Result<RawResponse, TransportError>,
    ) -> ForcedGuard<'_> {
        self.lock().forced = Some(ForcedResponse {
            request,
            outcome: Some(outcome),
        });
        ForcedGuard { engine: self }
    }

    pub fn forced_request(&self) -> Option<Arc<PreparedRequest>> {
        self.lock()
            .forced
            .as_ref()
            .map(|forced| Arc::clone(&forced.request))
    }

    /// Consume the forced outcome if it belongs to `id`.
    pub fn take_forced(&self, id: RequestId) -> Option<Result<RawResponse, TransportError>> {
        self.lock()
            .forced
            .as_mut()
            .filter(|forced| forced.request.id == id)
            .and_then(|forced| forced.outcome.take())
    }
}

#[derive(Debug)]
pub(crate) struct ModeGuard<'a> {
    engine: &'a Engine,
}

impl Drop for ModeGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.engine.lock();
        state.mode = EngineMode::Idle;
        state.capture = Capture::default();
    }
}

#[derive(Debug)]
pub(crate) struct ForcedGuard<'a> {
    engine: &'a Engine,
}

impl Drop for ForcedGuard<'_> {
    fn drop(&mut self) {
        self.engine.lock().forced = None;
    }
}
