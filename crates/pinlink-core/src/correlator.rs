use std::collections::HashMap;

use parking_lot::{Condvar, Mutex};
use pinlink_proto::ConfigResponse;

use crate::error::{CoreError, Result};

/// Matches asynchronous inbound responses to the caller thread
/// synchronously waiting for them, keyed by request ID.
///
/// Caller obligation: [`register`](Self::register) the request ID strictly
/// before handing the request to the transport. A response that arrives for
/// an unregistered ID is dropped, so registering late stalls that caller
/// until teardown.
pub struct RequestCorrelator {
    state: Mutex<CorrelatorState>,
    inserted: Condvar,
}

struct CorrelatorState {
    /// Awaited request IDs: `None` until the response is buffered.
    pending: HashMap<u16, Option<ConfigResponse>>,
    waiters: usize,
    destroyed: bool,
}

impl RequestCorrelator {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CorrelatorState {
                pending: HashMap::new(),
                waiters: 0,
                destroyed: false,
            }),
            inserted: Condvar::new(),
        }
    }

    /// Mark `request_id` as awaited. Must happen before the request reaches
    /// the transport; no response can be observed for an ID the correlator
    /// does not yet know to expect.
    pub fn register(&self, request_id: u16) {
        self.state.lock().pending.insert(request_id, None);
    }

    /// Withdraw interest in `request_id`, disposing a buffered response if
    /// one already arrived. For callers whose send failed after registering.
    pub fn cancel(&self, request_id: u16) {
        self.state.lock().pending.remove(&request_id);
    }

    /// Block until the response for `request_id` is buffered, remove the ID
    /// from the waiting set and return the payload.
    ///
    /// Returns [`CoreError::Disconnected`] when the correlator is torn down
    /// while waiting.
    pub fn wait_for_response(&self, request_id: u16) -> Result<ConfigResponse> {
        let mut state = self.state.lock();
        state.waiters += 1;

        let result = loop {
            if state.destroyed {
                break Err(CoreError::Disconnected);
            }
            if let Some(slot) = state.pending.get_mut(&request_id) {
                if let Some(response) = slot.take() {
                    break Ok(response);
                }
            }
            self.inserted.wait(&mut state);
        };

        state.pending.remove(&request_id);
        state.waiters -= 1;
        if state.waiters == 0 {
            // Let a concurrent clear() finish.
            self.inserted.notify_all();
        }

        result
    }

    /// Deliver an inbound response. Buffers and wakes all waiters when the
    /// ID is awaited (broadcast: several distinct IDs may be waited on at
    /// once, each waiter re-checks its own); otherwise the payload is
    /// dropped immediately so late responses never accumulate.
    pub fn put_response(&self, request_id: u16, response: ConfigResponse) {
        let mut state = self.state.lock();
        match state.pending.get_mut(&request_id) {
            Some(slot) if slot.is_none() => {
                *slot = Some(response);
                self.inserted.notify_all();
            }
            Some(_) => {
                tracing::warn!(request_id, "duplicate response for awaited request, dropping");
            }
            None => {
                tracing::debug!(request_id, "dropping unmatched response");
            }
        }
    }

    /// Tear down: dispose buffered responses and wake every blocked waiter,
    /// each of which returns [`CoreError::Disconnected`]. Once the waiters
    /// have drained out, the instance is reset for reuse.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.destroyed = true;
        state.pending.clear();
        self.inserted.notify_all();
        while state.waiters > 0 {
            self.inserted.wait(&mut state);
        }
        state.destroyed = false;
    }

    /// Number of awaited IDs (with or without a buffered response).
    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }
}

impl Default for RequestCorrelator {
    fn default() -> Self {
        Self::new()
    }
}
