use std::collections::HashMap;

use parking_lot::{Condvar, Mutex};

use crate::error::{CoreError, Result};

/// Default peripheral buffer memory believed available, in bytes.
pub const DEFAULT_MEMORY_SIZE: usize = 4200;

/// Default maximum number of simultaneously in-flight requests.
pub const DEFAULT_MAX_OUTSTANDING: usize = 20;

/// Fixed per-message bookkeeping the peripheral reserves on top of the
/// frame itself. Callers must add it to the size they pass to
/// [`Throttler::wait_until_available`].
pub const MESSAGE_OVERHEAD: usize = 8;

/// Admission gate bounding the peripheral's buffer memory and its in-flight
/// request budget at the same time.
///
/// Senders reserve before handing a request to the transport and the
/// reservation is released when the request completes; both counters are
/// backed by a ledger keyed by request ID so releases restore exactly what
/// was reserved.
pub struct Throttler {
    state: Mutex<ThrottleState>,
    available: Condvar,
}

struct ThrottleState {
    memory_size: usize,
    occupied: usize,
    max_outstanding: usize,
    outstanding: usize,
    reservations: HashMap<u16, usize>,
    waiters: usize,
    destroyed: bool,
}

impl Throttler {
    /// Create a throttler with the default budgets.
    pub fn new() -> Self {
        Self::with_budgets(DEFAULT_MEMORY_SIZE, DEFAULT_MAX_OUTSTANDING)
    }

    /// Create a throttler with explicit budgets.
    pub fn with_budgets(memory_size: usize, max_outstanding: usize) -> Self {
        Self {
            state: Mutex::new(ThrottleState {
                memory_size,
                occupied: 0,
                max_outstanding,
                outstanding: 0,
                reservations: HashMap::new(),
                waiters: 0,
                destroyed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// The configured memory budget in bytes.
    pub fn memory_size(&self) -> usize {
        self.state.lock().memory_size
    }

    /// Update the memory budget; a larger budget wakes all waiters.
    pub fn configure_memory_size(&self, size: usize) {
        let mut state = self.state.lock();
        let old = state.memory_size;
        state.memory_size = size;
        if size > old {
            self.available.notify_all();
        }
    }

    /// The configured in-flight request budget.
    pub fn max_outstanding(&self) -> usize {
        self.state.lock().max_outstanding
    }

    /// Update the in-flight budget; a larger budget wakes all waiters.
    pub fn configure_max_outstanding(&self, max: usize) {
        let mut state = self.state.lock();
        let old = state.max_outstanding;
        state.max_outstanding = max;
        if max > old {
            self.available.notify_all();
        }
    }

    /// Bytes currently believed occupied on the peripheral.
    pub fn occupied_bytes(&self) -> usize {
        self.state.lock().occupied
    }

    /// Requests currently in flight.
    pub fn outstanding_count(&self) -> usize {
        self.state.lock().outstanding
    }

    /// Block until `size` bytes fit in the memory budget and an in-flight
    /// slot is free, then reserve both under `request_id`.
    ///
    /// `size` must include [`MESSAGE_OVERHEAD`]. Returns
    /// [`CoreError::Disconnected`] when the throttler is torn down while
    /// waiting; no reservation is made in that case.
    pub fn wait_until_available(&self, request_id: u16, size: usize) -> Result<()> {
        let mut state = self.state.lock();
        state.waiters += 1;

        let result = loop {
            if state.destroyed {
                break Err(CoreError::Disconnected);
            }
            if state.occupied + size <= state.memory_size
                && state.outstanding < state.max_outstanding
            {
                state.occupied += size;
                state.outstanding += 1;
                state.reservations.insert(request_id, size);
                break Ok(());
            }
            self.available.wait(&mut state);
        };

        state.waiters -= 1;
        if state.waiters == 0 {
            // Let a concurrent clear() finish.
            self.available.notify_all();
        }

        result
    }

    /// Release the reservation recorded under `request_id` and wake all
    /// waiters (broadcast: the freed capacity may satisfy a waiter whose
    /// required size differs from the others).
    pub fn request_completed(&self, request_id: u16) {
        let mut state = self.state.lock();
        if let Some(size) = state.reservations.remove(&request_id) {
            state.occupied -= size;
            state.outstanding -= 1;
            self.available.notify_all();
        } else {
            tracing::debug!(request_id, "completion for unknown request, ignoring");
        }
    }

    /// Tear down: wake every blocked sender, each of which returns without
    /// reserving. The ledger and counters are then reset, leaving the
    /// instance ready for a newly (re)connected device.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.destroyed = true;
        self.available.notify_all();
        while state.waiters > 0 {
            self.available.wait(&mut state);
        }
        state.reservations.clear();
        state.occupied = 0;
        state.outstanding = 0;
        state.destroyed = false;
    }
}

impl Default for Throttler {
    fn default() -> Self {
        Self::new()
    }
}
