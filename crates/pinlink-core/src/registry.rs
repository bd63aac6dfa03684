use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::port::Port;

/// Thread-safe collection owning all open ports.
///
/// Registry mutations are rare compared to per-port event traffic, so one
/// registry-wide lock covers the port table and both ID counters.
pub struct PortRegistry {
    inner: Mutex<RegistryInner>,
}

struct RegistryInner {
    ports: HashMap<u16, Arc<Port>>,
    last_port_id: u16,
    last_request_id: u16,
}

impl PortRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                ports: HashMap::new(),
                last_port_id: 0,
                last_request_id: 0,
            }),
        }
    }

    /// Register a port under its channel ID.
    pub fn add(&self, port: Arc<Port>) {
        let mut inner = self.inner.lock();
        if inner.ports.insert(port.id(), port).is_some() {
            tracing::debug!("replaced an already-registered port");
        }
    }

    /// Remove and return the port for `port_id`, if registered.
    pub fn remove(&self, port_id: u16) -> Option<Arc<Port>> {
        self.inner.lock().ports.remove(&port_id)
    }

    /// Look up the port for `port_id`.
    pub fn lookup(&self, port_id: u16) -> Option<Arc<Port>> {
        self.inner.lock().ports.get(&port_id).cloned()
    }

    /// Allocate a channel ID for a port about to be configured.
    ///
    /// IDs increase monotonically and skip 0 (the "no port" marker) as well
    /// as IDs still registered after a wrap-around.
    pub fn next_port_id(&self) -> u16 {
        let mut inner = self.inner.lock();
        loop {
            inner.last_port_id = inner.last_port_id.wrapping_add(1);
            let candidate = inner.last_port_id;
            if candidate != 0 && !inner.ports.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    /// Allocate a correlation token for the next request/response exchange.
    ///
    /// Strictly increasing, wraps at the wire format's 16-bit width and
    /// skips 0 (the "not correlated" marker). Unique among concurrently
    /// outstanding requests as long as fewer than 65535 are in flight.
    pub fn next_request_id(&self) -> u16 {
        let mut inner = self.inner.lock();
        inner.last_request_id = inner.last_request_id.wrapping_add(1);
        if inner.last_request_id == 0 {
            inner.last_request_id = 1;
        }
        inner.last_request_id
    }

    /// Drop every owned port, used on device reset or disconnect.
    /// Buffered events go with their queues.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let dropped = inner.ports.len();
        inner.ports.clear();
        if dropped > 0 {
            tracing::debug!(ports = dropped, "registry cleared");
        }
    }

    /// Number of registered ports.
    pub fn len(&self) -> usize {
        self.inner.lock().ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().ports.is_empty()
    }
}

impl Default for PortRegistry {
    fn default() -> Self {
        Self::new()
    }
}
