use std::sync::atomic::{AtomicU16, Ordering};

use pinlink_proto::PortEvent;

use crate::queue::EventQueue;

/// Host-side view of what a configured channel does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    DigitalOutput,
    DigitalInputOnDemand,
    DigitalInputPrecached,
    DigitalInputTriggering,
    AnalogInputOnDemand,
    AnalogInputSampling,
    PwmOutput,
    I2cBus,
}

impl PortKind {
    /// Kinds whose latest value is pushed by the peripheral and cached
    /// host-side; reads answer from the cache without a round trip.
    pub fn is_cached(self) -> bool {
        matches!(
            self,
            PortKind::DigitalInputPrecached
                | PortKind::DigitalInputTriggering
                | PortKind::AnalogInputSampling
        )
    }
}

/// State for one logical communication channel.
///
/// The cached sample is a plain synchronized field, not queued; callers
/// needing the absolute latest on-demand value issue a get-value request
/// instead. Buffered events are dropped with the port.
pub struct Port {
    id: u16,
    kind: PortKind,
    last_sample: AtomicU16,
    events: EventQueue<PortEvent>,
}

impl Port {
    /// Create a port with an event queue of the given capacity.
    pub fn new(id: u16, kind: PortKind, queue_capacity: usize) -> Self {
        Self {
            id,
            kind,
            last_sample: AtomicU16::new(0),
            events: EventQueue::new(queue_capacity),
        }
    }

    /// Channel identity, unique while the port is open.
    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn kind(&self) -> PortKind {
        self.kind
    }

    /// Most recent sample pushed by the peripheral (0 until the first one).
    pub fn last_sample(&self) -> u16 {
        self.last_sample.load(Ordering::Acquire)
    }

    pub fn set_last_sample(&self, sample: u16) {
        self.last_sample.store(sample, Ordering::Release);
    }

    /// Buffer an inbound event, evicting the oldest one when full.
    pub fn push_event(&self, event: PortEvent) {
        self.events.put(event);
    }

    /// Block until an event is buffered, then return the oldest one.
    pub fn wait_for_event(&self) -> PortEvent {
        self.events.wait_for_next()
    }

    /// Number of buffered events.
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }
}
