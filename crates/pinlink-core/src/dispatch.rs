use std::sync::Arc;

use pinlink_proto::{decode_exact, event_kind, Message};

use crate::correlator::RequestCorrelator;
use crate::error::{CoreError, Result};
use crate::registry::PortRegistry;
use crate::throttler::Throttler;

/// Where an inbound frame ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// A configuration response was handed to the correlator.
    Response,
    /// A port event was queued on its destination port.
    Event,
    /// A bare acknowledgement released its reservation and was dropped.
    Ack,
    /// The destination port is not registered; the event was dropped.
    UnknownPort,
    /// A frame with an unrecognized kind tag was dropped.
    UnknownKind,
}

/// Routes inbound frames, one at a time in transport arrival order.
///
/// The transport's delivery thread calls [`dispatch`](Self::dispatch) for
/// every received frame. Exactly one path handles each frame: responses go
/// to the correlator, events go to their port's queue. A port event whose
/// request ID is non-zero additionally completes that request's throttle
/// reservation before being queued.
pub struct Dispatcher {
    registry: Arc<PortRegistry>,
    correlator: Arc<RequestCorrelator>,
    throttler: Arc<Throttler>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<PortRegistry>,
        correlator: Arc<RequestCorrelator>,
        throttler: Arc<Throttler>,
    ) -> Self {
        Self {
            registry,
            correlator,
            throttler,
        }
    }

    /// Decode and route one inbound frame.
    ///
    /// Malformed frames are rejected here and never reach the correlator or
    /// a port; the error is returned for logging and the delivery thread
    /// carries on with the next frame.
    pub fn dispatch(&self, frame: &[u8]) -> Result<Delivery> {
        let message = match decode_exact(frame) {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(error = %err, "rejecting malformed inbound frame");
                return Err(err.into());
            }
        };
        self.dispatch_message(message)
    }

    /// Route an already-decoded message.
    pub fn dispatch_message(&self, message: Message) -> Result<Delivery> {
        match message {
            Message::ConfigResponse(response) => {
                self.correlator.put_response(response.request_id, response);
                Ok(Delivery::Response)
            }
            Message::PortEvent(event) => {
                if event.request_id != 0 {
                    self.throttler.request_completed(event.request_id);
                }
                if event.event == event_kind::NONE {
                    // Bare ack; nothing for a consumer to retrieve.
                    return Ok(Delivery::Ack);
                }
                match self.registry.lookup(event.channel_id) {
                    Some(port) => {
                        if event.event == event_kind::SINGLE_SAMPLE && port.kind().is_cached() {
                            port.set_last_sample(event.value as u16);
                        }
                        port.push_event(event);
                        Ok(Delivery::Event)
                    }
                    None => {
                        tracing::debug!(
                            channel_id = event.channel_id,
                            "event for unknown port, dropping"
                        );
                        Ok(Delivery::UnknownPort)
                    }
                }
            }
            Message::Unknown(frame) => {
                tracing::debug!(kind_tag = frame.kind_tag, "unknown message kind, dropping");
                Ok(Delivery::UnknownKind)
            }
            Message::ConfigRequest(_) | Message::PortRequest(_) => {
                let kind_tag = message.kind_tag();
                tracing::warn!(kind_tag, "request frame on the inbound path");
                Err(CoreError::UnexpectedInbound { kind_tag })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::{Bytes, BytesMut};
    use pinlink_proto::{
        config_action, encode_message, port_action, ConfigRequest, ConfigResponse, PortEvent,
    };

    use super::*;
    use crate::port::{Port, PortKind};

    fn fixture() -> (Arc<PortRegistry>, Arc<RequestCorrelator>, Arc<Throttler>, Dispatcher) {
        let registry = Arc::new(PortRegistry::new());
        let correlator = Arc::new(RequestCorrelator::new());
        let throttler = Arc::new(Throttler::new());
        let dispatcher = Dispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&correlator),
            Arc::clone(&throttler),
        );
        (registry, correlator, throttler, dispatcher)
    }

    fn encode(message: &Message) -> BytesMut {
        let mut buf = BytesMut::new();
        encode_message(message, &mut buf).unwrap();
        buf
    }

    fn event(channel_id: u16, request_id: u16, kind: u8, value: u32) -> Message {
        Message::PortEvent(PortEvent {
            channel_id,
            request_id,
            event: kind,
            event_attribute1: 0,
            event_attribute2: 0,
            value,
            data: Bytes::new(),
        })
    }

    #[test]
    fn response_reaches_the_correlator() {
        let (_, correlator, _, dispatcher) = fixture();
        correlator.register(7);

        let frame = encode(&Message::ConfigResponse(ConfigResponse {
            channel_id: 5,
            request_id: 7,
            result: 0,
            optional: 0,
            value: 11,
        }));

        assert_eq!(dispatcher.dispatch(&frame).unwrap(), Delivery::Response);
        assert_eq!(correlator.wait_for_response(7).unwrap().value, 11);
    }

    #[test]
    fn event_is_queued_on_its_port() {
        let (registry, _, _, dispatcher) = fixture();
        let port = Arc::new(Port::new(9, PortKind::DigitalInputTriggering, 4));
        registry.add(Arc::clone(&port));

        let frame = encode(&event(9, 0, event_kind::SINGLE_SAMPLE, 1));
        assert_eq!(dispatcher.dispatch(&frame).unwrap(), Delivery::Event);

        assert_eq!(port.pending_events(), 1);
        assert_eq!(port.wait_for_event().value, 1);
        // Cached kind: the sample cache was updated before queueing.
        assert_eq!(port.last_sample(), 1);
    }

    #[test]
    fn event_ack_releases_the_reservation() {
        let (registry, _, throttler, dispatcher) = fixture();
        registry.add(Arc::new(Port::new(3, PortKind::I2cBus, 4)));
        throttler.wait_until_available(21, 64).unwrap();

        let frame = encode(&event(3, 21, event_kind::TX_COMPLETE, 0));
        assert_eq!(dispatcher.dispatch(&frame).unwrap(), Delivery::Event);

        assert_eq!(throttler.occupied_bytes(), 0);
        assert_eq!(throttler.outstanding_count(), 0);
    }

    #[test]
    fn bare_ack_is_not_queued() {
        let (registry, _, throttler, dispatcher) = fixture();
        let port = Arc::new(Port::new(4, PortKind::DigitalOutput, 4));
        registry.add(Arc::clone(&port));
        throttler.wait_until_available(5, 32).unwrap();

        let frame = encode(&event(4, 5, event_kind::NONE, 0));
        assert_eq!(dispatcher.dispatch(&frame).unwrap(), Delivery::Ack);

        assert_eq!(throttler.outstanding_count(), 0);
        assert_eq!(port.pending_events(), 0);
    }

    #[test]
    fn event_for_unknown_port_is_dropped() {
        let (_, _, _, dispatcher) = fixture();
        let frame = encode(&event(77, 0, event_kind::SINGLE_SAMPLE, 1));
        assert_eq!(dispatcher.dispatch(&frame).unwrap(), Delivery::UnknownPort);
    }

    #[test]
    fn malformed_frame_is_rejected() {
        let (_, correlator, _, dispatcher) = fixture();
        correlator.register(1);

        // Declares a size below the response's fixed portion.
        let mut frame = encode(&Message::ConfigResponse(ConfigResponse {
            channel_id: 1,
            request_id: 1,
            result: 0,
            optional: 0,
            value: 0,
        }));
        frame[0] = 8;
        frame[1] = 0;

        assert!(matches!(
            dispatcher.dispatch(&frame),
            Err(CoreError::Proto(_))
        ));
        // The correlator never saw it.
        assert_eq!(correlator.pending_len(), 1);
    }

    #[test]
    fn unknown_kind_is_dropped_not_fatal() {
        let (_, _, _, dispatcher) = fixture();
        let frame = encode(&Message::Unknown(pinlink_proto::UnknownFrame {
            kind_tag: 42,
            channel_id: 0,
            request_id: 0,
            body: Bytes::new(),
        }));
        assert_eq!(dispatcher.dispatch(&frame).unwrap(), Delivery::UnknownKind);
    }

    #[test]
    fn inbound_request_frames_are_errors() {
        let (_, _, _, dispatcher) = fixture();

        let config = encode(&Message::ConfigRequest(ConfigRequest {
            channel_id: 1,
            request_id: 1,
            action: config_action::CONFIGURE,
            channel_kind: pinlink_proto::channel_kind::DIGITAL_PIN,
            pin_config: 0,
            value: 0,
            attribute1: 0,
            attribute2: 0,
        }));
        assert!(matches!(
            dispatcher.dispatch(&config),
            Err(CoreError::UnexpectedInbound { kind_tag: 1 })
        ));

        let port_request = encode(&Message::PortRequest(pinlink_proto::PortRequest {
            channel_id: 1,
            request_id: 2,
            action: port_action::SET_VALUE,
            action_attribute1: 0,
            action_attribute2: 0,
            value: 1,
            data: Bytes::new(),
        }));
        assert!(matches!(
            dispatcher.dispatch(&port_request),
            Err(CoreError::UnexpectedInbound { kind_tag: 3 })
        ));
    }
}
