use std::sync::Arc;

use bytes::{Bytes, BytesMut};

use pinlink_core::{
    Delivery, Dispatcher, Port, PortKind, PortRegistry, RequestCorrelator, Throttler,
    DEFAULT_MAX_OUTSTANDING, DEFAULT_MEMORY_SIZE, MESSAGE_OVERHEAD,
};
use pinlink_proto::{
    channel_kind, config_action, encode_message, event_kind, module_kind, port_action,
    result_code, ConfigRequest, ConfigResponse, Message, PortEvent, PortRequest,
};

use crate::error::{DeviceError, Result};
use crate::link::Link;
use crate::pins::{digital_mode, InputCommunication};

/// Default capacity of each port's inbound event queue.
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 16;

/// Configuration for a device instance.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Capacity of each port's event queue; older events are evicted when
    /// it overflows.
    pub event_queue_capacity: usize,
    /// Peripheral buffer memory budget in bytes.
    pub memory_size: usize,
    /// Maximum simultaneously in-flight requests.
    pub max_outstanding: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
            memory_size: DEFAULT_MEMORY_SIZE,
            max_outstanding: DEFAULT_MAX_OUTSTANDING,
        }
    }
}

/// One attached peripheral controller.
///
/// All methods take `&self`; the device is safe to share across caller
/// threads. The transport's read thread feeds every received frame to
/// [`handle_inbound`](Self::handle_inbound), one frame at a time, in
/// arrival order.
pub struct Device<L: Link> {
    link: L,
    registry: Arc<PortRegistry>,
    correlator: Arc<RequestCorrelator>,
    throttler: Arc<Throttler>,
    dispatcher: Dispatcher,
    event_queue_capacity: usize,
}

impl<L: Link> Device<L> {
    /// Create a device with default configuration.
    pub fn new(link: L) -> Self {
        Self::with_config(link, DeviceConfig::default())
    }

    /// Create a device with explicit configuration.
    pub fn with_config(link: L, config: DeviceConfig) -> Self {
        let registry = Arc::new(PortRegistry::new());
        let correlator = Arc::new(RequestCorrelator::new());
        let throttler = Arc::new(Throttler::with_budgets(
            config.memory_size,
            config.max_outstanding,
        ));
        let dispatcher = Dispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&correlator),
            Arc::clone(&throttler),
        );
        Self {
            link,
            registry,
            correlator,
            throttler,
            dispatcher,
            event_queue_capacity: config.event_queue_capacity,
        }
    }

    /// Deliver one inbound frame from the transport's read thread.
    pub fn handle_inbound(&self, frame: &[u8]) -> pinlink_core::Result<Delivery> {
        self.dispatcher.dispatch(frame)
    }

    /// The admission gate, for budget reconfiguration and observability.
    pub fn throttler(&self) -> &Throttler {
        &self.throttler
    }

    /// The port registry.
    pub fn registry(&self) -> &PortRegistry {
        &self.registry
    }

    // --- digital pins ---

    /// Configure a pin as a digital output. Returns the port ID.
    pub fn configure_digital_output(&self, pin: u16, attributes: u16) -> Result<u16> {
        self.configure_channel(
            channel_kind::DIGITAL_PIN,
            pin,
            digital_mode::OUTPUT,
            attributes,
            PortKind::DigitalOutput,
        )
    }

    /// Configure a pin as a digital input. Returns the port ID.
    ///
    /// On-demand inputs do a round trip per read; precached inputs are
    /// pushed by the peripheral and read from the host-side cache.
    pub fn configure_digital_input(
        &self,
        pin: u16,
        attributes: u16,
        communication: InputCommunication,
    ) -> Result<u16> {
        let (mode, kind) = match communication {
            InputCommunication::OnDemand => {
                (digital_mode::INPUT_ON_DEMAND, PortKind::DigitalInputOnDemand)
            }
            InputCommunication::Precached => {
                (digital_mode::INPUT_PRECACHED, PortKind::DigitalInputPrecached)
            }
        };
        self.configure_channel(channel_kind::DIGITAL_PIN, pin, mode, attributes, kind)
    }

    /// Configure a pin as a digital input that pushes an event on each
    /// signal edge selected in `attributes`. Returns the port ID.
    pub fn configure_digital_input_triggering(&self, pin: u16, attributes: u16) -> Result<u16> {
        self.configure_channel(
            channel_kind::DIGITAL_PIN,
            pin,
            digital_mode::INPUT_TRIGGERING,
            attributes,
            PortKind::DigitalInputTriggering,
        )
    }

    /// Set a digital output. Fire-and-forget: returns as soon as the
    /// request is on the wire; the peripheral's acknowledgement releases
    /// the flow-control reservation later.
    pub fn write_digital(&self, port_id: u16, value: bool) -> Result<()> {
        let port = self.port(port_id)?;
        if port.kind() != PortKind::DigitalOutput {
            return Err(DeviceError::NotSupported { kind: port.kind() });
        }
        self.send_port_request(PortRequest {
            channel_id: port_id,
            request_id: 0,
            action: port_action::SET_VALUE,
            action_attribute1: 0,
            action_attribute2: 0,
            value: u32::from(value),
            data: Bytes::new(),
        })?;
        Ok(())
    }

    /// Read a digital input. Cached kinds answer from the last pushed
    /// sample; on-demand inputs do a get-value round trip.
    pub fn read_digital(&self, port_id: u16) -> Result<bool> {
        let port = self.port(port_id)?;
        match port.kind() {
            PortKind::DigitalInputPrecached | PortKind::DigitalInputTriggering => {
                Ok(port.last_sample() != 0)
            }
            PortKind::DigitalInputOnDemand => {
                let event = self.get_value_roundtrip(&port)?;
                Ok(event.value != 0)
            }
            kind => Err(DeviceError::NotSupported { kind }),
        }
    }

    // --- analog inputs ---

    /// Configure an analog input read on demand. Returns the port ID.
    pub fn configure_analog_input(&self, pin: u16) -> Result<u16> {
        self.configure_channel(
            channel_kind::ANALOG_IN,
            pin,
            0,
            0,
            PortKind::AnalogInputOnDemand,
        )
    }

    /// Configure an analog input sampled automatically every
    /// `interval_ms`. Each sample arrives as a port event and updates the
    /// cache. Returns the port ID.
    pub fn configure_analog_input_sampling(&self, pin: u16, interval_ms: u32) -> Result<u16> {
        self.configure_channel(
            channel_kind::ANALOG_IN,
            pin,
            interval_ms,
            0,
            PortKind::AnalogInputSampling,
        )
    }

    /// Read an analog input. Sampling inputs answer from the cache;
    /// on-demand inputs do a round trip including the conversion time.
    pub fn read_analog(&self, port_id: u16) -> Result<i16> {
        let port = self.port(port_id)?;
        match port.kind() {
            PortKind::AnalogInputSampling => Ok(port.last_sample() as i16),
            PortKind::AnalogInputOnDemand => {
                let event = self.get_value_roundtrip(&port)?;
                Ok(event.value as u16 as i16)
            }
            kind => Err(DeviceError::NotSupported { kind }),
        }
    }

    // --- PWM ---

    /// Configure a pin as a PWM output. Returns the port ID.
    pub fn configure_pwm_output(&self, pin: u16) -> Result<u16> {
        self.configure_channel(channel_kind::PWM, pin, 0, 0, PortKind::PwmOutput)
    }

    /// Configure a PWM timer shared by several outputs.
    pub fn configure_pwm_timer(&self, timer: u8, frequency: u32, attributes: u16) -> Result<()> {
        self.config_roundtrip(ConfigRequest {
            channel_id: 0,
            request_id: 0,
            action: config_action::CONFIGURE_MODULE,
            channel_kind: module_kind::PWM_TIMER,
            pin_config: u16::from(timer),
            value: frequency,
            attribute1: attributes,
            attribute2: 0,
        })
        .map(drop)
    }

    /// Configure one channel of a PWM timer.
    pub fn configure_pwm_channel(&self, timer: u8, channel: u8, attributes: u16) -> Result<()> {
        self.config_roundtrip(ConfigRequest {
            channel_id: 0,
            request_id: 0,
            action: config_action::CONFIGURE_MODULE,
            channel_kind: module_kind::PWM_CHANNEL,
            pin_config: u16::from(timer),
            value: 0,
            attribute1: u16::from(channel),
            attribute2: attributes,
        })
        .map(drop)
    }

    /// Set the duty cycle of a PWM output, 0 to 32767 for 0% to 100%.
    /// Fire-and-forget like digital writes.
    pub fn write_pwm(&self, port_id: u16, duty_cycle: i16) -> Result<()> {
        let port = self.port(port_id)?;
        if port.kind() != PortKind::PwmOutput {
            return Err(DeviceError::NotSupported { kind: port.kind() });
        }
        self.send_port_request(PortRequest {
            channel_id: port_id,
            request_id: 0,
            action: port_action::SET_VALUE,
            action_attribute1: 0,
            action_attribute2: 0,
            value: duty_cycle as u16 as u32,
            data: Bytes::new(),
        })?;
        Ok(())
    }

    // --- I2C ---

    /// Configure an I2C bus master. Returns the port ID.
    pub fn configure_i2c_master(&self, bus: u16, frequency: u32) -> Result<u16> {
        self.configure_channel(channel_kind::I2C, bus, frequency, 0, PortKind::I2cBus)
    }

    /// Transmit `data` to an I2C slave and wait for the completion event.
    pub fn i2c_transmit(&self, port_id: u16, slave: u16, data: &[u8]) -> Result<()> {
        let port = self.i2c_port(port_id)?;
        self.send_port_request(PortRequest {
            channel_id: port_id,
            request_id: 0,
            action: port_action::TX_DATA,
            action_attribute1: 0,
            action_attribute2: slave,
            value: 0,
            data: Bytes::copy_from_slice(data),
        })?;
        let event = port.wait_for_event();
        match event.event {
            event_kind::TX_COMPLETE => Ok(()),
            other => Err(DeviceError::UnexpectedEvent { event: other }),
        }
    }

    /// Request `len` bytes from an I2C slave and wait for the data.
    pub fn i2c_receive(&self, port_id: u16, slave: u16, len: u16) -> Result<Bytes> {
        let port = self.i2c_port(port_id)?;
        self.send_port_request(PortRequest {
            channel_id: port_id,
            request_id: 0,
            action: port_action::RX_DATA,
            action_attribute1: 0,
            action_attribute2: slave,
            value: u32::from(len),
            data: Bytes::new(),
        })?;
        self.expect_data(&port)
    }

    /// Transmit `data` to an I2C slave, then read `len` bytes back in the
    /// same transaction.
    pub fn i2c_transmit_receive(
        &self,
        port_id: u16,
        slave: u16,
        data: &[u8],
        len: u16,
    ) -> Result<Bytes> {
        let port = self.i2c_port(port_id)?;
        self.send_port_request(PortRequest {
            channel_id: port_id,
            request_id: 0,
            action: port_action::TX_RX_DATA,
            action_attribute1: 0,
            action_attribute2: slave,
            value: u32::from(len),
            data: Bytes::copy_from_slice(data),
        })?;
        self.expect_data(&port)
    }

    /// Query a peripheral property (see
    /// [`query_property`](pinlink_proto::query_property)).
    pub fn query(&self, property: u16) -> Result<u32> {
        let response = self.config_roundtrip(ConfigRequest {
            channel_id: 0,
            request_id: 0,
            action: config_action::QUERY,
            channel_kind: 0,
            pin_config: property,
            value: 0,
            attribute1: 0,
            attribute2: 0,
        })?;
        Ok(response.value)
    }

    /// Ask the peripheral for its real buffer and queue budgets and adopt
    /// them for flow control, replacing the conservative defaults.
    pub fn adopt_flow_limits(&self) -> Result<()> {
        let memory = self.query(pinlink_proto::query_property::MEMORY_SIZE)?;
        let outstanding = self.query(pinlink_proto::query_property::MAX_OUTSTANDING)?;
        self.throttler.configure_memory_size(memory as usize);
        self.throttler.configure_max_outstanding(outstanding as usize);
        Ok(())
    }

    // --- events and lifecycle ---

    /// Block until the next event for `port_id` arrives (edge-triggered
    /// inputs, automatic samples). One consumer per port.
    pub fn wait_for_event(&self, port_id: u16) -> Result<PortEvent> {
        Ok(self.port(port_id)?.wait_for_event())
    }

    /// Release a configured channel and drop its buffered events.
    pub fn release(&self, port_id: u16) -> Result<()> {
        let port = self.port(port_id)?;
        self.config_roundtrip(ConfigRequest {
            channel_id: port_id,
            request_id: 0,
            action: config_action::RELEASE,
            channel_kind: wire_kind(port.kind()),
            pin_config: 0,
            value: 0,
            attribute1: 0,
            attribute2: 0,
        })?;
        self.registry.remove(port_id);
        Ok(())
    }

    /// Reset the peripheral to its initial state, releasing every port.
    /// Concurrent blocked calls fail with a disconnect sentinel.
    pub fn reset(&self) -> Result<()> {
        self.config_roundtrip(ConfigRequest {
            channel_id: 0,
            request_id: 0,
            action: config_action::RESET,
            channel_kind: 0,
            pin_config: 0,
            value: 0,
            attribute1: 0,
            attribute2: 0,
        })?;
        tracing::debug!("device reset, clearing host state");
        self.registry.clear();
        self.correlator.clear();
        self.throttler.clear();
        Ok(())
    }

    /// Tear down host-side state after a disconnect. Every blocked call
    /// fails with a disconnect sentinel; no wire traffic is generated.
    pub fn close(&self) {
        tracing::debug!("closing device");
        self.correlator.clear();
        self.throttler.clear();
        self.registry.clear();
    }

    // --- internals ---

    fn port(&self, port_id: u16) -> Result<Arc<Port>> {
        self.registry
            .lookup(port_id)
            .ok_or(DeviceError::UnknownPort(port_id))
    }

    fn i2c_port(&self, port_id: u16) -> Result<Arc<Port>> {
        let port = self.port(port_id)?;
        if port.kind() != PortKind::I2cBus {
            return Err(DeviceError::NotSupported { kind: port.kind() });
        }
        Ok(port)
    }

    fn configure_channel(
        &self,
        wire_kind: u8,
        pin_config: u16,
        value: u32,
        attribute1: u16,
        port_kind: PortKind,
    ) -> Result<u16> {
        let port_id = self.registry.next_port_id();
        self.config_roundtrip(ConfigRequest {
            channel_id: port_id,
            request_id: 0,
            action: config_action::CONFIGURE,
            channel_kind: wire_kind,
            pin_config,
            value,
            attribute1,
            attribute2: 0,
        })?;
        self.registry.add(Arc::new(Port::new(
            port_id,
            port_kind,
            self.event_queue_capacity,
        )));
        Ok(port_id)
    }

    /// One configuration request/response exchange.
    ///
    /// Interest is registered with the correlator before the frame reaches
    /// the link; a response can therefore never race ahead of registration.
    fn config_roundtrip(&self, mut request: ConfigRequest) -> Result<ConfigResponse> {
        let request_id = self.registry.next_request_id();
        request.request_id = request_id;
        let message = Message::ConfigRequest(request);

        self.throttler
            .wait_until_available(request_id, message.wire_size() + MESSAGE_OVERHEAD)?;
        self.correlator.register(request_id);

        if let Err(err) = self.send_message(&message) {
            self.correlator.cancel(request_id);
            self.throttler.request_completed(request_id);
            return Err(err);
        }

        let response = match self.correlator.wait_for_response(request_id) {
            Ok(response) => response,
            Err(err) => {
                self.throttler.request_completed(request_id);
                return Err(err.into());
            }
        };
        self.throttler.request_completed(request_id);

        if response.result != result_code::OK {
            return Err(DeviceError::RequestFailed {
                result: response.result,
            });
        }
        Ok(response)
    }

    /// Reserve, stamp a request ID and put a port request on the wire.
    ///
    /// The reservation is released when the peripheral acknowledges the
    /// request with an event carrying the same ID.
    fn send_port_request(&self, mut request: PortRequest) -> Result<u16> {
        let request_id = self.registry.next_request_id();
        request.request_id = request_id;
        let message = Message::PortRequest(request);

        self.throttler
            .wait_until_available(request_id, message.wire_size() + MESSAGE_OVERHEAD)?;

        if let Err(err) = self.send_message(&message) {
            self.throttler.request_completed(request_id);
            return Err(err);
        }
        Ok(request_id)
    }

    fn expect_data(&self, port: &Port) -> Result<Bytes> {
        let event = port.wait_for_event();
        match event.event {
            event_kind::DATA_RECEIVED => Ok(event.data),
            other => Err(DeviceError::UnexpectedEvent { event: other }),
        }
    }

    fn get_value_roundtrip(&self, port: &Port) -> Result<PortEvent> {
        self.send_port_request(PortRequest {
            channel_id: port.id(),
            request_id: 0,
            action: port_action::GET_VALUE,
            action_attribute1: 0,
            action_attribute2: 0,
            value: 0,
            data: Bytes::new(),
        })?;
        let event = port.wait_for_event();
        if event.event != event_kind::SINGLE_SAMPLE {
            return Err(DeviceError::UnexpectedEvent { event: event.event });
        }
        port.set_last_sample(event.value as u16);
        Ok(event)
    }

    fn send_message(&self, message: &Message) -> Result<()> {
        let mut buf = BytesMut::with_capacity(message.wire_size());
        encode_message(message, &mut buf)?;
        self.link.send_frame(&buf).map_err(DeviceError::Link)
    }
}

/// Wire channel kind for a host-side port kind.
fn wire_kind(kind: PortKind) -> u8 {
    match kind {
        PortKind::DigitalOutput
        | PortKind::DigitalInputOnDemand
        | PortKind::DigitalInputPrecached
        | PortKind::DigitalInputTriggering => channel_kind::DIGITAL_PIN,
        PortKind::AnalogInputOnDemand | PortKind::AnalogInputSampling => channel_kind::ANALOG_IN,
        PortKind::PwmOutput => channel_kind::PWM,
        PortKind::I2cBus => channel_kind::I2C,
    }
}
