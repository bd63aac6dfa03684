//! End-to-end scenarios over an in-memory link with an emulated peripheral.

use std::io;
use std::sync::mpsc;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use pinlink::{Device, DeviceConfig, Link, PortKind};
use pinlink_core::{
    Dispatcher, Port, PortRegistry, RequestCorrelator, Throttler,
};
use pinlink_proto::{
    config_action, decode_exact, encode_message, event_kind, kind, port_action, query_property,
    result_code, ConfigResponse, Message, PortEvent,
};

/// Outbound frames go into a channel the emulator thread drains.
struct LoopbackLink {
    outbound: mpsc::Sender<Vec<u8>>,
}

impl Link for LoopbackLink {
    fn send_frame(&self, frame: &[u8]) -> io::Result<()> {
        self.outbound
            .send(frame.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "peripheral gone"))
    }
}

fn encode(message: &Message) -> Vec<u8> {
    let mut buf = BytesMut::new();
    encode_message(message, &mut buf).unwrap();
    buf.to_vec()
}

/// Spawn a device plus a peripheral emulator that answers every request.
///
/// The emulator holds only a weak reference; it exits when the device is
/// dropped and the outbound channel closes with it.
fn device_with_emulator() -> Arc<Device<LoopbackLink>> {
    let (tx, rx) = mpsc::channel::<Vec<u8>>();
    let device = Arc::new(Device::with_config(
        LoopbackLink { outbound: tx },
        DeviceConfig::default(),
    ));

    let weak: Weak<Device<LoopbackLink>> = Arc::downgrade(&device);
    thread::spawn(move || {
        while let Ok(frame) = rx.recv() {
            let Some(device) = weak.upgrade() else { break };
            for reply in peripheral_replies(&frame) {
                device.handle_inbound(&reply).unwrap();
            }
        }
    });

    device
}

/// What the emulated peripheral sends back for one host frame.
fn peripheral_replies(frame: &[u8]) -> Vec<Vec<u8>> {
    match decode_exact(frame).unwrap() {
        Message::ConfigRequest(request) => {
            let value = if request.action == config_action::QUERY {
                match request.pin_config {
                    query_property::MEMORY_SIZE => 8192,
                    query_property::MAX_OUTSTANDING => 30,
                    _ => 0,
                }
            } else {
                0
            };
            vec![encode(&Message::ConfigResponse(ConfigResponse {
                channel_id: request.channel_id,
                request_id: request.request_id,
                result: result_code::OK,
                optional: 0,
                value,
            }))]
        }
        Message::PortRequest(request) => {
            let (event, value, data) = match request.action {
                port_action::SET_VALUE => (event_kind::NONE, 0, Bytes::new()),
                port_action::GET_VALUE => (event_kind::SINGLE_SAMPLE, 1, Bytes::new()),
                port_action::TX_DATA => (event_kind::TX_COMPLETE, 0, Bytes::new()),
                port_action::RX_DATA | port_action::TX_RX_DATA => (
                    event_kind::DATA_RECEIVED,
                    0,
                    Bytes::from(vec![0xA5; request.value as usize]),
                ),
                other => panic!("emulator got unknown port action {other}"),
            };
            vec![encode(&Message::PortEvent(PortEvent {
                channel_id: request.channel_id,
                request_id: request.request_id,
                event,
                event_attribute1: 0,
                event_attribute2: 0,
                value,
                data,
            }))]
        }
        other => panic!("emulator got unexpected message {other:?}"),
    }
}

fn wait_until_drained(device: &Device<LoopbackLink>) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while device.throttler().outstanding_count() != 0 {
        assert!(Instant::now() < deadline, "throttler never drained");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn configure_write_and_release_a_digital_output() {
    let device = device_with_emulator();

    let port_id = device.configure_digital_output(13, 0).unwrap();
    assert_eq!(device.registry().len(), 1);

    device.write_digital(port_id, true).unwrap();
    device.write_digital(port_id, false).unwrap();
    wait_until_drained(&device);

    device.release(port_id).unwrap();
    assert!(device.registry().is_empty());
    assert_eq!(device.throttler().occupied_bytes(), 0);
}

#[test]
fn on_demand_digital_read_does_a_round_trip() {
    let device = device_with_emulator();

    let port_id = device
        .configure_digital_input(7, 0, pinlink::InputCommunication::OnDemand)
        .unwrap();

    assert!(device.read_digital(port_id).unwrap());
    wait_until_drained(&device);
    assert_eq!(device.throttler().occupied_bytes(), 0);
}

#[test]
fn i2c_transactions_round_trip() {
    let device = device_with_emulator();

    let bus = device.configure_i2c_master(0, 100_000).unwrap();
    let port = device.registry().lookup(bus).unwrap();
    assert_eq!(port.kind(), PortKind::I2cBus);

    device.i2c_transmit(bus, 0x50, &[0x01, 0x02]).unwrap();

    let data = device.i2c_receive(bus, 0x50, 4).unwrap();
    assert_eq!(data.as_ref(), &[0xA5; 4]);

    let data = device.i2c_transmit_receive(bus, 0x50, &[0x10], 2).unwrap();
    assert_eq!(data.as_ref(), &[0xA5; 2]);

    wait_until_drained(&device);
}

#[test]
fn pwm_modules_and_output() {
    let device = device_with_emulator();

    device.configure_pwm_timer(0, 15_000, 0).unwrap();
    device.configure_pwm_channel(0, 2, 0).unwrap();
    let port_id = device.configure_pwm_output(3).unwrap();

    device.write_pwm(port_id, 16_384).unwrap();
    wait_until_drained(&device);
    assert_eq!(device.throttler().occupied_bytes(), 0);
}

#[test]
fn adopting_the_peripheral_flow_limits() {
    let device = device_with_emulator();

    assert_eq!(device.query(query_property::VERSION).unwrap(), 0);

    device.adopt_flow_limits().unwrap();
    assert_eq!(device.throttler().memory_size(), 8192);
    assert_eq!(device.throttler().max_outstanding(), 30);
}

#[test]
fn reset_releases_every_port() {
    let device = device_with_emulator();

    device.configure_digital_output(1, 0).unwrap();
    device.configure_analog_input(2).unwrap();
    assert_eq!(device.registry().len(), 2);

    device.reset().unwrap();
    assert!(device.registry().is_empty());
    assert_eq!(device.throttler().occupied_bytes(), 0);
    assert_eq!(device.throttler().outstanding_count(), 0);

    // The device is usable again after a reset.
    let port_id = device.configure_digital_output(4, 0).unwrap();
    device.write_digital(port_id, true).unwrap();
    wait_until_drained(&device);
}

// The two scenarios below pin the core contract without the façade: a
// delivery thread on one side, a caller on the other.

#[test]
fn core_config_roundtrip_releases_the_throttle() {
    let registry = Arc::new(PortRegistry::new());
    let correlator = Arc::new(RequestCorrelator::new());
    let throttler = Arc::new(Throttler::with_budgets(4200, 20));
    let dispatcher = Dispatcher::new(
        Arc::clone(&registry),
        Arc::clone(&correlator),
        Arc::clone(&throttler),
    );

    registry.add(Arc::new(Port::new(5, PortKind::DigitalOutput, 16)));

    throttler.wait_until_available(7, 50).unwrap();
    correlator.register(7);
    // The request is now "on the wire"; the peripheral answers.
    let response = Message::ConfigResponse(ConfigResponse {
        channel_id: 5,
        request_id: 7,
        result: result_code::OK,
        optional: 0,
        value: 0,
    });
    assert_eq!(response.kind_tag(), kind::CONFIG_RESPONSE);
    dispatcher.dispatch(&encode(&response)).unwrap();

    let received = correlator.wait_for_response(7).unwrap();
    assert_eq!(received.request_id, 7);
    assert_eq!(received.result, result_code::OK);

    throttler.request_completed(7);
    assert_eq!(throttler.occupied_bytes(), 0);
    assert_eq!(throttler.outstanding_count(), 0);
}

#[test]
fn core_queue_keeps_the_freshest_three_events() {
    let registry = Arc::new(PortRegistry::new());
    let correlator = Arc::new(RequestCorrelator::new());
    let throttler = Arc::new(Throttler::new());
    let dispatcher = Dispatcher::new(
        Arc::clone(&registry),
        Arc::clone(&correlator),
        Arc::clone(&throttler),
    );

    let port = Arc::new(Port::new(9, PortKind::AnalogInputSampling, 3));
    registry.add(Arc::clone(&port));

    for value in 1..=4u32 {
        let frame = encode(&Message::PortEvent(PortEvent {
            channel_id: 9,
            request_id: 0,
            event: event_kind::SINGLE_SAMPLE,
            event_attribute1: 0,
            event_attribute2: 0,
            value,
            data: Bytes::new(),
        }));
        dispatcher.dispatch(&frame).unwrap();
    }

    // Event 1 was evicted; 2, 3, 4 arrive in order.
    let values: Vec<u32> = (0..3).map(|_| port.wait_for_event().value).collect();
    assert_eq!(values, vec![2, 3, 4]);
    // The cache saw every sample.
    assert_eq!(port.last_sample(), 4);
}

#[test]
fn blocked_sender_fails_fast_on_teardown() {
    let device = device_with_emulator();

    // Exhaust the in-flight budget with requests nobody acknowledges.
    let throttler = device.throttler();
    throttler.configure_max_outstanding(1);
    throttler.wait_until_available(9999, 10).unwrap();

    let blocked = {
        let device = Arc::clone(&device);
        thread::spawn(move || device.configure_digital_output(5, 0))
    };

    thread::sleep(Duration::from_millis(30));
    device.close();

    let result = blocked.join().unwrap();
    assert!(result.is_err());
}

#[test]
fn config_exchange_uses_the_frozen_header_layout() {
    let device = device_with_emulator();
    let _ = device.configure_digital_output(2, 0).unwrap();

    // configure + release exercised the codec both ways; spot-check the
    // header shape on a hand-built frame.
    let mut buf = BytesMut::new();
    encode_message(
        &Message::ConfigResponse(ConfigResponse {
            channel_id: 0x0102,
            request_id: 0x0304,
            result: 0,
            optional: 0,
            value: 0,
        }),
        &mut buf,
    )
    .unwrap();

    assert_eq!(buf[0], 16); // total size, LE low byte
    assert_eq!(buf[1], 0);
    assert_eq!(buf[2], kind::CONFIG_RESPONSE);
    assert_eq!(buf[3], 0); // reserved
    assert_eq!(&buf[4..6], &[0x02, 0x01]); // channel id, LE
    assert_eq!(&buf[6..8], &[0x04, 0x03]); // request id, LE
}
