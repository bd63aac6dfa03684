use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{ProtoError, Result};
use crate::message::{self, kind, Message, HEADER_SIZE};

/// Encode a message into the wire format.
///
/// Wire format (all integers little-endian):
/// ```text
/// ┌────────────┬──────────┬──────────┬────────────┬────────────┬──────────────┐
/// │ Total size │ Kind tag │ Reserved │ Channel ID │ Request ID │ Variant body │
/// │ (2B)       │ (1B)     │ (1B)     │ (2B)       │ (2B)       │ (+ trailer)  │
/// └────────────┴──────────┴──────────┴────────────┴────────────┴──────────────┘
/// ```
/// The declared total size always equals the variant's fixed portion plus
/// the trailing data length.
pub fn encode_message(msg: &Message, dst: &mut BytesMut) -> Result<()> {
    let total = msg.wire_size();
    if total > u16::MAX as usize {
        return Err(ProtoError::DataTooLarge {
            size: total - message::fixed_size(msg.kind_tag()),
            max: u16::MAX as usize - message::fixed_size(msg.kind_tag()),
        });
    }

    dst.reserve(total);
    dst.put_u16_le(total as u16);
    dst.put_u8(msg.kind_tag());
    dst.put_u8(0); // reserved
    dst.put_u16_le(msg.channel_id());
    dst.put_u16_le(msg.request_id());

    match msg {
        Message::ConfigRequest(m) => {
            dst.put_u8(m.action);
            dst.put_u8(m.channel_kind);
            dst.put_u16_le(m.pin_config);
            dst.put_u32_le(m.value);
            dst.put_u16_le(m.attribute1);
            dst.put_u16_le(m.attribute2);
        }
        Message::ConfigResponse(m) => {
            dst.put_u16_le(m.result);
            dst.put_u16_le(m.optional);
            dst.put_u32_le(m.value);
        }
        Message::PortRequest(m) => {
            dst.put_u8(m.action);
            dst.put_u8(m.action_attribute1);
            dst.put_u16_le(m.action_attribute2);
            dst.put_u32_le(m.value);
            dst.put_slice(&m.data);
        }
        Message::PortEvent(m) => {
            dst.put_u8(m.event);
            dst.put_u8(m.event_attribute1);
            dst.put_u16_le(m.event_attribute2);
            dst.put_u32_le(m.value);
            dst.put_slice(&m.data);
        }
        Message::Unknown(m) => {
            dst.put_slice(&m.body);
        }
    }

    Ok(())
}

/// Decode one message from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_message(src: &mut BytesMut) -> Result<Option<Message>> {
    if src.len() < HEADER_SIZE {
        return Ok(None); // Need more data
    }

    let declared = u16::from_le_bytes(src[0..2].try_into().unwrap()) as usize;
    let kind_tag = src[2];
    let minimum = message::fixed_size(kind_tag);

    if declared < minimum {
        return Err(ProtoError::MalformedFrame {
            kind_tag,
            declared,
            minimum,
        });
    }

    if src.len() < declared {
        return Ok(None); // Need more data
    }

    let frame = src.split_to(declared).freeze();
    Ok(Some(parse_frame(frame)))
}

/// Decode a buffer holding exactly one complete frame.
///
/// Used by delivery loops whose transport already hands over whole frames;
/// a short buffer or trailing garbage is a length mismatch.
pub fn decode_exact(buf: &[u8]) -> Result<Message> {
    let mut src = BytesMut::from(buf);
    let declared = if buf.len() >= 2 {
        u16::from_le_bytes(buf[0..2].try_into().unwrap()) as usize
    } else {
        HEADER_SIZE
    };

    match decode_message(&mut src)? {
        Some(msg) if src.is_empty() => Ok(msg),
        _ => Err(ProtoError::LengthMismatch {
            declared,
            actual: buf.len(),
        }),
    }
}

// Caller guarantees `frame.len()` equals the declared size and is at least
// the fixed portion for the kind tag.
fn parse_frame(frame: Bytes) -> Message {
    let kind_tag = frame[2];
    let channel_id = u16::from_le_bytes(frame[4..6].try_into().unwrap());
    let request_id = u16::from_le_bytes(frame[6..8].try_into().unwrap());

    match kind_tag {
        kind::CONFIG_REQUEST => Message::ConfigRequest(message::ConfigRequest {
            channel_id,
            request_id,
            action: frame[8],
            channel_kind: frame[9],
            pin_config: u16::from_le_bytes(frame[10..12].try_into().unwrap()),
            value: u32::from_le_bytes(frame[12..16].try_into().unwrap()),
            attribute1: u16::from_le_bytes(frame[16..18].try_into().unwrap()),
            attribute2: u16::from_le_bytes(frame[18..20].try_into().unwrap()),
        }),
        kind::CONFIG_RESPONSE => Message::ConfigResponse(message::ConfigResponse {
            channel_id,
            request_id,
            result: u16::from_le_bytes(frame[8..10].try_into().unwrap()),
            optional: u16::from_le_bytes(frame[10..12].try_into().unwrap()),
            value: u32::from_le_bytes(frame[12..16].try_into().unwrap()),
        }),
        kind::PORT_REQUEST => Message::PortRequest(message::PortRequest {
            channel_id,
            request_id,
            action: frame[8],
            action_attribute1: frame[9],
            action_attribute2: u16::from_le_bytes(frame[10..12].try_into().unwrap()),
            value: u32::from_le_bytes(frame[12..16].try_into().unwrap()),
            data: frame.slice(message::PORT_REQUEST_FIXED_SIZE..),
        }),
        kind::PORT_EVENT => Message::PortEvent(message::PortEvent {
            channel_id,
            request_id,
            event: frame[8],
            event_attribute1: frame[9],
            event_attribute2: u16::from_le_bytes(frame[10..12].try_into().unwrap()),
            value: u32::from_le_bytes(frame[12..16].try_into().unwrap()),
            data: frame.slice(message::PORT_EVENT_FIXED_SIZE..),
        }),
        _ => Message::Unknown(message::UnknownFrame {
            kind_tag,
            channel_id,
            request_id,
            body: frame.slice(HEADER_SIZE..),
        }),
    }
}
