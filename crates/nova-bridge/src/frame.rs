//! Frame encoding and decoding.
//!
//! Header layout: FIN/opcode byte, then mask bit plus a 7-bit length that
//! extends to a 16-bit length on 126 and a 64-bit length on 127. Masked
//! frames carry a 4-byte key XORed over the payload.

use base64::Engine as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
    Reserved(u8),
}

impl From<u8> for Opcode {
    fn from(value: u8) -> Self {
        match value & 0x0F {
            0x0 => Opcode::Continuation,
            0x1 => Opcode::Text,
            0x2 => Opcode::Binary,
            0x8 => Opcode::Close,
            0x9 => Opcode::Ping,
            0xA => Opcode::Pong,
            other => Opcode::Reserved(other),
        }
    }
}

impl From<Opcode> for u8 {
    fn from(opcode: Opcode) -> Self {
        match opcode {
            Opcode::Continuation => 0x0,
            Opcode::Text => 0x1,
            Opcode::Binary => 0x2,
            Opcode::Close => 0x8,
            Opcode::Ping => 0x9,
            Opcode::Pong => 0xA,
            Opcode::Reserved(other) => other & 0x0F,
        }
    }
}

impl Opcode {
    /// Text and binary frames carry messages; everything else is control.
    pub fn is_data(&self) -> bool {
        matches!(self, Opcode::Text | Opcode::Binary)
    }
}

/// A parsed frame with its payload unmasked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub fin: bool,
    pub opcode: Opcode,
    pub payload: Vec<u8>,
}

/// Parse one frame from the front of `data`.
///
/// Returns the frame and the number of bytes it occupied, or `None` while
/// `data` holds less than a full frame. A 64-bit length honors only its low
/// 32 bits.
pub fn parse(data: &[u8]) -> Option<(Frame, usize)> {
    if data.len() < 2 {
        return None;
    }
    let fin = data[0] & 0x80 != 0;
    let opcode = Opcode::from(data[0]);
    let masked = data[1] & 0x80 != 0;

    let (payload_len, mut offset) = match data[1] & 0x7F {
        126 => {
            let bytes = data.get(2..4)?;
            (u16::from_be_bytes([bytes[0], bytes[1]]) as usize, 4)
        }
        127 => {
            let bytes = data.get(6..10)?;
            (
                u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize,
                10,
            )
        }
        len => (len as usize, 2),
    };

    let mask = if masked {
        let key = data.get(offset..offset + 4)?;
        offset += 4;
        Some([key[0], key[1], key[2], key[3]])
    } else {
        None
    };

    let end = offset.checked_add(payload_len)?;
    let mut payload = data.get(offset..end)?.to_vec();
    if let Some(key) = mask {
        apply_mask(&mut payload, key);
    }

    Some((
        Frame {
            fin,
            opcode,
            payload,
        },
        end,
    ))
}

/// Payload of a complete text or binary frame; `None` for anything else.
pub fn decode(data: &[u8]) -> Option<Vec<u8>> {
    let (frame, _) = parse(data)?;
    frame.opcode.is_data().then_some(frame.payload)
}

/// Unmasked, final text frame.
pub fn encode(payload: &[u8]) -> Vec<u8> {
    encode_frame(Opcode::Text, payload, None)
}

/// Final frame with the given opcode, masked when `mask` is set.
pub fn encode_frame(opcode: Opcode, payload: &[u8], mask: Option<[u8; 4]>) -> Vec<u8> {
    let len = payload.len();
    let mut frame = Vec::with_capacity(len + 14);
    frame.push(0x80 | u8::from(opcode));

    let mask_bit = if mask.is_some() { 0x80 } else { 0x00 };
    if len < 126 {
        frame.push(mask_bit | len as u8);
    } else if len < 65536 {
        frame.push(mask_bit | 126);
        frame.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        frame.push(mask_bit | 127);
        frame.extend_from_slice(&(len as u64).to_be_bytes());
    }

    match mask {
        Some(key) => {
            frame.extend_from_slice(&key);
            let start = frame.len();
            frame.extend_from_slice(payload);
            apply_mask(&mut frame[start..], key);
        }
        None => frame.extend_from_slice(payload),
    }
    frame
}

/// Encode raw bytes (a captured plugin UI frame, say) as base64 text.
pub fn encode_frame_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[inline]
fn apply_mask(payload: &mut [u8], key: [u8; 4]) {
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }
}
