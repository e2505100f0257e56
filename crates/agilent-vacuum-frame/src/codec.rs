use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::code::ResultCode;
use crate::error::{FrameError, Result};

/// Start of text.
pub const STX: u8 = 0x02;

/// End of text.
pub const ETX: u8 = 0x03;

/// The address byte is `0x80 + address`.
pub const ADDRESS_OFFSET: u8 = 0x80;

/// Highest RS-485 address. RS-232 links always use 0.
pub const MAX_ADDRESS: u8 = 31;

/// Windows are three ASCII digits.
pub const MAX_WINDOW: u16 = 999;

/// Width of the widest (alphanumeric) data field.
pub const MAX_PAYLOAD: usize = 10;

/// Smallest frame on the wire: `STX ADDR CODE ETX CRC CRC`.
pub const MIN_FRAME_LEN: usize = 6;

/// Largest frame on the wire.
pub const MAX_FRAME_LEN: usize = 9 + MAX_PAYLOAD;

const HEX: &[u8; 16] = b"0123456789ABCDEF";

/// Read or write flag of a window request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    Read,
    Write,
}

impl Access {
    pub fn as_byte(self) -> u8 {
        match self {
            Access::Read => b'0',
            Access::Write => b'1',
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'0' => Some(Access::Read),
            b'1' => Some(Access::Write),
            _ => None,
        }
    }
}

/// A window frame: requests, and data replies to reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub address: u8,
    pub window: u16,
    pub access: Access,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(address: u8, window: u16, access: Access, payload: impl Into<Bytes>) -> Self {
        Self {
            address,
            window,
            access,
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame.
    pub fn wire_size(&self) -> usize {
        9 + self.payload.len()
    }

    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        encode_frame(self.address, self.window, self.access, &self.payload, dst)
    }
}

/// Anything a controller can send back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Window data, the answer to a read.
    Data(Frame),
    /// A bare result code, the answer to a write or a refused request.
    Code { address: u8, code: ResultCode },
}

impl Reply {
    pub fn address(&self) -> u8 {
        match self {
            Reply::Data(frame) => frame.address,
            Reply::Code { address, .. } => *address,
        }
    }
}

/// XOR of all bytes. Applied to everything after STX up to and including ETX.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// Encode a window frame.
///
/// Wire format:
/// ```text
/// ┌──────┬────────────┬──────────┬────────────┬──────────┬──────┬──────────┐
/// │ STX  │ ADDR       │ WIN      │ COM        │ DATA     │ ETX  │ CRC      │
/// │ 0x02 │ 0x80+addr  │ 3 digits │ '0' / '1'  │ 0-10 B   │ 0x03 │ 2 hex    │
/// └──────┴────────────┴──────────┴────────────┴──────────┴──────┴──────────┘
/// ```
/// CRC is the XOR of ADDR through ETX as two uppercase hex digits.
pub fn encode_frame(
    address: u8,
    window: u16,
    access: Access,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<()> {
    if address > MAX_ADDRESS {
        return Err(FrameError::AddressOutOfRange(address));
    }
    if window > MAX_WINDOW {
        return Err(FrameError::WindowOutOfRange(window));
    }
    if payload.len() > MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD,
        });
    }
    if let Some(&byte) = payload.iter().find(|b| !is_printable(**b)) {
        return Err(FrameError::InvalidPayloadByte(byte));
    }

    let start = dst.len();
    dst.reserve(9 + payload.len());
    dst.put_u8(STX);
    dst.put_u8(ADDRESS_OFFSET + address);
    dst.put_slice(&window_digits(window));
    dst.put_u8(access.as_byte());
    dst.put_slice(payload);
    dst.put_u8(ETX);
    put_checksum(dst, start);
    Ok(())
}

/// Encode a short result-code reply, as sent by a controller.
pub fn encode_result(address: u8, code: ResultCode, dst: &mut BytesMut) -> Result<()> {
    if address > MAX_ADDRESS {
        return Err(FrameError::AddressOutOfRange(address));
    }
    let start = dst.len();
    dst.reserve(MIN_FRAME_LEN);
    dst.put_u8(STX);
    dst.put_u8(ADDRESS_OFFSET + address);
    dst.put_u8(code.as_byte());
    dst.put_u8(ETX);
    put_checksum(dst, start);
    Ok(())
}

/// Decode one frame that starts at `src[0]`.
///
/// Bytes after the checksum are ignored. A frame cut short anywhere before
/// its second checksum digit is rejected.
pub fn decode_frame(src: &[u8]) -> Result<Reply> {
    if src.len() < MIN_FRAME_LEN {
        return Err(FrameError::Truncated {
            len: src.len(),
            min: MIN_FRAME_LEN,
        });
    }
    if src[0] != STX {
        return Err(FrameError::MissingStart);
    }

    let end = find_etx(src).ok_or(FrameError::MissingEnd)?;
    if src.len() < end + 3 {
        return Err(FrameError::Truncated {
            len: src.len(),
            min: end + 3,
        });
    }

    let received = parse_checksum(src[end + 1], src[end + 2]).ok_or(FrameError::BadChecksumDigits)?;
    let computed = checksum(&src[1..=end]);
    if computed != received {
        return Err(FrameError::ChecksumMismatch { computed, received });
    }

    let address = src[1]
        .checked_sub(ADDRESS_OFFSET)
        .filter(|addr| *addr <= MAX_ADDRESS)
        .ok_or(FrameError::Malformed("address byte"))?;

    let body = &src[2..end];
    match body.len() {
        1 => {
            let code = ResultCode::from_byte(body[0]).ok_or(FrameError::Malformed("result code"))?;
            Ok(Reply::Code { address, code })
        }
        n if n >= 4 => {
            let window = parse_window(&body[..3]).ok_or(FrameError::Malformed("window field"))?;
            let access = Access::from_byte(body[3]).ok_or(FrameError::Malformed("command flag"))?;
            let payload = &body[4..];
            if payload.len() > MAX_PAYLOAD {
                return Err(FrameError::Malformed("data field too long"));
            }
            Ok(Reply::Data(Frame::new(
                address,
                window,
                access,
                Bytes::copy_from_slice(payload),
            )))
        }
        _ => Err(FrameError::Malformed("body length")),
    }
}

/// Splits a byte stream into controller replies.
///
/// Noise before STX is discarded. A corrupt frame is consumed and reported,
/// so the stream resynchronises on the next STX.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowCodec;

impl Decoder for WindowCodec {
    type Item = Reply;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Reply>> {
        match src.iter().position(|b| *b == STX) {
            Some(0) => {}
            Some(skip) => {
                tracing::trace!(skipped = skip, "discarding bytes before STX");
                src.advance(skip);
            }
            None => {
                src.clear();
                return Ok(None);
            }
        }

        let Some(end) = find_etx(src) else {
            if src.len() >= MAX_FRAME_LEN {
                src.advance(1);
                return Err(FrameError::MissingEnd);
            }
            return Ok(None);
        };
        if src.len() < end + 3 {
            return Ok(None);
        }

        let unit = src.split_to(end + 3);
        decode_frame(&unit).map(Some)
    }
}

impl Encoder<&Frame> for WindowCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: &Frame, dst: &mut BytesMut) -> Result<()> {
        frame.encode(dst)
    }
}

fn find_etx(src: &[u8]) -> Option<usize> {
    src.iter().skip(2).position(|b| *b == ETX).map(|pos| pos + 2)
}

fn is_printable(byte: u8) -> bool {
    (0x20..=0x7E).contains(&byte)
}

fn window_digits(window: u16) -> [u8; 3] {
    [
        b'0' + (window / 100) as u8,
        b'0' + (window / 10 % 10) as u8,
        b'0' + (window % 10) as u8,
    ]
}

fn parse_window(digits: &[u8]) -> Option<u16> {
    digits.iter().try_fold(0u16, |acc, b| {
        b.is_ascii_digit().then(|| acc * 10 + u16::from(b - b'0'))
    })
}

fn put_checksum(dst: &mut BytesMut, start: usize) {
    let crc = checksum(&dst[start + 1..]);
    dst.put_u8(HEX[usize::from(crc >> 4)]);
    dst.put_u8(HEX[usize::from(crc & 0x0F)]);
}

fn parse_checksum(high: u8, low: u8) -> Option<u8> {
    Some(hex_value(high)? << 4 | hex_value(low)?)
}

fn hex_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        _ => None,
    }
}
