//! Agilent window protocol framing.
//!
//! Every request and reply is framed as:
//! - STX (0x02) to mark the start of a frame
//! - an address byte (`0x80 + address`)
//! - a three digit window number and a read/write flag, or a one byte result code
//! - up to ten bytes of ASCII data
//! - ETX (0x03) and a two digit XOR checksum
//!
//! No partial reads, no buffer management in user code.

pub mod code;
pub mod codec;
pub mod error;
pub mod reader;

pub use code::ResultCode;
pub use codec::{
    checksum, decode_frame, encode_frame, encode_result, Access, Frame, Reply, WindowCodec,
    ETX, MAX_ADDRESS, MAX_FRAME_LEN, MAX_PAYLOAD, MAX_WINDOW, MIN_FRAME_LEN, STX,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
