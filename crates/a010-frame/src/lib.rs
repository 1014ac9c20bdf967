//! Resynchronizing frame decoder for the MaixSense-A010 serial protocol.
//!
//! The camera streams depth images over a UART with no flow control. Every
//! frame is laid out as:
//! - `0x00 0xFF` header, trusted only right after a `0xDD` tail byte
//! - a 2-byte little-endian length (16 + pixel count)
//! - a 16-byte info block (temperatures, exposure, geometry, frame id)
//! - 625 to 10000 pixel bytes
//! - an 8-bit wrapping checksum seeded with `0xFF`
//! - the `0xDD` tail
//!
//! [`FrameDecoder`] turns an arbitrarily chunked byte stream into validated
//! [`Frame`]s, silently dropping noise, truncated frames, duplicates and
//! checksum failures. [`FrameReader`] and [`FrameWriter`] wrap blocking
//! streams; the `async` feature adds a `tokio-util` codec.

pub mod buffer;
pub mod checksum;
pub mod codec;
pub mod decoder;
pub mod error;
pub mod reader;
pub mod sink;
#[cfg(feature = "async")]
pub mod tokio_codec;
pub mod writer;

pub use buffer::{RollingBuffer, DEFAULT_BUFFER_CAPACITY};
pub use checksum::{frame_checksum, Checksum, CHECKSUM_SEED};
pub use codec::{
    encode_frame, Frame, FrameConfig, FrameInfo, DEFAULT_READ_CHUNK, FRAME_OVERHEAD, HEADER,
    INFO_SIZE, PIXELS_LEN_MAX, PIXELS_LEN_MIN, TAIL,
};
pub use decoder::{
    transition, DecodeContext, DecoderState, DecoderStats, FrameDecoder, Outcome, Rejection,
    Transition,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use sink::{FnSink, FrameSink};
#[cfg(feature = "async")]
pub use tokio_codec::A010Codec;
pub use writer::FrameWriter;
