//! `tokio-util` codec over the frame decoder, for async byte sources.

use std::collections::VecDeque;

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{encode_frame, Frame, INFO_SIZE, TAIL};
use crate::decoder::{DecoderStats, FrameDecoder};
use crate::error::FrameError;

/// Smallest decoder buffer: room for a chunk of `capacity / 2` on top of the
/// up to 15 bytes a metadata block can leave unconsumed.
const MIN_CAPACITY: usize = 2 * INFO_SIZE;

/// Frame codec for use with `FramedRead` / `FramedWrite`.
///
/// Decoding consumes every byte handed to it; noise and corrupted frames are
/// dropped exactly as by [`FrameDecoder`]. Encoding primes the stream with a
/// `0xDD` byte before the first frame.
#[derive(Debug, Default)]
pub struct A010Codec {
    decoder: FrameDecoder,
    pending: VecDeque<Frame>,
    primed: bool,
}

impl A010Codec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Codec whose decoder buffers at most `capacity` bytes. Capacities
    /// below 32 bytes are raised to 32.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            decoder: FrameDecoder::with_capacity(capacity.max(MIN_CAPACITY)),
            ..Self::default()
        }
    }

    pub fn stats(&self) -> DecoderStats {
        self.decoder.stats()
    }
}

impl Decoder for A010Codec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        if let Some(frame) = self.pending.pop_front() {
            return Ok(Some(frame));
        }

        let bytes = src.split();
        let step = (self.decoder.capacity() / 2).max(1);
        for chunk in bytes.chunks(step) {
            self.decoder.ingest(chunk, &mut self.pending)?;
        }
        Ok(self.pending.pop_front())
    }
}

impl Encoder<Frame> for A010Codec {
    type Error = FrameError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        if !self.primed {
            let mark = dst.len();
            dst.extend_from_slice(&[TAIL]);
            if let Err(err) = encode_frame(&item, dst) {
                dst.truncate(mark);
                return Err(err);
            }
            self.primed = true;
            return Ok(());
        }
        encode_frame(&item, dst)
    }
}
