use bytes::{BufMut, Bytes, BytesMut};

use crate::buffer::DEFAULT_BUFFER_CAPACITY;
use crate::checksum::frame_checksum;
use crate::error::{FrameError, Result};

/// Sync byte that ends a frame and precedes the next frame's header.
pub const TAIL: u8 = 0xDD;

/// Two header bytes opening every frame.
pub const HEADER: [u8; 2] = [0x00, 0xFF];

/// Size of the info (metadata) block.
pub const INFO_SIZE: usize = 16;

/// Smallest pixel payload: a 25x25 image.
pub const PIXELS_LEN_MIN: usize = 25 * 25;

/// Largest pixel payload: a 100x100 image.
pub const PIXELS_LEN_MAX: usize = 100 * 100;

/// Bytes a frame occupies besides its pixels: header, length, info, checksum, tail.
pub const FRAME_OVERHEAD: usize = HEADER.len() + 2 + INFO_SIZE + 1 + 1;

/// Default size of each transport read.
pub const DEFAULT_READ_CHUNK: usize = 8 * 1024;

/// Per-frame metadata carried in the 16-byte info block.
///
/// ```text
/// byte  0      command (ignored)
/// byte  1      output mode (ignored)
/// byte  2      sensor temperature (i8)
/// byte  3      driver temperature (i8)
/// bytes 4..8   exposure time (i32 LE)
/// byte  8      error code
/// byte  9      reserved
/// byte  10     rows
/// byte  11     cols
/// bytes 12..14 frame id (u16 LE)
/// byte  14     ISP version (ignored)
/// byte  15     reserved
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameInfo {
    pub sensor_temperature: i8,
    pub driver_temperature: i8,
    pub exposure_time: i32,
    pub error_code: u8,
    pub rows: u8,
    pub cols: u8,
    pub frame_id: u16,
}

impl FrameInfo {
    /// Extract metadata from an info block. `m` must hold at least 16 bytes.
    pub fn parse(m: &[u8]) -> Self {
        Self {
            sensor_temperature: m[2] as i8,
            driver_temperature: m[3] as i8,
            exposure_time: i32::from_le_bytes([m[4], m[5], m[6], m[7]]),
            error_code: m[8],
            rows: m[10],
            cols: m[11],
            frame_id: u16::from_le_bytes([m[12], m[13]]),
        }
    }

    /// Serialize into an info block; ignored and reserved bytes are zero.
    pub fn to_bytes(&self) -> [u8; INFO_SIZE] {
        let mut m = [0u8; INFO_SIZE];
        m[2] = self.sensor_temperature as u8;
        m[3] = self.driver_temperature as u8;
        m[4..8].copy_from_slice(&self.exposure_time.to_le_bytes());
        m[8] = self.error_code;
        m[10] = self.rows;
        m[11] = self.cols;
        m[12..14].copy_from_slice(&self.frame_id.to_le_bytes());
        m
    }
}

/// A validated depth image.
///
/// `pixels` is owned storage: it never aliases the decoder's working buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub rows: u8,
    pub cols: u8,
    pub frame_id: u16,
    pub exposure_time: i32,
    pub sensor_temperature: i8,
    pub driver_temperature: i8,
    pub error_code: u8,
    pub pixels: Bytes,
}

impl Frame {
    /// Create a frame with zeroed timing, temperature and error fields.
    pub fn new(rows: u8, cols: u8, frame_id: u16, pixels: impl Into<Bytes>) -> Self {
        Self::from_info(
            FrameInfo {
                rows,
                cols,
                frame_id,
                ..FrameInfo::default()
            },
            pixels,
        )
    }

    pub fn from_info(info: FrameInfo, pixels: impl Into<Bytes>) -> Self {
        Self {
            rows: info.rows,
            cols: info.cols,
            frame_id: info.frame_id,
            exposure_time: info.exposure_time,
            sensor_temperature: info.sensor_temperature,
            driver_temperature: info.driver_temperature,
            error_code: info.error_code,
            pixels: pixels.into(),
        }
    }

    pub fn with_exposure_time(mut self, exposure_time: i32) -> Self {
        self.exposure_time = exposure_time;
        self
    }

    pub fn with_temperatures(mut self, sensor: i8, driver: i8) -> Self {
        self.sensor_temperature = sensor;
        self.driver_temperature = driver;
        self
    }

    pub fn with_error_code(mut self, error_code: u8) -> Self {
        self.error_code = error_code;
        self
    }

    /// Metadata of this frame.
    pub fn info(&self) -> FrameInfo {
        FrameInfo {
            sensor_temperature: self.sensor_temperature,
            driver_temperature: self.driver_temperature,
            exposure_time: self.exposure_time,
            error_code: self.error_code,
            rows: self.rows,
            cols: self.cols,
            frame_id: self.frame_id,
        }
    }

    /// Pixel value at `(row, col)`, if inside both the image and the payload.
    pub fn pixel(&self, row: usize, col: usize) -> Option<u8> {
        if row >= usize::from(self.rows) || col >= usize::from(self.cols) {
            return None;
        }
        self.pixels.get(row * usize::from(self.cols) + col).copied()
    }

    /// The total wire size of this frame.
    pub fn wire_size(&self) -> usize {
        FRAME_OVERHEAD + self.pixels.len()
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────┬───────────┬────────────┬──────────────┬──────────┬──────┐
/// │ Header   │ Length    │ Info       │ Pixels       │ Checksum │ Tail │
/// │ 0x00 0xFF│ (2B LE)   │ (16B)      │ (N bytes)    │ (1B)     │ 0xDD │
/// │          │ = 16 + N  │            │ 625..=10000  │          │      │
/// └──────────┴───────────┴────────────┴──────────────┴──────────┴──────┘
/// ```
///
/// A decoder only trusts a header that follows a `0xDD`, so a stream must be
/// primed with one [`TAIL`] byte before its first frame.
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) -> Result<()> {
    let pixels = frame.pixels.as_ref();
    check_pixels_len(pixels.len())?;

    let len = (INFO_SIZE + pixels.len()) as u16;
    let info = frame.info().to_bytes();

    dst.reserve(frame.wire_size());
    dst.put_slice(&HEADER);
    dst.put_u16_le(len);
    dst.put_slice(&info);
    dst.put_slice(pixels);
    dst.put_u8(frame_checksum(len, &info, pixels));
    dst.put_u8(TAIL);
    Ok(())
}

fn check_pixels_len(len: usize) -> Result<()> {
    if (PIXELS_LEN_MIN..=PIXELS_LEN_MAX).contains(&len) {
        Ok(())
    } else {
        Err(FrameError::PixelLengthOutOfRange {
            len,
            min: PIXELS_LEN_MIN,
            max: PIXELS_LEN_MAX,
        })
    }
}

/// Configuration for frame readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Rolling buffer capacity in bytes. Default: 64 KiB.
    pub buffer_capacity: usize,
    /// Size of each transport read. Default: 8 KiB.
    pub read_chunk_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            read_chunk_size: DEFAULT_READ_CHUNK,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> Frame {
        Frame::new(25, 25, 1, vec![0x05; 641])
            .with_exposure_time(1000)
            .with_temperatures(30, 35)
    }

    #[test]
    fn encode_layout_matches_wire_format() {
        let mut buf = BytesMut::new();
        encode_frame(&sample_frame(), &mut buf).unwrap();

        assert_eq!(buf.len(), FRAME_OVERHEAD + 641);
        assert_eq!(&buf[..4], &[0x00, 0xFF, 0x91, 0x02]);
        assert_eq!(buf[4 + 2], 30);
        assert_eq!(buf[4 + 3], 35);
        assert_eq!(&buf[4 + 4..4 + 8], &1000i32.to_le_bytes());
        assert_eq!(buf[4 + 10], 25);
        assert_eq!(buf[4 + 11], 25);
        assert_eq!(&buf[4 + 12..4 + 14], &[0x01, 0x00]);
        assert_eq!(buf[buf.len() - 1], TAIL);
    }

    #[test]
    fn encode_checksum_byte() {
        let mut buf = BytesMut::new();
        encode_frame(&sample_frame(), &mut buf).unwrap();

        let expected = buf[2..buf.len() - 2]
            .iter()
            .fold(0xFFu8, |acc, &b| acc.wrapping_add(b));
        assert_eq!(buf[buf.len() - 2], expected);
    }

    #[test]
    fn encode_rejects_out_of_range_payloads() {
        let mut buf = BytesMut::new();
        for len in [0, PIXELS_LEN_MIN - 1, PIXELS_LEN_MAX + 1] {
            let err = encode_frame(&Frame::new(1, 1, 1, vec![0; len]), &mut buf).unwrap_err();
            assert!(matches!(err, FrameError::PixelLengthOutOfRange { len: l, .. } if l == len));
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn info_block_parses_signed_fields() {
        let info = FrameInfo {
            sensor_temperature: -12,
            driver_temperature: -1,
            exposure_time: -5,
            error_code: 7,
            rows: 100,
            cols: 100,
            frame_id: 0xBEEF,
        };
        assert_eq!(FrameInfo::parse(&info.to_bytes()), info);
    }

    #[test]
    fn info_parse_ignores_reserved_bytes() {
        let mut m = FrameInfo::default().to_bytes();
        m[0] = 0x11;
        m[1] = 0x22;
        m[9] = 0x33;
        m[14] = 0x44;
        m[15] = 0x55;
        assert_eq!(FrameInfo::parse(&m), FrameInfo::default());
    }

    #[test]
    fn pixel_lookup_is_row_major_and_bounded() {
        let pixels: Vec<u8> = (0..=255u8).cycle().take(50 * 50).collect();
        let frame = Frame::new(50, 50, 3, pixels);

        assert_eq!(frame.pixel(0, 0), Some(0));
        assert_eq!(frame.pixel(1, 0), Some(50));
        assert_eq!(frame.pixel(49, 49), Some(((49 * 50 + 49) % 256) as u8));
        assert_eq!(frame.pixel(50, 0), None);
        assert_eq!(frame.pixel(0, 50), None);
    }

    #[test]
    fn frame_wire_size() {
        assert_eq!(sample_frame().wire_size(), 2 + 2 + 16 + 641 + 1 + 1);
    }
}
