//! Synthetic capture files.
//!
//! Pixel and noise bytes stay below `0xC8`, so they never equal the tail
//! byte. Frame ids, exposure times and checksums can still contain `0xDD`.

use std::fs::File;
use std::io::{BufWriter, Write};

use a010_frame::{encode_frame, Frame, INFO_SIZE, TAIL};
use bytes::{BufMut, BytesMut};
use serde::Serialize;
use tracing::debug;

use crate::cmd::{binning_for, SynthArgs};
use crate::exit::{frame_error, io_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_summary, OutputFormat};

const PIXEL_LEVELS: usize = 200;

#[derive(Serialize)]
struct SynthOutput {
    kind: &'static str,
    path: String,
    frames: usize,
    corrupted: usize,
    duplicated: usize,
    noise: usize,
    bytes: usize,
}

pub fn run(args: SynthArgs, format: OutputFormat) -> CliResult<i32> {
    let side = binning_for(args.size)?.side();
    let corrupt_every = every("--corrupt-every", args.corrupt_every)?;
    let duplicate_every = every("--duplicate-every", args.duplicate_every)?;

    let mut wire = BytesMut::new();
    wire.put_slice(&noise(args.noise));
    wire.put_u8(TAIL);

    let mut corrupted = 0usize;
    let mut duplicated = 0usize;
    let mut encoded = BytesMut::new();
    for index in 0..args.count {
        let frame = synthetic_frame(side, args.start_id.wrapping_add(index as u16));
        encoded.clear();
        encode_frame(&frame, &mut encoded).map_err(|err| frame_error("encode failed", err))?;

        let nth = index + 1;
        if corrupt_every.is_some_and(|k| nth % k == 0) {
            let pixel = (index * 31) % frame.pixels.len();
            encoded[4 + INFO_SIZE + pixel] ^= 0x01;
            corrupted += 1;
            debug!(frame_id = frame.frame_id, pixel, "corrupted frame");
        }
        wire.extend_from_slice(&encoded);
        if duplicate_every.is_some_and(|k| nth % k == 0) {
            wire.extend_from_slice(&encoded);
            duplicated += 1;
        }
    }

    let file = File::create(&args.output)
        .map_err(|err| io_error(&format!("cannot create {}", args.output.display()), err))?;
    let mut out = BufWriter::new(file);
    out.write_all(&wire)
        .and_then(|()| out.flush())
        .map_err(|err| io_error("write failed", err))?;

    let record = SynthOutput {
        kind: "synth",
        path: args.output.display().to_string(),
        frames: args.count,
        corrupted,
        duplicated,
        noise: args.noise,
        bytes: wire.len(),
    };
    print_summary(
        &record,
        &[
            ("path", record.path.clone()),
            ("frames", record.frames.to_string()),
            ("corrupted", record.corrupted.to_string()),
            ("duplicated", record.duplicated.to_string()),
            ("noise", record.noise.to_string()),
            ("bytes", record.bytes.to_string()),
        ],
        format,
    );
    Ok(SUCCESS)
}

fn every(flag: &str, k: Option<usize>) -> CliResult<Option<usize>> {
    match k {
        Some(0) => Err(CliError::new(USAGE, format!("{flag} must be at least 1"))),
        other => Ok(other),
    }
}

/// A diagonal gradient shifted by the frame id.
fn synthetic_frame(side: u8, frame_id: u16) -> Frame {
    let side_len = usize::from(side);
    let pixels: Vec<u8> = (0..side_len * side_len)
        .map(|i| ((i % side_len + i / side_len + usize::from(frame_id)) % PIXEL_LEVELS) as u8)
        .collect();
    Frame::new(side, side, frame_id, pixels)
        .with_exposure_time(1000 + i32::from(frame_id % 100) * 10)
        .with_temperatures(30, 35)
}

/// Deterministic line noise without the tail byte.
fn noise(len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| ((i * 37 + 11) % PIXEL_LEVELS) as u8)
        .collect()
}
