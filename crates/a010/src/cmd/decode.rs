use std::fs::File;

use a010_frame::{FrameConfig, FrameError, FrameReader};
use a010_transport::SerialStream;

use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, io_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{log_stats, print_frame, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let file = File::open(&args.file)
        .map_err(|err| io_error(&format!("cannot open {}", args.file.display()), err))?;
    let config = FrameConfig {
        read_chunk_size: args.chunk_size.max(1),
        ..FrameConfig::default()
    };
    let mut reader = FrameReader::with_config(SerialStream::from_file(file), config);
    let source = args.file.display().to_string();

    let mut printed = 0usize;
    while args.count.is_none_or(|count| printed < count) {
        match reader.read_frame() {
            Ok(frame) => {
                print_frame(&frame, &source, format);
                printed += 1;
            }
            Err(FrameError::ConnectionClosed) => break,
            Err(err) => return Err(frame_error("decode failed", err)),
        }
    }

    let stats = reader.stats();
    log_stats(&stats);

    if args.strict && stats.rejected() > 0 {
        return Err(CliError::new(
            DATA_INVALID,
            format!("{} frame(s) rejected in {source}", stats.rejected()),
        ));
    }
    Ok(SUCCESS)
}
