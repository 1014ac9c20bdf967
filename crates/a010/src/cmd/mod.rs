use std::path::PathBuf;
use std::time::Duration;

use a010_device::{Binning, OverflowPolicy};
use clap::{Args, Subcommand, ValueEnum};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

#[cfg(unix)]
pub mod capture;
#[cfg(unix)]
pub mod config;
pub mod decode;
pub mod synth;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Stream frames from a camera and print them.
    #[cfg(unix)]
    Capture(CaptureArgs),
    /// Decode frames from a raw capture file.
    Decode(DecodeArgs),
    /// Write a synthetic capture file for testing decoders.
    Synth(SynthArgs),
    /// Send configuration commands to a camera.
    #[cfg(unix)]
    Config(ConfigArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        #[cfg(unix)]
        Command::Capture(args) => capture::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Synth(args) => synth::run(args, format),
        #[cfg(unix)]
        Command::Config(args) => config::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// On/off switch argument.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    pub fn is_on(self) -> bool {
        self == Toggle::On
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum Overflow {
    /// Evict the oldest queued frame.
    DropOldest,
    /// Discard the incoming frame.
    DropNewest,
}

impl From<Overflow> for OverflowPolicy {
    fn from(value: Overflow) -> Self {
        match value {
            Overflow::DropOldest => OverflowPolicy::DropOldest,
            Overflow::DropNewest => OverflowPolicy::DropNewest,
        }
    }
}

#[cfg(unix)]
#[derive(Args, Debug)]
pub struct CaptureArgs {
    /// Serial device the camera is attached to.
    pub device: PathBuf,
    /// Host UART speed in bits per second.
    #[arg(long, default_value_t = 115_200)]
    pub baud: u32,
    /// Exit after printing N frames.
    #[arg(long)]
    pub count: Option<usize>,
    /// Image side length to switch the camera to before capturing.
    #[arg(long, value_name = "SIDE", value_parser = parse_image_side)]
    pub binning: Option<u8>,
    /// Frame rate to request (1-20).
    #[arg(long)]
    pub fps: Option<u8>,
    /// Quantization unit to request (0-9).
    #[arg(long)]
    pub unit: Option<u8>,
    /// Frames buffered between the reader worker and the printer.
    #[arg(long, default_value_t = a010_device::DEFAULT_QUEUE_CAPACITY)]
    pub queue: usize,
    /// What a full queue does with a new frame.
    #[arg(long, value_enum, default_value_t = Overflow::DropOldest)]
    pub overflow: Overflow,
    /// Give up when no frame arrives for this long (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub idle_timeout: String,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Raw capture file.
    pub file: PathBuf,
    /// Bytes read from the file per call.
    #[arg(long, default_value_t = a010_frame::DEFAULT_READ_CHUNK)]
    pub chunk_size: usize,
    /// Stop after printing N frames.
    #[arg(long)]
    pub count: Option<usize>,
    /// Exit with status 60 if any frame was rejected.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args, Debug)]
pub struct SynthArgs {
    /// Output file, overwritten if it exists.
    pub output: PathBuf,
    /// Frames to generate.
    #[arg(long, default_value_t = 10)]
    pub count: usize,
    /// Image side length.
    #[arg(long, default_value_t = 25, value_parser = parse_image_side)]
    pub size: u8,
    /// Id of the first frame; later frames count up from it. Decoders drop
    /// a first frame with id 0.
    #[arg(long, default_value_t = 1)]
    pub start_id: u16,
    /// Flip one pixel bit in every Kth frame so its checksum fails.
    #[arg(long, value_name = "K")]
    pub corrupt_every: Option<usize>,
    /// Send every Kth frame twice.
    #[arg(long, value_name = "K")]
    pub duplicate_every: Option<usize>,
    /// Bytes of line noise written before the first frame.
    #[arg(long, default_value_t = 0)]
    pub noise: usize,
}

#[cfg(unix)]
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Serial device the camera is attached to.
    pub device: PathBuf,
    /// Current host UART speed in bits per second.
    #[arg(long, default_value_t = 115_200)]
    pub baud: u32,
    /// Start or stop the image signal processor.
    #[arg(long, value_enum)]
    pub isp: Option<Toggle>,
    /// Image side length (binning mode).
    #[arg(long, value_name = "SIDE", value_parser = parse_image_side)]
    pub binning: Option<u8>,
    /// Frame rate (1-20).
    #[arg(long)]
    pub fps: Option<u8>,
    /// Quantization unit (0-9).
    #[arg(long)]
    pub unit: Option<u8>,
    /// LCD output. Outputs left out keep the power-on mask (LCD only).
    #[arg(long, value_enum)]
    pub lcd: Option<Toggle>,
    /// USB output.
    #[arg(long, value_enum)]
    pub usb: Option<Toggle>,
    /// UART output.
    #[arg(long, value_enum)]
    pub uart: Option<Toggle>,
    /// Auto exposure.
    #[arg(long, value_enum)]
    pub ae: Option<Toggle>,
    /// Anti multi-machine interference.
    #[arg(long, value_enum)]
    pub antimmi: Option<Toggle>,
    /// New camera UART speed; the host follows after the command is sent.
    #[arg(long, value_name = "BPS")]
    pub set_baud: Option<u32>,
    /// Persist the configuration on the camera.
    #[arg(long)]
    pub save: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

fn parse_image_side(input: &str) -> Result<u8, String> {
    let side: u8 = input
        .parse()
        .map_err(|_| format!("invalid image size: {input}"))?;
    match Binning::from_side(side) {
        Some(_) => Ok(side),
        None => Err(format!("image size must be 25, 50 or 100, got {side}")),
    }
}

/// Binning mode for an image side already checked by the argument parser.
pub(crate) fn binning_for(side: u8) -> CliResult<Binning> {
    Binning::from_side(side)
        .ok_or_else(|| CliError::new(USAGE, format!("unsupported image size: {side}")))
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
