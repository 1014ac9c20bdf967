use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::{Duration, Instant};

use a010_device::{Camera, CameraConfig};
use a010_transport::{BaudRate, LinkConfig};
use tracing::{info, warn};

use crate::cmd::{binning_for, parse_duration, CaptureArgs};
use crate::exit::{device_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS, TIMEOUT};
use crate::output::{log_stats, print_frame, OutputFormat};

/// How often the printer wakes up to check for Ctrl-C and the idle deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub fn run(args: CaptureArgs, format: OutputFormat) -> CliResult<i32> {
    let baud_rate =
        BaudRate::from_bps(args.baud).map_err(|err| transport_error("invalid --baud", err))?;
    let idle_timeout = parse_duration(&args.idle_timeout)?;

    let config = CameraConfig {
        link: LinkConfig {
            baud_rate,
            ..LinkConfig::default()
        },
        queue_capacity: args.queue,
        overflow: args.overflow.into(),
        ..CameraConfig::default()
    };
    let camera = Camera::open(&args.device, config).map_err(|err| device_error("open failed", err))?;
    let queue = camera.new_queue();
    camera.connect_queue(queue.clone());

    if let Some(side) = args.binning {
        camera
            .set_binning(binning_for(side)?)
            .map_err(|err| device_error("binning", err))?;
    }
    if let Some(fps) = args.fps {
        camera.set_fps(fps).map_err(|err| device_error("fps", err))?;
    }
    if let Some(unit) = args.unit {
        camera
            .set_quantization_unit(unit)
            .map_err(|err| device_error("unit", err))?;
    }

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let source = args.device.display().to_string();
    let mut printed = 0usize;
    let mut last_frame = Instant::now();
    let mut outcome = Ok(SUCCESS);

    while running.load(Ordering::SeqCst) {
        match queue.recv_timeout(POLL_INTERVAL) {
            Ok(frame) => {
                print_frame(&frame, &source, format);
                printed += 1;
                last_frame = Instant::now();
                if args.count.is_some_and(|count| printed >= count) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if last_frame.elapsed() >= idle_timeout {
                    outcome = Err(CliError::new(
                        TIMEOUT,
                        format!("no frame from {source} within {}", args.idle_timeout),
                    ));
                    break;
                }
            }
            // The reader worker stopped; terminate reports why.
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let dropped = queue.dropped();
    let stats = camera
        .terminate()
        .map_err(|err| device_error("capture failed", err))?;
    log_stats(&stats);
    if dropped > 0 {
        warn!(dropped, "frames dropped by the queue overflow policy");
    }
    info!(printed, "capture finished");
    outcome
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
