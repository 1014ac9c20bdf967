//! Camera driver against an in-process emulator.
//!
//! An emulator thread plays the camera on one end of a loopback pair and
//! streams a few frames, with some noise and a repeated frame mixed in. The
//! driver on the other end decodes them and a dispatcher fans them out to two
//! consumers.
//!
//! Run with:
//!   cargo run --example emulated-camera

#[cfg(unix)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use a010::device::{BoxedConsumer, Camera, CameraConfig, Dispatcher};
    use a010::frame::{Frame, FrameWriter};
    use a010::transport::SerialStream;

    let (host, device) = SerialStream::pair()?;
    let camera = Camera::from_stream(host, CameraConfig::default())?;

    let queue = camera.new_queue();
    camera.connect_queue(queue.clone());

    let seen = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&seen);
    let consumers: Vec<BoxedConsumer> = vec![
        Box::new(|frame: &Frame| {
            eprintln!(
                "frame {} {}x{} exposure={}",
                frame.frame_id, frame.rows, frame.cols, frame.exposure_time
            );
        }),
        Box::new(move |_: &Frame| {
            counter.fetch_add(1, Ordering::Relaxed);
        }),
    ];
    let dispatcher = Dispatcher::spawn(queue, consumers)?;

    let emulator = thread::spawn(move || -> a010::frame::Result<()> {
        let mut link = FrameWriter::new(device);
        for id in 1..=5u16 {
            let frame = Frame::new(25, 25, id, vec![(id * 10) as u8; 625]).with_exposure_time(900);
            link.write_frame(&frame)?;
            if id == 3 {
                link.write_frame(&frame)?;
                link.write_raw(&[0x42, 0x17, 0xDD])?;
            }
        }
        link.flush()
    });

    emulator
        .join()
        .map_err(|_| "emulator thread panicked")??;
    let deadline = Instant::now() + Duration::from_secs(5);
    while camera.stats().frames_emitted < 5 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }

    let stats = camera.terminate()?;
    let delivered = dispatcher.join()?;
    eprintln!(
        "decoded {} frames, delivered {delivered}, consumer saw {}, rejected {}",
        stats.frames_emitted,
        seen.load(Ordering::Relaxed),
        stats.rejected()
    );
    Ok(())
}

#[cfg(not(unix))]
fn main() {
    eprintln!("the emulated camera needs a unix loopback pair");
}
