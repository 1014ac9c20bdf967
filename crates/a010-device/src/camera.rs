//! Camera driver: one reader worker per connection plus a command writer.
//!
//! The reader worker owns the link's read half and the [`FrameDecoder`]. It
//! reads chunks, ingests them, and pushes validated frames into whichever
//! [`FrameQueue`] is attached at that moment. Commands go out through a cloned
//! write handle under a mutex, so they never touch decoder state.

use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use a010_frame::{DecoderStats, Frame, FrameConfig, FrameDecoder, FrameSink};
use a010_transport::{BaudRate, SerialStream};
use tracing::{debug, info, warn};

#[cfg(unix)]
use a010_transport::{LinkConfig, SerialLink};

use crate::command::{AtCommand, Binning, DisplayFlags, DisplayTarget};
use crate::error::{DeviceError, Result};
use crate::queue::{FrameQueue, OverflowPolicy, DEFAULT_QUEUE_CAPACITY};

const READER_THREAD: &str = "a010-rx";

/// Read timeout used when the configuration leaves it unset.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Camera driver configuration.
#[derive(Debug, Clone)]
pub struct CameraConfig {
    /// Serial line settings used by [`Camera::open`].
    #[cfg(unix)]
    pub link: LinkConfig,
    /// Decoder buffer and read chunk sizes. `read_timeout` bounds how long
    /// [`Camera::terminate`] waits for the worker to notice; `None` means
    /// [`DEFAULT_READ_TIMEOUT`].
    pub frame: FrameConfig,
    /// Capacity of queues built by [`Camera::new_queue`].
    pub queue_capacity: usize,
    pub overflow: OverflowPolicy,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            #[cfg(unix)]
            link: LinkConfig::default(),
            frame: FrameConfig {
                read_timeout: Some(DEFAULT_READ_TIMEOUT),
                ..FrameConfig::default()
            },
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            overflow: OverflowPolicy::default(),
        }
    }
}

/// Queue slot shared with the reader worker.
#[derive(Debug, Default)]
struct SinkSlot {
    queue: Option<FrameQueue>,
    stopped: bool,
}

/// Forwards decoded frames to whatever queue is attached when they complete.
struct SlotSink<'a> {
    slot: &'a Mutex<SinkSlot>,
}

impl FrameSink for SlotSink<'_> {
    fn submit(&mut self, frame: Frame) {
        if let Some(queue) = &lock(self.slot).queue {
            queue.push(frame);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A connected MaixSense-A010 camera.
pub struct Camera {
    writer: Mutex<SerialStream>,
    display: Mutex<DisplayFlags>,
    slot: Arc<Mutex<SinkSlot>>,
    stats: Arc<Mutex<DecoderStats>>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<Result<()>>>,
    config: CameraConfig,
}

impl Camera {
    /// Open the serial device at `path` and start the reader worker.
    #[cfg(unix)]
    pub fn open(path: impl AsRef<std::path::Path>, config: CameraConfig) -> Result<Self> {
        let path = path.as_ref();
        let stream = SerialLink::open(path, &config.link)?;
        info!(path = %path.display(), baud = %config.link.baud_rate, "camera link opened");
        Self::from_stream(stream, config)
    }

    /// Start a driver over an already opened stream.
    ///
    /// The reader half always gets a read timeout so the worker can observe
    /// a stop request on a quiet link.
    pub fn from_stream(stream: SerialStream, config: CameraConfig) -> Result<Self> {
        let reader = stream.try_clone()?;
        let read_timeout = config.frame.read_timeout.unwrap_or(DEFAULT_READ_TIMEOUT);
        reader.set_read_timeout(Some(read_timeout))?;
        stream.set_write_timeout(config.frame.write_timeout)?;

        let slot = Arc::new(Mutex::new(SinkSlot::default()));
        let stats = Arc::new(Mutex::new(DecoderStats::default()));
        let stop = Arc::new(AtomicBool::new(false));

        let worker = {
            let worker = ReaderWorker {
                stream: reader,
                decoder: FrameDecoder::with_capacity(config.frame.buffer_capacity),
                chunk: vec![
                    0;
                    config
                        .frame
                        .read_chunk_size
                        .min(config.frame.buffer_capacity / 2)
                        .max(1)
                ],
                slot: Arc::clone(&slot),
                stats: Arc::clone(&stats),
                stop: Arc::clone(&stop),
            };
            thread::Builder::new()
                .name(READER_THREAD.to_string())
                .spawn(move || worker.run())
                .map_err(|source| DeviceError::Spawn {
                    name: READER_THREAD,
                    source,
                })?
        };
        debug!(link = stream.kind(), "reader worker started");

        Ok(Self {
            writer: Mutex::new(stream),
            display: Mutex::new(DisplayFlags::default()),
            slot,
            stats,
            stop,
            worker: Some(worker),
            config,
        })
    }

    /// Build an empty queue from the configured capacity and overflow policy.
    pub fn new_queue(&self) -> FrameQueue {
        FrameQueue::new(self.config.queue_capacity, self.config.overflow)
    }

    /// Attach `queue` as the frame destination, returning the previous one.
    ///
    /// Frames completed before this call are not replayed. If the reader
    /// worker has already stopped, `queue` is closed immediately.
    pub fn connect_queue(&self, queue: FrameQueue) -> Option<FrameQueue> {
        let mut slot = lock(&self.slot);
        if slot.stopped {
            queue.close();
        }
        slot.queue.replace(queue)
    }

    /// Detach the current queue; frames decoded afterwards are discarded.
    pub fn disconnect_queue(&self) -> Option<FrameQueue> {
        lock(&self.slot).queue.take()
    }

    /// Send a raw command.
    pub fn send(&self, command: &AtCommand) -> Result<()> {
        let bytes = command.to_bytes();
        let mut writer = lock(&self.writer);
        writer
            .write_all(&bytes)
            .and_then(|()| writer.flush())
            .map_err(|source| DeviceError::Command {
                command: command.to_string(),
                source,
            })?;
        debug!(%command, "command sent");
        Ok(())
    }

    pub fn set_isp(&self, on: bool) -> Result<()> {
        self.send(&AtCommand::Isp(on))
    }

    pub fn set_binning(&self, binning: Binning) -> Result<()> {
        self.send(&AtCommand::Binning(binning))
    }

    /// Switch one display output, keeping the others as last set.
    pub fn set_display(&self, target: DisplayTarget, on: bool) -> Result<()> {
        let mut display = lock(&self.display);
        let flags = display.with(target, on);
        self.send(&AtCommand::Display(flags))?;
        *display = flags;
        Ok(())
    }

    /// Replace the whole display mask in one command.
    pub fn set_display_flags(&self, flags: DisplayFlags) -> Result<()> {
        let mut display = lock(&self.display);
        self.send(&AtCommand::Display(flags))?;
        *display = flags;
        Ok(())
    }

    /// Display outputs as last sent.
    pub fn display(&self) -> DisplayFlags {
        *lock(&self.display)
    }

    /// Change the camera's UART speed, then move the host side of the link to match.
    pub fn set_baud_rate(&self, rate: BaudRate) -> Result<()> {
        self.send(&AtCommand::Baud(rate))?;
        lock(&self.writer).set_baud_rate(rate)?;
        info!(baud = %rate, "link speed changed");
        Ok(())
    }

    /// Set the quantization unit. Values above 9 are replaced by 0.
    pub fn set_quantization_unit(&self, unit: u8) -> Result<()> {
        self.send(&AtCommand::unit(unit))
    }

    /// Set the frame rate, clamped into 1..=20.
    pub fn set_fps(&self, fps: u8) -> Result<()> {
        self.send(&AtCommand::fps(fps))
    }

    pub fn set_anti_interference(&self, on: bool) -> Result<()> {
        self.send(&AtCommand::AntiInterference(on))
    }

    pub fn set_auto_exposure(&self, on: bool) -> Result<()> {
        self.send(&AtCommand::AutoExposure(on))
    }

    pub fn save_configuration(&self) -> Result<()> {
        self.send(&AtCommand::Save)
    }

    /// Latest decoder counters published by the reader worker.
    pub fn stats(&self) -> DecoderStats {
        *lock(&self.stats)
    }

    /// Whether the reader worker is still running.
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    /// Stop the reader worker, purge the link, close the attached queue, and
    /// return the final decoder counters.
    ///
    /// If the worker had already stopped on a transport failure, that failure
    /// is returned instead.
    pub fn terminate(mut self) -> Result<DecoderStats> {
        let outcome = self.shutdown();
        if let Err(err) = lock(&self.writer).purge() {
            warn!(error = %err, "purge on terminate failed");
        }
        info!("camera terminated");
        outcome.map(|()| self.stats())
    }

    fn shutdown(&mut self) -> Result<()> {
        self.stop.store(true, Ordering::Release);
        let outcome = match self.worker.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| DeviceError::WorkerPanicked(READER_THREAD))
                .and_then(|result| result),
            None => Ok(()),
        };
        let mut slot = lock(&self.slot);
        slot.stopped = true;
        if let Some(queue) = &slot.queue {
            queue.close();
        }
        outcome
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        if self.worker.is_some() {
            let _ = self.shutdown();
        }
    }
}

impl std::fmt::Debug for Camera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Camera")
            .field("link", &*lock(&self.writer))
            .field("running", &self.is_running())
            .finish()
    }
}

struct ReaderWorker {
    stream: SerialStream,
    decoder: FrameDecoder,
    chunk: Vec<u8>,
    slot: Arc<Mutex<SinkSlot>>,
    stats: Arc<Mutex<DecoderStats>>,
    stop: Arc<AtomicBool>,
}

impl ReaderWorker {
    fn run(mut self) -> Result<()> {
        let result = self.read_loop();
        *lock(&self.stats) = self.decoder.stats();

        let mut slot = lock(&self.slot);
        slot.stopped = true;
        if let Some(queue) = &slot.queue {
            queue.close();
        }
        drop(slot);

        match &result {
            Ok(()) => debug!("reader worker stopped"),
            Err(err) => warn!(error = %err, "reader worker stopped on failure"),
        }
        result
    }

    fn read_loop(&mut self) -> Result<()> {
        let mut sink = SlotSink { slot: &*self.slot };
        while !self.stop.load(Ordering::Acquire) {
            let read = match self.stream.read(&mut self.chunk) {
                Ok(0) => {
                    let eof = std::io::Error::new(ErrorKind::UnexpectedEof, "link closed");
                    return Err(self.decoder.on_transport_error(eof).into());
                }
                Ok(n) => n,
                Err(err)
                    if matches!(
                        err.kind(),
                        ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut
                    ) =>
                {
                    continue
                }
                Err(err) => return Err(self.decoder.on_transport_error(err).into()),
            };

            self.decoder.ingest(&self.chunk[..read], &mut sink)?;
            *lock(&self.stats) = self.decoder.stats();
        }
        Ok(())
    }
}
