//! Frame queue between the reader worker and consumers.
//!
//! The reader worker must never block on a slow consumer, so pushing into a
//! full bounded queue drops a frame according to the queue's
//! [`OverflowPolicy`] instead of waiting.

use std::collections::VecDeque;
use std::sync::mpsc::{RecvTimeoutError, TryRecvError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use a010_frame::{Frame, FrameSink};
use tracing::{debug, trace};

use crate::error::{DeviceError, Result};

/// Default number of frames a bounded queue holds.
pub const DEFAULT_QUEUE_CAPACITY: usize = 8;

const DISPATCH_THREAD: &str = "a010-dispatch";

/// What a full queue does with a new frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Evict the oldest queued frame. Consumers always see the latest images.
    #[default]
    DropOldest,
    /// Discard the incoming frame.
    DropNewest,
    /// Never drop; the capacity is ignored.
    Unbounded,
}

#[derive(Debug)]
struct QueueState {
    frames: VecDeque<Frame>,
    closed: bool,
    dropped: u64,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<QueueState>,
    ready: Condvar,
    capacity: usize,
    policy: OverflowPolicy,
}

/// Multi-producer, multi-consumer frame queue. Cloning yields another handle
/// to the same queue.
#[derive(Debug, Clone)]
pub struct FrameQueue {
    shared: Arc<Shared>,
}

impl FrameQueue {
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState {
                    frames: VecDeque::with_capacity(capacity.min(1024)),
                    closed: false,
                    dropped: 0,
                }),
                ready: Condvar::new(),
                capacity: capacity.max(1),
                policy,
            }),
        }
    }

    /// Bounded queue that evicts the oldest frame when full.
    pub fn bounded(capacity: usize) -> Self {
        Self::new(capacity, OverflowPolicy::DropOldest)
    }

    pub fn unbounded() -> Self {
        Self::new(usize::MAX, OverflowPolicy::Unbounded)
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a frame without blocking.
    ///
    /// Returns `false` if a frame was dropped to make room (or this frame was
    /// discarded), or if the queue is closed.
    pub fn push(&self, frame: Frame) -> bool {
        let mut state = self.lock();
        if state.closed {
            trace!(frame_id = frame.frame_id, "queue closed; frame discarded");
            return false;
        }

        let full = state.frames.len() >= self.shared.capacity;
        let kept = match (full, self.shared.policy) {
            (false, _) | (_, OverflowPolicy::Unbounded) => {
                state.frames.push_back(frame);
                true
            }
            (true, OverflowPolicy::DropOldest) => {
                if let Some(evicted) = state.frames.pop_front() {
                    trace!(frame_id = evicted.frame_id, "queue full; oldest frame dropped");
                }
                state.frames.push_back(frame);
                state.dropped += 1;
                false
            }
            (true, OverflowPolicy::DropNewest) => {
                trace!(frame_id = frame.frame_id, "queue full; new frame dropped");
                state.dropped += 1;
                false
            }
        };
        drop(state);
        self.shared.ready.notify_one();
        kept
    }

    /// Wait for the next frame. Returns `None` once the queue is closed and
    /// drained.
    pub fn recv(&self) -> Option<Frame> {
        let mut state = self.lock();
        loop {
            if let Some(frame) = state.frames.pop_front() {
                return Some(frame);
            }
            if state.closed {
                return None;
            }
            state = self
                .shared
                .ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Wait up to `timeout` for the next frame.
    pub fn recv_timeout(&self, timeout: Duration) -> std::result::Result<Frame, RecvTimeoutError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if let Some(frame) = state.frames.pop_front() {
                return Ok(frame);
            }
            if state.closed {
                return Err(RecvTimeoutError::Disconnected);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(RecvTimeoutError::Timeout);
            }
            state = self
                .shared
                .ready
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    pub fn try_recv(&self) -> std::result::Result<Frame, TryRecvError> {
        let mut state = self.lock();
        match state.frames.pop_front() {
            Some(frame) => Ok(frame),
            None if state.closed => Err(TryRecvError::Disconnected),
            None => Err(TryRecvError::Empty),
        }
    }

    /// Stop accepting frames and wake every waiting receiver. Frames already
    /// queued can still be received.
    pub fn close(&self) {
        let mut state = self.lock();
        if !state.closed {
            state.closed = true;
            debug!(queued = state.frames.len(), "frame queue closed");
        }
        drop(state);
        self.shared.ready.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frames dropped by the overflow policy so far.
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.shared.policy
    }
}

impl FrameSink for FrameQueue {
    fn submit(&mut self, frame: Frame) {
        self.push(frame);
    }
}

/// Receives every frame taken off a queue by a [`Dispatcher`].
pub trait FrameConsumer {
    fn consume(&mut self, frame: &Frame);
}

impl<F: FnMut(&Frame)> FrameConsumer for F {
    fn consume(&mut self, frame: &Frame) {
        self(frame)
    }
}

/// Boxed consumer that can move to the dispatch thread.
pub type BoxedConsumer = Box<dyn FrameConsumer + Send>;

/// Background fan-out: one thread pops frames off a queue and hands each to
/// every consumer in registration order.
pub struct Dispatcher {
    queue: FrameQueue,
    handle: Option<JoinHandle<u64>>,
}

impl Dispatcher {
    /// Start the dispatch thread. It runs until `queue` is closed and drained.
    pub fn spawn(queue: FrameQueue, consumers: Vec<BoxedConsumer>) -> Result<Self> {
        let worker_queue = queue.clone();
        let handle = thread::Builder::new()
            .name(DISPATCH_THREAD.to_string())
            .spawn(move || dispatch(worker_queue, consumers))
            .map_err(|source| DeviceError::Spawn {
                name: DISPATCH_THREAD,
                source,
            })?;
        Ok(Self {
            queue,
            handle: Some(handle),
        })
    }

    /// The queue this dispatcher drains.
    pub fn queue(&self) -> &FrameQueue {
        &self.queue
    }

    /// Wait for the queue to be closed and drained. Returns the number of
    /// frames dispatched.
    pub fn join(mut self) -> Result<u64> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| DeviceError::WorkerPanicked(DISPATCH_THREAD)),
            None => Ok(0),
        }
    }

    /// Close the queue, let consumers see what was already queued, and join.
    pub fn shutdown(self) -> Result<u64> {
        self.queue.close();
        self.join()
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.queue.close();
            let _ = handle.join();
        }
    }
}

fn dispatch(queue: FrameQueue, mut consumers: Vec<BoxedConsumer>) -> u64 {
    let mut dispatched = 0u64;
    while let Some(frame) = queue.recv() {
        for consumer in consumers.iter_mut() {
            consumer.consume(&frame);
        }
        dispatched += 1;
    }
    debug!(dispatched, "dispatcher finished");
    dispatched
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn frame(id: u16) -> Frame {
        Frame::new(25, 25, id, vec![0u8; 625])
    }

    fn ids(queue: &FrameQueue) -> Vec<u16> {
        std::iter::from_fn(|| queue.try_recv().ok())
            .map(|f| f.frame_id)
            .collect()
    }

    #[test]
    fn drop_oldest_keeps_latest_frames() {
        let queue = FrameQueue::new(2, OverflowPolicy::DropOldest);
        assert!(queue.push(frame(1)));
        assert!(queue.push(frame(2)));
        assert!(!queue.push(frame(3)));

        assert_eq!(queue.dropped(), 1);
        assert_eq!(ids(&queue), vec![2, 3]);
    }

    #[test]
    fn drop_newest_keeps_earliest_frames() {
        let queue = FrameQueue::new(2, OverflowPolicy::DropNewest);
        queue.push(frame(1));
        queue.push(frame(2));
        assert!(!queue.push(frame(3)));

        assert_eq!(queue.dropped(), 1);
        assert_eq!(ids(&queue), vec![1, 2]);
    }

    #[test]
    fn unbounded_never_drops() {
        let queue = FrameQueue::unbounded();
        for id in 0..100 {
            assert!(queue.push(frame(id)));
        }
        assert_eq!(queue.len(), 100);
        assert_eq!(queue.dropped(), 0);
    }

    #[test]
    fn close_drains_then_disconnects() {
        let queue = FrameQueue::bounded(4);
        queue.push(frame(1));
        queue.close();

        assert!(!queue.push(frame(2)));
        assert!(queue.is_closed());
        assert_eq!(queue.recv().map(|f| f.frame_id), Some(1));
        assert!(queue.recv().is_none());
        assert_eq!(queue.try_recv().unwrap_err(), TryRecvError::Disconnected);
        assert_eq!(
            queue.recv_timeout(Duration::from_millis(1)).unwrap_err(),
            RecvTimeoutError::Disconnected
        );
    }

    #[test]
    fn recv_timeout_expires_on_empty_queue() {
        let queue = FrameQueue::bounded(1);
        assert_eq!(queue.try_recv().unwrap_err(), TryRecvError::Empty);
        assert_eq!(
            queue.recv_timeout(Duration::from_millis(10)).unwrap_err(),
            RecvTimeoutError::Timeout
        );
    }

    #[test]
    fn recv_wakes_on_push_from_another_thread() {
        let queue = FrameQueue::bounded(1);
        let producer = {
            let queue = queue.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                queue.push(frame(42));
            })
        };
        let got = queue.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(got.frame_id, 42);
        producer.join().unwrap();
    }

    #[test]
    fn queue_is_a_frame_sink() {
        let mut queue = FrameQueue::bounded(3);
        let mut sink: Option<FrameQueue> = Some(queue.clone());
        sink.submit(frame(1));
        queue.submit(frame(2));
        assert_eq!(ids(&queue), vec![1, 2]);
    }

    #[test]
    fn dispatcher_fans_out_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let count = Arc::new(AtomicUsize::new(0));

        let first = {
            let log = Arc::clone(&log);
            move |f: &Frame| log.lock().unwrap().push(("first", f.frame_id))
        };
        let second = {
            let log = Arc::clone(&log);
            move |f: &Frame| log.lock().unwrap().push(("second", f.frame_id))
        };
        let counter = {
            let count = Arc::clone(&count);
            move |_: &Frame| {
                count.fetch_add(1, Ordering::SeqCst);
            }
        };

        let consumers: Vec<BoxedConsumer> =
            vec![Box::new(first), Box::new(second), Box::new(counter)];
        let queue = FrameQueue::unbounded();
        let dispatcher = Dispatcher::spawn(queue.clone(), consumers).unwrap();

        queue.push(frame(1));
        queue.push(frame(2));
        assert_eq!(dispatcher.shutdown().unwrap(), 2);

        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(
            *log.lock().unwrap(),
            vec![("first", 1), ("second", 1), ("first", 2), ("second", 2)]
        );
    }

    #[test]
    fn dropping_dispatcher_stops_thread() {
        let queue = FrameQueue::bounded(2);
        let dispatcher = Dispatcher::spawn(queue.clone(), Vec::new()).unwrap();
        drop(dispatcher);
        assert!(queue.is_closed());
    }
}
