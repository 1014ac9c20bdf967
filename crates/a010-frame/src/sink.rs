//! Consumer boundary of the decoder.

use std::collections::VecDeque;

use crate::codec::Frame;

/// Receives validated frames from a decoder.
///
/// `submit` is called from inside the decode loop and must return promptly.
/// What happens when a downstream queue is full is the sink's own policy.
pub trait FrameSink {
    fn submit(&mut self, frame: Frame);
}

impl FrameSink for Vec<Frame> {
    fn submit(&mut self, frame: Frame) {
        self.push(frame);
    }
}

impl FrameSink for VecDeque<Frame> {
    fn submit(&mut self, frame: Frame) {
        self.push_back(frame);
    }
}

/// An unattached sink (`None`) discards frames.
impl<S: FrameSink> FrameSink for Option<S> {
    fn submit(&mut self, frame: Frame) {
        if let Some(sink) = self {
            sink.submit(frame);
        }
    }
}

impl<S: FrameSink + ?Sized> FrameSink for &mut S {
    fn submit(&mut self, frame: Frame) {
        (**self).submit(frame);
    }
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn submit(&mut self, frame: Frame) {
        (**self).submit(frame);
    }
}

/// Adapts a closure into a sink.
pub struct FnSink<F>(pub F);

impl<F: FnMut(Frame)> FrameSink for FnSink<F> {
    fn submit(&mut self, frame: Frame) {
        (self.0)(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(id: u16) -> Frame {
        Frame::new(25, 25, id, vec![0u8; 625])
    }

    #[test]
    fn none_discards() {
        let mut sink: Option<Vec<Frame>> = None;
        sink.submit(frame(1));
        assert!(sink.is_none());

        let mut sink = Some(Vec::new());
        sink.submit(frame(2));
        assert_eq!(sink.unwrap().len(), 1);
    }

    #[test]
    fn closure_sink_sees_frames_in_order() {
        let mut ids = Vec::new();
        {
            let mut sink = FnSink(|f: Frame| ids.push(f.frame_id));
            sink.submit(frame(4));
            sink.submit(frame(5));
        }
        assert_eq!(ids, vec![4, 5]);
    }

    #[test]
    fn boxed_dyn_sink() {
        let mut sink: Box<dyn FrameSink> = Box::new(VecDeque::new());
        sink.submit(frame(9));
    }
}
