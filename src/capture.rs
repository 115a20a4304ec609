//! A receive session: drains the receive thread into a [FrameAccumulator]
//! until told to stop, then hands the table back for persistence.

use crate::accumulator::{FrameAccumulator, Shape};
use crate::error::ReceiveError;
use crate::receiver::{Received, ReceiverHandle};

use log::{debug, info, warn};
use std::{ops::ControlFlow, sync::mpsc::RecvTimeoutError, time::Duration};

/// How long one [Capture::step] waits for a datagram before giving the
/// caller a chance to check for interruption.
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// What brought a receive session to an end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionEnd {
    /// Stopped from outside the step loop, e.g. a key press in the monitor.
    #[default]
    Stopped,
    /// The stop predicate fired, normally because of SIGINT or SIGTERM.
    Interrupted,
    /// The frame limit was reached.
    FrameLimit,
    /// The receive thread went away.
    Disconnected,
}

/// Final counts for a receive session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSummary {
    /// Shape of the accumulated table
    pub shape: Shape,
    /// Datagrams that were received but not accumulated
    pub dropped: usize,
    /// Why the session ended
    pub ended: SessionEnd,
}

/// The accumulator together with the receive thread feeding it.
#[derive(Debug)]
pub struct Capture {
    handle: ReceiverHandle,
    acc: FrameAccumulator,
    dropped: usize,
    max_frames: Option<usize>,
    ended: Option<SessionEnd>,
}

impl Capture {
    /// Start accumulating from `handle`. With `max_frames` set, the session
    /// reports itself done once that many frames are held.
    pub fn new(handle: ReceiverHandle, acc: FrameAccumulator, max_frames: Option<usize>) -> Self {
        Self {
            handle,
            acc,
            dropped: 0,
            max_frames,
            ended: None,
        }
    }

    /// True once the frame limit, if any, has been reached.
    pub fn is_full(&self) -> bool {
        self.max_frames.is_some_and(|max| self.acc.len() >= max)
    }

    /// Take at most one datagram off the receive thread. Breaks when the
    /// session cannot make further progress.
    pub fn step(mut self) -> ControlFlow<Self, Self> {
        if self.is_full() {
            return self.end(SessionEnd::FrameLimit);
        }
        match self.handle.recv_timeout(POLL_INTERVAL) {
            Ok(received) => self.absorb(received),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                warn!("Receive thread stopped unexpectedly");
                return self.end(SessionEnd::Disconnected);
            }
        }
        if self.is_full() {
            info!("Reached the limit of {} frames", self.acc.len());
            self.end(SessionEnd::FrameLimit)
        } else {
            ControlFlow::Continue(self)
        }
    }

    /// Like [Capture::step], but breaks without receiving anything once
    /// `should_stop` returns true.
    pub fn step_unless(self, should_stop: impl FnOnce() -> bool) -> ControlFlow<Self, Self> {
        if should_stop() {
            info!("Capture interrupted");
            self.end(SessionEnd::Interrupted)
        } else {
            self.step()
        }
    }

    /// Step until `should_stop` says so or the session is done.
    pub fn run_until(mut self, mut should_stop: impl FnMut() -> bool) -> Self {
        loop {
            match self.step_unless(&mut should_stop) {
                ControlFlow::Continue(capture) => self = capture,
                ControlFlow::Break(capture) => return capture,
            }
        }
    }

    fn end(mut self, reason: SessionEnd) -> ControlFlow<Self, Self> {
        self.ended.get_or_insert(reason);
        ControlFlow::Break(self)
    }

    fn absorb(&mut self, received: Received) {
        let pushed = received.and_then(|frame| self.acc.push(frame).map_err(ReceiveError::from));
        match pushed {
            Ok(shape) => debug!("Accumulator shape: {}", shape),
            Err(e) => {
                self.dropped += 1;
                warn!("Dropping packet: {}", e);
            }
        }
    }

    /// The table as it stands.
    pub fn accumulator(&self) -> &FrameAccumulator {
        &self.acc
    }

    /// One line describing progress so far.
    pub fn status_line(&self) -> String {
        format!(
            "frames: {}  shape: {}  dropped: {}",
            self.acc.len(),
            self.acc.shape(),
            self.dropped
        )
    }

    /// Stop the receive thread, fold in anything it had queued, and give up
    /// the table.
    pub fn finish(mut self) -> (FrameAccumulator, CaptureSummary) {
        for received in self.handle.shutdown() {
            if self.is_full() {
                break;
            }
            self.absorb(received);
        }

        let summary = CaptureSummary {
            shape: self.acc.shape(),
            dropped: self.dropped,
            ended: self.ended.unwrap_or_default(),
        };
        info!(
            "Capture finished with shape {}, {} packets dropped",
            summary.shape, summary.dropped
        );
        (self.acc, summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{encode_raw, FrameEncoder, FrameFormat};
    use crate::persist::write_delimited;
    use crate::receiver::{spawn_receiver, FrameReceiver, DEFAULT_MAX_DATAGRAM};
    use crate::sender::{FrameSender, StreamOptions};
    use std::{
        net::{Ipv4Addr, UdpSocket},
        time::Instant,
    };

    fn start(max_frames: Option<usize>, skip_leading: usize) -> Capture {
        let receiver = FrameReceiver::bind(
            (Ipv4Addr::LOCALHOST, 0).into(),
            DEFAULT_MAX_DATAGRAM,
            FrameFormat::Raw,
        )
        .unwrap();
        let handle = spawn_receiver(receiver).unwrap();
        Capture::new(
            handle,
            FrameAccumulator::with_skip_leading(skip_leading),
            max_frames,
        )
    }

    fn deadline(secs: u64) -> impl FnMut() -> bool {
        let end = Instant::now() + Duration::from_secs(secs);
        move || Instant::now() > end
    }

    #[test]
    fn three_by_four_table_end_to_end() {
        let capture = start(Some(3), 0);
        let table: Vec<Vec<f32>> = vec![
            vec![1.0, 2.0, 3.0, 4.0],
            vec![5.0, 6.0, 7.0, 8.0],
            vec![9.0, 10.0, 11.0, 12.0],
        ];

        let sender = FrameSender::connect(capture.handle.wake_addr(), FrameEncoder::default()).unwrap();
        let summary = sender
            .stream(&table, &StreamOptions::default(), || false)
            .unwrap();
        assert_eq!(summary.sent, 3);
        sender.close();

        let (acc, summary) = capture.run_until(deadline(5)).finish();
        assert_eq!(summary.shape, Shape { rows: 3, cols: Some(4) });
        assert_eq!(summary.ended, SessionEnd::FrameLimit);
        assert_eq!(acc.rows().to_vec(), table);

        let mut out = Vec::new();
        write_delimited(acc.rows(), &mut out, ',').unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "1.0,2.0,3.0,4.0\n5.0,6.0,7.0,8.0\n9.0,10.0,11.0,12.0\n"
        );
    }

    #[test]
    fn malformed_packet_does_not_disturb_its_neighbours() {
        let capture = start(Some(2), 0);
        let tx = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let dest = capture.handle.wake_addr();

        tx.send_to(&encode_raw(&[1.0, 2.0]), dest).unwrap();
        tx.send_to(&[0u8; 7], dest).unwrap();
        tx.send_to(&encode_raw(&[3.0, 4.0]), dest).unwrap();

        let (acc, summary) = capture.run_until(deadline(5)).finish();
        assert_eq!(acc.rows().to_vec(), vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert_eq!(summary.dropped, 1);
    }

    #[test]
    fn upstream_offset_is_stripped_before_accumulating() {
        let capture = start(Some(1), 15);
        let sender = FrameSender::connect(
            capture.handle.wake_addr(),
            FrameEncoder::new(FrameFormat::Raw, 15),
        )
        .unwrap();
        sender
            .stream(&vec![vec![0.5f32, 0.25]], &StreamOptions::default(), || false)
            .unwrap();

        let (acc, _) = capture.run_until(deadline(5)).finish();
        assert_eq!(acc.into_rows(), vec![vec![0.5, 0.25]]);
    }

    #[test]
    fn interrupted_session_still_returns_its_frames() {
        let capture = start(None, 0);
        let tx = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        tx.send_to(&encode_raw(&[8.0]), capture.handle.wake_addr())
            .unwrap();

        let mut capture = capture;
        while capture.accumulator().is_empty() {
            capture = match capture.step() {
                ControlFlow::Continue(c) | ControlFlow::Break(c) => c,
            };
        }
        let capture = capture.run_until(|| true);
        assert!(!capture.status_line().is_empty());

        let (acc, summary) = capture.finish();
        assert_eq!(acc.into_rows(), vec![vec![8.0]]);
        assert_eq!(summary.dropped, 0);
        assert_eq!(summary.ended, SessionEnd::Interrupted);
    }

    #[test]
    fn stop_flag_breaks_the_monitor_fold() {
        use std::sync::atomic::{AtomicBool, Ordering};

        static RAISED: AtomicBool = AtomicBool::new(false);
        let should_stop = || RAISED.load(Ordering::SeqCst);

        let mut capture = start(None, 0);
        for _ in 0..3 {
            capture = match capture.step_unless(should_stop) {
                ControlFlow::Continue(c) => c,
                ControlFlow::Break(_) => panic!("stopped before the flag was raised"),
            };
        }

        RAISED.store(true, Ordering::SeqCst);
        let capture = match capture.step_unless(should_stop) {
            ControlFlow::Break(c) => c,
            ControlFlow::Continue(_) => panic!("kept going after the flag was raised"),
        };
        assert_eq!(capture.finish().1.ended, SessionEnd::Interrupted);
    }

    #[test]
    fn session_stopped_from_outside_is_not_an_interruption() {
        let capture = match start(None, 0).step() {
            ControlFlow::Continue(c) | ControlFlow::Break(c) => c,
        };
        assert_eq!(capture.finish().1.ended, SessionEnd::Stopped);
    }
}
