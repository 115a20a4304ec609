//! The receiving half of the relay: a bound UDP socket that turns each
//! inbound datagram into a [Frame], and a dedicated thread that does so in a
//! loop and hands the results to whoever owns the accumulator.

use crate::error::{DecodeError, NetworkError, ReceiveError};
use crate::frame::{self, Frame, FrameFormat, MAX_DATAGRAM_PAYLOAD};

use log::{debug, info, warn};
use std::{
    io,
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, RecvTimeoutError, SyncSender},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

/// Default size of the receive buffer, in bytes.
pub const DEFAULT_MAX_DATAGRAM: usize = 8192;

/// How many decoded packets may wait between the receive thread and the
/// accumulator before the receive thread blocks.
pub const CHANNEL_CAPACITY: usize = 1024;

/// What the receive thread hands over for each datagram.
pub type Received = Result<Frame, ReceiveError>;

/// A UDP socket bound once at startup, decoding one frame per datagram.
#[derive(Debug)]
pub struct FrameReceiver {
    socket: UdpSocket,
    buf: Vec<u8>,
    max_datagram: usize,
    format: FrameFormat,
}

impl FrameReceiver {
    /// Bind to `addr`. Datagrams longer than `max_datagram` bytes are
    /// reported as [DecodeError::Oversized] rather than silently truncated.
    /// `max_datagram` is capped at [MAX_DATAGRAM_PAYLOAD].
    pub fn bind(
        addr: SocketAddr,
        max_datagram: usize,
        format: FrameFormat,
    ) -> Result<Self, NetworkError> {
        let max_datagram = max_datagram.min(MAX_DATAGRAM_PAYLOAD);
        let socket = UdpSocket::bind(addr).map_err(|e| NetworkError::Bind(addr, e))?;
        info!(
            "Listening for frames on {}",
            socket.local_addr().unwrap_or(addr)
        );

        Ok(Self {
            socket,
            // One spare byte so we can tell a full datagram from a truncated one
            buf: vec![0; max_datagram + 1],
            max_datagram,
            format,
        })
    }

    /// The address the socket actually ended up bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Block until the next datagram arrives, then decode it. There is no
    /// timeout.
    pub fn recv_frame(&mut self) -> Result<Frame, ReceiveError> {
        let (len, from) = self
            .socket
            .recv_from(&mut self.buf)
            .map_err(|e| ReceiveError::Network(NetworkError::Receive(e)))?;
        debug!("Received {} bytes from {}", len, from);

        if len > self.max_datagram {
            return Err(ReceiveError::Decode(DecodeError::Oversized {
                max: self.max_datagram,
            }));
        }
        frame::decode(&self.buf[..len], self.format).map_err(ReceiveError::Decode)
    }
}

/// Owns the receive thread and the far end of its channel. Dropping the
/// handle shuts the thread down.
#[derive(Debug)]
pub struct ReceiverHandle {
    stop: Arc<AtomicBool>,
    wake_addr: SocketAddr,
    frames: Receiver<Received>,
    thread: Option<JoinHandle<()>>,
}

/// Moves `receiver` onto its own thread. Every datagram, good or bad, is
/// pushed onto a bounded channel read through the returned handle.
pub fn spawn_receiver(mut receiver: FrameReceiver) -> Result<ReceiverHandle, NetworkError> {
    let bound = receiver.local_addr().map_err(NetworkError::Receive)?;
    let (tx, rx): (SyncSender<Received>, Receiver<Received>) = mpsc::sync_channel(CHANNEL_CAPACITY);
    let stop = Arc::new(AtomicBool::new(false));
    let th_stop = Arc::clone(&stop);

    let thread = thread::spawn(move || {
        while !th_stop.load(Ordering::Acquire) {
            let received = receiver.recv_frame();
            if th_stop.load(Ordering::Acquire) {
                break;
            }
            if tx.send(received).is_err() {
                warn!("Receive thread : accumulator went away.");
                break;
            }
        }
        info!("Receive thread : terminated.");
    });

    Ok(ReceiverHandle {
        stop,
        wake_addr: wake_addr(bound),
        frames: rx,
        thread: Some(thread),
    })
}

// A socket bound to the unspecified address is reached through loopback.
fn wake_addr(bound: SocketAddr) -> SocketAddr {
    match bound.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => (Ipv4Addr::LOCALHOST, bound.port()).into(),
        IpAddr::V6(ip) if ip.is_unspecified() => (Ipv6Addr::LOCALHOST, bound.port()).into(),
        _ => bound,
    }
}

impl ReceiverHandle {
    /// Wait up to `timeout` for the next datagram's outcome.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Received, RecvTimeoutError> {
        self.frames.recv_timeout(timeout)
    }

    /// The address the receive thread's socket is bound to.
    pub fn wake_addr(&self) -> SocketAddr {
        self.wake_addr
    }

    /// Stop the receive thread and wait for it, returning whatever it had
    /// already queued. Calling it again is a no-op.
    pub fn shutdown(&mut self) -> Vec<Received> {
        let Some(thread) = self.thread.take() else {
            return Vec::new();
        };

        self.stop.store(true, Ordering::Release);
        // The thread is most likely parked in recv_from, so poke it with an
        // empty datagram.
        let wake = match self.wake_addr {
            SocketAddr::V4(_) => UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)),
            SocketAddr::V6(_) => UdpSocket::bind((Ipv6Addr::UNSPECIFIED, 0)),
        }
        .and_then(|s| s.send_to(&[], self.wake_addr));
        if let Err(e) = wake {
            warn!("Could not wake receive thread: {}", e);
        }

        // Draining also unblocks a thread stuck on a full channel. The
        // channel disconnects once the thread exits.
        let leftovers: Vec<Received> = self.frames.iter().collect();

        if thread.join().is_err() {
            warn!("Receive thread panicked");
        }
        leftovers
    }
}

impl Drop for ReceiverHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::encode_raw;

    fn loopback() -> SocketAddr {
        (Ipv4Addr::LOCALHOST, 0).into()
    }

    #[test]
    fn decodes_one_frame_per_datagram() {
        let mut receiver = FrameReceiver::bind(loopback(), DEFAULT_MAX_DATAGRAM, FrameFormat::Raw).unwrap();
        let dest = receiver.local_addr().unwrap();
        let tx = UdpSocket::bind(loopback()).unwrap();

        tx.send_to(&encode_raw(&[1.5, 2.5]), dest).unwrap();
        assert_eq!(receiver.recv_frame().unwrap().values(), &[1.5, 2.5]);

        tx.send_to(&[0u8; 6], dest).unwrap();
        assert!(matches!(
            receiver.recv_frame(),
            Err(ReceiveError::Decode(DecodeError::Misaligned { len: 6 }))
        ));
    }

    #[test]
    fn oversized_datagrams_are_not_truncated() {
        let mut receiver = FrameReceiver::bind(loopback(), 8, FrameFormat::Raw).unwrap();
        let dest = receiver.local_addr().unwrap();
        let tx = UdpSocket::bind(loopback()).unwrap();

        tx.send_to(&encode_raw(&[1.0, 2.0, 3.0]), dest).unwrap();
        assert!(matches!(
            receiver.recv_frame(),
            Err(ReceiveError::Decode(DecodeError::Oversized { max: 8 }))
        ));
    }

    #[test]
    fn huge_limit_is_capped_to_a_datagram() {
        let mut receiver = FrameReceiver::bind(loopback(), usize::MAX, FrameFormat::Raw).unwrap();
        assert_eq!(receiver.buf.len(), MAX_DATAGRAM_PAYLOAD + 1);

        let dest = receiver.local_addr().unwrap();
        let tx = UdpSocket::bind(loopback()).unwrap();
        tx.send_to(&encode_raw(&[1.0, 2.0]), dest).unwrap();
        assert_eq!(receiver.recv_frame().unwrap().values(), &[1.0, 2.0]);
    }

    #[test]
    fn bind_conflict_is_a_network_error() {
        let first = FrameReceiver::bind(loopback(), DEFAULT_MAX_DATAGRAM, FrameFormat::Raw).unwrap();
        let taken = first.local_addr().unwrap();
        assert!(matches!(
            FrameReceiver::bind(taken, DEFAULT_MAX_DATAGRAM, FrameFormat::Raw),
            Err(NetworkError::Bind(..))
        ));
    }

    #[test]
    fn receive_thread_forwards_and_shuts_down() {
        let receiver = FrameReceiver::bind(loopback(), DEFAULT_MAX_DATAGRAM, FrameFormat::Raw).unwrap();
        let mut handle = spawn_receiver(receiver).unwrap();
        let tx = UdpSocket::bind(loopback()).unwrap();

        tx.send_to(&encode_raw(&[4.0]), handle.wake_addr()).unwrap();
        let got = handle.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
        assert_eq!(got.values(), &[4.0]);

        // Must return even though nothing else is being sent
        assert!(handle.shutdown().is_empty());
        assert!(handle.shutdown().is_empty());
    }

    #[test]
    fn unspecified_bind_is_woken_through_loopback() {
        let bound: SocketAddr = (Ipv4Addr::UNSPECIFIED, 7000).into();
        let expected: SocketAddr = (Ipv4Addr::LOCALHOST, 7000).into();
        assert_eq!(wake_addr(bound), expected);
    }
}
