//! The sending half of the relay: walks a [TabularSource] row by row and
//! emits one datagram per row at a fixed cadence.

use crate::error::NetworkError;
use crate::frame::FrameEncoder;
use crate::source::TabularSource;

use log::{debug, error, info, warn};
use std::{
    io::{self, ErrorKind},
    net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket},
    time::Duration,
};

/// How a source is played back.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StreamOptions {
    /// Pause after each frame. Not corrected for drift.
    pub cadence: Duration,
    /// Start over from the first row after the last one, until stopped.
    pub looping: bool,
}

/// Counts gathered over one call to [FrameSender::stream].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSummary {
    /// Datagrams handed to the socket
    pub sent: usize,
    /// Rows that could not be encoded
    pub skipped: usize,
    /// Rows whose send failed transiently
    pub dropped: usize,
    /// Full passes over the source
    pub passes: usize,
    /// True if the stream ended because it was asked to stop
    pub interrupted: bool,
}

/// A UDP socket associated once with a single destination.
#[derive(Debug)]
pub struct FrameSender {
    socket: UdpSocket,
    dest: SocketAddr,
    encoder: FrameEncoder,
}

impl FrameSender {
    /// Bind an ephemeral local port and fix `dest` as the target of every
    /// later send.
    pub fn connect(dest: SocketAddr, encoder: FrameEncoder) -> Result<Self, NetworkError> {
        let local: SocketAddr = match dest {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local).map_err(|e| NetworkError::Bind(local, e))?;
        socket
            .connect(dest)
            .map_err(|e| NetworkError::Connect(dest, e))?;
        info!("Streaming frames to {}", dest);

        Ok(Self {
            socket,
            dest,
            encoder,
        })
    }

    /// Play `source` to the destination. Rows that cannot be encoded are
    /// logged and skipped. `should_stop` is checked before every row; once it
    /// returns true the stream ends early.
    ///
    /// Only a send failure that looks permanent ends the stream with an
    /// error. A looping stream also ends after a pass in which every row was
    /// skipped.
    pub fn stream<S>(
        &self,
        source: &S,
        options: &StreamOptions,
        mut should_stop: impl FnMut() -> bool,
    ) -> Result<StreamSummary, NetworkError>
    where
        S: TabularSource + ?Sized,
    {
        let mut summary = StreamSummary::default();
        let rows = source.len();
        if rows == 0 {
            warn!("Source has no rows, nothing to stream");
            return Ok(summary);
        }
        debug!(
            "Each frame carries {} values",
            self.encoder.frame_len(source.columns())
        );

        'passes: loop {
            let skipped_before = summary.skipped;
            for i in 0..rows {
                if should_stop() {
                    summary.interrupted = true;
                    break 'passes;
                }

                match source.row(i).and_then(|row| self.encoder.encode(&row)) {
                    Ok(packet) => match self.socket.send(&packet) {
                        Ok(_) => summary.sent += 1,
                        Err(e) if is_transient(&e) => {
                            warn!("Row {}: send failed, continuing: {}", i, e);
                            summary.dropped += 1;
                        }
                        Err(e) => {
                            error!("Row {}: send failed, aborting stream to {}: {}", i, self.dest, e);
                            return Err(NetworkError::Send(e));
                        }
                    },
                    Err(e) => {
                        warn!("Skipping row {}: {}", i, e);
                        summary.skipped += 1;
                    }
                }

                let last_frame = !options.looping && i + 1 == rows;
                if !last_frame && !options.cadence.is_zero() {
                    spin_sleep::sleep(options.cadence);
                }
            }

            summary.passes += 1;
            if !options.looping {
                break;
            }
            if summary.skipped - skipped_before == rows {
                error!("No row of the source could be encoded, not looping over it again");
                break;
            }
            debug!("Pass {} complete, starting over", summary.passes);
        }

        Ok(summary)
    }

    /// Release the socket.
    pub fn close(self) {
        info!("Closing stream to {}", self.dest);
    }
}

// Nobody listening yet, or a momentary hiccup; neither is worth ending the
// stream over.
fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::ConnectionRefused | ErrorKind::WouldBlock | ErrorKind::Interrupted
    )
}
