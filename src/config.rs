//! Settings for both halves of the relay. Each has built-in defaults, can be
//! read from a RON file, and is finally overridden by whatever was given on
//! the command line. A config file looks like:
//!
//! ```text
//! (
//!     send: (ip: "10.0.0.192", port: 7000, delay: 0.01, looping: true),
//!     recv: (port: 7000, out: Some("capture.csv"), skip_leading: 15),
//! )
//! ```
//!
//! Any field may be left out.

use crate::error::{ConfigError, NetworkError};
use crate::frame::{FrameFormat, MAX_DATAGRAM_PAYLOAD};
use crate::receiver::DEFAULT_MAX_DATAGRAM;

use serde::{Deserialize, Serialize};
use std::{
    net::{SocketAddr, ToSocketAddrs},
    path::{Path, PathBuf},
    time::Duration,
};

const DEFAULT_IP: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 7000;

/// Settings for the sending half.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Destination host
    pub ip: String,
    /// Destination port
    pub port: u16,
    /// Seconds between frames
    pub delay: f64,
    /// Replay the source forever
    pub looping: bool,
    /// Field separator of the source file
    pub delimiter: char,
    /// Packet layout
    pub format: FrameFormat,
    /// Number of placeholder values put in front of each frame
    pub pad_leading: usize,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            ip: DEFAULT_IP.to_owned(),
            port: DEFAULT_PORT,
            delay: 0.01,
            looping: false,
            delimiter: ' ',
            format: FrameFormat::Raw,
            pad_leading: 0,
        }
    }
}

impl SenderConfig {
    /// Where the frames go.
    pub fn destination(&self) -> Result<SocketAddr, NetworkError> {
        resolve(&self.ip, self.port)
    }

    /// The delay between frames as a [Duration].
    pub fn cadence(&self) -> Result<Duration, ConfigError> {
        Duration::try_from_secs_f64(self.delay).map_err(|_| ConfigError::InvalidDelay(self.delay))
    }
}

/// Settings for the receiving half.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Address to bind
    pub ip: String,
    /// Port to bind
    pub port: u16,
    /// Largest datagram accepted, in bytes
    pub max_datagram: usize,
    /// Where to write the table on exit, if anywhere
    pub out: Option<PathBuf>,
    /// Field separator of the output file
    pub delimiter: char,
    /// Packet layout
    pub format: FrameFormat,
    /// Number of leading values dropped from each frame
    pub skip_leading: usize,
    /// Stop after this many frames
    pub max_frames: Option<usize>,
    /// Log only, no terminal monitor
    pub headless: bool,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            ip: DEFAULT_IP.to_owned(),
            port: DEFAULT_PORT,
            max_datagram: DEFAULT_MAX_DATAGRAM,
            out: None,
            delimiter: ',',
            format: FrameFormat::Raw,
            skip_leading: 0,
            max_frames: None,
            headless: false,
        }
    }
}

impl ReceiverConfig {
    /// The address to listen on.
    pub fn bind_addr(&self) -> Result<SocketAddr, NetworkError> {
        resolve(&self.ip, self.port)
    }

    /// The receive buffer size, checked against what one datagram can carry.
    pub fn datagram_limit(&self) -> Result<usize, ConfigError> {
        match self.max_datagram {
            1..=MAX_DATAGRAM_PAYLOAD => Ok(self.max_datagram),
            max => Err(ConfigError::InvalidMaxDatagram(max)),
        }
    }
}

/// Both halves, as stored in a config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    #[allow(missing_docs)]
    pub send: SenderConfig,
    #[allow(missing_docs)]
    pub recv: ReceiverConfig,
}

impl RelayConfig {
    /// Read a config from the RON file at `path`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron(&text)
    }

    /// Parse a config from RON text.
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::de::from_str(text)?)
    }
}

fn resolve(ip: &str, port: u16) -> Result<SocketAddr, NetworkError> {
    let name = format!("{}:{}", ip, port);
    (ip, port)
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or(NetworkError::Resolve(name))
}
