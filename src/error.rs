//! Error types for every stage of the relay. Each stage gets its own enum so
//! callers can tell a fatal startup failure apart from a per-row or
//! per-packet failure that should just be logged.

use std::{borrow::Cow, fmt, io, net::SocketAddr};

/// Returned when the tabular source cannot be loaded at all. Always fatal.
#[derive(Debug)]
pub enum SourceReadError {
    /// The file could not be opened or read.
    IoError(io::Error),

    /// The delimited text itself is malformed.
    CsvError(csv::Error),

    /// The source parsed, but contains no rows.
    Empty,

    /// The configured delimiter is not a single ASCII byte.
    BadDelimiter(char),
}

/// Returned when a single row cannot be packed into a frame. The row is
/// skipped and the stream keeps going.
#[derive(Debug, Clone, PartialEq)]
pub enum SerializationError {
    /// A cell could not be parsed as a number.
    NonNumeric {
        /// Zero-based column of the offending cell
        column: usize,
        /// The cell contents, as read
        cell: String,
    },

    /// The row does not have the column count fixed at startup.
    WrongArity {
        /// Column count of the source
        expected: usize,
        /// Column count of this row
        found: usize,
    },

    /// The frame would not fit in a single datagram.
    TooLong {
        /// Number of values in the frame
        len: usize,
    },
}

/// Socket failures. Bind, connect and resolve happen at startup and are fatal.
#[derive(Debug)]
pub enum NetworkError {
    /// `ip:port` did not resolve to a socket address.
    Resolve(String),

    /// Could not bind the local socket.
    Bind(SocketAddr, io::Error),

    /// Could not associate the send socket with its destination.
    Connect(SocketAddr, io::Error),

    /// A datagram could not be sent.
    Send(io::Error),

    /// A datagram could not be received.
    Receive(io::Error),
}

/// Returned when an inbound packet cannot be turned into a frame. The
/// packet is dropped and the receive loop keeps going.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The packet length is not a multiple of the element width.
    Misaligned {
        /// Length of the packet in bytes
        len: usize,
    },

    /// A headered packet too short to even hold its header.
    MissingHeader {
        /// Length of the packet in bytes
        len: usize,
    },

    /// A headered packet with a version we do not speak.
    UnsupportedVersion(u8),

    /// The header's element count disagrees with the payload length.
    CountMismatch {
        /// Element count written in the header
        declared: usize,
        /// Element count implied by the payload length
        found: usize,
    },

    /// The datagram was larger than the receive buffer.
    Oversized {
        /// Size of the receive buffer in bytes
        max: usize,
    },

    /// The frame is shorter than the leading offset we were asked to strip.
    ShorterThanOffset {
        /// Number of values in the frame
        len: usize,
        /// Number of leading values to strip
        offset: usize,
    },
}

/// The outcome of one failed receive: either the socket failed, or the
/// datagram arrived but did not decode.
#[derive(Debug)]
pub enum ReceiveError {
    #[allow(missing_docs)]
    Network(NetworkError),
    #[allow(missing_docs)]
    Decode(DecodeError),
}

/// Returned when the accumulated table cannot be written out. The output
/// file should be considered corrupt.
#[derive(Debug)]
pub enum PersistenceError {
    /// Underlying io failure.
    IoError(io::Error),
}

/// Returned when a config file cannot be read or parsed.
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read.
    IoError(io::Error),

    /// The file is not valid RON for the expected config.
    RonSpannedError(ron::de::SpannedError),

    /// The inter-frame delay is negative or not a number.
    InvalidDelay(f64),

    /// The datagram size limit is zero or more than a UDP datagram can hold.
    InvalidMaxDatagram(usize),
}

/// Everything that can end a run of the binary.
#[derive(Debug)]
pub enum RelayError {
    #[allow(missing_docs)]
    Source(SourceReadError),
    #[allow(missing_docs)]
    Network(NetworkError),
    #[allow(missing_docs)]
    Persistence(PersistenceError),
    #[allow(missing_docs)]
    Config(ConfigError),
    /// The terminal monitor failed.
    Gui(crate::gui::GuiError),
    /// The termination signal handlers could not be installed.
    Signal(io::Error),
}

impl fmt::Display for SourceReadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            Self::IoError(error) => Cow::from(format!("could not read source: {}", error)),
            Self::CsvError(error) => Cow::from(format!("malformed source: {}", error)),
            Self::Empty => Cow::from("source has no rows"),
            Self::BadDelimiter(c) => Cow::from(format!("delimiter {:?} is not a single byte", c)),
        };

        write!(f, "{}", msg)
    }
}

impl fmt::Display for SerializationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::NonNumeric { column, cell } => {
                write!(f, "non-numeric cell {:?} in column {}", cell, column)
            }
            Self::WrongArity { expected, found } => {
                write!(f, "expected {} columns, found {}", expected, found)
            }
            Self::TooLong { len } => {
                write!(f, "frame of {} values does not fit in one datagram", len)
            }
        }
    }
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Resolve(addr) => write!(f, "could not resolve {}", addr),
            Self::Bind(addr, error) => write!(f, "could not bind {}: {}", addr, error),
            Self::Connect(addr, error) => write!(f, "could not connect to {}: {}", addr, error),
            Self::Send(error) => write!(f, "send failed: {}", error),
            Self::Receive(error) => write!(f, "receive failed: {}", error),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Misaligned { len } => {
                write!(f, "packet of {} bytes is not a whole number of f32s", len)
            }
            Self::MissingHeader { len } => {
                write!(f, "packet of {} bytes is too short for a header", len)
            }
            Self::UnsupportedVersion(v) => write!(f, "unsupported packet version {}", v),
            Self::CountMismatch { declared, found } => write!(
                f,
                "header declares {} values but payload holds {}",
                declared, found
            ),
            Self::Oversized { max } => {
                write!(f, "datagram exceeds the {} byte receive buffer", max)
            }
            Self::ShorterThanOffset { len, offset } => write!(
                f,
                "frame of {} values is shorter than the leading offset {}",
                len, offset
            ),
        }
    }
}

impl fmt::Display for ReceiveError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Network(error) => write!(f, "{}", error),
            Self::Decode(error) => write!(f, "{}", error),
        }
    }
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::IoError(error) => write!(f, "io error: {}", error),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::IoError(error) => write!(f, "could not read config: {}", error),
            Self::RonSpannedError(error) => write!(f, "invalid config: {}", error),
            Self::InvalidDelay(delay) => write!(f, "invalid delay {} seconds", delay),
            Self::InvalidMaxDatagram(max) => write!(
                f,
                "max datagram of {} bytes is outside 1..={}",
                max,
                crate::frame::MAX_DATAGRAM_PAYLOAD
            ),
        }
    }
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Source(error) => write!(f, "{}", error),
            Self::Network(error) => write!(f, "{}", error),
            Self::Persistence(error) => write!(f, "could not persist frames: {}", error),
            Self::Config(error) => write!(f, "{}", error),
            Self::Gui(error) => write!(f, "monitor failed: {}", error),
            Self::Signal(error) => write!(f, "could not install signal handlers: {}", error),
        }
    }
}

impl std::error::Error for SourceReadError {}
impl std::error::Error for SerializationError {}
impl std::error::Error for NetworkError {}
impl std::error::Error for DecodeError {}
impl std::error::Error for ReceiveError {}
impl std::error::Error for PersistenceError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for RelayError {}

impl From<io::Error> for SourceReadError {
    fn from(value: io::Error) -> Self {
        Self::IoError(value)
    }
}

impl From<csv::Error> for SourceReadError {
    fn from(value: csv::Error) -> Self {
        Self::CsvError(value)
    }
}

impl From<DecodeError> for ReceiveError {
    fn from(value: DecodeError) -> Self {
        Self::Decode(value)
    }
}

impl From<io::Error> for PersistenceError {
    fn from(value: io::Error) -> Self {
        Self::IoError(value)
    }
}

impl From<io::Error> for ConfigError {
    fn from(value: io::Error) -> Self {
        Self::IoError(value)
    }
}

impl From<ron::de::SpannedError> for ConfigError {
    fn from(value: ron::de::SpannedError) -> Self {
        Self::RonSpannedError(value)
    }
}

impl From<SourceReadError> for RelayError {
    fn from(value: SourceReadError) -> Self {
        Self::Source(value)
    }
}

impl From<NetworkError> for RelayError {
    fn from(value: NetworkError) -> Self {
        Self::Network(value)
    }
}

impl From<PersistenceError> for RelayError {
    fn from(value: PersistenceError) -> Self {
        Self::Persistence(value)
    }
}

impl From<ConfigError> for RelayError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<crate::gui::GuiError> for RelayError {
    fn from(value: crate::gui::GuiError) -> Self {
        Self::Gui(value)
    }
}
