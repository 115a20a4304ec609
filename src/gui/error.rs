use std::{error::Error, fmt::Display, sync::mpsc};

/// Failures of the terminal monitor.
#[derive(Debug)]
pub enum GuiError {
    #[allow(missing_docs)]
    IOError(std::io::Error),
    #[allow(missing_docs)]
    MPSCRecvError(mpsc::RecvError),
    /// The worker thread panicked.
    JoinError,
}

impl Display for GuiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#?}", self)
    }
}

impl Error for GuiError {}

impl From<std::io::Error> for GuiError {
    fn from(value: std::io::Error) -> Self {
        Self::IOError(value)
    }
}

impl From<mpsc::RecvError> for GuiError {
    fn from(value: mpsc::RecvError) -> Self {
        Self::MPSCRecvError(value)
    }
}
