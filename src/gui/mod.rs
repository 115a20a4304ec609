//! Terminal monitor shown while frames are being received.

mod error;
mod fold_until_stop;

pub use error::GuiError;
pub use fold_until_stop::{fold_until_stop, FoldError};
