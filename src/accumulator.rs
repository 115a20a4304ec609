//! The growing table of received frames.

use crate::error::DecodeError;
use crate::frame::Frame;

use std::fmt;

/// The `FrameAccumulator` owns every frame received so far, in the order
/// they arrived. Rows may differ in width if a producer changed its column
/// count mid-stream; they are kept exactly as received.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameAccumulator {
    rows: Vec<Vec<f32>>,
    skip_leading: usize,
}

/// Row count of the table, and the column count if every row agrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    /// Number of accumulated frames
    pub rows: usize,
    /// Common width of the frames, `None` when ragged or empty
    pub cols: Option<usize>,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.cols {
            Some(cols) => write!(f, "({}, {})", self.rows, cols),
            None if self.rows == 0 => write!(f, "(0,)"),
            None => write!(f, "({}, ragged)", self.rows),
        }
    }
}

impl FrameAccumulator {
    /// An empty accumulator that keeps frames whole.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty accumulator that strips `skip_leading` values off the front
    /// of every frame before storing it.
    pub fn with_skip_leading(skip_leading: usize) -> Self {
        Self {
            rows: Vec::new(),
            skip_leading,
        }
    }

    /// Append a frame as the newest row. A frame too short for the leading
    /// offset is refused and the table is left untouched.
    pub fn push(&mut self, frame: Frame) -> Result<Shape, DecodeError> {
        let frame = frame.strip_leading(self.skip_leading)?;
        self.rows.push(frame.into_values());
        Ok(self.shape())
    }

    /// The current row and column counts.
    pub fn shape(&self) -> Shape {
        let cols = match self.rows.split_first() {
            Some((first, rest)) if rest.iter().all(|r| r.len() == first.len()) => {
                Some(first.len())
            }
            _ => None,
        };
        Shape {
            rows: self.rows.len(),
            cols,
        }
    }

    /// Number of rows accumulated.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if nothing has been received yet.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The rows, oldest first.
    pub fn rows(&self) -> &[Vec<f32>] {
        &self.rows
    }

    /// Consume the accumulator, yielding its rows.
    pub fn into_rows(self) -> Vec<Vec<f32>> {
        self.rows
    }
}
