//! Tabular sources of frames.
//!
//! The sender only needs three things from a source: how many columns it
//! has, how many rows, and a way to get row `i` as `f32`s. Loading problems
//! (missing file, broken text, no rows) are reported up front as a
//! [SourceReadError]. Problems confined to one row are only found when that
//! row is asked for, so the sender can skip it and move on.

use crate::error::{SerializationError, SourceReadError};

use csv::{ReaderBuilder, StringRecord, Trim};
use log::debug;
use std::{io::Read, path::Path};

/// Row-major numeric data with a stable column count and row order.
pub trait TabularSource {
    /// Column count, fixed when the source was loaded.
    fn columns(&self) -> usize;

    /// Number of rows.
    fn len(&self) -> usize;

    /// True if there are no rows.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row `index` coerced to `f32`s in column order. `index` must be less
    /// than [TabularSource::len].
    fn row(&self, index: usize) -> Result<Vec<f32>, SerializationError>;
}

/// A delimited text file with no header row, kept as text until a row is
/// requested.
#[derive(Debug, Clone)]
pub struct CsvSource {
    records: Vec<StringRecord>,
    columns: usize,
}

impl CsvSource {
    /// Load every record of the file at `path`.
    pub fn from_path(path: impl AsRef<Path>, delimiter: char) -> Result<Self, SourceReadError> {
        let file = std::fs::File::open(path.as_ref())?;
        let source = Self::from_reader(file, delimiter)?;
        debug!(
            "Loaded {} rows x {} columns from {}",
            source.len(),
            source.columns,
            path.as_ref().display()
        );
        Ok(source)
    }

    /// Load every record from any [Read]able object.
    pub fn from_reader(reader: impl Read, delimiter: char) -> Result<Self, SourceReadError> {
        let delimiter = ascii_byte(delimiter).ok_or(SourceReadError::BadDelimiter(delimiter))?;
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .delimiter(delimiter)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);

        let records = reader
            .records()
            .collect::<Result<Vec<StringRecord>, csv::Error>>()?;

        let columns = records.first().ok_or(SourceReadError::Empty)?.len();

        Ok(Self { records, columns })
    }
}

impl TabularSource for CsvSource {
    fn columns(&self) -> usize {
        self.columns
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn row(&self, index: usize) -> Result<Vec<f32>, SerializationError> {
        let record = &self.records[index];
        if record.len() != self.columns {
            return Err(SerializationError::WrongArity {
                expected: self.columns,
                found: record.len(),
            });
        }
        record.iter().enumerate().map(parse_cell).collect()
    }
}

/// An in-memory table. The first row fixes the column count.
impl TabularSource for Vec<Vec<f32>> {
    fn columns(&self) -> usize {
        self.first().map_or(0, Vec::len)
    }

    fn len(&self) -> usize {
        <[Vec<f32>]>::len(self)
    }

    fn row(&self, index: usize) -> Result<Vec<f32>, SerializationError> {
        let row = &self[index];
        if row.len() != self.columns() {
            return Err(SerializationError::WrongArity {
                expected: self.columns(),
                found: row.len(),
            });
        }
        Ok(row.clone())
    }
}

// Empty cells become NaN, the same as a dataframe loader would give.
fn parse_cell((column, cell): (usize, &str)) -> Result<f32, SerializationError> {
    if cell.is_empty() {
        return Ok(f32::NAN);
    }
    cell.parse::<f32>()
        .map_err(|_| SerializationError::NonNumeric {
            column,
            cell: cell.to_owned(),
        })
}

/// The delimiter as a single byte, if it is one.
pub(crate) fn ascii_byte(c: char) -> Option<u8> {
    c.is_ascii().then_some(c as u8)
}
