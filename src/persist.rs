//! Writes an accumulated table out as delimited text, one frame per line.
//!
//! Values use the shortest representation that reads back as the same
//! `f32`, always with a fractional part (`1.0`, `0.1`, `1e-7`), so the same
//! table always produces the same bytes.

use crate::accumulator::FrameAccumulator;
use crate::error::PersistenceError;

use log::info;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

/// Write every row of `rows` to `out`, joining fields with `delimiter`.
pub fn write_delimited(
    rows: &[Vec<f32>],
    out: &mut impl Write,
    delimiter: char,
) -> Result<(), PersistenceError> {
    let mut sep = [0u8; 4];
    let sep = delimiter.encode_utf8(&mut sep).as_bytes();

    for row in rows {
        for (i, value) in row.iter().enumerate() {
            if i > 0 {
                out.write_all(sep)?;
            }
            write!(out, "{:?}", value)?;
        }
        out.write_all(b"\n")?;
    }
    out.flush()?;

    Ok(())
}

/// Create (or truncate) the file at `path` and write the accumulator to it.
/// A failure part way through leaves a corrupt file behind.
pub fn write_to_path(
    acc: &FrameAccumulator,
    path: impl AsRef<Path>,
    delimiter: char,
) -> Result<(), PersistenceError> {
    let mut out = BufWriter::new(File::create(path.as_ref())?);
    write_delimited(acc.rows(), &mut out, delimiter)?;
    info!(
        "Wrote {} frames to {}",
        acc.len(),
        path.as_ref().display()
    );
    Ok(())
}
