//! Frames and their wire encoding.
//!
//! A [Frame] is one time sample of motion data: an ordered run of `f32`s.
//! On the wire a frame travels as exactly one datagram. In the
//! [FrameFormat::Raw] format the datagram is nothing but the values, packed
//! back to back in little-endian order, so the element count is simply the
//! byte length divided by four:
//!
//! ```text
//! | f32 LE | f32 LE | ... | f32 LE |
//! ```
//!
//! [FrameFormat::Headered] prepends four bytes so a consumer can notice when
//! a producer changes its column count mid-stream:
//!
//! ```text
//! | version: u8 | reserved: u8 | count: u16 LE | f32 LE | ... |
//! ```

use crate::error::{DecodeError, SerializationError};

use nom::{
    multi::count,
    number::complete::{le_f32, le_u16, le_u8},
    sequence::tuple,
    IResult,
};
use serde::{Deserialize, Serialize};

/// Width of one encoded element, in bytes.
pub const ELEMENT_WIDTH: usize = 4;

/// Width of the optional packet header, in bytes.
pub const HEADER_WIDTH: usize = 4;

/// The only header version we produce or accept.
pub const HEADER_VERSION: u8 = 1;

/// Largest payload a single IPv4 UDP datagram can carry.
pub const MAX_DATAGRAM_PAYLOAD: usize = 65_507;

/// Value used to fill the leading offset when replicating the upstream
/// producer's packets.
pub const PAD_VALUE: f32 = -1.0;

/// How frames are laid out inside a datagram.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FrameFormat {
    /// Bare little-endian floats, no header. What the legacy tools speak.
    #[default]
    Raw,
    /// A four byte version/count header, then the floats.
    Headered,
}

/// One time sample: an ordered sequence of `f32` values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    values: Vec<f32>,
}

impl Frame {
    /// Wrap a vector of values as a frame.
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Number of values in the frame.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if the frame carries no values at all.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The values, in column order.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Unwrap the frame into its values.
    pub fn into_values(self) -> Vec<f32> {
        self.values
    }

    /// Drops the first `offset` values, which an upstream producer may use
    /// for its own bookkeeping ahead of the real payload.
    pub fn strip_leading(mut self, offset: usize) -> Result<Self, DecodeError> {
        if self.values.len() < offset {
            return Err(DecodeError::ShorterThanOffset {
                len: self.values.len(),
                offset,
            });
        }
        self.values.drain(..offset);
        Ok(self)
    }
}

impl From<Vec<f32>> for Frame {
    fn from(values: Vec<f32>) -> Self {
        Self::new(values)
    }
}

/// Turns rows of values into packets.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameEncoder {
    format: FrameFormat,
    pad_leading: usize,
}

impl FrameEncoder {
    /// An encoder for `format` that prepends `pad_leading` copies of
    /// [PAD_VALUE] to every row.
    pub fn new(format: FrameFormat, pad_leading: usize) -> Self {
        Self {
            format,
            pad_leading,
        }
    }

    /// Number of values each packet carries for a row of `columns` values.
    pub fn frame_len(&self, columns: usize) -> usize {
        self.pad_leading + columns
    }

    /// Encode one row as a single packet, preserving column order.
    pub fn encode(&self, row: &[f32]) -> Result<Vec<u8>, SerializationError> {
        let n = self.frame_len(row.len());
        let header_len = match self.format {
            FrameFormat::Raw => 0,
            FrameFormat::Headered => HEADER_WIDTH,
        };
        if header_len + n * ELEMENT_WIDTH > MAX_DATAGRAM_PAYLOAD {
            return Err(SerializationError::TooLong { len: n });
        }

        let mut packet = Vec::with_capacity(header_len + n * ELEMENT_WIDTH);
        if self.format == FrameFormat::Headered {
            // Guarded by the datagram size check above
            let declared = n as u16;
            packet.push(HEADER_VERSION);
            packet.push(0);
            packet.extend_from_slice(&declared.to_le_bytes());
        }
        packet.extend(
            std::iter::repeat(PAD_VALUE)
                .take(self.pad_leading)
                .chain(row.iter().copied())
                .flat_map(f32::to_le_bytes),
        );

        Ok(packet)
    }
}

/// Encode a row as a raw packet with no padding.
pub fn encode_raw(row: &[f32]) -> Vec<u8> {
    row.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn parse_values(input: &[u8], n: usize) -> IResult<&[u8], Vec<f32>> {
    count(le_f32, n)(input)
}

fn parse_header(input: &[u8]) -> IResult<&[u8], (u8, u8, u16)> {
    tuple((le_u8, le_u8, le_u16))(input)
}

fn decode_values(payload: &[u8]) -> Result<Frame, DecodeError> {
    if payload.len() % ELEMENT_WIDTH != 0 {
        return Err(DecodeError::Misaligned { len: payload.len() });
    }
    match parse_values(payload, payload.len() / ELEMENT_WIDTH) {
        Ok((_remaining, values)) => Ok(Frame::new(values)),
        Err(_) => Err(DecodeError::Misaligned { len: payload.len() }),
    }
}

/// Decode one packet. A trailing partial element is an error, never silently
/// dropped.
pub fn decode(packet: &[u8], format: FrameFormat) -> Result<Frame, DecodeError> {
    match format {
        FrameFormat::Raw => decode_values(packet),
        FrameFormat::Headered => {
            let (payload, (version, _reserved, declared)) =
                parse_header(packet).map_err(|_| DecodeError::MissingHeader { len: packet.len() })?;
            if version != HEADER_VERSION {
                return Err(DecodeError::UnsupportedVersion(version));
            }
            let frame = decode_values(payload)?;
            if frame.len() != declared as usize {
                return Err(DecodeError::CountMismatch {
                    declared: declared as usize,
                    found: frame.len(),
                });
            }
            Ok(frame)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn raw_packet_is_little_endian_in_column_order() {
        let packet = encode_raw(&[1.0, -2.5]);
        assert_eq!(packet.len(), 8);
        assert_eq!(&packet[0..4], &1.0f32.to_le_bytes());
        assert_eq!(&packet[4..8], &(-2.5f32).to_le_bytes());
    }

    #[test]
    fn random_rows_survive_a_round_trip() {
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let cols = rng.gen_range(0..200);
            let row: Vec<f32> = (0..cols).map(|_| rng.gen_range(-1e6..1e6)).collect();
            for format in [FrameFormat::Raw, FrameFormat::Headered] {
                let packet = FrameEncoder::new(format, 0).encode(&row).unwrap();
                let frame = decode(&packet, format).unwrap();
                let bits: Vec<u32> = frame.values().iter().map(|v| v.to_bits()).collect();
                let expected: Vec<u32> = row.iter().map(|v| v.to_bits()).collect();
                assert_eq!(bits, expected);
            }
        }
    }

    #[test]
    fn element_count_follows_byte_length() {
        for n in [0usize, 1, 4, 196] {
            let packet = vec![0u8; n * ELEMENT_WIDTH];
            assert_eq!(decode(&packet, FrameFormat::Raw).unwrap().len(), n);
        }
    }

    #[test]
    fn misaligned_packets_are_rejected() {
        for len in [1usize, 2, 3, 5, 17] {
            let packet = vec![0u8; len];
            assert_eq!(
                decode(&packet, FrameFormat::Raw),
                Err(DecodeError::Misaligned { len })
            );
        }
    }

    #[test]
    fn padding_is_prepended() {
        let packet = FrameEncoder::new(FrameFormat::Raw, 3)
            .encode(&[7.0, 8.0])
            .unwrap();
        let frame = decode(&packet, FrameFormat::Raw).unwrap();
        assert_eq!(frame.values(), &[-1.0, -1.0, -1.0, 7.0, 8.0]);
        assert_eq!(frame.strip_leading(3).unwrap().values(), &[7.0, 8.0]);
    }

    #[test]
    fn strip_leading_rejects_short_frames() {
        let frame = Frame::new(vec![1.0, 2.0]);
        assert_eq!(
            frame.strip_leading(15),
            Err(DecodeError::ShorterThanOffset { len: 2, offset: 15 })
        );
    }

    #[test]
    fn headered_packet_layout() {
        let packet = FrameEncoder::new(FrameFormat::Headered, 0)
            .encode(&[1.0, 2.0, 3.0])
            .unwrap();
        assert_eq!(&packet[0..4], &[HEADER_VERSION, 0, 3, 0]);
        assert_eq!(packet.len(), HEADER_WIDTH + 12);
    }

    #[test]
    fn headered_decode_checks_version_and_count() {
        let mut packet = FrameEncoder::new(FrameFormat::Headered, 0)
            .encode(&[1.0, 2.0])
            .unwrap();

        assert_eq!(
            decode(&packet[..2], FrameFormat::Headered),
            Err(DecodeError::MissingHeader { len: 2 })
        );

        packet[2] = 5;
        assert_eq!(
            decode(&packet, FrameFormat::Headered),
            Err(DecodeError::CountMismatch {
                declared: 5,
                found: 2
            })
        );

        packet[0] = 9;
        assert_eq!(
            decode(&packet, FrameFormat::Headered),
            Err(DecodeError::UnsupportedVersion(9))
        );
    }

    #[test]
    fn oversized_rows_do_not_encode() {
        let row = vec![0.0; MAX_DATAGRAM_PAYLOAD / ELEMENT_WIDTH + 1];
        assert_eq!(
            FrameEncoder::default().encode(&row),
            Err(SerializationError::TooLong { len: row.len() })
        );
    }
}
