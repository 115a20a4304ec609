//! MocapRelay moves motion-capture frames between a recording and whatever
//! consumes it, one UDP datagram per frame. A frame is a row of `f32`s (joint
//! positions, rotations, and so on) for a single instant.
//!
//! The sending half reads a delimited text recording and replays it row by
//! row at a fixed cadence, optionally forever. The receiving half listens on
//! a UDP port, decodes each datagram back into a frame, and accumulates the
//! frames into a table that can be written out as delimited text when the
//! session ends.
//!
//! The wire format is deliberately bare: a datagram is just the frame's
//! values as little-endian `f32`s, so the element count is the datagram's
//! length divided by four. See [frame] for the details and for the optional
//! headered layout.
//!
//! Nothing is retransmitted or reordered. A lost datagram is a lost frame,
//! and frames are accumulated in the order they arrive.

#![warn(missing_docs)]
pub mod accumulator;
#[allow(missing_docs)]
pub mod args;
pub mod capture;
pub mod config;
pub mod error;
pub mod frame;
pub mod gui;
pub mod interrupt;
pub mod persist;
pub mod receiver;
pub mod sender;
pub mod source;
