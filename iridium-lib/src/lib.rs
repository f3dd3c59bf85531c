//! Decoding of captured Iridium paging bursts.
//!
//! Input is one `RAW:` text line per captured burst, as produced by an
//! external capture/demodulation tool. Each line is parsed into a
//! [`decode::CaptureRecord`] and pushed through a chain of upgrade attempts:
//! burst frame (access-code strip + symbol de-interleave), FEC-corrected
//! frame (BCH repair + parity), messaging frame (flag-bit driven framing),
//! and finally 7-bit paging text. Decoding stops at the deepest layer that
//! parses; every line yields a printable [`Record`].

mod error;

pub mod bits;
pub mod decode;

pub use bits::Bits;
pub use decode::{decode_line, Decoder, Record};
pub use error::{Error, Result};
