use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::{Error, Result};

/// An index-addressable sequence of bits.
///
/// Capture lines carry bursts as `'0'`/`'1'` text, and every decode layer
/// slices, regroups, and reinterprets that stream at bit granularity, so bits
/// are kept individually addressable rather than packed. Slicing follows the
/// clamped semantics of the capture tool's own text handling: out-of-range
/// offsets yield a shorter (possibly empty) sequence, never an error.
///
/// # Example
/// ```
/// use iridium::Bits;
///
/// let bits = Bits::from_text("10110").unwrap();
/// assert_eq!(bits.len(), 5);
/// assert_eq!(bits.slice(1, 3).to_string(), "01");
/// assert_eq!(bits.to_unsigned(), 0b10110);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Bits(Vec<u8>);

impl Bits {
    /// Parse from `'0'`/`'1'` text.
    ///
    /// # Errors
    /// [`Error::InvalidBits`] if any other character is present.
    pub fn from_text(s: &str) -> Result<Self> {
        s.bytes()
            .map(|b| match b {
                b'0' => Ok(0),
                b'1' => Ok(1),
                _ => Err(Error::InvalidBits(s.to_string())),
            })
            .collect::<Result<Vec<u8>>>()
            .map(Bits)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The bit at `idx`, or `None` past the end.
    #[must_use]
    pub fn bit(&self, idx: usize) -> Option<u8> {
        self.0.get(idx).copied()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Copy of the bits in `[start, end)`, clamped to the available range.
    #[must_use]
    pub fn slice(&self, start: usize, end: usize) -> Bits {
        let start = start.min(self.0.len());
        let end = end.min(self.0.len());
        if end <= start {
            return Bits::default();
        }
        Bits(self.0[start..end].to_vec())
    }

    #[must_use]
    pub fn starts_with(&self, prefix: &Bits) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Offset of the first occurrence of `pattern`, if any.
    #[must_use]
    pub fn find(&self, pattern: &Bits) -> Option<usize> {
        if pattern.is_empty() || pattern.len() > self.len() {
            return None;
        }
        self.0
            .windows(pattern.len())
            .position(|w| w == pattern.as_slice())
    }

    /// Non-overlapping complete groups of `n` bits; a partial tail is not
    /// produced.
    pub fn groups(&self, n: usize) -> impl Iterator<Item = &[u8]> {
        self.0.chunks_exact(n)
    }

    /// Unsigned integer value, first bit most significant.
    ///
    /// # Panics
    /// In debug builds, if longer than 64 bits.
    #[must_use]
    pub fn to_unsigned(&self) -> u64 {
        debug_assert!(self.len() <= 64, "bit sequence too long for u64");
        self.0.iter().fold(0, |acc, &b| acc << 1 | u64::from(b))
    }

    /// Unsigned integer value with the bit order reversed: the first bit is
    /// the least significant. The recipient-id field is transmitted this way.
    #[must_use]
    pub fn to_unsigned_reversed(&self) -> u64 {
        debug_assert!(self.len() <= 64, "bit sequence too long for u64");
        self.0
            .iter()
            .enumerate()
            .fold(0, |acc, (i, &b)| acc | u64::from(b) << i)
    }

    #[must_use]
    pub fn count_ones(&self) -> usize {
        self.0.iter().filter(|&&b| b == 1).count()
    }

    #[must_use]
    pub fn all_ones(&self) -> bool {
        self.0.iter().all(|&b| b == 1)
    }

    pub fn push(&mut self, bit: u8) {
        debug_assert!(bit <= 1);
        self.0.push(bit);
    }

    pub fn extend(&mut self, other: &Bits) {
        self.0.extend_from_slice(&other.0);
    }

    #[must_use]
    pub fn concat(&self, other: &Bits) -> Bits {
        let mut out = self.clone();
        out.extend(other);
        out
    }
}

impl From<Vec<u8>> for Bits {
    fn from(bits: Vec<u8>) -> Self {
        debug_assert!(bits.iter().all(|&b| b <= 1));
        Bits(bits)
    }
}

impl FromStr for Bits {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Bits::from_text(s)
    }
}

impl fmt::Display for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s: String = self.0.iter().map(|&b| if b == 1 { '1' } else { '0' }).collect();
        f.pad(&s)
    }
}

impl Serialize for Bits {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
