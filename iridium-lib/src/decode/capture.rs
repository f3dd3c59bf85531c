use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use super::ErrorLog;
use crate::bits::Bits;
use crate::{Error, Result};

const LAYER: &str = "CaptureRecord";

/// One RAW line: prefix, filename, timestamp, frequency, access/lead-out
/// status (reported by the capture tool, not trusted here), confidence,
/// level, raw bit count, decorated bit string, optional trailing text.
fn line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^RAW: ([^ ]*) (\d+) (\d+) A:(\w+) L:(\w+) +(\d+)% ([\d.]+) +(\d+) ([\[\]<> 01]+)(.*)$")
            .expect("capture line regex to compile")
    })
}

/// One captured burst as reported by the capture tool.
///
/// This is the root of the upgrade chain; it is always printable, whatever
/// the deeper layers make of the bits.
#[derive(Debug, Clone, Serialize)]
pub struct CaptureRecord {
    pub filename: String,
    pub timestamp: u64,
    pub frequency: u64,
    /// Demodulation confidence, percent.
    pub confidence: u32,
    /// Signal level as reported, reprinted with three decimals.
    pub level: f64,
    /// Burst bits with `[`, `]`, `<`, `>`, and space decoration stripped.
    pub raw_bits: Bits,
    /// Verbatim text after the bit string, if any.
    pub extra_data: Option<String>,
    pub errors: ErrorLog,
}

/// Parse one trimmed capture line.
///
/// Trailing text after the bit string is kept and annotated but is not
/// fatal; a line that does not match the schema at all is.
///
/// # Errors
/// [`Error::MalformedCaptureLine`] on a schema mismatch.
pub(crate) fn parse(line: &str) -> Result<CaptureRecord> {
    let caps = line_re()
        .captures(line)
        .ok_or_else(|| Error::MalformedCaptureLine(line.to_string()))?;

    let number = |idx: usize| -> Result<u64> {
        caps[idx]
            .parse()
            .map_err(|_| Error::MalformedCaptureLine(line.to_string()))
    };
    let level: f64 = caps[7]
        .parse()
        .map_err(|_| Error::MalformedCaptureLine(line.to_string()))?;

    let mut decorated = caps[9].to_string();
    decorated.retain(|c| c == '0' || c == '1');
    let raw_bits = Bits::from_text(&decorated)?;

    let mut record = CaptureRecord {
        filename: caps[1].to_string(),
        timestamp: number(2)?,
        frequency: number(3)?,
        confidence: u32::try_from(number(6)?)
            .map_err(|_| Error::MalformedCaptureLine(line.to_string()))?,
        level,
        raw_bits,
        extra_data: None,
        errors: ErrorLog::default(),
    };
    if !caps[10].is_empty() {
        record.extra_data = Some(caps[10].to_string());
        record.errors.push(LAYER, "extra data after bit string");
    }
    Ok(record)
}

impl CaptureRecord {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub(crate) fn errors_mut(&mut self) -> &mut ErrorLog {
        &mut self.errors
    }

    /// Fixed-width capture fields shared by every output line.
    pub(crate) fn header_fields(&self) -> String {
        format!(
            "{} {:07} {:010} {:3}% {:.3}",
            self.filename, self.timestamp, self.frequency, self.confidence, self.level
        )
    }
}

impl fmt::Display for CaptureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MSG: {} {}", self.header_fields(), self.raw_bits)?;
        if let Some(extra) = &self.extra_data {
            write!(f, " {extra}")?;
        }
        Ok(())
    }
}
