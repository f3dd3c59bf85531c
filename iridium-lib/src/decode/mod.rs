//! The burst upgrade chain.
//!
//! Each layer consumes the previous layer's record and either produces the
//! next, more specific record or hands the input back unchanged. A record
//! with any error annotation stops upgrading but still prints.

mod bch;
mod capture;
mod decoder;
mod fec;
mod frame;
mod messaging;
mod paging;

pub use bch::{encode, repair, syndrome, Repair, MESSAGING_POLY};
pub use capture::CaptureRecord;
pub use decoder::Decoder;
pub use fec::{CorrectedFrameRecord, MESSAGING_HEADER};
pub use frame::{FrameRecord, ACCESS_CODE, LEAD_OUT};
pub use messaging::MessagingFrameRecord;
pub use paging::TextMessageRecord;

use std::fmt;

use serde::Serialize;

use crate::Result;

/// Ordered decode annotations for one burst.
///
/// Entries are prefixed with the recording layer's type name; a repeat of the
/// most recent entry is suppressed.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorLog(Vec<String>);

impl ErrorLog {
    pub(crate) fn push(&mut self, layer: &str, msg: &str) {
        let entry = format!("{layer}: {msg}");
        if self.0.last() != Some(&entry) {
            self.0.push(entry);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn messages(&self) -> &[String] {
        &self.0
    }

    /// Comma-joined form used for the ` ERR:` line suffix.
    #[must_use]
    pub fn summary(&self) -> String {
        self.0.join(", ")
    }
}

/// The deepest successfully decoded interpretation of one captured burst.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "record")]
pub enum Record {
    Capture(CaptureRecord),
    Frame(FrameRecord),
    Corrected(CorrectedFrameRecord),
    Messaging(MessagingFrameRecord),
    Text(TextMessageRecord),
}

impl Record {
    /// The capture-layer fields, common to every variant.
    #[must_use]
    pub fn capture(&self) -> &CaptureRecord {
        match self {
            Record::Capture(r) => r,
            Record::Frame(r) => &r.capture,
            Record::Corrected(r) => &r.frame.capture,
            Record::Messaging(r) => &r.corrected.frame.capture,
            Record::Text(r) => &r.messaging.corrected.frame.capture,
        }
    }

    #[must_use]
    pub fn errors(&self) -> &ErrorLog {
        &self.capture().errors
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors().is_empty()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Record::Capture(r) => write!(f, "{r}")?,
            Record::Frame(r) => write!(f, "{r}")?,
            Record::Corrected(r) => write!(f, "{r}")?,
            Record::Messaging(r) => write!(f, "{r}")?,
            Record::Text(r) => write!(f, "{r}")?,
        }
        if self.has_errors() {
            write!(f, " ERR:{}", self.errors().summary())?;
        }
        Ok(())
    }
}

/// Decode one capture line through the whole chain.
///
/// # Errors
/// [`crate::Error::MalformedCaptureLine`] if the line does not match the RAW
/// schema at all; such a line carries no usable record.
pub fn decode_line(line: &str) -> Result<Record> {
    let capture = capture::parse(line.trim())?;
    Ok(upgrade(capture))
}

/// Run the upgrade chain on an already-parsed capture record.
///
/// Any error annotation, fatal or not, halts the chain at the layer that is
/// complete at that point.
#[must_use]
pub fn upgrade(capture: CaptureRecord) -> Record {
    if capture.has_errors() {
        return Record::Capture(capture);
    }
    let frame = match frame::upgrade(capture) {
        Ok(frame) => frame,
        Err(capture) => return Record::Capture(capture),
    };
    if frame.has_errors() {
        return Record::Frame(frame);
    }
    let corrected = match fec::upgrade(frame) {
        Ok(corrected) => corrected,
        Err(frame) => return Record::Frame(frame),
    };
    if corrected.has_errors() || corrected.data_bits.is_empty() {
        return Record::Corrected(corrected);
    }
    let messaging = messaging::upgrade(corrected);
    if messaging.has_errors() {
        return Record::Messaging(messaging);
    }
    match paging::upgrade(messaging) {
        Ok(text) => Record::Text(text),
        Err(messaging) => Record::Messaging(messaging),
    }
}
