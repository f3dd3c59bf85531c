use std::fmt;
use std::sync::OnceLock;

use serde::Serialize;
use tracing::trace;

use super::{CaptureRecord, ErrorLog};
use crate::bits::Bits;

const LAYER: &str = "FrameRecord";

/// 24-bit access code preceding every recognized burst (0x789 as BPSK
/// symbols).
pub const ACCESS_CODE: &str = "001100000011000011110011";

/// 31-bit lead-out pattern marking the end of a burst's payload.
pub const LEAD_OUT: &str = "100101111010110110110011001111";

pub(crate) fn access_code() -> &'static Bits {
    static BITS: OnceLock<Bits> = OnceLock::new();
    BITS.get_or_init(|| Bits::from_text(ACCESS_CODE).expect("access code to parse"))
}

pub(crate) fn lead_out() -> &'static Bits {
    static BITS: OnceLock<Bits> = OnceLock::new();
    BITS.get_or_init(|| Bits::from_text(LEAD_OUT).expect("lead-out code to parse"))
}

/// A burst recognized by its access code, with the payload de-interleaved
/// back to transmission order.
#[derive(Debug, Clone, Serialize)]
pub struct FrameRecord {
    pub capture: CaptureRecord,
    /// The 32 bits after the access code, selecting the burst format.
    pub header_bits: Bits,
    /// Concatenated de-interleaved 64-bit groups; a multiple of 64 bits.
    pub descrambled: Bits,
    pub lead_out_ok: bool,
    /// Bits after the last complete 64-bit group.
    pub descramble_extra: Bits,
}

/// Undo the transmit-side interleaving of one 64-bit group.
///
/// The group is 32 two-bit symbols `s0..s31`; transmission order is
/// `s31 s29 .. s1` followed by `s30 s28 .. s0`. Groups are independent:
/// symbols never cross a 64-bit boundary.
#[must_use]
pub(crate) fn deinterleave(group: &[u8]) -> Bits {
    debug_assert_eq!(group.len(), 64, "de-interleave works on 64-bit groups");
    let mut out = Vec::with_capacity(64);
    for sym in (1..32).rev().step_by(2) {
        out.extend_from_slice(&group[2 * sym..2 * sym + 2]);
    }
    for sym in (0..31).rev().step_by(2) {
        out.extend_from_slice(&group[2 * sym..2 * sym + 2]);
    }
    Bits::from(out)
}

/// Attempt to upgrade a capture into a frame.
///
/// A burst not starting with the access code is handed back unchanged and
/// unannotated; it is simply not a recognized burst.
pub(crate) fn upgrade(capture: CaptureRecord) -> Result<FrameRecord, CaptureRecord> {
    if !capture.raw_bits.starts_with(access_code()) {
        return Err(capture);
    }

    let payload = capture
        .raw_bits
        .slice(access_code().len(), capture.raw_bits.len());
    let header_bits = payload.slice(0, 32);
    let data = payload.slice(32, payload.len());

    let mut descrambled = Bits::default();
    for group in data.groups(64) {
        descrambled.extend(&deinterleave(group));
    }
    trace!(
        groups = descrambled.len() / 64,
        "de-interleaved burst payload"
    );

    let descramble_extra = data.slice(descrambled.len(), data.len());
    let mut frame = FrameRecord {
        capture,
        header_bits,
        lead_out_ok: descramble_extra.starts_with(lead_out()),
        descrambled,
        descramble_extra,
    };
    if frame.descrambled.is_empty() {
        frame.errors_mut().push(LAYER, "no data to descramble");
    }
    Ok(frame)
}

impl FrameRecord {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.capture.has_errors()
    }

    pub(crate) fn errors_mut(&mut self) -> &mut ErrorLog {
        self.capture.errors_mut()
    }

    pub(crate) fn header_fields(&self) -> String {
        let symbols =
            (self.header_bits.len() + self.descrambled.len() + self.descramble_extra.len()) / 2;
        format!(
            "{} len:{:03} L:{} {}",
            self.capture.header_fields(),
            symbols,
            if self.lead_out_ok { "OK" } else { "no" },
            self.header_bits
        )
    }

    /// The post-group remainder, with a lead-out found anywhere in it set off
    /// in brackets.
    pub(crate) fn trailer_fields(&self) -> String {
        let extra = match self.descramble_extra.find(lead_out()) {
            Some(at) => format!(
                "{}[{}]{}",
                self.descramble_extra.slice(0, at),
                self.descramble_extra.slice(at, at + lead_out().len()),
                self.descramble_extra
                    .slice(at + lead_out().len(), self.descramble_extra.len()),
            ),
            None => self.descramble_extra.to_string(),
        };
        format!(" descr_extra:{extra}")
    }
}

impl fmt::Display for FrameRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IRI: {} {}{}",
            self.header_fields(),
            self.descrambled,
            self.trailer_fields()
        )
    }
}
