use std::fmt;
use std::sync::OnceLock;

use serde::Serialize;
use tracing::debug;

use super::bch::{self, Repair, MESSAGING_POLY};
use super::{ErrorLog, FrameRecord};
use crate::bits::Bits;

// Fatal block errors surface on the frame that stays behind.
const LAYER: &str = "FrameRecord";

/// 32-bit frame header selecting the messaging (paging) burst format.
pub const MESSAGING_HEADER: &str = "00110011111100110011001111110011";

pub(crate) fn messaging_header() -> &'static Bits {
    static BITS: OnceLock<Bits> = OnceLock::new();
    BITS.get_or_init(|| Bits::from_text(MESSAGING_HEADER).expect("messaging header to parse"))
}

/// A messaging frame whose blocks all passed BCH repair and parity.
///
/// Each 32-bit block of the descrambled stream is 1 flag bit, 20 data bits,
/// 10 code bits, and 1 parity bit. Only the flag and data survive into this
/// record; the flags form a side channel that the assembler uses to locate
/// framing regions.
#[derive(Debug, Clone, Serialize)]
pub struct CorrectedFrameRecord {
    pub frame: FrameRecord,
    /// Concatenated 20-bit data fields, one per block.
    pub data_bits: Bits,
    /// One flag bit per block.
    pub flag_bits: Bits,
    /// Number of blocks that needed a bit corrected.
    pub fixed_errors: u32,
}

/// Attempt to upgrade a frame by repairing and validating every block.
///
/// A frame without the messaging header is handed back unchanged. A single
/// uncorrectable or parity-odd block aborts the whole upgrade: no partial
/// frame is produced.
pub(crate) fn upgrade(mut frame: FrameRecord) -> Result<CorrectedFrameRecord, FrameRecord> {
    if frame.header_bits != *messaging_header() {
        return Err(frame);
    }

    let mut data_bits = Bits::default();
    let mut flag_bits = Bits::default();
    let mut fixed_errors = 0u32;

    for block in frame.descrambled.clone().groups(32) {
        // flag + data + code as one 31-bit codeword, parity bit separate
        let mut word = block[..31]
            .iter()
            .fold(0u32, |acc, &b| acc << 1 | u32::from(b));
        let parity_bit = block[31];

        match bch::repair(word, 31, MESSAGING_POLY) {
            Repair::Clean => {}
            Repair::Corrected(corrected) => {
                debug!(block = flag_bits.len(), "corrected one bit in block");
                word = corrected;
                fixed_errors += 1;
            }
            Repair::Uncorrectable => {
                frame.errors_mut().push(LAYER, "BCH decode failed");
                return Err(frame);
            }
        }

        if (word.count_ones() + u32::from(parity_bit)) % 2 == 1 {
            frame.errors_mut().push(LAYER, "parity error");
            return Err(frame);
        }

        flag_bits.push((word >> 30 & 1) as u8);
        for shift in (10..30).rev() {
            data_bits.push((word >> shift & 1) as u8);
        }
    }

    Ok(CorrectedFrameRecord {
        frame,
        data_bits,
        flag_bits,
        fixed_errors,
    })
}

impl CorrectedFrameRecord {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.frame.has_errors()
    }

    pub(crate) fn errors_mut(&mut self) -> &mut ErrorLog {
        self.frame.errors_mut()
    }
}

impl fmt::Display for CorrectedFrameRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Correction does not change the printed interpretation.
        write!(f, "{}", self.frame)
    }
}
