use std::fmt;

use serde::Serialize;

use super::{CorrectedFrameRecord, ErrorLog};
use crate::bits::Bits;

const LAYER: &str = "MessagingFrameRecord";

/// A corrected frame split into its messaging regions.
///
/// The per-block flag bits drive the framing: the first flag marks an 80-bit
/// pre-message region, the trailing one or two flags mark all-ones trailer
/// blocks. Whatever remains beyond the fixed header carries the recipient
/// id, format code, and payload, when long enough to hold them.
#[derive(Debug, Clone, Serialize)]
pub struct MessagingFrameRecord {
    pub corrected: CorrectedFrameRecord,
    /// First 20 data bits; not interpreted further.
    pub fixed_header: Bits,
    /// 0 or 80 bits.
    pub pre_message: Bits,
    /// 0, 20, or 40 bits; expected all-ones.
    pub trailer: Bits,
    /// Recipient identifier, transmitted least-significant bit first.
    pub recipient_id: Option<u32>,
    pub format_code: Option<u32>,
    pub payload: Option<Bits>,
}

/// Split a corrected frame into messaging regions. Never rejects; flags only
/// decide which optional regions exist.
pub(crate) fn upgrade(mut corrected: CorrectedFrameRecord) -> MessagingFrameRecord {
    let data = corrected.data_bits.clone();
    let flags = corrected.flag_bits.clone();

    let fixed_header = data.slice(0, 20);
    let mut end = data.len();
    let mut trailer = Bits::default();

    if flags.bit(flags.len().wrapping_sub(1)) == Some(1) {
        trailer = data.slice(end - 20, end);
        if !trailer.all_ones() {
            corrected
                .errors_mut()
                .push(LAYER, "trailer present but not all-1");
        }
        end -= 20;
        if flags.len() >= 2 && flags.bit(flags.len() - 2) == Some(1) {
            trailer = data.slice(end - 20, end).concat(&trailer);
            if !trailer.all_ones() {
                corrected
                    .errors_mut()
                    .push(LAYER, "second trailer present but not all-1");
            }
            end -= 20;
        }
    }

    let buffer = data.slice(0, end);
    let rest = if flags.bit(0) == Some(1) {
        buffer.slice(100, buffer.len())
    } else {
        buffer.slice(20, buffer.len())
    };
    let pre_message = if flags.bit(0) == Some(1) {
        buffer.slice(20, 100)
    } else {
        Bits::default()
    };

    let mut record = MessagingFrameRecord {
        corrected,
        fixed_header,
        pre_message,
        trailer,
        recipient_id: None,
        format_code: None,
        payload: None,
    };
    if rest.len() > 20 {
        record.recipient_id = Some(rest.slice(0, 22).to_unsigned_reversed() as u32);
        record.format_code = Some(rest.slice(22, 27).to_unsigned() as u32);
        record.payload = Some(rest.slice(27, rest.len()));
    }
    record
}

impl MessagingFrameRecord {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.corrected.has_errors()
    }

    pub(crate) fn errors_mut(&mut self) -> &mut ErrorLog {
        self.corrected.errors_mut()
    }

    pub(crate) fn header_fields(&self) -> String {
        let mut s = format!(
            "{} odd:{:<26} {} {:<80}",
            self.corrected.frame.header_fields(),
            self.corrected.flag_bits,
            self.fixed_header,
            self.pre_message
        );
        if let (Some(ric), Some(fmt_code)) = (self.recipient_id, self.format_code) {
            s.push_str(&format!(" ric:{ric:07} fmt:{fmt_code:02}"));
        }
        s
    }
}

impl fmt::Display for MessagingFrameRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IMS: {}", self.header_fields())?;
        if let Some(payload) = &self.payload {
            write!(f, " {payload}")?;
        }
        write!(f, "{}", self.corrected.frame.trailer_fields())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::fec::tests::{build_block, frame_with_blocks};
    use crate::decode::fec;

    fn corrected(blocks: &[(u8, u32)]) -> CorrectedFrameRecord {
        let blocks: Vec<Bits> = blocks
            .iter()
            .map(|&(flag, data)| build_block(flag, data))
            .collect();
        fec::upgrade(frame_with_blocks(&blocks)).unwrap()
    }

    #[test]
    fn plain_frame_has_header_only() {
        let record = upgrade(corrected(&[(0, 0xa_aaaa), (0, 0)]));
        assert_eq!(record.fixed_header.to_unsigned(), 0xa_aaaa);
        assert!(record.pre_message.is_empty());
        assert!(record.trailer.is_empty());
        assert_eq!(record.recipient_id, None);
        assert!(!record.has_errors());
    }

    #[test]
    fn first_and_last_flags_mark_pre_message_and_trailer() {
        // header + 4 pre blocks + 2 payload-bearing blocks + all-ones trailer
        let record = upgrade(corrected(&[
            (1, 0x00001),
            (0, 0x11111),
            (0, 0x22222),
            (0, 0x33333),
            (0, 0x44444),
            (0, 0x00000),
            (0, 0x00000),
            (1, 0xfffff),
        ]));
        assert_eq!(record.pre_message.len(), 80);
        assert_eq!(record.pre_message.slice(0, 20).to_unsigned(), 0x11111);
        assert_eq!(record.trailer.len(), 20);
        assert!(record.trailer.all_ones());
        assert!(!record.has_errors());
        // 160 - 20 trailer - 100 header+pre = 40 remaining > 20
        assert!(record.payload.is_some());
    }

    #[test]
    fn two_trailing_flags_take_a_double_trailer() {
        let record = upgrade(corrected(&[
            (0, 0x00001),
            (0, 0x22222),
            (0, 0x33333),
            (0, 0x44444),
            (1, 0xfffff),
            (1, 0xfffff),
        ]));
        assert_eq!(record.trailer.len(), 40);
        assert!(record.trailer.all_ones());
        assert!(!record.has_errors());
    }

    #[test]
    fn non_ones_trailer_is_annotated() {
        let record = upgrade(corrected(&[(0, 0x00001), (1, 0xffffe)]));
        assert_eq!(record.trailer.len(), 20);
        assert!(record.has_errors());
        assert_eq!(
            record.corrected.frame.capture.errors.messages(),
            &["MessagingFrameRecord: trailer present but not all-1"]
        );
    }

    #[test]
    fn recipient_id_is_bit_reversed() {
        // rest starts after the 20-bit header: 22 ric bits with only the
        // first one set decode to 1.
        let record = upgrade(corrected(&[
            (0, 0x00000),
            (0, 0b1000_0000_0000_0000_0000),
            (0, 0b0000_0000_0000_0000_0000),
        ]));
        assert_eq!(record.recipient_id, Some(1));
        assert_eq!(record.format_code, Some(0));
        assert_eq!(record.payload.as_ref().unwrap().len(), 13);
    }

    #[test]
    fn short_remainder_leaves_optional_fields_unset() {
        let record = upgrade(corrected(&[(0, 0x12345), (0, 0x00000)]));
        // 20 bits past the header is not enough for ric + format.
        assert_eq!(record.recipient_id, None);
        assert_eq!(record.format_code, None);
        assert!(record.payload.is_none());
    }
}
