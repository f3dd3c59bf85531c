use std::fmt;

use serde::Serialize;

use super::MessagingFrameRecord;
use crate::bits::Bits;

const LAYER: &str = "TextMessageRecord";
// Fatal payload errors surface on the messaging record that stays behind.
const PREV_LAYER: &str = "MessagingFrameRecord";

/// Paging format code carrying 7-bit text.
const FORMAT_TEXT: u32 = 5;

/// End-of-text character code within the 7-bit message body.
const ETX: u32 = 3;

/// A format-5 messaging payload decoded as a 7-bit text page.
#[derive(Debug, Clone, Serialize)]
pub struct TextMessageRecord {
    pub messaging: MessagingFrameRecord,
    /// 6-bit message sequence number.
    pub sequence: u32,
    /// 4 reserved bits, zero on well-formed pages.
    pub zero1: u32,
    /// 10 bits of unknown purpose, kept verbatim.
    pub unknown: Bits,
    pub has_length_field: bool,
    /// Length-field width in bits, when the length field is present.
    pub len_field_len: Option<u32>,
    pub counter: u32,
    pub counter_max: u32,
    /// 7 checksum bits; no validation algorithm is known.
    pub checksum: Bits,
    /// Decoded text; codes below 32 and code 127 appear as `[<code>]`.
    pub text: String,
    /// Undecodable tail shorter than one 7-bit group.
    pub residual: Bits,
}

struct Cursor<'a> {
    bits: &'a Bits,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Option<Bits> {
        if self.pos + n > self.bits.len() {
            return None;
        }
        let bits = self.bits.slice(self.pos, self.pos + n);
        self.pos += n;
        Some(bits)
    }

    fn rest(self) -> Bits {
        self.bits.slice(self.pos, self.bits.len())
    }
}

/// Attempt to decode a messaging payload as a text page.
///
/// Only format 5 qualifies; anything else is handed back unchanged. A
/// payload too short for its fixed fields, or declaring a zero-width length
/// field, aborts the upgrade; annotations gathered before such an abort are
/// discarded with the abandoned record.
pub(crate) fn upgrade(
    mut messaging: MessagingFrameRecord,
) -> Result<TextMessageRecord, MessagingFrameRecord> {
    if messaging.format_code != Some(FORMAT_TEXT) {
        return Err(messaging);
    }
    let payload = match &messaging.payload {
        Some(payload) => payload.clone(),
        None => return Err(messaging),
    };

    let mut cursor = Cursor {
        bits: &payload,
        pos: 0,
    };
    macro_rules! field {
        ($n:expr) => {
            match cursor.take($n) {
                Some(bits) => bits,
                None => {
                    messaging.errors_mut().push(PREV_LAYER, "payload truncated");
                    return Err(messaging);
                }
            }
        };
    }

    // Non-fatal annotations are deferred until the record is known to
    // survive; a later fatal abort drops them along with this layer.
    let mut pending: Vec<&str> = Vec::new();

    let sequence = field!(6).to_unsigned() as u32;
    let zero1 = field!(4).to_unsigned() as u32;
    if zero1 != 0 {
        pending.push("zero1 is not all-zero");
    }
    let unknown = field!(10);
    let has_length_field = field!(1).to_unsigned() == 1;

    let mut len_field_len = None;
    let (counter, counter_max) = if has_length_field {
        let lfl = field!(4).to_unsigned() as u32;
        if lfl == 0 {
            messaging
                .errors_mut()
                .push(PREV_LAYER, "len_field_len unexpectedly 0");
            return Err(messaging);
        }
        len_field_len = Some(lfl);
        let counter = field!(lfl as usize).to_unsigned() as u32;
        let counter_max = field!(lfl as usize).to_unsigned() as u32;
        if lfl > 2 {
            // The declared width is honored even outside the expected range.
            pending.push("len_field_len not 1 or 2");
        }
        (counter, counter_max)
    } else {
        (0, 0)
    };

    if field!(1).to_unsigned() != 0 {
        pending.push("zero2 is not zero");
    }
    let checksum = field!(7);
    let body = cursor.rest();

    let mut text = String::new();
    let mut ended = false;
    for group in body.groups(7) {
        let code = group.iter().fold(0u32, |acc, &b| acc << 1 | u32::from(b));
        if code == ETX {
            ended = true;
        } else if ended {
            pending.push("ETX inside text");
        }
        if code < 32 || code == 127 {
            text.push_str(&format!("[{code}]"));
        } else {
            text.push(char::from(code as u8));
        }
    }
    let residual = body.slice(body.len() - body.len() % 7, body.len());

    for msg in pending {
        messaging.errors_mut().push(LAYER, msg);
    }

    Ok(TextMessageRecord {
        messaging,
        sequence,
        zero1,
        unknown,
        has_length_field,
        len_field_len,
        counter,
        counter_max,
        checksum,
        text,
        residual,
    })
}

impl TextMessageRecord {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.messaging.has_errors()
    }

    pub(crate) fn header_fields(&self) -> String {
        format!(
            "{} seq:{:02} {:>10} {}/{}",
            self.messaging.header_fields(),
            self.sequence,
            self.unknown,
            self.counter,
            self.counter_max
        )
    }
}

impl fmt::Display for TextMessageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Deepest layer reuses the base MSG: tag.
        write!(
            f,
            "MSG: {} {:<65} +{:<6}{}",
            self.header_fields(),
            self.text,
            self.residual,
            self.messaging.corrected.frame.trailer_fields()
        )
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::decode::fec::tests::{build_block, frame_with_blocks};
    use crate::decode::{fec, messaging};

    /// Build a messaging record whose payload is exactly `payload`.
    ///
    /// The data stream is header(20) + ric(22) + format(5) + payload with no
    /// flags set, so the payload length must be 13 mod 20 to fill whole
    /// blocks.
    fn messaging_with_payload(format_code: u32, payload: &str) -> MessagingFrameRecord {
        let mut content = Bits::from_text(&"0".repeat(42)).unwrap();
        for shift in (0..5).rev() {
            content.push((format_code >> shift & 1) as u8);
        }
        content.extend(&Bits::from_text(payload).unwrap());
        assert_eq!(content.len() % 20, 0, "test payload must fill whole blocks");
        let blocks: Vec<Bits> = content
            .groups(20)
            .map(|data| {
                let value = data.iter().fold(0u32, |acc, &b| acc << 1 | u32::from(b));
                build_block(0, value)
            })
            .collect();
        messaging::upgrade(fec::upgrade(frame_with_blocks(&blocks)).unwrap())
    }

    fn seven_bit(text: &str) -> String {
        text.bytes().map(|b| format!("{b:07b}")).collect()
    }

    #[test]
    fn non_text_format_is_not_upgraded() {
        let record = messaging_with_payload(4, &"0".repeat(93));
        assert!(upgrade(record).is_err());
    }

    #[test]
    fn decodes_sequence_counters_and_text() {
        let payload = format!(
            "001011{}{}{}{}{}{}{}{}",
            "0000",       // zero1
            "0110011001", // unknown
            "1",          // has length field
            "0010",       // lfl = 2
            "01",         // counter = 1
            "11",         // counter max = 3
            "0",          // zero2
            "1010101",    // checksum
        ) + &seven_bit("DECODED\u{3}");
        assert_eq!(payload.len(), 93);
        let record = upgrade(messaging_with_payload(5, &payload)).unwrap();
        assert_eq!(record.sequence, 11);
        assert_eq!(record.zero1, 0);
        assert_eq!(record.unknown.to_string(), "0110011001");
        assert!(record.has_length_field);
        assert_eq!(record.len_field_len, Some(2));
        assert_eq!(record.counter, 1);
        assert_eq!(record.counter_max, 3);
        assert_eq!(record.checksum.to_string(), "1010101");
        assert_eq!(record.text, "DECODED[3]");
        assert!(record.residual.is_empty());
        assert!(!record.has_errors());
    }

    #[test]
    fn etx_then_text_is_annotated_but_decoded() {
        let payload = format!("000001{}{}{}{}{}", "0000", "0000000000", "0", "0", "1111111")
            + &seven_bit("A\u{3}A")
            + "000";
        assert_eq!(payload.len(), 53);
        let record = upgrade(messaging_with_payload(5, &payload)).unwrap();
        assert_eq!(record.sequence, 1);
        assert_eq!(record.text, "A[3]A");
        assert_eq!(record.residual.to_string(), "000");
        assert!(record
            .messaging
            .corrected
            .frame
            .capture
            .errors
            .messages()
            .contains(&"TextMessageRecord: ETX inside text".to_string()));
    }

    #[test_case(65, "A" ; "printable renders as ascii")]
    #[test_case(7, "[7]" ; "control renders bracketed")]
    #[test_case(127, "[127]" ; "delete renders bracketed")]
    fn character_rendering(code: u32, expected: &str) {
        let mut group = String::new();
        for shift in (0..7).rev() {
            group.push(if code >> shift & 1 == 1 { '1' } else { '0' });
        }
        // Zero padding decodes as trailing [0] characters; only the first
        // character is under test.
        let payload = format!("000000{}{}{}{}{}", "0000", "0000000000", "0", "0", "0000000")
            + &group
            + &"0".repeat(17);
        assert_eq!(payload.len(), 53);
        let record = upgrade(messaging_with_payload(5, &payload)).unwrap();
        assert!(record.text.starts_with(expected));
    }

    #[test]
    fn zero_length_field_aborts() {
        let payload = format!("000000{}{}{}{}", "0000", "0000000000", "1", "0000");
        let payload = payload.clone() + &"0".repeat(93 - payload.len());
        let record = messaging_with_payload(5, &payload);
        let messaging = upgrade(record).expect_err("lfl=0 must abort");
        assert!(messaging
            .corrected
            .frame
            .capture
            .errors
            .messages()
            .contains(&"MessagingFrameRecord: len_field_len unexpectedly 0".to_string()));
    }

    #[test]
    fn oversized_length_field_is_used_anyway() {
        // lfl=4 is outside the expected {1,2}; the declared width is still
        // honored, so the counters are read as 4 bits each.
        let payload = format!(
            "000000{}{}{}{}{}{}{}{}",
            "0000", "0000000000", "1", "0100", "0101", "0110", "0", "0000000"
        );
        let payload = payload.clone() + &"0".repeat(93 - payload.len());
        let record = upgrade(messaging_with_payload(5, &payload)).unwrap();
        assert_eq!(record.len_field_len, Some(4));
        assert_eq!(record.counter, 5);
        assert_eq!(record.counter_max, 6);
        assert!(record.has_errors());
    }

    #[test]
    fn truncated_payload_aborts() {
        // 13 payload bits: too short for even the fixed fields.
        let record = messaging_with_payload(5, &"0".repeat(13));
        let messaging = upgrade(record).expect_err("short payload must abort");
        assert!(messaging
            .corrected
            .frame
            .capture
            .errors
            .messages()
            .contains(&"MessagingFrameRecord: payload truncated".to_string()));
    }

    #[test]
    fn residual_keeps_partial_tail() {
        let payload = format!("000000{}{}{}{}{}", "0000", "0000000000", "0", "0", "0000000")
            + &seven_bit("OK")
            + "0000000"
            + "101";
        assert_eq!(payload.len(), 53);
        let record = upgrade(messaging_with_payload(5, &payload)).unwrap();
        assert!(record.text.starts_with("OK"));
        assert_eq!(record.residual.to_string(), "101");
    }
}
