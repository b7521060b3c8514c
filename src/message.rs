// ABOUTME: Incoming message type, SMS timestamps, and multi-part reassembly
// ABOUTME: Also hosts the text-mode hex-UCS2 heuristics ported from field-tested modem behavior

use crate::pdu::Concat;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Mutex;

/// An SMS timestamp as the network reports it: two-digit year, local time,
/// zone offset in quarter hours. Kept verbatim rather than normalized — the
/// service-center clock is not trustworthy enough to anchor arithmetic on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmsTimestamp {
    pub year: u8,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub tz_quarter_hours: i8,
}

impl SmsTimestamp {
    /// Construct with field validation; out-of-range values yield `None`.
    pub fn new(
        year: u8,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
        tz_quarter_hours: i8,
    ) -> Option<Self> {
        if year > 99
            || !(1..=12).contains(&month)
            || !(1..=31).contains(&day)
            || hour > 23
            || minute > 59
            || second > 59
        {
            return None;
        }
        Some(SmsTimestamp {
            year,
            month,
            day,
            hour,
            minute,
            second,
            tz_quarter_hours,
        })
    }

    /// Parse the text-mode form, `YY/MM/DD,HH:MM:SS` with an optional
    /// quarter-hour zone suffix like `+08` or `-20`. The format is not
    /// standardized across vendors; unparseable input yields `None`.
    pub fn parse_text(s: &str) -> Option<Self> {
        let s = s.trim().trim_matches('"');
        let (date, time) = s.split_once(',')?;

        let mut date_parts = date.split('/');
        let year = date_parts.next()?.parse().ok()?;
        let month = date_parts.next()?.parse().ok()?;
        let day = date_parts.next()?.parse().ok()?;

        // Split a trailing +zz/-zz off the time portion, if present.
        let (time, tz) = match time.rfind(['+', '-']) {
            Some(pos) => (&time[..pos], time[pos..].parse::<i8>().ok()?),
            None => (time, 0),
        };

        let mut time_parts = time.split(':');
        let hour = time_parts.next()?.parse().ok()?;
        let minute = time_parts.next()?.parse().ok()?;
        let second = time_parts.next()?.trim().parse().ok()?;

        SmsTimestamp::new(year, month, day, hour, minute, second, tz)
    }
}

impl fmt::Display for SmsTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let zone_minutes = i32::from(self.tz_quarter_hours) * 15;
        write!(
            f,
            "{:02}/{:02}/{:02} {:02}:{:02}:{:02} {}{:02}:{:02}",
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
            if zone_minutes < 0 { '-' } else { '+' },
            zone_minutes.abs() / 60,
            zone_minutes.abs() % 60,
        )
    }
}

/// One received SMS, fully decoded. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    /// Originating address as reported by the network.
    pub sender: String,
    /// Service-center receive time, when it could be parsed.
    pub timestamp: Option<SmsTimestamp>,
    /// Decoded message text. For a multi-part message this is the joined
    /// whole, only surfaced once every part has arrived.
    pub text: String,
    /// `(reference, total_parts)` when this was reassembled from a
    /// concatenated message.
    pub concat: Option<(u16, u8)>,
}

impl fmt::Display for IncomingMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<IncomingMessage from {}: {:?}>", self.sender, self.text)
    }
}

struct PartialMessage {
    total_parts: u8,
    timestamp: Option<SmsTimestamp>,
    parts: BTreeMap<u8, String>,
}

/// Buffers parts of concatenated messages until the set is complete.
///
/// Parts are keyed by (sender, reference) and held with no eviction timer;
/// an abandoned partial set lives until the session is torn down. The buffer
/// is session-lifetime and cleared on reconnect.
#[derive(Default)]
pub struct MultipartAssembler {
    pending: Mutex<HashMap<(String, u16), PartialMessage>>,
}

impl MultipartAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one decoded message through the assembler. Single-part messages
    /// pass straight through; a concatenated part either completes its set
    /// (returning the joined message) or is buffered (returning `None`).
    pub fn feed(
        &self,
        sender: String,
        timestamp: Option<SmsTimestamp>,
        text: String,
        concat: Option<Concat>,
    ) -> Option<IncomingMessage> {
        let Some(concat) = concat else {
            return Some(IncomingMessage {
                sender,
                timestamp,
                text,
                concat: None,
            });
        };

        let mut pending = self.pending.lock().unwrap();
        let key = (sender, concat.reference);
        let partial = pending.entry(key.clone()).or_insert_with(|| PartialMessage {
            total_parts: concat.total_parts,
            timestamp,
            parts: BTreeMap::new(),
        });
        partial.parts.insert(concat.part_number, text);

        if partial.parts.len() < usize::from(partial.total_parts) {
            tracing::debug!(
                sender = %key.0,
                reference = concat.reference,
                have = partial.parts.len(),
                total = partial.total_parts,
                "holding incomplete multi-part message"
            );
            return None;
        }

        let partial = pending.remove(&key).unwrap();
        let text: String = partial.parts.into_values().collect();
        Some(IncomingMessage {
            sender: key.0,
            timestamp: partial.timestamp,
            text,
            concat: Some((concat.reference, partial.total_parts)),
        })
    }

    /// Drop all buffered parts (on disconnect).
    pub fn clear(&self) {
        self.pending.lock().unwrap().clear();
    }
}

/// Guess-decode a text-mode payload that may be hex-encoded UTF-16.
///
/// Neither message notifications nor storage fetches declare their encoding
/// in text mode. A payload of multiple-of-four length consisting entirely of
/// uppercase hex digits is speculatively decoded as UTF-16 (inserting a BOM
/// when absent); anything that fails the heuristic is returned unchanged.
pub fn decode_text_payload(text: &str) -> String {
    if text.is_empty() || text.len() % 4 != 0 {
        return text.to_string();
    }
    if !text.bytes().all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b)) {
        return text.to_string();
    }

    let prefixed;
    let hex = match &text[..4] {
        "FFFE" | "FEFF" => text,
        _ => {
            prefixed = format!("FEFF{text}");
            &prefixed
        }
    };

    let Ok(bytes) = crate::pdu::hex_to_bytes(hex) else {
        return text.to_string();
    };
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();

    match String::from_utf16(&units) {
        // Strip the BOM we fed in.
        Ok(decoded) => decoded.trim_start_matches('\u{feff}').to_string(),
        Err(_) => text.to_string(),
    }
}

/// Hex-encode text as UTF-16BE with a leading BOM, for sending through a
/// text-mode modem switched into hex payload mode.
pub fn encode_text_payload(text: &str) -> String {
    let mut units = vec![0xfeffu16];
    units.extend(text.encode_utf16());
    let bytes: Vec<u8> = units.iter().flat_map(|u| u.to_be_bytes()).collect();
    crate::pdu::bytes_to_hex(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdu::Concat;

    #[test]
    fn text_timestamp_parses_with_and_without_zone() {
        let ts = SmsTimestamp::parse_text("10/05/01,09:30:22+08").unwrap();
        assert_eq!((ts.year, ts.month, ts.day), (10, 5, 1));
        assert_eq!((ts.hour, ts.minute, ts.second), (9, 30, 22));
        assert_eq!(ts.tz_quarter_hours, 8);

        let ts = SmsTimestamp::parse_text("\"99/12/31,23:59:59\"").unwrap();
        assert_eq!(ts.tz_quarter_hours, 0);

        assert!(SmsTimestamp::parse_text("not a timestamp").is_none());
        assert!(SmsTimestamp::parse_text("10/13/01,09:30:22").is_none());
    }

    #[test]
    fn multipart_surfaces_only_when_complete() {
        let assembler = MultipartAssembler::new();
        let concat = |n| {
            Some(Concat {
                reference: 9,
                total_parts: 3,
                part_number: n,
            })
        };

        // Parts arrive out of order, from interleaved senders.
        assert!(assembler
            .feed("alice".into(), None, "with ".into(), concat(2))
            .is_none());
        assert!(assembler
            .feed("bob".into(), None, "unrelated".into(), concat(1))
            .is_none());
        assert!(assembler
            .feed("alice".into(), None, "dealt ".into(), concat(1))
            .is_none());
        let msg = assembler
            .feed("alice".into(), None, "it".into(), concat(3))
            .unwrap();
        assert_eq!(msg.text, "dealt with it");
        assert_eq!(msg.concat, Some((9, 3)));
    }

    #[test]
    fn single_part_passes_through() {
        let assembler = MultipartAssembler::new();
        let msg = assembler
            .feed("carol".into(), None, "hi".into(), None)
            .unwrap();
        assert_eq!(msg.text, "hi");
        assert!(msg.concat.is_none());
    }

    #[test]
    fn hex_ucs2_payloads_are_decoded() {
        // "hi" as UTF-16BE hex, no BOM.
        assert_eq!(decode_text_payload("00680069"), "hi");
        // With BOM.
        assert_eq!(decode_text_payload("FEFF00680069"), "hi");
        // Plain text left alone, even at multiple-of-four length.
        assert_eq!(decode_text_payload("hey there :)"), "hey there :)");
        assert_eq!(decode_text_payload(""), "");
    }

    #[test]
    fn leaving_text_round_trips() {
        assert_eq!(decode_text_payload(&encode_text_payload("привет")), "привет");
    }
}
