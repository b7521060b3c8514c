// ABOUTME: SMS PDU wire-format codec - addresses, data-coding schemes, timestamps, user data
// ABOUTME: Decodes SMS-DELIVER hex strings and encodes SMS-SUBMIT payloads for AT+CMGS

pub mod gsm7;

use crate::message::SmsTimestamp;
use bytes::{BufMut, BytesMut};
use num_enum::TryFromPrimitive;
use thiserror::Error;

/// Septet capacity of a single-segment 7-bit message.
const GSM7_SEGMENT_SEPTETS: usize = 160;
/// UTF-16 code unit capacity of a single-segment UCS2 message.
const UCS2_SEGMENT_UNITS: usize = 70;

/// Errors raised while encoding or decoding a PDU. A decode failure drops
/// that one message from the pipeline; it is never fatal to the session.
#[derive(Debug, Error)]
pub enum PduError {
    #[error("invalid hex at offset {0}")]
    BadHex(usize),

    #[error("PDU truncated: wanted {wanted} more byte(s)")]
    Truncated { wanted: usize },

    #[error("unsupported data coding scheme {0:#04x}")]
    UnknownDcs(u8),

    #[error("address field malformed")]
    BadAddress,

    #[error("character {0:?} not representable in any supported alphabet")]
    Unrepresentable(char),

    #[error("message of {units} {unit_name} exceeds one segment ({limit})")]
    TooLong {
        units: usize,
        unit_name: &'static str,
        limit: usize,
    },
}

/// Character alphabet selected by the TP-DCS octet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum Alphabet {
    Gsm7 = 0x00,
    Binary = 0x04,
    Ucs2 = 0x08,
}

impl Alphabet {
    /// Resolve a TP-DCS octet down to its alphabet.
    ///
    /// Covers the general data coding group, the message-waiting groups, and
    /// the data-coding/message-class group. Compressed text and reserved
    /// groups are decode failures.
    pub fn from_dcs(dcs: u8) -> Result<Alphabet, PduError> {
        match dcs {
            0x00..=0x7f => {
                if dcs & 0x20 != 0 {
                    // compressed user data
                    return Err(PduError::UnknownDcs(dcs));
                }
                Alphabet::try_from(dcs & 0x0c).map_err(|_| PduError::UnknownDcs(dcs))
            }
            // Message-waiting indication groups.
            0xc0..=0xdf => Ok(Alphabet::Gsm7),
            0xe0..=0xef => Ok(Alphabet::Ucs2),
            // Data coding / message class.
            0xf0..=0xff => Ok(if dcs & 0x04 != 0 {
                Alphabet::Binary
            } else {
                Alphabet::Gsm7
            }),
            _ => Err(PduError::UnknownDcs(dcs)),
        }
    }
}

/// Concatenation info from a user-data-header, marking one part of a
/// multi-part message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Concat {
    pub reference: u16,
    pub total_parts: u8,
    pub part_number: u8,
}

/// Byte cursor over a decoded PDU.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    fn u8(&mut self) -> Result<u8, PduError> {
        let b = *self.buf.get(self.pos).ok_or(PduError::Truncated { wanted: 1 })?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], PduError> {
        if self.buf.len() - self.pos < n {
            return Err(PduError::Truncated {
                wanted: n - (self.buf.len() - self.pos),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }
}

pub(crate) fn hex_to_bytes(hex: &str) -> Result<Vec<u8>, PduError> {
    let hex = hex.trim();
    if hex.len() % 2 != 0 {
        return Err(PduError::BadHex(hex.len()));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| PduError::BadHex(i)))
        .collect()
}

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02X}");
    }
    out
}

/// Decode a semi-octet (or alphanumeric) address field. `digits` is the
/// TP-OA/TP-DA digit count, `toa` the type-of-address octet.
fn decode_address(digits: usize, toa: u8, data: &[u8]) -> Result<String, PduError> {
    // Alphanumeric addresses are GSM 7-bit packed into the digit field.
    if toa & 0x70 == 0x50 {
        let septets = digits * 4 / 7;
        return Ok(gsm7::decode(&gsm7::unpack(data, septets, 0)));
    }

    let mut number = String::with_capacity(digits + 1);
    if toa & 0x70 == 0x10 {
        number.push('+');
    }
    for (i, &b) in data.iter().enumerate() {
        for nibble in [b & 0x0f, b >> 4] {
            if number.len() - usize::from(number.starts_with('+')) >= digits {
                break;
            }
            match nibble {
                0x0..=0x9 => number.push(char::from(b'0' + nibble)),
                0xa => number.push('*'),
                0xb => number.push('#'),
                0xf if i + 1 == data.len() => {} // filler nibble
                _ => return Err(PduError::BadAddress),
            }
        }
    }
    Ok(number)
}

/// Encode a phone number into (digit count, type-of-address, semi-octets).
/// A leading `+` selects the international type.
fn encode_address(number: &str) -> Result<(usize, u8, Vec<u8>), PduError> {
    let (toa, digits) = match number.strip_prefix('+') {
        Some(rest) => (0x91, rest),
        None => (0x81, number),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PduError::BadAddress);
    }

    let mut data = Vec::with_capacity(digits.len() / 2 + 1);
    let bytes = digits.as_bytes();
    for pair in bytes.chunks(2) {
        let low = pair[0] - b'0';
        let high = pair.get(1).map_or(0x0f, |b| b - b'0');
        data.push((high << 4) | low);
    }
    Ok((digits.len(), toa, data))
}

/// Parse a 7-octet TP-SCTS timestamp (semi-octet BCD, quarter-hour zone).
/// Unparseable timestamps yield `None` rather than failing the message.
fn parse_scts(octets: &[u8]) -> Option<SmsTimestamp> {
    let bcd = |b: u8| -> Option<u8> {
        let (lo, hi) = (b & 0x0f, b >> 4);
        (lo <= 9 && hi <= 9).then_some(lo * 10 + hi)
    };

    let tz_octet = octets[6];
    let tz_magnitude = i8::try_from(bcd(tz_octet & 0xf7)?).ok()?;
    let tz_quarter_hours = if tz_octet & 0x08 != 0 {
        -tz_magnitude
    } else {
        tz_magnitude
    };

    SmsTimestamp::new(
        bcd(octets[0])?,
        bcd(octets[1])?,
        bcd(octets[2])?,
        bcd(octets[3])?,
        bcd(octets[4])?,
        bcd(octets[5])?,
        tz_quarter_hours,
    )
}

/// Parse a user-data-header, returning any concatenation info it carries.
fn parse_udh(udh: &[u8]) -> Option<Concat> {
    let mut pos = 0;
    while pos + 2 <= udh.len() {
        let iei = udh[pos];
        let len = udh[pos + 1] as usize;
        let data = udh.get(pos + 2..pos + 2 + len)?;
        match (iei, len) {
            (0x00, 3) => {
                return Some(Concat {
                    reference: u16::from(data[0]),
                    total_parts: data[1],
                    part_number: data[2],
                });
            }
            (0x08, 4) => {
                return Some(Concat {
                    reference: u16::from_be_bytes([data[0], data[1]]),
                    total_parts: data[2],
                    part_number: data[3],
                });
            }
            _ => pos += 2 + len,
        }
    }
    None
}

/// A decoded SMS-DELIVER TPDU, as fetched from storage or delivered inline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliverPdu {
    pub smsc: Option<String>,
    pub sender: String,
    pub alphabet: Alphabet,
    pub timestamp: Option<SmsTimestamp>,
    pub concat: Option<Concat>,
    pub text: String,
}

impl DeliverPdu {
    /// Parse the hex string a modem hands back for one stored or inline
    /// message.
    pub fn parse(hex: &str) -> Result<DeliverPdu, PduError> {
        let bytes = hex_to_bytes(hex)?;
        let mut r = Reader::new(&bytes);

        // Service-center address: length counts octets including the TOA.
        let sca_len = r.u8()? as usize;
        let smsc = if sca_len > 0 {
            let sca = r.take(sca_len)?;
            Some(decode_address((sca_len - 1) * 2, sca[0], &sca[1..])?)
        } else {
            None
        };

        let first_octet = r.u8()?;
        let has_udh = first_octet & 0x40 != 0;

        let oa_digits = r.u8()? as usize;
        let oa_toa = r.u8()?;
        let oa_data = r.take(oa_digits.div_ceil(2))?;
        let sender = decode_address(oa_digits, oa_toa, oa_data)?;

        let _pid = r.u8()?;
        let dcs = r.u8()?;
        let alphabet = Alphabet::from_dcs(dcs)?;
        let timestamp = parse_scts(r.take(7)?);

        let udl = r.u8()? as usize;
        let ud = r.rest();

        let (concat, header_octets) = if has_udh {
            let udhl = *ud.first().ok_or(PduError::Truncated { wanted: 1 })? as usize;
            if ud.len() < 1 + udhl {
                return Err(PduError::Truncated {
                    wanted: 1 + udhl - ud.len(),
                });
            }
            (parse_udh(&ud[1..1 + udhl]), 1 + udhl)
        } else {
            (None, 0)
        };

        let text = decode_user_data(alphabet, udl, ud, header_octets)?;

        Ok(DeliverPdu {
            smsc,
            sender,
            alphabet,
            timestamp,
            concat,
            text,
        })
    }
}

/// Decode the user-data field into text. For 7-bit data the UDL counts
/// septets (header included); for 8-bit and UCS2 it counts octets.
fn decode_user_data(
    alphabet: Alphabet,
    udl: usize,
    ud: &[u8],
    header_octets: usize,
) -> Result<String, PduError> {
    match alphabet {
        Alphabet::Gsm7 => {
            let header_septets = (header_octets * 8).div_ceil(7);
            let fill_bits = (header_septets * 7 - header_octets * 8) as u32;
            let count = udl
                .checked_sub(header_septets)
                .ok_or(PduError::Truncated { wanted: 1 })?;
            let septets = gsm7::unpack(&ud[header_octets..], count, fill_bits);
            if septets.len() < count {
                return Err(PduError::Truncated {
                    wanted: count - septets.len(),
                });
            }
            Ok(gsm7::decode(&septets))
        }
        Alphabet::Binary => {
            let payload = octet_payload(udl, ud, header_octets)?;
            // 8-bit data has no declared charset; Latin-1 is the least wrong.
            Ok(payload.iter().map(|&b| char::from(b)).collect())
        }
        Alphabet::Ucs2 => {
            let payload = octet_payload(udl, ud, header_octets)?;
            let units: Vec<u16> = payload
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            Ok(String::from_utf16_lossy(&units))
        }
    }
}

fn octet_payload(udl: usize, ud: &[u8], header_octets: usize) -> Result<&[u8], PduError> {
    let count = udl
        .checked_sub(header_octets)
        .ok_or(PduError::Truncated { wanted: 1 })?;
    ud.get(header_octets..header_octets + count)
        .ok_or(PduError::Truncated {
            wanted: header_octets + count - ud.len(),
        })
}

/// An encoded SMS-SUBMIT TPDU, ready for the `AT+CMGS` dialogue.
///
/// The alphabet is chosen per message: 7-bit GSM unless the text contains a
/// character outside that alphabet, then UCS2. Text longer than one segment
/// is an encode error — segmentation is the caller's responsibility.
#[derive(Debug, Clone)]
pub struct SubmitPdu {
    bytes: Vec<u8>,
    alphabet: Alphabet,
}

impl SubmitPdu {
    pub fn new(recipient: &str, text: &str) -> Result<SubmitPdu, PduError> {
        let (digits, toa, addr) = encode_address(recipient)?;

        let mut buf = BytesMut::with_capacity(16 + text.len() * 2);
        buf.put_u8(0x00); // SCA: use the SMSC stored in the modem
        buf.put_u8(0x01); // SMS-SUBMIT, no validity period
        buf.put_u8(0x00); // TP-MR: let the modem assign one
        buf.put_u8(digits as u8);
        buf.put_u8(toa);
        buf.put_slice(&addr);
        buf.put_u8(0x00); // TP-PID

        let alphabet = match gsm7::encode(text) {
            Some(septets) => {
                if septets.len() > GSM7_SEGMENT_SEPTETS {
                    return Err(PduError::TooLong {
                        units: septets.len(),
                        unit_name: "septets",
                        limit: GSM7_SEGMENT_SEPTETS,
                    });
                }
                buf.put_u8(0x00); // TP-DCS: 7-bit default
                buf.put_u8(septets.len() as u8);
                buf.put_slice(&gsm7::pack(&septets));
                Alphabet::Gsm7
            }
            None => {
                let units: Vec<u16> = text.encode_utf16().collect();
                if units.len() > UCS2_SEGMENT_UNITS {
                    return Err(PduError::TooLong {
                        units: units.len(),
                        unit_name: "UTF-16 units",
                        limit: UCS2_SEGMENT_UNITS,
                    });
                }
                buf.put_u8(0x08); // TP-DCS: UCS2
                buf.put_u8((units.len() * 2) as u8);
                for unit in units {
                    buf.put_u16(unit);
                }
                Alphabet::Ucs2
            }
        };

        Ok(SubmitPdu {
            bytes: buf.to_vec(),
            alphabet,
        })
    }

    pub fn alphabet(&self) -> Alphabet {
        self.alphabet
    }

    /// TPDU octet count excluding the service-center address, as expected by
    /// `AT+CMGS=<length>`.
    pub fn tpdu_len(&self) -> usize {
        self.bytes.len() - 1
    }

    pub fn to_hex(&self) -> String {
        bytes_to_hex(&self.bytes)
    }
}
