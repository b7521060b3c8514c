// ABOUTME: GSM 03.38 default 7-bit alphabet - character tables and septet packing
// ABOUTME: Handles the extension table escape and fill bits after a user-data header

/// Escape septet introducing the extension table.
const ESCAPE: u8 = 0x1b;

/// The GSM 7-bit default alphabet, indexed by septet value.
#[rustfmt::skip]
const BASIC: [char; 128] = [
    '@', '£', '$', '¥', 'è', 'é', 'ù', 'ì', 'ò', 'Ç', '\n', 'Ø', 'ø', '\r', 'Å', 'å',
    'Δ', '_', 'Φ', 'Γ', 'Λ', 'Ω', 'Π', 'Ψ', 'Σ', 'Θ', 'Ξ', '\u{1b}', 'Æ', 'æ', 'ß', 'É',
    ' ', '!', '"', '#', '¤', '%', '&', '\'', '(', ')', '*', '+', ',', '-', '.', '/',
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', ':', ';', '<', '=', '>', '?',
    '¡', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O',
    'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'Ä', 'Ö', 'Ñ', 'Ü', '§',
    '¿', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o',
    'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'ä', 'ö', 'ñ', 'ü', 'à',
];

/// Extension table, reached through the escape septet.
const EXTENSION: &[(u8, char)] = &[
    (0x0a, '\u{0c}'),
    (0x14, '^'),
    (0x28, '{'),
    (0x29, '}'),
    (0x2f, '\\'),
    (0x3c, '['),
    (0x3d, '~'),
    (0x3e, ']'),
    (0x40, '|'),
    (0x65, '€'),
];

fn basic_septet(c: char) -> Option<u8> {
    // The escape value itself is not a character.
    BASIC
        .iter()
        .position(|&b| b == c && b != '\u{1b}')
        .map(|i| i as u8)
}

fn extension_septet(c: char) -> Option<u8> {
    EXTENSION.iter().find(|&&(_, e)| e == c).map(|&(s, _)| s)
}

fn extension_char(septet: u8) -> Option<char> {
    EXTENSION.iter().find(|&&(s, _)| s == septet).map(|&(_, c)| c)
}

/// Whether every character of `text` is representable in the 7-bit alphabet.
pub fn is_representable(text: &str) -> bool {
    text.chars()
        .all(|c| basic_septet(c).is_some() || extension_septet(c).is_some())
}

/// Encode `text` into septet values, or `None` when a character has no
/// 7-bit representation (the caller then falls back to UCS2). Extension
/// characters cost two septets.
pub fn encode(text: &str) -> Option<Vec<u8>> {
    let mut septets = Vec::with_capacity(text.len());
    for c in text.chars() {
        if let Some(s) = basic_septet(c) {
            septets.push(s);
        } else if let Some(s) = extension_septet(c) {
            septets.push(ESCAPE);
            septets.push(s);
        } else {
            return None;
        }
    }
    Some(septets)
}

/// Decode septet values back to text. An escape followed by an unknown
/// extension value decodes as a space, per GSM 03.38.
pub fn decode(septets: &[u8]) -> String {
    let mut out = String::with_capacity(septets.len());
    let mut iter = septets.iter();
    while let Some(&s) = iter.next() {
        if s == ESCAPE {
            match iter.next().and_then(|&e| extension_char(e)) {
                Some(c) => out.push(c),
                None => out.push(' '),
            }
        } else {
            out.push(BASIC[(s & 0x7f) as usize]);
        }
    }
    out
}

/// Pack septets into octets, least-significant bits first.
pub fn pack(septets: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(septets.len() * 7 / 8 + 1);
    let mut acc: u32 = 0;
    let mut nbits = 0;

    for &s in septets {
        acc |= u32::from(s & 0x7f) << nbits;
        nbits += 7;
        while nbits >= 8 {
            out.push((acc & 0xff) as u8);
            acc >>= 8;
            nbits -= 8;
        }
    }
    if nbits > 0 {
        out.push(acc as u8);
    }
    out
}

/// Unpack `count` septets from packed octets. `fill_bits` skips padding at
/// the start of the first octet, inserted so that septet data begins on a
/// septet boundary after a user-data header.
pub fn unpack(octets: &[u8], count: usize, fill_bits: u32) -> Vec<u8> {
    let mut septets = Vec::with_capacity(count);
    let mut acc: u32 = 0;
    let mut nbits: u32 = 0;
    let mut skip = fill_bits;

    for &b in octets {
        acc |= u32::from(b) << nbits;
        nbits += 8;
        if skip > 0 {
            acc >>= skip;
            nbits -= skip;
            skip = 0;
        }
        while nbits >= 7 && septets.len() < count {
            septets.push((acc & 0x7f) as u8);
            acc >>= 7;
            nbits -= 7;
        }
    }
    septets
}
