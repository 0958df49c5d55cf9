//! BOM-based text encoding detection (spec §4.1).

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Encoding {
    Utf8,
    Utf16Le,
    Utf16Be,
}

/// Infers the encoding of a `.chart` byte buffer from its byte-order mark.
/// Defaults to UTF-8, including for an empty buffer.
pub fn detect_encoding(bytes: &[u8]) -> Encoding {
    if bytes.len() >= 2 {
        match (bytes[0], bytes[1]) {
            (0xFF, 0xFE) => return Encoding::Utf16Le,
            (0xFE, 0xFF) => return Encoding::Utf16Be,
            _ => {}
        }
    }
    Encoding::Utf8
}

/// Decodes a byte buffer per its detected encoding, stripping the BOM.
pub fn decode(bytes: &[u8]) -> String {
    match detect_encoding(bytes) {
        Encoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        Encoding::Utf16Le => decode_utf16(&bytes[2..], u16::from_le_bytes),
        Encoding::Utf16Be => decode_utf16(&bytes[2..], u16::from_be_bytes),
    }
}

fn decode_utf16(bytes: &[u8], from_bytes: fn([u8; 2]) -> u16) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| from_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

#[test]
fn detects_utf16le_bom() {
    assert_eq!(detect_encoding(&[0xFF, 0xFE, 0x00]), Encoding::Utf16Le);
}

#[test]
fn detects_utf16be_bom() {
    assert_eq!(detect_encoding(&[0xFE, 0xFF, 0x00]), Encoding::Utf16Be);
}

#[test]
fn defaults_to_utf8() {
    assert_eq!(detect_encoding(b"[Song]"), Encoding::Utf8);
    assert_eq!(detect_encoding(&[]), Encoding::Utf8);
}

#[test]
fn decodes_plain_utf8() {
    assert_eq!(decode(b"[Song]\n"), "[Song]\n");
}
