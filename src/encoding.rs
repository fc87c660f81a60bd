//! The 10Q wire encoding. Files exchanged with the receiving system are
//! Windows-1252 encoded.

use std::io::Read;

use encoding_rs::WINDOWS_1252;
use encoding_rs_io::{DecodeReaderBytes, DecodeReaderBytesBuilder};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("character {character:?} cannot be represented in Windows-1252")]
    Unmappable { character: char },
}

/// Encodes text for the wire. Characters without a Windows-1252
/// representation are an error rather than being replaced.
pub fn encode(text: &str) -> Result<Vec<u8>, EncodingError> {
    let (bytes, _, had_errors) = WINDOWS_1252.encode(text);
    if had_errors {
        let mut buf = [0u8; 4];
        let character = text
            .chars()
            .find(|c| WINDOWS_1252.encode(c.encode_utf8(&mut buf)).2)
            .unwrap_or(char::REPLACEMENT_CHARACTER);
        return Err(EncodingError::Unmappable { character });
    }
    Ok(bytes.into_owned())
}

/// Wraps a reader of Windows-1252 bytes so that it yields UTF-8.
pub fn decoding_reader<R: Read>(r: R) -> DecodeReaderBytes<R, Vec<u8>> {
    DecodeReaderBytesBuilder::new()
        .encoding(Some(WINDOWS_1252))
        .build(r)
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_case::test_case;

    #[test_case("10Q plain" => Ok(b"10Q plain".to_vec()) ; "ascii")]
    #[test_case("Ærø" => Ok(vec![0xC6, b'r', 0xF8]) ; "danish_letters")]
    #[test_case("€" => Ok(vec![0x80]) ; "euro_sign")]
    #[test_case("abc ĸ" => Err(EncodingError::Unmappable { character: 'ĸ' }) ; "greenlandic_kra")]
    fn encodes(text: &str) -> Result<Vec<u8>, EncodingError> {
        encode(text)
    }

    #[test]
    fn decodes() {
        let mut text = String::new();
        decoding_reader(&[b'p', 0xE5, b'!'][..])
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!("på!", text);
    }
}
