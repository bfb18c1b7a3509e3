//! # Parameter Encoding
//!
//! Scalar rendering and percent-encoding. Encoding is applied per item so
//! style delimiters stay literal; decoding happens after splitting. A style's
//! own delimiters are always escaped inside items, even with reserved
//! characters allowed.

use super::Style;
use crate::error::{ShapeError, ShapeResult};
use crate::value::Value;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Everything except RFC 3986 unreserved characters is encoded.
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Unreserved plus RFC 3986 reserved characters pass through.
const RESERVED: &AsciiSet = &UNRESERVED
    .remove(b':')
    .remove(b'/')
    .remove(b'?')
    .remove(b'#')
    .remove(b'[')
    .remove(b']')
    .remove(b'@')
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b';')
    .remove(b'=');

/// Label items also escape the unreserved `.` delimiter.
const UNRESERVED_LABEL: &AsciiSet = &UNRESERVED.add(b'.');

const RESERVED_FORM: &AsciiSet = &RESERVED.add(b',').add(b'=');
const RESERVED_MATRIX: &AsciiSet = &RESERVED_FORM.add(b';');
const RESERVED_LABEL: &AsciiSet = &RESERVED_FORM.add(b'.');

/// Percent-encodes one item serialized with `style`.
pub fn encode(raw: &str, allow_reserved: bool, style: Style) -> String {
    let set = match (allow_reserved, style) {
        (false, Style::Label) => UNRESERVED_LABEL,
        (false, _) => UNRESERVED,
        (true, Style::Form | Style::Simple) => RESERVED_FORM,
        (true, Style::Matrix) => RESERVED_MATRIX,
        (true, Style::Label) => RESERVED_LABEL,
        (true, Style::SpaceDelimited | Style::PipeDelimited | Style::DeepObject) => RESERVED,
    };
    utf8_percent_encode(raw, set).to_string()
}

/// Percent-encodes a member key used inside an entry name.
pub fn encode_name(raw: &str) -> String {
    utf8_percent_encode(raw, UNRESERVED).to_string()
}

/// Percent-decodes one item.
pub fn decode(raw: &str) -> ShapeResult<String> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|e| ShapeError::DecodingMismatch(format!("'{}' is not valid UTF-8: {}", raw, e)))
}

/// Renders a scalar as text. Null renders as the empty string.
pub fn render_scalar(value: &Value) -> ShapeResult<String> {
    match value {
        Value::Null => Ok(String::new()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Int(i) => Ok(i.to_string()),
        Value::Float(f) => Ok(f.to_string()),
        Value::String(s) => Ok(s.clone()),
        Value::Bytes(b) => Ok(STANDARD.encode(b)),
        Value::Sequence(_) | Value::Mapping(_) => Err(ShapeError::UnsupportedShape(format!(
            "{} nested below the first flattened level",
            value.kind_name()
        ))),
    }
}

/// Decodes standard base64 text.
pub fn decode_bytes(raw: &str) -> ShapeResult<Vec<u8>> {
    STANDARD
        .decode(raw)
        .map_err(|e| ShapeError::DecodingMismatch(format!("'{}' is not base64: {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_unreserved_only() {
        assert_eq!(encode("a b&c=d/e", false, Style::Form), "a%20b%26c%3Dd%2Fe");
        assert_eq!(encode("safe-._~", false, Style::Form), "safe-._~");
        assert_eq!(encode("é", false, Style::Simple), "%C3%A9");
        assert_eq!(encode_name("a&b[c]"), "a%26b%5Bc%5D");
    }

    #[test]
    fn test_allow_reserved() {
        assert_eq!(encode("a/b?c&e", true, Style::Form), "a/b?c&e");
        assert_eq!(encode("a b", true, Style::Form), "a%20b");
        assert_eq!(encode("a|b", true, Style::PipeDelimited), "a%7Cb");
    }

    #[test]
    fn test_style_delimiters_are_always_escaped() {
        assert_eq!(encode("v1.2", false, Style::Label), "v1%2E2");
        assert_eq!(encode("v1.2", false, Style::Matrix), "v1.2");
        assert_eq!(encode("a,b=c", true, Style::Simple), "a%2Cb%3Dc");
        assert_eq!(encode("a;b", true, Style::Matrix), "a%3Bb");
        assert_eq!(encode("a.b,c", true, Style::Label), "a%2Eb%2Cc");
    }

    #[test]
    fn test_decode() {
        assert_eq!(decode("a%20b%2Cc").unwrap(), "a b,c");
        assert!(matches!(decode("%FF"), Err(ShapeError::DecodingMismatch(_))));
    }

    #[test]
    fn test_render_scalars() {
        assert_eq!(render_scalar(&Value::Null).unwrap(), "");
        assert_eq!(render_scalar(&Value::Bool(true)).unwrap(), "true");
        assert_eq!(render_scalar(&Value::Int(-7)).unwrap(), "-7");
        assert_eq!(render_scalar(&Value::Float(2.5)).unwrap(), "2.5");
        assert_eq!(render_scalar(&Value::Bytes(b"hi".to_vec())).unwrap(), "aGk=");
        assert!(render_scalar(&Value::Sequence(vec![])).is_err());
        assert_eq!(decode_bytes("aGk=").unwrap(), b"hi".to_vec());
    }
}
