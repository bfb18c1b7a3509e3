//! # Error Handling
//!
//! Provides the unified `ShapeError` enum returned by every encode, decode and
//! describe entry point. It doubles as the error type of the crate's serde
//! data formats, so it implements both `serde::ser::Error` and `serde::de::Error`.

use derive_more::{Display, From};
use std::fmt;

/// The crate-wide error enum.
///
/// Failures are all-or-nothing: no partial output accompanies an error.
/// Note: String errors default to `General`.
#[derive(Debug, Display, From, Clone, PartialEq, Eq)]
pub enum ShapeError {
    /// A traversed value (or probed type) has no representable schema or
    /// cannot be flattened into the requested parameter style.
    #[from(ignore)]
    #[display("Unsupported shape: {_0}")]
    UnsupportedShape(String),

    /// A required path/query parameter was absent at encode time.
    #[from(ignore)]
    #[display("Missing required parameter: {_0}")]
    MissingRequiredParameter(String),

    /// Parameter entries are missing or cannot be parsed into the target kind.
    #[from(ignore)]
    #[display("Decoding mismatch: {_0}")]
    DecodingMismatch(String),

    /// Two distinct type identities could not be given distinct registry names.
    #[from(ignore)]
    #[display("Schema name collision: {_0}")]
    SchemaNameCollision(String),

    /// Generic errors (serializer custom messages, rendering failures).
    #[display("General Error: {_0}")]
    General(String),
}

/// Manual implementation of the standard Error trait.
impl std::error::Error for ShapeError {}

impl serde::ser::Error for ShapeError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        ShapeError::General(msg.to_string())
    }
}

impl serde::de::Error for ShapeError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        ShapeError::DecodingMismatch(msg.to_string())
    }

    fn missing_field(field: &'static str) -> Self {
        ShapeError::DecodingMismatch(format!("missing required field '{}'", field))
    }
}

/// Helper type alias for Result using ShapeError.
pub type ShapeResult<T> = Result<T, ShapeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_conversion() {
        let msg = String::from("something wrong");
        let err: ShapeError = msg.into();
        match err {
            ShapeError::General(s) => assert_eq!(s, "something wrong"),
            _ => panic!("String should convert to ShapeError::General"),
        }
    }

    #[test]
    fn test_display_prefixes() {
        let err = ShapeError::MissingRequiredParameter("id".into());
        assert_eq!(format!("{}", err), "Missing required parameter: id");

        let err = ShapeError::SchemaNameCollision("User".into());
        assert_eq!(format!("{}", err), "Schema name collision: User");
    }

    #[test]
    fn test_serde_de_errors_are_decoding_mismatches() {
        let err = <ShapeError as serde::de::Error>::missing_field("limit");
        assert!(matches!(err, ShapeError::DecodingMismatch(m) if m.contains("limit")));
    }

    #[test]
    fn test_serde_ser_errors_are_general() {
        let err = <ShapeError as serde::ser::Error>::custom("boom");
        assert_eq!(err, ShapeError::General("boom".into()));
    }
}
