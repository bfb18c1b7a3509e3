#![deny(missing_docs)]

//! # Naming Conventions
//!
//! Key transforms applied to every struct field and map key on the way to the
//! wire, and (by re-encoding known field names) on the way back.
//!
//! There is exactly one word-splitting algorithm. An uppercase letter starts a
//! new word unless it continues an acronym run; inside a run, the split falls
//! before the last uppercase letter when a lowercase letter follows it
//! (`URLSession` → `url_session`).

use std::fmt;
use std::sync::Arc;

/// Converts an identifier to a separated lowercase convention (snake case for `_`).
///
/// Existing separators are kept verbatim and never doubled, so leading and
/// trailing separator runs survive unchanged.
pub fn to_snake_case(input: &str, separator: char) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut result = String::with_capacity(input.len() + 4);
    let mut separate_on_uppercase = true;

    for (idx, &ch) in chars.iter().enumerate() {
        if ch.is_uppercase() {
            if separate_on_uppercase && !result.is_empty() {
                result.push(separator);
            }
            // An acronym run ends right before an uppercase letter followed by a lowercase one.
            separate_on_uppercase = matches!(
                (chars.get(idx + 1), chars.get(idx + 2)),
                (Some(next), Some(after)) if next.is_uppercase() && after.is_lowercase()
            );
        } else {
            separate_on_uppercase = ch != separator;
        }
        result.extend(ch.to_lowercase());
    }

    result
}

/// Converts a separated identifier to camel case.
///
/// Leading and trailing separator runs are preserved; a key with a single word
/// (or made only of separators) is returned unchanged.
pub fn to_camel_case(input: &str, separator: char) -> String {
    let Some(first) = input.find(|c: char| c != separator) else {
        return input.to_string();
    };
    let last = input
        .char_indices()
        .rev()
        .find(|&(_, c)| c != separator)
        .map(|(idx, c)| idx + c.len_utf8())
        .unwrap_or(input.len());

    let leading = &input[..first];
    let key = &input[first..last];
    let trailing = &input[last..];

    let words: Vec<&str> = key.split(separator).filter(|w| !w.is_empty()).collect();
    if words.len() <= 1 {
        return input.to_string();
    }

    let mut result = String::with_capacity(input.len());
    result.push_str(leading);
    for (idx, word) in words.iter().enumerate() {
        let mut chars = word.chars();
        if let Some(head) = chars.next() {
            if idx == 0 {
                result.extend(head.to_lowercase());
            } else {
                result.extend(head.to_uppercase());
            }
            result.push_str(chars.as_str());
        }
    }
    result.push_str(trailing);
    result
}

/// A key transform carried through every encode and decode call.
///
/// The same strategy must be used in both directions of a round trip: decoding
/// locates fields by re-encoding the target type's field names.
#[derive(Clone)]
pub enum KeyEncodingStrategy {
    /// Keys are used exactly as declared.
    UseDefaultKeys,
    /// `userId` → `user_id` (with the given separator).
    SnakeCase {
        /// Word separator inserted between words.
        separator: char,
    },
    /// `user_id` → `userId` (splitting on the given separator).
    CamelCase {
        /// Word separator removed between words.
        separator: char,
    },
    /// Any pure, total transform.
    Custom(Arc<dyn Fn(&str) -> String + Send + Sync>),
}

impl KeyEncodingStrategy {
    /// Snake case with `_`.
    pub const DEFAULT: KeyEncodingStrategy = KeyEncodingStrategy::SnakeCase { separator: '_' };

    /// Wraps an arbitrary transform.
    pub fn custom<F>(encode: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        KeyEncodingStrategy::Custom(Arc::new(encode))
    }

    /// Applies the strategy to a single key.
    pub fn encode(&self, key: &str) -> String {
        match self {
            KeyEncodingStrategy::UseDefaultKeys => key.to_string(),
            KeyEncodingStrategy::SnakeCase { separator } => to_snake_case(key, *separator),
            KeyEncodingStrategy::CamelCase { separator } => to_camel_case(key, *separator),
            KeyEncodingStrategy::Custom(encode) => encode(key),
        }
    }
}

impl Default for KeyEncodingStrategy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Debug for KeyEncodingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyEncodingStrategy::UseDefaultKeys => write!(f, "UseDefaultKeys"),
            KeyEncodingStrategy::SnakeCase { separator } => {
                write!(f, "SnakeCase({:?})", separator)
            }
            KeyEncodingStrategy::CamelCase { separator } => {
                write!(f, "CamelCase({:?})", separator)
            }
            KeyEncodingStrategy::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}
