//! # Reverse Traversal
//!
//! A `serde::Deserializer` over [`Value`]. Struct fields are located by
//! encoding each declared field name with the configured key strategy, so the
//! strategy must match the one used when the value was captured.

use crate::config::EncodingConfig;
use crate::error::{ShapeError, ShapeResult};
use crate::value::Value;
use serde::de::value::StringDeserializer;
use serde::de::{self, DeserializeOwned, DeserializeSeed, IntoDeserializer, Visitor};
use serde::forward_to_deserialize_any;

/// Populates a `T` from a Structural Value.
pub fn from_value<T>(value: Value, config: &EncodingConfig) -> ShapeResult<T>
where
    T: DeserializeOwned,
{
    T::deserialize(ValueDeserializer::new(value, config))
}

/// Deserializer over an owned [`Value`].
pub struct ValueDeserializer<'a> {
    value: Value,
    config: &'a EncodingConfig,
}

impl<'a> ValueDeserializer<'a> {
    /// Wraps a value.
    pub fn new(value: Value, config: &'a EncodingConfig) -> Self {
        ValueDeserializer { value, config }
    }

    fn mismatch(&self, expected: &str) -> ShapeError {
        ShapeError::DecodingMismatch(format!(
            "expected {}, found {}",
            expected,
            self.value.kind_name()
        ))
    }
}

fn key_deserializer(key: String) -> StringDeserializer<ShapeError> {
    StringDeserializer::new(key)
}

impl<'de> de::Deserializer<'de> for ValueDeserializer<'_> {
    type Error = ShapeError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.value {
            Value::Null => visitor.visit_unit(),
            Value::Bool(b) => visitor.visit_bool(b),
            Value::Int(i) => visitor.visit_i64(i),
            Value::Float(f) => visitor.visit_f64(f),
            Value::String(s) => visitor.visit_string(s),
            Value::Bytes(b) => visitor.visit_byte_buf(b),
            Value::Sequence(items) => visitor.visit_seq(SeqAccess {
                iter: items.into_iter(),
                config: self.config,
            }),
            Value::Mapping(entries) => visitor.visit_map(MapAccess {
                iter: entries.into_iter(),
                pending: None,
                config: self.config,
                fields: None,
            }),
        }
    }

    fn deserialize_str<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        // Epoch-encoded dates come back as integers; chrono asks for a string.
        match self.value {
            Value::Int(count) if self.config.date_format.is_epoch() => {
                visitor.visit_string(self.config.date_format.from_epoch(count)?)
            }
            _ => self.deserialize_any(visitor),
        }
    }

    fn deserialize_string<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_str(visitor)
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.value {
            Value::Null => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_newtype_struct<V>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_struct<V>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.value {
            Value::Mapping(entries) => visitor.visit_map(MapAccess {
                iter: entries.into_iter(),
                pending: None,
                config: self.config,
                fields: Some(fields),
            }),
            _ => Err(self.mismatch("mapping")),
        }
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self.value {
            Value::String(variant) => visitor.visit_enum(key_deserializer(variant)),
            Value::Mapping(entries) if entries.len() == 1 => {
                let Some((variant, value)) = entries.into_iter().next() else {
                    return Err(ShapeError::DecodingMismatch("empty enum mapping".into()));
                };
                visitor.visit_enum(EnumAccess {
                    variant,
                    value,
                    config: self.config,
                })
            }
            _ => Err(self.mismatch("enum variant")),
        }
    }

    fn deserialize_ignored_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_unit()
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char
        bytes byte_buf unit unit_struct seq tuple tuple_struct map identifier
    }
}

struct SeqAccess<'a> {
    iter: std::vec::IntoIter<Value>,
    config: &'a EncodingConfig,
}

impl<'de> de::SeqAccess<'de> for SeqAccess<'_> {
    type Error = ShapeError;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>, Self::Error>
    where
        T: DeserializeSeed<'de>,
    {
        match self.iter.next() {
            Some(value) => seed
                .deserialize(ValueDeserializer::new(value, self.config))
                .map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct MapAccess<'a> {
    iter: indexmap::map::IntoIter<String, Value>,
    pending: Option<Value>,
    config: &'a EncodingConfig,
    fields: Option<&'static [&'static str]>,
}

impl MapAccess<'_> {
    fn field_name(&self, wire: String) -> String {
        match self.fields {
            Some(fields) => fields
                .iter()
                .find(|f| self.config.encode_key(f) == wire)
                .map(|f| f.to_string())
                .unwrap_or(wire),
            None => wire,
        }
    }
}

impl<'de> de::MapAccess<'de> for MapAccess<'_> {
    type Error = ShapeError;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>, Self::Error>
    where
        K: DeserializeSeed<'de>,
    {
        match self.iter.next() {
            Some((key, value)) => {
                self.pending = Some(value);
                let name = self.field_name(key);
                seed.deserialize(key_deserializer(name)).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value, Self::Error>
    where
        V: DeserializeSeed<'de>,
    {
        let value = self
            .pending
            .take()
            .ok_or_else(|| ShapeError::General("value requested before key".into()))?;
        seed.deserialize(ValueDeserializer::new(value, self.config))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

struct EnumAccess<'a> {
    variant: String,
    value: Value,
    config: &'a EncodingConfig,
}

impl<'de, 'a> de::EnumAccess<'de> for EnumAccess<'a> {
    type Error = ShapeError;
    type Variant = ValueDeserializer<'a>;

    fn variant_seed<V>(self, seed: V) -> Result<(V::Value, Self::Variant), Self::Error>
    where
        V: DeserializeSeed<'de>,
    {
        let variant = seed.deserialize(key_deserializer(self.variant))?;
        Ok((variant, ValueDeserializer::new(self.value, self.config)))
    }
}

impl<'de> de::VariantAccess<'de> for ValueDeserializer<'_> {
    type Error = ShapeError;

    fn unit_variant(self) -> Result<(), Self::Error> {
        match self.value {
            Value::Null => Ok(()),
            _ => Err(self.mismatch("unit variant")),
        }
    }

    fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value, Self::Error>
    where
        T: DeserializeSeed<'de>,
    {
        seed.deserialize(self)
    }

    fn tuple_variant<V>(self, _len: usize, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        de::Deserializer::deserialize_seq(self, visitor)
    }

    fn struct_variant<V>(
        self,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        de::Deserializer::deserialize_struct(self, "", fields, visitor)
    }
}

impl<'de, 'a> IntoDeserializer<'de, ShapeError> for ValueDeserializer<'a> {
    type Deserializer = Self;

    fn into_deserializer(self) -> Self {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::KeyEncodingStrategy;
    use crate::traverse::to_value;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Listing {
        #[serde(rename = "pageSize")]
        page_size: u32,
        tags: Vec<String>,
        cursor: Option<String>,
        kind: Kind,
        shape: Option<Shape>,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    enum Kind {
        Public,
        Private,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    enum Shape {
        Circle { radius: f64 },
        Tag(String),
    }

    #[test]
    fn test_round_trip_through_value() {
        let config = EncodingConfig::DEFAULT;
        let listing = Listing {
            page_size: 10,
            tags: vec!["x".into()],
            cursor: None,
            kind: Kind::Private,
            shape: Some(Shape::Circle { radius: 2.0 }),
        };
        let value = to_value(&listing, &config).unwrap();
        assert!(value.get("page_size").is_some());
        let back: Listing = from_value(value, &config).unwrap();
        assert_eq!(back, listing);
    }

    #[test]
    fn test_camel_case_round_trip() {
        let config =
            EncodingConfig::DEFAULT.with_key_strategy(KeyEncodingStrategy::CamelCase { separator: '_' });
        let listing = Listing {
            page_size: 3,
            tags: vec![],
            cursor: Some("abc".into()),
            kind: Kind::Public,
            shape: Some(Shape::Tag("t".into())),
        };
        let value = to_value(&listing, &config).unwrap();
        let back: Listing = from_value(value, &config).unwrap();
        assert_eq!(back, listing);
    }

    #[test]
    fn test_type_mismatch_is_reported() {
        let err = from_value::<u32>(Value::String("ten".into()), &EncodingConfig::DEFAULT)
            .unwrap_err();
        assert!(matches!(err, ShapeError::DecodingMismatch(_)));
    }

    #[test]
    fn test_missing_required_field() {
        let mut m = crate::value::Mapping::new();
        m.insert("tags".into(), Value::Sequence(vec![]));
        let err = from_value::<Listing>(Value::Mapping(m), &EncodingConfig::DEFAULT).unwrap_err();
        assert!(matches!(err, ShapeError::DecodingMismatch(ref msg) if msg.contains("pageSize")));
    }
}
