//! # Value Capture
//!
//! A `serde::Serializer` producing [`Traced`] trees. Every generic entry point
//! (`serialize_field`, `serialize_element`, `serialize_some`, map values)
//! stamps the child with `TypeIdentity::of::<T>()`.

use super::{Traced, TracedField, TracedNode};
use crate::config::EncodingConfig;
use crate::error::ShapeError;
use crate::identity::{LeafKind, TypeIdentity};
use crate::value::Value;
use serde::ser::{self, Serialize};

/// Serializer capturing one value. `Ok(None)` means "absent field".
pub struct TraceSerializer<'a> {
    config: &'a EncodingConfig,
    identity: TypeIdentity,
    field_level: bool,
}

impl<'a> TraceSerializer<'a> {
    /// Serializer for a value of the given declared type.
    pub fn new(config: &'a EncodingConfig, identity: TypeIdentity) -> Self {
        TraceSerializer {
            config,
            identity,
            field_level: false,
        }
    }

    fn for_field(config: &'a EncodingConfig, identity: TypeIdentity) -> Self {
        TraceSerializer {
            config,
            identity,
            field_level: true,
        }
    }

    fn leaf(self, value: Value) -> Result<Option<Traced>, ShapeError> {
        Ok(Some(Traced::scalar(self.identity, value)))
    }
}

fn child<T>(config: &EncodingConfig, value: &T) -> Result<Traced, ShapeError>
where
    T: Serialize + ?Sized,
{
    let identity = TypeIdentity::of::<T>();
    let slot = value.serialize(TraceSerializer::new(config, identity.clone()))?;
    Ok(slot.unwrap_or_else(|| Traced::scalar(identity, Value::Null)))
}

fn tagged(identity: TypeIdentity, variant: &'static str, inner: Traced) -> Traced {
    Traced {
        identity,
        node: TracedNode::Variant(variant.to_string(), Box::new(inner)),
    }
}

impl<'a> ser::Serializer for TraceSerializer<'a> {
    type Ok = Option<Traced>;
    type Error = ShapeError;
    type SerializeSeq = SeqTracer<'a>;
    type SerializeTuple = SeqTracer<'a>;
    type SerializeTupleStruct = SeqTracer<'a>;
    type SerializeTupleVariant = SeqTracer<'a>;
    type SerializeMap = MapTracer<'a>;
    type SerializeStruct = RecordTracer<'a>;
    type SerializeStructVariant = RecordTracer<'a>;

    fn serialize_bool(self, v: bool) -> Result<Self::Ok, Self::Error> {
        self.leaf(Value::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Self::Ok, Self::Error> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i16(self, v: i16) -> Result<Self::Ok, Self::Error> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i32(self, v: i32) -> Result<Self::Ok, Self::Error> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i64(self, v: i64) -> Result<Self::Ok, Self::Error> {
        self.leaf(Value::Int(v))
    }

    fn serialize_i128(self, v: i128) -> Result<Self::Ok, Self::Error> {
        let v = i64::try_from(v).map_err(|_| {
            ShapeError::UnsupportedShape(format!("integer {} does not fit in 64 bits", v))
        })?;
        self.serialize_i64(v)
    }

    fn serialize_u8(self, v: u8) -> Result<Self::Ok, Self::Error> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_u16(self, v: u16) -> Result<Self::Ok, Self::Error> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_u32(self, v: u32) -> Result<Self::Ok, Self::Error> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_u64(self, v: u64) -> Result<Self::Ok, Self::Error> {
        let v = i64::try_from(v).map_err(|_| {
            ShapeError::UnsupportedShape(format!("integer {} does not fit in 64 bits", v))
        })?;
        self.serialize_i64(v)
    }

    fn serialize_u128(self, v: u128) -> Result<Self::Ok, Self::Error> {
        let v = i64::try_from(v).map_err(|_| {
            ShapeError::UnsupportedShape(format!("integer {} does not fit in 64 bits", v))
        })?;
        self.serialize_i64(v)
    }

    fn serialize_f32(self, v: f32) -> Result<Self::Ok, Self::Error> {
        self.leaf(Value::Float(f64::from(v)))
    }

    fn serialize_f64(self, v: f64) -> Result<Self::Ok, Self::Error> {
        self.leaf(Value::Float(v))
    }

    fn serialize_char(self, v: char) -> Result<Self::Ok, Self::Error> {
        self.leaf(Value::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Self::Ok, Self::Error> {
        if self.identity.leaf() == Some(LeafKind::DateTime) {
            if let Some(count) = self.config.date_format.to_epoch(v)? {
                return self.leaf(Value::Int(count));
            }
        }
        self.leaf(Value::String(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Self::Ok, Self::Error> {
        self.leaf(Value::Bytes(v.to_vec()))
    }

    fn serialize_none(self) -> Result<Self::Ok, Self::Error> {
        if self.field_level {
            return Ok(None);
        }
        self.leaf(Value::Null)
    }

    fn serialize_some<T>(self, value: &T) -> Result<Self::Ok, Self::Error>
    where
        T: ?Sized + Serialize,
    {
        child(self.config, value).map(Some)
    }

    fn serialize_unit(self) -> Result<Self::Ok, Self::Error> {
        self.leaf(Value::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Self::Ok, Self::Error> {
        self.leaf(Value::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Self::Ok, Self::Error> {
        self.leaf(Value::String(variant.to_string()))
    }

    fn serialize_newtype_struct<T>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error>
    where
        T: ?Sized + Serialize,
    {
        let inner = child(self.config, value)?;
        Ok(Some(tagged(self.identity, variant, inner)))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq, Self::Error> {
        Ok(SeqTracer {
            config: self.config,
            identity: self.identity,
            variant: None,
            items: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple, Self::Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleStruct, Self::Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleVariant, Self::Error> {
        Ok(SeqTracer {
            config: self.config,
            identity: self.identity,
            variant: Some(variant),
            items: Vec::with_capacity(len),
        })
    }

    fn serialize_map(self, len: Option<usize>) -> Result<Self::SerializeMap, Self::Error> {
        Ok(MapTracer {
            config: self.config,
            identity: self.identity,
            pending_key: None,
            fields: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeStruct, Self::Error> {
        Ok(RecordTracer {
            config: self.config,
            identity: self.identity,
            variant: None,
            fields: Vec::with_capacity(len),
        })
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeStructVariant, Self::Error> {
        Ok(RecordTracer {
            config: self.config,
            identity: self.identity,
            variant: Some(variant),
            fields: Vec::with_capacity(len),
        })
    }
}

/// Collects positional children.
pub struct SeqTracer<'a> {
    config: &'a EncodingConfig,
    identity: TypeIdentity,
    variant: Option<&'static str>,
    items: Vec<Traced>,
}

impl SeqTracer<'_> {
    fn push<T>(&mut self, value: &T) -> Result<(), ShapeError>
    where
        T: ?Sized + Serialize,
    {
        self.items.push(child(self.config, value)?);
        Ok(())
    }

    fn finish(self) -> Result<Option<Traced>, ShapeError> {
        match self.variant {
            None => Ok(Some(Traced {
                identity: self.identity,
                node: TracedNode::Sequence(self.items),
            })),
            Some(variant) => {
                let inner = Traced {
                    identity: self.identity.clone(),
                    node: TracedNode::Sequence(self.items),
                };
                Ok(Some(tagged(self.identity, variant, inner)))
            }
        }
    }
}

impl ser::SerializeSeq for SeqTracer<'_> {
    type Ok = Option<Traced>;
    type Error = ShapeError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<(), Self::Error>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        self.finish()
    }
}

impl ser::SerializeTuple for SeqTracer<'_> {
    type Ok = Option<Traced>;
    type Error = ShapeError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<(), Self::Error>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        self.finish()
    }
}

impl ser::SerializeTupleStruct for SeqTracer<'_> {
    type Ok = Option<Traced>;
    type Error = ShapeError;

    fn serialize_field<T>(&mut self, value: &T) -> Result<(), Self::Error>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        self.finish()
    }
}

impl ser::SerializeTupleVariant for SeqTracer<'_> {
    type Ok = Option<Traced>;
    type Error = ShapeError;

    fn serialize_field<T>(&mut self, value: &T) -> Result<(), Self::Error>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        self.finish()
    }
}

/// Collects data-keyed children. Keys are not passed through the key strategy.
pub struct MapTracer<'a> {
    config: &'a EncodingConfig,
    identity: TypeIdentity,
    pending_key: Option<String>,
    fields: Vec<TracedField>,
}

fn key_to_string(key: Traced) -> Result<String, ShapeError> {
    match key.node {
        TracedNode::Scalar(Value::String(s)) => Ok(s),
        TracedNode::Scalar(Value::Int(i)) => Ok(i.to_string()),
        TracedNode::Scalar(Value::Bool(b)) => Ok(b.to_string()),
        other => Err(ShapeError::UnsupportedShape(format!(
            "map keys must be string-like, found {:?}",
            other
        ))),
    }
}

impl ser::SerializeMap for MapTracer<'_> {
    type Ok = Option<Traced>;
    type Error = ShapeError;

    fn serialize_key<T>(&mut self, key: &T) -> Result<(), Self::Error>
    where
        T: ?Sized + Serialize,
    {
        let key = key_to_string(child(self.config, key)?)?;
        self.pending_key = Some(key);
        Ok(())
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<(), Self::Error>
    where
        T: ?Sized + Serialize,
    {
        let name = self.pending_key.take().ok_or_else(|| {
            ShapeError::General("serialize_value called before serialize_key".into())
        })?;
        let value = child(self.config, value)?;
        if self.fields.iter().any(|f| f.name == name) {
            return Err(ShapeError::UnsupportedShape(format!(
                "duplicate map key '{}'",
                name
            )));
        }
        self.fields.push(TracedField {
            name,
            optional: value.identity.is_optional(),
            declared: Some(value.identity.clone()),
            value: Some(value),
        });
        Ok(())
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(Some(Traced {
            identity: self.identity,
            node: TracedNode::Map(self.fields),
        }))
    }
}

/// Collects struct fields, applying the key strategy to each name.
pub struct RecordTracer<'a> {
    config: &'a EncodingConfig,
    identity: TypeIdentity,
    variant: Option<&'static str>,
    fields: Vec<TracedField>,
}

impl RecordTracer<'_> {
    fn push<T>(&mut self, key: &'static str, value: &T) -> Result<(), ShapeError>
    where
        T: ?Sized + Serialize,
    {
        let identity = TypeIdentity::of::<T>();
        let optional = identity.is_optional();
        let slot = value.serialize(TraceSerializer::for_field(self.config, identity.clone()))?;
        self.fields.push(TracedField {
            name: self.config.encode_key(key),
            optional,
            declared: Some(identity),
            value: slot,
        });
        Ok(())
    }

    fn skip(&mut self, key: &'static str) {
        self.fields.push(TracedField {
            name: self.config.encode_key(key),
            optional: true,
            declared: None,
            value: None,
        });
    }

    fn finish(self) -> Result<Option<Traced>, ShapeError> {
        match self.variant {
            None => Ok(Some(Traced {
                identity: self.identity,
                node: TracedNode::Record(self.fields),
            })),
            Some(variant) => {
                let inner = Traced {
                    identity: self.identity.clone(),
                    node: TracedNode::Record(self.fields),
                };
                Ok(Some(tagged(self.identity, variant, inner)))
            }
        }
    }
}

impl ser::SerializeStruct for RecordTracer<'_> {
    type Ok = Option<Traced>;
    type Error = ShapeError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<(), Self::Error>
    where
        T: ?Sized + Serialize,
    {
        self.push(key, value)
    }

    fn skip_field(&mut self, key: &'static str) -> Result<(), Self::Error> {
        self.skip(key);
        Ok(())
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        self.finish()
    }
}

impl ser::SerializeStructVariant for RecordTracer<'_> {
    type Ok = Option<Traced>;
    type Error = ShapeError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<(), Self::Error>
    where
        T: ?Sized + Serialize,
    {
        self.push(key, value)
    }

    fn skip_field(&mut self, key: &'static str) -> Result<(), Self::Error> {
        self.skip(key);
        Ok(())
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        self.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::super::{to_value, trace};
    use super::*;
    use crate::config::DateFormat;
    use chrono::{DateTime, TimeZone, Utc};
    use serde::Serialize;
    use std::collections::BTreeMap;

    #[derive(Serialize)]
    struct Query {
        #[serde(rename = "pageSize")]
        page_size: u32,
        tags: Vec<String>,
        cursor: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        filter: Option<String>,
        explicit: Option<Option<i32>>,
    }

    #[derive(Serialize)]
    enum Color {
        Red,
    }

    #[derive(Serialize)]
    enum Shape {
        Circle { radius: f64 },
    }

    #[test]
    fn test_record_fields_and_absence() {
        let query = Query {
            page_size: 20,
            tags: vec!["a".into(), "b".into()],
            cursor: None,
            filter: None,
            explicit: Some(None),
        };
        let traced = trace(&query, &EncodingConfig::DEFAULT).unwrap();
        let fields = traced.fields().unwrap();

        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["page_size", "tags", "cursor", "filter", "explicit"]);

        assert!(!fields[0].optional);
        assert!(fields[2].optional && fields[2].value.is_none());
        assert!(fields[3].optional && fields[3].value.is_none());
        assert_eq!(
            fields[4].value.as_ref().map(|v| &v.node),
            Some(&TracedNode::Scalar(Value::Null))
        );

        let value = traced.to_value();
        let mapping = value.as_mapping().unwrap();
        assert_eq!(mapping.len(), 3);
        assert_eq!(mapping.get("page_size"), Some(&Value::Int(20)));
        assert_eq!(mapping.get("explicit"), Some(&Value::Null));
        assert!(mapping.get("cursor").is_none());
    }

    #[test]
    fn test_identities_are_stamped() {
        let traced = trace(&vec![1u8, 2], &EncodingConfig::DEFAULT).unwrap();
        assert_eq!(traced.identity.segment(), "Vec");
        match traced.node {
            TracedNode::Sequence(items) => {
                assert_eq!(items.len(), 2);
                assert_eq!(items[0].identity.key(), "u8");
            }
            other => panic!("expected sequence, got {:?}", other),
        }
    }

    #[test]
    fn test_enum_variants() {
        let value = to_value(&Color::Red, &EncodingConfig::DEFAULT).unwrap();
        assert_eq!(value, Value::String("Red".into()));

        let traced = trace(&Shape::Circle { radius: 1.5 }, &EncodingConfig::DEFAULT).unwrap();
        assert!(matches!(traced.node, TracedNode::Variant(ref name, _) if name == "Circle"));
        let value = traced.to_value();
        let inner = value.get("Circle").unwrap();
        assert_eq!(inner.get("radius"), Some(&Value::Float(1.5)));
    }

    #[test]
    fn test_map_keys_are_not_transformed() {
        let mut map = BTreeMap::new();
        map.insert("someKey".to_string(), 1);
        let value = to_value(&map, &EncodingConfig::DEFAULT).unwrap();
        assert_eq!(value.get("someKey"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_dates_follow_format() {
        let when: DateTime<Utc> = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();

        let iso = to_value(&when, &EncodingConfig::DEFAULT).unwrap();
        assert_eq!(iso, Value::String("2024-05-01T10:00:00Z".into()));

        let config = EncodingConfig::DEFAULT.with_date_format(DateFormat::SecondsSince1970);
        let epoch = to_value(&when, &config).unwrap();
        assert_eq!(epoch, Value::Int(1_714_557_600));
    }

    #[test]
    fn test_oversized_integers_are_rejected() {
        let err = to_value(&u64::MAX, &EncodingConfig::DEFAULT).unwrap_err();
        assert!(matches!(err, ShapeError::UnsupportedShape(_)));
    }
}
