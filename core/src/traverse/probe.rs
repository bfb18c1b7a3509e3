//! # Type Probe
//!
//! Describes a type without an instance by driving its `Deserialize` impl
//! with placeholder input. Every struct field, every map value type and every
//! unit enum variant is visited, so the resulting schema is complete even for
//! fields a particular value would leave out.
//!
//! Recursion stops at `Option`, sequence element and map value positions
//! whose type is already registered: the probe answers `None` or an empty
//! collection and records a reference instead of descending.

use crate::config::EncodingConfig;
use crate::error::{ShapeError, ShapeResult};
use crate::identity::{LeafKind, TypeIdentity};
use crate::schema::{
    primitive_for, Format, PrimitiveKind, Property, SchemaNode, SchemaRegistry,
};
use serde::de::value::StrDeserializer;
use serde::de::{self, DeserializeOwned, DeserializeSeed, Visitor};

/// Describes `T`, registering every object and enum it contains.
///
/// Objects and enums come back as a [`SchemaNode::Reference`]. The registry
/// is left untouched when describing fails.
pub fn describe<T>(config: &EncodingConfig, registry: &mut SchemaRegistry) -> ShapeResult<SchemaNode>
where
    T: DeserializeOwned,
{
    let identity = TypeIdentity::of::<T>();
    let mut scratch = registry.clone();
    let mut out = None;
    T::deserialize(Probe {
        config,
        registry: &mut scratch,
        identity: identity.clone(),
        out: &mut out,
    })?;
    let node = out.ok_or_else(|| {
        ShapeError::UnsupportedShape(format!("type '{}' produced no schema", identity))
    })?;
    *registry = scratch;
    Ok(node)
}

struct Probe<'a> {
    config: &'a EncodingConfig,
    registry: &'a mut SchemaRegistry,
    identity: TypeIdentity,
    out: &'a mut Option<SchemaNode>,
}

impl Probe<'_> {
    fn record(self, fallback: SchemaNode) {
        let node = primitive_for(&self.identity, self.config).unwrap_or(fallback);
        *self.out = Some(node);
    }

    fn placeholder(&self) -> &'static str {
        match self.identity.leaf() {
            Some(LeafKind::DateTime) => "1970-01-01T00:00:00Z",
            Some(LeafKind::NaiveDateTime) => "1970-01-01T00:00:00",
            Some(LeafKind::NaiveDate) => "1970-01-01",
            Some(LeafKind::Uuid) => "00000000-0000-0000-0000-000000000000",
            None => "",
        }
    }
}

fn int32() -> SchemaNode {
    SchemaNode::formatted(PrimitiveKind::Integer, Format::Int32)
}

fn int64() -> SchemaNode {
    SchemaNode::formatted(PrimitiveKind::Integer, Format::Int64)
}

macro_rules! probe_scalar {
    ($($method:ident => $visit:ident($($placeholder:expr)?), $fallback:expr;)*) => {
        $(
            fn $method<V>(self, visitor: V) -> Result<V::Value, Self::Error>
            where
                V: Visitor<'de>,
            {
                self.record($fallback);
                visitor.$visit($($placeholder)?)
            }
        )*
    };
}

impl<'de> de::Deserializer<'de> for Probe<'_> {
    type Error = ShapeError;

    fn deserialize_any<V>(self, _visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        Err(ShapeError::UnsupportedShape(format!(
            "type '{}' does not declare its shape",
            self.identity
        )))
    }

    probe_scalar! {
        deserialize_bool => visit_bool(false), SchemaNode::primitive(PrimitiveKind::Boolean);
        deserialize_i8 => visit_i8(0), int32();
        deserialize_i16 => visit_i16(0), int32();
        deserialize_i32 => visit_i32(0), int32();
        deserialize_i64 => visit_i64(0), int64();
        deserialize_i128 => visit_i128(0), int64();
        deserialize_u8 => visit_u8(0), int32();
        deserialize_u16 => visit_u16(0), int32();
        deserialize_u32 => visit_u32(0), int64();
        deserialize_u64 => visit_u64(0), int64();
        deserialize_u128 => visit_u128(0), int64();
        deserialize_f32 => visit_f32(0.0), SchemaNode::formatted(PrimitiveKind::Number, Format::Float);
        deserialize_f64 => visit_f64(0.0), SchemaNode::formatted(PrimitiveKind::Number, Format::Double);
        deserialize_char => visit_char('a'), SchemaNode::primitive(PrimitiveKind::String);
        deserialize_bytes => visit_bytes(&[]), SchemaNode::formatted(PrimitiveKind::String, Format::Byte);
        deserialize_byte_buf => visit_byte_buf(Vec::new()), SchemaNode::formatted(PrimitiveKind::String, Format::Byte);
        deserialize_unit => visit_unit(), SchemaNode::primitive(PrimitiveKind::Null);
        deserialize_ignored_any => visit_unit(), SchemaNode::Any;
    }

    fn deserialize_str<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        let placeholder = self.placeholder();
        self.record(SchemaNode::primitive(PrimitiveKind::String));
        visitor.visit_str(placeholder)
    }

    fn deserialize_string<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_str(visitor)
    }

    fn deserialize_identifier<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_str(visitor)
    }

    fn deserialize_unit_struct<V>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_unit(visitor)
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        let Probe {
            config,
            registry,
            identity,
            out,
        } = self;

        // Only the outermost Option is stripped from an identity.
        let nested = (identity.segment() == "Option")
            .then(|| identity.args().first().cloned())
            .flatten();
        let inner = nested.unwrap_or(identity);

        if let Some(name) = registry.name_of(&inner) {
            tracing::debug!(identity = %inner, name = %name, "probe stopped at registered type");
            *out = Some(SchemaNode::Reference(name.to_string()));
            return visitor.visit_none();
        }

        visitor.visit_some(Probe {
            config,
            registry,
            identity: inner,
            out,
        })
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

    fn deserialize_seq<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        let Probe {
            config,
            registry,
            out,
            ..
        } = self;
        let mut item = None;
        let value = visitor.visit_seq(SeqProbe {
            config,
            registry,
            remaining: 1,
            stop_at_registered: true,
            item: &mut item,
        })?;
        *out = Some(SchemaNode::ArrayOf(Box::new(item.unwrap_or(SchemaNode::Any))));
        Ok(value)
    }

    fn deserialize_tuple<V>(self, len: usize, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        let Probe {
            config,
            registry,
            out,
            ..
        } = self;
        let mut item = None;
        let value = visitor.visit_seq(SeqProbe {
            config,
            registry,
            remaining: len,
            stop_at_registered: false,
            item: &mut item,
        })?;
        *out = Some(SchemaNode::ArrayOf(Box::new(item.unwrap_or(SchemaNode::Any))));
        Ok(value)
    }

    fn deserialize_tuple_struct<V>(
        self,
        _name: &'static str,
        len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        self.deserialize_tuple(len, visitor)
    }

    fn deserialize_map<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        let Probe {
            config,
            registry,
            identity,
            out,
        } = self;

        if let Some(name) = identity.args().get(1).and_then(|v| registry.name_of(v)) {
            tracing::debug!(identity = %identity, name = %name, "probe stopped at registered map value");
            *out = Some(SchemaNode::MapOf(Box::new(SchemaNode::Reference(name.to_string()))));
            return visitor.visit_map(MapProbe {
                config,
                registry,
                remaining: 0,
                key_identity: None,
                value: &mut None,
            });
        }

        let mut value_schema = None;
        let value = visitor.visit_map(MapProbe {
            config,
            registry,
            remaining: 1,
            key_identity: identity.args().first().cloned(),
            value: &mut value_schema,
        })?;
        *out = Some(SchemaNode::MapOf(Box::new(
            value_schema.unwrap_or(SchemaNode::Any),
        )));
        Ok(value)
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
        let Probe {
            config,
            registry,
            identity,
            out,
        } = self;

        let registration = registry.register(&identity)?;
        let mut properties = Vec::with_capacity(fields.len());
        let value = visitor.visit_map(StructProbe {
            config,
            registry: &mut *registry,
            fields,
            index: 0,
            properties: &mut properties,
        })?;
        if registration.is_new {
            registry.commit(&registration.name, SchemaNode::ObjectOf(properties))?;
        }
        *out = Some(SchemaNode::Reference(registration.name));
        Ok(value)
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        let Probe {
            registry,
            identity,
            out,
            ..
        } = self;

        let first = variants.first().ok_or_else(|| {
            ShapeError::UnsupportedShape(format!("enum '{}' has no variants", identity))
        })?;
        let registration = registry.register(&identity)?;
        let value = visitor.visit_enum(VariantProbe { variant: first })?;
        if registration.is_new {
            let literals = variants.iter().map(|v| v.to_string()).collect();
            registry.commit(&registration.name, SchemaNode::EnumOf(literals))?;
        }
        *out = Some(SchemaNode::Reference(registration.name));
        Ok(value)
    }
}

/// Feeds sequence elements. The schema of the first element is kept.
struct SeqProbe<'a> {
    config: &'a EncodingConfig,
    registry: &'a mut SchemaRegistry,
    remaining: usize,
    stop_at_registered: bool,
    item: &'a mut Option<SchemaNode>,
}

impl<'de> de::SeqAccess<'de> for SeqProbe<'_> {
    type Error = ShapeError;

    fn next_element_seed<S>(&mut self, seed: S) -> Result<Option<S::Value>, Self::Error>
    where
        S: DeserializeSeed<'de>,
    {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;

        let identity = TypeIdentity::of::<S::Value>();
        if self.stop_at_registered {
            if let Some(name) = self.registry.name_of(&identity) {
                tracing::debug!(identity = %identity, name = %name, "probe stopped at registered element");
                *self.item = Some(SchemaNode::Reference(name.to_string()));
                return Ok(None);
            }
        }

        let mut schema = None;
        let value = seed.deserialize(Probe {
            config: self.config,
            registry: &mut *self.registry,
            identity,
            out: &mut schema,
        })?;
        if self.item.is_none() {
            *self.item = schema;
        }
        Ok(Some(value))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.remaining)
    }
}

/// Feeds at most one map entry.
struct MapProbe<'a> {
    config: &'a EncodingConfig,
    registry: &'a mut SchemaRegistry,
    remaining: usize,
    key_identity: Option<TypeIdentity>,
    value: &'a mut Option<SchemaNode>,
}

impl<'de> de::MapAccess<'de> for MapProbe<'_> {
    type Error = ShapeError;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>, Self::Error>
    where
        K: DeserializeSeed<'de>,
    {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;

        let identity = self
            .key_identity
            .take()
            .unwrap_or_else(TypeIdentity::of::<K::Value>);
        let mut discarded = None;
        seed.deserialize(Probe {
            config: self.config,
            registry: &mut *self.registry,
            identity,
            out: &mut discarded,
        })
        .map(Some)
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value, Self::Error>
    where
        V: DeserializeSeed<'de>,
    {
        seed.deserialize(Probe {
            config: self.config,
            registry: &mut *self.registry,
            identity: TypeIdentity::of::<V::Value>(),
            out: &mut *self.value,
        })
    }
}

/// Feeds every declared struct field in order.
struct StructProbe<'a> {
    config: &'a EncodingConfig,
    registry: &'a mut SchemaRegistry,
    fields: &'static [&'static str],
    index: usize,
    properties: &'a mut Vec<Property>,
}

impl<'de> de::MapAccess<'de> for StructProbe<'_> {
    type Error = ShapeError;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>, Self::Error>
    where
        K: DeserializeSeed<'de>,
    {
        match self.fields.get(self.index) {
            Some(field) => seed
                .deserialize(StrDeserializer::<ShapeError>::new(field))
                .map(Some),
            None => Ok(None),
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value, Self::Error>
    where
        V: DeserializeSeed<'de>,
    {
        let field = self
            .fields
            .get(self.index)
            .ok_or_else(|| ShapeError::General("value requested before key".into()))?;
        self.index += 1;

        let identity = TypeIdentity::of::<V::Value>();
        let required = !identity.is_optional();
        let mut schema = None;
        let value = seed.deserialize(Probe {
            config: self.config,
            registry: &mut *self.registry,
            identity,
            out: &mut schema,
        })?;
        self.properties.push(Property {
            name: self.config.encode_key(field),
            schema: schema.unwrap_or(SchemaNode::Any),
            required,
        });
        Ok(value)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.fields.len() - self.index)
    }
}

/// Selects one unit variant.
struct VariantProbe {
    variant: &'static str,
}

impl<'de> de::EnumAccess<'de> for VariantProbe {
    type Error = ShapeError;
    type Variant = UnitOnly;

    fn variant_seed<S>(self, seed: S) -> Result<(S::Value, Self::Variant), Self::Error>
    where
        S: DeserializeSeed<'de>,
    {
        let value = seed.deserialize(StrDeserializer::<ShapeError>::new(self.variant))?;
        Ok((value, UnitOnly))
    }
}

struct UnitOnly;

fn data_variant() -> ShapeError {
    ShapeError::UnsupportedShape("enum variants carrying data cannot be described".into())
}

impl<'de> de::VariantAccess<'de> for UnitOnly {
    type Error = ShapeError;

    fn unit_variant(self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn newtype_variant_seed<T>(self, _seed: T) -> Result<T::Value, Self::Error>
    where
        T: DeserializeSeed<'de>,
    {
        Err(data_variant())
    }

    fn tuple_variant<V>(self, _len: usize, _visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        Err(data_variant())
    }

    fn struct_variant<V>(
        self,
        _fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        Err(data_variant())
    }
}
