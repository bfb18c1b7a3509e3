#![deny(missing_docs)]

//! # Schema Model
//!
//! - **registry**: identity → name store with pre-reservation.
//! - **builder**: value-driven schema derivation from [`Traced`] trees.
//! - **openapi**: export of committed schemas into utoipa document types.
//!
//! Objects and unit enums are registered and referenced by name; primitives
//! and arrays are always inline.

pub mod builder;
pub mod openapi;
pub mod registry;

use crate::config::{DateFormat, EncodingConfig};
use crate::error::ShapeResult;
use crate::identity::{LeafKind, TypeIdentity};
use crate::traverse::{trace, Traced};
use serde::Serialize;

pub use builder::SchemaBuilder;
pub use openapi::{to_openapi, ComponentStore};
pub use registry::{Registration, SchemaRegistry};

/// JSON Schema primitive types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    /// `null`
    Null,
    /// `boolean`
    Boolean,
    /// `integer`
    Integer,
    /// `number`
    Number,
    /// `string`
    String,
}

/// Format tags attached to primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// `int32`
    Int32,
    /// `int64`
    Int64,
    /// `float`
    Float,
    /// `double`
    Double,
    /// `byte` (base64 text)
    Byte,
    /// `date`
    Date,
    /// `date-time`
    DateTime,
    /// `uuid`
    Uuid,
    /// `unix-time` (seconds)
    UnixTime,
    /// `unix-time-ms`
    UnixTimeMillis,
}

impl Format {
    /// The tag as written in a document.
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Int32 => "int32",
            Format::Int64 => "int64",
            Format::Float => "float",
            Format::Double => "double",
            Format::Byte => "byte",
            Format::Date => "date",
            Format::DateTime => "date-time",
            Format::Uuid => "uuid",
            Format::UnixTime => "unix-time",
            Format::UnixTimeMillis => "unix-time-ms",
        }
    }

    /// Whether values carry an epoch-encoded date.
    pub fn is_epoch(&self) -> bool {
        matches!(self, Format::UnixTime | Format::UnixTimeMillis)
    }
}

/// A schema description node.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    /// A primitive with an optional format tag.
    Primitive {
        /// JSON type.
        kind: PrimitiveKind,
        /// Format tag.
        format: Option<Format>,
    },
    /// Array with item schema.
    ArrayOf(Box<SchemaNode>),
    /// String-keyed map with value schema.
    MapOf(Box<SchemaNode>),
    /// Object with ordered properties.
    ObjectOf(Vec<Property>),
    /// Closed set of string literals.
    EnumOf(Vec<String>),
    /// Reference to a registered schema.
    Reference(String),
    /// Unconstrained (items of an empty sequence whose shape was never observed).
    Any,
}

/// One object property.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    /// Wire name.
    pub name: String,
    /// Property schema.
    pub schema: SchemaNode,
    /// Whether the property must be present.
    pub required: bool,
}

impl SchemaNode {
    /// Untagged primitive.
    pub fn primitive(kind: PrimitiveKind) -> Self {
        SchemaNode::Primitive { kind, format: None }
    }

    /// Primitive with a format tag.
    pub fn formatted(kind: PrimitiveKind, format: Format) -> Self {
        SchemaNode::Primitive {
            kind,
            format: Some(format),
        }
    }

    /// Referenced name, if this is a reference.
    pub fn reference_name(&self) -> Option<&str> {
        match self {
            SchemaNode::Reference(name) => Some(name),
            _ => None,
        }
    }

    /// Collects every referenced name in this subtree.
    pub fn collect_references<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            SchemaNode::Reference(name) => out.push(name),
            SchemaNode::ArrayOf(inner) | SchemaNode::MapOf(inner) => inner.collect_references(out),
            SchemaNode::ObjectOf(props) => {
                for prop in props {
                    prop.schema.collect_references(out);
                }
            }
            SchemaNode::Primitive { .. } | SchemaNode::EnumOf(_) | SchemaNode::Any => {}
        }
    }
}

/// Maps a declared leaf type to its primitive schema.
///
/// Returns `None` for types that are not known primitives or leaves.
pub fn primitive_for(identity: &TypeIdentity, config: &EncodingConfig) -> Option<SchemaNode> {
    use PrimitiveKind::*;

    if let Some(leaf) = identity.leaf() {
        return Some(match (leaf, config.date_format) {
            (LeafKind::DateTime, DateFormat::SecondsSince1970) => {
                SchemaNode::formatted(Integer, Format::UnixTime)
            }
            (LeafKind::DateTime, DateFormat::MillisecondsSince1970) => {
                SchemaNode::formatted(Integer, Format::UnixTimeMillis)
            }
            (LeafKind::DateTime, DateFormat::Iso8601) | (LeafKind::NaiveDateTime, _) => {
                SchemaNode::formatted(String, Format::DateTime)
            }
            (LeafKind::NaiveDate, _) => SchemaNode::formatted(String, Format::Date),
            (LeafKind::Uuid, _) => SchemaNode::formatted(String, Format::Uuid),
        });
    }

    let node = match identity.key() {
        "bool" => SchemaNode::primitive(Boolean),
        "i8" | "i16" | "i32" | "u8" | "u16" => SchemaNode::formatted(Integer, Format::Int32),
        "i64" | "u32" | "u64" | "isize" | "usize" | "i128" | "u128" => {
            SchemaNode::formatted(Integer, Format::Int64)
        }
        "f32" => SchemaNode::formatted(Number, Format::Float),
        "f64" => SchemaNode::formatted(Number, Format::Double),
        "char" | "str" | "alloc::string::String" => SchemaNode::primitive(String),
        "()" => SchemaNode::primitive(Null),
        _ => return None,
    };
    Some(node)
}

/// Captures `value` and derives its schema, registering composite shapes.
///
/// Objects come back as a [`SchemaNode::Reference`] to their registry entry.
/// The registry is left untouched when building fails.
pub fn encode_schema<T>(
    value: &T,
    config: &EncodingConfig,
    registry: &mut SchemaRegistry,
) -> ShapeResult<SchemaNode>
where
    T: Serialize + ?Sized,
{
    let traced: Traced = trace(value, config)?;
    let mut scratch = registry.clone();
    let node = SchemaBuilder::new(&mut scratch, config).build(&traced)?;
    *registry = scratch;
    Ok(node)
}
