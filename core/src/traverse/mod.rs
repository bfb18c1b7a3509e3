#![deny(missing_docs)]

//! # Traversal Protocol
//!
//! serde is the traversal protocol: the engine never has per-type code.
//!
//! - **ser**: captures a `Serialize` value as a [`Traced`] tree (value plus
//!   type identity per node).
//! - **probe**: drives `Deserialize` with placeholder input to describe a
//!   type's complete shape without an instance.
//! - **de**: the reverse direction, populating a `Deserialize` type from a
//!   [`Value`].
//!
//! Absent-vs-null policy: a field whose declared type is `Option` and whose
//! value is `None` is *absent* (recorded with `value: None` and omitted from
//! the plain [`Value`]). `Some(None)` or `()` is present-and-null.

pub mod de;
pub mod probe;
pub mod ser;

use crate::config::EncodingConfig;
use crate::error::ShapeResult;
use crate::identity::TypeIdentity;
use crate::value::{Mapping, Value};
use serde::Serialize;

pub use de::{from_value, ValueDeserializer};
pub use probe::describe;
pub use ser::TraceSerializer;

/// A captured value annotated with the static identity of its declared type.
#[derive(Debug, Clone, PartialEq)]
pub struct Traced {
    /// Identity of the declared type at this position.
    pub identity: TypeIdentity,
    /// The captured content.
    pub node: TracedNode,
}

/// Content of a [`Traced`] node.
#[derive(Debug, Clone, PartialEq)]
pub enum TracedNode {
    /// A primitive, date or null leaf.
    Scalar(Value),
    /// Positional children.
    Sequence(Vec<Traced>),
    /// Struct output.
    Record(Vec<TracedField>),
    /// Map output with data keys.
    Map(Vec<TracedField>),
    /// An enum variant carrying data, externally tagged by its name.
    Variant(String, Box<Traced>),
}

/// One keyed child.
#[derive(Debug, Clone, PartialEq)]
pub struct TracedField {
    /// Wire name (struct fields pass through the key strategy).
    pub name: String,
    /// Whether the declared type is optional.
    pub optional: bool,
    /// Declared type of the field; `None` for fields serde skipped.
    pub declared: Option<TypeIdentity>,
    /// `None` when the field is absent.
    pub value: Option<Traced>,
}

impl Traced {
    /// Builds a leaf.
    pub fn scalar(identity: TypeIdentity, value: Value) -> Self {
        Traced {
            identity,
            node: TracedNode::Scalar(value),
        }
    }

    /// Strips annotations, omitting absent fields.
    pub fn to_value(&self) -> Value {
        match &self.node {
            TracedNode::Scalar(v) => v.clone(),
            TracedNode::Sequence(items) => {
                Value::Sequence(items.iter().map(Traced::to_value).collect())
            }
            TracedNode::Record(fields) | TracedNode::Map(fields) => Value::Mapping(
                fields
                    .iter()
                    .filter_map(|f| f.value.as_ref().map(|v| (f.name.clone(), v.to_value())))
                    .collect::<Mapping>(),
            ),
            TracedNode::Variant(name, inner) => {
                let mut tagged = Mapping::new();
                tagged.insert(name.clone(), inner.to_value());
                Value::Mapping(tagged)
            }
        }
    }

    /// Keyed children, if any.
    pub fn fields(&self) -> Option<&[TracedField]> {
        match &self.node {
            TracedNode::Record(fields) | TracedNode::Map(fields) => Some(fields),
            _ => None,
        }
    }
}

/// Captures `value` through the traversal protocol.
pub fn trace<T>(value: &T, config: &EncodingConfig) -> ShapeResult<Traced>
where
    T: Serialize + ?Sized,
{
    let identity = TypeIdentity::of::<T>();
    let slot = value.serialize(TraceSerializer::new(config, identity.clone()))?;
    Ok(slot.unwrap_or_else(|| Traced::scalar(identity, Value::Null)))
}

/// Captures `value` and returns only its Structural Value.
pub fn to_value<T>(value: &T, config: &EncodingConfig) -> ShapeResult<Value>
where
    T: Serialize + ?Sized,
{
    Ok(trace(value, config)?.to_value())
}
