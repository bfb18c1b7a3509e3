//! # Schema Builder
//!
//! Derives schema nodes from captured values. Structs are registered before
//! their fields are built, so a repeated or self-referential type resolves to
//! a reference. Absent optional fields still get a property, typed from
//! their declared type and never required.

use crate::config::EncodingConfig;
use crate::error::{ShapeError, ShapeResult};
use crate::identity::TypeIdentity;
use crate::schema::{primitive_for, Format, PrimitiveKind, Property, SchemaNode, SchemaRegistry};
use crate::traverse::{Traced, TracedField, TracedNode};
use crate::value::Value;

/// Builds schema nodes into a registry.
pub struct SchemaBuilder<'a> {
    registry: &'a mut SchemaRegistry,
    config: &'a EncodingConfig,
}

impl<'a> SchemaBuilder<'a> {
    /// Builder writing into `registry`.
    pub fn new(registry: &'a mut SchemaRegistry, config: &'a EncodingConfig) -> Self {
        SchemaBuilder { registry, config }
    }

    /// Builds the node for one captured value.
    pub fn build(&mut self, traced: &Traced) -> ShapeResult<SchemaNode> {
        match &traced.node {
            TracedNode::Scalar(value) => self.scalar(&traced.identity, value),
            TracedNode::Sequence(items) => self.sequence(&traced.identity, items),
            TracedNode::Record(fields) => self.record(&traced.identity, fields),
            TracedNode::Map(fields) => self.map(&traced.identity, fields),
            TracedNode::Variant(name, _) => Err(ShapeError::UnsupportedShape(format!(
                "variant '{}' of '{}' carries data and has no schema",
                name, traced.identity
            ))),
        }
    }

    fn scalar(&mut self, identity: &TypeIdentity, value: &Value) -> ShapeResult<SchemaNode> {
        if let (Value::String(_), Some(name)) = (value, self.registry.name_of(identity)) {
            return Ok(SchemaNode::Reference(name.to_string()));
        }
        if let Some(node) = primitive_for(identity, self.config) {
            if accepts(&node, value) {
                return Ok(node);
            }
        }
        of_value(identity, value)
    }

    fn sequence(&mut self, identity: &TypeIdentity, items: &[Traced]) -> ShapeResult<SchemaNode> {
        let observed = items
            .iter()
            .find(|item| !matches!(item.node, TracedNode::Scalar(Value::Null)));
        let item = match observed {
            Some(item) => self.build(item)?,
            None => self.declared(identity.item()),
        };
        Ok(SchemaNode::ArrayOf(Box::new(item)))
    }

    fn map(&mut self, identity: &TypeIdentity, fields: &[TracedField]) -> ShapeResult<SchemaNode> {
        let observed = fields
            .iter()
            .filter_map(|f| f.value.as_ref())
            .find(|v| !matches!(v.node, TracedNode::Scalar(Value::Null)));
        let value = match observed {
            Some(value) => self.build(value)?,
            None => self.declared(identity.args().get(1)),
        };
        Ok(SchemaNode::MapOf(Box::new(value)))
    }

    fn record(&mut self, identity: &TypeIdentity, fields: &[TracedField]) -> ShapeResult<SchemaNode> {
        let registration = self.registry.register(identity)?;
        if !registration.is_new {
            return Ok(SchemaNode::Reference(registration.name));
        }

        let mut properties = Vec::with_capacity(fields.len());
        for field in fields {
            let (schema, required) = match &field.value {
                Some(value) => (self.build(value)?, !field.optional),
                None => (self.declared(field.declared.as_ref()), false),
            };
            properties.push(Property {
                name: field.name.clone(),
                schema,
                required,
            });
        }

        self.registry
            .commit(&registration.name, SchemaNode::ObjectOf(properties))?;
        Ok(SchemaNode::Reference(registration.name))
    }

    /// Schema for an element type that was never observed.
    fn declared(&self, identity: Option<&TypeIdentity>) -> SchemaNode {
        let Some(identity) = identity else {
            return SchemaNode::Any;
        };
        if let Some(name) = self.registry.name_of(identity) {
            return SchemaNode::Reference(name.to_string());
        }
        primitive_for(identity, self.config).unwrap_or(SchemaNode::Any)
    }
}

fn accepts(node: &SchemaNode, value: &Value) -> bool {
    let SchemaNode::Primitive { kind, .. } = node else {
        return false;
    };
    matches!(
        (kind, value),
        (PrimitiveKind::Null, Value::Null)
            | (PrimitiveKind::Boolean, Value::Bool(_))
            | (PrimitiveKind::Integer, Value::Int(_))
            | (PrimitiveKind::Number, Value::Float(_) | Value::Int(_))
            | (PrimitiveKind::String, Value::String(_))
    )
}

fn of_value(identity: &TypeIdentity, value: &Value) -> ShapeResult<SchemaNode> {
    Ok(match value {
        Value::Null => SchemaNode::primitive(PrimitiveKind::Null),
        Value::Bool(_) => SchemaNode::primitive(PrimitiveKind::Boolean),
        Value::Int(_) => SchemaNode::formatted(PrimitiveKind::Integer, Format::Int64),
        Value::Float(_) => SchemaNode::formatted(PrimitiveKind::Number, Format::Double),
        Value::String(_) => SchemaNode::primitive(PrimitiveKind::String),
        Value::Bytes(_) => SchemaNode::formatted(PrimitiveKind::String, Format::Byte),
        Value::Sequence(_) | Value::Mapping(_) => {
            return Err(ShapeError::UnsupportedShape(format!(
                "composite value of '{}' captured as a leaf",
                identity
            )))
        }
    })
}
