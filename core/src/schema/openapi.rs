#![deny(missing_docs)]

//! # OpenAPI Export
//!
//! Converts schema nodes into utoipa document types and publishes a registry
//! into a component container. The document model itself stays external: the
//! registry only talks to it through [`ComponentStore`].

use crate::error::{ShapeError, ShapeResult};
use crate::schema::{Format, PrimitiveKind, SchemaNode, SchemaRegistry};
use utoipa::openapi::schema::{
    AdditionalProperties, ArrayBuilder, KnownFormat, ObjectBuilder, Schema, SchemaFormat,
    SchemaType, Type,
};
use utoipa::openapi::{Components, ComponentsBuilder, Ref, RefOr};

/// Prefix of local component schema references.
pub const COMPONENTS_PREFIX: &str = "#/components/schemas/";

/// A document container that receives named schemas.
pub trait ComponentStore {
    /// Inserts a named schema. Re-inserting an identical schema is a no-op.
    fn insert_schema(&mut self, name: &str, schema: RefOr<Schema>) -> ShapeResult<()>;

    /// Looks up a schema by component name.
    fn resolve_reference(&self, name: &str) -> Option<&RefOr<Schema>>;
}

impl ComponentStore for Components {
    fn insert_schema(&mut self, name: &str, schema: RefOr<Schema>) -> ShapeResult<()> {
        match self.schemas.get(name) {
            Some(existing) if *existing == schema => Ok(()),
            Some(_) => Err(ShapeError::SchemaNameCollision(format!(
                "component schema '{}' already holds a different schema",
                name
            ))),
            None => {
                self.schemas.insert(name.to_string(), schema);
                Ok(())
            }
        }
    }

    fn resolve_reference(&self, name: &str) -> Option<&RefOr<Schema>> {
        let name = name.strip_prefix(COMPONENTS_PREFIX).unwrap_or(name);
        self.schemas.get(name)
    }
}

fn schema_format(format: Format) -> SchemaFormat {
    match format {
        Format::Int32 => SchemaFormat::KnownFormat(KnownFormat::Int32),
        Format::Int64 => SchemaFormat::KnownFormat(KnownFormat::Int64),
        Format::Float => SchemaFormat::KnownFormat(KnownFormat::Float),
        Format::Double => SchemaFormat::KnownFormat(KnownFormat::Double),
        Format::Byte => SchemaFormat::KnownFormat(KnownFormat::Byte),
        Format::Date => SchemaFormat::KnownFormat(KnownFormat::Date),
        Format::DateTime => SchemaFormat::KnownFormat(KnownFormat::DateTime),
        Format::Uuid => SchemaFormat::KnownFormat(KnownFormat::Uuid),
        Format::UnixTime | Format::UnixTimeMillis => {
            SchemaFormat::Custom(format.as_str().to_string())
        }
    }
}

fn schema_type(kind: PrimitiveKind) -> Type {
    match kind {
        PrimitiveKind::Null => Type::Null,
        PrimitiveKind::Boolean => Type::Boolean,
        PrimitiveKind::Integer => Type::Integer,
        PrimitiveKind::Number => Type::Number,
        PrimitiveKind::String => Type::String,
    }
}

/// Converts one node into its document form.
pub fn to_openapi(node: &SchemaNode) -> RefOr<Schema> {
    match node {
        SchemaNode::Reference(name) => {
            RefOr::Ref(Ref::new(format!("{}{}", COMPONENTS_PREFIX, name)))
        }
        SchemaNode::Primitive { kind, format } => RefOr::T(Schema::Object(
            ObjectBuilder::new()
                .schema_type(schema_type(*kind))
                .format((*format).map(schema_format))
                .build(),
        )),
        SchemaNode::ArrayOf(item) => RefOr::T(Schema::Array(
            ArrayBuilder::new().items(to_openapi(item)).build(),
        )),
        SchemaNode::MapOf(value) => RefOr::T(Schema::Object(
            ObjectBuilder::new()
                .schema_type(Type::Object)
                .additional_properties(Some(AdditionalProperties::RefOr(to_openapi(value))))
                .build(),
        )),
        SchemaNode::ObjectOf(properties) => {
            let mut builder = ObjectBuilder::new().schema_type(Type::Object);
            for prop in properties {
                builder = builder.property(prop.name.clone(), to_openapi(&prop.schema));
                if prop.required {
                    builder = builder.required(prop.name.clone());
                }
            }
            RefOr::T(Schema::Object(builder.build()))
        }
        SchemaNode::EnumOf(literals) => RefOr::T(Schema::Object(
            ObjectBuilder::new()
                .schema_type(Type::String)
                .enum_values(Some(literals.iter().cloned()))
                .build(),
        )),
        SchemaNode::Any => RefOr::T(Schema::Object(
            ObjectBuilder::new().schema_type(SchemaType::AnyValue).build(),
        )),
    }
}

impl SchemaRegistry {
    /// Inserts every committed schema into `store`.
    ///
    /// Fails before touching the store if the registry is not finalizable.
    pub fn publish<S: ComponentStore>(&self, store: &mut S) -> ShapeResult<()> {
        self.finalize()?;
        for (name, node) in self.iter() {
            store.insert_schema(name, to_openapi(node))?;
        }
        tracing::debug!(count = self.len(), "schemas published");
        Ok(())
    }

    /// A fresh component container holding every committed schema.
    pub fn components(&self) -> ShapeResult<Components> {
        let mut components = ComponentsBuilder::new().build();
        self.publish(&mut components)?;
        Ok(components)
    }

    /// Renders the components as pretty JSON.
    pub fn to_json(&self) -> ShapeResult<String> {
        serde_json::to_string_pretty(&self.components()?)
            .map_err(|e| ShapeError::General(format!("Failed to render JSON: {}", e)))
    }

    /// Renders the components as YAML.
    pub fn to_yaml(&self) -> ShapeResult<String> {
        serde_yaml::to_string(&self.components()?)
            .map_err(|e| ShapeError::General(format!("Failed to render YAML: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::TypeIdentity;
    use crate::schema::Property;
    use serde_json::json;

    struct Pet;

    fn registry_with_pet() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        let reg = registry.register(&TypeIdentity::of::<Pet>()).unwrap();
        registry
            .commit(
                &reg.name,
                SchemaNode::ObjectOf(vec![
                    Property {
                        name: "id".into(),
                        schema: SchemaNode::formatted(PrimitiveKind::Integer, Format::Int64),
                        required: true,
                    },
                    Property {
                        name: "friends".into(),
                        schema: SchemaNode::ArrayOf(Box::new(SchemaNode::Reference("Pet".into()))),
                        required: false,
                    },
                    Property {
                        name: "born".into(),
                        schema: SchemaNode::formatted(PrimitiveKind::Integer, Format::UnixTime),
                        required: false,
                    },
                ]),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_primitive_conversion() {
        let schema = to_openapi(&SchemaNode::formatted(PrimitiveKind::Integer, Format::Int32));
        let expected = RefOr::T(Schema::Object(
            ObjectBuilder::new()
                .schema_type(Type::Integer)
                .format(Some(SchemaFormat::KnownFormat(KnownFormat::Int32)))
                .build(),
        ));
        assert!(schema == expected);
    }

    #[test]
    fn test_publish_into_components() {
        let registry = registry_with_pet();
        let components = registry.components().unwrap();
        assert!(components.resolve_reference("Pet").is_some());
        assert!(components.resolve_reference("#/components/schemas/Pet").is_some());

        let rendered: serde_json::Value =
            serde_json::from_str(&registry.to_json().unwrap()).unwrap();
        let pet = &rendered["schemas"]["Pet"];
        assert_eq!(pet["type"], json!("object"));
        assert_eq!(pet["required"], json!(["id"]));
        assert_eq!(pet["properties"]["id"]["format"], json!("int64"));
        assert_eq!(
            pet["properties"]["friends"]["items"]["$ref"],
            json!("#/components/schemas/Pet")
        );
        assert_eq!(pet["properties"]["born"]["format"], json!("unix-time"));
    }

    #[test]
    fn test_publish_rejects_conflicting_component() {
        let registry = registry_with_pet();
        let mut components = ComponentsBuilder::new().build();
        components
            .insert_schema("Pet", to_openapi(&SchemaNode::primitive(PrimitiveKind::String)))
            .unwrap();
        let err = registry.publish(&mut components).unwrap_err();
        assert!(matches!(err, ShapeError::SchemaNameCollision(_)));
    }

    #[test]
    fn test_enum_and_map_rendering() {
        let enum_schema = to_openapi(&SchemaNode::EnumOf(vec!["on".into(), "off".into()]));
        let rendered = serde_json::to_value(&enum_schema).unwrap();
        assert_eq!(rendered["enum"], json!(["on", "off"]));

        let map_schema = to_openapi(&SchemaNode::MapOf(Box::new(SchemaNode::primitive(
            PrimitiveKind::Boolean,
        ))));
        let rendered = serde_json::to_value(&map_schema).unwrap();
        assert_eq!(rendered["additionalProperties"]["type"], json!("boolean"));
    }

    #[test]
    fn test_yaml_rendering() {
        let yaml = registry_with_pet().to_yaml().unwrap();
        assert!(yaml.contains("Pet:"));
        assert!(yaml.contains("#/components/schemas/Pet"));
    }
}
