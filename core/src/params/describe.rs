//! # Parameter Description
//!
//! One utoipa [`Parameter`] per field of a record type, carrying the field's
//! schema and the style settings projection would use for it. Records can be
//! described from their type alone or from a sample value.

use super::{root_properties, Location, ProjectionOptions};
use crate::config::EncodingConfig;
use crate::error::ShapeResult;
use crate::schema::{encode_schema, to_openapi, Property, SchemaRegistry};
use crate::traverse::describe;
use serde::de::DeserializeOwned;
use serde::Serialize;
use utoipa::openapi::path::{Parameter, ParameterBuilder};
use utoipa::openapi::{Deprecated, Required};

/// Describes every field of `T` as a parameter at `location`.
///
/// Composite field types are registered in `registry` and referenced from the
/// parameter schemas, so the registry should be published next to them.
pub fn describe_parameters<T>(
    location: Location,
    options: &ProjectionOptions,
    config: &EncodingConfig,
    registry: &mut SchemaRegistry,
) -> ShapeResult<Vec<Parameter>>
where
    T: DeserializeOwned,
{
    let root = describe::<T>(config, registry)?;
    let properties = root_properties(registry, &root)?;
    Ok(parameters(&properties, location, options))
}

/// Describes every field of the record `value` as a parameter at `location`.
///
/// Schemas follow the value: optional fields that are absent keep their
/// declared type when it is known and are never required.
pub fn describe_value_parameters<T>(
    value: &T,
    location: Location,
    options: &ProjectionOptions,
    config: &EncodingConfig,
    registry: &mut SchemaRegistry,
) -> ShapeResult<Vec<Parameter>>
where
    T: Serialize + ?Sized,
{
    let root = encode_schema(value, config, registry)?;
    let properties = root_properties(registry, &root)?;
    Ok(parameters(&properties, location, options))
}

fn parameters(properties: &[Property], location: Location, options: &ProjectionOptions) -> Vec<Parameter> {
    let parameters = properties
        .iter()
        .map(|prop| {
            let resolved = options.resolve(location, &prop.name, !prop.required);
            let extra = options.get(&prop.name).cloned().unwrap_or_default();
            let query = location == Location::Query;
            ParameterBuilder::new()
                .name(prop.name.clone())
                .parameter_in(location.into())
                .required(if resolved.required {
                    Required::True
                } else {
                    Required::False
                })
                .description(extra.description)
                .deprecated(extra.deprecated.then_some(Deprecated::True))
                .schema(Some(to_openapi(&prop.schema)))
                .style(Some(resolved.style.into()))
                .explode(Some(resolved.explode))
                .allow_reserved(query.then_some(resolved.allow_reserved))
                .allow_empty_value((query && extra.allow_empty_value).then_some(true))
                .build()
        })
        .collect::<Vec<_>>();

    tracing::debug!(location = %location, count = parameters.len(), "parameters described");
    parameters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ParameterOptions, Style};
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Deserialize)]
    #[allow(dead_code)]
    struct Rgb {
        r: u8,
        g: u8,
        b: u8,
    }

    #[derive(Deserialize)]
    #[allow(dead_code)]
    struct Query {
        color: Rgb,
        tags: Vec<String>,
        limit: Option<u32>,
    }

    #[test]
    fn test_describe_query_parameters() {
        let mut registry = SchemaRegistry::new();
        let options = ProjectionOptions::new()
            .with("color", ParameterOptions::new().style(Style::DeepObject))
            .with("tags", ParameterOptions::new().allow_reserved(true));
        let parameters = describe_parameters::<Query>(
            Location::Query,
            &options,
            &EncodingConfig::DEFAULT,
            &mut registry,
        )
        .unwrap();

        let rendered = serde_json::to_value(&parameters).unwrap();
        assert_eq!(rendered[0]["name"], json!("color"));
        assert_eq!(rendered[0]["in"], json!("query"));
        assert_eq!(rendered[0]["required"], json!(true));
        assert_eq!(rendered[0]["style"], json!("deepObject"));
        assert_eq!(rendered[0]["explode"], json!(true));
        assert_eq!(rendered[0]["schema"]["$ref"], json!("#/components/schemas/Rgb"));

        assert_eq!(rendered[1]["schema"]["type"], json!("array"));
        assert_eq!(rendered[1]["allowReserved"], json!(true));

        assert_eq!(rendered[2]["name"], json!("limit"));
        assert_eq!(rendered[2]["required"], json!(false));
        assert_eq!(rendered[2]["style"], json!("form"));

        assert!(registry.contains("Rgb"));
        assert!(registry.contains("Query"));
    }

    #[test]
    fn test_path_parameters_are_required() {
        #[derive(Deserialize)]
        #[allow(dead_code)]
        struct Item {
            id: Option<i64>,
        }
        let mut registry = SchemaRegistry::new();
        let parameters = describe_parameters::<Item>(
            Location::Path,
            &ProjectionOptions::new(),
            &EncodingConfig::DEFAULT,
            &mut registry,
        )
        .unwrap();
        let rendered = serde_json::to_value(&parameters).unwrap();
        assert_eq!(rendered[0]["in"], json!("path"));
        assert_eq!(rendered[0]["required"], json!(true));
        assert_eq!(rendered[0]["style"], json!("simple"));
        assert_eq!(rendered[0]["explode"], json!(false));
        assert!(rendered[0].get("allowReserved").is_none());
    }

    #[test]
    fn test_description_and_flags() {
        let mut registry = SchemaRegistry::new();
        let options = ProjectionOptions::new()
            .with(
                "tags",
                ParameterOptions::new()
                    .description("Tags to match")
                    .deprecated(true)
                    .allow_empty_value(true),
            )
            .with("limit", ParameterOptions::new().description("Page size"));
        let parameters = describe_parameters::<Query>(
            Location::Query,
            &options,
            &EncodingConfig::DEFAULT,
            &mut registry,
        )
        .unwrap();

        let rendered = serde_json::to_value(&parameters).unwrap();
        assert!(rendered[0].get("description").is_none());
        assert!(rendered[0].get("deprecated").is_none());
        assert_eq!(rendered[1]["description"], json!("Tags to match"));
        assert_eq!(rendered[1]["deprecated"], json!(true));
        assert_eq!(rendered[1]["allowEmptyValue"], json!(true));
        assert_eq!(rendered[2]["description"], json!("Page size"));
        assert!(rendered[2].get("allowEmptyValue").is_none());
    }

    #[test]
    fn test_empty_values_are_a_query_setting() {
        #[derive(Deserialize)]
        #[allow(dead_code)]
        struct Headers {
            trace: String,
        }
        let mut registry = SchemaRegistry::new();
        let options = ProjectionOptions::new().with("trace", ParameterOptions::new().allow_empty_value(true));
        let parameters = describe_parameters::<Headers>(
            Location::Header,
            &options,
            &EncodingConfig::DEFAULT,
            &mut registry,
        )
        .unwrap();
        let rendered = serde_json::to_value(&parameters).unwrap();
        assert_eq!(rendered[0]["in"], json!("header"));
        assert!(rendered[0].get("allowEmptyValue").is_none());
    }

    #[test]
    fn test_describe_from_value() {
        #[derive(Serialize)]
        struct Rgb {
            r: u8,
            g: u8,
            b: u8,
        }

        #[derive(Serialize)]
        struct Filter {
            color: Rgb,
            tags: Vec<String>,
            limit: Option<u32>,
        }

        let value = Filter {
            color: Rgb { r: 1, g: 2, b: 3 },
            tags: vec!["a".into()],
            limit: None,
        };
        let mut registry = SchemaRegistry::new();
        let options = ProjectionOptions::new().with("color", ParameterOptions::new().style(Style::DeepObject));
        let parameters = describe_value_parameters(
            &value,
            Location::Query,
            &options,
            &EncodingConfig::DEFAULT,
            &mut registry,
        )
        .unwrap();

        let rendered = serde_json::to_value(&parameters).unwrap();
        assert_eq!(rendered.as_array().map(Vec::len), Some(3));
        assert_eq!(rendered[0]["name"], json!("color"));
        assert_eq!(rendered[0]["style"], json!("deepObject"));
        assert_eq!(rendered[0]["schema"]["$ref"], json!("#/components/schemas/Rgb"));
        assert_eq!(rendered[1]["schema"]["type"], json!("array"));
        assert_eq!(rendered[2]["name"], json!("limit"));
        assert_eq!(rendered[2]["required"], json!(false));
        assert_eq!(rendered[2]["schema"]["type"], json!("integer"));
        assert!(registry.contains("Filter"));
    }

    #[test]
    fn test_describe_from_scalar_value_is_rejected() {
        let mut registry = SchemaRegistry::new();
        let err = describe_value_parameters(
            &42u32,
            Location::Query,
            &ProjectionOptions::new(),
            &EncodingConfig::DEFAULT,
            &mut registry,
        )
        .unwrap_err();
        assert!(matches!(err, crate::ShapeError::UnsupportedShape(_)));
    }
}
