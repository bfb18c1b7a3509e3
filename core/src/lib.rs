#![deny(missing_docs)]

//! # Shape Core
//!
//! Structural introspection for serde types: capture a value as a neutral
//! tree, derive named schemas from it, and project records into transport
//! parameters and back.

/// Shared error types.
pub mod error;

/// Key naming transforms.
pub mod naming;

/// Encoding configuration (key strategy, date format).
pub mod config;

/// Structural Value model.
pub mod value;

/// Type identity from compile-time type names.
pub mod identity;

/// Serde-driven traversal (capture, description, reverse).
pub mod traverse;

/// Schema model, registry and OpenAPI export.
pub mod schema;

/// Parameter projection and reconstruction.
pub mod params;

pub use config::{DateFormat, EncodingConfig};
pub use error::{ShapeError, ShapeResult};
pub use identity::TypeIdentity;
pub use naming::KeyEncodingStrategy;
pub use params::{
    describe_parameters, describe_value_parameters, project, project_value, reconstruct, Entry,
    Location, ParameterOptions, ProjectionOptions, Style,
};
pub use schema::{encode_schema, SchemaNode, SchemaRegistry};
pub use traverse::{describe, from_value, to_value, trace, Traced};
pub use value::Value;
