#![deny(missing_docs)]

//! # Parameter Projection
//!
//! Flattens a captured record into ordered `(name, value)` entries for one
//! transport location, and reconstructs typed values from such entries.
//!
//! - **project**: value → entries, per style and explode rules.
//! - **reconstruct**: entries → value, driven by the type's described schema.
//! - **describe**: utoipa `Parameter` objects for every field of a type or of
//!   a sample value.
//! - **encoding**: scalar rendering and percent-encoding helpers.

pub mod describe;
pub mod encoding;
pub mod project;
pub mod reconstruct;

use crate::error::{ShapeError, ShapeResult};
use crate::schema::{Property, SchemaNode, SchemaRegistry};
use indexmap::IndexMap;
use std::fmt;
use utoipa::openapi::path::{ParameterIn, ParameterStyle};

pub use describe::{describe_parameters, describe_value_parameters};
pub use project::{project, project_value};
pub use reconstruct::reconstruct;

/// Where a parameter travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    /// Query string.
    Query,
    /// Path template segment.
    Path,
    /// Request header.
    Header,
    /// Cookie jar.
    Cookie,
}

impl Location {
    /// Style used when a field does not override it.
    pub fn default_style(&self) -> Style {
        match self {
            Location::Query | Location::Cookie => Style::Form,
            Location::Path | Location::Header => Style::Simple,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Location::Query => "query",
            Location::Path => "path",
            Location::Header => "header",
            Location::Cookie => "cookie",
        })
    }
}

impl From<Location> for ParameterIn {
    fn from(location: Location) -> Self {
        match location {
            Location::Query => ParameterIn::Query,
            Location::Path => ParameterIn::Path,
            Location::Header => ParameterIn::Header,
            Location::Cookie => ParameterIn::Cookie,
        }
    }
}

/// Parameter serialization style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Style {
    /// `matrix` (`;name=value`)
    Matrix,
    /// `label` (`.value`)
    Label,
    /// `form`
    Form,
    /// `simple`
    Simple,
    /// `spaceDelimited`
    SpaceDelimited,
    /// `pipeDelimited`
    PipeDelimited,
    /// `deepObject`
    DeepObject,
}

impl Style {
    /// Explode flag used when a field does not override it.
    pub fn default_explode(&self) -> bool {
        matches!(self, Style::Form)
    }

    /// Name as written in a document.
    pub fn as_str(&self) -> &'static str {
        match self {
            Style::Matrix => "matrix",
            Style::Label => "label",
            Style::Form => "form",
            Style::Simple => "simple",
            Style::SpaceDelimited => "spaceDelimited",
            Style::PipeDelimited => "pipeDelimited",
            Style::DeepObject => "deepObject",
        }
    }

    /// Delimiter joining sequence items when not exploded.
    pub(crate) fn delimiter(&self) -> char {
        match self {
            Style::SpaceDelimited => ' ',
            Style::PipeDelimited => '|',
            _ => ',',
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Style> for ParameterStyle {
    fn from(style: Style) -> Self {
        match style {
            Style::Matrix => ParameterStyle::Matrix,
            Style::Label => ParameterStyle::Label,
            Style::Form => ParameterStyle::Form,
            Style::Simple => ParameterStyle::Simple,
            Style::SpaceDelimited => ParameterStyle::SpaceDelimited,
            Style::PipeDelimited => ParameterStyle::PipeDelimited,
            Style::DeepObject => ParameterStyle::DeepObject,
        }
    }
}

/// One serialized parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Parameter (or exploded member) name.
    pub name: String,
    /// Style-serialized, percent-encoded value.
    pub value: String,
}

impl Entry {
    /// Builds an entry.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Entry {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Per-field overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterOptions {
    /// Style override.
    pub style: Option<Style>,
    /// Explode override.
    pub explode: Option<bool>,
    /// Keep RFC 3986 reserved characters unencoded (query only).
    pub allow_reserved: bool,
    /// Required override. Path parameters are always required.
    pub required: Option<bool>,
    /// Human-readable description for the described parameter.
    pub description: Option<String>,
    /// Marks the described parameter as deprecated.
    pub deprecated: bool,
    /// Allows an empty value for the described parameter (query only).
    pub allow_empty_value: bool,
}

impl ParameterOptions {
    /// No overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the style.
    pub fn style(mut self, style: Style) -> Self {
        self.style = Some(style);
        self
    }

    /// Sets the explode flag.
    pub fn explode(mut self, explode: bool) -> Self {
        self.explode = Some(explode);
        self
    }

    /// Keeps reserved characters.
    pub fn allow_reserved(mut self, allow_reserved: bool) -> Self {
        self.allow_reserved = allow_reserved;
        self
    }

    /// Forces requiredness.
    pub fn required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Marks the parameter deprecated.
    pub fn deprecated(mut self, deprecated: bool) -> Self {
        self.deprecated = deprecated;
        self
    }

    /// Allows empty values.
    pub fn allow_empty_value(mut self, allow_empty_value: bool) -> Self {
        self.allow_empty_value = allow_empty_value;
        self
    }
}

/// Effective settings for one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    /// Style in effect.
    pub style: Style,
    /// Explode flag in effect (always `true` for deepObject).
    pub explode: bool,
    /// Reserved characters pass unencoded.
    pub allow_reserved: bool,
    /// Absence is an error.
    pub required: bool,
}

/// Overrides keyed by wire name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectionOptions {
    fields: IndexMap<String, ParameterOptions>,
}

impl ProjectionOptions {
    /// No overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds overrides for the field with wire name `name`.
    pub fn with(mut self, name: impl Into<String>, options: ParameterOptions) -> Self {
        self.fields.insert(name.into(), options);
        self
    }

    /// Overrides for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&ParameterOptions> {
        self.fields.get(name)
    }

    /// Effective settings for `name` at `location`.
    ///
    /// `optional` is whether the field's declared type is optional.
    pub fn resolve(&self, location: Location, name: &str, optional: bool) -> Resolved {
        let overrides = self.fields.get(name).cloned().unwrap_or_default();
        let style = overrides.style.unwrap_or_else(|| location.default_style());
        let explode = match style {
            Style::DeepObject => true,
            _ => overrides.explode.unwrap_or_else(|| style.default_explode()),
        };
        let required = match location {
            Location::Path => true,
            _ => overrides.required.unwrap_or(!optional),
        };
        Resolved {
            style,
            explode,
            allow_reserved: overrides.allow_reserved && location == Location::Query,
            required,
        }
    }
}

/// Properties of the described root object.
pub(crate) fn root_properties(registry: &SchemaRegistry, root: &SchemaNode) -> ShapeResult<Vec<Property>> {
    let resolved = match root {
        SchemaNode::Reference(name) => registry.resolve(name),
        other => Some(other),
    };
    match resolved {
        Some(SchemaNode::ObjectOf(properties)) => Ok(properties.clone()),
        _ => Err(ShapeError::UnsupportedShape(
            "parameters are described from records only".to_string(),
        )),
    }
}
