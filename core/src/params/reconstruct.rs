//! # Reconstruction
//!
//! Entries → typed value. The target type is described first; every property
//! is then read back with the same style and explode rules projection used,
//! parsed against its schema and handed to the value deserializer.

use super::encoding::{decode, decode_bytes, encode_name};
use super::{root_properties, Entry, Location, ProjectionOptions, Resolved, Style};
use crate::config::EncodingConfig;
use crate::error::{ShapeError, ShapeResult};
use crate::schema::{Format, PrimitiveKind, Property, SchemaNode, SchemaRegistry};
use crate::traverse::{describe, from_value};
use crate::value::{Mapping, Value};
use serde::de::DeserializeOwned;
use std::collections::HashSet;

/// Rebuilds a `T` from entries produced for `location`.
///
/// Required fields without entries fail with `DecodingMismatch`; optional
/// ones are left absent. A required sequence sent exploded with no items
/// comes back empty.
pub fn reconstruct<T>(
    entries: &[Entry],
    location: Location,
    options: &ProjectionOptions,
    config: &EncodingConfig,
) -> ShapeResult<T>
where
    T: DeserializeOwned,
{
    let mut registry = SchemaRegistry::new();
    let root = describe::<T>(config, &mut registry)?;
    let properties = root_properties(&registry, &root)?;

    let mut fields = Vec::with_capacity(properties.len());
    for prop in &properties {
        let resolved = options.resolve(location, &prop.name, !prop.required);
        let shape = shape_of(&registry, &prop.name, &prop.schema)?;
        fields.push((prop, resolved, shape));
    }

    // Entry names owned by a field: its own name, or its members when the
    // object is spread as form-exploded entries.
    let names: HashSet<&str> = properties.iter().map(|p| p.name.as_str()).collect();
    let mut claimed: HashSet<String> = names.iter().map(|n| n.to_string()).collect();
    let mut spread: HashSet<String> = HashSet::new();
    let mut open_maps = 0;
    for (prop, resolved, shape) in &fields {
        let Shape::Object(members) = shape else {
            continue;
        };
        if !(resolved.style == Style::Form && resolved.explode) {
            continue;
        }
        match members {
            Members::Known(known) => {
                for member in known.iter() {
                    let clashes = member.name != prop.name && names.contains(member.name.as_str());
                    if clashes || !spread.insert(member.name.clone()) {
                        return Err(ShapeError::DecodingMismatch(format!(
                            "exploded member '{}' of parameter '{}' clashes with another parameter",
                            member.name, prop.name
                        )));
                    }
                    claimed.insert(encode_name(&member.name));
                }
            }
            Members::Open(_) => {
                open_maps += 1;
                if open_maps > 1 {
                    return Err(ShapeError::DecodingMismatch(format!(
                        "parameter '{}' is a second exploded map; entries cannot be attributed",
                        prop.name
                    )));
                }
            }
        }
    }

    let reader = Reader {
        entries,
        registry: &registry,
        claimed,
    };
    let mut mapping = Mapping::new();
    for (prop, resolved, shape) in &fields {
        match reader.read(&prop.name, shape, *resolved)? {
            Some(value) => {
                mapping.insert(prop.name.clone(), value);
            }
            None if resolved.required => {
                return Err(ShapeError::DecodingMismatch(format!(
                    "{} parameter '{}' is required but absent",
                    location, prop.name
                )))
            }
            None => {}
        }
    }

    tracing::debug!(location = %location, fields = mapping.len(), "parameters reconstructed");
    from_value(Value::Mapping(mapping), config)
}

enum Members<'r> {
    Known(&'r [Property]),
    Open(&'r SchemaNode),
}

enum Shape<'r> {
    Scalar(&'r SchemaNode),
    Sequence(&'r SchemaNode),
    Object(Members<'r>),
}

fn resolve<'r>(registry: &'r SchemaRegistry, node: &'r SchemaNode) -> ShapeResult<&'r SchemaNode> {
    match node {
        SchemaNode::Reference(name) => registry.resolve(name).ok_or_else(|| {
            ShapeError::UnsupportedShape(format!("schema '{}' was never completed", name))
        }),
        other => Ok(other),
    }
}

fn is_scalar(registry: &SchemaRegistry, node: &SchemaNode) -> bool {
    matches!(
        resolve(registry, node),
        Ok(SchemaNode::Primitive { .. } | SchemaNode::EnumOf(_) | SchemaNode::Any)
    )
}

fn shape_of<'r>(
    registry: &'r SchemaRegistry,
    name: &str,
    node: &'r SchemaNode,
) -> ShapeResult<Shape<'r>> {
    let nested = || {
        ShapeError::UnsupportedShape(format!(
            "parameter '{}' nests composites below the first flattened level",
            name
        ))
    };
    match resolve(registry, node)? {
        scalar @ (SchemaNode::Primitive { .. } | SchemaNode::EnumOf(_) | SchemaNode::Any) => {
            Ok(Shape::Scalar(scalar))
        }
        SchemaNode::ArrayOf(item) if is_scalar(registry, item) => Ok(Shape::Sequence(item)),
        SchemaNode::MapOf(value) if is_scalar(registry, value) => {
            Ok(Shape::Object(Members::Open(value)))
        }
        SchemaNode::ObjectOf(members) if members.iter().all(|m| is_scalar(registry, &m.schema)) => {
            Ok(Shape::Object(Members::Known(members)))
        }
        _ => Err(nested()),
    }
}

fn mismatch(name: &str, detail: impl std::fmt::Display) -> ShapeError {
    ShapeError::DecodingMismatch(format!("parameter '{}': {}", name, detail))
}

fn split(raw: &str, delimiter: char) -> Vec<&str> {
    if raw.is_empty() {
        Vec::new()
    } else {
        raw.split(delimiter).collect()
    }
}

/// `name` or `name=value` → value.
fn strip_assignment<'v>(name: &str, part: &'v str) -> ShapeResult<&'v str> {
    match part.strip_prefix(name) {
        Some("") => Ok(""),
        Some(rest) => rest
            .strip_prefix('=')
            .ok_or_else(|| mismatch(name, format!("'{}' is not a matrix assignment", part))),
        None => Err(mismatch(name, format!("'{}' does not name the parameter", part))),
    }
}

fn strip_matrix<'v>(name: &str, raw: &'v str) -> ShapeResult<&'v str> {
    let rest = raw
        .strip_prefix(';')
        .ok_or_else(|| mismatch(name, format!("'{}' lacks the ';' prefix", raw)))?;
    strip_assignment(name, rest)
}

fn strip_label<'v>(name: &str, raw: &'v str) -> ShapeResult<&'v str> {
    raw.strip_prefix('.')
        .ok_or_else(|| mismatch(name, format!("'{}' lacks the '.' prefix", raw)))
}

/// `k,v,k,v` items → pairs.
fn pairs_of<'v>(name: &str, items: Vec<&'v str>) -> ShapeResult<Vec<(String, &'v str)>> {
    if items.len() % 2 != 0 {
        return Err(mismatch(name, "object members do not pair up"));
    }
    items
        .chunks(2)
        .map(|pair| Ok((decode(pair[0])?, pair[1])))
        .collect()
}

/// `k=v` items → pairs.
fn assignments<'v>(name: &str, items: Vec<&'v str>) -> ShapeResult<Vec<(String, &'v str)>> {
    items
        .into_iter()
        .map(|item| match item.split_once('=') {
            Some((key, value)) => Ok((decode(key)?, value)),
            None => Err(mismatch(name, format!("'{}' is not a key=value member", item))),
        })
        .collect()
}

struct Reader<'a> {
    entries: &'a [Entry],
    registry: &'a SchemaRegistry,
    claimed: HashSet<String>,
}

impl<'a> Reader<'a> {
    fn first(&self, name: &str) -> Option<&'a str> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.value.as_str())
    }

    fn all(&self, name: &str) -> Vec<&'a str> {
        self.entries
            .iter()
            .filter(|e| e.name == name)
            .map(|e| e.value.as_str())
            .collect()
    }

    fn read(&self, name: &str, shape: &Shape<'_>, resolved: Resolved) -> ShapeResult<Option<Value>> {
        match shape {
            Shape::Scalar(node) => self.read_scalar(name, node, resolved.style),
            Shape::Sequence(item) => self.read_sequence(name, item, resolved),
            Shape::Object(members) => self.read_object(name, members, resolved),
        }
    }

    fn read_scalar(&self, name: &str, node: &SchemaNode, style: Style) -> ShapeResult<Option<Value>> {
        let Some(raw) = self.first(name) else {
            return Ok(None);
        };
        let text = match style {
            Style::Form | Style::Simple => raw,
            Style::Matrix => strip_matrix(name, raw)?,
            Style::Label => strip_label(name, raw)?,
            _ => {
                return Err(ShapeError::UnsupportedShape(format!(
                    "parameter '{}' uses style '{}' which cannot carry a scalar",
                    name, style
                )))
            }
        };
        self.scalar(name, node, text).map(Some)
    }

    fn read_sequence(&self, name: &str, item: &SchemaNode, resolved: Resolved) -> ShapeResult<Option<Value>> {
        let Resolved {
            style,
            explode,
            required,
            ..
        } = resolved;

        let items = match style {
            Style::Form | Style::SpaceDelimited | Style::PipeDelimited if explode => {
                let raws = self.all(name);
                if raws.is_empty() {
                    return Ok(required.then(|| Value::Sequence(Vec::new())));
                }
                raws
            }
            Style::DeepObject => {
                return Err(ShapeError::UnsupportedShape(format!(
                    "parameter '{}' uses style 'deepObject' which cannot carry a sequence",
                    name
                )))
            }
            _ => {
                let Some(raw) = self.first(name) else {
                    return Ok(None);
                };
                match style {
                    Style::Matrix if explode => raw
                        .split(';')
                        .filter(|part| !part.is_empty())
                        .map(|part| strip_assignment(name, part))
                        .collect::<ShapeResult<Vec<_>>>()?,
                    Style::Matrix => split(strip_matrix(name, raw)?, ','),
                    Style::Label => {
                        split(strip_label(name, raw)?, if explode { '.' } else { ',' })
                    }
                    _ => split(raw, style.delimiter()),
                }
            }
        };

        items
            .into_iter()
            .map(|raw| self.scalar(name, item, raw))
            .collect::<ShapeResult<Vec<_>>>()
            .map(|values| Some(Value::Sequence(values)))
    }

    fn read_object(&self, name: &str, members: &Members<'_>, resolved: Resolved) -> ShapeResult<Option<Value>> {
        let Resolved { style, explode, .. } = resolved;

        let pairs: Vec<(String, &str)> = match (style, explode) {
            (Style::Form, true) => match members {
                Members::Known(known) => known
                    .iter()
                    .filter_map(|m| {
                        self.first(&encode_name(&m.name))
                            .map(|raw| (m.name.clone(), raw))
                    })
                    .collect(),
                Members::Open(_) => self
                    .entries
                    .iter()
                    .filter(|e| !self.claimed.contains(&e.name))
                    .map(|e| Ok((decode(&e.name)?, e.value.as_str())))
                    .collect::<ShapeResult<_>>()?,
            },
            (Style::DeepObject, _) => {
                let prefix = format!("{}[", name);
                self.entries
                    .iter()
                    .filter_map(|e| {
                        let key = e.name.strip_prefix(&prefix)?.strip_suffix(']')?;
                        Some((key, e.value.as_str()))
                    })
                    .map(|(key, raw)| Ok((decode(key)?, raw)))
                    .collect::<ShapeResult<_>>()?
            }
            (Style::SpaceDelimited | Style::PipeDelimited, _) => {
                return Err(ShapeError::UnsupportedShape(format!(
                    "parameter '{}' uses style '{}' which cannot carry an object",
                    name, style
                )))
            }
            _ => {
                let Some(raw) = self.first(name) else {
                    return Ok(None);
                };
                match (style, explode) {
                    (Style::Simple, true) => assignments(name, split(raw, ','))?,
                    (Style::Matrix, true) => {
                        assignments(name, raw.split(';').filter(|p| !p.is_empty()).collect())?
                    }
                    (Style::Matrix, false) => pairs_of(name, split(strip_matrix(name, raw)?, ','))?,
                    (Style::Label, true) => assignments(name, split(strip_label(name, raw)?, '.'))?,
                    (Style::Label, false) => pairs_of(name, split(strip_label(name, raw)?, ','))?,
                    _ => pairs_of(name, split(raw, ','))?,
                }
            }
        };

        let spread = style == Style::DeepObject || (style == Style::Form && explode);
        if spread && pairs.is_empty() {
            return Ok(None);
        }

        let mut mapping = Mapping::new();
        for (key, raw) in pairs {
            let schema = match members {
                Members::Known(known) => match known.iter().find(|m| m.name == key) {
                    Some(member) => &member.schema,
                    None => return Err(mismatch(name, format!("unknown member '{}'", key))),
                },
                Members::Open(value) => *value,
            };
            let value = self.scalar(name, schema, raw)?;
            mapping.insert(key, value);
        }
        Ok(Some(Value::Mapping(mapping)))
    }

    /// Decodes and parses one item against a scalar schema.
    fn scalar(&self, name: &str, node: &SchemaNode, raw: &str) -> ShapeResult<Value> {
        let text = decode(raw)?;
        match resolve(self.registry, node)? {
            SchemaNode::Primitive {
                kind: PrimitiveKind::String,
                format,
            } => {
                if *format == Some(Format::Byte) {
                    Ok(Value::Bytes(decode_bytes(&text)?))
                } else {
                    Ok(Value::String(text))
                }
            }
            SchemaNode::Primitive { .. } if text.is_empty() => Ok(Value::Null),
            SchemaNode::Primitive { kind, .. } => match kind {
                PrimitiveKind::Boolean => match text.as_str() {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    _ => Err(mismatch(name, format!("'{}' is not a boolean", text))),
                },
                PrimitiveKind::Integer => text
                    .parse::<i64>()
                    .map(Value::Int)
                    .map_err(|e| mismatch(name, format!("'{}' is not an integer: {}", text, e))),
                PrimitiveKind::Number => text
                    .parse::<f64>()
                    .map(Value::Float)
                    .map_err(|e| mismatch(name, format!("'{}' is not a number: {}", text, e))),
                PrimitiveKind::Null | PrimitiveKind::String => {
                    Err(mismatch(name, format!("'{}' should be empty", text)))
                }
            },
            SchemaNode::EnumOf(literals) => {
                if literals.contains(&text) {
                    Ok(Value::String(text))
                } else {
                    Err(mismatch(
                        name,
                        format!("'{}' is not one of [{}]", text, literals.join(", ")),
                    ))
                }
            }
            SchemaNode::Any => Ok(Value::String(text)),
            _ => Err(ShapeError::UnsupportedShape(format!(
                "parameter '{}' expects a scalar item",
                name
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{project_value, ParameterOptions};
    use serde::{Deserialize, Serialize};
    use std::collections::BTreeMap;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    #[serde(rename_all = "lowercase")]
    enum Order {
        Asc,
        Desc,
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Rgb {
        r: u8,
        g: u8,
        b: u8,
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Search {
        q: String,
        order: Order,
        color: Rgb,
        tags: Vec<String>,
        limit: Option<u32>,
        ratio: f64,
        strict: bool,
    }

    fn search() -> Search {
        Search {
            q: "a,b & c".into(),
            order: Order::Desc,
            color: Rgb { r: 1, g: 2, b: 3 },
            tags: vec!["x".into(), "y z".into()],
            limit: Some(20),
            ratio: 0.5,
            strict: true,
        }
    }

    fn round_trip(location: Location, options: &ProjectionOptions) -> Search {
        let config = EncodingConfig::DEFAULT;
        let entries = project_value(&search(), location, options, &config).unwrap();
        reconstruct(&entries, location, options, &config).unwrap()
    }

    #[test]
    fn test_round_trip_every_style() {
        let layouts = vec![
            (Style::Form, true),
            (Style::Form, false),
            (Style::Simple, false),
            (Style::Simple, true),
            (Style::Matrix, false),
            (Style::Matrix, true),
            (Style::Label, false),
            (Style::Label, true),
        ];
        for (style, explode) in layouts {
            let options = ["q", "order", "color", "tags", "limit", "ratio", "strict"]
                .iter()
                .fold(ProjectionOptions::new(), |acc, name| {
                    acc.with(*name, ParameterOptions::new().style(style).explode(explode))
                });
            assert_eq!(round_trip(Location::Query, &options), search(), "{} {}", style, explode);
        }
    }

    #[test]
    fn test_round_trip_deep_object_and_delimited() {
        let options = ProjectionOptions::new()
            .with("color", ParameterOptions::new().style(Style::DeepObject))
            .with("tags", ParameterOptions::new().style(Style::PipeDelimited));
        assert_eq!(round_trip(Location::Query, &options), search());

        let options = ProjectionOptions::new()
            .with("tags", ParameterOptions::new().style(Style::SpaceDelimited));
        assert_eq!(round_trip(Location::Query, &options), search());
    }

    #[test]
    fn test_missing_optional_and_required() {
        let entries = vec![
            Entry::new("q", "x"),
            Entry::new("order", "asc"),
            Entry::new("r", "1"),
            Entry::new("g", "2"),
            Entry::new("b", "3"),
            Entry::new("ratio", "1"),
            Entry::new("strict", "false"),
        ];
        let options = ProjectionOptions::new();
        let parsed: Search =
            reconstruct(&entries, Location::Query, &options, &EncodingConfig::DEFAULT).unwrap();
        assert_eq!(parsed.limit, None);
        assert_eq!(parsed.tags, Vec::<String>::new());
        assert_eq!(parsed.order, Order::Asc);

        let err = reconstruct::<Search>(&entries[1..], Location::Query, &options, &EncodingConfig::DEFAULT)
            .unwrap_err();
        assert!(matches!(err, ShapeError::DecodingMismatch(ref m) if m.contains("'q'")));
    }

    #[test]
    fn test_type_mismatches() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Page {
            page: u32,
            order: Option<Order>,
        }
        let options = ProjectionOptions::new();
        let config = EncodingConfig::DEFAULT;

        let err = reconstruct::<Page>(&[Entry::new("page", "two")], Location::Query, &options, &config)
            .unwrap_err();
        assert!(matches!(err, ShapeError::DecodingMismatch(_)));

        let entries = vec![Entry::new("page", "2"), Entry::new("order", "sideways")];
        let err = reconstruct::<Page>(&entries, Location::Query, &options, &config).unwrap_err();
        assert!(matches!(err, ShapeError::DecodingMismatch(ref m) if m.contains("sideways")));

        let err = reconstruct::<Page>(&[Entry::new("page", "%FF")], Location::Query, &options, &config)
            .unwrap_err();
        assert!(matches!(err, ShapeError::DecodingMismatch(_)));
    }

    #[test]
    fn test_open_map_collects_unclaimed_entries() {
        #[derive(Debug, Serialize, Deserialize, PartialEq)]
        struct Labels {
            id: i64,
            extra: BTreeMap<String, String>,
        }
        let value = Labels {
            id: 7,
            extra: BTreeMap::from([("env".to_string(), "prod".to_string())]),
        };
        let config = EncodingConfig::DEFAULT;
        let options = ProjectionOptions::new();
        let entries = project_value(&value, Location::Query, &options, &config).unwrap();
        assert_eq!(entries, vec![Entry::new("id", "7"), Entry::new("env", "prod")]);
        let back: Labels = reconstruct(&entries, Location::Query, &options, &config).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_nested_composite_fields_are_rejected() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Grid {
            cells: Vec<Vec<u8>>,
        }
        let err = reconstruct::<Grid>(&[], Location::Query, &ProjectionOptions::new(), &EncodingConfig::DEFAULT)
            .unwrap_err();
        assert!(matches!(err, ShapeError::UnsupportedShape(_)));
    }

    #[test]
    fn test_clashing_exploded_members_are_rejected() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Owner {
            id: u32,
        }

        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Lookup {
            id: u32,
            owner: Owner,
        }

        let entries = vec![Entry::new("id", "1"), Entry::new("id", "2")];
        let err = reconstruct::<Lookup>(
            &entries,
            Location::Query,
            &ProjectionOptions::new(),
            &EncodingConfig::DEFAULT,
        )
        .unwrap_err();
        assert!(matches!(err, ShapeError::DecodingMismatch(ref m) if m.contains("clashes")));
    }

    #[test]
    fn test_label_items_with_dots_round_trip() {
        #[derive(Debug, Serialize, Deserialize, PartialEq)]
        struct Versions {
            tags: Vec<String>,
            pin: String,
        }
        let value = Versions {
            tags: vec!["v1.2".into(), "x".into()],
            pin: "1.0.3".into(),
        };
        let config = EncodingConfig::DEFAULT;
        for explode in [true, false] {
            let options = ProjectionOptions::new()
                .with("tags", ParameterOptions::new().style(Style::Label).explode(explode))
                .with("pin", ParameterOptions::new().style(Style::Label));
            let entries = project_value(&value, Location::Path, &options, &config).unwrap();
            let back: Versions = reconstruct(&entries, Location::Path, &options, &config).unwrap();
            assert_eq!(back, value);
        }
    }

    #[test]
    fn test_reserved_delimiters_round_trip() {
        #[derive(Debug, Serialize, Deserialize, PartialEq)]
        struct Links {
            urls: Vec<String>,
        }
        let value = Links {
            urls: vec!["http://a/?x=1,2".into(), "b".into()],
        };
        let options = ProjectionOptions::new().with(
            "urls",
            ParameterOptions::new().explode(false).allow_reserved(true),
        );
        let config = EncodingConfig::DEFAULT;
        let entries = project_value(&value, Location::Query, &options, &config).unwrap();
        assert_eq!(entries, vec![Entry::new("urls", "http://a/?x%3D1%2C2,b")]);
        let back: Links = reconstruct(&entries, Location::Query, &options, &config).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_encoded_member_names_round_trip() {
        #[derive(Debug, Serialize, Deserialize, PartialEq)]
        struct Filters {
            extra: BTreeMap<String, String>,
        }
        let value = Filters {
            extra: BTreeMap::from([
                ("a&b".to_string(), "1".to_string()),
                ("c[d]".to_string(), "2".to_string()),
            ]),
        };
        let config = EncodingConfig::DEFAULT;
        let layouts = vec![
            ProjectionOptions::new(),
            ProjectionOptions::new().with("extra", ParameterOptions::new().style(Style::DeepObject)),
        ];
        for options in layouts {
            let entries = project_value(&value, Location::Query, &options, &config).unwrap();
            let back: Filters = reconstruct(&entries, Location::Query, &options, &config).unwrap();
            assert_eq!(back, value);
        }
    }
}
