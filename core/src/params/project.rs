//! # Projection
//!
//! Record → entries. Each field is flattened exactly one level: it may hold a
//! scalar, a sequence of scalars or an object with scalar members. Entry
//! order follows field order; absent optional fields emit nothing.

use super::encoding::{encode, encode_name, render_scalar};
use super::{Entry, Location, ProjectionOptions, Resolved, Style};
use crate::config::EncodingConfig;
use crate::error::{ShapeError, ShapeResult};
use crate::traverse::{trace, Traced, TracedNode};
use serde::Serialize;
use std::collections::HashSet;

/// Captures `value` and projects it.
pub fn project_value<T>(
    value: &T,
    location: Location,
    options: &ProjectionOptions,
    config: &EncodingConfig,
) -> ShapeResult<Vec<Entry>>
where
    T: Serialize + ?Sized,
{
    let traced = trace(value, config)?;
    project(&traced, location, options)
}

/// Projects a captured record into entries for `location`.
///
/// Members of form-exploded objects become entries of their own, so their
/// names must not clash with other fields or with each other.
pub fn project(
    traced: &Traced,
    location: Location,
    options: &ProjectionOptions,
) -> ShapeResult<Vec<Entry>> {
    let fields = match &traced.node {
        TracedNode::Record(fields) | TracedNode::Map(fields) => fields,
        _ => {
            return Err(ShapeError::UnsupportedShape(format!(
                "parameters are projected from records, '{}' is not one",
                traced.identity
            )))
        }
    };

    let names: HashSet<&str> = fields.iter().map(|f| f.name.as_str()).collect();
    let mut spread: HashSet<String> = HashSet::new();
    let mut entries = Vec::new();
    for field in fields {
        let resolved = options.resolve(location, &field.name, field.optional);
        let Some(value) = &field.value else {
            if resolved.required {
                return Err(ShapeError::MissingRequiredParameter(format!(
                    "{} parameter '{}' is required but absent",
                    location, field.name
                )));
            }
            continue;
        };
        let content = Content::of(&field.name, value, resolved)?;
        if let (Content::Object(pairs), Style::Form, true) =
            (&content, resolved.style, resolved.explode)
        {
            for (key, _) in pairs {
                let clashes = key != &field.name && names.contains(key.as_str());
                if clashes || !spread.insert(key.clone()) {
                    return Err(ShapeError::UnsupportedShape(format!(
                        "exploded member '{}' of parameter '{}' clashes with another parameter",
                        key, field.name
                    )));
                }
            }
        }
        emit(&field.name, content, resolved, &mut entries)?;
    }

    tracing::debug!(location = %location, count = entries.len(), "parameters projected");
    Ok(entries)
}

/// One field's content, already rendered and percent-encoded.
enum Content {
    Scalar(String),
    Sequence(Vec<String>),
    /// Raw member names with encoded member values.
    Object(Vec<(String, String)>),
}

impl Content {
    fn of(name: &str, traced: &Traced, resolved: Resolved) -> ShapeResult<Self> {
        let Resolved {
            style,
            allow_reserved,
            ..
        } = resolved;
        let item = |t: &Traced| -> ShapeResult<String> {
            match &t.node {
                TracedNode::Scalar(v) => Ok(encode(&render_scalar(v)?, allow_reserved, style)),
                _ => Err(ShapeError::UnsupportedShape(format!(
                    "parameter '{}' nests '{}' below the first flattened level",
                    name, t.identity
                ))),
            }
        };

        match &traced.node {
            TracedNode::Scalar(_) => item(traced).map(Content::Scalar),
            TracedNode::Sequence(items) => items
                .iter()
                .map(item)
                .collect::<ShapeResult<Vec<_>>>()
                .map(Content::Sequence),
            TracedNode::Record(fields) | TracedNode::Map(fields) => fields
                .iter()
                .filter_map(|f| f.value.as_ref().map(|v| (f, v)))
                .map(|(f, v)| Ok((f.name.clone(), item(v)?)))
                .collect::<ShapeResult<Vec<_>>>()
                .map(Content::Object),
            TracedNode::Variant(variant, _) => Err(ShapeError::UnsupportedShape(format!(
                "parameter '{}' holds data variant '{}'",
                name, variant
            ))),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Content::Scalar(_) => "a scalar",
            Content::Sequence(_) => "a sequence",
            Content::Object(_) => "an object",
        }
    }
}

/// Whether a one-item sequence holding `""` reads back as itself.
///
/// Joined forms render it as an empty value, which is also how an empty
/// sequence renders.
fn keeps_empty_item(style: Style, explode: bool) -> bool {
    explode
        && matches!(
            style,
            Style::Form | Style::SpaceDelimited | Style::PipeDelimited | Style::Matrix
        )
}

fn flat(pairs: &[(String, String)], resolved: Resolved) -> String {
    pairs
        .iter()
        .flat_map(|(k, v)| [encode(k, resolved.allow_reserved, resolved.style), v.clone()])
        .collect::<Vec<_>>()
        .join(",")
}

fn assigned(pairs: &[(String, String)], resolved: Resolved) -> Vec<String> {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", encode(k, resolved.allow_reserved, resolved.style), v))
        .collect()
}

fn matrix(name: &str, value: &str) -> String {
    if value.is_empty() {
        format!(";{}", name)
    } else {
        format!(";{}={}", name, value)
    }
}

fn emit(name: &str, content: Content, resolved: Resolved, out: &mut Vec<Entry>) -> ShapeResult<()> {
    let Resolved { style, explode, .. } = resolved;

    match (style, content) {
        (style, Content::Sequence(items))
            if items.len() == 1 && items[0].is_empty() && !keeps_empty_item(style, explode) =>
        {
            return Err(ShapeError::UnsupportedShape(format!(
                "parameter '{}' holds a single empty item, which style '{}' cannot tell apart \
                 from an empty sequence",
                name, style
            )))
        }

        (Style::Form | Style::Simple, Content::Scalar(v)) => out.push(Entry::new(name, v)),

        (Style::Form | Style::SpaceDelimited | Style::PipeDelimited, Content::Sequence(items))
            if explode =>
        {
            out.extend(items.into_iter().map(|item| Entry::new(name, item)))
        }
        (
            Style::Form | Style::Simple | Style::SpaceDelimited | Style::PipeDelimited,
            Content::Sequence(items),
        ) => out.push(Entry::new(name, items.join(style.delimiter().to_string().as_str()))),

        (Style::Form, Content::Object(pairs)) if explode => {
            out.extend(pairs.into_iter().map(|(k, v)| Entry::new(encode_name(&k), v)))
        }
        (Style::Form, Content::Object(pairs)) => out.push(Entry::new(name, flat(&pairs, resolved))),
        (Style::Simple, Content::Object(pairs)) if explode => {
            out.push(Entry::new(name, assigned(&pairs, resolved).join(",")))
        }
        (Style::Simple, Content::Object(pairs)) => {
            out.push(Entry::new(name, flat(&pairs, resolved)))
        }

        (Style::DeepObject, Content::Object(pairs)) => out.extend(
            pairs
                .into_iter()
                .map(|(k, v)| Entry::new(format!("{}[{}]", name, encode_name(&k)), v)),
        ),

        (Style::Matrix, Content::Scalar(v)) => out.push(Entry::new(name, matrix(name, &v))),
        (Style::Matrix, Content::Sequence(items)) if explode => out.push(Entry::new(
            name,
            items.iter().map(|item| matrix(name, item)).collect::<String>(),
        )),
        (Style::Matrix, Content::Sequence(items)) => {
            out.push(Entry::new(name, matrix(name, &items.join(","))))
        }
        (Style::Matrix, Content::Object(pairs)) if explode => out.push(Entry::new(
            name,
            assigned(&pairs, resolved)
                .iter()
                .map(|pair| format!(";{}", pair))
                .collect::<String>(),
        )),
        (Style::Matrix, Content::Object(pairs)) => {
            out.push(Entry::new(name, matrix(name, &flat(&pairs, resolved))))
        }

        (Style::Label, Content::Scalar(v)) => out.push(Entry::new(name, format!(".{}", v))),
        (Style::Label, Content::Sequence(items)) => {
            let joint = if explode { "." } else { "," };
            out.push(Entry::new(name, format!(".{}", items.join(joint))))
        }
        (Style::Label, Content::Object(pairs)) if explode => out.push(Entry::new(
            name,
            format!(".{}", assigned(&pairs, resolved).join(".")),
        )),
        (Style::Label, Content::Object(pairs)) => {
            out.push(Entry::new(name, format!(".{}", flat(&pairs, resolved))))
        }

        (style, content) => {
            return Err(ShapeError::UnsupportedShape(format!(
                "parameter '{}' uses style '{}' which cannot carry {}",
                name,
                style,
                content.kind()
            )))
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParameterOptions;
    use serde::Serialize;

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

    fn filter() -> Filter {
        Filter {
            color: Rgb { r: 100, g: 200, b: 150 },
            tags: vec!["a b".into(), "c".into()],
            limit: None,
        }
    }

    fn run(style: Style, explode: bool) -> ShapeResult<Vec<Entry>> {
        let options = ProjectionOptions::new()
            .with("color", ParameterOptions::new().style(style).explode(explode))
            .with("tags", ParameterOptions::new().style(style).explode(explode));
        project_value(&filter(), Location::Query, &options, &EncodingConfig::DEFAULT)
    }

    #[test]
    fn test_form_defaults() {
        let entries = project_value(
            &filter(),
            Location::Query,
            &ProjectionOptions::new(),
            &EncodingConfig::DEFAULT,
        )
        .unwrap();
        assert_eq!(
            entries,
            vec![
                Entry::new("r", "100"),
                Entry::new("g", "200"),
                Entry::new("b", "150"),
                Entry::new("tags", "a%20b"),
                Entry::new("tags", "c"),
            ]
        );
    }

    #[test]
    fn test_form_not_exploded() {
        let entries = run(Style::Form, false).unwrap();
        assert_eq!(
            entries,
            vec![
                Entry::new("color", "r,100,g,200,b,150"),
                Entry::new("tags", "a%20b,c"),
            ]
        );
    }

    #[test]
    fn test_simple() {
        assert_eq!(
            run(Style::Simple, false).unwrap(),
            vec![
                Entry::new("color", "r,100,g,200,b,150"),
                Entry::new("tags", "a%20b,c"),
            ]
        );
        assert_eq!(
            run(Style::Simple, true).unwrap()[0],
            Entry::new("color", "r=100,g=200,b=150")
        );
    }

    #[test]
    fn test_matrix_and_label() {
        let matrix = run(Style::Matrix, false).unwrap();
        assert_eq!(matrix[0], Entry::new("color", ";color=r,100,g,200,b,150"));
        assert_eq!(matrix[1], Entry::new("tags", ";tags=a%20b,c"));

        let matrix = run(Style::Matrix, true).unwrap();
        assert_eq!(matrix[0], Entry::new("color", ";r=100;g=200;b=150"));
        assert_eq!(matrix[1], Entry::new("tags", ";tags=a%20b;tags=c"));

        let label = run(Style::Label, true).unwrap();
        assert_eq!(label[0], Entry::new("color", ".r=100.g=200.b=150"));
        assert_eq!(label[1], Entry::new("tags", ".a%20b.c"));
    }

    #[test]
    fn test_delimited_styles_reject_objects() {
        let err = run(Style::PipeDelimited, false).unwrap_err();
        assert!(matches!(err, ShapeError::UnsupportedShape(_)));

        let options = ProjectionOptions::new()
            .with("tags", ParameterOptions::new().style(Style::SpaceDelimited));
        let entries =
            project_value(&filter(), Location::Query, &options, &EncodingConfig::DEFAULT).unwrap();
        assert_eq!(entries.last(), Some(&Entry::new("tags", "a%20b c")));
    }

    #[test]
    fn test_deep_object_rejects_sequences() {
        let err = run(Style::DeepObject, true).unwrap_err();
        assert!(matches!(err, ShapeError::UnsupportedShape(ref m) if m.contains("tags")));
    }

    #[test]
    fn test_required_absent_field() {
        let options = ProjectionOptions::new().with("limit", ParameterOptions::new().required(true));
        let err =
            project_value(&filter(), Location::Query, &options, &EncodingConfig::DEFAULT).unwrap_err();
        assert!(matches!(err, ShapeError::MissingRequiredParameter(ref m) if m.contains("limit")));
    }

    #[test]
    fn test_nested_composites_are_rejected() {
        #[derive(Serialize)]
        struct Nested {
            grid: Vec<Vec<u8>>,
        }
        let err = project_value(
            &Nested { grid: vec![vec![1]] },
            Location::Query,
            &ProjectionOptions::new(),
            &EncodingConfig::DEFAULT,
        )
        .unwrap_err();
        assert!(matches!(err, ShapeError::UnsupportedShape(_)));
    }

    #[test]
    fn test_exploded_members_must_not_clash() {
        #[derive(Serialize)]
        struct Owner {
            id: u32,
        }

        #[derive(Serialize)]
        struct Lookup {
            id: u32,
            owner: Owner,
        }

        let value = Lookup {
            id: 1,
            owner: Owner { id: 2 },
        };
        let config = EncodingConfig::DEFAULT;
        let err = project_value(&value, Location::Query, &ProjectionOptions::new(), &config)
            .unwrap_err();
        assert!(matches!(err, ShapeError::UnsupportedShape(ref m) if m.contains("'id'")));

        let options =
            ProjectionOptions::new().with("owner", ParameterOptions::new().style(Style::DeepObject));
        let entries = project_value(&value, Location::Query, &options, &config).unwrap();
        assert_eq!(entries, vec![Entry::new("id", "1"), Entry::new("owner[id]", "2")]);
    }

    #[test]
    fn test_label_items_escape_dots() {
        #[derive(Serialize)]
        struct Versions {
            tags: Vec<String>,
        }
        let options =
            ProjectionOptions::new().with("tags", ParameterOptions::new().style(Style::Label).explode(true));
        let entries = project_value(
            &Versions {
                tags: vec!["v1.2".into(), "x".into()],
            },
            Location::Path,
            &options,
            &EncodingConfig::DEFAULT,
        )
        .unwrap();
        assert_eq!(entries, vec![Entry::new("tags", ".v1%2E2.x")]);
    }

    #[test]
    fn test_lone_empty_item_is_rejected_when_joined() {
        #[derive(Serialize)]
        struct Tags {
            tags: Vec<String>,
        }
        let value = Tags {
            tags: vec![String::new()],
        };
        let config = EncodingConfig::DEFAULT;
        let err = project_value(&value, Location::Path, &ProjectionOptions::new(), &config)
            .unwrap_err();
        assert!(matches!(err, ShapeError::UnsupportedShape(ref m) if m.contains("empty item")));

        let entries =
            project_value(&value, Location::Query, &ProjectionOptions::new(), &config).unwrap();
        assert_eq!(entries, vec![Entry::new("tags", "")]);
    }

    #[test]
    fn test_member_names_are_encoded() {
        use std::collections::BTreeMap;

        #[derive(Serialize)]
        struct Filters {
            extra: BTreeMap<String, String>,
        }
        let value = Filters {
            extra: BTreeMap::from([("a&b".to_string(), "1".to_string())]),
        };
        let config = EncodingConfig::DEFAULT;
        let entries =
            project_value(&value, Location::Query, &ProjectionOptions::new(), &config).unwrap();
        assert_eq!(entries, vec![Entry::new("a%26b", "1")]);

        let options =
            ProjectionOptions::new().with("extra", ParameterOptions::new().style(Style::DeepObject));
        let entries = project_value(&value, Location::Query, &options, &config).unwrap();
        assert_eq!(entries, vec![Entry::new("extra[a%26b]", "1")]);
    }
}
