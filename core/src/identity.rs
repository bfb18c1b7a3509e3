#![deny(missing_docs)]

//! # Type Identity
//!
//! Stable keys for declared types, derived from `std::any::type_name` at the
//! point a generic traversal entry point is instantiated. No runtime
//! inspection of values takes place; two values of one declared type always
//! share an identity.
//!
//! Canonicalisation:
//! - references and smart pointers (`&`, `Box`, `Rc`, `Arc`, `Cow`, `Cell`,
//!   `RefCell`) are transparent everywhere,
//! - an outermost `Option` is stripped (optionality belongs to the field, not
//!   to the shape) and remembered in [`TypeIdentity::is_optional`],
//! - type arguments are kept, so `Page<Foo>` and `Page<Bar>` differ.
//!
//! The `key` keeps full module paths; the `name` is a short PascalCase fold
//! (`Page<my::Foo>` → `PageFoo`) used as the registry name hint.
//!
//! ## Limits
//!
//! `type_name` output is best-effort: its exact text may change between
//! compiler versions, and distinct types can in principle render alike.
//! Keys are therefore only compared within one process and are never
//! persisted; a registry lives no longer than the program that fills it.
//! Published component names come from the `name` fold, so callers that need
//! names stable across toolchains should register with
//! [`SchemaRegistry::register_with_hint`](crate::schema::SchemaRegistry::register_with_hint).

use regex::Regex;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

const TRANSPARENT: &[&str] = &["Box", "Rc", "Arc", "Cow", "Cell", "RefCell"];

/// Well-known leaf types that serialize as strings but carry a schema format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafKind {
    /// `chrono::DateTime<Tz>`.
    DateTime,
    /// `chrono::NaiveDateTime`.
    NaiveDateTime,
    /// `chrono::NaiveDate`.
    NaiveDate,
    /// `uuid::Uuid`.
    Uuid,
}

/// Opaque, stable identity of a declared type.
#[derive(Debug, Clone)]
pub struct TypeIdentity {
    key: String,
    name: String,
    path: String,
    optional: bool,
    args: Vec<TypeIdentity>,
}

impl TypeIdentity {
    /// Identity of the static type `T`.
    pub fn of<T: ?Sized>() -> Self {
        Self::from_type_name(std::any::type_name::<T>())
    }

    /// Parses a `type_name`-style string.
    ///
    /// Unparseable input falls back to the raw string as key and an
    /// identifier-only fold as name.
    pub fn from_type_name(raw: &str) -> Self {
        let tokens = tokenize(raw);
        let mut pos = 0;
        match parse_type(&tokens, &mut pos) {
            Some(expr) if pos == tokens.len() => Self::from_expr(&expr, true),
            _ => TypeIdentity {
                key: raw.to_string(),
                name: tokens
                    .iter()
                    .filter(|t| is_ident(t))
                    .map(|t| pascal_segment(t))
                    .collect(),
                path: raw.to_string(),
                optional: false,
                args: Vec::new(),
            },
        }
    }

    fn from_expr(expr: &TypeExpr, outermost: bool) -> Self {
        let mut optional = false;
        let mut current = strip_transparent(expr);
        if outermost && last_segment(&current.path) == "Option" {
            if let Some(inner) = current.args.first() {
                optional = true;
                current = strip_transparent(inner);
            }
        }

        TypeIdentity {
            key: render_key(current),
            name: fold_name(current),
            path: current.path.clone(),
            optional,
            args: current
                .args
                .iter()
                .map(|arg| TypeIdentity::from_expr(arg, false))
                .collect(),
        }
    }

    /// Canonical key used for registry lookups.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Short PascalCase name hint.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full path of the outer type constructor (`alloc::vec::Vec`, `i64`, `[]`, `()`).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last path segment of the outer type constructor (`Vec`, `i64`, `User`).
    pub fn segment(&self) -> &str {
        last_segment(&self.path)
    }

    /// Whether the declared type was `Option<_>` at the outermost level.
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Canonical identities of the type arguments.
    pub fn args(&self) -> &[TypeIdentity] {
        &self.args
    }

    /// Identity of the element type for sequences and the value type for maps.
    pub fn item(&self) -> Option<&TypeIdentity> {
        self.args.last()
    }

    /// Classifies well-known string-encoded leaves.
    pub fn leaf(&self) -> Option<LeafKind> {
        match (self.path.starts_with("chrono::"), self.segment()) {
            (true, "DateTime") => Some(LeafKind::DateTime),
            (true, "NaiveDateTime") => Some(LeafKind::NaiveDateTime),
            (true, "NaiveDate") => Some(LeafKind::NaiveDate),
            (false, "Uuid") if self.path.starts_with("uuid::") => Some(LeafKind::Uuid),
            _ => None,
        }
    }
}

impl PartialEq for TypeIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for TypeIdentity {}

impl Hash for TypeIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for TypeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

#[derive(Debug, Clone)]
struct TypeExpr {
    path: String,
    args: Vec<TypeExpr>,
}

fn tokenize(raw: &str) -> Vec<&str> {
    static TOKEN_RE: OnceLock<Regex> = OnceLock::new();
    let token_re = TOKEN_RE.get_or_init(|| {
        Regex::new(r"[A-Za-z_][A-Za-z0-9_]*(?:::[A-Za-z_][A-Za-z0-9_]*)*|\d+|[<>,;\[\]()&*]")
            .expect("Invalid regex")
    });
    token_re.find_iter(raw).map(|m| m.as_str()).collect()
}

fn is_ident(token: &str) -> bool {
    token
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
}

fn parse_type(tokens: &[&str], pos: &mut usize) -> Option<TypeExpr> {
    let token = *tokens.get(*pos)?;
    *pos += 1;
    match token {
        "&" | "*" => {
            if matches!(tokens.get(*pos), Some(&"mut") | Some(&"const")) {
                *pos += 1;
            }
            parse_type(tokens, pos)
        }
        "dyn" | "impl" => parse_type(tokens, pos),
        "[" => {
            let elem = parse_type(tokens, pos)?;
            if tokens.get(*pos) == Some(&";") {
                *pos += 2;
            }
            expect(tokens, pos, "]")?;
            Some(TypeExpr {
                path: "[]".to_string(),
                args: vec![elem],
            })
        }
        "(" => {
            let args = parse_list(tokens, pos, ")")?;
            Some(TypeExpr {
                path: "()".to_string(),
                args,
            })
        }
        ident if is_ident(ident) => {
            let args = if tokens.get(*pos) == Some(&"<") {
                *pos += 1;
                parse_list(tokens, pos, ">")?
            } else {
                Vec::new()
            };
            Some(TypeExpr {
                path: ident.to_string(),
                args,
            })
        }
        _ => None,
    }
}

fn parse_list(tokens: &[&str], pos: &mut usize, close: &str) -> Option<Vec<TypeExpr>> {
    let mut items = Vec::new();
    loop {
        if tokens.get(*pos) == Some(&close) {
            *pos += 1;
            return Some(items);
        }
        items.push(parse_type(tokens, pos)?);
        match tokens.get(*pos) {
            Some(&",") => *pos += 1,
            Some(t) if *t == close => {}
            _ => return None,
        }
    }
}

fn expect(tokens: &[&str], pos: &mut usize, token: &str) -> Option<()> {
    if tokens.get(*pos) == Some(&token) {
        *pos += 1;
        Some(())
    } else {
        None
    }
}

fn last_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

fn strip_transparent(expr: &TypeExpr) -> &TypeExpr {
    let mut current = expr;
    while TRANSPARENT.contains(&last_segment(&current.path)) {
        match current.args.last() {
            Some(inner) => current = inner,
            None => break,
        }
    }
    current
}

fn render_key(expr: &TypeExpr) -> String {
    let expr = strip_transparent(expr);
    if expr.args.is_empty() {
        return expr.path.clone();
    }
    let args: Vec<String> = expr.args.iter().map(render_key).collect();
    format!("{}<{}>", expr.path, args.join(","))
}

fn fold_name(expr: &TypeExpr) -> String {
    let expr = strip_transparent(expr);
    let head = match expr.path.as_str() {
        "[]" => "Array".to_string(),
        "()" => "Tuple".to_string(),
        "Option" => String::new(),
        path => {
            let segment = last_segment(path);
            if segment == "Option" {
                String::new()
            } else {
                pascal_segment(segment)
            }
        }
    };
    expr.args.iter().fold(head, |mut acc, arg| {
        acc.push_str(&fold_name(arg));
        acc
    })
}

fn pascal_segment(segment: &str) -> String {
    let segment = last_segment(segment);
    let mut chars = segment.chars();
    match chars.next() {
        Some(head) => head.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
