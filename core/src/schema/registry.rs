#![deny(missing_docs)]

//! # Schema Registry
//!
//! Maps type identities to generated component names and committed schema
//! nodes. A name is reserved before the body of its shape is built, so a type
//! that refers to itself resolves to a reference instead of recursing.
//!
//! The registry is passed explicitly into every call that may register a
//! shape; it is never global.

use crate::error::{ShapeError, ShapeResult};
use crate::identity::TypeIdentity;
use crate::schema::SchemaNode;
use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;

/// Highest numeric suffix tried when disambiguating a name.
const MAX_SUFFIX: usize = 1000;

/// Outcome of [`SchemaRegistry::register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// Component name assigned to the identity.
    pub name: String,
    /// `true` when the caller must build the node and [`SchemaRegistry::commit`] it.
    pub is_new: bool,
}

/// Deduplicating store of named schemas.
#[derive(Debug, Default, Clone)]
pub struct SchemaRegistry {
    names: HashMap<String, String>,
    entries: IndexMap<String, Option<SchemaNode>>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `identity` under its own name hint.
    pub fn register(&mut self, identity: &TypeIdentity) -> ShapeResult<Registration> {
        self.register_with_hint(identity, identity.name())
    }

    /// Registers `identity`, reserving a name derived from `hint` on first sight.
    ///
    /// Seen identities return their existing name with `is_new == false`.
    pub fn register_with_hint(
        &mut self,
        identity: &TypeIdentity,
        hint: &str,
    ) -> ShapeResult<Registration> {
        if let Some(name) = self.names.get(identity.key()) {
            tracing::debug!(identity = %identity, name = %name, "schema reused");
            return Ok(Registration {
                name: name.clone(),
                is_new: false,
            });
        }

        let base = if hint.is_empty() { "Schema" } else { hint };
        let name = self.disambiguate(base, identity)?;
        if name != base {
            tracing::debug!(identity = %identity, hint = base, name = %name, "schema name disambiguated");
        } else {
            tracing::debug!(identity = %identity, name = %name, "schema reserved");
        }

        self.names.insert(identity.key().to_string(), name.clone());
        self.entries.insert(name.clone(), None);
        Ok(Registration { name, is_new: true })
    }

    fn disambiguate(&self, base: &str, identity: &TypeIdentity) -> ShapeResult<String> {
        if !self.entries.contains_key(base) {
            return Ok(base.to_string());
        }
        (2..=MAX_SUFFIX)
            .map(|n| format!("{}{}", base, n))
            .find(|candidate| !self.entries.contains_key(candidate))
            .ok_or_else(|| {
                ShapeError::SchemaNameCollision(format!(
                    "no free name for '{}' after {} attempts (base '{}')",
                    identity, MAX_SUFFIX, base
                ))
            })
    }

    /// Stores the node built for a reserved name.
    ///
    /// Re-committing an identical node is a no-op; a different node is an error.
    pub fn commit(&mut self, name: &str, node: SchemaNode) -> ShapeResult<()> {
        let slot = self.entries.get_mut(name).ok_or_else(|| {
            ShapeError::General(format!("schema '{}' was never reserved", name))
        })?;
        match slot {
            Some(existing) if *existing != node => Err(ShapeError::SchemaNameCollision(format!(
                "schema '{}' is already committed with a different shape",
                name
            ))),
            Some(_) => Ok(()),
            None => {
                tracing::debug!(name = %name, "schema committed");
                *slot = Some(node);
                Ok(())
            }
        }
    }

    /// Committed node for `name`.
    pub fn resolve(&self, name: &str) -> Option<&SchemaNode> {
        self.entries.get(name).and_then(Option::as_ref)
    }

    /// Name assigned to `identity`, if registered.
    pub fn name_of(&self, identity: &TypeIdentity) -> Option<&str> {
        self.names.get(identity.key()).map(String::as_str)
    }

    /// Whether `name` is reserved (committed or not).
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of reserved names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Committed entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SchemaNode)> {
        self.entries
            .iter()
            .filter_map(|(name, node)| node.as_ref().map(|n| (name.as_str(), n)))
    }

    /// References that point at names with no committed node, each listed
    /// once in first-seen order.
    pub fn dangling_references(&self) -> Vec<String> {
        let mut refs = Vec::new();
        for node in self.entries.values().flatten() {
            node.collect_references(&mut refs);
        }
        refs.into_iter()
            .filter(|name| self.resolve(name).is_none())
            .map(str::to_string)
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect()
    }

    /// Checks that every reserved entry is committed and every reference resolves.
    pub fn finalize(&self) -> ShapeResult<()> {
        if let Some((name, _)) = self.entries.iter().find(|(_, node)| node.is_none()) {
            return Err(ShapeError::UnsupportedShape(format!(
                "schema '{}' was reserved but never built",
                name
            )));
        }
        let dangling = self.dangling_references();
        if !dangling.is_empty() {
            return Err(ShapeError::UnsupportedShape(format!(
                "dangling schema references: {}",
                dangling.join(", ")
            )));
        }
        Ok(())
    }
}
