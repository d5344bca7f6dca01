//! [`Registry`] – name → factory lookup with a mandatory default entry.
//!
//! Profiles and links are selected by name at startup.  The set of variants
//! is fixed at compile time, so selection is a plain map lookup; a miss falls
//! back to the registry's default key instead of failing.

use std::collections::BTreeMap;

use tracing::warn;

use crate::RobotError;

/// A lookup table from string identifiers to factories of type `F`.
#[derive(Debug, Clone)]
pub struct Registry<F> {
    kind: &'static str,
    default_key: &'static str,
    entries: BTreeMap<String, F>,
}

/// Outcome of [`Registry::resolve`].
#[derive(Debug)]
pub struct Resolved<'a, F> {
    /// Key of the entry that was actually selected.
    pub name: &'a str,
    pub factory: &'a F,
    /// `true` when the requested name was missing and the default was used.
    pub fell_back: bool,
}

impl<F> Registry<F> {
    /// Create an empty registry.  `kind` names the registry in logs and
    /// errors (e.g. `"profile"`); `default_key` is the fallback entry.
    pub fn new(kind: &'static str, default_key: &'static str) -> Self {
        Self {
            kind,
            default_key,
            entries: BTreeMap::new(),
        }
    }

    /// Register `factory` under `name`.  Any previous entry is replaced.
    pub fn register(&mut self, name: impl Into<String>, factory: F) {
        self.entries.insert(name.into(), factory);
    }

    /// Builder-style variant of [`register`][Self::register].
    pub fn with(mut self, name: impl Into<String>, factory: F) -> Self {
        self.register(name, factory);
        self
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn default_key(&self) -> &'static str {
        self.default_key
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Look up `name` exactly.
    ///
    /// # Errors
    ///
    /// Returns [`RobotError::UnknownEntry`] when nothing is registered under
    /// `name`.
    pub fn get(&self, name: &str) -> Result<&F, RobotError> {
        self.entries.get(name).ok_or_else(|| RobotError::UnknownEntry {
            registry: self.kind,
            name: name.to_string(),
        })
    }

    /// Resolve an optional selector, falling back to the default key when the
    /// selector is absent or unknown.  An unknown selector is logged at
    /// warning level.
    ///
    /// # Errors
    ///
    /// Returns [`RobotError::UnknownEntry`] only when the default key itself
    /// is not registered.
    pub fn resolve(&self, requested: Option<&str>) -> Result<Resolved<'_, F>, RobotError> {
        if let Some(name) = requested {
            if let Some((key, factory)) = self.entries.get_key_value(name) {
                return Ok(Resolved {
                    name: key,
                    factory,
                    fell_back: false,
                });
            }
            warn!(
                registry = self.kind,
                requested = name,
                fallback = self.default_key,
                "Could not load {} \"{}\". Falling back to \"{}\"",
                self.kind,
                name,
                self.default_key
            );
        }

        let (key, factory) = self
            .entries
            .get_key_value(self.default_key)
            .ok_or_else(|| RobotError::UnknownEntry {
                registry: self.kind,
                name: self.default_key.to_string(),
            })?;
        Ok(Resolved {
            name: key,
            factory,
            fell_back: requested.is_some(),
        })
    }
}
