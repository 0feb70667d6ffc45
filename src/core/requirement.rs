//! Requirement model
//!
//! A recipe declares its external libraries as `name/version` references, each
//! optionally carrying a resolution policy:
//!
//! - `force`: the declared version beats any version requested transitively.
//! - `override`: the declared version only pins a transitive request; it does not
//!   add a direct dependency edge on its own.
//!
//! Redeclaring a name is rejected with [`RecipeError::DuplicateRequirement`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::error::RecipeError;

/// Resolution policy flags attached to a requirement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Policy {
    pub force: bool,
    #[serde(rename = "override")]
    pub override_: bool,
}

impl Policy {
    pub fn forced() -> Self {
        Self {
            force: true,
            override_: false,
        }
    }

    pub fn overriding() -> Self {
        Self {
            force: false,
            override_: true,
        }
    }

    /// True when this requirement should win over a transitive request.
    pub fn pins(&self) -> bool {
        self.force || self.override_
    }
}

/// A `name/version` reference such as `zlib/1.2.13` or `opengl/system`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    pub name: String,
    pub version: String,
}

impl FromStr for Reference {
    type Err = RecipeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RecipeError::InvalidReference(s.to_string());

        let (name, version) = s.trim().split_once('/').ok_or_else(invalid)?;
        if name.is_empty() || version.is_empty() {
            return Err(invalid());
        }
        if version.contains('/') || name.chars().any(char::is_whitespace) {
            return Err(invalid());
        }
        if version.chars().any(char::is_whitespace) {
            return Err(invalid());
        }

        Ok(Self {
            name: name.to_string(),
            version: version.to_string(),
        })
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)
    }
}

/// One declared external dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Requirement {
    pub name: String,
    pub version: String,
    #[serde(flatten)]
    pub policy: Policy,
}

impl Requirement {
    pub fn reference(&self) -> Reference {
        Reference {
            name: self.name.clone(),
            version: self.version.clone(),
        }
    }

    /// Whether this requirement adds a direct dependency edge.
    pub fn is_direct(&self) -> bool {
        !self.policy.override_
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)?;
        if self.policy.force {
            write!(f, " [force]")?;
        }
        if self.policy.override_ {
            write!(f, " [override]")?;
        }
        Ok(())
    }
}

/// Outcome of reconciling a transitive request with the recipe's own requirements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pin {
    /// Nothing in the recipe constrains the name; the transitive version stands.
    Transitive(String),
    /// The recipe declares the same version.
    Agreed(String),
    /// A `force` or `override` requirement replaces the transitive version.
    Pinned { version: String, replaced: String },
    /// Plain requirement disagrees with the transitive request.
    Conflict { declared: String, requested: String },
}

impl Pin {
    /// The version handed to the solver, if there is a single answer.
    pub fn version(&self) -> Option<&str> {
        match self {
            Pin::Transitive(v) | Pin::Agreed(v) => Some(v),
            Pin::Pinned { version, .. } => Some(version),
            Pin::Conflict { .. } => None,
        }
    }
}

/// Ordered, name-unique set of requirements owned by a recipe.
#[derive(Debug, Clone, Default)]
pub struct Requirements {
    entries: Vec<Requirement>,
    index: HashMap<String, usize>,
}

impl Requirements {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a requirement, rejecting a second declaration of the same name.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        version: impl Into<String>,
        policy: Policy,
    ) -> Result<(), RecipeError> {
        let name = name.into();
        let version = version.into();

        if name.is_empty() || version.is_empty() {
            return Err(RecipeError::InvalidReference(format!("{}/{}", name, version)));
        }
        if self.index.contains_key(&name) {
            return Err(RecipeError::DuplicateRequirement { name });
        }

        self.index.insert(name.clone(), self.entries.len());
        self.entries.push(Requirement {
            name,
            version,
            policy,
        });
        Ok(())
    }

    /// Parse `name/version` and register it.
    pub fn add_reference(&mut self, reference: &str, policy: Policy) -> Result<(), RecipeError> {
        let Reference { name, version } = reference.parse()?;
        self.add(name, version, policy)
    }

    pub fn get(&self, name: &str) -> Option<&Requirement> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// The policy flags a requirement was registered with.
    pub fn resolve_policy(&self, name: &str) -> Option<Policy> {
        self.get(name).map(|r| r.policy)
    }

    /// Reconcile a transitive request for `name` at `requested`.
    pub fn pin(&self, name: &str, requested: &str) -> Pin {
        match self.get(name) {
            None => Pin::Transitive(requested.to_string()),
            Some(req) if req.version == requested => Pin::Agreed(req.version.clone()),
            Some(req) if req.policy.pins() => Pin::Pinned {
                version: req.version.clone(),
                replaced: requested.to_string(),
            },
            Some(req) => Pin::Conflict {
                declared: req.version.clone(),
                requested: requested.to_string(),
            },
        }
    }

    /// Requirements that add a direct dependency edge, in declaration order.
    pub fn direct(&self) -> impl Iterator<Item = &Requirement> {
        self.entries.iter().filter(|r| r.is_direct())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Requirement> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[Requirement] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a Requirements {
    type Item = &'a Requirement;
    type IntoIter = std::slice::Iter<'a, Requirement>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
