//! Recipe descriptor - identity metadata, requirements, overlays and exports.
//!
//! A descriptor is assembled once through [`RecipeBuilder`] and is immutable
//! afterwards. Declaration errors (duplicate requirements, malformed references,
//! bad predicates) are returned by the builder call that caused them.

use std::path::PathBuf;

use serde::Serialize;
use tracing::debug;

use super::conf::HostConf;
use super::error::{OverlayError, RecipeError, ValidationError};
use super::overlay::{OptionValue, Overlays, Predicate, ResolvedOptions};
use super::platform::{LanguageStandard, PlatformFacts};
use super::requirement::{Policy, Requirement, Requirements};

/// Descriptive package metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub name: String,
    pub version: String,
    pub license: String,
    pub description: Option<String>,
    pub homepage: Option<String>,
    pub topics: Vec<String>,
    /// e.g. `application`, `library`
    pub package_type: Option<String>,
}

impl Metadata {
    pub fn new(name: impl Into<String>, version: impl Into<String>, license: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            license: license.into(),
            ..Default::default()
        }
    }
}

/// Aggregate package description consumed by the lifecycle engine.
#[derive(Debug, Clone)]
pub struct RecipeDescriptor {
    metadata: Metadata,
    min_standard: LanguageStandard,
    requirements: Requirements,
    overlays: Overlays,
    exports: Vec<String>,
    include_dirs: Vec<PathBuf>,
    testing_enabled: bool,
}

impl RecipeDescriptor {
    pub fn builder(metadata: Metadata, min_standard: LanguageStandard) -> RecipeBuilder {
        RecipeBuilder::new(metadata, min_standard)
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn version(&self) -> &str {
        &self.metadata.version
    }

    pub fn min_standard(&self) -> LanguageStandard {
        self.min_standard
    }

    /// Requirements in declaration order.
    pub fn requirements(&self) -> &[Requirement] {
        self.requirements.as_slice()
    }

    /// Full requirement set, for policy queries by the dependency solver.
    pub fn requirement_set(&self) -> &Requirements {
        &self.requirements
    }

    pub fn overlays(&self) -> &Overlays {
        &self.overlays
    }

    /// Patterns selecting the distributable source set.
    pub fn exports(&self) -> &[String] {
        &self.exports
    }

    /// Include directories relative to the source root.
    pub fn include_dirs(&self) -> &[PathBuf] {
        &self.include_dirs
    }

    /// Fixed at construction; never re-read during a run.
    pub fn testing_enabled(&self) -> bool {
        self.testing_enabled
    }

    /// Effective dependency options for the given facts.
    pub fn resolved_options(&self, facts: &PlatformFacts) -> Result<ResolvedOptions, OverlayError> {
        self.overlays.evaluate(facts)
    }

    /// Check static preconditions before any build phase.
    ///
    /// `toolchain_standard` is the highest standard the host toolchain can compile.
    /// The effective standard is the explicitly configured `compiler.cppstd`, or the
    /// toolchain maximum when none is configured.
    pub fn validate(
        &self,
        facts: &PlatformFacts,
        toolchain_standard: LanguageStandard,
    ) -> Result<(), ValidationError> {
        facts.require_complete()?;

        let effective = match facts.compiler.cppstd {
            Some(requested) => {
                if !toolchain_standard.satisfies(&requested) {
                    return Err(ValidationError::UnsupportedStandard {
                        requested: requested.to_string(),
                        available: toolchain_standard.to_string(),
                    });
                }
                requested
            }
            None => toolchain_standard,
        };

        if !effective.satisfies(&self.min_standard) {
            return Err(ValidationError::BelowMinimumStandard {
                required: self.min_standard.to_string(),
                actual: effective.to_string(),
            });
        }

        debug!(recipe = %self.metadata.name, standard = %effective, "validated");
        Ok(())
    }
}

/// Collects declarations for a [`RecipeDescriptor`].
#[derive(Debug)]
pub struct RecipeBuilder {
    metadata: Metadata,
    min_standard: LanguageStandard,
    requirements: Requirements,
    overlays: Overlays,
    exports: Vec<String>,
    include_dirs: Vec<PathBuf>,
    testing_enabled: bool,
}

impl RecipeBuilder {
    pub fn new(metadata: Metadata, min_standard: LanguageStandard) -> Self {
        Self {
            metadata,
            min_standard,
            requirements: Requirements::new(),
            overlays: Overlays::new(),
            exports: Vec::new(),
            include_dirs: Vec::new(),
            testing_enabled: false,
        }
    }

    /// Declare a requirement from a `name/version` reference.
    pub fn requires(&mut self, reference: &str, policy: Policy) -> Result<&mut Self, RecipeError> {
        self.requirements.add_reference(reference, policy)?;
        Ok(self)
    }

    pub fn overlay<K, V>(
        &mut self,
        dependency: impl Into<String>,
        predicate: Predicate,
        options: impl IntoIterator<Item = (K, V)>,
    ) -> &mut Self
    where
        K: Into<String>,
        V: Into<OptionValue>,
    {
        self.overlays.declare(dependency, predicate, options);
        self
    }

    pub fn export(&mut self, pattern: impl Into<String>) -> &mut Self {
        self.exports.push(pattern.into());
        self
    }

    pub fn include_dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.include_dirs.push(dir.into());
        self
    }

    pub fn testing_enabled(&mut self, enabled: bool) -> &mut Self {
        self.testing_enabled = enabled;
        self
    }

    /// Read the testing flag from host configuration (`tools.build:skip_test`).
    pub fn testing_from_conf(&mut self, conf: &HostConf) -> Result<&mut Self, RecipeError> {
        self.testing_enabled = conf.testing_enabled()?;
        Ok(self)
    }

    pub fn build(self) -> Result<RecipeDescriptor, RecipeError> {
        if self.metadata.name.is_empty() {
            return Err(RecipeError::EmptyField("name"));
        }
        if self.metadata.version.is_empty() {
            return Err(RecipeError::EmptyField("version"));
        }
        if self.metadata.license.is_empty() {
            return Err(RecipeError::EmptyField("license"));
        }

        Ok(RecipeDescriptor {
            metadata: self.metadata,
            min_standard: self.min_standard,
            requirements: self.requirements,
            overlays: self.overlays,
            exports: self.exports,
            include_dirs: self.include_dirs,
            testing_enabled: self.testing_enabled,
        })
    }
}
