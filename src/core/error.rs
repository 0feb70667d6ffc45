//! Error types for recipe construction, validation, and layout resolution.

use thiserror::Error;

/// Errors raised while a recipe is being declared.
///
/// These surface at recipe-build time and are never deferred to a phase.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecipeError {
    #[error("duplicate requirement: '{name}' is already required")]
    DuplicateRequirement { name: String },

    #[error("invalid reference '{0}': expected <name>/<version>")]
    InvalidReference(String),

    #[error("invalid overlay predicate for '{dependency}': {message}")]
    InvalidPredicate { dependency: String, message: String },

    #[error("recipe field '{0}' cannot be empty")]
    EmptyField(&'static str),

    #[error("invalid language standard '{0}'")]
    InvalidStandard(String),

    #[error("unknown setting '{0}'")]
    UnknownSetting(String),

    #[error(transparent)]
    Conf(#[from] ConfError),
}

/// Overlay evaluation failed against concrete platform facts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OverlayError {
    #[error("overlay predicate for '{dependency}' failed: {message}")]
    Predicate { dependency: String, message: String },
}

/// Static preconditions that must hold before the first build phase.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("recipe requires C++{required} but the configured standard is C++{actual}")]
    BelowMinimumStandard { required: String, actual: String },

    #[error("C++{requested} was requested but the toolchain supports at most C++{available}")]
    UnsupportedStandard { requested: String, available: String },

    #[error("missing required platform fact: {0}")]
    MissingFact(&'static str),
}

/// The requested layout cannot be resolved.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("build type cannot be empty")]
    EmptyBuildType,

    #[error("unrecognized build type '{0}' (expected Debug, Release, RelWithDebInfo or MinSizeRel)")]
    UnrecognizedBuildType(String),

    #[error("build folder '{0}' would place artifacts in the source root")]
    InSourceBuildFolder(String),
}

/// Host configuration could not be read as requested.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfError {
    #[error("conf '{key}' must be a {expected}, got: {found}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: String,
    },

    #[error("malformed conf override '{0}': expected key=value")]
    MalformedOverride(String),
}
