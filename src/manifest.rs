//! Recipe manifests (`recipe.toml`)
//!
//! ```toml
//! [package]
//! name = "recoil"
//! version = "105.0"
//! license = "GPL-2.0-or-later"
//! min_cppstd = "20"
//! exports_sources = ["CMakeLists.txt", "src/*"]
//!
//! [[requires]]
//! ref = "libunwind/1.8.1"
//! force = true
//!
//! [[overlay]]
//! dependency = "sdl"
//! when = { os = "Linux" }
//! options = { alsa = false }
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use semver::{Version, VersionReq};
use serde::Deserialize;
use tracing::debug;

use crate::core::conf::HostConf;
use crate::core::overlay::{Expression, FactPattern, OptionMap, Predicate};
use crate::core::platform::LanguageStandard;
use crate::core::recipe::{Metadata, RecipeDescriptor};
use crate::core::requirement::Policy;

/// File name looked up when a directory is given
pub const MANIFEST_FILE: &str = "recipe.toml";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestToml {
    package: PackageToml,
    #[serde(default)]
    layout: LayoutToml,
    #[serde(default)]
    requires: Vec<RequireToml>,
    #[serde(default)]
    overlay: Vec<OverlayToml>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PackageToml {
    name: String,
    version: String,
    license: String,
    description: Option<String>,
    homepage: Option<String>,
    #[serde(default)]
    topics: Vec<String>,
    package_type: Option<String>,
    required_tool_version: Option<String>,
    min_cppstd: String,
    #[serde(default)]
    exports_sources: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LayoutToml {
    #[serde(default = "default_source")]
    source: PathBuf,
    #[serde(default)]
    include_dirs: Vec<PathBuf>,
}

impl Default for LayoutToml {
    fn default() -> Self {
        Self {
            source: default_source(),
            include_dirs: Vec::new(),
        }
    }
}

fn default_source() -> PathBuf {
    PathBuf::from(".")
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RequireToml {
    #[serde(rename = "ref")]
    reference: String,
    #[serde(default)]
    force: bool,
    #[serde(default, rename = "override")]
    override_: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WhenToml {
    Expression(String),
    Pattern(FactPattern),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct OverlayToml {
    dependency: String,
    when: Option<WhenToml>,
    #[serde(default)]
    options: OptionMap,
}

/// A loaded recipe together with where it lives on disk.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub path: PathBuf,
    /// Absolute source root the recipe builds from
    pub source_root: PathBuf,
    pub recipe: RecipeDescriptor,
}

/// Resolve `path` to a manifest file (directories get `recipe.toml` appended).
pub fn locate(path: &Path) -> Result<PathBuf> {
    let candidate = if path.is_dir() {
        path.join(MANIFEST_FILE)
    } else {
        path.to_path_buf()
    };
    if !candidate.is_file() {
        bail!("Recipe not found: {}", candidate.display());
    }
    Ok(candidate)
}

/// Load a manifest from disk; `conf` supplies the testing flag.
pub fn load(path: &Path, conf: &HostConf) -> Result<Manifest> {
    let path = locate(path)?;
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read recipe: {}", path.display()))?;

    let base = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let base = std::path::absolute(&base)
        .with_context(|| format!("Failed to resolve recipe directory: {}", base.display()))?;

    let (recipe, source) =
        parse(&content, conf).with_context(|| format!("Invalid recipe: {}", path.display()))?;

    Ok(Manifest {
        source_root: base.join(source),
        path,
        recipe,
    })
}

/// Build a descriptor from manifest text. Returns the recipe and its
/// manifest-relative source directory.
pub fn parse(content: &str, conf: &HostConf) -> Result<(RecipeDescriptor, PathBuf)> {
    let manifest: ManifestToml = toml::from_str(content).context("Failed to parse recipe TOML")?;
    let pkg = manifest.package;

    if let Some(req) = &pkg.required_tool_version {
        check_tool_version(req)?;
    }

    let min_standard: LanguageStandard = pkg.min_cppstd.parse()?;
    let metadata = Metadata {
        name: pkg.name,
        version: pkg.version,
        license: pkg.license,
        description: pkg.description,
        homepage: pkg.homepage,
        topics: pkg.topics,
        package_type: pkg.package_type,
    };

    let mut builder = RecipeDescriptor::builder(metadata, min_standard);

    for req in &manifest.requires {
        let policy = Policy {
            force: req.force,
            override_: req.override_,
        };
        builder.requires(&req.reference, policy)?;
    }

    for overlay in manifest.overlay {
        let predicate = match overlay.when {
            None => Predicate::Always,
            Some(WhenToml::Pattern(pattern)) => Predicate::Matches(pattern),
            Some(WhenToml::Expression(source)) => {
                Predicate::Expression(Expression::compile(&overlay.dependency, &source)?)
            }
        };
        builder.overlay(overlay.dependency, predicate, overlay.options);
    }

    for pattern in pkg.exports_sources {
        builder.export(pattern);
    }
    for dir in &manifest.layout.include_dirs {
        builder.include_dir(dir);
    }
    builder.testing_from_conf(conf)?;

    let recipe = builder.build()?;
    debug!(
        recipe = recipe.name(),
        requirements = recipe.requirements().len(),
        overlays = recipe.overlays().rules().len(),
        "loaded recipe"
    );
    Ok((recipe, manifest.layout.source))
}

fn check_tool_version(requirement: &str) -> Result<()> {
    let req = VersionReq::parse(requirement)
        .with_context(|| format!("Invalid required_tool_version: {}", requirement))?;
    let ours = Version::parse(env!("CARGO_PKG_VERSION")).context("Invalid forge version")?;
    if !req.matches(&ours) {
        bail!(
            "Recipe requires forge {} but this is forge {}",
            requirement,
            ours
        );
    }
    Ok(())
}
