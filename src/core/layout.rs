//! Layout resolution - where sources are read and artifacts are written.
//!
//! The build root is derived from the build type (`cmake-build-debug`,
//! `cmake-build-release`, ...) so different build types never share artifacts.
//! A host-supplied build folder replaces the derived name verbatim. Sources are
//! built in place; nothing is staged.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;

use super::error::LayoutError;

/// Build configurations understood by CMake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BuildType {
    Debug,
    Release,
    RelWithDebInfo,
    MinSizeRel,
}

impl BuildType {
    pub const ALL: [BuildType; 4] = [
        BuildType::Debug,
        BuildType::Release,
        BuildType::RelWithDebInfo,
        BuildType::MinSizeRel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildType::Debug => "Debug",
            BuildType::Release => "Release",
            BuildType::RelWithDebInfo => "RelWithDebInfo",
            BuildType::MinSizeRel => "MinSizeRel",
        }
    }

    /// Default build folder name for this build type.
    pub fn folder_name(&self) -> String {
        format!("cmake-build-{}", self.as_str().to_lowercase())
    }
}

impl FromStr for BuildType {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(LayoutError::EmptyBuildType);
        }
        Self::ALL
            .into_iter()
            .find(|bt| bt.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| LayoutError::UnrecognizedBuildType(trimmed.to_string()))
    }
}

impl fmt::Display for BuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved filesystem roots for one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayoutPlan {
    pub build_type: BuildType,
    pub source_root: PathBuf,
    pub build_root: PathBuf,
    /// Toolchain and dependency descriptor files; nested under `build_root`
    pub generated_root: PathBuf,
    pub install_root: PathBuf,
    /// Absolute include directories inside the source tree
    pub include_dirs: Vec<PathBuf>,
}

/// Computes a [`LayoutPlan`] from the recipe's source root.
#[derive(Debug, Clone)]
pub struct LayoutResolver {
    source_root: PathBuf,
    include_dirs: Vec<PathBuf>,
    install_override: Option<PathBuf>,
}

impl LayoutResolver {
    pub fn new(source_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            include_dirs: Vec::new(),
            install_override: None,
        }
    }

    pub fn with_include_dirs(mut self, dirs: &[PathBuf]) -> Self {
        self.include_dirs = dirs.to_vec();
        self
    }

    pub fn with_install_root(mut self, root: Option<PathBuf>) -> Self {
        self.install_override = root;
        self
    }

    /// Resolve the layout for `build_type`.
    ///
    /// A relative `host_override` is taken relative to the source root.
    pub fn resolve(&self, build_type: &str, host_override: Option<&Path>) -> Result<LayoutPlan, LayoutError> {
        let build_type: BuildType = build_type.parse()?;

        let build_root = match host_override {
            Some(folder) => self.source_root.join(folder),
            None => self.source_root.join(build_type.folder_name()),
        };
        if build_root == self.source_root {
            let folder = host_override.map(|f| f.display().to_string()).unwrap_or_default();
            return Err(LayoutError::InSourceBuildFolder(folder));
        }
        let generated_root = build_root.join("generators");
        let install_root = match &self.install_override {
            Some(root) => self.source_root.join(root),
            None => build_root.join("package"),
        };

        Ok(LayoutPlan {
            build_type,
            source_root: self.source_root.clone(),
            build_root,
            generated_root,
            install_root,
            include_dirs: self.include_dirs.iter().map(|d| self.source_root.join(d)).collect(),
        })
    }
}
