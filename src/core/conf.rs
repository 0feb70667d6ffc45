//! Host configuration
//!
//! A flat map of Conan-style keys (`tools.build:skip_test`) to TOML scalars,
//! loaded from `global.toml` files and `-c key=value` overrides:
//!
//! ```toml
//! "tools.build:skip_test" = false
//! "tools.build:jobs" = 8
//! "user.cmake.cmake_layout:build_folder" = "out/build"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use toml::Value;

use super::error::ConfError;

/// Skip the test phase (default: `true`, tests only run when set to `false`)
pub const SKIP_TEST: &str = "tools.build:skip_test";
/// Verbatim build folder replacing the derived `cmake-build-<type>`
pub const BUILD_FOLDER: &str = "user.cmake.cmake_layout:build_folder";
/// Parallel build jobs (default: CPU count)
pub const JOBS: &str = "tools.build:jobs";
/// CMake generator passed with `-G`
pub const GENERATOR: &str = "tools.cmake.cmaketoolchain:generator";
/// Install root replacing `<build>/package`
pub const INSTALL_FOLDER: &str = "tools.build:install_folder";

/// Key/value configuration supplied by the host.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostConf {
    values: BTreeMap<String, Value>,
}

impl HostConf {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document of `"key" = value` entries.
    pub fn parse(content: &str) -> Result<Self> {
        let values: BTreeMap<String, Value> =
            toml::from_str(content).context("Failed to parse host configuration")?;
        Ok(Self { values })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read conf file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid conf file: {}", path.display()))
    }

    /// Layer `other` on top of `self`; keys in `other` win.
    pub fn merge(&mut self, other: HostConf) {
        self.values.extend(other.values);
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Apply a command-line `key=value` override.
    ///
    /// The value is read as a TOML scalar (`false`, `8`, `"x"`); anything that does
    /// not parse is kept as a plain string.
    pub fn apply_override(&mut self, spec: &str) -> Result<(), ConfError> {
        let (key, raw) = spec
            .split_once('=')
            .ok_or_else(|| ConfError::MalformedOverride(spec.to_string()))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(ConfError::MalformedOverride(spec.to_string()));
        }

        let raw = raw.trim();
        let value = toml::from_str::<BTreeMap<String, Value>>(&format!("v = {}", raw))
            .ok()
            .and_then(|mut m| m.remove("v"))
            .unwrap_or_else(|| Value::String(raw.to_string()));

        self.values.insert(key.to_string(), value);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool, ConfError> {
        match self.values.get(key) {
            None => Ok(default),
            Some(Value::Boolean(b)) => Ok(*b),
            Some(other) => Err(mismatch(key, "boolean", other)),
        }
    }

    pub fn get_str(&self, key: &str) -> Result<Option<&str>, ConfError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(mismatch(key, "string", other)),
        }
    }

    pub fn get_int(&self, key: &str) -> Result<Option<i64>, ConfError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(Value::Integer(i)) => Ok(Some(*i)),
            Some(other) => Err(mismatch(key, "integer", other)),
        }
    }

    /// Tests run only when `tools.build:skip_test` is explicitly `false`.
    pub fn testing_enabled(&self) -> Result<bool, ConfError> {
        Ok(!self.get_bool(SKIP_TEST, true)?)
    }

    pub fn build_folder(&self) -> Result<Option<PathBuf>, ConfError> {
        Ok(self.get_str(BUILD_FOLDER)?.map(PathBuf::from))
    }

    pub fn install_folder(&self) -> Result<Option<PathBuf>, ConfError> {
        Ok(self.get_str(INSTALL_FOLDER)?.map(PathBuf::from))
    }

    pub fn generator(&self) -> Result<Option<&str>, ConfError> {
        self.get_str(GENERATOR)
    }

    /// Parallel jobs, falling back to the CPU count.
    pub fn jobs(&self) -> Result<usize, ConfError> {
        match self.get_int(JOBS)? {
            Some(n) if n > 0 => Ok(n as usize),
            Some(n) => Err(ConfError::TypeMismatch {
                key: JOBS.to_string(),
                expected: "positive integer",
                found: n.to_string(),
            }),
            None => Ok(num_cpus::get()),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }
}

fn mismatch(key: &str, expected: &'static str, found: &Value) -> ConfError {
    ConfError::TypeMismatch {
        key: key.to_string(),
        expected,
        found: found.to_string(),
    }
}

/// Default global conf location (`$XDG_CONFIG_HOME/forge/global.toml`).
pub fn default_conf_path() -> PathBuf {
    if let Ok(raw) = std::env::var("XDG_CONFIG_HOME") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed).join("forge").join("global.toml");
        }
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".").join(".config"))
        .join("forge")
        .join("global.toml")
}
