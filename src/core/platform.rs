//! Platform facts supplied by the host: OS, architecture, compiler, build type.
//!
//! Facts are read-only inputs to overlay evaluation, validation and layout.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::error::{RecipeError, ValidationError};

/// A C++ language standard level, optionally with GNU extensions (`gnu20`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LanguageStandard {
    year: u16,
    gnu: bool,
}

impl LanguageStandard {
    pub const CXX98: Self = Self::new(1998);
    pub const CXX11: Self = Self::new(2011);
    pub const CXX14: Self = Self::new(2014);
    pub const CXX17: Self = Self::new(2017);
    pub const CXX20: Self = Self::new(2020);
    pub const CXX23: Self = Self::new(2023);

    const fn new(year: u16) -> Self {
        Self { year, gnu: false }
    }

    /// Same level with GNU extensions enabled.
    pub fn gnu(self) -> Self {
        Self { gnu: true, ..self }
    }

    pub fn is_gnu(&self) -> bool {
        self.gnu
    }

    /// Two-digit value used by `CMAKE_CXX_STANDARD`.
    pub fn cmake_value(&self) -> u16 {
        self.year % 100
    }

    /// Whether this level is at least `minimum` (extensions are ignored).
    pub fn satisfies(&self, minimum: &LanguageStandard) -> bool {
        self.year >= minimum.year
    }
}

impl FromStr for LanguageStandard {
    type Err = RecipeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (gnu, digits) = match trimmed.strip_prefix("gnu") {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix("c++").unwrap_or(trimmed)),
        };

        let year = match digits {
            "98" => 1998,
            "11" => 2011,
            "14" => 2014,
            "17" => 2017,
            "20" => 2020,
            "23" => 2023,
            "26" => 2026,
            _ => return Err(RecipeError::InvalidStandard(s.to_string())),
        };

        Ok(Self { year, gnu })
    }
}

impl fmt::Display for LanguageStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.gnu {
            write!(f, "gnu")?;
        }
        write!(f, "{:02}", self.cmake_value())
    }
}

/// Compiler identity as configured by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Compiler {
    /// Identifier such as `gcc`, `clang`, `apple-clang`, `msvc`
    pub name: String,
    /// Major (or full) version string; may be empty when unknown
    pub version: String,
    /// Explicitly selected standard; `None` means the toolchain default
    pub cppstd: Option<LanguageStandard>,
}

impl Compiler {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: String::new(),
            cppstd: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_cppstd(mut self, cppstd: LanguageStandard) -> Self {
        self.cppstd = Some(cppstd);
        self
    }

    /// Leading numeric component of the version, if any.
    pub fn major_version(&self) -> Option<u32> {
        self.version.split('.').next()?.parse().ok()
    }
}

/// Concrete platform facts for one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformFacts {
    pub os: String,
    pub arch: String,
    pub compiler: Compiler,
    pub build_type: String,
}

impl PlatformFacts {
    pub fn new(
        os: impl Into<String>,
        arch: impl Into<String>,
        compiler: Compiler,
        build_type: impl Into<String>,
    ) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
            compiler,
            build_type: build_type.into(),
        }
    }

    /// Facts for the machine this process runs on, `Release` build type.
    pub fn detect() -> Self {
        let os = match std::env::consts::OS {
            "linux" => "Linux",
            "macos" => "Macos",
            "windows" => "Windows",
            "freebsd" => "FreeBSD",
            other => other,
        };
        let arch = match std::env::consts::ARCH {
            "aarch64" => "armv8",
            other => other,
        };
        let compiler = match os {
            "Macos" => "apple-clang",
            "Windows" => "msvc",
            "FreeBSD" => "clang",
            _ => "gcc",
        };

        Self::new(os, arch, Compiler::new(compiler), "Release")
    }

    /// Apply a `key=value` setting such as `compiler.cppstd=20`.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), RecipeError> {
        match key {
            "os" => self.os = value.to_string(),
            "arch" => self.arch = value.to_string(),
            "compiler" => self.compiler.name = value.to_string(),
            "compiler.version" => self.compiler.version = value.to_string(),
            "compiler.cppstd" => self.compiler.cppstd = Some(value.parse()?),
            "build_type" => self.build_type = value.to_string(),
            _ => return Err(RecipeError::UnknownSetting(key.to_string())),
        }
        Ok(())
    }

    /// Fail on the first empty fact.
    pub fn require_complete(&self) -> Result<(), ValidationError> {
        if self.os.is_empty() {
            return Err(ValidationError::MissingFact("os"));
        }
        if self.arch.is_empty() {
            return Err(ValidationError::MissingFact("arch"));
        }
        if self.compiler.name.is_empty() {
            return Err(ValidationError::MissingFact("compiler"));
        }
        if self.build_type.is_empty() {
            return Err(ValidationError::MissingFact("build_type"));
        }
        Ok(())
    }
}
