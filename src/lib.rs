//! Declarative C++ package recipes driven through a CMake lifecycle
//!
//! A recipe names a package, its requirements on other packages, per-platform
//! option overlays for those requirements and the minimum C++ standard it
//! builds with. The engine validates the recipe against concrete platform
//! facts and drives a host toolchain through the lifecycle phases.
//!
//! # Example Recipe
//!
//! ```toml
//! [package]
//! name = "recoil"
//! version = "105.0"
//! license = "GPL-2.0-or-later"
//! min_cppstd = "20"
//!
//! [[requires]]
//! ref = "zlib/1.2.13"
//!
//! [[requires]]
//! ref = "zstd/1.5.6"
//! override = true
//!
//! [[overlay]]
//! dependency = "sdl"
//! when = { os = "Linux" }
//! options = { wayland = false, pulse = false, alsa = false }
//! ```
//!
//! # Lifecycle
//!
//! - `validate` - platform facts complete, language standard satisfied
//! - `generate` - toolchain file and dependency descriptors
//! - `build` - configure and compile
//! - `test` - only when `tools.build:skip_test=false`
//! - `package` - install into the install root
//!
//! # Host Configuration
//!
//! - `tools.build:skip_test` - skip the test phase (default `true`)
//! - `user.cmake.cmake_layout:build_folder` - build root override
//! - `tools.build:install_folder` - install root override
//! - `tools.build:jobs` - parallel build jobs
//! - `tools.cmake.cmaketoolchain:generator` - CMake generator

pub mod core;
pub mod engine;
pub mod manifest;
pub mod output;

pub use crate::core::conf::HostConf;
pub use crate::core::error::{ConfError, LayoutError, OverlayError, RecipeError, ValidationError};
pub use crate::core::exports::ExportSet;
pub use crate::core::layout::{BuildType, LayoutPlan, LayoutResolver};
pub use crate::core::overlay::{Expression, FactPattern, OptionValue, Overlays, Predicate, ResolvedOptions};
pub use crate::core::platform::{Compiler, LanguageStandard, PlatformFacts};
pub use crate::core::recipe::{Metadata, RecipeBuilder, RecipeDescriptor};
pub use crate::core::requirement::{Pin, Policy, Reference, Requirement, Requirements};
pub use engine::cmake::CMakeToolchain;
pub use engine::{HostToolchain, Lifecycle, Phase, PipelineError, RunOutcome, RunReport, TestReport};
pub use manifest::Manifest;
