//! Shared fixtures for lifecycle integration tests.

#![allow(dead_code)]

use anyhow::{Result, bail};
use recipe_forge::{
    Compiler, FactPattern, HostConf, HostToolchain, LanguageStandard, LayoutPlan, LayoutResolver, Metadata,
    PlatformFacts, Policy, Predicate, RecipeBuilder, RecipeDescriptor, Requirement, ResolvedOptions,
    TestReport,
};
use std::path::Path;

/// Host call recorded by [`MockToolchain`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GenerateToolchain,
    GenerateDescriptors,
    Build,
    Test,
    Package,
}

/// Host adapter that records calls instead of running tools.
#[derive(Debug)]
pub struct MockToolchain {
    pub calls: Vec<Call>,
    pub standard: LanguageStandard,
    pub fail_on: Option<Call>,
    pub test_report: TestReport,
    /// Options and requirements seen by the generate phase
    pub options: Option<ResolvedOptions>,
    pub requirements: Vec<Requirement>,
}

impl MockToolchain {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            standard: LanguageStandard::CXX23,
            fail_on: None,
            test_report: TestReport::passed(3),
            options: None,
            requirements: Vec::new(),
        }
    }

    pub fn failing_on(call: Call) -> Self {
        Self {
            fail_on: Some(call),
            ..Self::new()
        }
    }

    pub fn with_standard(mut self, standard: LanguageStandard) -> Self {
        self.standard = standard;
        self
    }

    pub fn with_test_report(mut self, report: TestReport) -> Self {
        self.test_report = report;
        self
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }

    fn record(&mut self, call: Call) -> Result<()> {
        let fail = self.fail_on.as_ref() == Some(&call);
        self.calls.push(call.clone());
        if fail {
            bail!("mock {:?} failed", call);
        }
        Ok(())
    }
}

impl HostToolchain for MockToolchain {
    fn supported_standard(&self, _facts: &PlatformFacts) -> LanguageStandard {
        self.standard
    }

    fn generate_toolchain_files(&mut self, _layout: &LayoutPlan, options: &ResolvedOptions) -> Result<()> {
        self.options = Some(options.clone());
        self.record(Call::GenerateToolchain)
    }

    fn generate_dependency_descriptors(
        &mut self,
        _layout: &LayoutPlan,
        requirements: &[Requirement],
    ) -> Result<()> {
        self.requirements = requirements.to_vec();
        self.record(Call::GenerateDescriptors)
    }

    fn run_build(&mut self, _layout: &LayoutPlan) -> Result<()> {
        self.record(Call::Build)
    }

    fn run_tests(&mut self, _layout: &LayoutPlan) -> Result<TestReport> {
        self.record(Call::Test)?;
        Ok(self.test_report.clone())
    }

    fn install_package(&mut self, _layout: &LayoutPlan) -> Result<()> {
        self.record(Call::Package)
    }
}

pub fn linux_gcc() -> PlatformFacts {
    PlatformFacts::new(
        "Linux",
        "x86_64",
        Compiler::new("gcc").with_version("13"),
        "Release",
    )
}

pub fn windows_msvc() -> PlatformFacts {
    PlatformFacts::new("Windows", "x86_64", Compiler::new("msvc").with_version("193"), "Release")
}

pub fn layout_in(root: &Path) -> LayoutPlan {
    LayoutResolver::new(root).resolve("Release", None).unwrap()
}

/// The recoil recipe as declared in `demos/recoil/recipe.toml`.
pub fn recoil_builder() -> RecipeBuilder {
    let mut builder = RecipeDescriptor::builder(
        Metadata::new("recoil", "105.0", "GPL-2.0-or-later"),
        LanguageStandard::CXX20,
    );
    builder
        .requires("opengl/system", Policy::default())
        .unwrap()
        .requires("glew/2.2.0", Policy::default())
        .unwrap()
        .requires("zlib/1.2.13", Policy::default())
        .unwrap()
        .requires("devil/1.8.0", Policy::default())
        .unwrap()
        .requires("libunwind/1.8.1", Policy::forced())
        .unwrap()
        .requires("zstd/1.5.6", Policy::overriding())
        .unwrap()
        .requires("ogg/1.3.5", Policy::default())
        .unwrap()
        .requires("vorbis/1.3.7", Policy::default())
        .unwrap()
        .requires("sdl/2.0.20", Policy::default())
        .unwrap();
    builder.overlay(
        "sdl",
        Predicate::Matches(FactPattern::os("Linux")),
        [("wayland", false), ("pulse", false), ("alsa", false)],
    );
    builder.export("CMakeLists.txt").export("src/*").include_dir("src");
    builder
}

pub fn recoil(testing: bool) -> RecipeDescriptor {
    let mut builder = recoil_builder();
    builder.testing_enabled(testing);
    builder.build().unwrap()
}

pub fn recoil_with_conf(conf: &HostConf) -> RecipeDescriptor {
    let mut builder = recoil_builder();
    builder.testing_from_conf(conf).unwrap();
    builder.build().unwrap()
}
