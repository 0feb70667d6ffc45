//! Lifecycle orchestration for recipe builds
//!
//! The lifecycle flow:
//! 1. validate - language standard and platform facts (gate)
//! 2. generate - toolchain and dependency descriptor files
//! 3. build - configure and compile
//! 4. test - only when testing was enabled at recipe construction
//! 5. package - install artifacts into the install root
//!
//! Phases run strictly in order and the first failure ends the run. A failing
//! test run also ends it, but is reported as a [`RunOutcome::TestsFailed`] with
//! the test results rather than as an error.

pub mod cmake;
pub mod lock;
pub mod toolchain;

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::error::{OverlayError, ValidationError};
use crate::core::layout::LayoutPlan;
use crate::core::platform::PlatformFacts;
use crate::core::recipe::RecipeDescriptor;
use crate::output;

pub use toolchain::{HostToolchain, TestReport};

/// One step of the build lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Phase {
    Validate,
    Generate,
    Build,
    Test,
    Package,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Validate => "validate",
            Phase::Generate => "generate",
            Phase::Build => "build",
            Phase::Test => "test",
            Phase::Package => "package",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The pipeline stopped before completing.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("validate phase failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("validate phase failed: {0}")]
    Overlay(#[from] OverlayError),

    #[error("{phase} phase failed: {source:#}")]
    PhaseFailure {
        phase: Phase,
        #[source]
        source: anyhow::Error,
    },
}

impl PipelineError {
    /// The phase the pipeline stopped in.
    pub fn phase(&self) -> Phase {
        match self {
            PipelineError::Validation(_) | PipelineError::Overlay(_) => Phase::Validate,
            PipelineError::PhaseFailure { phase, .. } => *phase,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RunOutcome {
    Succeeded,
    /// The test phase ran and reported failures; nothing was packaged.
    TestsFailed(TestReport),
}

/// What a completed (or test-failed) run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Phases that ran, in order
    pub phases: Vec<Phase>,
    /// Phases that were skipped by configuration
    pub skipped: Vec<Phase>,
    pub test_report: Option<TestReport>,
    pub outcome: RunOutcome,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::Succeeded
    }

    /// Phases that called into the host toolchain.
    pub fn host_phases(&self) -> usize {
        self.phases.iter().filter(|p| **p != Phase::Validate).count()
    }
}

/// Runs the lifecycle phases for one recipe, one platform and one layout.
pub struct Lifecycle<'a> {
    recipe: &'a RecipeDescriptor,
    facts: &'a PlatformFacts,
    layout: &'a LayoutPlan,
}

impl<'a> Lifecycle<'a> {
    pub fn new(recipe: &'a RecipeDescriptor, facts: &'a PlatformFacts, layout: &'a LayoutPlan) -> Self {
        Self {
            recipe,
            facts,
            layout,
        }
    }

    /// Execute validate → generate → build → [test] → package.
    pub fn run<H: HostToolchain + ?Sized>(&self, host: &mut H) -> Result<RunReport, PipelineError> {
        let recipe = self.recipe;
        let layout = self.layout;
        let mut phases = Vec::new();
        let mut skipped = Vec::new();

        output::action(&format!(
            "Building {}/{} ({})",
            recipe.name(),
            recipe.version(),
            layout.build_type
        ));

        // PHASE 1: Validate, then resolve options once for the whole run
        output::sub_action(Phase::Validate.as_str());
        recipe.validate(self.facts, host.supported_standard(self.facts))?;
        let options = recipe.resolved_options(self.facts)?;
        debug!(?options, "resolved dependency options");
        phases.push(Phase::Validate);

        // PHASE 2: Generate toolchain + dependency descriptors
        output::sub_action(Phase::Generate.as_str());
        host.generate_toolchain_files(layout, &options)
            .and_then(|()| host.generate_dependency_descriptors(layout, recipe.requirements()))
            .map_err(|source| failure(Phase::Generate, source))?;
        phases.push(Phase::Generate);

        // PHASE 3: Build
        output::sub_action(Phase::Build.as_str());
        host.run_build(layout).map_err(|source| failure(Phase::Build, source))?;
        phases.push(Phase::Build);

        // PHASE 4: Test (only if enabled when the recipe was built)
        let mut test_report = None;
        if recipe.testing_enabled() {
            output::sub_action(Phase::Test.as_str());
            let report = host.run_tests(layout).map_err(|source| failure(Phase::Test, source))?;
            phases.push(Phase::Test);

            if !report.is_success() {
                warn!(failed = report.failed, total = report.total, "tests failed, not packaging");
                return Ok(RunReport {
                    phases,
                    skipped,
                    test_report: Some(report.clone()),
                    outcome: RunOutcome::TestsFailed(report),
                });
            }
            test_report = Some(report);
        } else {
            output::skip("test (skipped)");
            skipped.push(Phase::Test);
        }

        // PHASE 5: Package
        output::sub_action(Phase::Package.as_str());
        host.install_package(layout).map_err(|source| failure(Phase::Package, source))?;
        phases.push(Phase::Package);

        info!(recipe = recipe.name(), install_root = %layout.install_root.display(), "pipeline finished");
        Ok(RunReport {
            phases,
            skipped,
            test_report,
            outcome: RunOutcome::Succeeded,
        })
    }
}

fn failure(phase: Phase, source: anyhow::Error) -> PipelineError {
    PipelineError::PhaseFailure { phase, source }
}
