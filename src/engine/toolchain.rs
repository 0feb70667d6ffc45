//! Host toolchain adapter - the seam between the lifecycle and real tools.

use anyhow::Result;
use serde::Serialize;

use crate::core::layout::LayoutPlan;
use crate::core::overlay::ResolvedOptions;
use crate::core::platform::{LanguageStandard, PlatformFacts};
use crate::core::requirement::Requirement;

/// Results of the test phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TestReport {
    /// Number of tests executed
    pub total: usize,
    /// Number of failing tests
    pub failed: usize,
    /// Names of failing tests, when the runner reports them
    pub failures: Vec<String>,
}

impl TestReport {
    pub fn passed(total: usize) -> Self {
        Self {
            total,
            failed: 0,
            failures: Vec::new(),
        }
    }

    pub fn with_failures(total: usize, failures: Vec<String>) -> Self {
        Self {
            total,
            failed: failures.len().max(1),
            failures,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Operations a host build system performs on behalf of the lifecycle.
///
/// Every method returns `Err` only when the step itself could not be carried
/// out. A test run that executes but has failing tests is an `Ok` report.
pub trait HostToolchain {
    /// Highest language standard this toolchain can compile for `facts`.
    fn supported_standard(&self, facts: &PlatformFacts) -> LanguageStandard;

    /// Write toolchain files into `layout.generated_root`.
    fn generate_toolchain_files(&mut self, layout: &LayoutPlan, options: &ResolvedOptions) -> Result<()>;

    /// Write dependency descriptor files into `layout.generated_root`.
    fn generate_dependency_descriptors(
        &mut self,
        layout: &LayoutPlan,
        requirements: &[Requirement],
    ) -> Result<()>;

    fn run_build(&mut self, layout: &LayoutPlan) -> Result<()>;

    fn run_tests(&mut self, layout: &LayoutPlan) -> Result<TestReport>;

    /// Install build artifacts into `layout.install_root`.
    fn install_package(&mut self, layout: &LayoutPlan) -> Result<()>;
}
