//! Integration tests for the build lifecycle against a recording host adapter.

mod common;

use common::{Call, MockToolchain, layout_in, linux_gcc, recoil, recoil_with_conf, windows_msvc};
use pretty_assertions::assert_eq;
use recipe_forge::{
    Compiler, HostConf, LanguageStandard, Lifecycle, Metadata, OptionValue, Phase, Pin, PipelineError,
    PlatformFacts, Policy, RecipeDescriptor, RunOutcome, TestReport, ValidationError,
};
use tempfile::TempDir;

// =============================================================================
// Phase ordering
// =============================================================================

#[test]
fn test_full_run_with_tests() {
    let dir = TempDir::new().unwrap();
    let recipe = recoil(true);
    let facts = linux_gcc();
    let layout = layout_in(dir.path());
    let mut host = MockToolchain::new();

    let report = Lifecycle::new(&recipe, &facts, &layout).run(&mut host).unwrap();

    assert!(report.is_success());
    assert_eq!(
        report.phases,
        vec![Phase::Validate, Phase::Generate, Phase::Build, Phase::Test, Phase::Package]
    );
    assert!(report.skipped.is_empty());
    assert_eq!(report.test_report, Some(TestReport::passed(3)));
    assert_eq!(
        host.calls,
        vec![
            Call::GenerateToolchain,
            Call::GenerateDescriptors,
            Call::Build,
            Call::Test,
            Call::Package
        ]
    );
}

#[test]
fn test_testing_disabled_skips_test_phase() {
    let dir = TempDir::new().unwrap();
    let recipe = recoil(false);
    let facts = linux_gcc();
    let layout = layout_in(dir.path());
    let mut host = MockToolchain::new();

    let report = Lifecycle::new(&recipe, &facts, &layout).run(&mut host).unwrap();

    assert_eq!(report.outcome, RunOutcome::Succeeded);
    assert_eq!(
        report.phases,
        vec![Phase::Validate, Phase::Generate, Phase::Build, Phase::Package]
    );
    assert_eq!(report.skipped, vec![Phase::Test]);
    assert_eq!(report.host_phases(), 3);
    assert_eq!(host.count(&Call::Test), 0);
    assert_eq!(report.test_report, None);
}

#[test]
fn test_default_conf_disables_testing() {
    let dir = TempDir::new().unwrap();
    let recipe = recoil_with_conf(&HostConf::new());
    let facts = linux_gcc();
    let layout = layout_in(dir.path());
    let mut host = MockToolchain::new();

    let report = Lifecycle::new(&recipe, &facts, &layout).run(&mut host).unwrap();
    assert_eq!(report.skipped, vec![Phase::Test]);
}

#[test]
fn test_conf_enables_testing() {
    let dir = TempDir::new().unwrap();
    let mut conf = HostConf::new();
    conf.apply_override("tools.build:skip_test=false").unwrap();
    let recipe = recoil_with_conf(&conf);
    let facts = linux_gcc();
    let layout = layout_in(dir.path());
    let mut host = MockToolchain::new();

    let report = Lifecycle::new(&recipe, &facts, &layout).run(&mut host).unwrap();
    assert_eq!(host.count(&Call::Test), 1);
    assert!(report.phases.contains(&Phase::Test));
}

// =============================================================================
// Failure handling
// =============================================================================

#[test]
fn test_build_failure_stops_pipeline() {
    let dir = TempDir::new().unwrap();
    let recipe = recoil(true);
    let facts = linux_gcc();
    let layout = layout_in(dir.path());
    let mut host = MockToolchain::failing_on(Call::Build);

    let err = Lifecycle::new(&recipe, &facts, &layout).run(&mut host).unwrap_err();

    assert_eq!(err.phase(), Phase::Build);
    assert!(matches!(err, PipelineError::PhaseFailure { phase: Phase::Build, .. }));
    assert_eq!(host.count(&Call::Build), 1);
    assert_eq!(host.count(&Call::Test), 0);
    assert_eq!(host.count(&Call::Package), 0);
}

#[test]
fn test_generate_failure_stops_before_descriptors() {
    let dir = TempDir::new().unwrap();
    let recipe = recoil(false);
    let facts = linux_gcc();
    let layout = layout_in(dir.path());
    let mut host = MockToolchain::failing_on(Call::GenerateToolchain);

    let err = Lifecycle::new(&recipe, &facts, &layout).run(&mut host).unwrap_err();

    assert_eq!(err.phase(), Phase::Generate);
    assert_eq!(host.calls, vec![Call::GenerateToolchain]);
}

#[test]
fn test_failing_tests_are_not_packaged() {
    let dir = TempDir::new().unwrap();
    let recipe = recoil(true);
    let facts = linux_gcc();
    let layout = layout_in(dir.path());
    let failing = TestReport::with_failures(4, vec!["unitsync_smoke".to_string()]);
    let mut host = MockToolchain::new().with_test_report(failing.clone());

    let report = Lifecycle::new(&recipe, &facts, &layout).run(&mut host).unwrap();

    assert!(!report.is_success());
    assert_eq!(report.outcome, RunOutcome::TestsFailed(failing));
    assert_eq!(report.phases.last(), Some(&Phase::Test));
    assert_eq!(host.count(&Call::Package), 0);
}

#[test]
fn test_test_runner_error_is_phase_failure() {
    let dir = TempDir::new().unwrap();
    let recipe = recoil(true);
    let facts = linux_gcc();
    let layout = layout_in(dir.path());
    let mut host = MockToolchain::failing_on(Call::Test);

    let err = Lifecycle::new(&recipe, &facts, &layout).run(&mut host).unwrap_err();

    assert_eq!(err.phase(), Phase::Test);
    assert_eq!(host.count(&Call::Package), 0);
}

#[test]
fn test_validation_failure_calls_no_host_phase() {
    let dir = TempDir::new().unwrap();
    let recipe = recoil(true);
    let facts = linux_gcc();
    let layout = layout_in(dir.path());
    let mut host = MockToolchain::new().with_standard(LanguageStandard::CXX17);

    let err = Lifecycle::new(&recipe, &facts, &layout).run(&mut host).unwrap_err();

    assert_eq!(err.phase(), Phase::Validate);
    assert!(matches!(
        err,
        PipelineError::Validation(ValidationError::BelowMinimumStandard { .. })
    ));
    assert!(host.calls.is_empty());
}

#[test]
fn test_explicit_cppstd_below_minimum_fails() {
    let dir = TempDir::new().unwrap();
    let recipe = recoil(false);
    let facts = PlatformFacts::new(
        "Linux",
        "x86_64",
        Compiler::new("gcc").with_version("13").with_cppstd(LanguageStandard::CXX17),
        "Release",
    );
    let layout = layout_in(dir.path());
    let mut host = MockToolchain::new();

    let err = Lifecycle::new(&recipe, &facts, &layout).run(&mut host).unwrap_err();
    assert_eq!(err.phase(), Phase::Validate);
    assert!(host.calls.is_empty());
}

#[test]
fn test_incomplete_facts_fail_validation() {
    let dir = TempDir::new().unwrap();
    let recipe = recoil(false);
    let facts = PlatformFacts::new("", "x86_64", Compiler::new("gcc"), "Release");
    let layout = layout_in(dir.path());
    let mut host = MockToolchain::new();

    let err = Lifecycle::new(&recipe, &facts, &layout).run(&mut host).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Validation(ValidationError::MissingFact("os"))
    ));
    assert!(host.calls.is_empty());
}

// =============================================================================
// Resolved configuration reaching the host
// =============================================================================

#[test]
fn test_linux_overlay_reaches_generate() {
    let dir = TempDir::new().unwrap();
    let recipe = recoil(false);
    let facts = linux_gcc();
    let layout = layout_in(dir.path());
    let mut host = MockToolchain::new();

    Lifecycle::new(&recipe, &facts, &layout).run(&mut host).unwrap();

    let options = host.options.unwrap();
    assert_eq!(options.get("sdl", "wayland"), Some(&OptionValue::Bool(false)));
    assert_eq!(options.get("sdl", "pulse"), Some(&OptionValue::Bool(false)));
    assert_eq!(options.get("sdl", "alsa"), Some(&OptionValue::Bool(false)));
}

#[test]
fn test_windows_gets_no_sdl_overrides() {
    let dir = TempDir::new().unwrap();
    let recipe = recoil(false);
    let facts = windows_msvc();
    let layout = layout_in(dir.path());
    let mut host = MockToolchain::new();

    Lifecycle::new(&recipe, &facts, &layout).run(&mut host).unwrap();

    let options = host.options.unwrap();
    assert!(options.options_for("sdl").is_empty());
}

#[test]
fn test_requirements_handed_over_in_order() {
    let dir = TempDir::new().unwrap();
    let recipe = recoil(false);
    let facts = linux_gcc();
    let layout = layout_in(dir.path());
    let mut host = MockToolchain::new();

    Lifecycle::new(&recipe, &facts, &layout).run(&mut host).unwrap();

    let names: Vec<_> = host.requirements.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["opengl", "glew", "zlib", "devil", "libunwind", "zstd", "ogg", "vorbis", "sdl"]
    );
}

#[test]
fn test_runs_are_deterministic() {
    let dir = TempDir::new().unwrap();
    let recipe = recoil(true);
    let facts = linux_gcc();
    let layout = layout_in(dir.path());

    let mut first = MockToolchain::new();
    let mut second = MockToolchain::new();
    let a = Lifecycle::new(&recipe, &facts, &layout).run(&mut first).unwrap();
    let b = Lifecycle::new(&recipe, &facts, &layout).run(&mut second).unwrap();

    assert_eq!(a, b);
    assert_eq!(first.calls, second.calls);
    assert_eq!(first.options, second.options);
}

// =============================================================================
// Requirement policy
// =============================================================================

fn zlib_recipe(policy: Policy, extra_first: bool) -> RecipeDescriptor {
    let mut builder = RecipeDescriptor::builder(
        Metadata::new("consumer", "1.0", "MIT"),
        LanguageStandard::CXX17,
    );
    if extra_first {
        builder.requires("boost/1.84.0", Policy::default()).unwrap();
    }
    builder.requires("zlib/1.2.13", policy).unwrap();
    if !extra_first {
        builder.requires("boost/1.84.0", Policy::default()).unwrap();
    }
    builder.build().unwrap()
}

#[test]
fn test_forced_version_wins_regardless_of_order() {
    for extra_first in [true, false] {
        let recipe = zlib_recipe(Policy::forced(), extra_first);
        let set = recipe.requirement_set();

        assert_eq!(set.resolve_policy("zlib"), Some(Policy::forced()));
        let pin = set.pin("zlib", "1.2.0");
        assert_eq!(
            pin,
            Pin::Pinned {
                version: "1.2.13".to_string(),
                replaced: "1.2.0".to_string()
            }
        );
        assert_eq!(pin.version(), Some("1.2.13"));
    }
}

#[test]
fn test_plain_requirement_conflicts() {
    let recipe = zlib_recipe(Policy::default(), true);
    let pin = recipe.requirement_set().pin("zlib", "1.2.0");
    assert_eq!(pin.version(), None);
    assert!(matches!(pin, Pin::Conflict { .. }));
}

#[test]
fn test_override_is_not_direct() {
    let recipe = recoil(false);
    let direct: Vec<_> = recipe.requirement_set().direct().map(|r| r.name.as_str()).collect();
    assert!(!direct.contains(&"zstd"));
    assert!(direct.contains(&"libunwind"));
    assert_eq!(
        recipe.requirement_set().pin("zstd", "1.5.5").version(),
        Some("1.5.6")
    );
}
