//! CMake/CTest host toolchain
//!
//! Generates `toolchain.cmake`, `dependencies.cmake` and `dependencies.json` into
//! the generated root, then drives `cmake`, `ctest` and `cmake --install`.

use std::collections::HashMap;
use std::path::Path;
use std::process::{Command, Output};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::debug;

use super::toolchain::{HostToolchain, TestReport};
use crate::core::conf::HostConf;
use crate::core::error::ConfError;
use crate::core::layout::LayoutPlan;
use crate::core::overlay::ResolvedOptions;
use crate::core::platform::{Compiler, LanguageStandard, PlatformFacts};
use crate::core::requirement::Requirement;
use crate::output;

pub const TOOLCHAIN_FILE: &str = "toolchain.cmake";
pub const DEPS_CMAKE_FILE: &str = "dependencies.cmake";
pub const DEPS_JSON_FILE: &str = "dependencies.json";

/// Lines of captured output kept in error messages
const ERROR_TAIL_LINES: usize = 20;

/// Host toolchain backed by the `cmake` and `ctest` executables.
#[derive(Debug, Clone)]
pub struct CMakeToolchain {
    facts: PlatformFacts,
    jobs: usize,
    generator: Option<String>,
    dry_run: bool,
}

impl CMakeToolchain {
    pub fn new(facts: PlatformFacts) -> Self {
        Self {
            facts,
            jobs: num_cpus::get(),
            generator: None,
            dry_run: false,
        }
    }

    /// Take jobs and generator from host configuration.
    pub fn from_conf(facts: PlatformFacts, conf: &HostConf) -> Result<Self, ConfError> {
        Ok(Self {
            jobs: conf.jobs()?,
            generator: conf.generator()?.map(str::to_string),
            ..Self::new(facts)
        })
    }

    /// Log commands and files instead of running/writing them.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    fn write(&self, path: &Path, content: &str) -> Result<()> {
        if self.dry_run {
            output::detail(&format!("would write {}", path.display()));
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        output::detail(&format!("wrote {}", path.display()));
        Ok(())
    }

    /// Run a command to completion, capturing its output.
    ///
    /// Returns `None` in dry-run mode.
    fn run(&self, cmd: &mut Command) -> Result<Option<Output>> {
        let cmdline = describe(cmd);
        if self.dry_run {
            output::detail(&format!("would run: {}", cmdline));
            return Ok(None);
        }

        debug!(command = %cmdline, "running");
        let pb = output::spinner(&format!("run: {}", truncate(&cmdline, 60)));
        let result = cmd.output();
        pb.finish_and_clear();

        let out = result.with_context(|| format!("Failed to start: {}", cmdline))?;
        output::detail(&format!("run: {}", truncate(&cmdline, 60)));
        Ok(Some(out))
    }

    /// Run a command that must exit successfully.
    fn run_checked(&self, cmd: &mut Command) -> Result<()> {
        let cmdline = describe(cmd);
        let Some(out) = self.run(cmd)? else {
            return Ok(());
        };
        if !out.status.success() {
            bail!(
                "command failed: {} (exit code: {:?})\n{}",
                cmdline,
                out.status.code(),
                tail(&out)
            );
        }
        Ok(())
    }
}

impl HostToolchain for CMakeToolchain {
    fn supported_standard(&self, facts: &PlatformFacts) -> LanguageStandard {
        max_standard(&facts.compiler)
    }

    fn generate_toolchain_files(&mut self, layout: &LayoutPlan, options: &ResolvedOptions) -> Result<()> {
        let content = render_toolchain(&self.facts, layout, options)?;
        self.write(&layout.generated_root.join(TOOLCHAIN_FILE), &content)
    }

    fn generate_dependency_descriptors(
        &mut self,
        layout: &LayoutPlan,
        requirements: &[Requirement],
    ) -> Result<()> {
        let json = render_dependencies_json(requirements)?;
        self.write(&layout.generated_root.join(DEPS_JSON_FILE), &json)?;
        self.write(
            &layout.generated_root.join(DEPS_CMAKE_FILE),
            &render_dependencies_cmake(requirements)?,
        )
    }

    fn run_build(&mut self, layout: &LayoutPlan) -> Result<()> {
        let mut configure = Command::new("cmake");
        configure
            .arg("-S")
            .arg(&layout.source_root)
            .arg("-B")
            .arg(&layout.build_root);
        if let Some(generator) = &self.generator {
            configure.arg("-G").arg(generator);
        }
        configure
            .arg(format!(
                "-DCMAKE_TOOLCHAIN_FILE={}",
                cmake_path(&layout.generated_root.join(TOOLCHAIN_FILE))
            ))
            .arg(format!("-DCMAKE_INSTALL_PREFIX={}", cmake_path(&layout.install_root)));
        self.run_checked(&mut configure)?;

        let mut build = Command::new("cmake");
        build
            .arg("--build")
            .arg(&layout.build_root)
            .args(["--config", layout.build_type.as_str()])
            .arg("--parallel")
            .arg(self.jobs.to_string());
        self.run_checked(&mut build)
    }

    fn run_tests(&mut self, layout: &LayoutPlan) -> Result<TestReport> {
        let mut ctest = Command::new("ctest");
        ctest
            .arg("--test-dir")
            .arg(&layout.build_root)
            .args(["-C", layout.build_type.as_str()])
            .arg("--output-on-failure");

        let Some(out) = self.run(&mut ctest)? else {
            return Ok(TestReport::default());
        };

        let stdout = String::from_utf8_lossy(&out.stdout);
        let report = parse_ctest_output(&stdout, out.status.success());
        for name in &report.failures {
            output::warning(&format!("test failed: {}", name));
        }
        Ok(report)
    }

    fn install_package(&mut self, layout: &LayoutPlan) -> Result<()> {
        let mut install = Command::new("cmake");
        install
            .arg("--install")
            .arg(&layout.build_root)
            .args(["--config", layout.build_type.as_str()])
            .arg("--prefix")
            .arg(&layout.install_root);
        self.run_checked(&mut install)
    }
}

/// Highest standard a compiler release supports.
///
/// Unknown compilers or versions are assumed current; CMake reports the real
/// limit at configure time.
pub fn max_standard(compiler: &Compiler) -> LanguageStandard {
    use LanguageStandard as L;

    let Some(v) = compiler.major_version() else {
        return L::CXX23;
    };
    match compiler.name.as_str() {
        "gcc" if v >= 11 => L::CXX23,
        "gcc" if v >= 8 => L::CXX20,
        "gcc" if v >= 5 => L::CXX17,
        "gcc" => L::CXX14,
        "clang" if v >= 12 => L::CXX23,
        "clang" if v >= 6 => L::CXX20,
        "clang" if v >= 5 => L::CXX17,
        "clang" => L::CXX14,
        "apple-clang" if v >= 13 => L::CXX23,
        "apple-clang" if v >= 10 => L::CXX20,
        "apple-clang" => L::CXX17,
        "msvc" if v >= 193 => L::CXX23,
        "msvc" if v >= 192 => L::CXX20,
        "msvc" => L::CXX17,
        _ => L::CXX23,
    }
}

/// Contents of `toolchain.cmake`.
///
/// Fails when two dependency options sanitize to the same cache variable.
pub fn render_toolchain(facts: &PlatformFacts, layout: &LayoutPlan, options: &ResolvedOptions) -> Result<String> {
    let mut out = String::from("# Generated by forge - do not edit\n\n");

    out.push_str(&format!(
        "set(CMAKE_BUILD_TYPE \"{}\" CACHE STRING \"Build type\" FORCE)\n",
        cmake_quote(layout.build_type.as_str())
    ));

    if let Some(std) = facts.compiler.cppstd {
        out.push_str(&format!("set(CMAKE_CXX_STANDARD {})\n", std.cmake_value()));
        out.push_str("set(CMAKE_CXX_STANDARD_REQUIRED ON)\n");
        out.push_str(&format!(
            "set(CMAKE_CXX_EXTENSIONS {})\n",
            if std.is_gnu() { "ON" } else { "OFF" }
        ));
    }

    out.push_str(&format!(
        "\nlist(PREPEND CMAKE_PREFIX_PATH \"{}\")\n",
        cmake_quote(&cmake_path(&layout.generated_root))
    ));
    out.push_str(&format!(
        "include(\"{}\" OPTIONAL)\n",
        cmake_quote(&cmake_path(&layout.generated_root.join(DEPS_CMAKE_FILE)))
    ));

    if !layout.include_dirs.is_empty() {
        let dirs: Vec<_> = layout.include_dirs.iter().map(|d| cmake_quote(&cmake_path(d))).collect();
        out.push_str(&format!("set(FORGE_INCLUDE_DIRS \"{}\")\n", dirs.join(";")));
    }

    let mut seen: HashMap<String, String> = HashMap::new();
    for (dependency, opts) in options.iter() {
        for (key, value) in opts {
            if seen.is_empty() {
                out.push_str("\n# Dependency options\n");
            }
            let variable = option_variable(dependency, key);
            let origin = format!("{}:{}", dependency, key);
            if let Some(previous) = seen.insert(variable.clone(), origin.clone()) {
                bail!("Options '{}' and '{}' both map to CMake variable {}", previous, origin, variable);
            }
            out.push_str(&format!(
                "set({} \"{}\" CACHE STRING \"\" FORCE)\n",
                variable,
                cmake_quote(&value.to_cmake())
            ));
        }
    }

    Ok(out)
}

#[derive(Serialize)]
struct DescriptorEntry<'a> {
    #[serde(flatten)]
    requirement: &'a Requirement,
    direct: bool,
}

#[derive(Serialize)]
struct Descriptors<'a> {
    requires: Vec<DescriptorEntry<'a>>,
}

/// Contents of `dependencies.json`.
pub fn render_dependencies_json(requirements: &[Requirement]) -> Result<String> {
    let doc = Descriptors {
        requires: requirements
            .iter()
            .map(|r| DescriptorEntry {
                requirement: r,
                direct: r.is_direct(),
            })
            .collect(),
    };
    serde_json::to_string_pretty(&doc).context("Failed to serialize dependency descriptors")
}

/// Contents of `dependencies.cmake`.
pub fn render_dependencies_cmake(requirements: &[Requirement]) -> Result<String> {
    let mut out = String::from("# Generated by forge - do not edit\n\n");

    let direct: Vec<_> = requirements
        .iter()
        .filter(|r| r.is_direct())
        .map(|r| cmake_quote(&r.reference().to_string()))
        .collect();
    out.push_str(&format!("set(FORGE_REQUIRES \"{}\")\n", direct.join(";")));

    let mut seen: HashMap<String, &str> = HashMap::new();
    for req in requirements {
        let variable = format!("FORGE_{}_VERSION", cmake_ident(&req.name));
        if let Some(previous) = seen.insert(variable.clone(), &req.name) {
            bail!("Requirements '{}' and '{}' both map to CMake variable {}", previous, req.name, variable);
        }
        out.push_str(&format!("set({} \"{}\")\n", variable, cmake_quote(&req.version)));
    }
    Ok(out)
}

/// `FORGE_<DEP>__<KEY>` cache variable name for a dependency option.
///
/// Sanitized names never contain `__`, so the double underscore always marks
/// the boundary between dependency and key.
pub fn option_variable(dependency: &str, key: &str) -> String {
    format!("FORGE_{}__{}", cmake_ident(dependency), cmake_ident(key))
}

/// Upper-case `raw`, mapping runs of other characters to one `_` and
/// dropping them at either end.
fn cmake_ident(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_uppercase());
        } else if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
    }
    if out.ends_with('_') {
        out.pop();
    }
    out
}

/// Escape `raw` for use inside a quoted CMake argument.
fn cmake_quote(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '"' | '$') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn cmake_path(path: &Path) -> String {
    path.display().to_string().replace('\\', "/")
}

/// Parse the summary ctest prints at the end of a run.
///
/// ```text
/// 67% tests passed, 1 tests failed out of 3
///
/// The following tests FAILED:
///           2 - parse_map (Failed)
/// ```
pub fn parse_ctest_output(stdout: &str, exit_ok: bool) -> TestReport {
    let mut total = 0;
    let mut failed = 0;
    let mut failures = Vec::new();
    let mut in_failed_list = false;

    for line in stdout.lines() {
        let trimmed = line.trim();

        if let Some((_, counts)) = trimmed.split_once("tests passed,") {
            // " 1 tests failed out of 3"
            let words: Vec<_> = counts.split_whitespace().collect();
            failed = words.first().and_then(|w| w.parse().ok()).unwrap_or(0);
            total = words.last().and_then(|w| w.parse().ok()).unwrap_or(0);
            continue;
        }

        if trimmed.starts_with("The following tests FAILED") {
            in_failed_list = true;
            continue;
        }

        if in_failed_list {
            // "2 - parse_map (Failed)"
            match trimmed.split_once(" - ") {
                Some((_, rest)) => {
                    let name = rest.rsplit_once(" (").map(|(n, _)| n).unwrap_or(rest);
                    failures.push(name.trim().to_string());
                }
                None => in_failed_list = false,
            }
        }
    }

    let mut failed = failed.max(failures.len());
    if !exit_ok && failed == 0 {
        failed = 1;
    }

    TestReport {
        total,
        failed,
        failures,
    }
}

fn describe(cmd: &Command) -> String {
    let mut parts = vec![cmd.get_program().to_string_lossy().to_string()];
    parts.extend(cmd.get_args().map(|a| a.to_string_lossy().to_string()));
    parts.join(" ")
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        s.to_string()
    }
}

fn tail(out: &Output) -> String {
    let stderr = String::from_utf8_lossy(&out.stderr);
    let stdout = String::from_utf8_lossy(&out.stdout);
    let text = if stderr.trim().is_empty() { stdout } else { stderr };
    let lines: Vec<_> = text.lines().collect();
    let start = lines.len().saturating_sub(ERROR_TAIL_LINES);
    lines[start..].join("\n")
}
