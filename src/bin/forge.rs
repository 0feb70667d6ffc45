//! Forge CLI - build C++ recipes through CMake
//!
//! Usage:
//!   forge build <recipe>            Run validate, generate, build, test, package
//!   forge info <recipe>             Show recipe metadata and resolved options
//!   forge layout <recipe>           Show the resolved build layout
//!   forge export <recipe> <dest>    Copy the distributable source set

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use recipe_forge::core::conf::{self, HostConf};
use recipe_forge::core::exports::ExportSet;
use recipe_forge::core::layout::{BuildType, LayoutPlan, LayoutResolver};
use recipe_forge::core::platform::PlatformFacts;
use recipe_forge::engine::lock::acquire_build_lock;
use recipe_forge::manifest::{self, Manifest};
use recipe_forge::{CMakeToolchain, Lifecycle, RunOutcome, output};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "forge")]
#[command(about = "Build C++ packages from declarative recipes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Platform setting, e.g. `-s compiler.cppstd=20` (repeatable)
    #[arg(short = 's', long = "settings", global = true, value_name = "KEY=VALUE")]
    settings: Vec<String>,

    /// Host configuration override, e.g. `-c tools.build:skip_test=false` (repeatable)
    #[arg(short = 'c', long = "conf", global = true, value_name = "KEY=VALUE")]
    conf: Vec<String>,

    /// Extra host configuration file, layered over the global one
    #[arg(long, global = true, env = "FORGE_CONF")]
    conf_file: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the build lifecycle for a recipe
    Build {
        /// Recipe file or directory containing recipe.toml
        #[arg(default_value = ".")]
        recipe: PathBuf,

        /// Print host commands and files instead of running or writing them
        #[arg(long)]
        dry_run: bool,
    },

    /// Show recipe metadata, requirements and resolved options
    Info {
        #[arg(default_value = ".")]
        recipe: PathBuf,
    },

    /// Show the resolved build layout
    Layout {
        #[arg(default_value = ".")]
        recipe: PathBuf,
    },

    /// Copy the export set into a destination directory
    Export {
        recipe: PathBuf,
        dest: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let conf = load_conf(cli.conf_file.as_deref(), &cli.conf)?;
    let facts = resolve_facts(&cli.settings)?;

    match cli.command {
        Commands::Build { recipe, dry_run } => {
            let manifest = manifest::load(&recipe, &conf)?;
            let layout = resolve_layout(&manifest, &conf, &facts)?;
            build(&manifest, &conf, &facts, &layout, dry_run)?;
        }

        Commands::Info { recipe } => {
            let manifest = manifest::load(&recipe, &conf)?;
            show_info(&manifest, &facts)?;
        }

        Commands::Layout { recipe } => {
            let manifest = manifest::load(&recipe, &conf)?;
            let layout = resolve_layout(&manifest, &conf, &facts)?;
            show_layout(&layout);
        }

        Commands::Export { recipe, dest } => {
            let manifest = manifest::load(&recipe, &conf)?;
            export(&manifest, &conf, &dest)?;
        }
    }

    Ok(())
}

fn setup_logging(verbosity: u8) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let level = match verbosity {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

/// Global conf, then `--conf-file`, then `-c` overrides.
fn load_conf(conf_file: Option<&Path>, overrides: &[String]) -> Result<HostConf> {
    let mut host = HostConf::new();

    let global = conf::default_conf_path();
    if global.is_file() {
        host.merge(HostConf::load(&global)?);
    }
    if let Some(path) = conf_file {
        host.merge(HostConf::load(path)?);
    }
    for spec in overrides {
        host.apply_override(spec)?;
    }
    Ok(host)
}

/// Detected host facts with `-s key=value` settings applied on top.
fn resolve_facts(settings: &[String]) -> Result<PlatformFacts> {
    let mut facts = PlatformFacts::detect();
    for spec in settings {
        let (key, value) = spec
            .split_once('=')
            .with_context(|| format!("Invalid setting '{}': expected KEY=VALUE", spec))?;
        facts.set(key.trim(), value.trim())?;
    }
    Ok(facts)
}

fn resolve_layout(manifest: &Manifest, conf: &HostConf, facts: &PlatformFacts) -> Result<LayoutPlan> {
    let build_folder = conf.build_folder()?;
    let layout = LayoutResolver::new(&manifest.source_root)
        .with_include_dirs(manifest.recipe.include_dirs())
        .with_install_root(conf.install_folder()?)
        .resolve(&facts.build_type, build_folder.as_deref())?;
    Ok(layout)
}

fn build(
    manifest: &Manifest,
    conf: &HostConf,
    facts: &PlatformFacts,
    layout: &LayoutPlan,
    dry_run: bool,
) -> Result<()> {
    // Dry runs never touch the build root, so they don't need the lock
    let _lock = if dry_run {
        None
    } else {
        Some(acquire_build_lock(&layout.build_root)?)
    };

    let mut toolchain = CMakeToolchain::from_conf(facts.clone(), conf)?.dry_run(dry_run);
    let report = Lifecycle::new(&manifest.recipe, facts, layout).run(&mut toolchain)?;

    match report.outcome {
        RunOutcome::Succeeded => {
            if let Some(tests) = &report.test_report {
                output::detail(&format!("{} tests passed", tests.total));
            }
            output::success(&format!(
                "Packaged {} into {}",
                manifest.recipe.name(),
                layout.install_root.display()
            ));
            Ok(())
        }
        RunOutcome::TestsFailed(tests) => {
            for name in &tests.failures {
                output::error(&format!("FAILED {}", name));
            }
            bail!(
                "{} of {} tests failed; {} was not packaged",
                tests.failed,
                tests.total,
                manifest.recipe.name()
            )
        }
    }
}

fn show_info(manifest: &Manifest, facts: &PlatformFacts) -> Result<()> {
    let recipe = &manifest.recipe;
    let meta = recipe.metadata();

    println!("{:<12} {}", "Name:".bold(), meta.name.bold().cyan());
    println!("{:<12} {}", "Version:".bold(), meta.version.green());
    println!("{:<12} {}", "License:".bold(), meta.license);
    if let Some(desc) = &meta.description {
        println!("{:<12} {}", "Description:".bold(), desc);
    }
    if let Some(homepage) = &meta.homepage {
        println!("{:<12} {}", "Homepage:".bold(), homepage);
    }
    if !meta.topics.is_empty() {
        println!("{:<12} {}", "Topics:".bold(), meta.topics.join(", "));
    }
    println!("{:<12} {}", "Min cppstd:".bold(), recipe.min_standard());
    println!("{:<12} {}", "Recipe:".bold(), manifest.path.display().to_string().dimmed());
    println!();

    println!("{}", "Requires:".bold());
    if recipe.requirements().is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for req in recipe.requirements() {
        println!("  {} {}", "-".cyan(), req);
    }
    println!();

    let options = recipe.resolved_options(facts)?;
    println!(
        "{} {}",
        "Options:".bold(),
        format!("({} {} {})", facts.os, facts.arch, facts.compiler.name).dimmed()
    );
    if options.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for (dependency, values) in options.iter() {
        for (key, value) in values {
            println!("  {}:{} = {}", dependency, key, value);
        }
    }

    Ok(())
}

fn show_layout(layout: &LayoutPlan) {
    output::field("build_type", layout.build_type.as_str());
    output::field("source", &layout.source_root.display().to_string());
    output::field("build", &layout.build_root.display().to_string());
    output::field("generators", &layout.generated_root.display().to_string());
    output::field("install", &layout.install_root.display().to_string());
    for dir in &layout.include_dirs {
        output::field("include", &dir.display().to_string());
    }
}

/// Build roots that never belong in an export.
fn export_skip_dirs(source_root: &Path, conf: &HostConf, dest: &Path) -> Result<Vec<PathBuf>> {
    let mut skip: Vec<PathBuf> = BuildType::ALL
        .iter()
        .map(|bt| source_root.join(bt.folder_name()))
        .collect();
    if let Some(folder) = conf.build_folder()? {
        skip.push(source_root.join(folder));
    }
    skip.push(std::path::absolute(dest).unwrap_or_else(|_| dest.to_path_buf()));
    Ok(skip)
}

fn export(manifest: &Manifest, conf: &HostConf, dest: &Path) -> Result<()> {
    let recipe = &manifest.recipe;
    if recipe.exports().is_empty() {
        bail!("{} declares no exports_sources", recipe.name());
    }

    output::action(&format!("Exporting {}/{}", recipe.name(), recipe.version()));
    let set = ExportSet::new(recipe.exports())?;
    let skip = export_skip_dirs(&manifest.source_root, conf, dest)?;
    let files = set.copy_to(&manifest.source_root, dest, &skip)?;

    output::success(&format!("Exported {} files to {}", files.len(), dest.display()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_facts_applies_settings() {
        let facts = resolve_facts(&[
            "os=Linux".to_string(),
            "compiler=clang".to_string(),
            "compiler.cppstd=gnu20".to_string(),
            "build_type=Debug".to_string(),
        ])
        .unwrap();
        assert_eq!(facts.os, "Linux");
        assert_eq!(facts.compiler.name, "clang");
        assert_eq!(facts.build_type, "Debug");
        assert!(facts.compiler.cppstd.unwrap().is_gnu());
    }

    #[test]
    fn test_resolve_facts_rejects_malformed() {
        assert!(resolve_facts(&["os".to_string()]).is_err());
        assert!(resolve_facts(&["distro=arch".to_string()]).is_err());
    }

    #[test]
    fn test_load_conf_layers_file_and_overrides() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("forge.toml");
        std::fs::write(&path, "\"tools.build:skip_test\" = false\n\"tools.build:jobs\" = 2\n").unwrap();

        let host = load_conf(Some(&path), &["tools.build:jobs=6".to_string()]).unwrap();
        assert!(host.testing_enabled().unwrap());
        assert_eq!(host.jobs().unwrap(), 6);
    }

    #[test]
    fn test_export_skips_build_roots() {
        let dir = TempDir::new().unwrap();
        let mut host = HostConf::new();
        host.set(conf::BUILD_FOLDER, "out");

        let skip = export_skip_dirs(dir.path(), &host, &dir.path().join("dist")).unwrap();
        assert!(skip.contains(&dir.path().join("cmake-build-release")));
        assert!(skip.contains(&dir.path().join("cmake-build-debug")));
        assert!(skip.contains(&dir.path().join("out")));
        assert!(skip.contains(&dir.path().join("dist")));
    }
}
