//! Platform-conditional option overlays.
//!
//! An overlay targets one dependency and sets option keys when its predicate
//! matches the platform facts:
//!
//! ```toml
//! [[overlay]]
//! dependency = "sdl"
//! when = { os = "Linux" }
//! options = { wayland = false, pulse = false, alsa = false }
//!
//! [[overlay]]
//! dependency = "sdl"
//! when = 'os == "Linux" && arch != "armv8"'
//! options = { alsa = true }
//! ```
//!
//! Evaluation walks the rules in declaration order and a later match overwrites an
//! earlier one for the same `(dependency, key)`. Evaluation performs no I/O, so the
//! same facts always produce the same map.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use rhai::{AST, Engine, Scope};
use serde::{Deserialize, Serialize};

use super::error::{OverlayError, RecipeError};
use super::platform::PlatformFacts;

/// Names visible to predicate expressions.
const FACT_NAMES: &[&str] = &["os", "arch", "compiler", "compiler_version", "cppstd", "build_type"];

/// A single option value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl OptionValue {
    /// Rendering for a CMake `set()` call.
    pub fn to_cmake(&self) -> String {
        match self {
            OptionValue::Bool(true) => "ON".to_string(),
            OptionValue::Bool(false) => "OFF".to_string(),
            OptionValue::Int(i) => i.to_string(),
            OptionValue::Str(s) => s.clone(),
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(b) => write!(f, "{}", b),
            OptionValue::Int(i) => write!(f, "{}", i),
            OptionValue::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(b: bool) -> Self {
        OptionValue::Bool(b)
    }
}

impl From<i64> for OptionValue {
    fn from(i: i64) -> Self {
        OptionValue::Int(i)
    }
}

impl From<&str> for OptionValue {
    fn from(s: &str) -> Self {
        OptionValue::Str(s.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(s: String) -> Self {
        OptionValue::Str(s)
    }
}

/// Option key to value for one dependency.
pub type OptionMap = BTreeMap<String, OptionValue>;

static EMPTY_OPTIONS: OptionMap = BTreeMap::new();

/// Equality match on selected facts; unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FactPattern {
    pub os: Option<String>,
    pub arch: Option<String>,
    pub compiler: Option<String>,
    pub build_type: Option<String>,
}

impl FactPattern {
    pub fn os(os: impl Into<String>) -> Self {
        Self {
            os: Some(os.into()),
            ..Default::default()
        }
    }

    pub fn matches(&self, facts: &PlatformFacts) -> bool {
        fn field(want: &Option<String>, have: &str) -> bool {
            want.as_deref().is_none_or(|w| w == have)
        }

        field(&self.os, &facts.os)
            && field(&self.arch, &facts.arch)
            && field(&self.compiler, &facts.compiler.name)
            && field(&self.build_type, &facts.build_type)
    }
}

/// Compiled boolean expression over the platform facts.
#[derive(Debug, Clone)]
pub struct Expression {
    source: String,
    ast: AST,
}

impl Expression {
    /// Compile `source`, rejecting syntax errors and unknown fact names.
    ///
    /// Facts are declared as plain variables so the optimizer cannot fold
    /// placeholder values into the compiled tree.
    pub fn compile(dependency: &str, source: &str) -> Result<Self, RecipeError> {
        let mut scope = Scope::new();
        for name in FACT_NAMES {
            scope.push(*name, String::new());
        }

        let ast = predicate_engine()
            .compile_expression_with_scope(&scope, source)
            .map_err(|e| RecipeError::InvalidPredicate {
                dependency: dependency.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            source: source.to_string(),
            ast,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    fn eval(&self, facts: &PlatformFacts) -> Result<bool, String> {
        let mut scope = Scope::new();
        scope.push_constant("os", facts.os.clone());
        scope.push_constant("arch", facts.arch.clone());
        scope.push_constant("compiler", facts.compiler.name.clone());
        scope.push_constant("compiler_version", facts.compiler.version.clone());
        scope.push_constant(
            "cppstd",
            facts.compiler.cppstd.map(|s| s.to_string()).unwrap_or_default(),
        );
        scope.push_constant("build_type", facts.build_type.clone());

        predicate_engine()
            .eval_ast_with_scope::<bool>(&mut scope, &self.ast)
            .map_err(|e| e.to_string())
    }
}

fn predicate_engine() -> &'static Engine {
    static ENGINE: OnceLock<Engine> = OnceLock::new();
    ENGINE.get_or_init(|| {
        let mut engine = Engine::new();
        engine.set_strict_variables(true);
        engine.set_max_expr_depths(64, 32);
        // Predicates are pure: no output to the terminal
        engine.disable_symbol("print").disable_symbol("debug");
        engine.on_print(|_| {}).on_debug(|_, _, _| {});
        engine
    })
}

/// Decides whether an overlay applies to the given facts.
#[derive(Clone)]
pub enum Predicate {
    Always,
    Matches(FactPattern),
    Expression(Expression),
    Custom(Arc<dyn Fn(&PlatformFacts) -> bool + Send + Sync>),
}

impl Predicate {
    pub fn custom(f: impl Fn(&PlatformFacts) -> bool + Send + Sync + 'static) -> Self {
        Predicate::Custom(Arc::new(f))
    }

    fn test(&self, dependency: &str, facts: &PlatformFacts) -> Result<bool, OverlayError> {
        match self {
            Predicate::Always => Ok(true),
            Predicate::Matches(pattern) => Ok(pattern.matches(facts)),
            Predicate::Expression(expr) => expr.eval(facts).map_err(|message| OverlayError::Predicate {
                dependency: dependency.to_string(),
                message,
            }),
            Predicate::Custom(f) => Ok(f(facts)),
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Always => write!(f, "Always"),
            Predicate::Matches(p) => f.debug_tuple("Matches").field(p).finish(),
            Predicate::Expression(e) => f.debug_tuple("Expression").field(&e.source).finish(),
            Predicate::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// One declared overlay.
#[derive(Debug, Clone)]
pub struct OverlayRule {
    pub dependency: String,
    pub predicate: Predicate,
    pub options: OptionMap,
}

/// Overlay rules in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Overlays {
    rules: Vec<OverlayRule>,
}

impl Overlays {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare<K, V>(
        &mut self,
        dependency: impl Into<String>,
        predicate: Predicate,
        options: impl IntoIterator<Item = (K, V)>,
    ) where
        K: Into<String>,
        V: Into<OptionValue>,
    {
        self.rules.push(OverlayRule {
            dependency: dependency.into(),
            predicate,
            options: options
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        });
    }

    pub fn rules(&self) -> &[OverlayRule] {
        &self.rules
    }

    /// Apply every matching rule in order; later matches win per key.
    ///
    /// Every dependency named by a rule gets an entry, empty if nothing matched.
    pub fn evaluate(&self, facts: &PlatformFacts) -> Result<ResolvedOptions, OverlayError> {
        let mut resolved: BTreeMap<String, OptionMap> = BTreeMap::new();

        for rule in &self.rules {
            let entry = resolved.entry(rule.dependency.clone()).or_default();
            if rule.predicate.test(&rule.dependency, facts)? {
                for (key, value) in &rule.options {
                    entry.insert(key.clone(), value.clone());
                }
            }
        }

        Ok(ResolvedOptions(resolved))
    }
}

/// Dependency name to its effective options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedOptions(BTreeMap<String, OptionMap>);

impl ResolvedOptions {
    /// Options for `dependency`; empty when nothing applies.
    pub fn options_for(&self, dependency: &str) -> &OptionMap {
        self.0.get(dependency).unwrap_or(&EMPTY_OPTIONS)
    }

    pub fn get(&self, dependency: &str, key: &str) -> Option<&OptionValue> {
        self.options_for(dependency).get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &OptionMap)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeMap::is_empty)
    }
}
