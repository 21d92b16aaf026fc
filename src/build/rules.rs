//! Named build rules.
//!
//! A rule is a list of dependencies (other rules or plain files) plus shell
//! commands. File rules name a real file whose timestamp decides whether the
//! commands need to run; logical rules always run when reached.
//!
//! Rules execute strictly sequentially, dependencies first. Each resolution
//! pass tracks which rules are in progress so a dependency cycle becomes an
//! error naming the rule where the cycle closes.

use crate::config::TargetOs;
use crate::graph::{modified_time, normalize_path};
use crate::process::ProcessRunner;
use anyhow::{Context, Result};
use colored::*;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::SystemTime;
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleVariant {
    pub dependencies: Vec<String>,
    pub commands: Vec<String>,
    pub is_file: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub name: String,
    pub windows: RuleVariant,
    pub unix: RuleVariant,
}

impl Rule {
    /// A rule that behaves the same on every OS.
    pub fn shared(name: &str, variant: RuleVariant) -> Self {
        Self {
            name: name.to_string(),
            windows: variant.clone(),
            unix: variant,
        }
    }

    pub fn variant(&self, os: TargetOs) -> &RuleVariant {
        if os.is_windows() {
            &self.windows
        } else {
            &self.unix
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: BTreeMap<String, Rule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, rule: Rule) {
        self.rules.insert(rule.name.clone(), rule);
    }

    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.get(name)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Look a rule up by name, or by path for file rules: `out/../out/a.txt`
    /// finds the file rule `out/a.txt`.
    pub fn find(&self, name: &str, os: TargetOs, root: &Path) -> Option<&Rule> {
        if let Some(rule) = self.rules.get(name) {
            return Some(rule);
        }
        let wanted = normalize_path(root, Path::new(name));
        self.rules.values().find(|rule| {
            rule.variant(os).is_file && normalize_path(root, Path::new(&rule.name)) == wanted
        })
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleError {
    #[error("circular dependency on rule '{rule}': {}", .cycle.join(" -> "))]
    Circular { rule: String, cycle: Vec<String> },

    #[error("'{name}' is not a rule name or a file")]
    Unknown { name: String },
}

/// Result of running one rule (with its dependencies) or a list of rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOutcome {
    pub exit_code: i32,
    /// Whether any rule along the way decided to run its commands.
    pub any_run: bool,
    /// Newest timestamp produced: the rule's file, or its dependencies'.
    /// `None` for a logical rule with nothing behind it.
    pub last_update: Option<SystemTime>,
}

impl RuleOutcome {
    fn ok(last_update: Option<SystemTime>) -> Self {
        Self {
            exit_code: 0,
            any_run: false,
            last_update,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, Clone)]
enum VisitState {
    Resolving,
    Resolved(RuleOutcome),
}

/// Runs rules for one build invocation.
pub struct RuleEngine<'a> {
    rules: &'a RuleSet,
    os: TargetOs,
    root: &'a Path,
    config_modified: SystemTime,
    runner: &'a dyn ProcessRunner,
    force: bool,
    states: HashMap<String, VisitState>,
    stack: Vec<String>,
}

impl<'a> RuleEngine<'a> {
    pub fn new(
        rules: &'a RuleSet,
        os: TargetOs,
        root: &'a Path,
        config_modified: SystemTime,
        runner: &'a dyn ProcessRunner,
    ) -> Self {
        Self {
            rules,
            os,
            root,
            config_modified,
            runner,
            force: false,
            states: HashMap::new(),
            stack: Vec::new(),
        }
    }

    /// Run file rules even when their file is up to date.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Run `names` in order for build point `point` (e.g. `pre-build`).
    ///
    /// `last_update` is the newest time any of the rules produced, not counting
    /// the configuration time. The first nonzero exit code stops the list. Unknown names that are neither rules nor files
    /// are an error unless `error_on_unknown` is off.
    pub fn run_rules(&mut self, point: &str, names: &[String], error_on_unknown: bool) -> Result<RuleOutcome> {
        self.states.clear();

        let mut total = RuleOutcome::ok(None);
        for name in names {
            let outcome = self
                .resolve(Some(point), name, error_on_unknown)
                .with_context(|| format!("while running {} rules", point))?;
            total.any_run |= outcome.any_run;
            total.last_update = total.last_update.max(outcome.last_update);
            if !outcome.success() {
                total.exit_code = outcome.exit_code;
                break;
            }
        }
        Ok(total)
    }

    /// Run a single rule and its dependencies.
    pub fn run_rule(&mut self, name: &str) -> Result<RuleOutcome> {
        self.states.clear();
        self.resolve(None, name, true)
    }

    fn resolve(&mut self, point: Option<&str>, name: &str, error_on_unknown: bool) -> Result<RuleOutcome> {
        let rules = self.rules;
        let Some(rule) = rules.find(name, self.os, self.root) else {
            let path = normalize_path(self.root, Path::new(name));
            return match modified_time(&path) {
                Some(time) => Ok(RuleOutcome::ok(Some(time))),
                None if error_on_unknown => Err(RuleError::Unknown {
                    name: name.to_string(),
                }
                .into()),
                None => Ok(RuleOutcome::ok(None)),
            };
        };

        match self.states.get(&rule.name) {
            Some(VisitState::Resolved(outcome)) => return Ok(outcome.clone()),
            Some(VisitState::Resolving) => {
                let start = self
                    .stack
                    .iter()
                    .position(|r| r == &rule.name)
                    .unwrap_or(0);
                let mut cycle: Vec<String> = self.stack[start..].to_vec();
                cycle.push(rule.name.clone());
                return Err(RuleError::Circular {
                    rule: rule.name.clone(),
                    cycle,
                }
                .into());
            }
            None => {}
        }

        self.states.insert(rule.name.clone(), VisitState::Resolving);
        self.stack.push(rule.name.clone());
        let result = self.execute(point, name, rule, error_on_unknown);
        self.stack.pop();

        match result {
            Ok(outcome) => {
                self.states
                    .insert(rule.name.clone(), VisitState::Resolved(outcome.clone()));
                Ok(outcome)
            }
            Err(e) => {
                self.states.remove(&rule.name);
                Err(e)
            }
        }
    }

    fn execute(
        &mut self,
        point: Option<&str>,
        requested: &str,
        rule: &Rule,
        error_on_unknown: bool,
    ) -> Result<RuleOutcome> {
        let variant = rule.variant(self.os);
        let path = normalize_path(self.root, Path::new(&rule.name));
        let file_time = if variant.is_file {
            modified_time(&path)
        } else {
            None
        };

        let mut outcome = RuleOutcome::ok(file_time);

        // 1. Dependencies first
        for dependency in &variant.dependencies {
            let dep = self
                .resolve(None, dependency, error_on_unknown)
                .with_context(|| format!("required by rule '{}'", rule.name))?;
            outcome.any_run |= dep.any_run;
            outcome.last_update = outcome.last_update.max(dep.last_update);
            if !dep.success() {
                outcome.exit_code = dep.exit_code;
                return Ok(outcome);
            }
        }

        // 2. Decide whether to run
        let baseline = outcome.last_update.max(Some(self.config_modified));
        let should_run = !variant.is_file
            || self.force
            || match file_time {
                None => true,
                Some(time) => Some(time) < baseline,
            };
        if !should_run {
            return Ok(outcome);
        }

        // 3. Commands in order, first failure stops
        outcome.any_run = true;
        for command in &variant.commands {
            match point {
                Some(point) => println!(
                    "   {} running {} rule '{}': {}",
                    "📜".magenta(),
                    point,
                    requested,
                    command.dimmed()
                ),
                None => println!(
                    "   {} running rule '{}': {}",
                    "📜".magenta(),
                    requested,
                    command.dimmed()
                ),
            }

            let output = self
                .runner
                .run_shell(command, false)
                .with_context(|| format!("Failed to run command for rule '{}'", rule.name))?;
            if !output.success() {
                outcome.exit_code = output.exit_code;
                return Ok(outcome);
            }
        }

        if variant.is_file
            && let Some(time) = modified_time(&path)
        {
            outcome.last_update = outcome.last_update.max(Some(time));
        }
        Ok(outcome)
    }
}
