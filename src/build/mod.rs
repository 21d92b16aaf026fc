mod clean;
mod core;
mod feedback;
pub mod invocation;
pub mod layout;
pub mod rules;
pub mod scheduler;
pub mod staleness;
pub mod utils;

pub use clean::clean;
pub use self::core::{BuildOptions, BuildOutcome, build_and_run, build_project, run_named_rule};
pub use feedback::FeedbackAnalyzer;
pub use layout::BuildLayout;
pub use rules::{Rule, RuleEngine, RuleError, RuleOutcome, RuleSet, RuleVariant};
pub use scheduler::{CompileResult, Scheduler};
pub use staleness::{RebuildReason, should_recompile};
