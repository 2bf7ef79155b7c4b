//! Ruleset loading and compilation.
//!
//! Rulesets are declarative YAML/JSON documents with a top-level `rules:`
//! list. This module parses them into [`RuleDeclaration`]s and compiles those
//! into a [`CompiledRuleset`] the scoring engine can run.

mod compiler;
mod parser;

pub use compiler::{compile, CompiledRule, CompiledRuleset, RuleCompilationError};
pub use parser::{RuleDeclaration, Ruleset, RulesetError};
