//! Rule compilation: declarations into executable rules.
//!
//! Compilation is all-or-nothing. Any invalid declaration fails the whole
//! ruleset; no partial ruleset is ever returned.

use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

use super::parser::RuleDeclaration;
use crate::pattern::{Pattern, RegexPattern};
use crate::types::Role;

/// Errors raised while compiling rule declarations.
#[derive(Error, Debug)]
pub enum RuleCompilationError {
    #[error("Rule {rule_id}: invalid pattern {pattern:?}")]
    InvalidPattern {
        rule_id: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Rule at position {position} has an empty id")]
    EmptyRuleId { position: usize },

    #[error("Duplicate rule ID: {rule_id}")]
    DuplicateRuleId { rule_id: String },

    #[error("Rule {rule_id} depends on {depends_on}, which is itself a dependent rule")]
    ChainedDependency { rule_id: String, depends_on: String },
}

/// A rule ready for evaluation.
#[derive(Debug)]
pub struct CompiledRule {
    pub id: String,
    pub name: String,
    pub points: i64,
    pub applies_to: Role,
    pub patterns: Vec<Box<dyn Pattern>>,
    pub depends_on: Option<String>,
    pub window_turns: u32,
}

impl CompiledRule {
    /// Build a rule from already constructed matchers.
    pub fn with_patterns(
        id: impl Into<String>,
        applies_to: Role,
        points: i64,
        patterns: Vec<Box<dyn Pattern>>,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            points,
            applies_to,
            patterns,
            depends_on: None,
            window_turns: 0,
        }
    }

    pub fn is_dependent(&self) -> bool {
        self.depends_on.is_some()
    }

    pub fn applies_to(&self, role: Role) -> bool {
        self.applies_to == role
    }

    /// First pattern match in `text`, trying patterns in declared order.
    pub fn first_match<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.patterns.iter().find_map(|p| p.find_first(text))
    }
}

/// Compiled rules in declaration order, indexed by id.
#[derive(Debug, Default)]
pub struct CompiledRuleset {
    rules: Vec<CompiledRule>,
    index: BTreeMap<String, usize>,
}

impl CompiledRuleset {
    /// Assemble a ruleset from compiled rules.
    ///
    /// Rejects empty and duplicate ids and chained dependencies. [`compile`]
    /// relies on this for its structural checks.
    pub fn from_rules(rules: Vec<CompiledRule>) -> Result<Self, RuleCompilationError> {
        let mut index = BTreeMap::new();
        for (position, rule) in rules.iter().enumerate() {
            if rule.id.trim().is_empty() {
                return Err(RuleCompilationError::EmptyRuleId { position });
            }
            if index.insert(rule.id.clone(), position).is_some() {
                return Err(RuleCompilationError::DuplicateRuleId {
                    rule_id: rule.id.clone(),
                });
            }
        }

        let ruleset = Self { rules, index };
        ruleset.validate_dependencies()?;
        Ok(ruleset)
    }

    /// Dependencies may only point at independent rules. A dependency on an
    /// unknown id is allowed; that rule can never fire.
    fn validate_dependencies(&self) -> Result<(), RuleCompilationError> {
        for rule in self.dependent() {
            let Some(dep) = rule.depends_on.as_deref() else {
                continue;
            };
            match self.get(dep) {
                Some(target) if target.is_dependent() => {
                    return Err(RuleCompilationError::ChainedDependency {
                        rule_id: rule.id.clone(),
                        depends_on: dep.to_string(),
                    });
                }
                Some(_) => {}
                None => {
                    warn!(rule_id = %rule.id, depends_on = dep, "Dependency not in ruleset, rule will never fire");
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&CompiledRule> {
        self.index.get(id).map(|&i| &self.rules[i])
    }

    /// All rules in declaration order.
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    pub fn independent(&self) -> impl Iterator<Item = &CompiledRule> {
        self.rules.iter().filter(|r| !r.is_dependent())
    }

    pub fn dependent(&self) -> impl Iterator<Item = &CompiledRule> {
        self.rules.iter().filter(|r| r.is_dependent())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Compile rule declarations.
///
/// Fails on the first invalid pattern, empty or duplicate id, or a dependency
/// on a rule that is itself dependent.
pub fn compile(declarations: &[RuleDeclaration]) -> Result<CompiledRuleset, RuleCompilationError> {
    let rules = declarations
        .iter()
        .map(compile_rule)
        .collect::<Result<Vec<_>, _>>()?;

    let ruleset = CompiledRuleset::from_rules(rules)?;
    debug!(
        rules = ruleset.len(),
        dependent = ruleset.dependent().count(),
        "Compiled ruleset"
    );
    Ok(ruleset)
}

fn compile_rule(decl: &RuleDeclaration) -> Result<CompiledRule, RuleCompilationError> {
    let patterns = decl
        .patterns
        .iter()
        .map(|p| {
            RegexPattern::new(p)
                .map(|re| Box::new(re) as Box<dyn Pattern>)
                .map_err(|source| RuleCompilationError::InvalidPattern {
                    rule_id: decl.id.clone(),
                    pattern: p.clone(),
                    source,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CompiledRule {
        id: decl.id.clone(),
        name: decl.name.clone().unwrap_or_else(|| decl.id.clone()),
        points: decl.points,
        applies_to: decl.applies_to,
        patterns,
        depends_on: decl.depends_on.clone(),
        window_turns: decl.window_turns,
    })
}
