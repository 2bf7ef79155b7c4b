//! Scoring engine: runs a compiled ruleset over a transcript.
//!
//! Evaluation is a two-stage pipeline:
//! 1. **Independent pass** over every turn, producing an [`IndependentOutcome`]
//!    (fired records plus the turns at which each rule fired).
//! 2. **Dependent pass**, which reads only the completed outcome and scans a
//!    bounded window after each firing of a rule's dependency.
//!
//! The outcome value is the barrier between the two passes: dependent rules
//! never see partial independent results, and never trigger off each other.
//!
//! Aggregation then sums points, clamps to `[MIN_SCORE, MAX_SCORE]` and sorts
//! records by `(turn_index, rule_id)`, so results do not depend on rule
//! declaration order.

use std::collections::BTreeMap;
use tracing::{debug, trace};

use crate::ruleset::{CompiledRule, CompiledRuleset};
use crate::types::{FiredRecord, ScoreResult, Turn};

/// Result of the independent pass.
#[derive(Debug, Clone, Default)]
pub struct IndependentOutcome<'r> {
    fired: Vec<FiredRecord>,
    fired_by_id: BTreeMap<&'r str, Vec<usize>>,
}

impl<'r> IndependentOutcome<'r> {
    /// Turn indices at which `rule_id` fired, in transcript order.
    pub fn fired_at(&self, rule_id: &str) -> &[usize] {
        self.fired_by_id
            .get(rule_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Records produced by the independent pass, in discovery order.
    pub fn records(&self) -> &[FiredRecord] {
        &self.fired
    }

    pub fn into_records(self) -> Vec<FiredRecord> {
        self.fired
    }
}

/// The scoring engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringEngine;

impl ScoringEngine {
    /// Lower bound of the total score.
    pub const MIN_SCORE: i64 = 0;

    /// Upper bound of the total score.
    pub const MAX_SCORE: i64 = 100;

    /// Maximum evidence length, in characters.
    pub const EVIDENCE_MAX_CHARS: usize = 180;

    pub fn new() -> Self {
        Self
    }

    /// Score `turns` against `ruleset`.
    ///
    /// Total: there is no failure path. An empty transcript or ruleset yields
    /// `total = 0` and no records.
    pub fn score(&self, turns: &[Turn], ruleset: &CompiledRuleset) -> ScoreResult {
        let outcome = self.independent_pass(turns, ruleset);
        let dependent = self.dependent_pass(turns, ruleset, &outcome);

        let mut fired = outcome.into_records();
        fired.extend(dependent);

        let result = self.aggregate(fired);
        debug!(
            turns = turns.len(),
            fired = result.fired.len(),
            total = result.total,
            "Scored transcript"
        );
        result
    }

    /// Pass 1: every independent rule against every turn of its role.
    ///
    /// A rule fires at most once per turn, on its first matching pattern.
    pub fn independent_pass<'r>(
        &self,
        turns: &[Turn],
        ruleset: &'r CompiledRuleset,
    ) -> IndependentOutcome<'r> {
        let mut outcome = IndependentOutcome::default();

        for (i, turn) in turns.iter().enumerate() {
            for rule in ruleset.independent() {
                if !rule.applies_to(turn.role) {
                    continue;
                }
                if let Some(matched) = rule.first_match(&turn.text) {
                    trace!(rule_id = %rule.id, turn = i, "Independent rule fired");
                    outcome.fired.push(fired_record(rule, i, matched));
                    outcome.fired_by_id.entry(rule.id.as_str()).or_default().push(i);
                }
            }
        }

        debug!(fired = outcome.fired.len(), "Independent pass complete");
        outcome
    }

    /// Pass 2: dependent rules, each scanning forward from every firing of
    /// its dependency.
    ///
    /// For a dependency firing at `k`, turns `k + 1 ..= k + window_turns + 1`
    /// are eligible. The first turn with a matching role and pattern fires the
    /// rule once for that occurrence; role mismatches still use up the window.
    pub fn dependent_pass(
        &self,
        turns: &[Turn],
        ruleset: &CompiledRuleset,
        outcome: &IndependentOutcome<'_>,
    ) -> Vec<FiredRecord> {
        let mut fired = Vec::new();

        for rule in ruleset.dependent() {
            let Some(dep) = rule.depends_on.as_deref() else {
                continue;
            };

            for &dep_i in outcome.fired_at(dep) {
                if let Some((j, matched)) = scan_window(turns, rule, dep_i) {
                    trace!(rule_id = %rule.id, depends_on = dep, dep_turn = dep_i, turn = j, "Dependent rule fired");
                    fired.push(fired_record(rule, j, matched));
                }
            }
        }

        debug!(fired = fired.len(), "Dependent pass complete");
        fired
    }

    /// Sum, clamp and order fired records.
    pub fn aggregate(&self, mut fired: Vec<FiredRecord>) -> ScoreResult {
        let sum = fired
            .iter()
            .fold(0i64, |acc, r| acc.saturating_add(r.points));
        let total = sum.clamp(Self::MIN_SCORE, Self::MAX_SCORE) as u32;

        fired.sort_by(|a, b| {
            a.turn_index
                .cmp(&b.turn_index)
                .then_with(|| a.rule_id.cmp(&b.rule_id))
        });

        ScoreResult { total, fired }
    }
}

/// Score `turns` against `ruleset` with the default engine.
pub fn score(turns: &[Turn], ruleset: &CompiledRuleset) -> ScoreResult {
    ScoringEngine::new().score(turns, ruleset)
}

/// First qualifying turn in the window after `dep_i`.
fn scan_window<'t>(
    turns: &'t [Turn],
    rule: &CompiledRule,
    dep_i: usize,
) -> Option<(usize, &'t str)> {
    let start = dep_i.saturating_add(1);
    let end = dep_i
        .saturating_add(rule.window_turns as usize)
        .saturating_add(2)
        .min(turns.len());

    (start..end).find_map(|j| {
        let turn = &turns[j];
        if !rule.applies_to(turn.role) {
            return None;
        }
        rule.first_match(&turn.text).map(|m| (j, m))
    })
}

fn fired_record(rule: &CompiledRule, turn_index: usize, matched: &str) -> FiredRecord {
    FiredRecord {
        rule_id: rule.id.clone(),
        name: rule.name.clone(),
        points: rule.points,
        turn_index,
        evidence: truncate_chars(matched, ScoringEngine::EVIDENCE_MAX_CHARS).to_string(),
    }
}

/// Prefix of `s` holding at most `max` characters.
pub(crate) fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((byte, _)) => &s[..byte],
        None => s,
    }
}
