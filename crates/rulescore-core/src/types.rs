//! Core types for rulescore evaluation.
//!
//! These are the data structures shared by the compiler, the scoring engine
//! and the report layer: participant roles, transcript turns, fired-rule
//! records and the final score.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Participant role attached to every turn.
///
/// `User` is the primary human role and the default `applies_to` of a rule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a role string is not one of the recognized roles.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown role {0:?}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    /// Case-insensitive, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// One attributed message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }
}

/// A single concrete match of a rule against a specific turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FiredRecord {
    /// Rule ID (e.g., "R001")
    pub rule_id: String,

    /// Human-readable rule name
    pub name: String,

    /// Points contributed by this firing
    pub points: i64,

    /// 0-based index of the matched turn
    pub turn_index: usize,

    /// Matched substring, truncated to the evidence limit
    pub evidence: String,
}

/// Result of scoring a transcript against a compiled ruleset.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreResult {
    /// Clamped total in `[0, 100]`
    pub total: u32,

    /// Fired records ordered by `(turn_index, rule_id)`
    pub fired: Vec<FiredRecord>,
}

impl ScoreResult {
    /// Whether no rule fired.
    pub fn is_empty(&self) -> bool {
        self.fired.is_empty()
    }

    /// Unclamped sum of points across every fired record.
    pub fn raw_points(&self) -> i64 {
        self.fired
            .iter()
            .fold(0i64, |acc, r| acc.saturating_add(r.points))
    }

    /// Distinct rule ids that fired, in sorted order.
    pub fn fired_rule_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.fired.iter().map(|r| r.rule_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_is_case_insensitive() {
        assert_eq!(" USER ".parse::<Role>().unwrap(), Role::User);
        assert_eq!("Assistant".parse::<Role>().unwrap(), Role::Assistant);
        assert_eq!(
            "system".parse::<Role>(),
            Err(UnknownRole("system".to_string()))
        );
    }

    #[test]
    fn test_unknown_role_is_an_error() {
        let err: Box<dyn std::error::Error> = Box::new(UnknownRole("narrator".to_string()));
        assert_eq!(err.to_string(), "unknown role \"narrator\"");
    }

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
        let role: Role = serde_yaml::from_str("user").unwrap();
        assert_eq!(role, Role::User);
    }

    #[test]
    fn test_fired_rule_ids_dedup() {
        let record = |id: &str, turn: usize| FiredRecord {
            rule_id: id.to_string(),
            name: id.to_string(),
            points: 5,
            turn_index: turn,
            evidence: String::new(),
        };
        let result = ScoreResult {
            total: 15,
            fired: vec![record("R002", 0), record("R001", 1), record("R002", 2)],
        };
        assert_eq!(result.fired_rule_ids(), vec!["R001", "R002"]);
        assert_eq!(result.raw_points(), 15);
    }
}
