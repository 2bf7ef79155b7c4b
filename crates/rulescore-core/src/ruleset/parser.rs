//! Ruleset parsing from YAML/JSON.

use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use super::compiler::{compile, CompiledRuleset, RuleCompilationError};
use crate::types::Role;

/// Errors that can occur when loading a ruleset document.
#[derive(Error, Debug)]
pub enum RulesetError {
    #[error("Failed to read ruleset file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A single rule as declared in a ruleset document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleDeclaration {
    /// Unique identifier (e.g., "R001")
    pub id: String,

    /// Display name, defaults to the id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Points added to the total each time the rule fires
    #[serde(default)]
    pub points: i64,

    /// Role whose turns the rule inspects
    #[serde(default)]
    pub applies_to: Role,

    /// Regular expressions, tried in order
    #[serde(default)]
    pub patterns: Vec<String>,

    /// Rule that must fire first; an empty string counts as absent
    #[serde(
        default,
        deserialize_with = "non_empty_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub depends_on: Option<String>,

    /// Extra turns of slack after the immediately following turn
    #[serde(default)]
    pub window_turns: u32,
}

fn non_empty_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

impl RuleDeclaration {
    /// Independent rule with the given patterns.
    pub fn new(id: impl Into<String>, applies_to: Role, points: i64, patterns: &[&str]) -> Self {
        Self {
            id: id.into(),
            name: None,
            points,
            applies_to,
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            depends_on: None,
            window_turns: 0,
        }
    }

    /// Make this rule dependent on `rule_id` with the given window.
    pub fn depending_on(mut self, rule_id: impl Into<String>, window_turns: u32) -> Self {
        self.depends_on = Some(rule_id.into());
        self.window_turns = window_turns;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Whether the rule waits on another rule.
    pub fn is_dependent(&self) -> bool {
        self.depends_on.is_some()
    }
}

/// A ruleset document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ruleset {
    /// Version label of this ruleset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Human-readable name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Detailed description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Rule declarations in document order
    #[serde(default)]
    pub rules: Vec<RuleDeclaration>,
}

impl Ruleset {
    pub fn new(rules: Vec<RuleDeclaration>) -> Self {
        Self {
            rules,
            ..Self::default()
        }
    }

    /// Parse a ruleset from YAML string.
    ///
    /// An empty document yields an empty ruleset.
    pub fn from_yaml(yaml: &str) -> Result<Self, RulesetError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Parse a ruleset from JSON string.
    pub fn from_json(json: &str) -> Result<Self, RulesetError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse a ruleset from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, RulesetError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse a ruleset from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RulesetError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Parse a ruleset file, choosing the format from its extension.
    ///
    /// `.json` is read as JSON, anything else as YAML.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RulesetError> {
        let path = path.as_ref();
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            Self::from_json_file(path)
        } else {
            Self::from_yaml_file(path)
        }
    }

    /// Compile the declarations into executable rules.
    pub fn compile(&self) -> Result<CompiledRuleset, RuleCompilationError> {
        compile(&self.rules)
    }

    /// Rules with no dependency.
    pub fn independent_rules(&self) -> impl Iterator<Item = &RuleDeclaration> {
        self.rules.iter().filter(|r| !r.is_dependent())
    }

    /// Rules conditioned on another rule.
    pub fn dependent_rules(&self) -> impl Iterator<Item = &RuleDeclaration> {
        self.rules.iter().filter(|r| r.is_dependent())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_RULESET: &str = r#"
version: "1"
name: "Test Ruleset"
rules:
  - id: "R001"
    name: "Turning point"
    points: 30
    applies_to: user
    patterns:
      - "(?i)give up"
  - id: "R011"
    points: 20
    applies_to: assistant
    depends_on: "R001"
    window_turns: 1
    patterns:
      - "(?i)here it is"
"#;

    #[test]
    fn test_parse_valid_ruleset() {
        let ruleset = Ruleset::from_yaml(VALID_RULESET).unwrap();
        assert_eq!(ruleset.name.as_deref(), Some("Test Ruleset"));
        assert_eq!(ruleset.rules.len(), 2);
        assert_eq!(ruleset.independent_rules().count(), 1);
        assert_eq!(ruleset.dependent_rules().count(), 1);

        let dep = &ruleset.rules[1];
        assert_eq!(dep.depends_on.as_deref(), Some("R001"));
        assert_eq!(dep.window_turns, 1);
        assert_eq!(dep.applies_to, Role::Assistant);
    }

    #[test]
    fn test_defaults_applied() {
        let yaml = r#"
rules:
  - id: "R100"
"#;
        let ruleset = Ruleset::from_yaml(yaml).unwrap();
        let rule = &ruleset.rules[0];
        assert_eq!(rule.name, None);
        assert_eq!(rule.points, 0);
        assert_eq!(rule.applies_to, Role::User);
        assert!(rule.patterns.is_empty());
        assert_eq!(rule.depends_on, None);
        assert_eq!(rule.window_turns, 0);
    }

    #[test]
    fn test_empty_depends_on_is_independent() {
        let yaml = r#"
rules:
  - id: "R001"
    depends_on: ""
  - id: "R002"
    depends_on: ~
"#;
        let ruleset = Ruleset::from_yaml(yaml).unwrap();
        assert!(ruleset.rules.iter().all(|r| !r.is_dependent()));
    }

    #[test]
    fn test_missing_id_rejected() {
        let yaml = r#"
rules:
  - name: "No id"
"#;
        assert!(matches!(
            Ruleset::from_yaml(yaml),
            Err(RulesetError::YamlError(_))
        ));
    }

    #[test]
    fn test_negative_window_rejected() {
        let yaml = r#"
rules:
  - id: "R001"
    window_turns: -1
"#;
        assert!(Ruleset::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_unknown_role_rejected() {
        let yaml = r#"
rules:
  - id: "R001"
    applies_to: system
"#;
        assert!(Ruleset::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_empty_document() {
        assert!(Ruleset::from_yaml("").unwrap().rules.is_empty());
        assert!(Ruleset::from_yaml("name: empty\n").unwrap().rules.is_empty());
    }

    #[test]
    fn test_parse_json() {
        let json = r#"{"rules": [{"id": "R001", "points": 5, "patterns": ["x"]}]}"#;
        let ruleset = Ruleset::from_json(json).unwrap();
        assert_eq!(ruleset.rules[0].points, 5);
        assert!(matches!(
            Ruleset::from_json("{"),
            Err(RulesetError::JsonError(_))
        ));
    }
}
