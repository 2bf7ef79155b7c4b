//! Transcript loading from JSONL.
//!
//! Each non-blank line is a JSON object such as
//! `{"role": "user", "content": "text here"}`. Roles are case-insensitive;
//! text is read from `content` (or `text`) and trimmed.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::ops::Index;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::types::{Role, Turn};

/// Errors raised while loading a transcript.
#[derive(Error, Debug)]
pub enum TranscriptLoadError {
    #[error("Failed to read transcript file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid JSON at line {line}: {source}")]
    JsonError {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Line {line} is not a JSON object")]
    NotAnObject { line: usize },

    #[error("Invalid role at line {line}: {role:?}")]
    InvalidRole { line: usize, role: String },
}

/// An ordered, immutable sequence of turns.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new(turns: Vec<Turn>) -> Self {
        Self { turns }
    }

    /// Parse JSONL text into a transcript.
    pub fn from_jsonl(input: &str) -> Result<Self, TranscriptLoadError> {
        let mut turns = Vec::new();

        for (idx, raw) in input.lines().enumerate() {
            let line = idx + 1;
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }

            let value: Value = serde_json::from_str(raw)
                .map_err(|source| TranscriptLoadError::JsonError { line, source })?;
            let obj = value
                .as_object()
                .ok_or(TranscriptLoadError::NotAnObject { line })?;

            let role_raw = obj.get("role").map(value_to_text).unwrap_or_default();
            let role: Role = role_raw.parse().map_err(|_| TranscriptLoadError::InvalidRole {
                line,
                role: role_raw.trim().to_lowercase(),
            })?;

            let text = obj
                .get("content")
                .filter(|v| !v.is_null())
                .or_else(|| obj.get("text").filter(|v| !v.is_null()))
                .map(value_to_text)
                .unwrap_or_default();

            turns.push(Turn::new(role, text.trim()));
        }

        debug!(turns = turns.len(), "Loaded transcript");
        Ok(Self { turns })
    }

    /// Load a JSONL transcript file.
    pub fn from_jsonl_file(path: impl AsRef<Path>) -> Result<Self, TranscriptLoadError> {
        let contents = fs::read_to_string(path)?;
        Self::from_jsonl(&contents)
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn get(&self, index: usize) -> Option<&Turn> {
        self.turns.get(index)
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Turn> {
        self.turns.iter()
    }
}

impl From<Vec<Turn>> for Transcript {
    fn from(turns: Vec<Turn>) -> Self {
        Self::new(turns)
    }
}

impl FromIterator<Turn> for Transcript {
    fn from_iter<I: IntoIterator<Item = Turn>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl Index<usize> for Transcript {
    type Output = Turn;

    fn index(&self, index: usize) -> &Turn {
        &self.turns[index]
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Turn;
    type IntoIter = std::slice::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}

/// Strings are taken verbatim; other scalars use their JSON rendering.
fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
