//! # rulescore-core
//!
//! Deterministic rule-based risk scoring for recorded conversations.
//!
//! A transcript (ordered user/assistant turns) is evaluated against a
//! declarative ruleset. The result is a bounded score and an evidence trail of
//! which rules fired, on which turn, and on what text.
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same input always produces same output
//! 2. **Bounded**: The total is always clamped into `[0, 100]`
//! 3. **Traceable**: Every point cites a rule id, turn index and evidence
//! 4. **Fail-fast**: Invalid rulesets are rejected before scoring starts
//!
//! ## Example
//!
//! ```rust,ignore
//! use rulescore_core::{Report, Ruleset, Transcript};
//!
//! let ruleset = Ruleset::from_yaml_file("rulesets/trajectory_v1.yaml")?;
//! let transcript = Transcript::from_jsonl_file("transcripts/conversation_safe.jsonl")?;
//! let result = rulescore_core::evaluate(&transcript, &ruleset)?;
//!
//! println!("{}", Report::build(transcript.turns(), &result).render_text());
//! ```

pub mod engine;
pub mod pattern;
pub mod report;
pub mod ruleset;
pub mod transcript;
pub mod types;

// Re-export main types at crate root
pub use engine::{score, IndependentOutcome, ScoringEngine};
pub use pattern::{LiteralPattern, Pattern, RegexPattern};
pub use report::{Report, ReportEntry};
pub use ruleset::{
    compile, CompiledRule, CompiledRuleset, RuleCompilationError, RuleDeclaration, Ruleset,
    RulesetError,
};
pub use transcript::{Transcript, TranscriptLoadError};
pub use types::{FiredRecord, Role, ScoreResult, Turn, UnknownRole};

use thiserror::Error;

/// Errors that can occur during evaluation
#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error("Ruleset error: {0}")]
    Ruleset(#[from] RulesetError),

    #[error("Rule compilation failed: {0}")]
    Compilation(#[from] RuleCompilationError),

    #[error("Transcript error: {0}")]
    Transcript(#[from] TranscriptLoadError),
}

/// Compile `ruleset` and score `transcript` against it.
///
/// Compilation failures surface here; scoring itself cannot fail.
pub fn evaluate(transcript: &Transcript, ruleset: &Ruleset) -> Result<ScoreResult, EvaluationError> {
    let compiled = ruleset.compile()?;
    Ok(score(transcript.turns(), &compiled))
}

/// Load both inputs from their text encodings and evaluate.
///
/// `ruleset_yaml` is a YAML (or JSON) ruleset document; `transcript_jsonl`
/// holds one JSON turn per line.
pub fn evaluate_str(ruleset_yaml: &str, transcript_jsonl: &str) -> Result<ScoreResult, EvaluationError> {
    let ruleset = Ruleset::from_yaml(ruleset_yaml)?;
    let transcript = Transcript::from_jsonl(transcript_jsonl)?;
    evaluate(&transcript, &ruleset)
}
