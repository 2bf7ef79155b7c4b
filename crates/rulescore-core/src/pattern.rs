//! Pattern matchers used by compiled rules.
//!
//! The scoring engine only needs "find the first match in this text", so
//! matchers sit behind the [`Pattern`] trait. The compiler builds
//! [`RegexPattern`]s from ruleset pattern strings; [`LiteralPattern`] covers
//! plain substring rules built in code.

use regex::{Regex, RegexBuilder};
use std::fmt::Debug;

/// A text matcher.
pub trait Pattern: Send + Sync + Debug {
    /// Return the first matching substring of `text`, if any.
    fn find_first<'t>(&self, text: &'t str) -> Option<&'t str>;

    /// The pattern as written in the ruleset.
    fn source(&self) -> &str;
}

/// Unanchored regular-expression search.
#[derive(Debug, Clone)]
pub struct RegexPattern {
    regex: Regex,
}

impl RegexPattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }
}

impl Pattern for RegexPattern {
    fn find_first<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.regex.find(text).map(|m| m.as_str())
    }

    fn source(&self) -> &str {
        self.regex.as_str()
    }
}

/// Plain substring search.
#[derive(Debug, Clone)]
pub struct LiteralPattern {
    literal: String,
    // Only set for case-insensitive literals.
    folded: Option<Regex>,
}

impl LiteralPattern {
    /// Case-sensitive literal.
    pub fn new(literal: impl Into<String>) -> Self {
        Self {
            literal: literal.into(),
            folded: None,
        }
    }

    /// Case-insensitive literal. Matching is delegated to an escaped regex so
    /// the returned slice always points into the original text.
    ///
    /// Fails only when the escaped literal exceeds the regex size limit.
    pub fn case_insensitive(literal: impl Into<String>) -> Result<Self, regex::Error> {
        let literal = literal.into();
        let folded = RegexBuilder::new(&regex::escape(&literal))
            .case_insensitive(true)
            .build()?;
        Ok(Self {
            literal,
            folded: Some(folded),
        })
    }
}

impl Pattern for LiteralPattern {
    fn find_first<'t>(&self, text: &'t str) -> Option<&'t str> {
        match &self.folded {
            Some(re) => re.find(text).map(|m| m.as_str()),
            None => text
                .find(self.literal.as_str())
                .map(|start| &text[start..start + self.literal.len()]),
        }
    }

    fn source(&self) -> &str {
        &self.literal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regex_finds_first_match() {
        let p = RegexPattern::new(r"(?i)give\s+up").unwrap();
        assert_eq!(p.find_first("ok I GIVE  up now, give up"), Some("GIVE  up"));
        assert_eq!(p.find_first("keep going"), None);
        assert_eq!(p.source(), r"(?i)give\s+up");
    }

    #[test]
    fn test_invalid_regex_is_rejected() {
        assert!(RegexPattern::new("(unclosed").is_err());
    }

    #[test]
    fn test_literal_case_sensitive() {
        let p = LiteralPattern::new("here it is");
        assert_eq!(p.find_first("Sure, here it is: ..."), Some("here it is"));
        assert_eq!(p.find_first("HERE IT IS"), None);
    }

    #[test]
    fn test_literal_case_insensitive_returns_original_slice() {
        let p = LiteralPattern::case_insensitive("here it is").unwrap();
        assert_eq!(p.find_first("Sure, HERE it is."), Some("HERE it is"));
        assert_eq!(p.source(), "here it is");
    }

    #[test]
    fn test_case_insensitive_literal_never_falls_back_to_exact_case() {
        let p: Result<LiteralPattern, regex::Error> = LiteralPattern::case_insensitive("Straße");
        let p = p.unwrap();
        assert_eq!(p.find_first("die STRASSE oder STRAßE"), Some("STRAßE"));
        assert_eq!(p.find_first("no match"), None);
    }

    #[test]
    fn test_literal_metacharacters_are_not_regex() {
        let p = LiteralPattern::case_insensitive("a.b").unwrap();
        assert_eq!(p.find_first("axb"), None);
        assert_eq!(p.find_first("A.B"), Some("A.B"));
    }
}
