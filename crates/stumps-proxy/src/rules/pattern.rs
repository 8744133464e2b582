//! Exact-or-glob text matching.

use crate::error::Error;
use regex::Regex;
use std::sync::Arc;

/// A compiled text pattern: plain equality, or a glob where `*` matches any
/// run of characters and `?` matches a single character.
///
/// Globs are compiled to an anchored regex once, at materialization time.
#[derive(Debug, Clone)]
pub enum TextPattern {
    Exact(String),
    Glob { raw: String, regex: Arc<Regex> },
}

impl TextPattern {
    pub fn compile(pattern: &str) -> Result<Self, Error> {
        if pattern.is_empty() {
            return Err(Error::invalid_argument("pattern must not be empty"));
        }
        if !pattern.contains('*') && !pattern.contains('?') {
            return Ok(TextPattern::Exact(pattern.to_string()));
        }

        let mut expr = String::with_capacity(pattern.len() + 8);
        expr.push('^');
        for ch in pattern.chars() {
            match ch {
                '*' => expr.push_str(".*"),
                '?' => expr.push('.'),
                other => expr.push_str(&regex::escape(&other.to_string())),
            }
        }
        expr.push('$');

        let regex = Regex::new(&expr)
            .map_err(|e| Error::invalid_argument(format!("invalid glob pattern: {e}")))?;
        Ok(TextPattern::Glob {
            raw: pattern.to_string(),
            regex: Arc::new(regex),
        })
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            TextPattern::Exact(expected) => expected == value,
            TextPattern::Glob { regex, .. } => regex.is_match(value),
        }
    }

    /// The pattern as originally written.
    pub fn source(&self) -> &str {
        match self {
            TextPattern::Exact(s) => s,
            TextPattern::Glob { raw, .. } => raw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        let pattern = TextPattern::compile("/users/42").unwrap();
        assert!(pattern.matches("/users/42"));
        assert!(!pattern.matches("/users/421"));
        assert!(!pattern.matches("/Users/42"));
    }

    #[test]
    fn test_star_glob() {
        let pattern = TextPattern::compile("/users/*/orders").unwrap();
        assert!(pattern.matches("/users/42/orders"));
        assert!(pattern.matches("/users/abc-def/orders"));
        assert!(!pattern.matches("/users/42/invoices"));
    }

    #[test]
    fn test_question_mark_glob() {
        let pattern = TextPattern::compile("/v?/ping").unwrap();
        assert!(pattern.matches("/v1/ping"));
        assert!(pattern.matches("/v2/ping"));
        assert!(!pattern.matches("/v10/ping"));
    }

    #[test]
    fn test_glob_is_anchored() {
        let pattern = TextPattern::compile("*.json").unwrap();
        assert!(pattern.matches("data.json"));
        assert!(!pattern.matches("data.json.bak"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let pattern = TextPattern::compile("/a.b/*").unwrap();
        assert!(pattern.matches("/a.b/c"));
        assert!(!pattern.matches("/aXb/c"));
    }

    #[test]
    fn test_empty_pattern_rejected() {
        assert!(TextPattern::compile("").is_err());
    }
}
