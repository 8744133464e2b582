//! Request body rules.

use super::MatchRule;
use crate::error::Error;
use crate::recording::RecordedRequest;

/// Matches when the request body, read as UTF-8 text, contains the given
/// substring.
#[derive(Debug, Clone)]
pub struct BodyContainsRule {
    text: String,
}

impl BodyContainsRule {
    pub fn new(text: &str) -> Result<Self, Error> {
        if text.is_empty() {
            return Err(Error::invalid_argument("search text must not be empty"));
        }
        Ok(Self {
            text: text.to_string(),
        })
    }
}

impl MatchRule for BodyContainsRule {
    fn matches(&self, request: &RecordedRequest) -> bool {
        String::from_utf8_lossy(&request.body).contains(&self.text)
    }

    fn describe(&self) -> String {
        format!("body contains {:?}", self.text)
    }
}

/// Matches when the request body is exactly the given number of bytes.
#[derive(Debug, Clone)]
pub struct BodyLengthEqualsRule {
    length: u64,
}

impl BodyLengthEqualsRule {
    pub fn new(length: u64) -> Self {
        Self { length }
    }
}

impl MatchRule for BodyLengthEqualsRule {
    fn matches(&self, request: &RecordedRequest) -> bool {
        request.body.len() as u64 == self.length
    }

    fn describe(&self) -> String {
        format!("body length equals {}", self.length)
    }
}
