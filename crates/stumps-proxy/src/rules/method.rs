//! HTTP method rule.

use super::MatchRule;
use crate::error::Error;
use crate::recording::RecordedRequest;

/// Matches when the request method equals the configured method,
/// case-insensitively.
#[derive(Debug, Clone)]
pub struct MethodEqualsRule {
    method: String,
}

impl MethodEqualsRule {
    pub fn new(method: &str) -> Result<Self, Error> {
        let method = method.trim();
        if method.is_empty() {
            return Err(Error::invalid_argument("method must not be empty"));
        }
        Ok(Self {
            method: method.to_ascii_uppercase(),
        })
    }
}

impl MatchRule for MethodEqualsRule {
    fn matches(&self, request: &RecordedRequest) -> bool {
        request.method.eq_ignore_ascii_case(&self.method)
    }

    fn describe(&self) -> String {
        format!("method equals {}", self.method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::testing::request;

    #[test]
    fn test_method_match_is_case_insensitive() {
        let rule = MethodEqualsRule::new("get").unwrap();
        assert!(rule.matches(&request("GET", "/")));
        assert!(rule.matches(&request("get", "/")));
        assert!(!rule.matches(&request("POST", "/")));
    }

    #[test]
    fn test_empty_method_rejected() {
        assert!(MethodEqualsRule::new("").is_err());
        assert!(MethodEqualsRule::new("   ").is_err());
    }

    #[test]
    fn test_describe_names_the_method() {
        let rule = MethodEqualsRule::new("delete").unwrap();
        assert_eq!(rule.describe(), "method equals DELETE");
    }
}
