//! Header rules.

use super::MatchRule;
use crate::error::Error;
use crate::recording::RecordedRequest;

/// Matches when a header with the given name is present, regardless of value.
/// Header names are compared case-insensitively.
#[derive(Debug, Clone)]
pub struct HeaderExistsRule {
    name: String,
}

impl HeaderExistsRule {
    pub fn new(name: &str) -> Result<Self, Error> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::invalid_argument("header name must not be empty"));
        }
        Ok(Self {
            name: name.to_string(),
        })
    }
}

impl MatchRule for HeaderExistsRule {
    fn matches(&self, request: &RecordedRequest) -> bool {
        request.header(&self.name).is_some()
    }

    fn describe(&self) -> String {
        format!("header {} exists", self.name)
    }
}

/// Matches when a header with the given name carries exactly the given value.
/// Names are compared case-insensitively, values case-sensitively; any one of
/// a duplicated header's values may satisfy the rule.
#[derive(Debug, Clone)]
pub struct HeaderEqualsRule {
    name: String,
    value: String,
}

impl HeaderEqualsRule {
    pub fn new(name: &str, value: &str) -> Result<Self, Error> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::invalid_argument("header name must not be empty"));
        }
        Ok(Self {
            name: name.to_string(),
            value: value.to_string(),
        })
    }
}

impl MatchRule for HeaderEqualsRule {
    fn matches(&self, request: &RecordedRequest) -> bool {
        request
            .headers
            .iter()
            .any(|(k, v)| k.eq_ignore_ascii_case(&self.name) && v == &self.value)
    }

    fn describe(&self) -> String {
        format!("header {} equals {}", self.name, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::testing::request;

    fn request_with_headers(pairs: &[(&str, &str)]) -> RecordedRequest {
        let mut req = request("GET", "/");
        req.headers = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        req
    }

    #[test]
    fn test_header_exists_ignores_name_case() {
        let rule = HeaderExistsRule::new("X-Correlation-Id").unwrap();
        assert!(rule.matches(&request_with_headers(&[("x-correlation-id", "abc")])));
        assert!(!rule.matches(&request_with_headers(&[("x-other", "abc")])));
    }

    #[test]
    fn test_header_equals_value_is_case_sensitive() {
        let rule = HeaderEqualsRule::new("Accept", "application/json").unwrap();
        assert!(rule.matches(&request_with_headers(&[("accept", "application/json")])));
        assert!(!rule.matches(&request_with_headers(&[("accept", "Application/JSON")])));
    }

    #[test]
    fn test_header_equals_considers_duplicates() {
        let rule = HeaderEqualsRule::new("Accept", "text/html").unwrap();
        let req = request_with_headers(&[
            ("Accept", "application/json"),
            ("Accept", "text/html"),
        ]);
        assert!(rule.matches(&req));
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(HeaderExistsRule::new(" ").is_err());
        assert!(HeaderEqualsRule::new("", "x").is_err());
    }
}
