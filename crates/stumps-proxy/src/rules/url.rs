//! URL path and query rules.

use super::pattern::TextPattern;
use super::MatchRule;
use crate::error::Error;
use crate::recording::RecordedRequest;

/// Matches the request path against an exact string or glob.
#[derive(Debug, Clone)]
pub struct PathMatchRule {
    pattern: TextPattern,
}

impl PathMatchRule {
    pub fn new(pattern: &str) -> Result<Self, Error> {
        Ok(Self {
            pattern: TextPattern::compile(pattern)?,
        })
    }
}

impl MatchRule for PathMatchRule {
    fn matches(&self, request: &RecordedRequest) -> bool {
        self.pattern.matches(&request.path)
    }

    fn describe(&self) -> String {
        format!("path matches {}", self.pattern.source())
    }
}

/// Matches the raw query string against an exact string or glob.
///
/// A request without a query string is treated as an empty query, so the
/// pattern `*` matches every request.
#[derive(Debug, Clone)]
pub struct QueryMatchRule {
    pattern: TextPattern,
}

impl QueryMatchRule {
    pub fn new(pattern: &str) -> Result<Self, Error> {
        Ok(Self {
            pattern: TextPattern::compile(pattern)?,
        })
    }
}

impl MatchRule for QueryMatchRule {
    fn matches(&self, request: &RecordedRequest) -> bool {
        self.pattern.matches(request.query.as_deref().unwrap_or(""))
    }

    fn describe(&self) -> String {
        format!("query matches {}", self.pattern.source())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::testing::request;

    #[test]
    fn test_exact_path() {
        let rule = PathMatchRule::new("/api/ping").unwrap();
        assert!(rule.matches(&request("GET", "/api/ping")));
        assert!(!rule.matches(&request("GET", "/api/ping/deep")));
    }

    #[test]
    fn test_glob_path() {
        let rule = PathMatchRule::new("/api/*").unwrap();
        assert!(rule.matches(&request("GET", "/api/ping")));
        assert!(rule.matches(&request("GET", "/api/a/b/c")));
        assert!(!rule.matches(&request("GET", "/health")));
    }

    #[test]
    fn test_query_match() {
        let rule = QueryMatchRule::new("b=1").unwrap();
        let mut req = request("GET", "/a");
        req.query = Some("b=1".to_string());
        assert!(rule.matches(&req));

        req.query = Some("b=2".to_string());
        assert!(!rule.matches(&req));
    }

    #[test]
    fn test_missing_query_is_empty() {
        let glob = QueryMatchRule::new("*").unwrap();
        assert!(glob.matches(&request("GET", "/a")));

        let exact = QueryMatchRule::new("b=1").unwrap();
        assert!(!exact.matches(&request("GET", "/a")));
    }
}
