//! Request match rules.
//!
//! A rule is an independent predicate over an incoming HTTP request. A stump
//! combines rules with logical AND in insertion order. The trait is the
//! extension point; the [`RuleContract`] enum is the serializable description
//! of the built-in rule set, materialized into trait objects when a stump is
//! created.

mod body;
mod headers;
mod method;
mod pattern;
mod url;

pub use body::{BodyContainsRule, BodyLengthEqualsRule};
pub use headers::{HeaderEqualsRule, HeaderExistsRule};
pub use method::MethodEqualsRule;
pub use pattern::TextPattern;
pub use url::{PathMatchRule, QueryMatchRule};

use crate::error::Error;
use crate::recording::RecordedRequest;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Predicate over an incoming request.
///
/// Implementations must be side-effect tolerant: a stump consults every rule
/// on every evaluation, even when an earlier rule has already failed.
pub trait MatchRule: Send + Sync {
    /// Whether the request satisfies this rule.
    fn matches(&self, request: &RecordedRequest) -> bool;

    /// Human-readable description, used in logs and admin listings.
    fn describe(&self) -> String;
}

/// Serializable description of a built-in rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "camelCase")]
pub enum RuleContract {
    #[serde(rename_all = "camelCase")]
    MethodEquals { value: String },
    /// Exact or glob match on the URL path.
    #[serde(rename_all = "camelCase")]
    PathMatches { pattern: String },
    /// Exact or glob match on the raw query string.
    #[serde(rename_all = "camelCase")]
    QueryMatches { pattern: String },
    #[serde(rename_all = "camelCase")]
    HeaderExists { name: String },
    #[serde(rename_all = "camelCase")]
    HeaderEquals { name: String, value: String },
    #[serde(rename_all = "camelCase")]
    BodyContains { text: String },
    #[serde(rename_all = "camelCase")]
    BodyLengthEquals { length: u64 },
}

impl RuleContract {
    /// Build the runtime rule this contract describes.
    ///
    /// Fails with `InvalidArgument` on an empty required field or an
    /// uncompilable glob pattern.
    pub fn materialize(&self) -> Result<Arc<dyn MatchRule>, Error> {
        match self {
            RuleContract::MethodEquals { value } => {
                Ok(Arc::new(MethodEqualsRule::new(value)?))
            }
            RuleContract::PathMatches { pattern } => {
                Ok(Arc::new(PathMatchRule::new(pattern)?))
            }
            RuleContract::QueryMatches { pattern } => {
                Ok(Arc::new(QueryMatchRule::new(pattern)?))
            }
            RuleContract::HeaderExists { name } => {
                Ok(Arc::new(HeaderExistsRule::new(name)?))
            }
            RuleContract::HeaderEquals { name, value } => {
                Ok(Arc::new(HeaderEqualsRule::new(name, value)?))
            }
            RuleContract::BodyContains { text } => {
                Ok(Arc::new(BodyContainsRule::new(text)?))
            }
            RuleContract::BodyLengthEquals { length } => {
                Ok(Arc::new(BodyLengthEqualsRule::new(*length)))
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_round_trip() {
        let contract = RuleContract::HeaderEquals {
            name: "Accept".to_string(),
            value: "application/json".to_string(),
        };
        let json = serde_json::to_string(&contract).unwrap();
        assert!(json.contains("headerEquals"));
        let back: RuleContract = serde_json::from_str(&json).unwrap();
        assert_eq!(back, contract);
    }

    #[test]
    fn test_materialize_rejects_empty_method() {
        let contract = RuleContract::MethodEquals {
            value: "  ".to_string(),
        };
        assert!(matches!(
            contract.materialize(),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_materialized_rule_evaluates() {
        let contract = RuleContract::MethodEquals {
            value: "GET".to_string(),
        };
        let rule = contract.materialize().unwrap();
        assert!(rule.matches(&testing::request("GET", "/")));
        assert!(!rule.matches(&testing::request("POST", "/")));
    }
}
