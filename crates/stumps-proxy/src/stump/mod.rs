//! Stumps: named canned responses guarded by match rules.

mod registry;

pub use registry::StumpRegistry;

use crate::error::Error;
use crate::recording::{BodyClass, RecordedContext, RecordedRequest};
use crate::rules::{MatchRule, RuleContract};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The fixed reply a stump serves when it matches.
///
/// Headers are an ordered list allowing duplicates; names compare
/// case-insensitively. The image/text flags are advisory metadata for
/// admin tooling and are never consulted by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CannedResponse {
    pub status_code: u16,
    pub status_description: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default, with = "body_base64")]
    pub body: Bytes,
    #[serde(default)]
    pub body_content_type: String,
    #[serde(default)]
    pub body_is_image: bool,
    #[serde(default)]
    pub body_is_text: bool,
}

impl CannedResponse {
    pub fn new(status_code: u16, status_description: &str) -> Result<Self, Error> {
        let response = Self {
            status_code,
            status_description: status_description.to_string(),
            headers: Vec::new(),
            body: Bytes::new(),
            body_content_type: String::new(),
            body_is_image: false,
            body_is_text: false,
        };
        response.validate()?;
        Ok(response)
    }

    /// Check the range constraint on the status code. Deserialized values
    /// bypass the constructor, so creation paths re-validate.
    pub fn validate(&self) -> Result<(), Error> {
        if !(100..=599).contains(&self.status_code) {
            return Err(Error::invalid_argument(format!(
                "status code {} is outside 100-599",
                self.status_code
            )));
        }
        Ok(())
    }

    pub fn with_body(mut self, body: impl Into<Bytes>, content_type: &str) -> Self {
        self.body = body.into();
        self.body_content_type = content_type.to_string();
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

mod body_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

/// Serializable description of a stump: identity, rules, and response.
///
/// `stump_id` may be absent; the registry assigns one on creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StumpContract {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stump_id: Option<String>,
    pub stump_name: String,
    #[serde(default)]
    pub rules: Vec<RuleContract>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<CannedResponse>,
}

impl StumpContract {
    /// Describe a recorded exchange as a contract: the request half becomes
    /// the rules, the response half the canned reply.
    ///
    /// Text request bodies are matched by content, other bodies by length.
    pub fn from_recording(name: &str, context: &RecordedContext) -> Self {
        let request = &context.request;
        let mut rules = vec![
            RuleContract::MethodEquals {
                value: request.method.clone(),
            },
            RuleContract::PathMatches {
                pattern: request.path.clone(),
            },
        ];
        if let Some(query) = &request.query {
            rules.push(RuleContract::QueryMatches {
                pattern: query.clone(),
            });
        }
        if !request.body.is_empty() {
            match std::str::from_utf8(&request.body) {
                Ok(text) if request.body_class == BodyClass::Text => {
                    rules.push(RuleContract::BodyContains {
                        text: text.to_string(),
                    });
                }
                _ => {
                    rules.push(RuleContract::BodyLengthEquals {
                        length: request.body.len() as u64,
                    });
                }
            }
        }

        let response = &context.response;
        let canned = CannedResponse {
            status_code: response.status_code,
            status_description: response.status_description.clone(),
            headers: response.headers.clone(),
            body: response.body.clone(),
            body_content_type: response.header("content-type").unwrap_or("").to_string(),
            body_is_image: response.body_class == BodyClass::Image,
            body_is_text: response.body_class == BodyClass::Text,
        };

        Self {
            stump_id: None,
            stump_name: name.to_string(),
            rules,
            response: Some(canned),
        }
    }
}

/// A named, addressable match target: ordered rules plus a canned response.
pub struct Stump {
    id: String,
    name: String,
    rules: Vec<Arc<dyn MatchRule>>,
    response: Option<CannedResponse>,
}

impl Stump {
    /// Create an empty stump. Id and name must be non-empty after trimming.
    pub fn new(id: &str, name: &str) -> Result<Self, Error> {
        if id.trim().is_empty() {
            return Err(Error::invalid_argument("stump id must not be empty"));
        }
        if name.trim().is_empty() {
            return Err(Error::invalid_argument("stump name must not be empty"));
        }
        Ok(Self {
            id: id.to_string(),
            name: name.to_string(),
            rules: Vec::new(),
            response: None,
        })
    }

    /// Materialize a stump from its contract, generating an id when the
    /// contract has none.
    pub fn from_contract(contract: &StumpContract) -> Result<Self, Error> {
        let id = match contract.stump_id.as_deref() {
            Some(id) if !id.trim().is_empty() => id.to_string(),
            _ => generate_stump_id(),
        };
        let mut stump = Stump::new(&id, &contract.stump_name)?;
        for rule_contract in &contract.rules {
            stump.add_rule(rule_contract.materialize()?);
        }
        if let Some(ref response) = contract.response {
            response.validate()?;
            stump.set_response(response.clone());
        }
        Ok(stump)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Append a rule to the evaluation sequence.
    pub fn add_rule(&mut self, rule: Arc<dyn MatchRule>) {
        self.rules.push(rule);
    }

    pub fn response(&self) -> Option<&CannedResponse> {
        self.response.as_ref()
    }

    pub fn set_response(&mut self, response: CannedResponse) {
        self.response = Some(response);
    }

    /// Whether every rule accepts the request.
    ///
    /// A stump with no rules or no response never matches. Every rule is
    /// consulted on every evaluation, even once an earlier rule has failed;
    /// rules are allowed to observe their own invocations.
    pub fn is_match(&self, request: &RecordedRequest) -> bool {
        if self.rules.is_empty() || self.response.is_none() {
            return false;
        }
        let mut matched = true;
        for rule in &self.rules {
            if !rule.matches(request) {
                matched = false;
            }
        }
        matched
    }
}

/// Generate an opaque stump id.
pub fn generate_stump_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
