//! Stock collaborators for authority and payload validation.

use std::collections::HashSet;

use async_trait::async_trait;
use decision_types::{AuthorityToken, EntryHash, Payload};

use crate::traits::{AuthorityValidator, PayloadValidator};

/// Accepts a fixed set of tokens. Only their digests are held in memory.
pub struct StaticTokenAuthority {
    digests: HashSet<EntryHash>,
}

impl StaticTokenAuthority {
    pub fn new<I, T>(tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let digests = tokens
            .into_iter()
            .map(|t| AuthorityToken::new(t))
            .filter(|t| !t.is_blank())
            .map(|t| t.digest())
            .collect();
        Self { digests }
    }

    pub fn len(&self) -> usize {
        self.digests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }
}

#[async_trait]
impl AuthorityValidator for StaticTokenAuthority {
    async fn validate(&self, token: &AuthorityToken) -> bool {
        !token.is_blank() && self.digests.contains(&token.digest())
    }
}

pub struct AcceptAnyPayload;

impl PayloadValidator for AcceptAnyPayload {
    fn validate(&self, _payload: &Payload) -> Result<(), String> {
        Ok(())
    }
}

pub struct NonEmptyPayload;

impl PayloadValidator for NonEmptyPayload {
    fn validate(&self, payload: &Payload) -> Result<(), String> {
        if payload.is_empty() {
            return Err("payload is empty".into());
        }
        Ok(())
    }
}

/// Requires the payload to be a UTF-8 JSON object.
pub struct JsonObjectPayload;

impl PayloadValidator for JsonObjectPayload {
    fn validate(&self, payload: &Payload) -> Result<(), String> {
        match serde_json::from_slice::<serde_json::Value>(payload.as_bytes()) {
            Ok(serde_json::Value::Object(_)) => Ok(()),
            Ok(_) => Err("payload must be a JSON object".into()),
            Err(e) => Err(format!("payload is not valid JSON: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_authority_matches_configured_tokens_only() {
        let authority = StaticTokenAuthority::new(["ops:alpha", "", "audit:beta"]);
        assert_eq!(authority.len(), 2);
        assert!(authority.validate(&AuthorityToken::new("ops:alpha")).await);
        assert!(!authority.validate(&AuthorityToken::new("ops:gamma")).await);
        assert!(!authority.validate(&AuthorityToken::new("")).await);
    }

    #[test]
    fn json_object_validator() {
        assert!(JsonObjectPayload.validate(&Payload::from(r#"{"a":1}"#)).is_ok());
        assert!(JsonObjectPayload.validate(&Payload::from("[1]")).is_err());
        assert!(JsonObjectPayload.validate(&Payload::from("nope")).is_err());
    }

    #[test]
    fn non_empty_validator() {
        assert!(NonEmptyPayload.validate(&Payload::default()).is_err());
        assert!(NonEmptyPayload.validate(&Payload::from("x")).is_ok());
    }
}
