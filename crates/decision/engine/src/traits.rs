use async_trait::async_trait;
use decision_types::{AuthorityToken, Payload};

/// External authority/identity collaborator. Treated as a black box.
#[async_trait]
pub trait AuthorityValidator: Send + Sync {
    async fn validate(&self, token: &AuthorityToken) -> bool;
}

/// External payload shape check. Returns the reason on rejection.
pub trait PayloadValidator: Send + Sync {
    fn validate(&self, payload: &Payload) -> Result<(), String>;
}
