//! The authenticated-session capability consumed by token extraction.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::Result;
use crate::token::TokenDetail;

/// An application credential as returned by the identity service.
///
/// The service never returns the secret on lookup; unknown fields are ignored
/// rather than retained so nothing beyond these fields can be surfaced.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApplicationCredential {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub expires_at: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
}

/// A session obtained from a successful authorization.
///
/// Implementations keep the token detail returned at authorization time and
/// can issue follow-up queries against the identity service.
#[async_trait]
pub trait AuthenticatedSession: Send + Sync {
    /// The token detail cached at authorization time. No network call.
    fn token_detail(&self) -> TokenDetail;

    /// Look up an application credential owned by `user_id`.
    async fn get_application_credential(
        &self,
        user_id: &str,
        credential_id: &str,
    ) -> Result<ApplicationCredential>;
}
