//! Token detail extraction.
//!
//! The token detail is the `token` object Keystone returns on authorization.
//! Only the handful of fields this tool reads or writes are typed; everything
//! else passes through untouched in the flattened `other` maps.
//!
//! Token contents are reported as-is apart from the catalog. At the trust level
//! this tool runs at, the claims (user, project, roles, expiry) are exactly the
//! diagnostic output an operator asked for, so no redaction happens here.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::auth::AuthenticatedSession;
use crate::error::{DiagError, Result};

/// The `user` object of a token.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// The `application_credential` object of a token.
///
/// `description` and `expires_at` are always serialized, as `null` when the
/// credential has none.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationCredentialRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub expires_at: Option<String>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Claims and metadata of an issued token.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<TokenUser>,
    /// Service catalog. Absent under federated authentication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_credential: Option<ApplicationCredentialRef>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl TokenDetail {
    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().and_then(|u| u.id.as_deref())
    }
}

/// Take the session's token detail, drop the catalog and enrich the
/// application credential, if any, with its description and expiry.
///
/// Performs exactly one lookup when an application credential was used and
/// none otherwise. A failed lookup is returned as-is; no partially enriched
/// detail escapes.
pub async fn extract_auth_details<S>(session: &S) -> Result<TokenDetail>
where
    S: AuthenticatedSession + ?Sized,
{
    let mut detail = session.token_detail();

    if detail.catalog.take().is_some() {
        tracing::debug!("Removed service catalog from token detail");
    }

    if let Some(credential) = detail.application_credential.as_mut() {
        let credential_id = credential
            .id
            .clone()
            .ok_or(DiagError::MalformedTokenDetail("application_credential.id"))?;
        let user_id = detail
            .user
            .as_ref()
            .and_then(|u| u.id.clone())
            .ok_or(DiagError::MalformedTokenDetail("user.id"))?;

        tracing::debug!(
            "Looking up application credential {} of user {}",
            credential_id,
            user_id
        );
        let found = session
            .get_application_credential(&user_id, &credential_id)
            .await?;

        credential.description = found.description;
        credential.expires_at = found.expires_at;
    }

    Ok(detail)
}
