//! Keystone v3 client: token issuance and application credential lookup.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::options::{AuthOptions, DomainRef, Scope};
use super::session::{ApplicationCredential, AuthenticatedSession};
use crate::error::{DiagError, Result};
use crate::token::TokenDetail;

const SUBJECT_TOKEN_HEADER: &str = "x-subject-token";
const AUTH_TOKEN_HEADER: &str = "x-auth-token";

/// Client that exchanges [`AuthOptions`] for a [`KeystoneSession`].
#[derive(Debug)]
pub struct KeystoneClient {
    options: AuthOptions,
    http_client: reqwest::Client,
}

impl KeystoneClient {
    /// Build a client, applying `OS_CACERT` and `OS_INSECURE`.
    pub fn new(options: AuthOptions) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));

        if let Some(ref path) = options.cacert {
            let pem = std::fs::read(path).map_err(|e| DiagError::InvalidEnvironmentVariable {
                name: "OS_CACERT".to_string(),
                reason: format!("{}: {}", path.display(), e),
            })?;
            let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                DiagError::InvalidEnvironmentVariable {
                    name: "OS_CACERT".to_string(),
                    reason: e.to_string(),
                }
            })?;
            builder = builder.add_root_certificate(cert);
        }

        if options.insecure {
            tracing::warn!("OS_INSECURE is set, TLS certificates will not be verified");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let http_client = builder
            .build()
            .map_err(|e| DiagError::AuthorizationFailure(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            options,
            http_client,
        })
    }

    pub fn options(&self) -> &AuthOptions {
        &self.options
    }

    /// Request a token and keep its detail in the returned session.
    pub async fn authorize(&self) -> Result<KeystoneSession> {
        let base_url = identity_v3_url(self.options.auth_url.as_str());
        let url = format!("{}/auth/tokens", base_url);
        tracing::debug!("Requesting token from {}", url);

        let response = self
            .http_client
            .post(&url)
            .json(&auth_request_body(&self.options))
            .send()
            .await
            .map_err(|e| DiagError::AuthorizationFailure(format!("Token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(DiagError::AuthorizationFailure(format!(
                "Identity service returned status {}: {}",
                status, error_text
            )));
        }

        let token = response
            .headers()
            .get(SUBJECT_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| SecretString::from(v.to_string()))
            .ok_or_else(|| {
                DiagError::AuthorizationFailure(format!(
                    "Response carried no {} header",
                    SUBJECT_TOKEN_HEADER
                ))
            })?;

        #[derive(Deserialize)]
        struct TokenEnvelope {
            token: TokenDetail,
        }

        let envelope: TokenEnvelope = response.json().await.map_err(|e| {
            DiagError::AuthorizationFailure(format!("Failed to parse token response: {}", e))
        })?;

        let identity_url = envelope
            .token
            .catalog
            .as_ref()
            .and_then(|catalog| {
                resolve_identity_endpoint(
                    catalog,
                    &self.options.interface,
                    self.options.region.as_deref(),
                )
            })
            .unwrap_or_else(|| {
                tracing::debug!("No identity endpoint in catalog, using the auth URL");
                base_url.clone()
            });

        tracing::info!(
            "Authorized as user {}",
            envelope.token.user_id().unwrap_or("<unknown>")
        );

        Ok(KeystoneSession {
            http_client: self.http_client.clone(),
            token,
            detail: envelope.token,
            identity_url: identity_v3_url(&identity_url),
        })
    }
}

/// A token issued by Keystone together with the identity endpoint to query.
#[derive(Debug)]
pub struct KeystoneSession {
    http_client: reqwest::Client,
    token: SecretString,
    detail: TokenDetail,
    identity_url: String,
}

impl KeystoneSession {
    /// Versioned identity endpoint used for follow-up queries.
    pub fn identity_url(&self) -> &str {
        &self.identity_url
    }
}

#[async_trait]
impl AuthenticatedSession for KeystoneSession {
    fn token_detail(&self) -> TokenDetail {
        self.detail.clone()
    }

    async fn get_application_credential(
        &self,
        user_id: &str,
        credential_id: &str,
    ) -> Result<ApplicationCredential> {
        let lookup_failed = |message: String| DiagError::EnrichmentLookupFailure {
            user_id: user_id.to_string(),
            credential_id: credential_id.to_string(),
            message,
        };

        let url = format!(
            "{}/users/{}/application_credentials/{}",
            self.identity_url,
            urlencoding::encode(user_id),
            urlencoding::encode(credential_id)
        );
        tracing::debug!("Fetching application credential from {}", url);

        let response = self
            .http_client
            .get(&url)
            .header(AUTH_TOKEN_HEADER, self.token.expose_secret())
            .send()
            .await
            .map_err(|e| lookup_failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(lookup_failed(format!("status {}: {}", status, error_text)));
        }

        #[derive(Deserialize)]
        struct CredentialEnvelope {
            application_credential: ApplicationCredential,
        }

        let envelope: CredentialEnvelope = response
            .json()
            .await
            .map_err(|e| lookup_failed(format!("Failed to parse response: {}", e)))?;

        Ok(envelope.application_credential)
    }
}

/// Normalise an identity URL to its `/v3` root, replacing any trailing
/// version segment such as `/v2.0`.
pub fn identity_v3_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    let root = match trimmed.rsplit_once('/') {
        Some((root, last)) if !root.ends_with('/') && is_version_segment(last) => root,
        _ => trimmed,
    };
    format!("{}/v3", root)
}

/// `v<major>` or `v<major>.<minor>`.
fn is_version_segment(segment: &str) -> bool {
    let Some(version) = segment.strip_prefix('v') else {
        return false;
    };
    let (major, minor) = match version.split_once('.') {
        Some((major, minor)) => (major, Some(minor)),
        None => (version, None),
    };
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    digits(major) && minor.is_none_or(digits)
}

#[derive(Debug, Deserialize)]
struct CatalogService {
    #[serde(rename = "type")]
    service_type: String,
    #[serde(default)]
    endpoints: Vec<CatalogEndpoint>,
}

#[derive(Debug, Deserialize)]
struct CatalogEndpoint {
    interface: String,
    url: String,
    #[serde(default)]
    region_id: Option<String>,
    #[serde(default)]
    region: Option<String>,
}

impl CatalogEndpoint {
    fn in_region(&self, region: &str) -> bool {
        self.region_id.as_deref() == Some(region) || self.region.as_deref() == Some(region)
    }
}

/// Find the identity endpoint for `interface` (and `region`, if given).
pub fn resolve_identity_endpoint(
    catalog: &Value,
    interface: &str,
    region: Option<&str>,
) -> Option<String> {
    let services: Vec<CatalogService> = match serde_json::from_value(catalog.clone()) {
        Ok(services) => services,
        Err(e) => {
            tracing::warn!("Ignoring unreadable service catalog: {}", e);
            return None;
        },
    };

    services
        .into_iter()
        .filter(|s| s.service_type == "identity")
        .flat_map(|s| s.endpoints)
        .find(|e| e.interface == interface && region.is_none_or(|r| e.in_region(r)))
        .map(|e| e.url)
}

fn domain_json(domain: &DomainRef) -> Value {
    match (&domain.id, &domain.name) {
        (Some(id), _) => json!({ "id": id }),
        (None, Some(name)) => json!({ "name": name }),
        (None, None) => json!({}),
    }
}

fn user_json(options: &AuthOptions) -> Map<String, Value> {
    let mut user = Map::new();
    if let Some(ref id) = options.user_id {
        user.insert("id".to_string(), json!(id));
    } else if let Some(ref name) = options.username {
        user.insert("name".to_string(), json!(name));
        if !options.user_domain.is_empty() {
            user.insert("domain".to_string(), domain_json(&options.user_domain));
        }
    }
    user
}

fn scope_json(scope: &Scope) -> Value {
    match scope {
        Scope::System => json!({ "system": { "all": true } }),
        Scope::Project { id: Some(id), .. } => json!({ "project": { "id": id } }),
        Scope::Project { name, domain, .. } => {
            let mut project = Map::new();
            project.insert("name".to_string(), json!(name));
            if !domain.is_empty() {
                project.insert("domain".to_string(), domain_json(domain));
            }
            json!({ "project": project })
        },
        Scope::Domain(domain) => json!({ "domain": domain_json(domain) }),
    }
}

/// Build the `POST /v3/auth/tokens` body. Contains secrets; never log it.
fn auth_request_body(options: &AuthOptions) -> Value {
    let application_credential = options
        .application_credential_secret
        .as_ref()
        .filter(|_| options.uses_application_credential());

    let identity = if let Some(secret) = application_credential {
        let mut credential = Map::new();
        if let Some(ref id) = options.application_credential_id {
            credential.insert("id".to_string(), json!(id));
        } else {
            credential.insert(
                "name".to_string(),
                json!(options.application_credential_name),
            );
            credential.insert("user".to_string(), Value::Object(user_json(options)));
        }
        credential.insert("secret".to_string(), json!(secret.expose_secret()));
        json!({
            "methods": ["application_credential"],
            "application_credential": credential,
        })
    } else if let Some(ref token) = options.token {
        json!({
            "methods": ["token"],
            "token": { "id": token.expose_secret() },
        })
    } else {
        let mut identity = Map::new();
        let mut methods = Vec::new();
        if let Some(ref password) = options.password {
            let mut user = user_json(options);
            user.insert("password".to_string(), json!(password.expose_secret()));
            identity.insert("password".to_string(), json!({ "user": user }));
            methods.push("password");
        }
        if let Some(ref passcode) = options.passcode {
            let mut user = user_json(options);
            user.insert("passcode".to_string(), json!(passcode.expose_secret()));
            identity.insert("totp".to_string(), json!({ "user": user }));
            methods.push("totp");
        }
        identity.insert("methods".to_string(), json!(methods));
        Value::Object(identity)
    };

    let mut auth = Map::new();
    auth.insert("identity".to_string(), identity);
    if application_credential.is_none() {
        if let Some(ref scope) = options.scope {
            auth.insert("scope".to_string(), scope_json(scope));
        }
    }

    json!({ "auth": auth })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn options(pairs: &[(&str, &str)]) -> AuthOptions {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AuthOptions::from_env_map(&vars).unwrap()
    }

    #[test]
    fn test_identity_v3_url() {
        assert_eq!(identity_v3_url("https://k:5000"), "https://k:5000/v3");
        assert_eq!(identity_v3_url("https://k:5000/"), "https://k:5000/v3");
        assert_eq!(identity_v3_url("https://k/identity/v3/"), "https://k/identity/v3");
    }

    #[test]
    fn test_identity_v3_url_replaces_other_versions() {
        assert_eq!(identity_v3_url("https://k:5000/v2.0"), "https://k:5000/v3");
        assert_eq!(identity_v3_url("https://k:5000/v2.0/"), "https://k:5000/v3");
        assert_eq!(identity_v3_url("https://k/identity/v3.14"), "https://k/identity/v3");
        assert_eq!(identity_v3_url("https://k/vault"), "https://k/vault/v3");
        assert_eq!(identity_v3_url("https://k/v2."), "https://k/v2./v3");
        assert_eq!(identity_v3_url("https://v3"), "https://v3/v3");
    }

    #[test]
    fn test_password_body_with_project_scope() {
        let opts = options(&[
            ("OS_AUTH_URL", "https://keystone"),
            ("OS_USERNAME", "demo"),
            ("OS_PASSWORD", "pw"),
            ("OS_USER_DOMAIN_NAME", "Default"),
            ("OS_PROJECT_NAME", "demo"),
            ("OS_PROJECT_DOMAIN_ID", "default"),
        ]);

        assert_eq!(
            auth_request_body(&opts),
            json!({
                "auth": {
                    "identity": {
                        "methods": ["password"],
                        "password": {
                            "user": {
                                "name": "demo",
                                "domain": {"name": "Default"},
                                "password": "pw"
                            }
                        }
                    },
                    "scope": {
                        "project": {"name": "demo", "domain": {"id": "default"}}
                    }
                }
            })
        );
    }

    #[test]
    fn test_password_and_totp_body() {
        let opts = options(&[
            ("OS_AUTH_URL", "https://keystone"),
            ("OS_USERID", "u1"),
            ("OS_PASSWORD", "pw"),
            ("OS_PASSCODE", "123456"),
        ]);
        let body = auth_request_body(&opts);

        assert_eq!(body["auth"]["identity"]["methods"], json!(["password", "totp"]));
        assert_eq!(
            body["auth"]["identity"]["totp"]["user"],
            json!({"id": "u1", "passcode": "123456"})
        );
        assert!(body["auth"].get("scope").is_none());
    }

    #[test]
    fn test_application_credential_body_is_unscoped() {
        let opts = options(&[
            ("OS_AUTH_URL", "https://keystone"),
            ("OS_APPLICATION_CREDENTIAL_ID", "c1"),
            ("OS_APPLICATION_CREDENTIAL_SECRET", "s3cr3t"),
            ("OS_PROJECT_ID", "p1"),
        ]);

        assert_eq!(
            auth_request_body(&opts),
            json!({
                "auth": {
                    "identity": {
                        "methods": ["application_credential"],
                        "application_credential": {"id": "c1", "secret": "s3cr3t"}
                    }
                }
            })
        );
    }

    #[test]
    fn test_application_credential_by_name_body() {
        let opts = options(&[
            ("OS_AUTH_URL", "https://keystone"),
            ("OS_USERNAME", "demo"),
            ("OS_USER_DOMAIN_ID", "default"),
            ("OS_APPLICATION_CREDENTIAL_NAME", "ci"),
            ("OS_APPLICATION_CREDENTIAL_SECRET", "s3cr3t"),
        ]);
        let body = auth_request_body(&opts);

        assert_eq!(
            body["auth"]["identity"]["application_credential"],
            json!({
                "name": "ci",
                "user": {"name": "demo", "domain": {"id": "default"}},
                "secret": "s3cr3t"
            })
        );
    }

    #[test]
    fn test_token_body_with_system_scope() {
        let opts = options(&[
            ("OS_AUTH_URL", "https://keystone"),
            ("OS_TOKEN", "gAAAA"),
            ("OS_SYSTEM_SCOPE", "all"),
        ]);
        let body = auth_request_body(&opts);

        assert_eq!(
            body["auth"]["identity"],
            json!({"methods": ["token"], "token": {"id": "gAAAA"}})
        );
        assert_eq!(body["auth"]["scope"], json!({"system": {"all": true}}));
    }

    fn catalog() -> Value {
        json!([
            {
                "type": "compute",
                "endpoints": [
                    {"interface": "public", "region_id": "RegionOne", "url": "https://nova"}
                ]
            },
            {
                "type": "identity",
                "endpoints": [
                    {"interface": "internal", "region_id": "RegionOne", "url": "https://keystone-internal:5000"},
                    {"interface": "public", "region_id": "RegionOne", "url": "https://keystone-one:5000"},
                    {"interface": "public", "region": "RegionTwo", "url": "https://keystone-two:5000/v3"}
                ]
            }
        ])
    }

    #[test]
    fn test_resolve_identity_endpoint_by_interface() {
        assert_eq!(
            resolve_identity_endpoint(&catalog(), "internal", None).as_deref(),
            Some("https://keystone-internal:5000")
        );
        assert_eq!(
            resolve_identity_endpoint(&catalog(), "public", None).as_deref(),
            Some("https://keystone-one:5000")
        );
    }

    #[test]
    fn test_resolve_identity_endpoint_by_region() {
        assert_eq!(
            resolve_identity_endpoint(&catalog(), "public", Some("RegionTwo")).as_deref(),
            Some("https://keystone-two:5000/v3")
        );
        assert_eq!(
            resolve_identity_endpoint(&catalog(), "public", Some("RegionThree")),
            None
        );
    }

    #[test]
    fn test_resolve_identity_endpoint_unreadable_catalog() {
        assert_eq!(
            resolve_identity_endpoint(&json!({"not": "a list"}), "public", None),
            None
        );
    }
}
