//! Authentication options resolved from `OS_*` environment variables.

use std::collections::HashMap;
use std::path::PathBuf;

use secrecy::SecretString;
use url::Url;

use crate::error::{DiagError, Result};

/// Interface used for catalog lookups when `OS_INTERFACE` is unset.
pub const DEFAULT_INTERFACE: &str = "public";

/// A domain referenced by id or by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainRef {
    pub id: Option<String>,
    pub name: Option<String>,
}

impl DomainRef {
    fn new(id: Option<String>, name: Option<String>) -> Self {
        Self { id, name }
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.name.is_none()
    }

    fn or(self, fallback: &DomainRef) -> DomainRef {
        if self.is_empty() {
            fallback.clone()
        } else {
            self
        }
    }
}

/// Requested token scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// `OS_SYSTEM_SCOPE=all`
    System,
    Project {
        id: Option<String>,
        name: Option<String>,
        domain: DomainRef,
    },
    Domain(DomainRef),
}

/// Everything needed to request a token and talk to the identity service.
///
/// Secret fields are wrapped in [`SecretString`], so `Debug` never shows them.
#[derive(Debug)]
pub struct AuthOptions {
    pub auth_url: Url,
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub user_domain: DomainRef,
    pub password: Option<SecretString>,
    pub passcode: Option<SecretString>,
    pub token: Option<SecretString>,
    pub application_credential_id: Option<String>,
    pub application_credential_name: Option<String>,
    pub application_credential_secret: Option<SecretString>,
    pub scope: Option<Scope>,
    pub interface: String,
    pub region: Option<String>,
    pub cacert: Option<PathBuf>,
    pub insecure: bool,
}

impl AuthOptions {
    /// Resolve options from the process environment.
    pub fn from_env() -> Result<Self> {
        let vars: HashMap<String, String> = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .filter(|(k, _)| k.starts_with(crate::environ::PREFIX))
            .collect();
        Self::from_env_map(&vars)
    }

    /// Resolve options from a map of `OS_*` variable names to values.
    ///
    /// Empty values are treated as unset.
    pub fn from_env_map(vars: &HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| vars.get(key).filter(|v| !v.is_empty()).cloned();
        let first = |keys: &[&str]| keys.iter().find_map(|k| get(*k));

        let auth_url = get("OS_AUTH_URL").ok_or_else(|| missing("OS_AUTH_URL"))?;
        let username = get("OS_USERNAME");
        let user_id = first(&["OS_USERID", "OS_USER_ID"]);
        let password = get("OS_PASSWORD");
        let passcode = get("OS_PASSCODE");
        let token = get("OS_TOKEN");
        let project_id = first(&["OS_PROJECT_ID", "OS_TENANT_ID"]);
        let project_name = first(&["OS_PROJECT_NAME", "OS_TENANT_NAME"]);
        let domain = DomainRef::new(get("OS_DOMAIN_ID"), get("OS_DOMAIN_NAME"));
        let ac_id = get("OS_APPLICATION_CREDENTIAL_ID");
        let ac_name = get("OS_APPLICATION_CREDENTIAL_NAME");
        let ac_secret = get("OS_APPLICATION_CREDENTIAL_SECRET");
        let system_scope = get("OS_SYSTEM_SCOPE");

        let auth_url = Url::parse(&auth_url).map_err(|e| DiagError::InvalidEnvironmentVariable {
            name: "OS_AUTH_URL".to_string(),
            reason: e.to_string(),
        })?;

        let has_user = user_id.is_some() || username.is_some();
        let has_ac_ref = ac_id.is_some() || ac_name.is_some();

        // Application credentials and tokens carry the user identity themselves
        if !has_user && ac_id.is_none() && ac_secret.is_none() && token.is_none() {
            return Err(missing_any(&["OS_USERID", "OS_USERNAME"]));
        }

        if password.is_none() && passcode.is_none() && !has_ac_ref && token.is_none() {
            return Err(missing("OS_PASSWORD"));
        }

        if has_ac_ref && ac_secret.is_none() {
            return Err(missing("OS_APPLICATION_CREDENTIAL_SECRET"));
        }

        if domain.is_empty() && project_id.is_none() && project_name.is_some() {
            let explicit_project_domain =
                get("OS_PROJECT_DOMAIN_ID").is_some() || get("OS_PROJECT_DOMAIN_NAME").is_some();
            if !explicit_project_domain {
                return Err(missing("OS_PROJECT_ID"));
            }
        }

        let user_domain =
            DomainRef::new(get("OS_USER_DOMAIN_ID"), get("OS_USER_DOMAIN_NAME")).or(&domain);

        if ac_id.is_none() && ac_name.is_some() {
            if !has_user {
                return Err(missing_any(&["OS_USERID", "OS_USERNAME"]));
            }
            if user_id.is_none() && user_domain.is_empty() {
                return Err(missing_any(&["OS_DOMAIN_ID", "OS_DOMAIN_NAME"]));
            }
        }

        let scope = if system_scope.as_deref() == Some("all") {
            Some(Scope::System)
        } else if project_id.is_some() || project_name.is_some() {
            let project_domain =
                DomainRef::new(get("OS_PROJECT_DOMAIN_ID"), get("OS_PROJECT_DOMAIN_NAME"))
                    .or(&domain);
            Some(Scope::Project {
                id: project_id,
                name: project_name,
                domain: project_domain,
            })
        } else if !domain.is_empty() && has_user {
            Some(Scope::Domain(domain))
        } else {
            None
        };

        Ok(Self {
            auth_url,
            user_id,
            username,
            user_domain,
            password: password.map(SecretString::from),
            passcode: passcode.map(SecretString::from),
            token: token.map(SecretString::from),
            application_credential_id: ac_id,
            application_credential_name: ac_name,
            application_credential_secret: ac_secret.map(SecretString::from),
            scope,
            interface: get("OS_INTERFACE")
                .map(|i| normalize_interface(&i))
                .unwrap_or_else(|| DEFAULT_INTERFACE.to_string()),
            region: get("OS_REGION_NAME"),
            cacert: get("OS_CACERT").map(PathBuf::from),
            insecure: get("OS_INSECURE").is_some_and(|v| parse_flag(&v)),
        })
    }

    /// Whether an application credential is used to authenticate.
    pub fn uses_application_credential(&self) -> bool {
        self.application_credential_secret.is_some()
            && (self.application_credential_id.is_some()
                || self.application_credential_name.is_some())
    }
}

/// `publicURL`, `internalURL` and `adminURL` are accepted as aliases.
fn normalize_interface(interface: &str) -> String {
    interface
        .strip_suffix("URL")
        .unwrap_or(interface)
        .to_ascii_lowercase()
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn missing(name: &str) -> DiagError {
    DiagError::MissingEnvironmentVariable {
        name: name.to_string(),
    }
}

fn missing_any(names: &[&str]) -> DiagError {
    DiagError::MissingAnyOfEnvironmentVariables {
        names: names.iter().map(|n| n.to_string()).collect(),
    }
}
