//! Authorization against the OpenStack identity service.
//!
//! [`AuthOptions`] are resolved from `OS_*` variables, [`KeystoneClient`]
//! exchanges them for a [`KeystoneSession`], and the session is consumed
//! through the [`AuthenticatedSession`] capability so token extraction can be
//! exercised without a live identity service.

pub mod keystone;
pub mod options;
pub mod session;

pub use keystone::{KeystoneClient, KeystoneSession};
pub use options::{AuthOptions, DomainRef, Scope};
pub use session::{ApplicationCredential, AuthenticatedSession};

use crate::error::Result;

/// Resolve options from the environment and authorize once.
pub async fn authorize_from_env() -> Result<KeystoneSession> {
    let client = KeystoneClient::new(AuthOptions::from_env()?)?;
    client.authorize().await
}
