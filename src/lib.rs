//! # openstack-auth-diag
//!
//! Verifies that `OS_*` credentials resolve to a working Keystone session
//! without leaking secret material.
//!
//! The flow is one authorization cycle and two reports:
//!
//! 1. [`environ::extract_os_environ`] lists the `OS_*` variables with the
//!    secret ones masked.
//! 2. [`auth::authorize_from_env`] obtains a token, and
//!    [`token::extract_auth_details`] reports its detail with the service
//!    catalog removed and the application credential, if one was used,
//!    enriched with its description and expiry.
//! 3. [`lifecycle::run_until_terminated`] idles until SIGTERM.
//!
//! # Example
//!
//! ```no_run
//! use openstack_auth_diag::{auth, environ, lifecycle, token};
//!
//! # async fn example() -> openstack_auth_diag::Result<()> {
//! let entries = environ::extract_os_environ();
//! let session = auth::authorize_from_env().await?;
//! let detail = token::extract_auth_details(&session).await?;
//! lifecycle::run_until_terminated().await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod environ;
pub mod error;
pub mod lifecycle;
pub mod report;
pub mod token;

pub use error::{DiagError, Result};
