//! Process lifecycle: block until the termination signal arrives.
//!
//! The handler is registered for SIGTERM only (Ctrl-C on platforms without
//! Unix signals). It unblocks the wait and logs a notice; any cleanup is left
//! to the caller once control returns.
//!
//! Once registered, the handler stays installed for the rest of the process,
//! so a SIGTERM delivered after the wait has returned is ignored rather than
//! killing the process mid-shutdown.

use crate::error::{DiagError, Result};

/// How the wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The termination signal was received.
    Terminated,
}

/// Owns the installed termination handler.
#[derive(Debug)]
pub struct LifecycleController {
    #[cfg(unix)]
    sigterm: tokio::signal::unix::Signal,
}

impl LifecycleController {
    /// Register the SIGTERM handler. Must be called inside a tokio runtime.
    #[cfg(unix)]
    pub fn install() -> Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        let sigterm = signal(SignalKind::terminate()).map_err(DiagError::SignalHandler)?;
        tracing::debug!("Installed SIGTERM handler");
        Ok(Self { sigterm })
    }

    #[cfg(not(unix))]
    pub fn install() -> Result<Self> {
        Ok(Self {})
    }

    /// Block, without timeout, until the signal is delivered.
    #[cfg(unix)]
    pub async fn wait(mut self) -> Result<Termination> {
        match self.sigterm.recv().await {
            Some(()) => {
                tracing::info!("Received SIGTERM, terminating");
                Ok(Termination::Terminated)
            },
            None => Err(DiagError::SignalHandler(std::io::Error::other(
                "signal stream closed before SIGTERM was received",
            ))),
        }
    }

    #[cfg(not(unix))]
    pub async fn wait(self) -> Result<Termination> {
        tokio::signal::ctrl_c()
            .await
            .map_err(DiagError::SignalHandler)?;
        tracing::info!("Received Ctrl-C, terminating");
        Ok(Termination::Terminated)
    }
}

/// Install the handler and block until the process is asked to terminate.
pub async fn run_until_terminated() -> Result<Termination> {
    LifecycleController::install()?.wait().await
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_blocks_without_signal() {
        let controller = LifecycleController::install().unwrap();

        let result = tokio::time::timeout(Duration::from_millis(100), controller.wait()).await;

        assert!(result.is_err(), "wait returned without a signal");
    }
}
