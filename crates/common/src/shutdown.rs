//! Cooperative shutdown
//!
//! The signal handler never tears anything down itself. It only requests
//! shutdown on a [`ShutdownToken`]; the acquisition loop samples the token
//! between idle pumps and runs its own shutdown sequence.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Cloneable shutdown request flag
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    token: CancellationToken,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every holder of this token to shut down
    pub fn request(&self) {
        self.token.cancel();
    }

    /// Whether shutdown has been requested (non-blocking)
    pub fn is_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until shutdown is requested
    pub async fn requested(&self) {
        self.token.cancelled().await;
    }
}

/// Spawn a task that requests shutdown on Ctrl+C
///
/// The task also ends quietly once the token is requested by someone else.
pub fn spawn_ctrl_c_listener(token: ShutdownToken) -> JoinHandle<crate::Result<()>> {
    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.map_err(|e| crate::Error::Signal(e.to_string()))?;
                info!("Received Ctrl+C, shutting down gracefully...");
                token.request();
            }
            _ = token.requested() => {
                debug!("Shutdown already requested, Ctrl+C listener exiting");
            }
        }
        Ok(())
    })
}
