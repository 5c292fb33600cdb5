//! Session liveness probe and reconnect sequence.

use super::{Orchestrator, StageResult};
use crate::error::{JobFailure, RemoteError};
use crate::job::Job;

impl Orchestrator {
    /// Make sure the remote session answers before anything is submitted
    ///
    /// A failed or slow version probe triggers one reconnect sequence
    /// (authenticate, reboot, connect device). The sequence is not retried;
    /// any failing step aborts the job with the session's last error.
    pub(super) async fn ensure_connected(&self, job: &Job) -> StageResult<()> {
        let session = self.remote.session();
        if !session.has_device() {
            let failure = JobFailure::ConnectionFailure(session.last_error());
            return Err(self.abort(job, failure).await);
        }

        let timeout = self.config.timing.version_timeout;
        match tokio::time::timeout(timeout, self.remote.get_version()).await {
            Ok(Ok(version)) => {
                tracing::debug!(version = %version, "Remote session alive");
                return Ok(());
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Version probe failed, reconnecting");
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Version probe timed out, reconnecting"
                );
            }
        }

        if let Err((step, e)) = self.reconnect().await {
            tracing::error!(step, error = %e, "Reconnect failed");
            let failure = JobFailure::ConnectionFailure(session.last_error());
            return Err(self.abort(job, failure).await);
        }

        tracing::info!("Reconnected to remote service");
        Ok(())
    }

    async fn reconnect(&self) -> std::result::Result<(), (&'static str, RemoteError)> {
        let session = self.remote.session();
        session.authenticate().await.map_err(|e| ("authenticate", e))?;
        session.reboot().await.map_err(|e| ("reboot", e))?;
        session
            .connect_device()
            .await
            .map_err(|e| ("connect_device", e))?;
        Ok(())
    }
}
