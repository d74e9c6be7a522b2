use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report whether the remote service answers; the daemon keeps serving
/// cached data either way.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.context().remote().health_check().await {
        Ok(()) => HealthResponse::ok(),
        Err(err) => {
            warn!(error = %err, "remote health check failed (degraded mode)");
            HealthResponse::degraded()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dao::remote::MemoryRemote, state::app::tests::memory_state};

    #[tokio::test]
    async fn unreachable_remote_reports_degraded() {
        let remote = MemoryRemote::new();
        let state = memory_state(&remote);
        assert_eq!(health_status(&state).await.status, "ok");

        remote.set_reachable(false);
        let health = health_status(&state).await;
        assert_eq!(health.status, "degraded");
        assert!(!health.remote_reachable);
    }
}
