use serde::Serialize;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Whether the remote service answered its health check.
    pub remote_reachable: bool,
}

impl HealthResponse {
    /// Create a health response indicating the remote service is reachable.
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            remote_reachable: true,
        }
    }

    /// Create a health response indicating the daemon runs on cached data only.
    pub fn degraded() -> Self {
        Self {
            status: "degraded".to_string(),
            remote_reachable: false,
        }
    }
}
