use axum::Router;

use crate::state::SharedState;

/// Community chat endpoints.
pub mod chat;
/// Document and collection endpoints.
pub mod collections;
/// Liveness endpoint.
pub mod health;
/// Device profile endpoints.
pub mod profile;
/// Server-sent events endpoint.
pub mod sse;
/// Join request and registration endpoints.
pub mod workflows;

/// Compose all route trees and wire in the shared state.
pub fn router(state: SharedState) -> Router<()> {
    health::router()
        .merge(sse::router())
        .merge(collections::router())
        .merge(profile::router())
        .merge(workflows::router())
        .merge(chat::router())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::{dao::remote::MemoryRemote, state::app::tests::memory_state};

    async fn call(
        app: Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn collections_round_trip_over_http() {
        let app = router(memory_state(&MemoryRemote::new()));

        let (status, _) = call(
            app.clone(),
            "PUT",
            "/api/collections/news",
            Some(json!({ "records": [{ "id": "n1", "title": "Finals" }] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(app, "GET", "/api/collections/news", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["records"][0]["title"], "Finals");
    }

    #[tokio::test]
    async fn unknown_collection_is_404() {
        let app = router(memory_state(&MemoryRemote::new()));
        let (status, body) = call(app, "GET", "/api/collections/scores", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["message"].as_str().unwrap().contains("scores"));
    }

    #[tokio::test]
    async fn invalid_profile_is_rejected() {
        let app = router(memory_state(&MemoryRemote::new()));
        let (status, _) = call(
            app,
            "PUT",
            "/api/profile",
            Some(json!({ "name": "   ", "age": 3 })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn workflow_requests_are_filed_and_decided() {
        let state = memory_state(&MemoryRemote::new());
        let app = router(state.clone());

        let (status, body) = call(
            app.clone(),
            "POST",
            "/api/workflows/community-join/4/requests",
            Some(json!({ "user_id": "U1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "pending");

        let (status, body) = call(
            app.clone(),
            "POST",
            "/api/workflows/community-join/4/U1/approve",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "approved");

        let (status, _) = call(
            app,
            "POST",
            "/api/workflows/community-join/4/U1/reject",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        state.close();
    }
}
