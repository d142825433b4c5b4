use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::{scheduling_routes, AppState};

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "VitalLife API is running!" }))
        .nest("/scheduling", scheduling_routes(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::{Request, StatusCode}};
    use tower::ServiceExt;

    use shared_utils::test_utils::TestConfig;

    fn app() -> Router {
        let state = AppState::from_config(TestConfig::default().to_app_config()).unwrap();
        create_router(Arc::new(state))
    }

    #[tokio::test]
    async fn test_root_is_public() {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_scheduling_requires_token() {
        let response = app()
            .oneshot(Request::builder().uri("/scheduling/doctors").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
