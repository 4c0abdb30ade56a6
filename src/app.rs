use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderValue, Method, StatusCode, Uri},
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::config::SecurityConfig;
use crate::database::DatabaseManager;
use crate::error::ApiError;
use crate::handlers;
use crate::middleware::{jwt_auth_middleware, require_admin};
use crate::services::identity::PICTURE_URL_PREFIX;
use crate::state::AppState;

/// Multipart framing allowance on top of the picture size limit
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn app(state: AppState) -> Router {
    let protected = Router::new()
        .merge(dashboard_routes())
        .merge(dataset_routes(&state))
        .merge(profile_routes(&state))
        .merge(admin_routes())
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_middleware));

    let router = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(auth_public_routes())
        // Protected API
        .merge(protected)
        .nest_service(
            PICTURE_URL_PREFIX.trim_end_matches('/'),
            ServeDir::new(&state.config.storage.picture_dir),
        )
        .fallback(route_not_found)
        .method_not_allowed_fallback(method_not_allowed);

    let router = if state.config.security.enable_cors {
        router.layer(cors_layer(&state.config.security))
    } else {
        router
    };
    let router = if state.config.api.enable_request_logging {
        router.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
    } else {
        router
    };

    router.with_state(state)
}

fn auth_public_routes() -> Router<AppState> {
    use axum::routing::post;
    use handlers::public::auth;

    Router::new()
        .route("/api/signup", post(auth::register_post))
        .route("/api/login", post(auth::login_post))
        .route("/api/forgot-password", post(auth::forgot_password_post))
        .route("/api/reset-password/:token", post(auth::reset_password_post))
}

fn dashboard_routes() -> Router<AppState> {
    use handlers::protected::dashboard;

    Router::new()
        .route("/api/stats", get(dashboard::stats_get))
        .route("/api/recent-files", get(dashboard::recent_files_get))
}

fn dataset_routes(state: &AppState) -> Router<AppState> {
    use axum::routing::post;
    use handlers::protected::datasets;

    Router::new()
        .route("/api/datasets", get(datasets::feed_get))
        .route(
            "/api/datasets/upload",
            post(datasets::dataset_upload_post).layer(DefaultBodyLimit::max(state.config.api.max_upload_bytes)),
        )
        .route(
            "/api/datasets/:id",
            get(datasets::dataset_get).patch(datasets::dataset_patch),
        )
        .route("/api/datasets/:id/download", get(datasets::dataset_download_get))
        .route("/api/datasets/:id/star", post(datasets::dataset_star_post))
        .route("/api/user/datasets", get(datasets::my_datasets_get))
}

fn profile_routes(state: &AppState) -> Router<AppState> {
    use axum::routing::{post, put};
    use handlers::protected::profile;

    let picture_limit = state.config.storage.max_picture_bytes + MULTIPART_OVERHEAD;

    Router::new()
        .route("/api/profile", get(profile::profile_get))
        .route("/api/profile/update", put(profile::profile_update_put))
        .route(
            "/api/profile/picture",
            post(profile::profile_picture_post).layer(DefaultBodyLimit::max(picture_limit)),
        )
}

fn admin_routes() -> Router<AppState> {
    use axum::routing::{delete, patch};
    use handlers::elevated::admin;

    Router::new()
        .route("/api/admin/users", get(admin::users::users_get).post(admin::users::users_post))
        .route(
            "/api/admin/users/:id",
            patch(admin::users::user_patch).delete(admin::users::user_delete),
        )
        .route("/api/admin/datasets/pending", get(admin::datasets::pending_get))
        .route("/api/admin/datasets/:id/status", patch(admin::datasets::status_patch))
        .route("/api/admin/datasets/:id", delete(admin::datasets::dataset_delete))
        .route_layer(from_fn(require_admin))
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if security.cors_origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

async fn route_not_found(uri: Uri) -> ApiError {
    ApiError::not_found(format!("No route for {}", uri.path()))
}

async fn method_not_allowed(method: Method, uri: Uri) -> ApiError {
    ApiError::method_not_allowed(format!("{} is not supported on {}", method, uri.path()))
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Datashare API",
            "version": version,
            "endpoints": {
                "public": "/api/signup, /api/login, /api/forgot-password, /api/reset-password/:token",
                "datasets": "/api/datasets[/:id[/download|/star]], /api/datasets/upload, /api/user/datasets (protected)",
                "dashboard": "/api/stats, /api/recent-files (protected)",
                "profile": "/api/profile, /api/profile/update, /api/profile/picture (protected)",
                "admin": "/api/admin/users[/:id], /api/admin/datasets/pending, /api/admin/datasets/:id[/status] (admin)",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check(&state.pool).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": {
                        "status": "degraded",
                        "timestamp": now
                    }
                })),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::storage::LocalFileStore;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn test_router() -> (Router, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::development();
        config.database.url = "postgres://datashare@127.0.0.1:9/unused".to_string();
        config.storage.picture_dir = dir.path().to_path_buf();
        config.api.enable_request_logging = false;

        let pool = DatabaseManager::connect_lazy(&config.database).unwrap();
        let store = Arc::new(LocalFileStore::open(dir.path()).await.unwrap());
        let state = AppState::new(config, pool, store.clone(), store);
        (app(state), dir)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn root_is_public() {
        let (router, _dir) = test_router().await;
        let response = router
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["success"], true);
    }

    #[tokio::test]
    async fn protected_routes_need_a_token() {
        let (router, _dir) = test_router().await;
        let response = router
            .oneshot(Request::get("/api/user/datasets").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["code"], "NO_TOKEN");
    }

    #[tokio::test]
    async fn unknown_routes_answer_with_json() {
        let (router, _dir) = test_router().await;
        let response = router
            .oneshot(Request::get("/api/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn admin_routes_reject_plain_users() {
        let (router, _dir) = test_router().await;
        let token = crate::auth::TokenService::from_config(&AppConfig::development().security)
            .issue_session(7, "user@example.test", crate::types::Role::User)
            .unwrap();
        let request = Request::get("/api/admin/users")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
