// [apps/controller/src/routes.rs]
//! HTTP surface (§6.1). Every route lives under `/api/distribution`, guarded
//! by a single bearer-token check; `/health` sits outside that layer so an
//! orchestrator's liveness probe never needs the token.

use std::time::Duration;

use axum::http::{header, Method};
use axum::routing::{get, post, put};
use axum::{middleware, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{devices, management, tasks};
use crate::middleware::auth_guard;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let device_routes = Router::new()
        .route("/register", post(devices::register_device))
        .route("/", get(devices::list_devices))
        .route("/:device_id", get(devices::get_device))
        .route("/:device_id/heartbeat", post(devices::heartbeat))
        .route("/:device_id/status", put(devices::set_device_status));

    let task_routes = Router::new()
        .route("/", post(tasks::create_task).get(tasks::list_tasks))
        .route("/:task_id", get(tasks::get_task))
        .route("/assign", post(tasks::assign_task))
        .route("/status", put(tasks::update_task_status))
        .route("/:device_id/pull", get(tasks::pull_tasks));

    let management_routes = Router::new()
        .route("/rebalance", post(management::trigger_rebalance))
        .route("/cleanup", post(management::cleanup))
        .route("/reset-failed", post(management::reset_failed));

    let api = Router::new()
        .nest("/devices", device_routes)
        .nest("/tasks", task_routes)
        .nest("/management", management_routes)
        .route("/stats/overview", get(management::stats_overview))
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .nest("/api/distribution", api)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(cors)
        .with_state(state)
}
