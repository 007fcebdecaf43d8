// [apps/controller/src/middleware.rs]
//! Bearer-token guard for the control API (§4.8). Simplified relative to a
//! dual worker/operator token scheme: this system has one kind of caller
//! and one shared secret, so a single comparison is the whole guard.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::http::header;

use crate::errors::ApiError;
use crate::state::AppState;

pub async fn auth_guard(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let presented = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    if state.is_authorized(presented) {
        next.run(req).await
    } else {
        ApiError::Unauthorized.into_response()
    }
}
