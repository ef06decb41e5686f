use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::api_error::ApiError;
use crate::app::AppState;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn health_db(State(state): State<AppState>) -> Result<(StatusCode, Json<Value>), ApiError> {
    state
        .store
        .ping()
        .await
        .map_err(|e| ApiError::Internal(anyhow::Error::new(e).context("database health check failed")))?;

    Ok((StatusCode::OK, Json(json!({ "status": "ok", "database": "connected" }))))
}
