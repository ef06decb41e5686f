use axum::{
    extract::State,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{amount_text, ApiJson, ApiPath};
use crate::api_error::ApiError;
use crate::app::AppState;
use crate::auth::AuthenticatedAdmin;
use crate::models::{AdjustOperation, LedgerField};

const INVALID_OPERATION: &str = "Invalid operation. Use 'add' or 'deduct'.";

#[derive(Debug, Deserialize)]
pub struct AdjustLedgerRequest {
    #[serde(default)]
    pub operation: String,
    #[serde(default)]
    pub amount: Value,
}

async fn adjust(
    state: &AppState,
    admin: &AuthenticatedAdmin,
    user_id: Uuid,
    field: LedgerField,
    req: &AdjustLedgerRequest,
) -> Result<Json<Value>, ApiError> {
    let operation: AdjustOperation = req
        .operation
        .parse()
        .map_err(|_| ApiError::BadRequest(INVALID_OPERATION.to_string()))?;
    let user = state
        .service
        .adjust_ledger(user_id, field, operation, &amount_text(&req.amount))
        .await?;
    tracing::info!(admin_id = %admin.0.admin_id, %user_id, ?field, "Admin adjusted ledger");

    let message = match field {
        LedgerField::Balance => "Balance updated successfully",
        LedgerField::TotalMaturityAmount => "Total maturity amount updated successfully",
    };
    Ok(Json(json!({
        "status": "success",
        "message": message,
        "user": user.profile(),
        "ledger": user.ledger(),
    })))
}

pub async fn adjust_balance(
    State(state): State<AppState>,
    admin: AuthenticatedAdmin,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<AdjustLedgerRequest>,
) -> Result<Json<Value>, ApiError> {
    adjust(&state, &admin, user_id, LedgerField::Balance, &req).await
}

pub async fn adjust_total_maturity(
    State(state): State<AppState>,
    admin: AuthenticatedAdmin,
    ApiPath(user_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<AdjustLedgerRequest>,
) -> Result<Json<Value>, ApiError> {
    adjust(&state, &admin, user_id, LedgerField::TotalMaturityAmount, &req).await
}
