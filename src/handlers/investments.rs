use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::{amount_text, ApiJson, ApiPath};
use crate::api_error::ApiError;
use crate::app::AppState;
use crate::auth::{AuthenticatedAdmin, AuthenticatedUser};

type ApiResult = Result<Json<Value>, ApiError>;

#[derive(Debug, Deserialize)]
pub struct StartInvestmentRequest {
    #[serde(default)]
    pub plan_name: String,
    #[serde(default)]
    pub amount: Value,
}

pub async fn list_plans(State(state): State<AppState>) -> ApiResult {
    Ok(Json(json!({
        "status": "success",
        "plans": state.service.list_plans(),
    })))
}

pub async fn start_investment(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiJson(req): ApiJson<StartInvestmentRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let investment = state
        .service
        .start_investment(claims.user_id, &req.plan_name, &amount_text(&req.amount))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "message": format!(
                "Investment of ${} in {} is on hold pending admin approval.",
                investment.amount, investment.plan
            ),
            "investment": investment,
        })),
    ))
}

pub async fn approve_investment(
    State(state): State<AppState>,
    AuthenticatedAdmin(admin): AuthenticatedAdmin,
    ApiPath(investment_id): ApiPath<Uuid>,
) -> ApiResult {
    let investment = state.service.approve_investment(investment_id).await?;
    tracing::info!(admin_id = %admin.admin_id, %investment_id, "Admin approved investment");

    Ok(Json(json!({
        "status": "success",
        "message": format!(
            "Investment {investment_id} has been approved and added to the user's investment balance."
        ),
        "investment": investment,
    })))
}

pub async fn reject_investment(
    State(state): State<AppState>,
    AuthenticatedAdmin(admin): AuthenticatedAdmin,
    ApiPath(investment_id): ApiPath<Uuid>,
) -> ApiResult {
    let investment = state.service.reject_investment(investment_id).await?;
    tracing::info!(admin_id = %admin.admin_id, %investment_id, "Admin rejected investment");

    Ok(Json(json!({
        "status": "success",
        "message": format!("Investment {investment_id} has been rejected."),
        "investment": investment,
    })))
}

pub async fn total_investment(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> ApiResult {
    let total = state.service.total_investment(claims.user_id).await?;
    Ok(Json(json!({
        "status": "success",
        "total_investment_amount": total,
    })))
}

pub async fn investment_history(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> ApiResult {
    let investments = state.service.investment_history(claims.user_id).await?;
    Ok(Json(json!({
        "status": "success",
        "message": "Investment history fetched successfully.",
        "investments": investments,
    })))
}

pub async fn sweep_matured(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> ApiResult {
    let report = state.service.sweep_matured(claims.user_id).await?;
    Ok(Json(json!({
        "status": "success",
        "message": "Maturity amounts deposited successfully.",
        "matured": report.matured,
        "user_balance": report.ledger.balance,
        "investment_balance": report.ledger.investment_balance,
        "total_maturity_amount": report.ledger.total_maturity_amount,
    })))
}

pub async fn transaction_history(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> ApiResult {
    let history = state.service.transaction_history(claims.user_id).await?;
    Ok(Json(json!({
        "status": "success",
        "message": "Transaction history fetched successfully.",
        "history": history,
    })))
}

pub async fn investment_details(
    State(state): State<AppState>,
    ApiPath(investment_id): ApiPath<Uuid>,
) -> ApiResult {
    let details = state.service.investment_details(investment_id).await?;
    Ok(Json(json!({
        "status": "success",
        "message": "Investment details retrieved successfully.",
        "investment": details,
    })))
}

pub async fn pending_investments(
    State(state): State<AppState>,
    AuthenticatedAdmin(_): AuthenticatedAdmin,
) -> ApiResult {
    let pending = state.service.pending_investments().await?;
    Ok(Json(json!({
        "status": "success",
        "message": "Pending investments retrieved successfully.",
        "pending_investments": pending,
    })))
}
