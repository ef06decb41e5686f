use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::lifecycle::InvestmentError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<InvestmentError> for ApiError {
    fn from(err: InvestmentError) -> Self {
        let message = err.to_string();
        match err {
            InvestmentError::InvalidAmount
            | InvestmentError::InvalidAdjustmentAmount
            | InvestmentError::InsufficientFunds { .. }
            | InvestmentError::AmountOutOfRange { .. }
            | InvestmentError::UnknownPlanCategory(_) => ApiError::BadRequest(message),
            InvestmentError::NotAuthorized => ApiError::Forbidden(message),
            InvestmentError::PlanNotFound(_)
            | InvestmentError::UserNotFound(_)
            | InvestmentError::InvestmentNotFound(_)
            | InvestmentError::NoneFound(_) => ApiError::NotFound(message),
            InvestmentError::AlreadyProcessed { .. } => ApiError::Conflict(message),
            InvestmentError::InvalidPlanDuration(_) => ApiError::Internal(anyhow::anyhow!(message)),
            InvestmentError::Store(e) => ApiError::Internal(anyhow::Error::new(e)),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            ApiError::Internal(e) => {
                tracing::error!(error = ?e, "Internal server error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (
            status,
            Json(json!({
                "status": "error",
                "message": message,
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InvestmentStatus;
    use crate::store::StoreError;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    #[test]
    fn test_domain_errors_map_to_status_codes() {
        let cases = [
            (InvestmentError::InvalidAmount, StatusCode::BAD_REQUEST),
            (InvestmentError::InvalidAdjustmentAmount, StatusCode::BAD_REQUEST),
            (InvestmentError::NotAuthorized, StatusCode::FORBIDDEN),
            (
                InvestmentError::InvalidPlanDuration("Basic Plan".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                InvestmentError::PlanNotFound("Gold".into()),
                StatusCode::NOT_FOUND,
            ),
            (
                InvestmentError::AlreadyProcessed {
                    id: Uuid::nil(),
                    status: InvestmentStatus::Active,
                },
                StatusCode::CONFLICT,
            ),
            (
                InvestmentError::NoneFound("investments"),
                StatusCode::NOT_FOUND,
            ),
            (
                InvestmentError::Store(StoreError::Corrupt("bad row".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status_code(), expected);
        }
    }

    #[test]
    fn test_out_of_range_message_echoes_bounds() {
        let err = ApiError::from(InvestmentError::AmountOutOfRange {
            plan: "Basic Plan".into(),
            min: Decimal::from(100),
            max: Decimal::from(250),
        });
        assert_eq!(
            err.to_string(),
            "Amount must be between 100 and 250 for the Basic Plan plan."
        );
    }
}
