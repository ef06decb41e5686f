use std::sync::Arc;

use axum::{
    http::{HeaderName, Method},
    routing::{get, patch, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::handlers::{admin, health, investments};
use crate::lifecycle::InvestmentService;
use crate::store::Store;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<InvestmentService>,
    pub store: Arc<dyn Store>,
    jwt_secret: Arc<str>,
}

impl AppState {
    pub fn new(service: Arc<InvestmentService>, store: Arc<dyn Store>, jwt_secret: &str) -> Self {
        Self {
            service,
            store,
            jwt_secret: Arc::from(jwt_secret),
        }
    }

    pub fn jwt_secret(&self) -> &str {
        &self.jwt_secret
    }
}

pub fn create_app(state: AppState) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers(Any);

    let invest = Router::new()
        .route("/plans", get(investments::list_plans))
        .route("/start", post(investments::start_investment))
        .route("/total", get(investments::total_investment))
        .route("/history", get(investments::investment_history))
        .route("/maturity", post(investments::sweep_matured))
        .route("/transactions", get(investments::transaction_history))
        .route("/admin/pending", get(investments::pending_investments))
        .route("/:investment_id", get(investments::investment_details))
        .route("/:investment_id/approve", patch(investments::approve_investment))
        .route("/:investment_id/reject", patch(investments::reject_investment));

    let admin = Router::new()
        .route("/users/:user_id/balance", patch(admin::adjust_balance))
        .route(
            "/users/:user_id/total-maturity",
            patch(admin::adjust_total_maturity),
        );

    Router::new()
        .route("/health", get(health::health))
        .route("/health/db", get(health::health_db))
        .nest("/api/invest", invest)
        .nest("/api/admin", admin)
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(cors)
        .with_state(state)
}
