#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use uuid::Uuid;
use wealthbuilders_backend::auth::{expiry_after, issue_token, AdminClaims, UserClaims, ADMIN_ROLE};
use wealthbuilders_backend::clock::ManualClock;
use wealthbuilders_backend::lifecycle::InvestmentService;
use wealthbuilders_backend::models::UserAccount;
use wealthbuilders_backend::notifications::{
    notification_channel, EmailMessage, MemoryMailer, NotificationWorker,
};
use wealthbuilders_backend::plans::{default_plans, seed_plans};
use wealthbuilders_backend::store::{MemoryStore, PgStore, Store};
use wealthbuilders_backend::{create_app, AppState};

pub const JWT_SECRET: &str = "integration-test-secret";

pub struct TestContext {
    pub app: Router,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub mailer: Arc<MemoryMailer>,
    pub shutdown: CancellationToken,
}

impl TestContext {
    /// A full app over the in-memory store, with a manual clock and a
    /// recording mailer.
    pub async fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        ));
        let mailer = Arc::new(MemoryMailer::new());
        let shutdown = CancellationToken::new();

        let catalog = seed_plans(store.as_ref(), &default_plans())
            .await
            .expect("failed to seed plans");
        let (notifier, rx) = notification_channel(64);
        NotificationWorker::new(rx, mailer.clone(), "http://frontend.test").spawn(shutdown.clone());

        let service = Arc::new(InvestmentService::new(
            store.clone(),
            Arc::new(catalog),
            notifier,
            clock.clone(),
            "admin@example.com",
        ));
        let app = create_app(AppState::new(service, store.clone(), JWT_SECRET));

        Self {
            app,
            store,
            clock,
            mailer,
            shutdown,
        }
    }

    pub async fn verified_user(&self, balance: i64) -> Uuid {
        let mut user = UserAccount::new("Ada Lovelace", &format!("{}@example.com", Uuid::new_v4()));
        user.is_verified = true;
        user.balance = Decimal::from(balance);
        let id = user.id;
        self.store.insert_user(user).await;
        id
    }

    pub async fn unverified_user(&self, balance: i64) -> Uuid {
        let mut user = UserAccount::new("Grace Hopper", &format!("{}@example.com", Uuid::new_v4()));
        user.balance = Decimal::from(balance);
        let id = user.id;
        self.store.insert_user(user).await;
        id
    }

    /// Waits for the notification worker to deliver at least `count` emails.
    pub async fn wait_for_emails(&self, count: usize) -> Vec<EmailMessage> {
        for _ in 0..100 {
            let sent = self.mailer.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        self.mailer.sent()
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        send(&self.app, method, uri, token, body).await
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// An app backed by Postgres at `DATABASE_URL`. `None` when the variable is
/// unset, so database tests skip on machines without one.
pub struct PgTestContext {
    pub app: Router,
    pub store: PgStore,
}

impl PgTestContext {
    pub async fn from_env() -> Option<Self> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let store = PgStore::connect(&url, 2)
            .await
            .expect("failed to connect to test database");
        store.migrate().await.expect("failed to run migrations");

        let catalog = seed_plans(&store, &default_plans())
            .await
            .expect("failed to seed plans");
        let (notifier, _rx) = notification_channel(16);
        let shared: Arc<dyn Store> = Arc::new(store.clone());
        let service = Arc::new(InvestmentService::new(
            shared.clone(),
            Arc::new(catalog),
            notifier,
            Arc::new(ManualClock::new(Utc::now())),
            "admin@example.com",
        ));
        let app = create_app(AppState::new(service, shared, JWT_SECRET));

        Some(Self { app, store })
    }
}

pub fn user_token(user_id: Uuid) -> String {
    let claims = UserClaims {
        user_id,
        email: format!("test-{user_id}@example.com"),
        exp: expiry_after(Duration::hours(1)),
    };
    issue_token(&claims, JWT_SECRET).expect("Failed to generate user token")
}

pub fn admin_token() -> String {
    admin_token_with_role(ADMIN_ROLE)
}

pub fn admin_token_with_role(role: &str) -> String {
    let claims = AdminClaims {
        admin_id: Uuid::new_v4(),
        email: "admin@example.com".to_string(),
        role: role.to_string(),
        exp: expiry_after(Duration::hours(1)),
    };
    issue_token(&claims, JWT_SECRET).expect("Failed to generate admin token")
}

pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    send_raw(app, method, uri, token, body.map(|json| json.to_string())).await
}

/// Like [`send`], with the JSON body passed through as raw text.
pub async fn send_raw(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<String>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(text) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(text))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("request failed");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}
