mod helpers;

use axum::http::{Method, StatusCode};

#[tokio::test]
async fn health_returns_200() {
    let ctx = helpers::TestContext::in_memory().await;

    let (status, body) = ctx.send(Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn health_db_returns_200_when_store_is_reachable() {
    let ctx = helpers::TestContext::in_memory().await;

    let (status, _) = ctx.send(Method::GET, "/health/db", None, None).await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn health_db_returns_500_when_store_is_unavailable() {
    let ctx = helpers::TestContext::in_memory().await;
    ctx.store.set_unavailable(true);

    let (status, body) = ctx.send(Method::GET, "/health/db", None, None).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "Internal server error");
}

#[tokio::test]
async fn health_db_returns_200_when_database_connected() {
    let Some(ctx) = helpers::PgTestContext::from_env().await else {
        return;
    };

    let (status, _) = helpers::send(&ctx.app, Method::GET, "/health/db", None, None).await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn health_db_returns_500_when_database_is_closed() {
    let Some(ctx) = helpers::PgTestContext::from_env().await else {
        return;
    };

    ctx.store.pool().close().await;

    let (status, _) = helpers::send(&ctx.app, Method::GET, "/health/db", None, None).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    let ctx = helpers::TestContext::in_memory().await;
    let response = ctx
        .app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert!(response.headers().contains_key("x-request-id"));
}
