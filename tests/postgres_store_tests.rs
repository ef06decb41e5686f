/// Store transitions against a real database. Skipped unless DATABASE_URL is set.
mod helpers;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;
use wealthbuilders_backend::models::{
    AdjustOperation, ApprovalConfirmation, Investment, InvestmentStatus, LedgerField,
};
use wealthbuilders_backend::store::{InvestmentStore, LedgerStore, PlanStore, StoreError};

async fn insert_verified_user(pool: &sqlx::PgPool, balance: i64) -> Uuid {
    let user_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO users (id, name, email, role, is_verified, balance)
        VALUES ($1, $2, $3, 'subscriber', TRUE, $4)
        "#,
    )
    .bind(user_id)
    .bind("Store Test User")
    .bind(format!("store-{user_id}@example.com"))
    .bind(Decimal::from(balance))
    .execute(pool)
    .await
    .expect("Failed to insert user");
    user_id
}

fn pending_investment(user_id: Uuid, amount: i64, ends_in: Duration) -> Investment {
    let now = Utc::now();
    Investment {
        id: Uuid::new_v4(),
        user_id,
        plan: "Basic Plan".to_string(),
        amount: Decimal::from(amount),
        start_date: now,
        end_date: now + ends_in,
        maturity_amount: Decimal::new(783_333, 2),
        status: InvestmentStatus::Pending,
        admin_approval_confirmation: ApprovalConfirmation::Pending,
        approval_date: None,
        rejection_date: None,
    }
}

#[tokio::test]
async fn plans_are_seeded_once() {
    let Some(ctx) = helpers::PgTestContext::from_env().await else {
        return;
    };

    let plans = ctx.store.list_plans().await.unwrap();
    let basic: Vec<_> = plans.iter().filter(|p| p.name == "Basic Plan").collect();
    assert_eq!(basic.len(), 1);
    assert_eq!(basic[0].min_amount, Decimal::from(100));
}

#[tokio::test]
async fn activation_moves_funds_and_is_not_repeatable() {
    let Some(ctx) = helpers::PgTestContext::from_env().await else {
        return;
    };
    let user_id = insert_verified_user(ctx.store.pool(), 500).await;
    let investment = pending_investment(user_id, 200, Duration::days(1));
    ctx.store.insert_investment(&investment).await.unwrap();

    let (active, owner) = ctx
        .store
        .activate_investment(investment.id, Utc::now())
        .await
        .unwrap();
    assert_eq!(active.status, InvestmentStatus::Active);
    assert_eq!(active.admin_approval_confirmation, ApprovalConfirmation::Approved);
    assert_eq!(owner.balance, Decimal::from(300));
    assert_eq!(owner.investment_balance, Decimal::from(200));

    let err = ctx
        .store
        .activate_investment(investment.id, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::AlreadyProcessed {
            status: InvestmentStatus::Active,
            ..
        }
    ));
}

#[tokio::test]
async fn activation_without_funds_leaves_investment_pending() {
    let Some(ctx) = helpers::PgTestContext::from_env().await else {
        return;
    };
    let user_id = insert_verified_user(ctx.store.pool(), 100).await;
    let investment = pending_investment(user_id, 200, Duration::days(1));
    ctx.store.insert_investment(&investment).await.unwrap();

    let err = ctx
        .store
        .activate_investment(investment.id, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InsufficientFunds { .. }));

    let stored = ctx.store.find_investment(investment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, InvestmentStatus::Pending);
}

#[tokio::test]
async fn maturity_credits_payout_exactly_once() {
    let Some(ctx) = helpers::PgTestContext::from_env().await else {
        return;
    };
    let user_id = insert_verified_user(ctx.store.pool(), 500).await;
    let investment = pending_investment(user_id, 200, Duration::seconds(-1));
    ctx.store.insert_investment(&investment).await.unwrap();
    ctx.store
        .activate_investment(investment.id, Utc::now())
        .await
        .unwrap();

    let due = ctx
        .store
        .list_users_with_due_investments(Utc::now())
        .await
        .unwrap();
    assert!(due.contains(&user_id));

    let (ended, owner) = ctx
        .store
        .mature_investment(investment.id)
        .await
        .unwrap()
        .expect("investment should mature");
    assert_eq!(ended.status, InvestmentStatus::Ended);
    assert_eq!(owner.investment_balance, Decimal::ZERO);
    assert_eq!(owner.total_maturity_amount, Decimal::new(783_333, 2));

    assert!(ctx
        .store
        .mature_investment(investment.id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn deduct_below_zero_is_refused() {
    let Some(ctx) = helpers::PgTestContext::from_env().await else {
        return;
    };
    let user_id = insert_verified_user(ctx.store.pool(), 50).await;

    let err = ctx
        .store
        .adjust_ledger(
            user_id,
            LedgerField::Balance,
            AdjustOperation::Deduct,
            Decimal::from(60),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InsufficientFunds { .. }));

    let user = ctx
        .store
        .adjust_ledger(
            user_id,
            LedgerField::Balance,
            AdjustOperation::Add,
            Decimal::from(10),
        )
        .await
        .unwrap();
    assert_eq!(user.balance, Decimal::from(60));
}
