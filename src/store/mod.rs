//! Record store seams for plans, user ledgers, investments and activity.
//!
//! Every state transition that touches both an investment and its owner's
//! ledger is a single store call, so an implementation can run it in one
//! transaction with the status guard and the balance guard applied together.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    AdjustOperation, Investment, InvestmentStatus, LedgerField, LedgerTransaction, UserAccount,
    Withdrawal,
};
use crate::plans::InvestmentPlan;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("user {0} not found")]
    UserNotFound(Uuid),

    #[error("investment {0} not found")]
    InvestmentNotFound(Uuid),

    #[error("investment {id} is already {status}")]
    AlreadyProcessed { id: Uuid, status: InvestmentStatus },

    #[error("insufficient funds: available {available}, required {required}")]
    InsufficientFunds {
        available: Decimal,
        required: Decimal,
    },

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait PlanStore: Send + Sync {
    async fn list_plans(&self) -> StoreResult<Vec<InvestmentPlan>>;

    /// Returns `true` when the plan was inserted, `false` if the name exists.
    async fn insert_plan_if_absent(&self, plan: &InvestmentPlan) -> StoreResult<bool>;
}

/// Access to a user's money fields.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn find_user(&self, user_id: Uuid) -> StoreResult<Option<UserAccount>>;

    /// Adds to or deducts from one ledger field. A deduct only applies when
    /// the field covers `amount`.
    async fn adjust_ledger(
        &self,
        user_id: Uuid,
        field: LedgerField,
        operation: AdjustOperation,
        amount: Decimal,
    ) -> StoreResult<UserAccount>;
}

#[async_trait]
pub trait InvestmentStore: Send + Sync {
    async fn insert_investment(&self, investment: &Investment) -> StoreResult<()>;

    async fn find_investment(&self, id: Uuid) -> StoreResult<Option<Investment>>;

    /// A user's investments, newest start date first.
    async fn list_user_investments(&self, user_id: Uuid) -> StoreResult<Vec<Investment>>;

    /// A user's investments in one status, newest start date first.
    async fn list_user_investments_by_status(
        &self,
        user_id: Uuid,
        status: InvestmentStatus,
    ) -> StoreResult<Vec<Investment>>;

    /// All investments in one status, newest start date first.
    async fn list_investments_by_status(
        &self,
        status: InvestmentStatus,
    ) -> StoreResult<Vec<Investment>>;

    /// Owners of Active investments whose end date is at or before `now`.
    async fn list_users_with_due_investments(&self, now: DateTime<Utc>) -> StoreResult<Vec<Uuid>>;

    /// Pending → Active and debits `balance` into `investment_balance`.
    /// Applies nothing unless the investment is Pending and the owner's
    /// balance covers the amount.
    async fn activate_investment(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<(Investment, UserAccount)>;

    /// Pending → Rejected. Never touches the ledger.
    async fn reject_investment(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<Investment>;

    /// Active → Ended and credits the maturity amount. Returns `None` when
    /// the investment is no longer Active.
    async fn mature_investment(&self, id: Uuid) -> StoreResult<Option<(Investment, UserAccount)>>;
}

/// Ledger movements owned by the payments and withdrawals collaborators.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn list_user_transactions(&self, user_id: Uuid) -> StoreResult<Vec<LedgerTransaction>>;

    async fn list_user_withdrawals(&self, user_id: Uuid) -> StoreResult<Vec<Withdrawal>>;
}

#[async_trait]
pub trait Store: PlanStore + LedgerStore + InvestmentStore + ActivityStore {
    /// Round-trips to the backing store.
    async fn ping(&self) -> StoreResult<()>;
}
