use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, Transaction};
use uuid::Uuid;

use super::{
    ActivityStore, InvestmentStore, LedgerStore, PlanStore, Store, StoreError, StoreResult,
};
use crate::models::{
    AdjustOperation, Investment, InvestmentStatus, LedgerField, LedgerTransaction, UserAccount,
    Withdrawal,
};
use crate::plans::InvestmentPlan;

const USER_COLUMNS: &str = "id, name, email, role, is_verified, balance, investment_balance, \
                            total_maturity_amount, created_at";

const INVESTMENT_COLUMNS: &str = "id, user_id, plan, amount, start_date, end_date, \
                                  maturity_amount, status, admin_approval_confirmation, \
                                  approval_date, rejection_date";

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    role: String,
    is_verified: bool,
    balance: Decimal,
    investment_balance: Decimal,
    total_maturity_amount: Decimal,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for UserAccount {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(UserAccount {
            id: row.id,
            name: row.name,
            email: row.email,
            role: row.role.parse().map_err(StoreError::Corrupt)?,
            is_verified: row.is_verified,
            balance: row.balance,
            investment_balance: row.investment_balance,
            total_maturity_amount: row.total_maturity_amount,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct InvestmentRow {
    id: Uuid,
    user_id: Uuid,
    plan: String,
    amount: Decimal,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    maturity_amount: Decimal,
    status: String,
    admin_approval_confirmation: String,
    approval_date: Option<DateTime<Utc>>,
    rejection_date: Option<DateTime<Utc>>,
}

impl TryFrom<InvestmentRow> for Investment {
    type Error = StoreError;

    fn try_from(row: InvestmentRow) -> Result<Self, Self::Error> {
        Ok(Investment {
            id: row.id,
            user_id: row.user_id,
            plan: row.plan,
            amount: row.amount,
            start_date: row.start_date,
            end_date: row.end_date,
            maturity_amount: row.maturity_amount,
            status: row.status.parse().map_err(StoreError::Corrupt)?,
            admin_approval_confirmation: row
                .admin_approval_confirmation
                .parse()
                .map_err(StoreError::Corrupt)?,
            approval_date: row.approval_date,
            rejection_date: row.rejection_date,
        })
    }
}

#[derive(FromRow)]
struct PlanRow {
    name: String,
    min_amount: Decimal,
    max_amount: Decimal,
    duration_days: i32,
    interest_rate: Decimal,
}

impl TryFrom<PlanRow> for InvestmentPlan {
    type Error = StoreError;

    fn try_from(row: PlanRow) -> Result<Self, Self::Error> {
        let duration_days = u32::try_from(row.duration_days).map_err(|_| {
            StoreError::Corrupt(format!(
                "plan '{}' has negative duration {}",
                row.name, row.duration_days
            ))
        })?;
        Ok(InvestmentPlan {
            name: row.name,
            min_amount: row.min_amount,
            max_amount: row.max_amount,
            duration_days,
            interest_rate: row.interest_rate,
        })
    }
}

fn investments_from_rows(rows: Vec<InvestmentRow>) -> StoreResult<Vec<Investment>> {
    rows.into_iter().map(Investment::try_from).collect()
}

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Explains why a Pending-guarded update matched no row.
    async fn pending_guard_failure(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> StoreResult<StoreError> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM investments WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut **tx)
                .await?;

        match status {
            None => Ok(StoreError::InvestmentNotFound(id)),
            Some(status) => Ok(StoreError::AlreadyProcessed {
                id,
                status: status.parse().map_err(StoreError::Corrupt)?,
            }),
        }
    }

    /// Explains why a balance-guarded debit matched no row.
    async fn debit_guard_failure(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        column: &str,
        required: Decimal,
    ) -> StoreResult<StoreError> {
        let available: Option<Decimal> =
            sqlx::query_scalar(&format!("SELECT {column} FROM users WHERE id = $1"))
                .bind(user_id)
                .fetch_optional(&mut **tx)
                .await?;

        Ok(match available {
            None => StoreError::UserNotFound(user_id),
            Some(available) => StoreError::InsufficientFunds {
                available,
                required,
            },
        })
    }
}

#[async_trait]
impl PlanStore for PgStore {
    async fn list_plans(&self) -> StoreResult<Vec<InvestmentPlan>> {
        let rows: Vec<PlanRow> = sqlx::query_as(
            "SELECT name, min_amount, max_amount, duration_days, interest_rate \
             FROM investment_plans ORDER BY min_amount",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(InvestmentPlan::try_from).collect()
    }

    async fn insert_plan_if_absent(&self, plan: &InvestmentPlan) -> StoreResult<bool> {
        let duration_days = i32::try_from(plan.duration_days)
            .map_err(|_| StoreError::Corrupt(format!("plan '{}' duration too large", plan.name)))?;

        let result = sqlx::query(
            r#"
            INSERT INTO investment_plans (name, min_amount, max_amount, duration_days, interest_rate)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(&plan.name)
        .bind(plan.min_amount)
        .bind(plan.max_amount)
        .bind(duration_days)
        .bind(plan.interest_rate)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn find_user(&self, user_id: Uuid) -> StoreResult<Option<UserAccount>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(UserAccount::try_from).transpose()
    }

    async fn adjust_ledger(
        &self,
        user_id: Uuid,
        field: LedgerField,
        operation: AdjustOperation,
        amount: Decimal,
    ) -> StoreResult<UserAccount> {
        let column = field.column();
        let sql = match operation {
            AdjustOperation::Add => format!(
                "UPDATE users SET {column} = {column} + $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
            ),
            AdjustOperation::Deduct => format!(
                "UPDATE users SET {column} = {column} - $2 \
                 WHERE id = $1 AND {column} >= $2 RETURNING {USER_COLUMNS}"
            ),
        };

        let mut tx = self.pool.begin().await?;
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .bind(amount)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            return Err(Self::debit_guard_failure(&mut tx, user_id, column, amount).await?);
        };
        tx.commit().await?;
        UserAccount::try_from(row)
    }
}

#[async_trait]
impl InvestmentStore for PgStore {
    async fn insert_investment(&self, investment: &Investment) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO investments (
                id, user_id, plan, amount, start_date, end_date, maturity_amount,
                status, admin_approval_confirmation, approval_date, rejection_date
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(investment.id)
        .bind(investment.user_id)
        .bind(&investment.plan)
        .bind(investment.amount)
        .bind(investment.start_date)
        .bind(investment.end_date)
        .bind(investment.maturity_amount)
        .bind(investment.status.as_str())
        .bind(investment.admin_approval_confirmation.as_str())
        .bind(investment.approval_date)
        .bind(investment.rejection_date)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_investment(&self, id: Uuid) -> StoreResult<Option<Investment>> {
        let row: Option<InvestmentRow> = sqlx::query_as(&format!(
            "SELECT {INVESTMENT_COLUMNS} FROM investments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Investment::try_from).transpose()
    }

    async fn list_user_investments(&self, user_id: Uuid) -> StoreResult<Vec<Investment>> {
        let rows: Vec<InvestmentRow> = sqlx::query_as(&format!(
            "SELECT {INVESTMENT_COLUMNS} FROM investments \
             WHERE user_id = $1 ORDER BY start_date DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        investments_from_rows(rows)
    }

    async fn list_user_investments_by_status(
        &self,
        user_id: Uuid,
        status: InvestmentStatus,
    ) -> StoreResult<Vec<Investment>> {
        let rows: Vec<InvestmentRow> = sqlx::query_as(&format!(
            "SELECT {INVESTMENT_COLUMNS} FROM investments \
             WHERE user_id = $1 AND status = $2 ORDER BY start_date DESC"
        ))
        .bind(user_id)
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        investments_from_rows(rows)
    }

    async fn list_investments_by_status(
        &self,
        status: InvestmentStatus,
    ) -> StoreResult<Vec<Investment>> {
        let rows: Vec<InvestmentRow> = sqlx::query_as(&format!(
            "SELECT {INVESTMENT_COLUMNS} FROM investments \
             WHERE status = $1 ORDER BY start_date DESC"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        investments_from_rows(rows)
    }

    async fn list_users_with_due_investments(&self, now: DateTime<Utc>) -> StoreResult<Vec<Uuid>> {
        let owners: Vec<Uuid> = sqlx::query_scalar(
            "SELECT DISTINCT user_id FROM investments \
             WHERE status = 'Active' AND end_date <= $1 ORDER BY user_id",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(owners)
    }

    async fn activate_investment(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<(Investment, UserAccount)> {
        let mut tx = self.pool.begin().await?;

        let row: Option<InvestmentRow> = sqlx::query_as(&format!(
            "UPDATE investments \
             SET status = 'Active', admin_approval_confirmation = 'approved', approval_date = $2 \
             WHERE id = $1 AND status = 'Pending' \
             RETURNING {INVESTMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Err(Self::pending_guard_failure(&mut tx, id).await?);
        };
        let investment = Investment::try_from(row)?;

        let user: Option<UserRow> = sqlx::query_as(&format!(
            "UPDATE users \
             SET balance = balance - $2, investment_balance = investment_balance + $2 \
             WHERE id = $1 AND balance >= $2 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(investment.user_id)
        .bind(investment.amount)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(user) = user else {
            // Dropping `tx` rolls back the status change.
            return Err(Self::debit_guard_failure(
                &mut tx,
                investment.user_id,
                "balance",
                investment.amount,
            )
            .await?);
        };

        tx.commit().await?;
        Ok((investment, UserAccount::try_from(user)?))
    }

    async fn reject_investment(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<Investment> {
        let mut tx = self.pool.begin().await?;

        let row: Option<InvestmentRow> = sqlx::query_as(&format!(
            "UPDATE investments \
             SET status = 'Rejected', admin_approval_confirmation = 'rejected', rejection_date = $2 \
             WHERE id = $1 AND status = 'Pending' \
             RETURNING {INVESTMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Err(Self::pending_guard_failure(&mut tx, id).await?);
        };

        tx.commit().await?;
        Investment::try_from(row)
    }

    async fn mature_investment(&self, id: Uuid) -> StoreResult<Option<(Investment, UserAccount)>> {
        let mut tx = self.pool.begin().await?;

        let row: Option<InvestmentRow> = sqlx::query_as(&format!(
            "UPDATE investments SET status = 'Ended' \
             WHERE id = $1 AND status = 'Active' \
             RETURNING {INVESTMENT_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let investment = Investment::try_from(row)?;

        let user: Option<UserRow> = sqlx::query_as(&format!(
            "UPDATE users \
             SET total_maturity_amount = total_maturity_amount + $2, \
                 investment_balance = investment_balance - $3 \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(investment.user_id)
        .bind(investment.maturity_amount)
        .bind(investment.amount)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(user) = user else {
            return Err(StoreError::UserNotFound(investment.user_id));
        };

        tx.commit().await?;
        Ok(Some((investment, UserAccount::try_from(user)?)))
    }
}

#[async_trait]
impl ActivityStore for PgStore {
    async fn list_user_transactions(&self, user_id: Uuid) -> StoreResult<Vec<LedgerTransaction>> {
        let rows: Vec<(Uuid, Uuid, Decimal, String, String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT id, user_id, amount, status, transaction_id, created_at \
             FROM transactions WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, user_id, amount, status, transaction_id, created_at)| LedgerTransaction {
                    id,
                    user_id,
                    amount,
                    status,
                    transaction_id,
                    created_at,
                },
            )
            .collect())
    }

    async fn list_user_withdrawals(&self, user_id: Uuid) -> StoreResult<Vec<Withdrawal>> {
        let rows: Vec<(Uuid, Uuid, Decimal, String, String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT id, user_id, amount, status, wallet_address, request_date \
             FROM withdrawals WHERE user_id = $1 ORDER BY request_date DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, user_id, amount, status, wallet_address, request_date)| Withdrawal {
                    id,
                    user_id,
                    amount,
                    status,
                    wallet_address,
                    request_date,
                },
            )
            .collect())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
