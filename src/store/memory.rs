use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    ActivityStore, InvestmentStore, LedgerStore, PlanStore, Store, StoreError, StoreResult,
};
use crate::models::{
    AdjustOperation, ApprovalConfirmation, Investment, InvestmentStatus, LedgerField,
    LedgerTransaction, UserAccount, Withdrawal,
};
use crate::plans::InvestmentPlan;

#[derive(Default)]
struct MemoryState {
    plans: Vec<InvestmentPlan>,
    users: HashMap<Uuid, UserAccount>,
    investments: HashMap<Uuid, Investment>,
    transactions: Vec<LedgerTransaction>,
    withdrawals: Vec<Withdrawal>,
}

/// Process-local store. One lock guards all records, so every trait call is
/// atomic with respect to every other.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user: UserAccount) {
        self.state.lock().await.users.insert(user.id, user);
    }

    pub async fn insert_transaction(&self, transaction: LedgerTransaction) {
        self.state.lock().await.transactions.push(transaction);
    }

    pub async fn insert_withdrawal(&self, withdrawal: Withdrawal) {
        self.state.lock().await.withdrawals.push(withdrawal);
    }

    /// Makes `ping` fail, as a closed connection pool would.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

fn newest_first(mut investments: Vec<Investment>) -> Vec<Investment> {
    investments.sort_by(|a, b| b.start_date.cmp(&a.start_date));
    investments
}

#[async_trait]
impl PlanStore for MemoryStore {
    async fn list_plans(&self) -> StoreResult<Vec<InvestmentPlan>> {
        Ok(self.state.lock().await.plans.clone())
    }

    async fn insert_plan_if_absent(&self, plan: &InvestmentPlan) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        if state.plans.iter().any(|p| p.name == plan.name) {
            return Ok(false);
        }
        state.plans.push(plan.clone());
        Ok(true)
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn find_user(&self, user_id: Uuid) -> StoreResult<Option<UserAccount>> {
        Ok(self.state.lock().await.users.get(&user_id).cloned())
    }

    async fn adjust_ledger(
        &self,
        user_id: Uuid,
        field: LedgerField,
        operation: AdjustOperation,
        amount: Decimal,
    ) -> StoreResult<UserAccount> {
        let mut state = self.state.lock().await;
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or(StoreError::UserNotFound(user_id))?;

        let value = match field {
            LedgerField::Balance => &mut user.balance,
            LedgerField::TotalMaturityAmount => &mut user.total_maturity_amount,
        };
        match operation {
            AdjustOperation::Add => *value += amount,
            AdjustOperation::Deduct => {
                if *value < amount {
                    return Err(StoreError::InsufficientFunds {
                        available: *value,
                        required: amount,
                    });
                }
                *value -= amount;
            }
        }
        Ok(user.clone())
    }
}

#[async_trait]
impl InvestmentStore for MemoryStore {
    async fn insert_investment(&self, investment: &Investment) -> StoreResult<()> {
        self.state
            .lock()
            .await
            .investments
            .insert(investment.id, investment.clone());
        Ok(())
    }

    async fn find_investment(&self, id: Uuid) -> StoreResult<Option<Investment>> {
        Ok(self.state.lock().await.investments.get(&id).cloned())
    }

    async fn list_user_investments(&self, user_id: Uuid) -> StoreResult<Vec<Investment>> {
        let state = self.state.lock().await;
        Ok(newest_first(
            state
                .investments
                .values()
                .filter(|i| i.user_id == user_id)
                .cloned()
                .collect(),
        ))
    }

    async fn list_user_investments_by_status(
        &self,
        user_id: Uuid,
        status: InvestmentStatus,
    ) -> StoreResult<Vec<Investment>> {
        let state = self.state.lock().await;
        Ok(newest_first(
            state
                .investments
                .values()
                .filter(|i| i.user_id == user_id && i.status == status)
                .cloned()
                .collect(),
        ))
    }

    async fn list_investments_by_status(
        &self,
        status: InvestmentStatus,
    ) -> StoreResult<Vec<Investment>> {
        let state = self.state.lock().await;
        Ok(newest_first(
            state
                .investments
                .values()
                .filter(|i| i.status == status)
                .cloned()
                .collect(),
        ))
    }

    async fn list_users_with_due_investments(&self, now: DateTime<Utc>) -> StoreResult<Vec<Uuid>> {
        let state = self.state.lock().await;
        let owners: BTreeSet<Uuid> = state
            .investments
            .values()
            .filter(|i| i.is_due(now))
            .map(|i| i.user_id)
            .collect();
        Ok(owners.into_iter().collect())
    }

    async fn activate_investment(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<(Investment, UserAccount)> {
        let mut state = self.state.lock().await;
        let MemoryState {
            users, investments, ..
        } = &mut *state;

        let investment = investments
            .get_mut(&id)
            .ok_or(StoreError::InvestmentNotFound(id))?;
        if !investment.status.can_transition_to(InvestmentStatus::Active) {
            return Err(StoreError::AlreadyProcessed {
                id,
                status: investment.status,
            });
        }

        let user = users
            .get_mut(&investment.user_id)
            .ok_or(StoreError::UserNotFound(investment.user_id))?;
        if user.balance < investment.amount {
            return Err(StoreError::InsufficientFunds {
                available: user.balance,
                required: investment.amount,
            });
        }

        user.balance -= investment.amount;
        user.investment_balance += investment.amount;
        investment.status = InvestmentStatus::Active;
        investment.admin_approval_confirmation = ApprovalConfirmation::Approved;
        investment.approval_date = Some(at);

        Ok((investment.clone(), user.clone()))
    }

    async fn reject_investment(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<Investment> {
        let mut state = self.state.lock().await;
        let investment = state
            .investments
            .get_mut(&id)
            .ok_or(StoreError::InvestmentNotFound(id))?;
        if !investment.status.can_transition_to(InvestmentStatus::Rejected) {
            return Err(StoreError::AlreadyProcessed {
                id,
                status: investment.status,
            });
        }

        investment.status = InvestmentStatus::Rejected;
        investment.admin_approval_confirmation = ApprovalConfirmation::Rejected;
        investment.rejection_date = Some(at);
        Ok(investment.clone())
    }

    async fn mature_investment(&self, id: Uuid) -> StoreResult<Option<(Investment, UserAccount)>> {
        let mut state = self.state.lock().await;
        let MemoryState {
            users, investments, ..
        } = &mut *state;

        let investment = investments
            .get_mut(&id)
            .ok_or(StoreError::InvestmentNotFound(id))?;
        if !investment.status.can_transition_to(InvestmentStatus::Ended) {
            return Ok(None);
        }
        let user = users
            .get_mut(&investment.user_id)
            .ok_or(StoreError::UserNotFound(investment.user_id))?;

        user.total_maturity_amount += investment.maturity_amount;
        user.investment_balance -= investment.amount;
        investment.status = InvestmentStatus::Ended;

        Ok(Some((investment.clone(), user.clone())))
    }
}

#[async_trait]
impl ActivityStore for MemoryStore {
    async fn list_user_transactions(&self, user_id: Uuid) -> StoreResult<Vec<LedgerTransaction>> {
        let state = self.state.lock().await;
        let mut transactions: Vec<_> = state
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(transactions)
    }

    async fn list_user_withdrawals(&self, user_id: Uuid) -> StoreResult<Vec<Withdrawal>> {
        let state = self.state.lock().await;
        let mut withdrawals: Vec<_> = state
            .withdrawals
            .iter()
            .filter(|w| w.user_id == user_id)
            .cloned()
            .collect();
        withdrawals.sort_by(|a, b| b.request_date.cmp(&a.request_date));
        Ok(withdrawals)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        Ok(())
    }
}
