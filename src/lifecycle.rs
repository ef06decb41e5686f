//! Investment lifecycle: request, admin decision, maturity.
//!
//! ```text
//! Pending ──approve──▶ Active ──sweep (end_date ≤ now)──▶ Ended
//!    └──────reject───▶ Rejected
//! ```
//!
//! Creating an investment checks the balance but holds nothing. Funds move
//! at approval, when the store debits `balance` into `investment_balance`
//! only if the balance still covers the principal.
//!
//! Maturity is swept lazily: an Active investment past its end date stays
//! Active in storage until [`InvestmentService::sweep_matured`] runs for its
//! owner (typically on dashboard load) or [`InvestmentService::sweep_due`]
//! runs from a scheduler. History views already display such records as
//! Ended.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::history::{merge_history, HistoryEntry};
use crate::models::{
    AdjustOperation, ApprovalConfirmation, Investment, InvestmentStatus, LedgerField,
    LedgerSnapshot, UserAccount, UserProfile,
};
use crate::notifications::{Notification, NotificationDispatcher};
use crate::plans::{InvestmentPlan, MaturityBand, PlanCatalog};
use crate::store::{Store, StoreError};

#[derive(Debug, Error)]
pub enum InvestmentError {
    #[error("Invalid investment amount.")]
    InvalidAmount,

    #[error("Invalid amount.")]
    InvalidAdjustmentAmount,

    #[error("User is not verified.")]
    NotAuthorized,

    #[error("Insufficient balance.")]
    InsufficientFunds {
        available: Decimal,
        required: Decimal,
    },

    #[error("Investment plan not found.")]
    PlanNotFound(String),

    #[error("Amount must be between {min} and {max} for the {plan} plan.")]
    AmountOutOfRange {
        plan: String,
        min: Decimal,
        max: Decimal,
    },

    #[error("Plan {0} has no maturity band.")]
    UnknownPlanCategory(String),

    #[error("Plan {0} has a duration outside the supported date range.")]
    InvalidPlanDuration(String),

    #[error("User not found.")]
    UserNotFound(Uuid),

    #[error("Investment not found.")]
    InvestmentNotFound(Uuid),

    #[error("Investment is already processed.")]
    AlreadyProcessed {
        id: Uuid,
        status: InvestmentStatus,
    },

    #[error("No {0} found.")]
    NoneFound(&'static str),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for InvestmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UserNotFound(id) => InvestmentError::UserNotFound(id),
            StoreError::InvestmentNotFound(id) => InvestmentError::InvestmentNotFound(id),
            StoreError::AlreadyProcessed { id, status } => {
                InvestmentError::AlreadyProcessed { id, status }
            }
            StoreError::InsufficientFunds {
                available,
                required,
            } => InvestmentError::InsufficientFunds {
                available,
                required,
            },
            other => InvestmentError::Store(other),
        }
    }
}

pub type InvestmentResult<T> = Result<T, InvestmentError>;

/// Parses a user-supplied principal. Accepts plain decimal notation only.
pub fn parse_amount(raw: &str) -> InvestmentResult<Decimal> {
    let amount = Decimal::from_str(raw.trim()).map_err(|_| InvestmentError::InvalidAmount)?;
    if amount <= Decimal::ZERO {
        return Err(InvestmentError::InvalidAmount);
    }
    Ok(amount)
}

/// One row of a user's investment history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvestmentHistoryItem {
    pub investment_id: Uuid,
    pub plan: String,
    pub amount: Decimal,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub maturity_amount: Decimal,
    pub status: InvestmentStatus,
}

/// An investment with its owner's public details.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvestmentDetails {
    #[serde(flatten)]
    pub investment: Investment,
    pub owner: Option<UserProfile>,
}

/// Outcome of a maturity sweep for one user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepReport {
    pub user_id: Uuid,
    pub matured: Vec<Investment>,
    pub ledger: LedgerSnapshot,
}

/// A plan with its payout band, when it has one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanOffer {
    #[serde(flatten)]
    pub plan: InvestmentPlan,
    pub maturity_band: Option<MaturityBand>,
}

pub struct InvestmentService {
    store: Arc<dyn Store>,
    catalog: Arc<PlanCatalog>,
    notifier: NotificationDispatcher,
    clock: Arc<dyn Clock>,
    admin_email: String,
}

impl InvestmentService {
    pub fn new(
        store: Arc<dyn Store>,
        catalog: Arc<PlanCatalog>,
        notifier: NotificationDispatcher,
        clock: Arc<dyn Clock>,
        admin_email: impl Into<String>,
    ) -> Self {
        Self {
            store,
            catalog,
            notifier,
            clock,
            admin_email: admin_email.into(),
        }
    }

    pub fn list_plans(&self) -> Vec<PlanOffer> {
        self.catalog
            .plans()
            .into_iter()
            .map(|plan| PlanOffer {
                plan: plan.clone(),
                maturity_band: plan.category().map(|c| c.band()),
            })
            .collect()
    }

    async fn require_user(&self, user_id: Uuid) -> InvestmentResult<UserAccount> {
        self.store
            .find_user(user_id)
            .await?
            .ok_or(InvestmentError::UserNotFound(user_id))
    }

    /// Records a Pending investment for admin review.
    #[instrument(skip_all, fields(%user_id, plan = %plan_name))]
    pub async fn start_investment(
        &self,
        user_id: Uuid,
        plan_name: &str,
        raw_amount: &str,
    ) -> InvestmentResult<Investment> {
        let amount = parse_amount(raw_amount)?;

        let user = match self.store.find_user(user_id).await? {
            Some(user) if user.can_invest() => user,
            _ => return Err(InvestmentError::NotAuthorized),
        };

        if user.balance < amount {
            return Err(InvestmentError::InsufficientFunds {
                available: user.balance,
                required: amount,
            });
        }

        let plan = self
            .catalog
            .get(plan_name)
            .ok_or_else(|| InvestmentError::PlanNotFound(plan_name.to_string()))?;

        if !plan.accepts(amount) {
            return Err(InvestmentError::AmountOutOfRange {
                plan: plan.name.clone(),
                min: plan.min_amount,
                max: plan.max_amount,
            });
        }

        let band = plan
            .category()
            .ok_or_else(|| InvestmentError::UnknownPlanCategory(plan.name.clone()))?
            .band();

        let now = self.clock.now();
        let end_date = now
            .checked_add_signed(Duration::days(i64::from(plan.duration_days)))
            .ok_or_else(|| InvestmentError::InvalidPlanDuration(plan.name.clone()))?;
        let investment = Investment {
            id: Uuid::new_v4(),
            user_id,
            plan: plan.name.clone(),
            amount,
            start_date: now,
            end_date,
            maturity_amount: band.maturity_for(plan, amount),
            status: InvestmentStatus::Pending,
            admin_approval_confirmation: ApprovalConfirmation::Pending,
            approval_date: None,
            rejection_date: None,
        };

        self.store.insert_investment(&investment).await?;
        info!(
            investment_id = %investment.id,
            %amount,
            maturity_amount = %investment.maturity_amount,
            "Investment created, awaiting approval"
        );

        self.notifier.dispatch(Notification::InvestmentCreated {
            admin_email: self.admin_email.clone(),
            owner: user.profile(),
            investment: investment.clone(),
        });

        Ok(investment)
    }

    /// Pending → Active, moving the principal into `investment_balance`.
    ///
    /// Fails with `InsufficientFunds` if the owner's balance no longer covers
    /// the principal; the investment then stays Pending.
    #[instrument(skip_all, fields(%investment_id))]
    pub async fn approve_investment(&self, investment_id: Uuid) -> InvestmentResult<Investment> {
        let (investment, owner) = self
            .store
            .activate_investment(investment_id, self.clock.now())
            .await
            .map_err(|e| {
                if let StoreError::InsufficientFunds { .. } = e {
                    warn!(%investment_id, "Balance no longer covers investment at approval");
                }
                InvestmentError::from(e)
            })?;

        info!(
            user_id = %owner.id,
            amount = %investment.amount,
            balance = %owner.balance,
            investment_balance = %owner.investment_balance,
            "Investment approved"
        );

        self.notifier.dispatch(Notification::InvestmentApproved {
            owner: owner.profile(),
            investment: investment.clone(),
        });

        Ok(investment)
    }

    /// Pending → Rejected. The ledger is untouched.
    #[instrument(skip_all, fields(%investment_id))]
    pub async fn reject_investment(&self, investment_id: Uuid) -> InvestmentResult<Investment> {
        let investment = self
            .store
            .reject_investment(investment_id, self.clock.now())
            .await?;
        info!(user_id = %investment.user_id, "Investment rejected");

        match self.store.find_user(investment.user_id).await {
            Ok(Some(owner)) => self.notifier.dispatch(Notification::InvestmentRejected {
                owner: owner.profile(),
                investment: investment.clone(),
            }),
            Ok(None) => warn!(user_id = %investment.user_id, "Owner missing, rejection not emailed"),
            Err(e) => warn!(error = %e, "Owner lookup failed, rejection not emailed"),
        }

        Ok(investment)
    }

    /// Realized payouts so far.
    pub async fn total_investment(&self, user_id: Uuid) -> InvestmentResult<Decimal> {
        Ok(self.require_user(user_id).await?.total_maturity_amount)
    }

    /// The user's investments, newest first, with display status.
    pub async fn investment_history(
        &self,
        user_id: Uuid,
    ) -> InvestmentResult<Vec<InvestmentHistoryItem>> {
        let investments = self.store.list_user_investments(user_id).await?;
        if investments.is_empty() {
            return Err(InvestmentError::NoneFound("investments"));
        }

        let now = self.clock.now();
        Ok(investments
            .into_iter()
            .map(|inv| InvestmentHistoryItem {
                investment_id: inv.id,
                status: inv.display_status(now),
                plan: inv.plan,
                amount: inv.amount,
                start_date: inv.start_date,
                end_date: inv.end_date,
                maturity_amount: inv.maturity_amount,
            })
            .collect())
    }

    /// Finalizes every Active investment of `user_id` whose end date has
    /// passed. Each investment is finalized atomically with its ledger
    /// credit; Ended records are never picked up again.
    #[instrument(skip_all, fields(%user_id))]
    pub async fn sweep_matured(&self, user_id: Uuid) -> InvestmentResult<SweepReport> {
        let mut user = self.require_user(user_id).await?;
        let now = self.clock.now();

        let active = self
            .store
            .list_user_investments_by_status(user_id, InvestmentStatus::Active)
            .await?;

        let mut matured = Vec::new();
        for investment in active.into_iter().filter(|i| i.end_date <= now) {
            let Some((ended, owner)) = self.store.mature_investment(investment.id).await? else {
                continue;
            };
            info!(
                investment_id = %ended.id,
                maturity_amount = %ended.maturity_amount,
                "Investment matured"
            );
            self.notifier.dispatch(Notification::InvestmentMatured {
                owner: owner.profile(),
                investment: ended.clone(),
            });
            user = owner;
            matured.push(ended);
        }

        Ok(SweepReport {
            user_id,
            matured,
            ledger: user.ledger(),
        })
    }

    /// Sweeps every user with a due investment. Safe to call on a timer.
    pub async fn sweep_due(&self) -> InvestmentResult<Vec<SweepReport>> {
        let owners = self
            .store
            .list_users_with_due_investments(self.clock.now())
            .await?;

        let mut reports = Vec::with_capacity(owners.len());
        for user_id in owners {
            match self.sweep_matured(user_id).await {
                Ok(report) => reports.push(report),
                Err(e) => warn!(%user_id, error = %e, "Maturity sweep failed for user"),
            }
        }
        Ok(reports)
    }

    /// Deposits, investments and withdrawals in one feed, newest first.
    pub async fn transaction_history(&self, user_id: Uuid) -> InvestmentResult<Vec<HistoryEntry>> {
        let transactions = self.store.list_user_transactions(user_id).await?;
        let investments = self.store.list_user_investments(user_id).await?;
        let withdrawals = self.store.list_user_withdrawals(user_id).await?;
        Ok(merge_history(transactions, investments, withdrawals))
    }

    pub async fn investment_details(&self, investment_id: Uuid) -> InvestmentResult<InvestmentDetails> {
        let investment = self
            .store
            .find_investment(investment_id)
            .await?
            .ok_or(InvestmentError::InvestmentNotFound(investment_id))?;
        let owner = self.store.find_user(investment.user_id).await?;

        Ok(InvestmentDetails {
            investment,
            owner: owner.map(|u| u.profile()),
        })
    }

    /// Every Pending investment with its owner, newest first.
    pub async fn pending_investments(&self) -> InvestmentResult<Vec<InvestmentDetails>> {
        let pending = self
            .store
            .list_investments_by_status(InvestmentStatus::Pending)
            .await?;
        if pending.is_empty() {
            return Err(InvestmentError::NoneFound("pending investments"));
        }

        let mut details = Vec::with_capacity(pending.len());
        for investment in pending {
            let owner = self.store.find_user(investment.user_id).await?;
            details.push(InvestmentDetails {
                investment,
                owner: owner.map(|u| u.profile()),
            });
        }
        Ok(details)
    }

    /// Admin correction of a user's balance or realized payouts.
    #[instrument(skip_all, fields(%user_id, ?field, ?operation))]
    pub async fn adjust_ledger(
        &self,
        user_id: Uuid,
        field: LedgerField,
        operation: AdjustOperation,
        raw_amount: &str,
    ) -> InvestmentResult<UserAccount> {
        let amount = parse_amount(raw_amount)
            .map_err(|_| InvestmentError::InvalidAdjustmentAmount)?;
        let user = self
            .store
            .adjust_ledger(user_id, field, operation, amount)
            .await?;
        info!(%amount, "Ledger adjusted");
        Ok(user)
    }
}
