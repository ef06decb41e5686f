use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of an investment.
///
/// Moves Pending → {Active, Rejected} and Active → Ended, never backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvestmentStatus {
    Pending,
    Active,
    Rejected,
    Ended,
}

impl InvestmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvestmentStatus::Pending => "Pending",
            InvestmentStatus::Active => "Active",
            InvestmentStatus::Rejected => "Rejected",
            InvestmentStatus::Ended => "Ended",
        }
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: InvestmentStatus) -> bool {
        matches!(
            (self, next),
            (InvestmentStatus::Pending, InvestmentStatus::Active)
                | (InvestmentStatus::Pending, InvestmentStatus::Rejected)
                | (InvestmentStatus::Active, InvestmentStatus::Ended)
        )
    }
}

impl fmt::Display for InvestmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvestmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(InvestmentStatus::Pending),
            "Active" => Ok(InvestmentStatus::Active),
            "Rejected" => Ok(InvestmentStatus::Rejected),
            "Ended" => Ok(InvestmentStatus::Ended),
            other => Err(format!("unknown investment status '{other}'")),
        }
    }
}

/// The admin's decision on an investment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalConfirmation {
    #[serde(rename = "Pending")]
    Pending,
    Approved,
    Rejected,
}

impl ApprovalConfirmation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalConfirmation::Pending => "Pending",
            ApprovalConfirmation::Approved => "approved",
            ApprovalConfirmation::Rejected => "rejected",
        }
    }
}

impl FromStr for ApprovalConfirmation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" | "pending" => Ok(ApprovalConfirmation::Pending),
            "approved" => Ok(ApprovalConfirmation::Approved),
            "rejected" => Ok(ApprovalConfirmation::Rejected),
            other => Err(format!("unknown approval confirmation '{other}'")),
        }
    }
}

/// A principal placed into a plan by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Investment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan: String,
    pub amount: Decimal,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub maturity_amount: Decimal,
    pub status: InvestmentStatus,
    pub admin_approval_confirmation: ApprovalConfirmation,
    pub approval_date: Option<DateTime<Utc>>,
    pub rejection_date: Option<DateTime<Utc>>,
}

impl Investment {
    /// Status shown to the user. An Active record past its end date reads
    /// as Ended before the sweep has persisted it.
    pub fn display_status(&self, now: DateTime<Utc>) -> InvestmentStatus {
        match self.status {
            InvestmentStatus::Active if self.end_date <= now => InvestmentStatus::Ended,
            status => status,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == InvestmentStatus::Active && self.end_date <= now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Subscriber,
    Admin,
    Suspended,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Subscriber => "subscriber",
            UserRole::Admin => "admin",
            UserRole::Suspended => "suspended",
        }
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subscriber" => Ok(UserRole::Subscriber),
            "admin" => Ok(UserRole::Admin),
            "suspended" => Ok(UserRole::Suspended),
            other => Err(format!("unknown user role '{other}'")),
        }
    }
}

/// A user together with the money fields the lifecycle reads and writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub is_verified: bool,
    /// Uninvested, withdrawable funds.
    pub balance: Decimal,
    /// Principal locked in Active investments.
    pub investment_balance: Decimal,
    /// Realized payouts.
    pub total_maturity_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl UserAccount {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            role: UserRole::Subscriber,
            is_verified: false,
            balance: Decimal::ZERO,
            investment_balance: Decimal::ZERO,
            total_maturity_amount: Decimal::ZERO,
            created_at: Utc::now(),
        }
    }

    pub fn can_invest(&self) -> bool {
        self.is_verified && self.role != UserRole::Suspended
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }

    pub fn ledger(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            balance: self.balance,
            investment_balance: self.investment_balance,
            total_maturity_amount: self.total_maturity_amount,
        }
    }
}

/// Public owner information attached to admin views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub balance: Decimal,
    pub investment_balance: Decimal,
    pub total_maturity_amount: Decimal,
}

/// Ledger field an admin may adjust directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerField {
    Balance,
    TotalMaturityAmount,
}

impl LedgerField {
    pub fn column(&self) -> &'static str {
        match self {
            LedgerField::Balance => "balance",
            LedgerField::TotalMaturityAmount => "total_maturity_amount",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustOperation {
    Add,
    Deduct,
}

impl FromStr for AdjustOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(AdjustOperation::Add),
            "deduct" => Ok(AdjustOperation::Deduct),
            other => Err(format!("unknown ledger operation '{other}'")),
        }
    }
}

/// A deposit or other ledger movement recorded by the payments collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub status: String,
    pub transaction_id: String,
    pub created_at: DateTime<Utc>,
}

/// A withdrawal request recorded by the withdrawals collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub status: String,
    pub wallet_address: String,
    pub request_date: DateTime<Utc>,
}
