use std::collections::BTreeMap;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::store::{PlanStore, StoreResult};

/// A named investment tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentPlan {
    pub name: String,
    /// Inclusive lower bound on the principal.
    pub min_amount: Decimal,
    /// Inclusive upper bound on the principal.
    pub max_amount: Decimal,
    pub duration_days: u32,
    /// Nominal rate in percent. Payouts come from the plan's maturity band.
    pub interest_rate: Decimal,
}

impl InvestmentPlan {
    pub fn new(name: &str, min_amount: i64, max_amount: i64, duration_days: u32, rate: i64) -> Self {
        Self {
            name: name.to_string(),
            min_amount: Decimal::from(min_amount),
            max_amount: Decimal::from(max_amount),
            duration_days,
            interest_rate: Decimal::from(rate),
        }
    }

    pub fn accepts(&self, amount: Decimal) -> bool {
        amount >= self.min_amount && amount <= self.max_amount
    }

    pub fn category(&self) -> Option<PlanCategory> {
        PlanCategory::from_plan_name(&self.name)
    }
}

/// The tiers that have a payout band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanCategory {
    Basic,
    Standard,
    Premium,
    Elite,
}

impl PlanCategory {
    /// `"Basic Plan"` and `"Basic"` both map to [`PlanCategory::Basic`].
    pub fn from_plan_name(name: &str) -> Option<Self> {
        let stem = name.trim();
        let stem = stem.strip_suffix(" Plan").unwrap_or(stem);
        match stem {
            "Basic" => Some(PlanCategory::Basic),
            "Standard" => Some(PlanCategory::Standard),
            "Premium" => Some(PlanCategory::Premium),
            "Elite" => Some(PlanCategory::Elite),
            _ => None,
        }
    }

    pub fn band(&self) -> MaturityBand {
        let (min, max, label) = match self {
            PlanCategory::Basic => (3_500, 10_000, "10%"),
            PlanCategory::Standard => (10_000, 20_000, "15%"),
            PlanCategory::Premium => (21_000, 40_000, "18%"),
            PlanCategory::Elite => (45_000, 100_000, "23%"),
        };
        MaturityBand {
            min_maturity: Decimal::from(min),
            max_maturity: Decimal::from(max),
            interest_label: label,
        }
    }
}

/// Payout range of a plan category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MaturityBand {
    pub min_maturity: Decimal,
    pub max_maturity: Decimal,
    pub interest_label: &'static str,
}

impl MaturityBand {
    /// Interpolates the payout linearly by where `amount` sits inside the
    /// plan's amount range, rounded to cents.
    pub fn maturity_for(&self, plan: &InvestmentPlan, amount: Decimal) -> Decimal {
        let span = plan.max_amount - plan.min_amount;
        let position = if span.is_zero() {
            Decimal::ZERO
        } else {
            ((amount - plan.min_amount) / span).clamp(Decimal::ZERO, Decimal::ONE)
        };

        let maturity = self.min_maturity + position * (self.max_maturity - self.min_maturity);
        maturity.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }
}

/// Plans the platform ships with.
pub fn default_plans() -> Vec<InvestmentPlan> {
    vec![
        InvestmentPlan::new("Basic Plan", 100, 250, 1, 10),
        InvestmentPlan::new("Standard Plan", 300, 500, 1, 15),
        InvestmentPlan::new("Premium Plan", 600, 1_000, 1, 18),
        InvestmentPlan::new("Elite Plan", 1_500, 5_000, 1, 23),
    ]
}

/// Read-only lookup table of plans, built once at startup and shared.
#[derive(Debug, Clone, Default)]
pub struct PlanCatalog {
    plans: BTreeMap<String, InvestmentPlan>,
}

impl PlanCatalog {
    pub fn new(plans: impl IntoIterator<Item = InvestmentPlan>) -> Self {
        Self {
            plans: plans.into_iter().map(|p| (p.name.clone(), p)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&InvestmentPlan> {
        self.plans.get(name)
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    /// All plans, cheapest tier first.
    pub fn plans(&self) -> Vec<&InvestmentPlan> {
        let mut plans: Vec<_> = self.plans.values().collect();
        plans.sort_by(|a, b| a.min_amount.cmp(&b.min_amount));
        plans
    }
}

/// Inserts each plan whose name is not yet stored, then loads the catalog
/// from the store. Safe to run at every process start.
pub async fn seed_plans<S>(store: &S, plans: &[InvestmentPlan]) -> StoreResult<PlanCatalog>
where
    S: PlanStore + ?Sized,
{
    for plan in plans {
        if store.insert_plan_if_absent(plan).await? {
            info!(plan = %plan.name, "Added investment plan");
        } else {
            info!(plan = %plan.name, "Investment plan already exists");
        }
    }

    let catalog = PlanCatalog::new(store.list_plans().await?);
    info!(plans = catalog.len(), "Investment plans seeded");
    Ok(catalog)
}
