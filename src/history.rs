use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Investment, LedgerTransaction, Withdrawal};

/// One entry of the combined activity feed, tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum HistoryEntry {
    Transaction(LedgerTransaction),
    Investment(Investment),
    Withdrawal(Withdrawal),
}

impl HistoryEntry {
    pub fn kind(&self) -> &'static str {
        match self {
            HistoryEntry::Transaction(_) => "Transaction",
            HistoryEntry::Investment(_) => "Investment",
            HistoryEntry::Withdrawal(_) => "Withdrawal",
        }
    }

    /// The record's own date field.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            HistoryEntry::Transaction(t) => t.created_at,
            HistoryEntry::Investment(i) => i.start_date,
            HistoryEntry::Withdrawal(w) => w.request_date,
        }
    }
}

/// Combines the three record sets and orders them newest first. Entries with
/// equal timestamps keep their source order.
pub fn merge_history(
    transactions: Vec<LedgerTransaction>,
    investments: Vec<Investment>,
    withdrawals: Vec<Withdrawal>,
) -> Vec<HistoryEntry> {
    let mut feed: Vec<HistoryEntry> = transactions
        .into_iter()
        .map(HistoryEntry::Transaction)
        .chain(investments.into_iter().map(HistoryEntry::Investment))
        .chain(withdrawals.into_iter().map(HistoryEntry::Withdrawal))
        .collect();

    feed.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
    feed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ApprovalConfirmation, InvestmentStatus};
    use chrono::{Duration, TimeZone};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn at(hours: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(hours)
    }

    fn transaction(hours: i64) -> LedgerTransaction {
        LedgerTransaction {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            amount: Decimal::from(100),
            status: "completed".to_string(),
            transaction_id: format!("tx-{hours}"),
            created_at: at(hours),
        }
    }

    fn investment(hours: i64) -> Investment {
        Investment {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            plan: "Basic Plan".to_string(),
            amount: Decimal::from(150),
            start_date: at(hours),
            end_date: at(hours + 24),
            maturity_amount: Decimal::from(5_666),
            status: InvestmentStatus::Pending,
            admin_approval_confirmation: ApprovalConfirmation::Pending,
            approval_date: None,
            rejection_date: None,
        }
    }

    fn withdrawal(hours: i64) -> Withdrawal {
        Withdrawal {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            amount: Decimal::from(20),
            status: "pending".to_string(),
            wallet_address: "0xabc".to_string(),
            request_date: at(hours),
        }
    }

    #[test]
    fn test_merge_interleaves_sources_newest_first() {
        let feed = merge_history(
            vec![transaction(5), transaction(1)],
            vec![investment(4), investment(2)],
            vec![withdrawal(3)],
        );

        let stamps: Vec<_> = feed.iter().map(|e| e.timestamp()).collect();
        assert_eq!(stamps, vec![at(5), at(4), at(3), at(2), at(1)]);
        let kinds: Vec<_> = feed.iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds,
            vec!["Transaction", "Investment", "Withdrawal", "Investment", "Transaction"]
        );
    }

    #[test]
    fn test_merge_of_nothing_is_empty() {
        assert!(merge_history(vec![], vec![], vec![]).is_empty());
    }

    #[test]
    fn test_entries_serialize_with_type_tag() {
        let json = serde_json::to_value(HistoryEntry::Withdrawal(withdrawal(0))).unwrap();
        assert_eq!(json["type"], "Withdrawal");
        assert_eq!(json["wallet_address"], "0xabc");
        assert_eq!(json["amount"], "20");
    }
}
