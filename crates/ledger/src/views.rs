//! Read-only views computed from the projection.

use common::CustomerId;
use serde::Serialize;

use crate::model::{Customer, Transaction, TransactionType};
use crate::projection::{LedgerState, sort_recent_first};

/// How many entries the summary lists show.
pub const SUMMARY_LIMIT: usize = 5;

/// Relative tolerance used when comparing balances.
const BALANCE_TOLERANCE: f64 = 1e-9;

/// Business-wide totals for a dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSummary {
    pub total_customers: usize,
    /// Sum of every customer balance.
    pub total_balance: f64,
    pub total_debits: f64,
    pub total_credits: f64,
    pub recent_transactions: Vec<Transaction>,
    /// Customers with the highest balances.
    pub top_customers: Vec<Customer>,
}

impl LedgerSummary {
    pub(crate) fn from_state(state: &LedgerState) -> Self {
        let (total_debits, total_credits) = totals(state.transaction_values());

        let mut recent: Vec<_> = state.transaction_values().cloned().collect();
        sort_recent_first(&mut recent);
        recent.truncate(SUMMARY_LIMIT);

        let mut top: Vec<_> = state.customer_values().cloned().collect();
        top.sort_by(|a, b| b.balance.total_cmp(&a.balance));
        top.truncate(SUMMARY_LIMIT);

        Self {
            total_customers: state.customer_count(),
            total_balance: state.customer_values().map(|c| c.balance).sum(),
            total_debits,
            total_credits,
            recent_transactions: recent,
            top_customers: top,
        }
    }
}

/// One customer's account activity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerStatement {
    pub customer: Customer,
    /// Newest first.
    pub transactions: Vec<Transaction>,
    pub total_debits: f64,
    pub total_credits: f64,
    pub debit_count: usize,
    pub credit_count: usize,
}

impl CustomerStatement {
    pub(crate) fn new(customer: Customer, transactions: Vec<Transaction>) -> Self {
        let (total_debits, total_credits) = totals(transactions.iter());
        let debit_count = transactions
            .iter()
            .filter(|t| t.kind == TransactionType::Debit)
            .count();

        Self {
            customer,
            credit_count: transactions.len() - debit_count,
            debit_count,
            total_debits,
            total_credits,
            transactions,
        }
    }

    /// Debits minus credits over the listed transactions.
    pub fn net_activity(&self) -> f64 {
        self.total_debits - self.total_credits
    }
}

/// A customer whose stored balance disagrees with its transactions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceDiscrepancy {
    pub customer_id: CustomerId,
    pub customer_name: String,
    /// The balance held on the customer record.
    pub recorded: f64,
    /// The signed sum of the customer's transactions.
    pub derived: f64,
}

impl BalanceDiscrepancy {
    pub fn difference(&self) -> f64 {
        self.recorded - self.derived
    }
}

pub(crate) fn audit(state: &LedgerState) -> Vec<BalanceDiscrepancy> {
    let mut discrepancies: Vec<_> = state
        .customer_values()
        .filter_map(|customer| {
            let derived: f64 = state
                .transaction_values()
                .filter(|t| t.customer_id == customer.id)
                .map(Transaction::contribution)
                .sum();

            let scale = derived.abs().max(customer.balance.abs()).max(1.0);
            ((customer.balance - derived).abs() > BALANCE_TOLERANCE * scale).then(|| {
                BalanceDiscrepancy {
                    customer_id: customer.id,
                    customer_name: customer.name.clone(),
                    recorded: customer.balance,
                    derived,
                }
            })
        })
        .collect();

    discrepancies.sort_by(|a, b| a.customer_name.cmp(&b.customer_name));
    discrepancies
}

fn totals<'a>(transactions: impl Iterator<Item = &'a Transaction>) -> (f64, f64) {
    transactions.fold((0.0, 0.0), |(debits, credits), t| match t.kind {
        TransactionType::Debit => (debits + t.total_amount, credits),
        TransactionType::Credit => (debits, credits + t.total_amount),
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, Utc};

    use super::*;
    use crate::{NewCustomer, NewTransaction};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    #[test]
    fn statement_splits_debits_and_credits() {
        let customer = NewCustomer::new("Asha", "a@b.c").into_customer(Utc::now());
        let transactions = vec![
            NewTransaction::debit(customer.id, date())
                .item("Rice", 2.0, 50.0)
                .into_transaction(&customer, Utc::now()),
            NewTransaction::credit(customer.id, date())
                .item("Cash", 1.0, 40.0)
                .into_transaction(&customer, Utc::now()),
            NewTransaction::debit(customer.id, date())
                .item("Salt", 1.0, 20.0)
                .into_transaction(&customer, Utc::now()),
        ];

        let statement = CustomerStatement::new(customer, transactions);
        assert_eq!(statement.debit_count, 2);
        assert_eq!(statement.credit_count, 1);
        assert_eq!(statement.total_debits, 120.0);
        assert_eq!(statement.total_credits, 40.0);
        assert_eq!(statement.net_activity(), 80.0);
    }

    #[test]
    fn summary_ranks_customers_and_transactions() {
        let mut state = LedgerState::default();
        let now = Utc::now();

        for i in 0..7_i32 {
            let mut customer =
                NewCustomer::new(format!("Customer {i}"), "c@b.c").into_customer(now);
            customer.balance = f64::from(i) * 10.0;
            state.upsert_customer(customer.clone());
            state.insert_transaction(
                NewTransaction::debit(customer.id, date())
                    .item("Flour", 1.0, 10.0)
                    .into_transaction(&customer, now + Duration::seconds(i.into())),
            );
        }

        let summary = LedgerSummary::from_state(&state);
        assert_eq!(summary.total_customers, 7);
        assert_eq!(summary.total_balance, 210.0);
        assert_eq!(summary.total_debits, 70.0);
        assert_eq!(summary.total_credits, 0.0);

        let top: Vec<_> = summary.top_customers.iter().map(|c| c.balance).collect();
        assert_eq!(top, vec![60.0, 50.0, 40.0, 30.0, 20.0]);

        let recent = &summary.recent_transactions;
        assert_eq!(recent.len(), SUMMARY_LIMIT);
        assert_eq!(recent[0].customer_name, "Customer 6");
        assert!(recent.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }

    #[test]
    fn audit_flags_only_inconsistent_customers() {
        let mut state = LedgerState::default();
        let now = Utc::now();

        let mut good = NewCustomer::new("Good", "g@b.c").into_customer(now);
        let mut bad = NewCustomer::new("Bad", "b@b.c").into_customer(now);
        for customer in [&mut good, &mut bad] {
            let tx = NewTransaction::debit(customer.id, date())
                .item("Tea Leaves", 3.0, 0.1)
                .into_transaction(customer, now);
            customer.balance = tx.contribution();
            state.insert_transaction(tx);
        }
        bad.balance += 25.0;
        state.upsert_customer(good);
        state.upsert_customer(bad.clone());

        let discrepancies = audit(&state);
        assert_eq!(discrepancies.len(), 1);
        assert_eq!(discrepancies[0].customer_id, bad.id);
        assert!((discrepancies[0].difference() - 25.0).abs() < 1e-9);
    }
}
