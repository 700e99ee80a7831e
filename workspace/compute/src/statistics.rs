use std::collections::HashMap;

use model::entities::category::TransactionType;
use model::entities::transaction;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use utoipa::ToSchema;

/// Income and expense totals over a set of transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    #[schema(value_type = String, example = "8000.00")]
    pub total_income: Decimal,
    #[schema(value_type = String, example = "1234.50")]
    pub total_expense: Decimal,
    /// `total_income - total_expense`, may be negative.
    #[schema(value_type = String, example = "6765.50")]
    pub balance: Decimal,
    pub transaction_count: u64,
    pub income_count: u64,
    pub expense_count: u64,
}

/// Spending (or earning) aggregated for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStats {
    pub category_id: i32,
    pub category_name: String,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    #[schema(value_type = String, example = "356.80")]
    pub total_amount: Decimal,
    pub transaction_count: u64,
    /// Share of the filtered total, in percent with at most two decimals.
    pub percentage: f64,
}

/// Sums up income and expense of `transactions`.
#[instrument(skip(transactions), fields(num_transactions = transactions.len()))]
pub fn summarize(transactions: &[transaction::Model]) -> StatsSummary {
    let mut total_income = Decimal::ZERO;
    let mut total_expense = Decimal::ZERO;
    let mut income_count = 0;
    let mut expense_count = 0;

    for tx in transactions {
        match tx.transaction_type {
            TransactionType::Income => {
                total_income += tx.amount;
                income_count += 1;
            }
            TransactionType::Expense => {
                total_expense += tx.amount;
                expense_count += 1;
            }
        }
    }

    debug!(%total_income, %total_expense, "Summarized transactions");

    StatsSummary {
        total_income,
        total_expense,
        balance: total_income - total_expense,
        transaction_count: transactions.len() as u64,
        income_count,
        expense_count,
    }
}

/// Groups `transactions` by category.
///
/// When `filter` is set only transactions of that type are considered.
/// Transactions without a category still count toward the total the
/// percentages are computed against, but get no row of their own.
/// `category_names` maps category ids to display names; unknown ids are
/// reported with an empty name.
///
/// Rows are sorted by total amount, largest first.
#[instrument(skip(transactions, category_names), fields(num_transactions = transactions.len()))]
pub fn category_breakdown(
    transactions: &[transaction::Model],
    category_names: &HashMap<i32, String>,
    filter: Option<TransactionType>,
) -> Vec<CategoryStats> {
    let filtered: Vec<&transaction::Model> = transactions
        .iter()
        .filter(|tx| filter.is_none_or(|t| tx.transaction_type == t))
        .collect();

    let total: Decimal = filtered.iter().map(|tx| tx.amount).sum();

    // category id -> (type of first transaction seen, total, count)
    let mut grouped: HashMap<i32, (TransactionType, Decimal, u64)> = HashMap::new();
    for tx in &filtered {
        let Some(category_id) = tx.category_id else {
            continue;
        };
        let entry = grouped
            .entry(category_id)
            .or_insert((tx.transaction_type, Decimal::ZERO, 0));
        entry.1 += tx.amount;
        entry.2 += 1;
    }

    let mut stats: Vec<CategoryStats> = grouped
        .into_iter()
        .map(|(category_id, (transaction_type, total_amount, transaction_count))| CategoryStats {
            category_id,
            category_name: category_names
                .get(&category_id)
                .cloned()
                .unwrap_or_default(),
            transaction_type,
            total_amount,
            transaction_count,
            percentage: percentage_of(total_amount, total),
        })
        .collect();

    stats.sort_by(|a, b| {
        b.total_amount
            .cmp(&a.total_amount)
            .then(a.category_id.cmp(&b.category_id))
    });

    debug!(num_categories = stats.len(), %total, "Computed category breakdown");
    stats
}

/// `part / total * 100`, with the ratio rounded half-up to four places.
fn percentage_of(part: Decimal, total: Decimal) -> f64 {
    if total <= Decimal::ZERO {
        return 0.0;
    }
    let ratio = (part / total).round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero);
    (ratio * Decimal::ONE_HUNDRED).to_f64().unwrap_or(0.0)
}
