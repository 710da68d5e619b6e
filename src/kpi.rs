use crate::i18n::{format_count, format_currency, label, Label, Locale};
use crate::ingestion::TransactionTable;
use crate::utils::format_date_br;
use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kpis {
    pub total_revenue: f64,
    pub total_transactions: usize,
    pub average_ticket: f64,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    /// `None` when the product column is absent or unresolved.
    pub unique_products: Option<usize>,
    pub unique_clients: Option<usize>,
}

/// Display-ready KPI strings, as shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedKpis {
    pub total_revenue: String,
    pub average_ticket: String,
    pub total_transactions: String,
    pub analysis_period: String,
    pub unique_products: String,
    pub unique_clients: String,
}

pub fn average_ticket(total_revenue: f64, count: usize) -> f64 {
    if count > 0 {
        total_revenue / count as f64
    } else {
        0.0
    }
}

fn distinct<'a>(labels: impl Iterator<Item = Option<&'a str>>) -> usize {
    labels.flatten().collect::<BTreeSet<_>>().len()
}

/// Summary statistics of the raw transactions. Returns `None` for an empty
/// table, which has no date range to report.
pub fn calculate_kpis(table: &TransactionTable) -> Option<Kpis> {
    let (first, last) = table.date_range()?;

    let total_revenue: f64 = table.rows.iter().map(|r| r.value).sum();
    let total_transactions = table.len();

    let unique_products = table
        .columns
        .product_column()
        .map(|_| distinct(table.rows.iter().map(|r| r.product.as_deref())));
    let unique_clients = table
        .columns
        .client_column()
        .map(|_| distinct(table.rows.iter().map(|r| r.client.as_deref())));

    debug!(
        "KPIs: revenue {:.2} over {} transactions",
        total_revenue, total_transactions
    );

    Some(Kpis {
        total_revenue,
        total_transactions,
        average_ticket: average_ticket(total_revenue, total_transactions),
        first_date: first.date(),
        last_date: last.date(),
        unique_products,
        unique_clients,
    })
}

impl Kpis {
    pub fn formatted(&self, locale: Locale) -> FormattedKpis {
        let not_available = label(Label::NotAvailable, locale);
        FormattedKpis {
            total_revenue: format_currency(self.total_revenue),
            average_ticket: format_currency(self.average_ticket),
            total_transactions: format_count(self.total_transactions),
            analysis_period: format!(
                "{} {} {}",
                format_date_br(self.first_date),
                label(Label::DateRangeConnector, locale),
                format_date_br(self.last_date)
            ),
            unique_products: self
                .unique_products
                .map(format_count)
                .unwrap_or_else(|| not_available.to_string()),
            unique_clients: self
                .unique_clients
                .map(format_count)
                .unwrap_or_else(|| not_available.to_string()),
        }
    }
}
