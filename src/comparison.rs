use crate::aggregation::{aggregate_points, AggregatedSeries};
use crate::engine::forecast_future;
use crate::error::Result;
use crate::ingestion::TransactionTable;
use crate::model::{validate_horizon, FittedModel, ForecastPoint};
use crate::schema::{Frequency, ModelParams};
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Fewest aggregated periods a product needs before it is worth fitting.
pub const MIN_COMPARISON_POINTS: usize = 5;

/// Plot-ready forecast for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductForecast {
    pub product: String,
    pub history: AggregatedSeries,
    /// In-sample fit over `history`.
    pub fitted: Vec<ForecastPoint>,
    pub forecast: Vec<ForecastPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductComparison {
    pub first: Option<ProductForecast>,
    pub second: Option<ProductForecast>,
}

impl ProductComparison {
    pub fn into_pair(self) -> (Option<ProductForecast>, Option<ProductForecast>) {
        (self.first, self.second)
    }

    pub fn is_complete(&self) -> bool {
        self.first.is_some() && self.second.is_some()
    }
}

/// Forecast for a single product, or `None` when the product has too little
/// history (or no rows at all).
pub fn forecast_product(
    table: &TransactionTable,
    product: &str,
    frequency: Frequency,
    horizon: usize,
) -> Result<Option<ProductForecast>> {
    validate_horizon(horizon)?;

    let rows: Vec<_> = table
        .rows_for_product(product)
        .map(|r| (r.date.date(), r.value))
        .collect();
    if rows.is_empty() {
        info!("Product '{}' has no transactions", product);
        return Ok(None);
    }

    let history = aggregate_points(rows, frequency)?;
    if history.len() < MIN_COMPARISON_POINTS {
        info!(
            "Product '{}' has only {} periods, skipping forecast",
            product,
            history.len()
        );
        return Ok(None);
    }

    let model = FittedModel::fit(&history, &ModelParams::comparison())?;
    let fitted = model.fitted();
    let forecast = forecast_future(&model, horizon);

    Ok(Some(ProductForecast {
        product: product.to_string(),
        history,
        fitted,
        forecast,
    }))
}

/// Forecasts `first` and `second` independently.
///
/// `product_column` must name the table's resolved product column; when it is
/// absent or does not match, both sides are `None`.
pub fn compare(
    table: &TransactionTable,
    product_column: Option<&str>,
    first: &str,
    second: &str,
    frequency: Frequency,
    horizon: usize,
) -> Result<ProductComparison> {
    let resolved = table.columns.product_column();
    let usable = matches!(
        (product_column, resolved),
        (Some(requested), Some(actual)) if requested.to_lowercase() == actual.to_lowercase()
    );
    if !usable {
        warn!(
            "Product column {:?} is not available (table has {:?})",
            product_column, resolved
        );
        return Ok(ProductComparison {
            first: None,
            second: None,
        });
    }

    info!("Comparing products '{}' and '{}'", first, second);
    Ok(ProductComparison {
        first: forecast_product(table, first, frequency, horizon)?,
        second: forecast_product(table, second, frequency, horizon)?,
    })
}
