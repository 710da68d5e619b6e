use crate::aggregation::{aggregate, AggregatedSeries};
use crate::engine::{fit_and_forecast, ValidationResult};
use crate::error::{ErrorKind, ForecastError, Result};
use crate::export::forecast_csv_string;
use crate::ingestion::{load, TransactionTable};
use crate::kpi::{calculate_kpis, Kpis};
use crate::metrics::Metrics;
use crate::model::{FittedModel, ForecastPoint};
use crate::schema::{ColumnBindings, PipelineParams};
use log::{info, warn};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Load,
    Aggregate,
    Forecast,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageFailure {
    pub stage: Stage,
    #[serde(skip)]
    pub kind: Option<ErrorKind>,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResultBundle {
    pub table: Option<TransactionTable>,
    pub kpis: Option<Kpis>,
    pub aggregated: Option<AggregatedSeries>,
    #[serde(skip)]
    pub model: Option<FittedModel>,
    pub metrics: Option<Metrics>,
    pub validation: Option<ValidationResult>,
    pub forecast: Option<Vec<ForecastPoint>>,
    pub top_products: Vec<String>,
    /// The stage that stopped the run, if any.
    pub failure: Option<StageFailure>,
}

impl ResultBundle {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none() && self.forecast.is_some()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Untranslated forecast table as CSV, ready for the storage layer.
    pub fn forecast_csv(&self) -> Result<Option<String>> {
        match &self.forecast {
            Some(forecast) if !forecast.is_empty() => Ok(Some(forecast_csv_string(forecast)?)),
            _ => Ok(None),
        }
    }

    fn record_failure(&mut self, stage: Stage, error: ForecastError) {
        warn!("Pipeline stopped at {:?} stage: {}", stage, error);
        self.failure = Some(StageFailure {
            stage,
            kind: Some(error.kind()),
            message: error.to_string(),
        });
    }
}

/// The `n` products with the largest total value, best first. Ties are
/// broken by name.
pub fn top_products(table: &TransactionTable, n: usize) -> Vec<String> {
    let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
    for row in &table.rows {
        if let Some(product) = row.product.as_deref() {
            *totals.entry(product).or_insert(0.0) += row.value;
        }
    }

    let mut ranked: Vec<(&str, f64)> = totals.into_iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(n)
        .map(|(name, _)| name.to_string())
        .collect()
}

pub struct ForecastPipeline {
    bindings: ColumnBindings,
    params: PipelineParams,
}

impl ForecastPipeline {
    pub fn new(bindings: ColumnBindings, params: PipelineParams) -> Self {
        Self { bindings, params }
    }

    pub fn run(&self, bytes: &[u8]) -> ResultBundle {
        let mut bundle = ResultBundle::default();

        let table = match load(bytes, &self.bindings) {
            Ok(table) => table,
            Err(e) => {
                bundle.record_failure(Stage::Load, e);
                return bundle;
            }
        };

        bundle.kpis = calculate_kpis(&table);

        let series = match aggregate(&table, self.params.freq_agg) {
            Ok(series) => series,
            Err(e) => {
                bundle.table = Some(table);
                bundle.record_failure(Stage::Aggregate, e);
                return bundle;
            }
        };
        bundle.aggregated = Some(series.clone());

        match fit_and_forecast(
            &series,
            self.params.test_ratio,
            self.params.horizon,
            &self.params.model,
        ) {
            Ok(outcome) => {
                bundle.metrics = Some(outcome.metrics);
                bundle.validation = Some(outcome.validation);
                bundle.forecast = Some(outcome.forecast);
                bundle.model = Some(outcome.model);
            }
            Err(e) => {
                bundle.table = Some(table);
                bundle.record_failure(Stage::Forecast, e);
                return bundle;
            }
        }

        if table.columns.product_column().is_some() {
            bundle.top_products = top_products(&table, self.params.top_n_products);
        }
        bundle.table = Some(table);

        info!("Pipeline finished");
        bundle
    }
}

/// Never fails: a stage error is recorded in [`ResultBundle::failure`].
pub fn run_pipeline(bytes: &[u8], bindings: &ColumnBindings, params: &PipelineParams) -> ResultBundle {
    ForecastPipeline::new(bindings.clone(), params.clone()).run(bytes)
}
