use crate::aggregation::AggregatedSeries;
use crate::error::{ForecastError, Result};
use crate::metrics::{calculate_metrics, Metrics};
use crate::model::{validate_horizon, validate_params, FittedModel, ForecastPoint, MIN_FIT_POINTS};
use crate::schema::ModelParams;
use chrono::NaiveDate;
use log::{debug, info};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationPoint {
    pub period: NaiveDate,
    pub actual: f64,
    pub predicted: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

/// Everything needed to draw the "forecast vs actual" validation chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub train: AggregatedSeries,
    pub test: Vec<ValidationPoint>,
}

#[derive(Debug, Clone)]
pub struct ForecastOutcome {
    pub model: FittedModel,
    pub metrics: Metrics,
    pub validation: ValidationResult,
    pub forecast: Vec<ForecastPoint>,
}

/// Index of the first test period for a series of `len` periods.
pub fn split_index(len: usize, test_ratio: f64) -> usize {
    (len as f64 * (1.0 - test_ratio)).floor() as usize
}

/// Chronological split: the last `test_ratio` share of periods is the test set.
pub fn split_train_test(
    series: &AggregatedSeries,
    test_ratio: f64,
) -> Result<(AggregatedSeries, AggregatedSeries)> {
    if !(test_ratio > 0.0 && test_ratio < 1.0) {
        return Err(ForecastError::InsufficientData {
            available: series.len(),
            details: format!("test_ratio must be in (0, 1), got {}", test_ratio),
        });
    }

    let idx = split_index(series.len(), test_ratio);
    let (train, test) = series.split_at(idx);

    if train.len() < MIN_FIT_POINTS || test.is_empty() {
        return Err(ForecastError::InsufficientData {
            available: series.len(),
            details: format!(
                "split at ratio {} leaves {} training and {} test periods",
                test_ratio,
                train.len(),
                test.len()
            ),
        });
    }

    debug!(
        "Split {} periods into {} train / {} test",
        series.len(),
        train.len(),
        test.len()
    );
    Ok((train, test))
}

/// Pairs actuals with predictions for the same period.
fn join_by_period(test: &AggregatedSeries, predictions: &[ForecastPoint]) -> Vec<ValidationPoint> {
    test.points
        .iter()
        .filter_map(|actual| {
            predictions
                .iter()
                .find(|p| p.period == actual.period_start)
                .map(|p| ValidationPoint {
                    period: actual.period_start,
                    actual: actual.total_value,
                    predicted: p.point_forecast,
                    lower_bound: p.lower_bound,
                    upper_bound: p.upper_bound,
                })
        })
        .collect()
}

/// The `horizon` periods following the model's last training period.
pub fn forecast_future(model: &FittedModel, horizon: usize) -> Vec<ForecastPoint> {
    model.predict_with_intervals(&model.future_periods(horizon))
}

/// Fits once on the training split; the horizon extends that same fit.
pub fn fit_and_forecast(
    series: &AggregatedSeries,
    test_ratio: f64,
    horizon: usize,
    params: &ModelParams,
) -> Result<ForecastOutcome> {
    validate_horizon(horizon)?;
    validate_params(params)?;

    let (train, test) = split_train_test(series, test_ratio)?;
    let model = FittedModel::fit(&train, params)?;

    let predictions = model.predict_with_intervals(&test.dates());
    let joined = join_by_period(&test, &predictions);
    let actual: Vec<f64> = joined.iter().map(|p| p.actual).collect();
    let predicted: Vec<f64> = joined.iter().map(|p| p.predicted).collect();
    let metrics = calculate_metrics(&actual, &predicted)?;

    info!(
        "Validation over {} periods: MAE={:.2} RMSE={:.2} R2={:.4}",
        joined.len(),
        metrics.mae,
        metrics.rmse,
        metrics.r2
    );

    let forecast = forecast_future(&model, horizon);
    info!("Forecast {} periods from {}", forecast.len(), model.last_training_period());

    Ok(ForecastOutcome {
        model,
        metrics,
        validation: ValidationResult {
            train,
            test: joined,
        },
        forecast,
    })
}
