use crate::aggregation::{AggregatedSeries, MAX_PERIODS};
use crate::error::{ForecastError, Result};
use crate::schema::{Frequency, ModelParams, SeasonalityMode};
use crate::seasonality::{detect_seasonalities, SeasonalComponent};
use crate::solver::solve_ridge;
use crate::utils::periods_after;
use chrono::NaiveDate;
use log::{debug, info};
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp1, Poisson, StandardNormal};
use serde::{Deserialize, Serialize};

/// Fewest periods a model can be fit on.
pub const MIN_FIT_POINTS: usize = 2;

const MAX_CHANGEPOINTS: usize = 25;
/// Share of the history in which changepoints may be placed.
const CHANGEPOINT_RANGE: f64 = 0.8;
/// Reference observation noise (in scaled units) that converts prior scales
/// into ridge penalties.
const NOISE_SCALE: f64 = 0.1;
/// Prior scale on the base growth rate and offset.
const BASE_PRIOR_SCALE: f64 = 5.0;
pub const MAX_UNCERTAINTY_SAMPLES: usize = 100_000;
const MAX_ALTERNATIONS: usize = 500;
const CONVERGENCE_TOL: f64 = 1e-10;
const UNCERTAINTY_SEED: u64 = 0x5EED_F0CA;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub period: NaiveDate,
    pub point_forecast: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

/// A model bound to the series it was trained on.
#[derive(Debug, Clone)]
pub struct FittedModel {
    params: ModelParams,
    frequency: Frequency,
    history: Vec<NaiveDate>,
    start: NaiveDate,
    span_days: f64,
    y_scale: f64,
    changepoints: Vec<f64>,
    k: f64,
    m: f64,
    deltas: Vec<f64>,
    components: Vec<SeasonalComponent>,
    beta: Vec<f64>,
    sigma_obs: f64,
}

pub fn validate_params(params: &ModelParams) -> Result<()> {
    let positive = |v: f64| v.is_finite() && v > 0.0;

    if !positive(params.changepoint_prior_scale) {
        return Err(ForecastError::ModelFit(format!(
            "changepoint_prior_scale must be positive, got {}",
            params.changepoint_prior_scale
        )));
    }
    if !positive(params.seasonality_prior_scale) {
        return Err(ForecastError::ModelFit(format!(
            "seasonality_prior_scale must be positive, got {}",
            params.seasonality_prior_scale
        )));
    }
    if !(params.interval_width > 0.0 && params.interval_width < 1.0) {
        return Err(ForecastError::ModelFit(format!(
            "interval_width must be in (0, 1), got {}",
            params.interval_width
        )));
    }
    if params.uncertainty_samples > MAX_UNCERTAINTY_SAMPLES {
        return Err(ForecastError::ModelFit(format!(
            "uncertainty_samples must be at most {}, got {}",
            MAX_UNCERTAINTY_SAMPLES, params.uncertainty_samples
        )));
    }
    Ok(())
}

pub fn validate_horizon(horizon: usize) -> Result<()> {
    if horizon == 0 || horizon > MAX_PERIODS {
        return Err(ForecastError::ModelFit(format!(
            "forecast horizon must be between 1 and {} periods, got {}",
            MAX_PERIODS, horizon
        )));
    }
    Ok(())
}

/// Changepoints sit on evenly spaced training points inside the first
/// [`CHANGEPOINT_RANGE`] of the history, excluding the very first point.
fn place_changepoints(t: &[f64]) -> Vec<f64> {
    let hist_size = (t.len() as f64 * CHANGEPOINT_RANGE).floor() as usize;
    let n_changepoints = MAX_CHANGEPOINTS.min(hist_size.saturating_sub(1));
    if n_changepoints == 0 {
        return Vec::new();
    }

    let last = (hist_size - 1) as f64;
    (1..=n_changepoints)
        .map(|i| {
            let idx = (last * i as f64 / n_changepoints as f64).round() as usize;
            t[idx]
        })
        .collect()
}

fn trend_row(t: f64, changepoints: &[f64]) -> Vec<f64> {
    let mut row = Vec::with_capacity(2 + changepoints.len());
    row.push(t);
    row.push(1.0);
    row.extend(
        changepoints
            .iter()
            .map(|&s| if t >= s { t - s } else { 0.0 }),
    );
    row
}

fn seasonal_row(date: NaiveDate, components: &[SeasonalComponent]) -> Vec<f64> {
    let mut row = Vec::with_capacity(components.iter().map(|c| c.width()).sum());
    for component in components {
        component.push_features(date, &mut row);
    }
    row
}

fn to_matrix(rows: &[Vec<f64>], ncols: usize) -> DMatrix<f64> {
    DMatrix::from_fn(rows.len(), ncols, |i, j| rows[i][j])
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn solve(x: &DMatrix<f64>, y: &DVector<f64>, penalties: &[f64]) -> Result<Vec<f64>> {
    solve_ridge(x, y, penalties)
        .map(|beta| beta.iter().copied().collect())
        .ok_or_else(|| ForecastError::ModelFit("least squares system has no finite solution".to_string()))
}

fn max_abs_change(old: &[f64], new: &[f64]) -> f64 {
    old.iter()
        .zip(new)
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f64::max)
}

impl FittedModel {
    pub fn fit(series: &AggregatedSeries, params: &ModelParams) -> Result<Self> {
        validate_params(params)?;

        let n = series.len();
        if n < MIN_FIT_POINTS {
            return Err(ForecastError::InsufficientData {
                available: n,
                details: format!("at least {} periods are needed to fit", MIN_FIT_POINTS),
            });
        }

        let dates = series.dates();
        let values = series.values();
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::ModelFit(
                "series contains non-finite values".to_string(),
            ));
        }

        let start = dates[0];
        let span_days = (dates[n - 1] - start).num_days() as f64;
        if span_days <= 0.0 {
            return Err(ForecastError::InsufficientData {
                available: n,
                details: "series covers a single instant".to_string(),
            });
        }

        let y_scale = match values.iter().map(|v| v.abs()).fold(0.0, f64::max) {
            m if m > 0.0 => m,
            _ => 1.0,
        };
        let y = DVector::from_iterator(n, values.iter().map(|v| v / y_scale));
        let t: Vec<f64> = dates
            .iter()
            .map(|d| (*d - start).num_days() as f64 / span_days)
            .collect();

        let changepoints = place_changepoints(&t);
        let components = detect_seasonalities(&dates);

        let trend_rows: Vec<Vec<f64>> = t.iter().map(|&ti| trend_row(ti, &changepoints)).collect();
        let seasonal_rows: Vec<Vec<f64>> = dates
            .iter()
            .map(|&d| seasonal_row(d, &components))
            .collect();
        let n_trend = 2 + changepoints.len();
        let n_seasonal: usize = components.iter().map(|c| c.width()).sum();

        let base_penalty = (NOISE_SCALE / BASE_PRIOR_SCALE).powi(2);
        let delta_penalty = (NOISE_SCALE / params.changepoint_prior_scale).powi(2);
        let seasonal_penalty = (NOISE_SCALE / params.seasonality_prior_scale).powi(2);

        let mut trend_penalties = vec![base_penalty, base_penalty];
        trend_penalties.extend(std::iter::repeat(delta_penalty).take(changepoints.len()));
        let seasonal_penalties = vec![seasonal_penalty; n_seasonal];

        let (theta, beta) = if n_seasonal == 0 || params.seasonality_mode == SeasonalityMode::Additive {
            let rows: Vec<Vec<f64>> = trend_rows
                .iter()
                .zip(&seasonal_rows)
                .map(|(tr, sr)| tr.iter().chain(sr).copied().collect())
                .collect();
            let penalties: Vec<f64> = trend_penalties
                .iter()
                .chain(&seasonal_penalties)
                .copied()
                .collect();
            let coef = solve(&to_matrix(&rows, n_trend + n_seasonal), &y, &penalties)?;
            let (theta, beta) = coef.split_at(n_trend);
            (theta.to_vec(), beta.to_vec())
        } else {
            fit_multiplicative(
                &trend_rows,
                &seasonal_rows,
                &y,
                &trend_penalties,
                &seasonal_penalties,
                MAX_ALTERNATIONS,
            )?
        };

        let mut model = Self {
            params: params.clone(),
            frequency: series.frequency,
            history: dates,
            start,
            span_days,
            y_scale,
            changepoints,
            k: theta[0],
            m: theta[1],
            deltas: theta[2..].to_vec(),
            components,
            beta,
            sigma_obs: 0.0,
        };

        let residual_ss: f64 = model
            .history
            .iter()
            .zip(y.iter())
            .map(|(d, yi)| {
                let (trend, seasonal) = model.components_at(*d);
                (yi - model.combine(trend, seasonal)).powi(2)
            })
            .sum();
        model.sigma_obs = (residual_ss / n as f64).sqrt();

        info!(
            "Fitted {:?} model on {} periods ({} changepoints, {} seasonal terms)",
            model.params.seasonality_mode,
            n,
            model.changepoints.len(),
            model.beta.len()
        );
        debug!(
            "Trend k={:.4} m={:.4}, sigma_obs={:.4} (scaled)",
            model.k, model.m, model.sigma_obs
        );

        Ok(model)
    }

    pub fn last_training_period(&self) -> NaiveDate {
        self.history.last().copied().unwrap_or(self.start)
    }

    pub fn seasonalities(&self) -> &[SeasonalComponent] {
        &self.components
    }

    /// The next `horizon` periods after the last training period.
    pub fn future_periods(&self, horizon: usize) -> Vec<NaiveDate> {
        periods_after(self.last_training_period(), horizon, self.frequency)
    }

    fn scaled_time(&self, date: NaiveDate) -> f64 {
        (date - self.start).num_days() as f64 / self.span_days
    }

    fn trend_at(&self, t: f64) -> f64 {
        let shifts: f64 = self
            .changepoints
            .iter()
            .zip(&self.deltas)
            .filter(|(s, _)| t >= **s)
            .map(|(s, delta)| delta * (t - s))
            .sum();
        self.k * t + self.m + shifts
    }

    /// Scaled `(trend, seasonal)` at `date`.
    fn components_at(&self, date: NaiveDate) -> (f64, f64) {
        let trend = self.trend_at(self.scaled_time(date));
        let seasonal = dot(&seasonal_row(date, &self.components), &self.beta);
        (trend, seasonal)
    }

    fn combine(&self, trend: f64, seasonal: f64) -> f64 {
        match self.params.seasonality_mode {
            SeasonalityMode::Additive => trend + seasonal,
            SeasonalityMode::Multiplicative => trend * (1.0 + seasonal),
        }
    }

    /// Point predictions in revenue units.
    pub fn predict(&self, dates: &[NaiveDate]) -> Vec<f64> {
        dates
            .iter()
            .map(|d| {
                let (trend, seasonal) = self.components_at(*d);
                self.combine(trend, seasonal) * self.y_scale
            })
            .collect()
    }

    /// Point predictions with simulated confidence bounds.
    pub fn predict_with_intervals(&self, dates: &[NaiveDate]) -> Vec<ForecastPoint> {
        let ts: Vec<f64> = dates.iter().map(|d| self.scaled_time(*d)).collect();
        let parts: Vec<(f64, f64)> = dates.iter().map(|d| self.components_at(*d)).collect();
        let points: Vec<f64> = parts
            .iter()
            .map(|(trend, seasonal)| self.combine(*trend, *seasonal) * self.y_scale)
            .collect();

        let samples = self.params.uncertainty_samples;
        if samples == 0 || dates.is_empty() {
            return dates
                .iter()
                .zip(&points)
                .map(|(d, p)| ForecastPoint {
                    period: *d,
                    point_forecast: *p,
                    lower_bound: *p,
                    upper_bound: *p,
                })
                .collect();
        }

        let mut rng = StdRng::seed_from_u64(UNCERTAINTY_SEED);
        let t_max = ts.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let changepoint_rate = self.changepoints.len() as f64;
        let laplace_scale =
            self.deltas.iter().map(|d| d.abs()).sum::<f64>() / self.deltas.len().max(1) as f64 + 1e-8;
        let future_changepoints = if t_max > 1.0 && changepoint_rate > 0.0 {
            Poisson::new(changepoint_rate * (t_max - 1.0)).ok()
        } else {
            None
        };

        let mut draws: Vec<Vec<f64>> = vec![Vec::new(); dates.len()];
        for _ in 0..samples {
            let new_changes: Vec<(f64, f64)> = match &future_changepoints {
                Some(poisson) => {
                    let count: f64 = poisson.sample(&mut rng);
                    (0..count as usize)
                        .map(|_| {
                            let at = rng.gen_range(1.0..t_max);
                            let magnitude: f64 = rng.sample(Exp1);
                            let sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
                            (at, sign * magnitude * laplace_scale)
                        })
                        .collect()
                }
                None => Vec::new(),
            };

            for (idx, t) in ts.iter().enumerate() {
                let shift: f64 = new_changes
                    .iter()
                    .filter(|(at, _)| t >= at)
                    .map(|(at, delta)| delta * (t - at))
                    .sum();
                let noise: f64 = rng.sample::<f64, _>(StandardNormal) * self.sigma_obs;
                let (trend, seasonal) = parts[idx];
                let value = self.combine(trend + shift, seasonal) + noise;
                draws[idx].push(value * self.y_scale);
            }
        }

        let lower_q = (1.0 - self.params.interval_width) / 2.0;
        let upper_q = 1.0 - lower_q;

        dates
            .iter()
            .zip(points)
            .zip(draws)
            .map(|((date, point), mut sample)| {
                sample.sort_by(f64::total_cmp);
                ForecastPoint {
                    period: *date,
                    point_forecast: point,
                    lower_bound: quantile(&sample, lower_q).min(point),
                    upper_bound: quantile(&sample, upper_q).max(point),
                }
            })
            .collect()
    }

    /// In-sample fit over the training periods.
    pub fn fitted(&self) -> Vec<ForecastPoint> {
        self.predict_with_intervals(&self.history)
    }
}

/// Alternates between the trend (holding the seasonal multiplier fixed) and
/// the seasonal coefficients (holding the trend fixed). Each half-step is a
/// linear problem.
fn fit_multiplicative(
    trend_rows: &[Vec<f64>],
    seasonal_rows: &[Vec<f64>],
    y: &DVector<f64>,
    trend_penalties: &[f64],
    seasonal_penalties: &[f64],
    max_alternations: usize,
) -> Result<(Vec<f64>, Vec<f64>)> {
    let n = trend_rows.len();
    let n_trend = trend_penalties.len();
    let n_seasonal = seasonal_penalties.len();

    let mut theta = vec![0.0; n_trend];
    let mut beta = vec![0.0; n_seasonal];

    let mut change = f64::INFINITY;
    for iteration in 0..max_alternations {
        let multiplier: Vec<f64> = seasonal_rows.iter().map(|r| 1.0 + dot(r, &beta)).collect();
        let scaled_trend = DMatrix::from_fn(n, n_trend, |i, j| trend_rows[i][j] * multiplier[i]);
        let new_theta = solve(&scaled_trend, y, trend_penalties)?;

        let trend: Vec<f64> = trend_rows.iter().map(|r| dot(r, &new_theta)).collect();
        let scaled_seasonal = DMatrix::from_fn(n, n_seasonal, |i, j| seasonal_rows[i][j] * trend[i]);
        let remainder = DVector::from_iterator(n, y.iter().zip(&trend).map(|(yi, ti)| yi - ti));
        let new_beta = solve(&scaled_seasonal, &remainder, seasonal_penalties)?;

        change = max_abs_change(&theta, &new_theta).max(max_abs_change(&beta, &new_beta));
        theta = new_theta;
        beta = new_beta;

        if change < CONVERGENCE_TOL {
            debug!("Multiplicative fit converged after {} alternations", iteration + 1);
            return Ok((theta, beta));
        }
    }

    Err(ForecastError::ModelFit(format!(
        "multiplicative fit did not converge after {} alternations (last change {:.3e})",
        max_alternations, change
    )))
}

/// Linear-interpolated quantile of sorted data.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::aggregate_points;

    fn monthly(values: &[f64], start_year: i32) -> AggregatedSeries {
        let start = NaiveDate::from_ymd_opt(start_year, 1, 1).unwrap();
        let mut dates = vec![start];
        dates.extend(periods_after(start, values.len() - 1, Frequency::Month));
        aggregate_points(dates.into_iter().zip(values.iter().copied()), Frequency::Month).unwrap()
    }

    #[test]
    fn test_changepoint_placement() {
        let t: Vec<f64> = (0..10).map(|i| i as f64 / 9.0).collect();
        let cps = place_changepoints(&t);
        // hist_size = 8, so 7 changepoints on points 1..=7
        assert_eq!(cps.len(), 7);
        assert!((cps[0] - t[1]).abs() < 1e-12);
        assert!((cps[6] - t[7]).abs() < 1e-12);
        assert!(place_changepoints(&t[..2]).is_empty());
    }

    #[test]
    fn test_linear_series_is_tracked() {
        let values: Vec<f64> = (0..12).map(|i| 1000.0 + 100.0 * i as f64).collect();
        let series = monthly(&values, 2023);
        let model = FittedModel::fit(&series, &ModelParams::default()).unwrap();

        let fitted = model.predict(&series.dates());
        for (f, v) in fitted.iter().zip(&values) {
            assert!((f - v).abs() / v < 0.05, "fitted {} vs actual {}", f, v);
        }

        let future = model.predict(&model.future_periods(3));
        assert!(future[0] > values[11]);
        assert!(future[2] > future[0]);
    }

    #[test]
    fn test_yearly_seasonality_is_learned() {
        let pattern = [1.0, 0.8, 0.9, 1.0, 1.1, 1.2, 1.3, 1.2, 1.1, 1.0, 1.4, 1.8];
        let values: Vec<f64> = (0..36)
            .map(|i| 10_000.0 * pattern[i % 12] * (1.0 + 0.01 * i as f64))
            .collect();
        let series = monthly(&values, 2020);
        let model = FittedModel::fit(&series, &ModelParams::default()).unwrap();
        assert_eq!(model.seasonalities().len(), 1);

        let next_year = model.predict(&model.future_periods(12));
        let nov = next_year[10];
        let feb = next_year[1];
        assert!(nov > feb, "expected a seasonal peak, got nov={} feb={}", nov, feb);
    }

    #[test]
    fn test_multiplicative_mode_fits() {
        let pattern = [1.0, 0.7, 0.9, 1.0, 1.1, 1.3, 1.2, 1.0, 0.9, 1.0, 1.2, 1.6];
        let values: Vec<f64> = (0..36)
            .map(|i| 500.0 * (1.0 + 0.03 * i as f64) * pattern[i % 12])
            .collect();
        let series = monthly(&values, 2019);
        let params = ModelParams::comparison();
        let model = FittedModel::fit(&series, &params).unwrap();

        let fitted = model.predict(&series.dates());
        let mae: f64 = fitted
            .iter()
            .zip(&values)
            .map(|(f, v)| (f - v).abs())
            .sum::<f64>()
            / values.len() as f64;
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        assert!(mae / mean < 0.2, "relative mae too large: {}", mae / mean);
    }

    #[test]
    fn test_bounds_contain_point_and_are_deterministic() {
        let values = [120.0, 90.0, 150.0, 130.0, 170.0, 160.0, 200.0, 180.0, 220.0];
        let series = monthly(&values, 2023);
        let model = FittedModel::fit(&series, &ModelParams::default()).unwrap();
        let future = model.future_periods(6);

        let first = model.predict_with_intervals(&future);
        let second = model.predict_with_intervals(&future);
        assert_eq!(first, second);
        for p in &first {
            assert!(p.lower_bound <= p.point_forecast);
            assert!(p.point_forecast <= p.upper_bound);
        }
        assert!(first[5].upper_bound - first[5].lower_bound > 0.0);
    }

    #[test]
    fn test_too_short_series() {
        let series = monthly(&[100.0], 2023);
        let err = FittedModel::fit(&series, &ModelParams::default()).unwrap_err();
        assert!(matches!(err, ForecastError::InsufficientData { .. }));
    }

    #[test]
    fn test_invalid_priors_are_rejected() {
        let series = monthly(&[1.0, 2.0, 3.0], 2023);
        let params = ModelParams {
            changepoint_prior_scale: 0.0,
            ..ModelParams::default()
        };
        let err = FittedModel::fit(&series, &params).unwrap_err();
        assert!(matches!(err, ForecastError::ModelFit(_)));
    }

    #[test]
    fn test_multiplicative_alternation_budget() {
        let t: Vec<f64> = (0..24).map(|i| i as f64 / 23.0).collect();
        let dates = monthly(&[1.0; 24], 2021).dates();
        let components = [SeasonalComponent {
            name: "yearly".to_string(),
            period_days: 365.25,
            fourier_order: 1,
        }];
        let trend_rows: Vec<Vec<f64>> = t.iter().map(|&ti| trend_row(ti, &[])).collect();
        let seasonal_rows: Vec<Vec<f64>> = dates.iter().map(|&d| seasonal_row(d, &components)).collect();
        let y = DVector::from_iterator(
            24,
            t.iter()
                .zip(&seasonal_rows)
                .map(|(ti, sr)| (0.5 + 0.4 * ti) * (1.0 + 0.2 * sr[0])),
        );
        let trend_penalties = [1e-4, 1e-4];
        let seasonal_penalties = vec![1e-4; components[0].width()];

        let err = fit_multiplicative(&trend_rows, &seasonal_rows, &y, &trend_penalties, &seasonal_penalties, 1)
            .unwrap_err();
        assert!(matches!(err, ForecastError::ModelFit(_)));

        let (theta, _) = fit_multiplicative(
            &trend_rows,
            &seasonal_rows,
            &y,
            &trend_penalties,
            &seasonal_penalties,
            MAX_ALTERNATIONS,
        )
        .unwrap();
        assert!((theta[1] - 0.5).abs() < 0.05, "offset {}", theta[1]);
    }

    #[test]
    fn test_sample_count_is_bounded() {
        let params = ModelParams {
            uncertainty_samples: usize::MAX,
            ..ModelParams::default()
        };
        assert!(matches!(validate_params(&params), Err(ForecastError::ModelFit(_))));
        assert!(validate_horizon(MAX_PERIODS).is_ok());
        assert!(validate_horizon(MAX_PERIODS + 1).is_err());
    }

    #[test]
    fn test_quantile_interpolates() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(quantile(&data, 0.0), 1.0);
        assert_eq!(quantile(&data, 0.5), 3.0);
        assert!((quantile(&data, 0.1) - 1.4).abs() < 1e-12);
    }
}
