use crate::error::{ForecastError, Result};
use crate::ingestion::TransactionTable;
use crate::schema::Frequency;
use crate::utils::{get_periods_in_range, period_start};
use chrono::NaiveDate;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Upper bound on the number of buckets a single series may span.
pub const MAX_PERIODS: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub period_start: NaiveDate,
    pub total_value: f64,
}

/// Revenue summed into contiguous calendar buckets, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedSeries {
    pub frequency: Frequency,
    pub points: Vec<SeriesPoint>,
}

impl AggregatedSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.period_start).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.total_value).collect()
    }

    pub fn first_period(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.period_start)
    }

    pub fn last_period(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.period_start)
    }

    /// Chronological split: `[0, idx)` and `[idx, len)`.
    pub fn split_at(&self, idx: usize) -> (AggregatedSeries, AggregatedSeries) {
        let idx = idx.min(self.points.len());
        let (head, tail) = self.points.split_at(idx);
        (
            AggregatedSeries {
                frequency: self.frequency,
                points: head.to_vec(),
            },
            AggregatedSeries {
                frequency: self.frequency,
                points: tail.to_vec(),
            },
        )
    }

    /// Re-buckets the series' own totals.
    pub fn resample(&self, frequency: Frequency) -> Result<AggregatedSeries> {
        aggregate_points(
            self.points.iter().map(|p| (p.period_start, p.total_value)),
            frequency,
        )
    }
}

/// Sums `(date, value)` pairs per bucket, filling empty buckets with zero.
pub fn aggregate_points<I>(points: I, frequency: Frequency) -> Result<AggregatedSeries>
where
    I: IntoIterator<Item = (NaiveDate, f64)>,
{
    let mut buckets: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for (date, value) in points {
        *buckets.entry(period_start(date, frequency)).or_insert(0.0) += value;
    }

    let (Some(first), Some(last)) = (
        buckets.keys().next().copied(),
        buckets.keys().next_back().copied(),
    ) else {
        return Err(ForecastError::Aggregation(
            "no transactions to aggregate".to_string(),
        ));
    };

    let span_days = (last - first).num_days().max(0) as usize;
    let approx_periods = match frequency {
        Frequency::Day => span_days + 1,
        Frequency::Week => span_days / 7 + 1,
        Frequency::Month => span_days / 28 + 1,
    };
    if approx_periods > MAX_PERIODS {
        return Err(ForecastError::Aggregation(format!(
            "date range {} to {} spans too many {:?} periods",
            first, last, frequency
        )));
    }

    let points: Vec<SeriesPoint> = get_periods_in_range(first, last, frequency)
        .into_iter()
        .map(|period| SeriesPoint {
            period_start: period,
            total_value: buckets.get(&period).copied().unwrap_or(0.0),
        })
        .collect();

    if points.len() < buckets.len() {
        return Err(ForecastError::Aggregation(
            "could not build a regular calendar index".to_string(),
        ));
    }

    debug!(
        "Aggregated {} non-empty buckets into {} {:?} periods",
        buckets.len(),
        points.len(),
        frequency
    );

    Ok(AggregatedSeries { frequency, points })
}

pub fn aggregate(table: &TransactionTable, frequency: Frequency) -> Result<AggregatedSeries> {
    if table.is_empty() {
        return Err(ForecastError::Aggregation(
            "transaction table is empty".to_string(),
        ));
    }

    let series = aggregate_points(
        table.rows.iter().map(|r| (r.date.date(), r.value)),
        frequency,
    )?;
    info!(
        "Aggregated {} transactions into {} periods",
        table.len(),
        series.len()
    );
    Ok(series)
}
