use crate::utils::days_since_epoch;
use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalComponent {
    pub name: String,
    pub period_days: f64,
    pub fourier_order: usize,
}

impl SeasonalComponent {
    pub fn yearly() -> Self {
        Self {
            name: "yearly".to_string(),
            period_days: 365.25,
            fourier_order: 10,
        }
    }

    pub fn weekly() -> Self {
        Self {
            name: "weekly".to_string(),
            period_days: 7.0,
            fourier_order: 3,
        }
    }

    pub fn width(&self) -> usize {
        2 * self.fourier_order
    }

    /// Appends the `sin`/`cos` pairs for `date` to `row`.
    pub fn push_features(&self, date: NaiveDate, row: &mut Vec<f64>) {
        let t = days_since_epoch(date);
        for k in 1..=self.fourier_order {
            let angle = 2.0 * PI * k as f64 * t / self.period_days;
            row.push(angle.sin());
            row.push(angle.cos());
        }
    }
}

/// Seasonalities worth fitting on a history with these dates: yearly needs two
/// full years, weekly needs two weeks of sub-weekly observations.
pub fn detect_seasonalities(dates: &[NaiveDate]) -> Vec<SeasonalComponent> {
    let (Some(first), Some(last)) = (dates.iter().min(), dates.iter().max()) else {
        return Vec::new();
    };
    let span_days = (*last - *first).num_days();

    let min_spacing = dates
        .windows(2)
        .map(|w| (w[1] - w[0]).num_days().abs())
        .min()
        .unwrap_or(i64::MAX);

    let mut components = Vec::new();
    if span_days >= 730 {
        components.push(SeasonalComponent::yearly());
    }
    if span_days >= 14 && min_spacing < 7 {
        components.push(SeasonalComponent::weekly());
    }

    debug!(
        "Seasonalities for a {}-day history: {:?}",
        span_days,
        components.iter().map(|c| c.name.as_str()).collect::<Vec<_>>()
    );
    components
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Frequency;
    use crate::utils::get_periods_in_range;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_short_monthly_history_has_no_seasonality() {
        let dates = get_periods_in_range(d(2023, 1, 1), d(2023, 12, 1), Frequency::Month);
        assert!(detect_seasonalities(&dates).is_empty());
    }

    #[test]
    fn test_three_years_of_months_enable_yearly() {
        let dates = get_periods_in_range(d(2021, 1, 1), d(2023, 12, 1), Frequency::Month);
        let found = detect_seasonalities(&dates);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "yearly");
    }

    #[test]
    fn test_daily_history_enables_weekly() {
        let dates = get_periods_in_range(d(2023, 1, 1), d(2023, 2, 28), Frequency::Day);
        let found = detect_seasonalities(&dates);
        assert_eq!(found, vec![SeasonalComponent::weekly()]);
    }

    #[test]
    fn test_fourier_features_are_periodic() {
        let weekly = SeasonalComponent::weekly();
        let mut a = Vec::new();
        let mut b = Vec::new();
        weekly.push_features(d(2023, 3, 6), &mut a);
        weekly.push_features(d(2023, 3, 13), &mut b);
        assert_eq!(a.len(), weekly.width());
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-9);
        }
    }
}
