use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Mean Absolute Error
    #[serde(rename = "MAE")]
    pub mae: f64,
    /// Root Mean Squared Error
    #[serde(rename = "RMSE")]
    pub rmse: f64,
    /// Coefficient of determination. NaN when fewer than two points were scored.
    #[serde(rename = "R2")]
    pub r2: f64,
}

pub fn calculate_metrics(actual: &[f64], predicted: &[f64]) -> Result<Metrics> {
    if actual.is_empty() {
        return Err(ForecastError::InsufficientData {
            available: 0,
            details: "no test points to score".to_string(),
        });
    }
    if actual.len() != predicted.len() {
        return Err(ForecastError::ModelFit(format!(
            "{} actual values but {} predictions",
            actual.len(),
            predicted.len()
        )));
    }

    let n = actual.len() as f64;

    let mae = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum::<f64>()
        / n;

    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    let rmse = (ss_res / n).sqrt();

    Ok(Metrics {
        mae,
        rmse,
        r2: r_squared(actual, ss_res),
    })
}

fn r_squared(actual: &[f64], ss_res: f64) -> f64 {
    if actual.len() < 2 {
        return f64::NAN;
    }
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        // constant actuals: perfect only if every prediction was exact
        if ss_res == 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        1.0 - ss_res / ss_tot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_prediction() {
        let m = calculate_metrics(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(m.mae, 0.0);
        assert_eq!(m.rmse, 0.0);
        assert_eq!(m.r2, 1.0);
    }

    #[test]
    fn test_known_values() {
        let m = calculate_metrics(&[3.0, -0.5, 2.0, 7.0], &[2.5, 0.0, 2.0, 8.0]).unwrap();
        assert!((m.mae - 0.5).abs() < 1e-12);
        assert!((m.rmse - 0.375f64.sqrt()).abs() < 1e-12);
        assert!((m.r2 - 0.948_608_137_044_967_9).abs() < 1e-9);
    }

    #[test]
    fn test_single_point_has_nan_r2() {
        let m = calculate_metrics(&[10.0], &[12.0]).unwrap();
        assert_eq!(m.mae, 2.0);
        assert!(m.r2.is_nan());
    }

    #[test]
    fn test_constant_actuals() {
        let m = calculate_metrics(&[5.0, 5.0], &[4.0, 6.0]).unwrap();
        assert_eq!(m.r2, 0.0);
    }

    #[test]
    fn test_empty_and_mismatch() {
        assert!(calculate_metrics(&[], &[]).is_err());
        assert!(calculate_metrics(&[1.0, 2.0], &[1.0]).is_err());
    }

    #[test]
    fn test_serialized_names() {
        let m = calculate_metrics(&[1.0, 2.0], &[1.0, 2.0]).unwrap();
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains("\"MAE\""));
        assert!(json.contains("\"RMSE\""));
        assert!(json.contains("\"R2\""));
    }
}
