use crate::error::{ForecastError, Result};
use crate::model::ForecastPoint;
use std::io::Write;

/// Column headers of the stored forecast table. These are the internal,
/// untranslated names; the presentation layer relabels them per locale.
pub const FORECAST_CSV_HEADERS: [&str; 4] = ["Data", "Previsao", "IC_Inferior", "IC_Superior"];

pub fn write_forecast_csv<W: Write>(forecast: &[ForecastPoint], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(FORECAST_CSV_HEADERS)?;

    for point in forecast {
        csv_writer.write_record([
            point.period.format("%Y-%m-%d").to_string(),
            point.point_forecast.to_string(),
            point.lower_bound.to_string(),
            point.upper_bound.to_string(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(())
}

pub fn forecast_csv_string(forecast: &[ForecastPoint]) -> Result<String> {
    let mut buffer = Vec::new();
    write_forecast_csv(forecast, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| ForecastError::DataLoad(format!("forecast CSV is not UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_csv_layout() {
        let forecast = vec![
            ForecastPoint {
                period: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                point_forecast: 1500.5,
                lower_bound: 1400.0,
                upper_bound: 1600.25,
            },
            ForecastPoint {
                period: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
                point_forecast: 1550.0,
                lower_bound: 1420.0,
                upper_bound: 1700.0,
            },
        ];

        let csv = forecast_csv_string(&forecast).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Data,Previsao,IC_Inferior,IC_Superior");
        assert_eq!(lines[1], "2024-01-01,1500.5,1400,1600.25");
        assert_eq!(lines.len(), 3);
    }
}
