use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Pt,
    En,
    Es,
}

impl Locale {
    /// Parses a language tag such as `pt`, `en-US` or `es_AR`, falling back
    /// to Portuguese.
    pub fn from_code(code: &str) -> Self {
        let primary = code
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match primary.as_str() {
            "en" => Locale::En,
            "es" => Locale::Es,
            _ => Locale::Pt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    Date,
    Forecast,
    LowerBound,
    UpperBound,
    TotalValue,
    TrainHistory,
    TestActuals,
    TestForecast,
    FullHistory,
    FutureForecast,
    ConfidenceInterval,
    History,
    ForecastFor,
    NotAvailable,
    DateRangeConnector,
}

pub fn label(key: Label, locale: Locale) -> &'static str {
    use Label::*;
    use Locale::*;

    match (key, locale) {
        (Date, Pt) => "Data",
        (Date, En) => "Date",
        (Date, Es) => "Fecha",

        (Forecast, Pt) => "Previsão",
        (Forecast, En) => "Forecast",
        (Forecast, Es) => "Pronóstico",

        (LowerBound, Pt) => "IC Inferior",
        (LowerBound, En) => "Lower Bound",
        (LowerBound, Es) => "IC Inferior",

        (UpperBound, Pt) => "IC Superior",
        (UpperBound, En) => "Upper Bound",
        (UpperBound, Es) => "IC Superior",

        (TotalValue, Pt) => "Valor Total",
        (TotalValue, En) => "Total Value",
        (TotalValue, Es) => "Valor Total",

        (TrainHistory, Pt) => "Histórico (Treino)",
        (TrainHistory, En) => "History (Train)",
        (TrainHistory, Es) => "Histórico (Entrenamiento)",

        (TestActuals, Pt) => "Valores Reais (Teste)",
        (TestActuals, En) => "Actual Values (Test)",
        (TestActuals, Es) => "Valores Reales (Prueba)",

        (TestForecast, Pt) => "Previsão (Teste)",
        (TestForecast, En) => "Forecast (Test)",
        (TestForecast, Es) => "Pronóstico (Prueba)",

        (FullHistory, Pt) => "Histórico Completo",
        (FullHistory, En) => "Full History",
        (FullHistory, Es) => "Histórico Completo",

        (FutureForecast, Pt) => "Previsão Futura",
        (FutureForecast, En) => "Future Forecast",
        (FutureForecast, Es) => "Pronóstico Futuro",

        (ConfidenceInterval, Pt) => "Intervalo de Confiança",
        (ConfidenceInterval, En) => "Confidence Interval",
        (ConfidenceInterval, Es) => "Intervalo de Confianza",

        (History, Pt) => "Histórico",
        (History, En) => "History",
        (History, Es) => "Histórico",

        (ForecastFor, Pt) => "Previsão para",
        (ForecastFor, En) => "Forecast for",
        (ForecastFor, Es) => "Pronóstico para",

        (NotAvailable, _) => "N/A",

        (DateRangeConnector, Pt) => "a",
        (DateRangeConnector, En) => "to",
        (DateRangeConnector, Es) => "a",
    }
}

/// `1234567.891` with 2 decimals -> `1,234,567.89`.
pub fn format_thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && formatted.chars().any(|c| c.is_ascii_digit() && c != '0') {
        "-"
    } else {
        ""
    };

    match frac_part {
        Some(frac) => format!("{}{}.{}", sign, grouped, frac),
        None => format!("{}{}", sign, grouped),
    }
}

pub fn format_currency(value: f64) -> String {
    format!("R$ {}", format_thousands(value, 2))
}

pub fn format_count(count: usize) -> String {
    format_thousands(count as f64, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locale_from_code() {
        assert_eq!(Locale::from_code("en-US"), Locale::En);
        assert_eq!(Locale::from_code("es_AR"), Locale::Es);
        assert_eq!(Locale::from_code("pt"), Locale::Pt);
        assert_eq!(Locale::from_code("de"), Locale::Pt);
    }

    #[test]
    fn test_labels_are_pure() {
        assert_eq!(label(Label::Forecast, Locale::En), "Forecast");
        assert_eq!(label(Label::Forecast, Locale::Pt), "Previsão");
        assert_eq!(label(Label::Forecast, Locale::Es), "Pronóstico");
        assert_eq!(label(Label::NotAvailable, Locale::Es), "N/A");
    }

    #[test]
    fn test_format_thousands() {
        assert_eq!(format_thousands(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_thousands(999.0, 2), "999.00");
        assert_eq!(format_thousands(-1500.5, 2), "-1,500.50");
        assert_eq!(format_thousands(1000.0, 0), "1,000");
        assert_eq!(format_currency(0.0), "R$ 0.00");
        assert_eq!(format_count(12), "12");
    }
}
