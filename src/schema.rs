use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Calendar bucket size used when resampling transactions into a series.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    #[serde(alias = "D", alias = "daily")]
    #[schemars(description = "One bucket per calendar day")]
    Day,

    #[serde(alias = "W", alias = "weekly")]
    #[schemars(description = "One bucket per ISO week, labelled by its Monday")]
    Week,

    #[default]
    #[serde(alias = "M", alias = "MS", alias = "monthly")]
    #[schemars(description = "One bucket per calendar month, labelled by its first day")]
    Month,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SeasonalityMode {
    #[default]
    #[schemars(description = "Seasonal terms are added to the trend: y = trend + seasonal")]
    Additive,

    #[schemars(
        description = "Seasonal terms scale the trend: y = trend * (1 + seasonal). Suits series whose swings grow with the level."
    )]
    Multiplicative,
}

/// User-declared column names for each logical role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct ColumnBindings {
    #[schemars(description = "Header of the transaction date column (mandatory)")]
    pub date: String,

    #[schemars(description = "Header of the transaction amount column (mandatory)")]
    pub value: String,

    #[serde(default)]
    #[schemars(description = "Header of the product description column (optional)")]
    pub product: Option<String>,

    #[serde(default)]
    #[schemars(description = "Header of the client name column (optional)")]
    pub client: Option<String>,
}

impl ColumnBindings {
    pub fn new(date: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            value: value.into(),
            product: None,
            client: None,
        }
    }

    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }

    pub fn with_client(mut self, client: impl Into<String>) -> Self {
        self.client = Some(client.into());
        self
    }
}

impl Default for ColumnBindings {
    fn default() -> Self {
        Self {
            date: "EMISSÃO".to_string(),
            value: "VALOR TOTAL".to_string(),
            product: Some("DESCRIÇÃO MATERIAL".to_string()),
            client: Some("RAZÃO SOCIAL CLIENTE".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(default)]
pub struct ModelParams {
    #[serde(alias = "prophet_changepoint_prior_scale")]
    #[schemars(
        description = "Prior scale on trend rate changes. Larger values let the trend bend more often. Must be positive."
    )]
    pub changepoint_prior_scale: f64,

    #[serde(alias = "prophet_seasonality_prior_scale")]
    #[schemars(
        description = "Prior scale on the Fourier seasonality coefficients. Larger values allow stronger seasonal swings. Must be positive."
    )]
    pub seasonality_prior_scale: f64,

    #[serde(alias = "prophet_seasonality_mode")]
    #[schemars(description = "How seasonality combines with the trend")]
    pub seasonality_mode: SeasonalityMode,

    #[schemars(description = "Coverage of the confidence band, strictly between 0 and 1")]
    pub interval_width: f64,

    #[schemars(description = "Number of simulated paths used to estimate the confidence band")]
    pub uncertainty_samples: usize,
}

impl ModelParams {
    /// Configuration used for product comparisons: multiplicative seasonality
    /// with the stock priors, not user-tunable.
    pub fn comparison() -> Self {
        Self {
            changepoint_prior_scale: 0.05,
            seasonality_prior_scale: 10.0,
            seasonality_mode: SeasonalityMode::Multiplicative,
            ..Self::default()
        }
    }
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            changepoint_prior_scale: 0.65,
            seasonality_prior_scale: 25.0,
            seasonality_mode: SeasonalityMode::Additive,
            interval_width: 0.8,
            uncertainty_samples: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(default)]
pub struct PipelineParams {
    #[schemars(description = "Fraction of the most recent periods held out for validation, in (0, 1)")]
    pub test_ratio: f64,

    #[serde(alias = "periodos_forecast")]
    #[schemars(description = "Number of future periods to forecast")]
    pub horizon: usize,

    #[serde(flatten)]
    pub model: ModelParams,

    #[schemars(description = "Aggregation frequency of the revenue series")]
    pub freq_agg: Frequency,

    #[schemars(description = "How many best-selling products to list in the result")]
    pub top_n_products: usize,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            test_ratio: 0.2,
            horizon: 12,
            model: ModelParams::default(),
            freq_agg: Frequency::Month,
            top_n_products: 20,
        }
    }
}

impl PipelineParams {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(PipelineParams)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_form_defaults() {
        let params = PipelineParams::default();
        assert_eq!(params.test_ratio, 0.2);
        assert_eq!(params.horizon, 12);
        assert_eq!(params.model.changepoint_prior_scale, 0.65);
        assert_eq!(params.model.seasonality_prior_scale, 25.0);
        assert_eq!(params.model.seasonality_mode, SeasonalityMode::Additive);
        assert_eq!(params.freq_agg, Frequency::Month);
    }

    #[test]
    fn test_flat_json_with_legacy_keys() {
        let json = r#"{
            "test_ratio": 0.25,
            "periodos_forecast": 6,
            "prophet_changepoint_prior_scale": 0.1,
            "seasonality_mode": "multiplicative",
            "freq_agg": "W"
        }"#;

        let params = PipelineParams::from_json(json).unwrap();
        assert_eq!(params.test_ratio, 0.25);
        assert_eq!(params.horizon, 6);
        assert_eq!(params.model.changepoint_prior_scale, 0.1);
        assert_eq!(params.model.seasonality_prior_scale, 25.0);
        assert_eq!(params.model.seasonality_mode, SeasonalityMode::Multiplicative);
        assert_eq!(params.freq_agg, Frequency::Week);
    }

    #[test]
    fn test_schema_generation() {
        let schema_json = PipelineParams::schema_as_json().unwrap();
        assert!(schema_json.contains("test_ratio"));
        assert!(schema_json.contains("changepoint_prior_scale"));
        assert!(schema_json.contains("freq_agg"));
    }

    #[test]
    fn test_comparison_params_are_multiplicative() {
        let params = ModelParams::comparison();
        assert_eq!(params.seasonality_mode, SeasonalityMode::Multiplicative);
        assert_eq!(params.changepoint_prior_scale, 0.05);
        assert_eq!(params.seasonality_prior_scale, 10.0);
    }
}
