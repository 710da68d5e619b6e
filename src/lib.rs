//! # Revenue Forecast
//!
//! A library for turning a spreadsheet of sales/billing transactions into a
//! revenue time series, a validated forecast with confidence bounds, and
//! product-vs-product forecast comparisons.
//!
//! ## Core Concepts
//!
//! - **Transaction Table**: cleaned rows with a valid date and a numeric value
//! - **Aggregated Series**: revenue summed into contiguous day/week/month buckets
//! - **Backtest**: the model is fit on the oldest periods and scored on the
//!   most recent `test_ratio` share (MAE, RMSE, R²)
//! - **Forecast**: `horizon` future periods extended from that same fit, each
//!   with lower and upper bounds
//! - **Result Bundle**: everything a run produced; partial when a stage fails
//!
//! ## Example
//!
//! ```rust,ignore
//! use revenue_forecast::*;
//!
//! let bytes = std::fs::read("faturamento.xlsx")?;
//! let bindings = ColumnBindings::default();
//! let params = PipelineParams {
//!     horizon: 6,
//!     ..PipelineParams::default()
//! };
//!
//! let bundle = run_pipeline(&bytes, &bindings, &params);
//! if let Some(kpis) = &bundle.kpis {
//!     println!("Revenue: {}", kpis.formatted(Locale::Pt).total_revenue);
//! }
//! for point in bundle.forecast.iter().flatten() {
//!     println!("{} {:.2}", point.period, point.point_forecast);
//! }
//! ```

pub mod aggregation;
pub mod columns;
pub mod comparison;
pub mod engine;
pub mod error;
pub mod export;
pub mod i18n;
pub mod ingestion;
pub mod kpi;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod schema;
pub mod seasonality;
pub mod solver;
pub mod utils;

pub use aggregation::{aggregate, aggregate_points, AggregatedSeries, SeriesPoint};
pub use columns::{ColumnBinding, ColumnRole, ResolvedColumns};
pub use comparison::{compare, forecast_product, ProductComparison, ProductForecast};
pub use engine::{fit_and_forecast, split_train_test, ForecastOutcome, ValidationPoint, ValidationResult};
pub use error::{ErrorKind, ForecastError, Result};
pub use export::{forecast_csv_string, write_forecast_csv};
pub use i18n::{label, Label, Locale};
pub use ingestion::{load, Cell, RawTable, Transaction, TransactionTable};
pub use kpi::{calculate_kpis, FormattedKpis, Kpis};
pub use metrics::{calculate_metrics, Metrics};
pub use model::{FittedModel, ForecastPoint};
pub use pipeline::{run_pipeline, top_products, ForecastPipeline, ResultBundle, Stage, StageFailure};
pub use schema::*;
