use crate::columns::ResolvedColumns;
use crate::error::{ForecastError, Result};
use crate::schema::ColumnBindings;
use crate::utils::parse_date_text;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::NaiveDateTime;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = b"\xD0\xCF\x11\xE0";
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Empty,
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
    Text(String),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.trim().is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value)
        }
    }

    /// Date interpretation of the cell; `None` for anything unparseable.
    /// Plain numbers are not read as dates.
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Cell::DateTime(dt) => Some(*dt),
            Cell::Text(s) => parse_date_text(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) if n.is_finite() => Some(*n),
            Cell::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Cell::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    /// Text used for categorical columns such as product or client.
    pub fn as_label(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) => Some(s.clone()),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Some(format!("{}", *n as i64)),
            Cell::Number(n) => Some(n.to_string()),
            Cell::Bool(b) => Some(b.to_string()),
            Cell::DateTime(dt) => Some(dt.to_string()),
        }
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty | Data::Error(_) => Cell::Empty,
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Float(f) => Cell::Number(*f),
            Data::Bool(b) => Cell::Bool(*b),
            Data::String(s) | Data::DurationIso(s) => Cell::text(s.clone()),
            Data::DateTimeIso(s) => match parse_date_text(s) {
                Some(dt) => Cell::DateTime(dt),
                None => Cell::text(s.clone()),
            },
            Data::DateTime(dt) => match dt.as_datetime() {
                Some(dt) => Cell::DateTime(dt),
                None => Cell::Empty,
            },
        }
    }
}

/// Sheet contents before any column semantics are applied.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    /// Builds a table, trimming every header.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            headers: headers.into_iter().map(|h| h.trim().to_string()).collect(),
            rows,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(ForecastError::DataLoad("input is empty".to_string()));
        }

        if bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(OLE_MAGIC) {
            Self::from_workbook(bytes)
        } else {
            Self::from_csv(bytes)
        }
    }

    pub fn from_workbook(bytes: &[u8]) -> Result<Self> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
            .map_err(|e| ForecastError::DataLoad(format!("unreadable workbook: {}", e)))?;

        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| ForecastError::DataLoad("workbook has no worksheets".to_string()))?
            .map_err(|e| ForecastError::DataLoad(format!("unreadable worksheet: {}", e)))?;

        let mut rows = range.rows();
        let headers = rows
            .next()
            .ok_or_else(|| ForecastError::DataLoad("worksheet is empty".to_string()))?
            .iter()
            .map(|data| Cell::from(data).as_label().unwrap_or_default())
            .collect();

        let body = rows
            .map(|row| row.iter().map(Cell::from).collect())
            .collect();

        Ok(Self::new(headers, body))
    }

    pub fn from_csv(bytes: &[u8]) -> Result<Self> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        let delimiter = sniff_delimiter(bytes);

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(bytes);

        let headers = reader
            .headers()
            .map_err(|e| ForecastError::DataLoad(format!("unreadable header row: {}", e)))?
            .iter()
            .map(str::to_string)
            .collect::<Vec<_>>();

        if headers.iter().all(|h| h.trim().is_empty()) {
            return Err(ForecastError::DataLoad("header row is empty".to_string()));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(Cell::text).collect());
        }

        Ok(Self::new(headers, rows))
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

fn sniff_delimiter(bytes: &[u8]) -> u8 {
    let first_line = bytes.split(|b| *b == b'\n').next().unwrap_or(bytes);
    let commas = first_line.iter().filter(|b| **b == b',').count();
    let semicolons = first_line.iter().filter(|b| **b == b';').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub date: NaiveDateTime,
    pub value: f64,
    pub product: Option<String>,
    pub client: Option<String>,
    /// Cells of the columns listed in [`TransactionTable::passthrough`].
    pub extra: Vec<Cell>,
}

/// Cleaned transactions: every row has a valid date and a numeric value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionTable {
    pub columns: ResolvedColumns,
    pub passthrough: Vec<String>,
    pub rows: Vec<Transaction>,
    /// Rows removed because their date did not parse.
    pub dropped_rows: usize,
}

impl TransactionTable {
    pub fn from_raw(raw: &RawTable, bindings: &ColumnBindings) -> Result<Self> {
        let columns = ResolvedColumns::resolve_and_validate(bindings, &raw.headers)?;

        let date_idx = raw
            .column_index(&columns.date.name)
            .ok_or_else(|| missing(&columns, true))?;
        let value_idx = raw
            .column_index(&columns.value.name)
            .ok_or_else(|| missing(&columns, false))?;
        let product_idx = columns.product_column().and_then(|c| raw.column_index(c));
        let client_idx = columns.client_column().and_then(|c| raw.column_index(c));

        let bound = [Some(date_idx), Some(value_idx), product_idx, client_idx];
        let passthrough_idx: Vec<usize> = (0..raw.headers.len())
            .filter(|i| !bound.contains(&Some(*i)))
            .collect();

        let empty = Cell::Empty;
        let mut rows = Vec::with_capacity(raw.rows.len());
        let mut dropped_rows = 0;

        for row in &raw.rows {
            let cell = |idx: usize| row.get(idx).unwrap_or(&empty);

            let Some(date) = cell(date_idx).as_datetime() else {
                dropped_rows += 1;
                continue;
            };

            rows.push(Transaction {
                date,
                value: cell(value_idx).as_number().unwrap_or(0.0),
                product: product_idx.and_then(|i| cell(i).as_label()),
                client: client_idx.and_then(|i| cell(i).as_label()),
                extra: passthrough_idx.iter().map(|i| cell(*i).clone()).collect(),
            });
        }

        if dropped_rows > 0 {
            debug!("Dropped {} rows with unparseable dates", dropped_rows);
        }

        Ok(Self {
            columns,
            passthrough: passthrough_idx
                .iter()
                .map(|i| raw.headers[*i].clone())
                .collect(),
            rows,
            dropped_rows,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn date_range(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let min = self.rows.iter().map(|r| r.date).min()?;
        let max = self.rows.iter().map(|r| r.date).max()?;
        Some((min, max))
    }

    /// Rows whose product equals `product` exactly.
    pub fn rows_for_product<'a>(&'a self, product: &'a str) -> impl Iterator<Item = &'a Transaction> + 'a {
        self.rows
            .iter()
            .filter(move |r| r.product.as_deref() == Some(product))
    }
}

fn missing(columns: &ResolvedColumns, date: bool) -> ForecastError {
    let binding = if date { &columns.date } else { &columns.value };
    ForecastError::MissingColumn {
        role: binding.role.to_string(),
        column: binding.declared.clone(),
    }
}

/// Parses `bytes` and cleans them into a transaction table.
pub fn load(bytes: &[u8], bindings: &ColumnBindings) -> Result<TransactionTable> {
    info!("Loading transactions ({} bytes)", bytes.len());
    let raw = RawTable::from_bytes(bytes)?;
    debug!("Input has {} columns and {} rows", raw.headers.len(), raw.rows.len());

    let table = TransactionTable::from_raw(&raw, bindings)?;
    info!(
        "Loaded {} transactions ({} dropped)",
        table.len(),
        table.dropped_rows
    );
    Ok(table)
}
