use std::fmt;

use serde::Serialize;

/// A spreadsheet value as read from the source file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Text used for grouping and matching keys. Integral numbers print
    /// without a trailing `.0` so an ID read as `1234.0` from XLSX and
    /// `"1234"` from CSV compare equal.
    pub fn as_key(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.trim().to_string(),
            Self::Bool(b) => b.to_string(),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Intermediate representation of one data row after the header has been
/// checked but before the amount has been validated.
#[derive(Debug, Clone)]
pub struct ParsedRow {
    /// 1-based row number in the source sheet, header included.
    pub row: usize,
    pub salesperson: Cell,
    pub amount: Cell,
    pub client_id: Cell,
    pub product: Option<Cell>,
    pub fields: Vec<(String, Cell)>,
}

/// One invoice line with a validated, finite amount.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRecord {
    pub row: usize,
    pub salesperson: String,
    pub amount: f64,
    pub client_id: String,
    pub product: Option<String>,
    /// Every source column in header order, kept verbatim for export.
    pub fields: Vec<(String, Cell)>,
}

/// A negative record cancelled against a positive record of the same client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReversalPair {
    pub negative: TransactionRecord,
    pub positive: TransactionRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    Empty,
    NotANumber,
    NotFinite,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Empty => "empty amount",
            Self::NotANumber => "not a number",
            Self::NotFinite => "not a finite number",
        };
        f.write_str(s)
    }
}

/// A row excluded from matching because its amount is unusable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvalidRecord {
    pub row: usize,
    pub value: String,
    pub reason: InvalidReason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommissionSummary {
    pub salesperson: String,
    pub total_sales: f64,
    pub invoice_count: usize,
    pub unique_clients: usize,
    /// Fraction applied, e.g. `0.01` for 1%.
    pub rate: f64,
    pub commission: f64,
}
