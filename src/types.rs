use crate::fiscal::FiscalMonth;
use chrono::NaiveDate;
use serde::Serialize;

/// One cell as read from a workbook or CSV file.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(n) => {
                if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            Cell::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

/// A sheet before any column is interpreted.
#[derive(Debug, Clone)]
pub struct RawSheet {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Measure {
    Quantity,
    Value,
}

impl Measure {
    pub const BOTH: [Measure; 2] = [Measure::Quantity, Measure::Value];

    pub fn label(self) -> &'static str {
        match self {
            Measure::Quantity => "Qty",
            Measure::Value => "Value",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SaleRecord {
    pub date: NaiveDate,
    pub branch: String,
    pub region: String,
    pub customer: String,
    pub executive: String,
    pub product: String,
    pub company_group: String,
    pub quantity: f64,
    pub value: f64,
}

impl SaleRecord {
    pub fn amount(&self, measure: Measure) -> f64 {
        match measure {
            Measure::Quantity => self.quantity,
            Measure::Value => self.value,
        }
    }
}

/// A budget line. `month` is `None` for single-month budget sheets, which
/// apply to whatever month the report is run for.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetRecord {
    pub month: Option<FiscalMonth>,
    pub branch: String,
    pub region: String,
    pub customer: String,
    pub executive: String,
    pub product: String,
    pub company_group: String,
    pub quantity: f64,
    pub value: f64,
}

impl BudgetRecord {
    pub fn amount(&self, measure: Measure) -> f64 {
        match measure {
            Measure::Quantity => self.quantity,
            Measure::Value => self.value,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutstandingRecord {
    pub branch: String,
    pub customer: String,
    pub executive: String,
    pub due_date: Option<NaiveDate>,
    pub amount: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub file: String,
    pub sheet: String,
    pub total_rows: usize,
    pub loaded_rows: usize,
    pub skipped_rows: usize,
}

/// Written to `summary.json` after a run.
#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    pub fiscal_year: String,
    pub month: Option<String>,
    pub inputs: Vec<LoadReport>,
    pub outputs: Vec<OutputSummary>,
}

#[derive(Debug, Serialize)]
pub struct OutputSummary {
    pub report: String,
    pub file: String,
    pub sheets: Vec<String>,
    pub rows: usize,
}
