//! Report builders. Each builder turns loaded records into one or more
//! [`ReportTable`]s; rendering lives in `output`.

pub mod analysis;
pub mod budget;
pub mod growth;
pub mod nbc;
pub mod outstanding;

use std::collections::BTreeSet;

pub const TOTAL_LABEL: &str = "TOTAL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Amount,
    Percent,
    Count,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub header: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn new(header: impl Into<String>, kind: ColumnKind) -> Self {
        Column {
            header: header.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStyle {
    Normal,
    Subtotal,
    Total,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub cells: Vec<CellValue>,
    pub style: RowStyle,
}

#[cfg(test)]
impl TableRow {
    pub fn label(&self) -> Option<&str> {
        match self.cells.first() {
            Some(CellValue::Text(s)) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportTable {
    pub title: String,
    pub sheet_name: String,
    pub columns: Vec<Column>,
    pub rows: Vec<TableRow>,
}

impl ReportTable {
    pub fn new(title: impl Into<String>, sheet_name: impl Into<String>, columns: Vec<Column>) -> Self {
        ReportTable {
            title: title.into(),
            sheet_name: sheet_name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Text cells for the leading label columns, numbers for the rest.
    pub fn push_row(&mut self, labels: Vec<String>, numbers: Vec<f64>, style: RowStyle) {
        let mut cells: Vec<CellValue> = labels.into_iter().map(CellValue::Text).collect();
        cells.extend(numbers.into_iter().map(CellValue::Number));
        debug_assert_eq!(cells.len(), self.columns.len());
        self.rows.push(TableRow { cells, style });
    }

    /// Rows excluding subtotals and the grand total.
    pub fn body_len(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| r.style == RowStyle::Normal)
            .count()
    }
}

#[cfg(test)]
impl ReportTable {
    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.header == header)
    }

    /// First row whose leading cells equal `labels`.
    pub fn find_row(&self, labels: &[&str]) -> Option<&TableRow> {
        self.rows.iter().find(|row| {
            labels.iter().enumerate().all(|(i, l)| {
                matches!(row.cells.get(i), Some(CellValue::Text(s)) if s == l)
            })
        })
    }

    pub fn number(&self, labels: &[&str], header: &str) -> Option<f64> {
        let col = self.column_index(header)?;
        match self.find_row(labels)?.cells.get(col)? {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(_) => None,
        }
    }
}

/// A finished report: one workbook with one sheet per table.
#[derive(Debug, Clone)]
pub struct Report {
    pub name: String,
    pub file_stem: String,
    pub tables: Vec<ReportTable>,
}

/// Keys in configured order first, the rest alphabetically.
pub fn ordered_keys<I>(keys: I, preferred: &[String]) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut rest: BTreeSet<String> = keys.into_iter().collect();
    let mut out = Vec::with_capacity(rest.len());
    for key in preferred {
        if rest.remove(key) {
            out.push(key.clone());
        }
    }
    out.extend(rest);
    out
}
