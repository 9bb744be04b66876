// Region-wise, product-wise and territory product-wise fiscal-year analyses.
//
// Current-year sales, last-year sales and budget are folded into one
// `KeySeries` per row key, then laid out over the fixed `fiscal_schema`
// with Budget / LY / Act / Gr / Ach columns per period and a TOTAL row.
use super::{ordered_keys, Column, ColumnKind, Report, ReportTable, RowStyle, TOTAL_LABEL};
use crate::config::ReportConfig;
use crate::error::{ReportError, Result};
use crate::fiscal::{fiscal_schema, FiscalMonth, FiscalYear, Metric, MonthlySeries, Period, PeriodFigures};
use crate::types::{BudgetRecord, Measure, SaleRecord};
use std::collections::BTreeMap;

/// Budget, last-year and actual monthly series for one row key.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct KeySeries {
    pub budget: MonthlySeries,
    pub last_year: MonthlySeries,
    pub actual: MonthlySeries,
}

impl KeySeries {
    pub fn figures(&self, period: &Period) -> PeriodFigures {
        PeriodFigures {
            budget: self.budget.sum(period),
            last_year: self.last_year.sum(period),
            actual: self.actual.sum(period),
        }
    }

    pub fn merge(&mut self, other: &KeySeries) {
        self.budget.merge(&other.budget);
        self.last_year.merge(&other.last_year);
        self.actual.merge(&other.actual);
    }
}

/// The three sources every comparison report draws on.
#[derive(Debug, Clone, Copy)]
pub struct SalesSources<'a> {
    pub sales: &'a [SaleRecord],
    pub ly_sales: &'a [SaleRecord],
    pub budget: &'a [BudgetRecord],
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DropCounts {
    pub sales_out_of_year: usize,
    pub ly_out_of_year: usize,
    pub budget_without_month: usize,
}

/// Fold the sources into per-key series for `fy`.
///
/// Key functions return `None` to leave a record out (region filters).
/// Budget lines without a month count for `default_month` when given and are
/// dropped otherwise.
pub fn build_series<K, SK, BK>(
    src: SalesSources<'_>,
    fy: FiscalYear,
    measure: Measure,
    default_month: Option<FiscalMonth>,
    sale_key: SK,
    budget_key: BK,
) -> (BTreeMap<K, KeySeries>, DropCounts)
where
    K: Ord,
    SK: Fn(&SaleRecord) -> Option<K>,
    BK: Fn(&BudgetRecord) -> Option<K>,
{
    let mut map: BTreeMap<K, KeySeries> = BTreeMap::new();
    let mut drops = DropCounts::default();
    let ly = fy.previous();

    for r in src.sales {
        if !fy.contains(r.date) {
            drops.sales_out_of_year += 1;
            continue;
        }
        if let Some(key) = sale_key(r) {
            map.entry(key)
                .or_default()
                .actual
                .add(FiscalMonth::from_date(r.date), r.amount(measure));
        }
    }
    for r in src.ly_sales {
        if !ly.contains(r.date) {
            drops.ly_out_of_year += 1;
            continue;
        }
        if let Some(key) = sale_key(r) {
            map.entry(key)
                .or_default()
                .last_year
                .add(FiscalMonth::from_date(r.date), r.amount(measure));
        }
    }
    for r in src.budget {
        let Some(month) = r.month.or(default_month) else {
            drops.budget_without_month += 1;
            continue;
        };
        if let Some(key) = budget_key(r) {
            map.entry(key)
                .or_default()
                .budget
                .add(month, r.amount(measure));
        }
    }
    (map, drops)
}

pub(super) fn log_drops(drops: &DropCounts, fy: FiscalYear) {
    if drops.sales_out_of_year > 0 {
        log::warn!(
            "{} sales rows fall outside {} and were left out",
            drops.sales_out_of_year,
            fy
        );
    }
    if drops.ly_out_of_year > 0 {
        log::warn!(
            "{} last-year rows fall outside {} and were left out",
            drops.ly_out_of_year,
            fy.previous()
        );
    }
    if drops.budget_without_month > 0 {
        log::warn!(
            "{} budget lines carry no month and were left out",
            drops.budget_without_month
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Region,
    Product,
}

impl Dimension {
    pub fn label(self) -> &'static str {
        match self {
            Dimension::Region => "Region",
            Dimension::Product => "Product",
        }
    }

    fn sale_key(self, r: &SaleRecord) -> &str {
        match self {
            Dimension::Region => &r.region,
            Dimension::Product => &r.product,
        }
    }

    fn budget_key(self, r: &BudgetRecord) -> &str {
        match self {
            Dimension::Region => &r.region,
            Dimension::Product => &r.product,
        }
    }
}

pub fn schema_columns(fy: FiscalYear, label: &str) -> Vec<Column> {
    let mut columns = vec![Column::new(label, ColumnKind::Text)];
    for period in fiscal_schema() {
        for metric in Metric::ALL {
            let kind = if metric.is_percent() {
                ColumnKind::Percent
            } else {
                ColumnKind::Amount
            };
            columns.push(Column::new(metric.header(fy, &period), kind));
        }
    }
    columns
}

pub fn schema_values(series: &KeySeries) -> Vec<f64> {
    fiscal_schema()
        .iter()
        .flat_map(|period| {
            let figures = series.figures(period);
            Metric::ALL.map(|m| figures.metric(m))
        })
        .collect()
}

/// Options for one analysis table.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisOptions<'a> {
    pub dimension: Dimension,
    pub measure: Measure,
    pub fy: FiscalYear,
    /// Restrict to these regions (already normalized).
    pub regions: Option<&'a [String]>,
    pub order: &'a [String],
}

pub fn analysis_table(
    src: SalesSources<'_>,
    opts: &AnalysisOptions<'_>,
    title: &str,
    sheet_name: &str,
) -> ReportTable {
    let in_scope = |region: &str| opts.regions.map_or(true, |rs| rs.iter().any(|r| r == region));
    let (series, drops) = build_series(
        src,
        opts.fy,
        opts.measure,
        None,
        |r| in_scope(&r.region).then(|| opts.dimension.sale_key(r).to_string()),
        |r| in_scope(&r.region).then(|| opts.dimension.budget_key(r).to_string()),
    );
    log_drops(&drops, opts.fy);

    let mut table = ReportTable::new(title, sheet_name, schema_columns(opts.fy, opts.dimension.label()));
    let mut total = KeySeries::default();
    for key in ordered_keys(series.keys().cloned(), opts.order) {
        let Some(s) = series.get(&key) else { continue };
        total.merge(s);
        table.push_row(vec![key], schema_values(s), RowStyle::Normal);
    }
    table.push_row(vec![TOTAL_LABEL.to_string()], schema_values(&total), RowStyle::Total);
    table
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisKind {
    RegionWise,
    ProductWise,
    TerritoryProductWise,
}

impl AnalysisKind {
    fn title(self) -> &'static str {
        match self {
            AnalysisKind::RegionWise => "Region-wise Sales Analysis",
            AnalysisKind::ProductWise => "Product-wise Sales Analysis",
            AnalysisKind::TerritoryProductWise => "Territory Product-wise Sales Analysis",
        }
    }

    fn file_prefix(self) -> &'static str {
        match self {
            AnalysisKind::RegionWise => "region_wise_analysis",
            AnalysisKind::ProductWise => "product_wise_analysis",
            AnalysisKind::TerritoryProductWise => "ts_product_wise_analysis",
        }
    }

    fn sheet_prefix(self) -> &'static str {
        match self {
            AnalysisKind::RegionWise => "Region",
            AnalysisKind::ProductWise => "Product",
            AnalysisKind::TerritoryProductWise => "TS-PW",
        }
    }
}

/// Quantity and value sheets for one analysis kind.
pub fn analysis_report(
    kind: AnalysisKind,
    src: SalesSources<'_>,
    cfg: &ReportConfig,
    fy: FiscalYear,
) -> Result<Report> {
    let (dimension, order, regions) = match kind {
        AnalysisKind::RegionWise => (Dimension::Region, &cfg.region_order, None),
        AnalysisKind::ProductWise => (Dimension::Product, &cfg.product_order, None),
        AnalysisKind::TerritoryProductWise => {
            if cfg.territory_regions.is_empty() {
                return Err(ReportError::Config(
                    "territory_regions must list at least one region".to_string(),
                ));
            }
            (
                Dimension::Product,
                &cfg.product_order,
                Some(cfg.territory_regions.as_slice()),
            )
        }
    };

    let tables = Measure::BOTH
        .iter()
        .map(|&measure| {
            let opts = AnalysisOptions {
                dimension,
                measure,
                fy,
                regions,
                order,
            };
            let unit = match measure {
                Measure::Quantity => "Qty".to_string(),
                Measure::Value => format!("Value in {}", cfg.value_unit),
            };
            let title = format!("{} ({}) - {}", kind.title(), unit, fy);
            let sheet = format!("{} {}", kind.sheet_prefix(), measure.label());
            analysis_table(src, &opts, &title, &sheet)
        })
        .collect();

    Ok(Report {
        name: kind.title().to_string(),
        file_stem: format!("{}_{}", kind.file_prefix(), fy.label()),
        tables,
    })
}
