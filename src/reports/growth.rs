// Product growth: month and YTD comparison per company group and product,
// with a subtotal per company group.
use super::analysis::{build_series, log_drops, KeySeries, SalesSources};
use super::{ordered_keys, Column, ColumnKind, Report, ReportTable, RowStyle, TOTAL_LABEL};
use crate::config::ReportConfig;
use crate::fiscal::{FiscalMonth, FiscalYear, Metric, Period};
use crate::types::Measure;
use std::collections::{BTreeMap, BTreeSet};

fn period_values(series: &KeySeries, periods: &[Period]) -> Vec<f64> {
    periods
        .iter()
        .flat_map(|p| {
            let f = series.figures(p);
            Metric::ALL.map(|m| f.metric(m))
        })
        .collect()
}

pub fn growth_table(
    src: SalesSources<'_>,
    fy: FiscalYear,
    month: FiscalMonth,
    measure: Measure,
    product_order: &[String],
    title: &str,
) -> ReportTable {
    let (series, drops) = build_series(
        src,
        fy,
        measure,
        Some(month),
        |r| Some((r.company_group.clone(), r.product.clone())),
        |r| Some((r.company_group.clone(), r.product.clone())),
    );
    log_drops(&drops, fy);

    let periods = [Period::Month(month), Period::ytd_through(month)];
    let mut columns = vec![
        Column::new("Company Group", ColumnKind::Text),
        Column::new("Product", ColumnKind::Text),
    ];
    for p in &periods {
        for m in Metric::ALL {
            let kind = if m.is_percent() {
                ColumnKind::Percent
            } else {
                ColumnKind::Amount
            };
            columns.push(Column::new(m.header(fy, p), kind));
        }
    }
    let mut table = ReportTable::new(
        title,
        format!("Growth {}", measure.label()),
        columns,
    );

    let mut by_company: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for (company, product) in series.keys() {
        by_company.entry(company).or_default().insert(product);
    }

    let mut grand = KeySeries::default();
    for (company, products) in by_company {
        let mut subtotal = KeySeries::default();
        let ordered = ordered_keys(products.into_iter().map(str::to_string), product_order);
        for product in ordered {
            let Some(s) = series.get(&(company.to_string(), product.clone())) else {
                continue;
            };
            subtotal.merge(s);
            table.push_row(
                vec![company.to_string(), product],
                period_values(s, &periods),
                RowStyle::Normal,
            );
        }
        grand.merge(&subtotal);
        table.push_row(
            vec![company.to_string(), TOTAL_LABEL.to_string()],
            period_values(&subtotal, &periods),
            RowStyle::Subtotal,
        );
    }
    table.push_row(
        vec![TOTAL_LABEL.to_string(), String::new()],
        period_values(&grand, &periods),
        RowStyle::Total,
    );
    table
}

pub fn growth_report(
    src: SalesSources<'_>,
    cfg: &ReportConfig,
    fy: FiscalYear,
    month: FiscalMonth,
) -> Report {
    let label = fy.month_label(month);
    let tables = Measure::BOTH
        .iter()
        .map(|&measure| {
            let unit = match measure {
                Measure::Quantity => "Qty".to_string(),
                Measure::Value => format!("Value in {}", cfg.value_unit),
            };
            let title = format!("Product Growth ({}) - {}", unit, label);
            growth_table(src, fy, month, measure, &cfg.product_order, &title)
        })
        .collect();
    Report {
        name: "Product Growth".to_string(),
        file_stem: format!("product_growth_{}", label),
        tables,
    }
}
