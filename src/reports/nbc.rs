// Number of billed customers (NBC).
//
// A customer counts for a month when its net billing in that month is
// positive; the YTD column and the TOTAL row count distinct customers, so a
// customer billed in several months or branches is counted once.
use super::{Column, ColumnKind, Report, ReportTable, RowStyle, TOTAL_LABEL};
use crate::fiscal::{FiscalMonth, FiscalYear, Period};
use crate::types::SaleRecord;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NbcGroup {
    Branch,
    Executive,
}

impl NbcGroup {
    fn label(self) -> &'static str {
        match self {
            NbcGroup::Branch => "Branch",
            NbcGroup::Executive => "Executive",
        }
    }

    fn key(self, r: &SaleRecord) -> &str {
        match self {
            NbcGroup::Branch => &r.branch,
            NbcGroup::Executive => &r.executive,
        }
    }
}

type Billed<'a> = BTreeMap<&'a str, [BTreeSet<&'a str>; 12]>;

/// Customers with positive net billing per group key and month.
fn billed_customers(sales: &[SaleRecord], fy: FiscalYear, group: NbcGroup) -> Billed<'_> {
    let mut net: BTreeMap<(&str, usize, &str), (f64, f64)> = BTreeMap::new();
    for r in sales.iter().filter(|r| fy.contains(r.date)) {
        let e = net
            .entry((group.key(r), FiscalMonth::from_date(r.date).index(), r.customer.as_str()))
            .or_default();
        e.0 += r.quantity;
        e.1 += r.value;
    }

    let mut billed: Billed<'_> = BTreeMap::new();
    for ((key, month, customer), (qty, value)) in net {
        let months = billed.entry(key).or_default();
        if qty > 0.0 || value > 0.0 {
            months[month].insert(customer);
        }
    }
    billed
}

fn counts(months: &[BTreeSet<&str>; 12]) -> Vec<f64> {
    let mut out: Vec<f64> = months.iter().map(|m| m.len() as f64).collect();
    let ytd: BTreeSet<&str> = months.iter().flatten().copied().collect();
    out.push(ytd.len() as f64);
    out
}

pub fn nbc_table(sales: &[SaleRecord], fy: FiscalYear, group: NbcGroup) -> ReportTable {
    let billed = billed_customers(sales, fy, group);

    let mut columns = vec![Column::new(group.label(), ColumnKind::Text)];
    columns.extend(FiscalMonth::all().map(|m| Column::new(fy.month_label(m), ColumnKind::Count)));
    columns.push(Column::new(fy.period_label(&Period::full_year()), ColumnKind::Count));

    let mut table = ReportTable::new(
        format!("Number of Billed Customers ({}-wise) - {}", group.label(), fy),
        format!("NBC {}", group.label()),
        columns,
    );

    let mut overall: [BTreeSet<&str>; 12] = Default::default();
    for (key, months) in &billed {
        for (all, m) in overall.iter_mut().zip(months.iter()) {
            all.extend(m.iter().copied());
        }
        table.push_row(vec![key.to_string()], counts(months), RowStyle::Normal);
    }
    table.push_row(vec![TOTAL_LABEL.to_string()], counts(&overall), RowStyle::Total);
    table
}

pub fn nbc_report(sales: &[SaleRecord], fy: FiscalYear) -> Report {
    let tables = [NbcGroup::Branch, NbcGroup::Executive]
        .into_iter()
        .map(|g| nbc_table(sales, fy, g))
        .collect();
    Report {
        name: "Number of Billed Customers".to_string(),
        file_stem: format!("nbc_{}", fy.label()),
        tables,
    }
}
