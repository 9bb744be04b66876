// Budget vs billed for one month.
//
// Billing counts against a budget line only up to that line's budget. The
// overall columns show everything billed in the month, budgeted or not.
use super::{Column, ColumnKind, Report, ReportTable, RowStyle, TOTAL_LABEL};
use crate::fiscal::{FiscalMonth, FiscalYear};
use crate::types::{BudgetRecord, SaleRecord};
use crate::util::safe_pct;
use std::collections::BTreeMap;

type LineKey = (String, String, String);

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Amounts {
    quantity: f64,
    value: f64,
}

impl Amounts {
    fn add(&mut self, quantity: f64, value: f64) {
        self.quantity += quantity;
        self.value += value;
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct BranchFigures {
    budget: Amounts,
    billed: Amounts,
    overall: Amounts,
}

impl BranchFigures {
    fn merge(&mut self, other: &BranchFigures) {
        self.budget.add(other.budget.quantity, other.budget.value);
        self.billed.add(other.billed.quantity, other.billed.value);
        self.overall.add(other.overall.quantity, other.overall.value);
    }

    fn values(&self) -> Vec<f64> {
        vec![
            self.budget.quantity,
            self.billed.quantity,
            safe_pct(self.billed.quantity, self.budget.quantity),
            self.budget.value,
            self.billed.value,
            safe_pct(self.billed.value, self.budget.value),
            self.overall.quantity,
            self.overall.value,
        ]
    }
}

/// Grouping of the budget-vs-billed rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingGroup {
    Branch,
    Executive,
}

impl BillingGroup {
    fn label(self) -> &'static str {
        match self {
            BillingGroup::Branch => "Branch",
            BillingGroup::Executive => "Executive",
        }
    }

    fn of_sale(self, r: &SaleRecord) -> &str {
        match self {
            BillingGroup::Branch => &r.branch,
            BillingGroup::Executive => &r.executive,
        }
    }

    fn of_budget(self, r: &BudgetRecord) -> &str {
        match self {
            BillingGroup::Branch => &r.branch,
            BillingGroup::Executive => &r.executive,
        }
    }
}

fn in_month(r: &SaleRecord, fy: FiscalYear, month: FiscalMonth) -> bool {
    fy.contains(r.date) && FiscalMonth::from_date(r.date) == month
}

pub fn budget_vs_billed_table(
    sales: &[SaleRecord],
    budget: &[BudgetRecord],
    fy: FiscalYear,
    month: FiscalMonth,
    group: BillingGroup,
) -> ReportTable {
    // Budget lines keyed by (group, customer, product).
    let mut lines: BTreeMap<LineKey, Amounts> = BTreeMap::new();
    for r in budget.iter().filter(|r| r.month.map_or(true, |m| m == month)) {
        lines
            .entry((
                group.of_budget(r).to_string(),
                r.customer.clone(),
                r.product.clone(),
            ))
            .or_default()
            .add(r.quantity, r.value);
    }

    let mut actual: BTreeMap<LineKey, Amounts> = BTreeMap::new();
    let mut figures: BTreeMap<String, BranchFigures> = BTreeMap::new();
    for r in sales.iter().filter(|r| in_month(r, fy, month)) {
        let key = group.of_sale(r).to_string();
        actual
            .entry((key.clone(), r.customer.clone(), r.product.clone()))
            .or_default()
            .add(r.quantity, r.value);
        figures
            .entry(key)
            .or_default()
            .overall
            .add(r.quantity, r.value);
    }

    for (key, planned) in &lines {
        let sold = actual.get(key).copied().unwrap_or_default();
        let f = figures.entry(key.0.clone()).or_default();
        f.budget.add(planned.quantity, planned.value);
        f.billed.add(
            sold.quantity.min(planned.quantity).max(0.0),
            sold.value.min(planned.value).max(0.0),
        );
    }

    let label = fy.month_label(month);
    let mut table = ReportTable::new(
        format!("Budget vs Billed ({}-wise) - {}", group.label(), label),
        format!("{} {}", group.label(), label),
        vec![
            Column::new(group.label(), ColumnKind::Text),
            Column::new("Budget Qty", ColumnKind::Amount),
            Column::new("Billed Qty", ColumnKind::Amount),
            Column::new("Qty Ach %", ColumnKind::Percent),
            Column::new("Budget Value", ColumnKind::Amount),
            Column::new("Billed Value", ColumnKind::Amount),
            Column::new("Value Ach %", ColumnKind::Percent),
            Column::new("Overall Billed Qty", ColumnKind::Amount),
            Column::new("Overall Billed Value", ColumnKind::Amount),
        ],
    );

    let mut total = BranchFigures::default();
    for (key, f) in &figures {
        total.merge(f);
        table.push_row(vec![key.clone()], f.values(), RowStyle::Normal);
    }
    table.push_row(vec![TOTAL_LABEL.to_string()], total.values(), RowStyle::Total);
    table
}

pub fn budget_vs_billed_report(
    sales: &[SaleRecord],
    budget: &[BudgetRecord],
    fy: FiscalYear,
    month: FiscalMonth,
) -> Report {
    let tables = [BillingGroup::Branch, BillingGroup::Executive]
        .into_iter()
        .map(|g| budget_vs_billed_table(sales, budget, fy, month, g))
        .collect();
    Report {
        name: "Budget vs Billed".to_string(),
        file_stem: format!("budget_vs_billed_{}", fy.month_label(month)),
        tables,
    }
}
