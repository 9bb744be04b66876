// OD target vs collection.
//
// The opening ledger (as of the first day of the month) sets the targets;
// whatever of those dues is no longer outstanding in the closing ledger (as
// of the last day) counts as collected.
use super::{Column, ColumnKind, Report, ReportTable, RowStyle, TOTAL_LABEL};
use crate::types::OutstandingRecord;
use crate::util::safe_pct;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// The window a ledger is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionWindow {
    pub month_start: NaiveDate,
    pub month_end: NaiveDate,
}

impl CollectionWindow {
    /// Due by month end. Entries without a due date count as due.
    fn is_due(&self, r: &OutstandingRecord) -> bool {
        r.due_date.map_or(true, |d| d <= self.month_end)
    }

    /// Already overdue when the month opened.
    fn is_overdue(&self, r: &OutstandingRecord) -> bool {
        r.due_date.map_or(true, |d| d < self.month_start)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Buckets {
    total: f64,
    due: f64,
    overdue: f64,
}

impl Buckets {
    fn add(&mut self, window: &CollectionWindow, r: &OutstandingRecord) {
        self.total += r.amount;
        if window.is_due(r) {
            self.due += r.amount;
        }
        if window.is_overdue(r) {
            self.overdue += r.amount;
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct CollectionFigures {
    due_target: f64,
    due_collection: f64,
    od_target: f64,
    od_collection: f64,
    opening: f64,
    closing: f64,
}

impl CollectionFigures {
    fn from_buckets(opening: &Buckets, closing: &Buckets) -> Self {
        CollectionFigures {
            due_target: opening.due,
            due_collection: (opening.due - closing.due).max(0.0),
            od_target: opening.overdue,
            od_collection: (opening.overdue - closing.overdue).max(0.0),
            opening: opening.total,
            closing: closing.total,
        }
    }

    fn merge(&mut self, o: &CollectionFigures) {
        self.due_target += o.due_target;
        self.due_collection += o.due_collection;
        self.od_target += o.od_target;
        self.od_collection += o.od_collection;
        self.opening += o.opening;
        self.closing += o.closing;
    }

    fn values(&self) -> Vec<f64> {
        vec![
            self.due_target,
            self.due_collection,
            safe_pct(self.due_collection, self.due_target),
            self.od_target,
            self.od_collection,
            safe_pct(self.od_collection, self.od_target),
            self.opening,
            self.closing,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionGroup {
    Branch,
    Executive,
}

impl CollectionGroup {
    fn label(self) -> &'static str {
        match self {
            CollectionGroup::Branch => "Branch",
            CollectionGroup::Executive => "Executive",
        }
    }

    fn key(self, r: &OutstandingRecord) -> &str {
        match self {
            CollectionGroup::Branch => &r.branch,
            CollectionGroup::Executive => &r.executive,
        }
    }
}

fn bucket_by(
    records: &[OutstandingRecord],
    window: &CollectionWindow,
    group: CollectionGroup,
) -> BTreeMap<String, Buckets> {
    let mut map: BTreeMap<String, Buckets> = BTreeMap::new();
    for r in records {
        map.entry(group.key(r).to_string())
            .or_default()
            .add(window, r);
    }
    map
}

pub fn collection_table(
    opening: &[OutstandingRecord],
    closing: &[OutstandingRecord],
    window: &CollectionWindow,
    group: CollectionGroup,
    unit: &str,
    month_label: &str,
) -> ReportTable {
    let open = bucket_by(opening, window, group);
    let close = bucket_by(closing, window, group);

    let mut table = ReportTable::new(
        format!(
            "OD Target vs Collection ({}-wise) - {} (in {})",
            group.label(),
            month_label,
            unit
        ),
        format!("{} {}", group.label(), month_label),
        vec![
            Column::new(group.label(), ColumnKind::Text),
            Column::new("Due Target", ColumnKind::Amount),
            Column::new("Due Collection", ColumnKind::Amount),
            Column::new("Due Ach %", ColumnKind::Percent),
            Column::new("OD Target", ColumnKind::Amount),
            Column::new("OD Collection", ColumnKind::Amount),
            Column::new("OD Ach %", ColumnKind::Percent),
            Column::new("Opening OS", ColumnKind::Amount),
            Column::new("Closing OS", ColumnKind::Amount),
        ],
    );

    let mut keys: Vec<&String> = open.keys().chain(close.keys()).collect();
    keys.sort();
    keys.dedup();

    let mut total = CollectionFigures::default();
    for key in keys {
        let o = open.get(key).copied().unwrap_or_default();
        let c = close.get(key).copied().unwrap_or_default();
        let f = CollectionFigures::from_buckets(&o, &c);
        total.merge(&f);
        table.push_row(vec![key.clone()], f.values(), RowStyle::Normal);
    }
    table.push_row(vec![TOTAL_LABEL.to_string()], total.values(), RowStyle::Total);
    table
}

pub fn collection_report(
    opening: &[OutstandingRecord],
    closing: &[OutstandingRecord],
    window: &CollectionWindow,
    unit: &str,
    month_label: &str,
) -> Report {
    let tables = [CollectionGroup::Branch, CollectionGroup::Executive]
        .into_iter()
        .map(|g| collection_table(opening, closing, window, g, unit, month_label))
        .collect();
    Report {
        name: "OD Target vs Collection".to_string(),
        file_stem: format!("od_target_vs_collection_{}", month_label),
        tables,
    }
}
