use crate::columns::{header_texts, locate_header_row, month_columns, ColumnResolver, MonthColumn};
use crate::config::ReportConfig;
use crate::error::{ReportError, Result};
use crate::fiscal::FiscalYear;
use crate::types::{BudgetRecord, Cell, LoadReport, Measure, OutstandingRecord, RawSheet, SaleRecord};
use crate::util::{excel_serial_to_date, normalize_key, parse_date_safe, parse_f64_safe, UNMAPPED};
use calamine::{open_workbook_auto, Data, Reader};
use chrono::{NaiveDate, TimeDelta};
use csv::ReaderBuilder;
use std::path::Path;

/// Read the first sheet holding data (or `sheet` when named) from an Excel
/// workbook, or the whole file for CSV input.
pub fn read_sheet(path: &Path, sheet: Option<&str>) -> Result<RawSheet> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" => read_csv(path),
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => read_workbook(path, sheet),
        _ => Err(ReportError::UnsupportedFile(path.display().to_string())),
    }
}

fn read_csv(path: &Path) -> Result<RawSheet> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|s| {
                    if s.trim().is_empty() {
                        Cell::Empty
                    } else {
                        Cell::Text(s.to_string())
                    }
                })
                .collect(),
        );
    }
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    Ok(RawSheet { name, rows })
}

fn read_workbook(path: &Path, sheet: Option<&str>) -> Result<RawSheet> {
    let mut workbook = open_workbook_auto(path)?;
    let names: Vec<String> = match sheet {
        Some(name) => vec![name.to_string()],
        None => workbook.sheet_names().to_vec(),
    };
    for name in names {
        let range = workbook.worksheet_range(&name)?;
        if range.is_empty() {
            log::debug!("{}: sheet '{}' is empty", path.display(), name);
            continue;
        }
        let rows = range
            .rows()
            .map(|row| row.iter().map(convert_cell).collect())
            .collect();
        return Ok(RawSheet { name, rows });
    }
    Err(ReportError::EmptyWorkbook(path.display().to_string()))
}

fn convert_cell(cell: &Data) -> Cell {
    match cell {
        Data::Empty => Cell::Empty,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => {
            if s.trim().is_empty() {
                Cell::Empty
            } else {
                Cell::Text(s.clone())
            }
        }
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(dt) => match excel_serial_to_date(dt.as_f64()) {
            Some(d) => Cell::Date(d),
            None => Cell::Number(dt.as_f64()),
        },
        Data::Error(_) => Cell::Empty,
    }
}

fn cell_at(row: &[Cell], idx: Option<usize>) -> Option<&Cell> {
    idx.and_then(|i| row.get(i))
}

fn cell_text(row: &[Cell], idx: Option<usize>) -> String {
    cell_at(row, idx).map(Cell::as_text).unwrap_or_default()
}

fn cell_key(row: &[Cell], idx: Option<usize>) -> String {
    normalize_key(&cell_text(row, idx))
}

fn cell_number(row: &[Cell], idx: Option<usize>) -> Option<f64> {
    match cell_at(row, idx)? {
        Cell::Number(n) => Some(*n),
        Cell::Text(s) => parse_f64_safe(Some(s)),
        _ => None,
    }
}

fn cell_date(row: &[Cell], idx: Option<usize>) -> Option<NaiveDate> {
    match cell_at(row, idx)? {
        Cell::Date(d) => Some(*d),
        Cell::Number(n) => excel_serial_to_date(*n),
        Cell::Text(s) => parse_date_safe(Some(s)),
        Cell::Empty => None,
    }
}

/// `Some(None)` when the row carries neither a due date nor overdue days;
/// `None` when one is present but does not give a usable date.
fn due_date_of(
    row: &[Cell],
    due_col: Option<usize>,
    days_col: Option<usize>,
    as_of: NaiveDate,
) -> Option<Option<NaiveDate>> {
    if cell_at(row, due_col).is_some_and(|c| !c.is_empty()) {
        return cell_date(row, due_col).map(Some);
    }
    match cell_number(row, days_col) {
        Some(days) => {
            let back = TimeDelta::try_days(days.round() as i64)?;
            as_of.checked_sub_signed(back).map(Some)
        }
        None => Some(None),
    }
}

fn is_total_key(key: &str) -> bool {
    matches!(key, "TOTAL" | "GRAND TOTAL" | "SUB TOTAL" | "SUBTOTAL")
}

fn missing(path: &Path, field: &str, aliases: &[String]) -> ReportError {
    ReportError::MissingColumn {
        file: path.display().to_string(),
        field: field.to_string(),
        aliases: aliases.join(", "),
    }
}

fn fill_region(cfg: &ReportConfig, region: String, branch: &str) -> String {
    if region != UNMAPPED {
        return region;
    }
    cfg.region_for_branch(branch).unwrap_or(UNMAPPED).to_string()
}

fn fill_executive(cfg: &ReportConfig, executive: String, customer: &str) -> String {
    if executive != UNMAPPED {
        return executive;
    }
    cfg.executive_for_customer(customer)
        .unwrap_or(UNMAPPED)
        .to_string()
}

fn new_report(path: &Path, sheet: &RawSheet) -> LoadReport {
    LoadReport {
        file: path.display().to_string(),
        sheet: sheet.name.clone(),
        ..LoadReport::default()
    }
}

/// Sales register: one row per invoice line.
pub fn load_sales(path: &Path, cfg: &ReportConfig) -> Result<(Vec<SaleRecord>, LoadReport)> {
    let sheet = read_sheet(path, None)?;
    let aliases = &cfg.columns;
    let header_idx = locate_header_row(&sheet.rows, &[&aliases.date, &aliases.quantity], cfg.header_scan_rows)
        .or_else(|| locate_header_row(&sheet.rows, &[&aliases.date, &aliases.value], cfg.header_scan_rows))
        .ok_or_else(|| missing(path, "date", &aliases.date))?;

    let mut cols = ColumnResolver::new(header_texts(&sheet.rows[header_idx]));
    let date_col = cols.resolve("date", &aliases.date);
    let qty_col = cols.resolve("quantity", &aliases.quantity);
    let value_col = cols.resolve("value", &aliases.value);
    if qty_col.is_none() && value_col.is_none() {
        return Err(missing(path, "quantity/value", &aliases.quantity));
    }
    let customer_col = cols.resolve("customer", &aliases.customer);
    let executive_col = cols.resolve("executive", &aliases.executive);
    let branch_col = cols.resolve("branch", &aliases.branch);
    let region_col = cols.resolve("region", &aliases.region);
    let product_col = cols.resolve("product", &aliases.product);
    let company_col = cols.resolve("company_group", &aliases.company_group);

    let mut report = new_report(path, &sheet);
    let mut records = Vec::new();
    for row in &sheet.rows[header_idx + 1..] {
        if row.iter().all(Cell::is_empty) {
            continue;
        }
        report.total_rows += 1;

        let Some(date) = cell_date(row, date_col) else {
            report.skipped_rows += 1;
            continue;
        };
        let quantity = cell_number(row, qty_col);
        let value = cell_number(row, value_col);
        if quantity.is_none() && value.is_none() {
            report.skipped_rows += 1;
            continue;
        }

        let branch = cell_key(row, branch_col);
        let customer = cell_key(row, customer_col);
        if is_total_key(&branch) || is_total_key(&customer) {
            report.skipped_rows += 1;
            continue;
        }
        let region = fill_region(cfg, cell_key(row, region_col), &branch);
        let executive = fill_executive(cfg, cell_key(row, executive_col), &customer);

        records.push(SaleRecord {
            date,
            region,
            executive,
            product: cell_key(row, product_col),
            company_group: cell_key(row, company_col),
            quantity: quantity.unwrap_or(0.0),
            value: value.unwrap_or(0.0) / cfg.value_divisor,
            branch,
            customer,
        });
    }
    report.loaded_rows = records.len();
    log::info!(
        "{}: {} sales rows loaded, {} skipped",
        path.display(),
        report.loaded_rows,
        report.skipped_rows
    );
    if report.skipped_rows > 0 {
        log::warn!(
            "{}: {} rows had no usable date or amount",
            path.display(),
            report.skipped_rows
        );
    }
    Ok((records, report))
}

/// Budget sheet, either one column per month (optionally split into quantity
/// and value) or a single month with plain quantity/value columns.
pub fn load_budget(
    path: &Path,
    cfg: &ReportConfig,
    fy: FiscalYear,
) -> Result<(Vec<BudgetRecord>, LoadReport)> {
    let sheet = read_sheet(path, None)?;
    let aliases = &cfg.columns;
    let keys: [(&str, &Vec<String>); 6] = [
        ("branch", &aliases.branch),
        ("region", &aliases.region),
        ("customer", &aliases.customer),
        ("executive", &aliases.executive),
        ("product", &aliases.product),
        ("company_group", &aliases.company_group),
    ];

    let header_idx = sheet
        .rows
        .iter()
        .take(cfg.header_scan_rows)
        .position(|row| {
            let headers = header_texts(row);
            let mut probe = ColumnResolver::new(headers.clone());
            let has_key = keys.iter().any(|(f, a)| probe.resolve(f, a).is_some());
            let has_amount = !month_columns(&headers, fy).is_empty()
                || probe.resolve("quantity", &aliases.quantity).is_some()
                || probe.resolve("value", &aliases.value).is_some();
            has_key && has_amount
        })
        .ok_or_else(|| missing(path, "budget key and amount", &aliases.product))?;

    let headers = header_texts(&sheet.rows[header_idx]);
    let months = month_columns(&headers, fy);
    let mut cols = ColumnResolver::new(headers);
    cols.reserve(months.iter().map(|m| m.index));
    let (qty_col, value_col) = if months.is_empty() {
        (
            cols.resolve("quantity", &aliases.quantity),
            cols.resolve("value", &aliases.value),
        )
    } else {
        (None, None)
    };
    let customer_col = cols.resolve("customer", &aliases.customer);
    let executive_col = cols.resolve("executive", &aliases.executive);
    let branch_col = cols.resolve("branch", &aliases.branch);
    let region_col = cols.resolve("region", &aliases.region);
    let product_col = cols.resolve("product", &aliases.product);
    let company_col = cols.resolve("company_group", &aliases.company_group);

    let mut report = new_report(path, &sheet);
    let mut records = Vec::new();
    for row in &sheet.rows[header_idx + 1..] {
        if row.iter().all(Cell::is_empty) {
            continue;
        }
        report.total_rows += 1;

        let branch = cell_key(row, branch_col);
        let customer = cell_key(row, customer_col);
        let product = cell_key(row, product_col);
        let region = cell_key(row, region_col);
        if [&branch, &customer, &product, &region]
            .iter()
            .any(|k| is_total_key(k))
        {
            report.skipped_rows += 1;
            continue;
        }
        let base = BudgetRecord {
            month: None,
            region: fill_region(cfg, region, &branch),
            executive: fill_executive(cfg, cell_key(row, executive_col), &customer),
            company_group: cell_key(row, company_col),
            branch,
            customer,
            product,
            quantity: 0.0,
            value: 0.0,
        };

        let before = records.len();
        if months.is_empty() {
            let quantity = cell_number(row, qty_col).unwrap_or(0.0);
            let value = cell_number(row, value_col).unwrap_or(0.0) / cfg.value_divisor;
            if quantity != 0.0 || value != 0.0 {
                records.push(BudgetRecord {
                    quantity,
                    value,
                    ..base
                });
            }
        } else {
            push_month_records(&mut records, &base, row, &months, cfg.value_divisor);
        }
        if records.len() == before {
            report.skipped_rows += 1;
        }
    }
    report.loaded_rows = records.len();
    log::info!(
        "{}: {} budget lines loaded ({} month columns)",
        path.display(),
        report.loaded_rows,
        months.len()
    );
    Ok((records, report))
}

fn push_month_records(
    records: &mut Vec<BudgetRecord>,
    base: &BudgetRecord,
    row: &[Cell],
    months: &[MonthColumn],
    value_divisor: f64,
) {
    for mc in months {
        let Some(amount) = cell_number(row, Some(mc.index)) else {
            continue;
        };
        if amount == 0.0 {
            continue;
        }
        let mut rec = BudgetRecord {
            month: Some(mc.month),
            ..base.clone()
        };
        match mc.measure.unwrap_or(Measure::Quantity) {
            Measure::Quantity => rec.quantity = amount,
            Measure::Value => rec.value = amount / value_divisor,
        }
        records.push(rec);
    }
}

/// Outstanding ledger as of `as_of`. The due date comes from a due-date
/// column, else from an overdue-days column counted back from `as_of`; rows
/// with neither are treated as already due.
pub fn load_outstanding(
    path: &Path,
    cfg: &ReportConfig,
    as_of: NaiveDate,
) -> Result<(Vec<OutstandingRecord>, LoadReport)> {
    let sheet = read_sheet(path, None)?;
    let aliases = &cfg.columns;
    let header_idx = locate_header_row(&sheet.rows, &[&aliases.amount], cfg.header_scan_rows)
        .ok_or_else(|| missing(path, "amount", &aliases.amount))?;

    let mut cols = ColumnResolver::new(header_texts(&sheet.rows[header_idx]));
    let due_col = cols.resolve("due_date", &aliases.due_date);
    let days_col = cols.resolve("overdue_days", &aliases.overdue_days);
    let amount_col = cols.resolve("amount", &aliases.amount);
    let customer_col = cols.resolve("customer", &aliases.customer);
    let executive_col = cols.resolve("executive", &aliases.executive);
    let branch_col = cols.resolve("branch", &aliases.branch);
    if due_col.is_none() && days_col.is_none() {
        log::warn!(
            "{}: no due date or overdue days column, all balances treated as due",
            path.display()
        );
    }

    let mut report = new_report(path, &sheet);
    let mut records = Vec::new();
    for row in &sheet.rows[header_idx + 1..] {
        if row.iter().all(Cell::is_empty) {
            continue;
        }
        report.total_rows += 1;

        let branch = cell_key(row, branch_col);
        let customer = cell_key(row, customer_col);
        let Some(amount) = cell_number(row, amount_col) else {
            report.skipped_rows += 1;
            continue;
        };
        if is_total_key(&branch) || is_total_key(&customer) {
            report.skipped_rows += 1;
            continue;
        }
        let Some(due_date) = due_date_of(row, due_col, days_col, as_of) else {
            report.skipped_rows += 1;
            continue;
        };
        records.push(OutstandingRecord {
            executive: fill_executive(cfg, cell_key(row, executive_col), &customer),
            branch,
            customer,
            due_date,
            amount: amount / cfg.value_divisor,
        });
    }
    report.loaded_rows = records.len();
    log::info!(
        "{}: {} outstanding entries loaded as of {}",
        path.display(),
        report.loaded_rows,
        as_of
    );
    Ok((records, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;
    use std::fs;
    use tempfile::tempdir;

    fn cfg() -> ReportConfig {
        let mut cfg = ReportConfig::default();
        cfg.value_divisor = 1.0;
        cfg.branch_regions
            .insert("CHENNAI".to_string(), "SOUTH".to_string());
        cfg
    }

    #[test]
    fn loads_csv_sales_below_title_rows() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("sales.csv");
        fs::write(
            &path,
            "Sales Register,,,,\n\
             ,,,,\n\
             Bill Date,Branch,Customer Name,Product Group,Qty,Value\n\
             01-04-2025,Chennai,Acme Traders,Steel,10,\"1,000\"\n\
             ,,,,,\n\
             2025-05-02,Pune,Beta Corp,Cement,5,500\n\
             not a date,Pune,Beta Corp,Cement,5,500\n\
             ,Total,,,15,1500\n",
        )
        .expect("write csv");

        let (records, report) = load_sales(&path, &cfg()).expect("load sales");
        assert_eq!(records.len(), 2);
        assert_eq!(report.total_rows, 4);
        assert_eq!(report.skipped_rows, 2);
        assert_eq!(records[0].region, "SOUTH");
        assert_eq!(records[0].customer, "ACME TRADERS");
        assert_eq!(records[0].value, 1000.0);
        assert_eq!(records[1].region, UNMAPPED);
        assert_eq!(records[1].product, "CEMENT");
    }

    #[test]
    fn missing_date_column_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("sales.csv");
        fs::write(&path, "Branch,Qty\nChennai,4\n").expect("write csv");
        let err = load_sales(&path, &cfg()).unwrap_err();
        assert!(matches!(err, ReportError::MissingColumn { .. }));
    }

    #[test]
    fn loads_wide_budget_workbook() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("budget.xlsx");
        let mut wb = Workbook::new();
        let ws = wb.add_worksheet();
        let headers = ["Region", "Product", "Apr-25", "May-25", "Apr-24"];
        for (c, h) in headers.iter().enumerate() {
            ws.write_string(0, c as u16, *h).expect("header");
        }
        ws.write_string(1, 0, "South").expect("cell");
        ws.write_string(1, 1, "Steel").expect("cell");
        ws.write_number(1, 2, 100.0).expect("cell");
        ws.write_number(1, 3, 120.0).expect("cell");
        ws.write_number(1, 4, 999.0).expect("cell");
        ws.write_string(2, 0, "Total").expect("cell");
        ws.write_number(2, 2, 100.0).expect("cell");
        wb.save(&path).expect("save budget");

        let (records, report) =
            load_budget(&path, &cfg(), FiscalYear::new(2025)).expect("load budget");
        assert_eq!(records.len(), 2);
        assert_eq!(report.skipped_rows, 1);
        assert!(records.iter().all(|r| r.region == "SOUTH" && r.product == "STEEL"));
        assert_eq!(records[0].month.map(|m| m.calendar_month()), Some(4));
        assert_eq!(records[1].quantity, 120.0);
    }

    #[test]
    fn loads_single_month_budget() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("budget.csv");
        fs::write(
            &path,
            "Branch,Customer Name,Product,Budget Qty,Budget Value\n\
             Chennai,Acme,Steel,10,2000\n",
        )
        .expect("write csv");
        let (records, _) = load_budget(&path, &cfg(), FiscalYear::new(2025)).expect("load");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].month, None);
        assert_eq!(records[0].quantity, 10.0);
        assert_eq!(records[0].value, 2000.0);
    }

    #[test]
    fn outstanding_due_dates_from_overdue_days() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("os.csv");
        fs::write(
            &path,
            "Branch,Party Name,Overdue Days,Net Balance\n\
             Chennai,Acme,10,500\n\
             Chennai,Beta,,250\n",
        )
        .expect("write csv");
        let as_of = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
        let (records, report) = load_outstanding(&path, &cfg(), as_of).expect("load os");
        assert_eq!(report.loaded_rows, 2);
        assert_eq!(records[0].due_date, NaiveDate::from_ymd_opt(2025, 4, 21));
        assert_eq!(records[1].due_date, None);
        assert_eq!(records[1].amount, 250.0);
    }

    #[test]
    fn outstanding_rows_with_unusable_due_dates_are_skipped() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("os.csv");
        fs::write(
            &path,
            "Branch,Party Name,Overdue Days,Net Balance\n\
             Chennai,Acme,200000000000000,500\n\
             Chennai,Beta,5,250\n",
        )
        .expect("write csv");
        let as_of = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
        let (records, report) = load_outstanding(&path, &cfg(), as_of).expect("load os");
        assert_eq!(report.total_rows, 2);
        assert_eq!(report.skipped_rows, 1);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].customer, "BETA");
        assert_eq!(records[0].due_date, NaiveDate::from_ymd_opt(2025, 4, 26));
    }

    #[test]
    fn executive_filled_from_customer_map() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("sales.csv");
        fs::write(
            &path,
            "Date,Branch,Customer Name,Salesman,Qty\n\
             2025-04-01,Chennai,Acme Traders,,10\n\
             2025-04-02,Chennai,Beta Corp,,4\n\
             2025-04-03,Chennai,Acme Traders,Kumar,2\n",
        )
        .expect("write csv");
        let mut cfg = cfg();
        cfg.customer_executives
            .insert("ACME TRADERS".to_string(), "RAVI".to_string());
        let (records, _) = load_sales(&path, &cfg).expect("load sales");
        let executives: Vec<&str> = records.iter().map(|r| r.executive.as_str()).collect();
        assert_eq!(executives, vec!["RAVI", UNMAPPED, "KUMAR"]);
        assert_eq!(records[0].region, "SOUTH");
    }

    #[test]
    fn rejects_unknown_extension() {
        let err = read_sheet(Path::new("ledger.pdf"), None).unwrap_err();
        assert!(matches!(err, ReportError::UnsupportedFile(_)));
    }
}
