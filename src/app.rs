// Run orchestration shared by the subcommands and the interactive menu:
// lazy input loading, fiscal year / month resolution, and writing each
// report's workbook, CSV copies, preview and the run summary.
use crate::config::{check_fiscal_year, ReportConfig};
use crate::error::{ReportError, Result};
use crate::fiscal::{parse_month, FiscalMonth, FiscalYear, MonthRef};
use crate::loader;
use crate::output;
use crate::reports::analysis::{analysis_report, AnalysisKind, SalesSources};
use crate::reports::budget::budget_vs_billed_report;
use crate::reports::growth::growth_report;
use crate::reports::nbc::nbc_report;
use crate::reports::outstanding::{collection_report, CollectionWindow};
use crate::reports::{Report, ReportTable};
use crate::types::{BudgetRecord, LoadReport, OutputSummary, RunSummary, SaleRecord};
use crate::util::format_int;
use log::{info, warn};
use std::path::PathBuf;

pub const SUMMARY_FILE: &str = "summary.json";
const PREVIEW_ROWS: usize = 5;
const PREVIEW_COLS: usize = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    BudgetVsBilled,
    OdCollection,
    ProductGrowth,
    RegionAnalysis,
    ProductAnalysis,
    TerritoryAnalysis,
    Nbc,
}

impl ReportKind {
    pub const ALL: [ReportKind; 7] = [
        ReportKind::BudgetVsBilled,
        ReportKind::OdCollection,
        ReportKind::ProductGrowth,
        ReportKind::RegionAnalysis,
        ReportKind::ProductAnalysis,
        ReportKind::TerritoryAnalysis,
        ReportKind::Nbc,
    ];

    pub fn title(self) -> &'static str {
        match self {
            ReportKind::BudgetVsBilled => "Budget vs Billed",
            ReportKind::OdCollection => "OD Target vs Collection",
            ReportKind::ProductGrowth => "Product Growth",
            ReportKind::RegionAnalysis => "Region-wise Analysis",
            ReportKind::ProductAnalysis => "Product-wise Analysis",
            ReportKind::TerritoryAnalysis => "TS-PW Analysis",
            ReportKind::Nbc => "Number of Billed Customers",
        }
    }
}

/// Input file locations as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct InputPaths {
    pub sales: Option<PathBuf>,
    pub ly_sales: Option<PathBuf>,
    pub budget: Option<PathBuf>,
    pub opening_os: Option<PathBuf>,
    pub closing_os: Option<PathBuf>,
}

impl InputPaths {
    pub fn is_empty(&self) -> bool {
        self.sales.is_none()
            && self.ly_sales.is_none()
            && self.budget.is_none()
            && self.opening_os.is_none()
            && self.closing_os.is_none()
    }
}

/// One run: configuration, inputs loaded on first use, and what was written.
pub struct Session {
    cfg: ReportConfig,
    inputs: InputPaths,
    month: Option<String>,
    fiscal_year: Option<i32>,
    write_csv: bool,
    sales: Option<Vec<SaleRecord>>,
    ly_sales: Option<Vec<SaleRecord>>,
    budget: Option<(FiscalYear, Vec<BudgetRecord>)>,
    summary: RunSummary,
}

impl Session {
    pub fn new(
        cfg: ReportConfig,
        inputs: InputPaths,
        month: Option<String>,
        fiscal_year: Option<i32>,
        write_csv: bool,
    ) -> Self {
        Session {
            cfg,
            inputs,
            month,
            fiscal_year,
            write_csv,
            sales: None,
            ly_sales: None,
            budget: None,
            summary: RunSummary::default(),
        }
    }

    fn record_input(&mut self, what: &str, report: LoadReport) {
        info!(
            "{}: {} rows read from '{}' ({}), {} loaded, {} skipped",
            what,
            format_int(report.total_rows as i64),
            report.file,
            report.sheet,
            format_int(report.loaded_rows as i64),
            format_int(report.skipped_rows as i64)
        );
        if report.skipped_rows > 0 {
            warn!(
                "{}: {} rows skipped (blank, totals or unparseable)",
                what,
                format_int(report.skipped_rows as i64)
            );
        }
        self.summary.inputs.push(report);
    }

    fn ensure_sales(&mut self) -> Result<()> {
        if self.sales.is_some() {
            return Ok(());
        }
        let path = self
            .inputs
            .sales
            .clone()
            .ok_or_else(|| ReportError::MissingInput("sales register (--sales)".to_string()))?;
        let (records, report) = loader::load_sales(&path, &self.cfg)?;
        self.record_input("sales", report);
        self.sales = Some(records);
        Ok(())
    }

    /// LY sales are optional; without them LY and growth columns stay zero.
    fn ensure_ly_sales(&mut self) -> Result<()> {
        if self.ly_sales.is_some() {
            return Ok(());
        }
        let records = match self.inputs.ly_sales.clone() {
            Some(path) => {
                let (records, report) = loader::load_sales(&path, &self.cfg)?;
                self.record_input("last-year sales", report);
                records
            }
            None => {
                warn!("no last-year sales given (--ly-sales); LY columns will be zero");
                Vec::new()
            }
        };
        self.ly_sales = Some(records);
        Ok(())
    }

    fn ensure_budget(&mut self, fy: FiscalYear, required: bool) -> Result<()> {
        if required && self.inputs.budget.is_none() {
            return Err(ReportError::MissingInput("budget (--budget)".to_string()));
        }
        if matches!(&self.budget, Some((loaded, _)) if *loaded == fy) {
            return Ok(());
        }
        let records = match self.inputs.budget.clone() {
            Some(path) => {
                let (records, report) = loader::load_budget(&path, &self.cfg, fy)?;
                self.record_input("budget", report);
                records
            }
            None => {
                warn!("no budget given (--budget); budget columns will be zero");
                Vec::new()
            }
        };
        self.budget = Some((fy, records));
        Ok(())
    }

    /// Load every input that was given, so problems surface before any
    /// report is generated.
    pub fn load_all(&mut self) -> Result<()> {
        if self.inputs.sales.is_some() {
            self.ensure_sales()?;
        }
        if self.inputs.ly_sales.is_some() {
            self.ensure_ly_sales()?;
        }
        if self.inputs.budget.is_some() {
            let fy = self.fiscal_year()?;
            self.ensure_budget(fy, true)?;
        }
        Ok(())
    }

    fn month_ref(&self) -> Result<Option<MonthRef>> {
        self.month.as_deref().map(parse_month).transpose()
    }

    fn latest_sale(&mut self) -> Result<Option<chrono::NaiveDate>> {
        if self.inputs.sales.is_none() {
            return Ok(None);
        }
        self.ensure_sales()?;
        Ok(self
            .sales
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|r| r.date)
            .max())
    }

    /// Command line, then config, then the year of `--month`, then the
    /// latest sale, then today.
    pub fn fiscal_year(&mut self) -> Result<FiscalYear> {
        if let Some(year) = self.fiscal_year.or(self.cfg.fiscal_year) {
            check_fiscal_year(year)?;
            return Ok(FiscalYear::new(year));
        }
        if let Some(MonthRef {
            month,
            year: Some(year),
        }) = self.month_ref()?
        {
            if let Some(date) = chrono::NaiveDate::from_ymd_opt(year, month.calendar_month(), 1) {
                return Ok(FiscalYear::containing(date));
            }
        }
        if let Some(date) = self.latest_sale()? {
            return Ok(FiscalYear::containing(date));
        }
        Ok(FiscalYear::containing(chrono::Local::now().date_naive()))
    }

    /// `--month` when given, else the month of the latest sale in `fy`.
    pub fn report_month(&mut self, fy: FiscalYear) -> Result<FiscalMonth> {
        if let Some(m) = self.month_ref()? {
            if m.fiscal_year(fy) != fy {
                warn!(
                    "month '{}' lies outside {}; using {}",
                    self.month.as_deref().unwrap_or_default(),
                    fy,
                    fy.month_label(m.month)
                );
            }
            return Ok(m.month);
        }
        self.ensure_sales()?;
        let latest = self
            .sales
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter(|r| fy.contains(r.date))
            .map(|r| r.date)
            .max();
        match latest {
            Some(date) => {
                let month = FiscalMonth::from_date(date);
                info!("no --month given; using latest sales month {}", fy.month_label(month));
                Ok(month)
            }
            None => Err(ReportError::MissingInput(format!(
                "report month (--month); no sales dated in {}",
                fy
            ))),
        }
    }

    fn build(&mut self, kind: ReportKind) -> Result<Report> {
        let fy = self.fiscal_year()?;
        self.summary.fiscal_year = fy.label();
        match kind {
            ReportKind::BudgetVsBilled => {
                let month = self.report_month(fy)?;
                self.summary.month = Some(fy.month_label(month));
                self.ensure_sales()?;
                self.ensure_budget(fy, true)?;
                Ok(budget_vs_billed_report(
                    self.sales.as_deref().unwrap_or_default(),
                    self.budget_records(),
                    fy,
                    month,
                ))
            }
            ReportKind::OdCollection => {
                let month = self.report_month(fy)?;
                let label = fy.month_label(month);
                self.summary.month = Some(label.clone());
                let (Some(start), Some(end)) = (fy.first_day(month), fy.last_day(month)) else {
                    return Err(ReportError::InvalidMonth(label));
                };
                let opening_path = self.inputs.opening_os.clone().ok_or_else(|| {
                    ReportError::MissingInput("opening outstanding (--opening-os)".to_string())
                })?;
                let closing_path = self.inputs.closing_os.clone().ok_or_else(|| {
                    ReportError::MissingInput("closing outstanding (--closing-os)".to_string())
                })?;
                let (opening, report) = loader::load_outstanding(&opening_path, &self.cfg, start)?;
                self.record_input("opening outstanding", report);
                let (closing, report) = loader::load_outstanding(&closing_path, &self.cfg, end)?;
                self.record_input("closing outstanding", report);
                let window = CollectionWindow {
                    month_start: start,
                    month_end: end,
                };
                Ok(collection_report(
                    &opening,
                    &closing,
                    &window,
                    &self.cfg.value_unit,
                    &label,
                ))
            }
            ReportKind::ProductGrowth => {
                let month = self.report_month(fy)?;
                self.summary.month = Some(fy.month_label(month));
                self.ensure_comparison_inputs(fy)?;
                Ok(growth_report(self.sources(), &self.cfg, fy, month))
            }
            ReportKind::RegionAnalysis => {
                self.ensure_comparison_inputs(fy)?;
                analysis_report(AnalysisKind::RegionWise, self.sources(), &self.cfg, fy)
            }
            ReportKind::ProductAnalysis => {
                self.ensure_comparison_inputs(fy)?;
                analysis_report(AnalysisKind::ProductWise, self.sources(), &self.cfg, fy)
            }
            ReportKind::TerritoryAnalysis => {
                self.ensure_comparison_inputs(fy)?;
                analysis_report(
                    AnalysisKind::TerritoryProductWise,
                    self.sources(),
                    &self.cfg,
                    fy,
                )
            }
            ReportKind::Nbc => {
                self.ensure_sales()?;
                Ok(nbc_report(self.sales.as_deref().unwrap_or_default(), fy))
            }
        }
    }

    fn ensure_comparison_inputs(&mut self, fy: FiscalYear) -> Result<()> {
        self.ensure_sales()?;
        self.ensure_ly_sales()?;
        self.ensure_budget(fy, false)
    }

    fn budget_records(&self) -> &[BudgetRecord] {
        self.budget
            .as_ref()
            .map(|(_, records)| records.as_slice())
            .unwrap_or_default()
    }

    fn sources(&self) -> SalesSources<'_> {
        SalesSources {
            sales: self.sales.as_deref().unwrap_or_default(),
            ly_sales: self.ly_sales.as_deref().unwrap_or_default(),
            budget: self.budget_records(),
        }
    }

    /// Build one report, write its workbook (and CSV copies) and preview it.
    pub fn run(&mut self, kind: ReportKind) -> Result<PathBuf> {
        let report = self.build(kind)?;
        let dir = self.cfg.output_dir.clone();
        std::fs::create_dir_all(&dir)?;

        let path = dir.join(format!("{}.xlsx", report.file_stem));
        let sheets = output::write_workbook(&path, &report.tables)?;
        if self.write_csv {
            for (table, sheet) in report.tables.iter().zip(&sheets) {
                let csv_path = dir.join(format!("{}_{}.csv", report.file_stem, csv_suffix(sheet)));
                output::write_csv_table(&csv_path, table)?;
            }
        }

        println!("{}\n", report.name);
        for table in &report.tables {
            output::preview_table(table, PREVIEW_ROWS, PREVIEW_COLS);
        }
        println!("(Full report exported to {})\n", path.display());

        let rows: usize = report.tables.iter().map(ReportTable::body_len).sum();
        info!(
            "{}: {} sheets, {} rows written to {}",
            report.name,
            sheets.len(),
            format_int(rows as i64),
            path.display()
        );
        self.summary.outputs.push(OutputSummary {
            report: report.name,
            file: path.display().to_string(),
            sheets,
            rows,
        });
        Ok(path)
    }

    /// Every report whose inputs were given. Reports that cannot be built
    /// are logged and skipped; the first error is returned when nothing was
    /// written at all.
    pub fn run_all(&mut self) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        let mut first_err = None;
        for kind in ReportKind::ALL {
            if !self.has_inputs_for(kind) {
                warn!("skipping {}: required inputs not given", kind.title());
                continue;
            }
            match self.run(kind) {
                Ok(path) => written.push(path),
                Err(e) => {
                    warn!("skipping {}: {}", kind.title(), e);
                    first_err.get_or_insert(e);
                }
            }
        }
        match (written.is_empty(), first_err) {
            (true, Some(e)) => Err(e),
            (true, None) => Err(ReportError::MissingInput(
                "no report could be generated from the given inputs".to_string(),
            )),
            _ => Ok(written),
        }
    }

    fn has_inputs_for(&self, kind: ReportKind) -> bool {
        let i = &self.inputs;
        match kind {
            ReportKind::BudgetVsBilled => i.sales.is_some() && i.budget.is_some(),
            ReportKind::OdCollection => {
                i.opening_os.is_some() && i.closing_os.is_some() && (self.month.is_some() || i.sales.is_some())
            }
            ReportKind::TerritoryAnalysis => {
                i.sales.is_some() && !self.cfg.territory_regions.is_empty()
            }
            _ => i.sales.is_some(),
        }
    }

    pub fn write_summary(&self) -> Result<PathBuf> {
        let dir = &self.cfg.output_dir;
        std::fs::create_dir_all(dir)?;
        let path = dir.join(SUMMARY_FILE);
        output::write_json(&path, &self.summary)?;
        Ok(path)
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }
}

fn csv_suffix(sheet: &str) -> String {
    sheet
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn session(dir: &std::path::Path, month: Option<&str>) -> Session {
        let sales = dir.join("sales.csv");
        fs::write(
            &sales,
            "Date,Branch,Region,Customer,Executive,Product,Company Group,Qty,Value\n\
             2025-04-10,CHN,SOUTH,ACME,RAVI,TMT,JSW,10,200000\n\
             2025-05-03,CHN,SOUTH,BETA,RAVI,TMT,JSW,5,100000\n",
        )
        .expect("write sales");
        let mut cfg = ReportConfig::default();
        cfg.output_dir = dir.join("out");
        let inputs = InputPaths {
            sales: Some(sales),
            ..InputPaths::default()
        };
        Session::new(cfg, inputs, month.map(str::to_string), None, false)
    }

    #[test]
    fn fiscal_year_and_month_follow_latest_sale() {
        let dir = tempdir().expect("tempdir");
        let mut s = session(dir.path(), None);
        let fy = s.fiscal_year().expect("fy");
        assert_eq!(fy, FiscalYear::new(2025));
        let month = s.report_month(fy).expect("month");
        assert_eq!(fy.month_label(month), "May-25");
    }

    #[test]
    fn month_flag_sets_fiscal_year() {
        let dir = tempdir().expect("tempdir");
        let mut s = session(dir.path(), Some("Feb-25"));
        assert_eq!(s.fiscal_year().expect("fy"), FiscalYear::new(2024));
    }

    #[test]
    fn run_all_skips_reports_without_inputs() {
        let dir = tempdir().expect("tempdir");
        let mut s = session(dir.path(), None);
        let written = s.run_all().expect("run all");
        let names: Vec<String> = written
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        assert!(names.contains(&"nbc_25-26.xlsx".to_string()));
        assert!(names.contains(&"region_wise_analysis_25-26.xlsx".to_string()));
        assert!(!names.iter().any(|n| n.starts_with("budget_vs_billed")));
        assert!(!names.iter().any(|n| n.starts_with("ts_product_wise")));
        let summary = s.write_summary().expect("summary");
        assert!(summary.exists());
        assert_eq!(s.summary().fiscal_year, "25-26");
    }

    #[test]
    fn budget_vs_billed_needs_budget() {
        let dir = tempdir().expect("tempdir");
        let mut s = session(dir.path(), Some("Apr-25"));
        let err = s.run(ReportKind::BudgetVsBilled).unwrap_err();
        assert!(matches!(err, ReportError::MissingInput(_)));
    }

    #[test]
    fn budget_stays_required_after_optional_use() {
        let dir = tempdir().expect("tempdir");
        let mut s = session(dir.path(), Some("Apr-25"));
        s.run(ReportKind::ProductGrowth).expect("growth without budget");
        let err = s.run(ReportKind::BudgetVsBilled).unwrap_err();
        assert!(matches!(err, ReportError::MissingInput(_)));
    }

    #[test]
    fn fiscal_year_flag_is_range_checked() {
        let dir = tempdir().expect("tempdir");
        let mut s = session(dir.path(), None);
        s.fiscal_year = Some(i32::MAX);
        assert!(matches!(s.fiscal_year(), Err(ReportError::Config(_))));
        s.fiscal_year = Some(2025);
        assert_eq!(s.fiscal_year().expect("fy"), FiscalYear::new(2025));
    }
}
