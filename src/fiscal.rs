// Fiscal-year model shared by every report.
//
// The company books April to March. Months are indexed 0..12 inside a fiscal
// year (Apr = 0, Mar = 11) so a whole year fits in a fixed array, and every
// analysis sheet uses the same column ordering built by `fiscal_schema`.
use crate::error::{ReportError, Result};
use crate::util::safe_pct;
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::ops::RangeInclusive;

const SHORT_NAMES: [&str; 12] = [
    "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec", "Jan", "Feb", "Mar",
];

const FULL_NAMES: [&str; 12] = [
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
    "january",
    "february",
    "march",
];

/// A month position inside the April-March year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FiscalMonth(u8);

impl FiscalMonth {
    /// Calendar month (1 = January) to fiscal position.
    pub fn from_calendar(month: u32) -> Option<Self> {
        if !(1..=12).contains(&month) {
            return None;
        }
        Some(FiscalMonth(((month + 8) % 12) as u8))
    }

    pub fn from_date(date: NaiveDate) -> Self {
        FiscalMonth(((date.month() + 8) % 12) as u8)
    }

    /// Accepts any prefix of at least three letters of the English month name
    /// ("Apr", "april", "Sept").
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.trim().to_ascii_lowercase();
        if lower.len() < 3 {
            return None;
        }
        FULL_NAMES
            .iter()
            .position(|full| full.starts_with(&lower))
            .map(|idx| FiscalMonth(idx as u8))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn calendar_month(self) -> u32 {
        (self.0 as u32 + 3) % 12 + 1
    }

    pub fn short_name(self) -> &'static str {
        SHORT_NAMES[self.index()]
    }

    pub fn all() -> impl Iterator<Item = FiscalMonth> {
        (0..12u8).map(FiscalMonth)
    }
}

/// Fiscal year identified by the calendar year its April falls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FiscalYear {
    start_year: i32,
}

impl FiscalYear {
    pub fn new(start_year: i32) -> Self {
        FiscalYear { start_year }
    }

    pub fn containing(date: NaiveDate) -> Self {
        if date.month() >= 4 {
            FiscalYear::new(date.year())
        } else {
            FiscalYear::new(date.year() - 1)
        }
    }

    pub fn previous(&self) -> Self {
        FiscalYear::new(self.start_year - 1)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        FiscalYear::containing(date) == *self
    }

    /// Calendar year of a fiscal month: Apr-Dec belong to the start year,
    /// Jan-Mar to the next one.
    pub fn calendar_year(&self, month: FiscalMonth) -> i32 {
        if month.index() < 9 {
            self.start_year
        } else {
            self.start_year + 1
        }
    }

    pub fn first_day(&self, month: FiscalMonth) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.calendar_year(month), month.calendar_month(), 1)
    }

    pub fn last_day(&self, month: FiscalMonth) -> Option<NaiveDate> {
        let first = self.first_day(month)?;
        let (year, next) = if first.month() == 12 {
            (first.year() + 1, 1)
        } else {
            (first.year(), first.month() + 1)
        };
        NaiveDate::from_ymd_opt(year, next, 1)?.pred_opt()
    }

    /// "25-26" for the year starting April 2025.
    pub fn label(&self) -> String {
        format!(
            "{:02}-{:02}",
            self.start_year.rem_euclid(100),
            (self.start_year + 1).rem_euclid(100)
        )
    }

    /// "Apr-25", "Jan-26".
    pub fn month_label(&self, month: FiscalMonth) -> String {
        format!(
            "{}-{:02}",
            month.short_name(),
            self.calendar_year(month).rem_euclid(100)
        )
    }

    pub fn period_label(&self, period: &Period) -> String {
        match *period {
            Period::Month(m) => self.month_label(m),
            Period::Span { kind, from, to } => {
                let prefix = match kind {
                    SpanKind::Ytd => "YTD".to_string(),
                    SpanKind::Quarter => format!("Q{}", to.index() / 3 + 1),
                    SpanKind::HalfYear => format!("H{}", to.index() / 6 + 1),
                };
                format!(
                    "{}-{} ({} to {})",
                    prefix,
                    self.label(),
                    from.short_name(),
                    to.short_name()
                )
            }
        }
    }
}

impl fmt::Display for FiscalYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FY {}", self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    Ytd,
    Quarter,
    HalfYear,
}

/// A column bucket of the analysis sheets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Month(FiscalMonth),
    Span {
        kind: SpanKind,
        from: FiscalMonth,
        to: FiscalMonth,
    },
}

impl Period {
    pub fn months(&self) -> RangeInclusive<usize> {
        match *self {
            Period::Month(m) => m.index()..=m.index(),
            Period::Span { from, to, .. } => from.index()..=to.index(),
        }
    }

    pub fn ytd_through(month: FiscalMonth) -> Self {
        span(SpanKind::Ytd, 0, month.index())
    }

    pub fn full_year() -> Self {
        span(SpanKind::Ytd, 0, 11)
    }
}

fn span(kind: SpanKind, from: usize, to: usize) -> Period {
    Period::Span {
        kind,
        from: FiscalMonth(from as u8),
        to: FiscalMonth(to as u8),
    }
}

/// Column order of the fiscal-year analyses: the twelve months interleaved
/// with the quarter, half-year and cumulative YTD buckets that close after
/// each quarter.
pub fn fiscal_schema() -> Vec<Period> {
    let month = |idx: usize| Period::Month(FiscalMonth(idx as u8));
    vec![
        month(0),
        month(1),
        month(2),
        span(SpanKind::Ytd, 0, 2),
        month(3),
        month(4),
        month(5),
        span(SpanKind::Quarter, 3, 5),
        span(SpanKind::Ytd, 0, 5),
        month(6),
        month(7),
        month(8),
        span(SpanKind::Quarter, 6, 8),
        span(SpanKind::Ytd, 0, 8),
        month(9),
        month(10),
        month(11),
        span(SpanKind::Quarter, 9, 11),
        span(SpanKind::HalfYear, 6, 11),
        span(SpanKind::Ytd, 0, 11),
    ]
}

/// Twelve monthly amounts of one fiscal year.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MonthlySeries([f64; 12]);

impl MonthlySeries {
    pub fn add(&mut self, month: FiscalMonth, amount: f64) {
        self.0[month.index()] += amount;
    }

    pub fn sum(&self, period: &Period) -> f64 {
        self.0[period.months()].iter().sum()
    }

    pub fn merge(&mut self, other: &MonthlySeries) {
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a += *b;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Budget,
    LastYear,
    Actual,
    Growth,
    Achievement,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::Budget,
        Metric::LastYear,
        Metric::Actual,
        Metric::Growth,
        Metric::Achievement,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            Metric::Budget => "Budget",
            Metric::LastYear => "LY",
            Metric::Actual => "Act",
            Metric::Growth => "Gr",
            Metric::Achievement => "Ach",
        }
    }

    pub fn is_percent(self) -> bool {
        matches!(self, Metric::Growth | Metric::Achievement)
    }

    /// Header text; last-year columns carry the previous year's labels.
    pub fn header(self, fy: FiscalYear, period: &Period) -> String {
        let label = match self {
            Metric::LastYear => fy.previous().period_label(period),
            _ => fy.period_label(period),
        };
        format!("{}-{}", self.prefix(), label)
    }
}

/// Budget, last-year and actual amounts for one period.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PeriodFigures {
    pub budget: f64,
    pub last_year: f64,
    pub actual: f64,
}

impl PeriodFigures {
    pub fn growth(&self) -> f64 {
        safe_pct(self.actual - self.last_year, self.last_year)
    }

    pub fn achievement(&self) -> f64 {
        safe_pct(self.actual, self.budget)
    }

    pub fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Budget => self.budget,
            Metric::LastYear => self.last_year,
            Metric::Actual => self.actual,
            Metric::Growth => self.growth(),
            Metric::Achievement => self.achievement(),
        }
    }
}

/// Month reference parsed from user input or a column header. The year is
/// the calendar year when one was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthRef {
    pub month: FiscalMonth,
    pub year: Option<i32>,
}

impl MonthRef {
    pub fn fiscal_year(&self, fallback: FiscalYear) -> FiscalYear {
        match self.year {
            Some(year) => NaiveDate::from_ymd_opt(year, self.month.calendar_month(), 1)
                .map(FiscalYear::containing)
                .unwrap_or(fallback),
            None => fallback,
        }
    }
}

static ISO_MONTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})[-/](\d{1,2})$").expect("valid regex"));
static NAMED_MONTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z]{3,9})[\s\-_'./]*(\d{4}|\d{2})?$").expect("valid regex")
});

/// Parse "Apr-25", "apr 2025", "April", "2025-04" or a bare calendar month
/// number.
pub fn parse_month(input: &str) -> Result<MonthRef> {
    let s = input.trim();
    let invalid = || ReportError::InvalidMonth(input.to_string());

    if let Ok(n) = s.parse::<u32>() {
        let month = FiscalMonth::from_calendar(n).ok_or_else(invalid)?;
        return Ok(MonthRef { month, year: None });
    }
    if let Some(caps) = ISO_MONTH.captures(s) {
        let year: i32 = caps[1].parse().map_err(|_| invalid())?;
        let n: u32 = caps[2].parse().map_err(|_| invalid())?;
        let month = FiscalMonth::from_calendar(n).ok_or_else(invalid)?;
        return Ok(MonthRef {
            month,
            year: Some(year),
        });
    }
    if let Some(caps) = NAMED_MONTH.captures(s) {
        let month = FiscalMonth::from_name(&caps[1]).ok_or_else(invalid)?;
        let year = match caps.get(2) {
            Some(m) => Some(expand_year(m.as_str()).ok_or_else(invalid)?),
            None => None,
        };
        return Ok(MonthRef { month, year });
    }
    Err(invalid())
}

/// Two-digit years are taken as 20xx.
pub fn expand_year(s: &str) -> Option<i32> {
    let n: i32 = s.parse().ok()?;
    match s.len() {
        2 => Some(2000 + n),
        4 => Some(n),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn fiscal_year_boundaries() {
        assert_eq!(FiscalYear::containing(date(2025, 4, 1)), FiscalYear::new(2025));
        assert_eq!(FiscalYear::containing(date(2026, 3, 31)), FiscalYear::new(2025));
        assert_eq!(FiscalYear::containing(date(2025, 3, 31)), FiscalYear::new(2024));
        assert_eq!(FiscalYear::new(2025).label(), "25-26");
        assert_eq!(FiscalYear::new(1999).label(), "99-00");
    }

    #[test]
    fn month_positions_follow_april_start() {
        assert_eq!(FiscalMonth::from_calendar(4).unwrap().index(), 0);
        assert_eq!(FiscalMonth::from_calendar(12).unwrap().index(), 8);
        assert_eq!(FiscalMonth::from_calendar(1).unwrap().index(), 9);
        assert_eq!(FiscalMonth::from_calendar(3).unwrap().index(), 11);
        assert!(FiscalMonth::from_calendar(13).is_none());
        for m in FiscalMonth::all() {
            assert_eq!(FiscalMonth::from_calendar(m.calendar_month()), Some(m));
        }
    }

    #[test]
    fn month_dates_and_labels() {
        let fy = FiscalYear::new(2025);
        let jan = FiscalMonth::from_name("jan").unwrap();
        let feb = FiscalMonth::from_name("February").unwrap();
        assert_eq!(fy.month_label(jan), "Jan-26");
        assert_eq!(fy.first_day(jan), Some(date(2026, 1, 1)));
        assert_eq!(fy.last_day(feb), Some(date(2026, 2, 28)));
        let dec = FiscalMonth::from_name("Dec").unwrap();
        assert_eq!(fy.last_day(dec), Some(date(2025, 12, 31)));
    }

    #[test]
    fn schema_order_and_labels() {
        let fy = FiscalYear::new(2025);
        let labels: Vec<String> = fiscal_schema().iter().map(|p| fy.period_label(p)).collect();
        assert_eq!(
            labels,
            vec![
                "Apr-25",
                "May-25",
                "Jun-25",
                "YTD-25-26 (Apr to Jun)",
                "Jul-25",
                "Aug-25",
                "Sep-25",
                "Q2-25-26 (Jul to Sep)",
                "YTD-25-26 (Apr to Sep)",
                "Oct-25",
                "Nov-25",
                "Dec-25",
                "Q3-25-26 (Oct to Dec)",
                "YTD-25-26 (Apr to Dec)",
                "Jan-26",
                "Feb-26",
                "Mar-26",
                "Q4-25-26 (Jan to Mar)",
                "H2-25-26 (Oct to Mar)",
                "YTD-25-26 (Apr to Mar)",
            ]
        );
    }

    #[test]
    fn last_year_headers_use_previous_year() {
        let fy = FiscalYear::new(2025);
        let period = Period::ytd_through(FiscalMonth::from_name("Sep").unwrap());
        assert_eq!(Metric::LastYear.header(fy, &period), "LY-YTD-24-25 (Apr to Sep)");
        assert_eq!(Metric::Achievement.header(fy, &period), "Ach-YTD-25-26 (Apr to Sep)");
    }

    #[test]
    fn series_sums_over_spans() {
        let mut s = MonthlySeries::default();
        for m in FiscalMonth::all() {
            s.add(m, (m.index() + 1) as f64);
        }
        let schema = fiscal_schema();
        assert_eq!(s.sum(&schema[3]), 6.0);
        assert_eq!(s.sum(&schema[19]), 78.0);
        assert_eq!(s.sum(&schema[18]), (7..=12).sum::<usize>() as f64);
    }

    #[test]
    fn percentages_handle_zero_denominators() {
        let f = PeriodFigures {
            budget: 0.0,
            last_year: 0.0,
            actual: 50.0,
        };
        assert_eq!(f.growth(), 0.0);
        assert_eq!(f.achievement(), 0.0);
        let f = PeriodFigures {
            budget: 200.0,
            last_year: 40.0,
            actual: 50.0,
        };
        assert_eq!(f.growth(), 25.0);
        assert_eq!(f.achievement(), 25.0);
    }

    #[test]
    fn parses_month_inputs() {
        let apr = FiscalMonth::from_name("apr").unwrap();
        assert_eq!(
            parse_month("Apr-25").unwrap(),
            MonthRef {
                month: apr,
                year: Some(2025)
            }
        );
        assert_eq!(parse_month("april 2025").unwrap().year, Some(2025));
        assert_eq!(parse_month("2025-04").unwrap().month, apr);
        assert_eq!(parse_month("4").unwrap(), MonthRef { month: apr, year: None });
        assert_eq!(parse_month("Sept").unwrap().month.calendar_month(), 9);
        assert!(parse_month("Smarch").is_err());
        assert!(parse_month("13").is_err());
    }

    #[test]
    fn month_ref_picks_fiscal_year() {
        let r = parse_month("Jan-26").unwrap();
        assert_eq!(r.fiscal_year(FiscalYear::new(2000)), FiscalYear::new(2025));
        let r = parse_month("Jan").unwrap();
        assert_eq!(r.fiscal_year(FiscalYear::new(2000)), FiscalYear::new(2000));
    }
}
