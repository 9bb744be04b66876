// Column resolution for uploaded sheets.
//
// Uploaded workbooks come from different exports, so nothing is addressed by
// position or exact header text. Each logical field carries a list of aliases
// and is resolved in three passes: exact normalized match, whole-word
// containment, then Jaro-Winkler similarity.
use crate::fiscal::{expand_year, FiscalMonth, FiscalYear};
use crate::types::{Cell, Measure};
use crate::util::parse_date_safe;
use chrono::Datelike;
use strsim::jaro_winkler;

const SIMILARITY_THRESHOLD: f64 = 0.92;

/// Lower-case, every run of non-alphanumerics collapsed to one space.
pub fn normalize_header(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_space = false;
    for c in s.chars() {
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.extend(c.to_lowercase());
        } else {
            pending_space = true;
        }
    }
    out
}

fn contains_words(header: &str, alias: &str) -> bool {
    format!(" {} ", header).contains(&format!(" {} ", alias))
}

/// Index of the column best matching one of `aliases`, skipping `taken`.
pub fn find_column(headers: &[String], aliases: &[String], taken: &[usize]) -> Option<usize> {
    let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
    let aliases: Vec<String> = aliases
        .iter()
        .map(|a| normalize_header(a))
        .filter(|a| !a.is_empty())
        .collect();
    let free = |idx: &usize| !taken.contains(idx) && !normalized[*idx].is_empty();

    for alias in &aliases {
        if let Some(idx) = (0..normalized.len()).filter(free).find(|&i| normalized[i] == *alias) {
            return Some(idx);
        }
    }
    for alias in &aliases {
        if let Some(idx) = (0..normalized.len())
            .filter(free)
            .find(|&i| contains_words(&normalized[i], alias))
        {
            return Some(idx);
        }
    }

    let mut best: Option<(usize, f64)> = None;
    for alias in &aliases {
        for idx in (0..normalized.len()).filter(free) {
            let score = jaro_winkler(&normalized[idx], alias);
            if score >= SIMILARITY_THRESHOLD && best.map_or(true, |(_, s)| score > s) {
                best = Some((idx, score));
            }
        }
    }
    best.map(|(idx, score)| {
        log::debug!(
            "fuzzy-matched column '{}' (score {:.3})",
            headers[idx],
            score
        );
        idx
    })
}

/// Resolves fields against one header row, never handing the same column to
/// two fields.
#[derive(Debug)]
pub struct ColumnResolver {
    headers: Vec<String>,
    taken: Vec<usize>,
}

impl ColumnResolver {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            taken: Vec::new(),
        }
    }

    pub fn resolve(&mut self, field: &str, aliases: &[String]) -> Option<usize> {
        let found = find_column(&self.headers, aliases, &self.taken);
        match found {
            Some(idx) => {
                log::debug!("field '{}' -> column '{}'", field, self.headers[idx]);
                self.taken.push(idx);
            }
            None => log::debug!("field '{}' not found", field),
        }
        found
    }

    /// Marks columns as used without resolving a field (month columns).
    pub fn reserve(&mut self, columns: impl IntoIterator<Item = usize>) {
        self.taken.extend(columns);
    }
}

pub fn header_texts(row: &[Cell]) -> Vec<String> {
    row.iter().map(Cell::as_text).collect()
}

/// First row among the first `scan_rows` in which every required alias list
/// resolves. Report exports often carry title rows above the header.
pub fn locate_header_row(rows: &[Vec<Cell>], required: &[&[String]], scan_rows: usize) -> Option<usize> {
    rows.iter().take(scan_rows).position(|row| {
        let headers = header_texts(row);
        let filled = headers.iter().filter(|h| !h.trim().is_empty()).count();
        filled >= required.len()
            && required
                .iter()
                .all(|aliases| find_column(&headers, aliases, &[]).is_some())
    })
}

/// A header naming a budget month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthColumn {
    pub index: usize,
    pub month: FiscalMonth,
    pub measure: Option<Measure>,
}

const NON_BUDGET_WORDS: [&str; 11] = [
    "ly", "last", "actual", "act", "growth", "gr", "ach", "achievement", "ytd", "total", "cumulative",
];
const VALUE_WORDS: [&str; 6] = ["value", "val", "amount", "amt", "rs", "lakhs"];
const QTY_WORDS: [&str; 6] = ["qty", "quantity", "mt", "tonnage", "tons", "volume"];

fn split_letters_digits(token: &str) -> (&str, &str) {
    let cut = token
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(token.len());
    token.split_at(cut)
}

fn year_token(s: &str) -> Option<i32> {
    if s.chars().all(|c| c.is_ascii_digit()) && (s.len() == 2 || s.len() == 4) {
        expand_year(s)
    } else {
        None
    }
}

/// Classify one header as a month column, if it names one.
pub fn parse_month_header(header: &str) -> Option<(FiscalMonth, Option<i32>, Option<Measure>)> {
    let trimmed = header.trim();
    if let Some(date) = parse_date_safe(Some(trimmed)) {
        return Some((FiscalMonth::from_date(date), Some(date.year()), None));
    }

    let norm = normalize_header(trimmed);
    let tokens: Vec<&str> = norm.split(' ').filter(|t| !t.is_empty()).collect();
    if tokens.iter().any(|t| NON_BUDGET_WORDS.contains(t)) {
        return None;
    }

    let mut found: Option<(FiscalMonth, Option<i32>)> = None;
    for (pos, token) in tokens.iter().enumerate() {
        let (letters, digits) = split_letters_digits(token);
        if letters.len() < 3 || letters.len() > 9 {
            continue;
        }
        let Some(month) = FiscalMonth::from_name(letters) else {
            continue;
        };
        let year = if digits.is_empty() {
            tokens.get(pos + 1).and_then(|next| year_token(next))
        } else {
            match year_token(digits) {
                Some(y) => Some(y),
                None => continue,
            }
        };
        if found.is_some() {
            // Two month names ("Apr to Jun") describe a span, not a month.
            return None;
        }
        found = Some((month, year));
    }

    let (month, year) = found?;
    let measure = if tokens.iter().any(|t| VALUE_WORDS.contains(t)) {
        Some(Measure::Value)
    } else if tokens.iter().any(|t| QTY_WORDS.contains(t)) {
        Some(Measure::Quantity)
    } else {
        None
    };
    Some((month, year, measure))
}

/// Every month column of a header row. Columns dated outside `fy` are
/// dropped.
pub fn month_columns(headers: &[String], fy: FiscalYear) -> Vec<MonthColumn> {
    headers
        .iter()
        .enumerate()
        .filter_map(|(index, header)| {
            let (month, year, measure) = parse_month_header(header)?;
            if let Some(y) = year {
                if y != fy.calendar_year(month) {
                    log::warn!(
                        "ignoring budget column '{}': outside {}",
                        header.trim(),
                        fy
                    );
                    return None;
                }
            }
            Some(MonthColumn {
                index,
                month,
                measure,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn headers(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn normalizes_headers() {
        assert_eq!(normalize_header("  Type(Make) "), "type make");
        assert_eq!(normalize_header("Qty in M.T."), "qty in m t");
        assert_eq!(normalize_header("Bill_Date"), "bill date");
    }

    #[test]
    fn exact_match_beats_containment() {
        let h = headers(&["Invoice Date", "Date", "Customer Name"]);
        assert_eq!(find_column(&h, &headers(&["date"]), &[]), Some(1));
    }

    #[test]
    fn containment_and_similarity_fallbacks() {
        let h = headers(&["Sl No", "Name of the Branch", "Custmer Name"]);
        assert_eq!(find_column(&h, &headers(&["branch"]), &[]), Some(1));
        assert_eq!(find_column(&h, &headers(&["customer name"]), &[]), Some(2));
        assert_eq!(find_column(&h, &headers(&["region"]), &[]), None);
    }

    #[test]
    fn resolver_does_not_reuse_columns() {
        let mut r = ColumnResolver::new(headers(&["Type(Make)", "Qty"]));
        assert_eq!(r.resolve("product", &headers(&["type make"])), Some(0));
        assert_eq!(r.resolve("company", &headers(&["make"])), None);
        assert_eq!(r.resolve("quantity", &headers(&["qty"])), Some(1));
    }

    #[test]
    fn header_row_found_below_title_rows() {
        let rows = vec![
            vec![Cell::Text("Sales Register FY 25-26".into())],
            vec![Cell::Empty, Cell::Empty],
            vec![
                Cell::Text("Date".into()),
                Cell::Text("Branch".into()),
                Cell::Text("Qty".into()),
            ],
        ];
        let date = headers(&["date"]);
        let qty = headers(&["qty"]);
        assert_eq!(locate_header_row(&rows, &[&date, &qty], 15), Some(2));
        assert_eq!(locate_header_row(&rows, &[&date, &qty], 2), None);
    }

    #[test]
    fn classifies_month_headers() {
        let apr = FiscalMonth::from_name("apr").unwrap();
        assert_eq!(parse_month_header("Apr-25"), Some((apr, Some(2025), None)));
        assert_eq!(
            parse_month_header("Budget Value April 2025"),
            Some((apr, Some(2025), Some(Measure::Value)))
        );
        assert_eq!(
            parse_month_header("Qty Apr25"),
            Some((apr, Some(2025), Some(Measure::Quantity)))
        );
        assert_eq!(parse_month_header("2025-04-01"), Some((apr, Some(2025), None)));
        assert_eq!(parse_month_header("LY-Apr-24"), None);
        assert_eq!(parse_month_header("YTD (Apr to Jun)"), None);
        assert_eq!(parse_month_header("Make"), None);
        assert_eq!(parse_month_header("Market"), None);
    }

    #[test]
    fn month_columns_respect_fiscal_year() {
        let h = headers(&["Product", "Apr-25", "Jan-26", "Jan-25", "May"]);
        let cols = month_columns(&h, FiscalYear::new(2025));
        let idx: Vec<usize> = cols.iter().map(|c| c.index).collect();
        assert_eq!(idx, vec![1, 2, 4]);
        assert_eq!(cols[1].month.calendar_month(), 1);
    }
}
