use crate::error::Result;
use crate::reports::{CellValue, ColumnKind, ReportTable, RowStyle};
use crate::util::format_number;
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use tabled::{builder::Builder, settings::Style};

const SHEET_NAME_MAX: usize = 31;
const HEADER_ROW: u32 = 1;
const WIDTH_MIN: usize = 8;
const WIDTH_MAX: usize = 40;

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

/// Excel-safe sheet name: no `[]:*?/\`, at most 31 characters.
pub fn sanitize_sheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
            _ => c,
        })
        .take(SHEET_NAME_MAX)
        .collect();
    let trimmed = cleaned.trim_matches('\'').trim().to_string();
    if trimmed.is_empty() {
        "Sheet".to_string()
    } else {
        trimmed
    }
}

fn unique_sheet_name(name: &str, existing: &mut BTreeSet<String>) -> String {
    let base = sanitize_sheet_name(name);
    if existing.insert(base.clone()) {
        return base;
    }
    let stem: String = base.chars().take(SHEET_NAME_MAX - 4).collect();
    let mut n = 2usize;
    loop {
        let candidate = format!("{} ({})", stem, n);
        if existing.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Cell text as shown in previews and CSV copies.
fn display_value(value: &CellValue, kind: ColumnKind) -> String {
    match value {
        CellValue::Text(s) => s.clone(),
        CellValue::Number(n) => match kind {
            ColumnKind::Count => format_number(*n, 0),
            _ => format_number(*n, 2),
        },
    }
}

fn plain_value(value: &CellValue, kind: ColumnKind) -> String {
    match value {
        CellValue::Text(s) => s.clone(),
        CellValue::Number(n) => match kind {
            ColumnKind::Count => format!("{:.0}", n),
            _ => format!("{:.2}", n),
        },
    }
}

struct Formats {
    title: Format,
    header: Format,
    cells: Vec<((ColumnKind, RowStyle), Format)>,
}

impl Formats {
    fn new() -> Self {
        let base = Format::new().set_border(FormatBorder::Thin);
        let mut cells = Vec::new();
        for kind in [
            ColumnKind::Text,
            ColumnKind::Amount,
            ColumnKind::Percent,
            ColumnKind::Count,
        ] {
            for style in [RowStyle::Normal, RowStyle::Subtotal, RowStyle::Total] {
                let mut f = base.clone();
                f = match kind {
                    ColumnKind::Text => f,
                    ColumnKind::Amount => f.set_num_format("#,##0.00"),
                    ColumnKind::Percent => f.set_num_format("0.00"),
                    ColumnKind::Count => f.set_num_format("#,##0"),
                };
                f = match style {
                    RowStyle::Normal => f,
                    RowStyle::Subtotal => f.set_bold().set_background_color(Color::RGB(0xF2F2F2)),
                    RowStyle::Total => f.set_bold().set_background_color(Color::RGB(0xFCE4D6)),
                };
                cells.push(((kind, style), f));
            }
        }
        Formats {
            title: Format::new().set_bold().set_font_size(13.0),
            header: base
                .clone()
                .set_bold()
                .set_text_wrap()
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter)
                .set_background_color(Color::RGB(0xD9E1F2)),
            cells,
        }
    }

    fn cell(&self, kind: ColumnKind, style: RowStyle) -> &Format {
        self.cells
            .iter()
            .find(|(key, _)| *key == (kind, style))
            .map(|(_, f)| f)
            .unwrap_or(&self.header)
    }
}

fn write_table(worksheet: &mut Worksheet, table: &ReportTable, formats: &Formats) -> Result<()> {
    let n_cols = table.columns.len();
    if n_cols > 1 {
        worksheet.merge_range(0, 0, 0, (n_cols - 1) as u16, &table.title, &formats.title)?;
    } else {
        worksheet.write_string_with_format(0, 0, &table.title, &formats.title)?;
    }

    let mut widths: Vec<usize> = table
        .columns
        .iter()
        .map(|c| c.header.chars().count().min(WIDTH_MAX / 2))
        .collect();
    for (c, column) in table.columns.iter().enumerate() {
        worksheet.write_string_with_format(HEADER_ROW, c as u16, &column.header, &formats.header)?;
    }

    for (r, row) in table.rows.iter().enumerate() {
        let excel_row = HEADER_ROW + 1 + r as u32;
        for (c, (value, column)) in row.cells.iter().zip(table.columns.iter()).enumerate() {
            let fmt = formats.cell(column.kind, row.style);
            match value {
                CellValue::Text(s) => {
                    worksheet.write_string_with_format(excel_row, c as u16, s, fmt)?;
                }
                CellValue::Number(n) => {
                    worksheet.write_number_with_format(excel_row, c as u16, *n, fmt)?;
                }
            }
            widths[c] = widths[c].max(display_value(value, column.kind).chars().count());
        }
    }

    for (c, w) in widths.iter().enumerate() {
        let width = (*w + 2).clamp(WIDTH_MIN, WIDTH_MAX);
        worksheet.set_column_width(c as u16, width as f64)?;
    }
    let label_cols = table
        .columns
        .iter()
        .take_while(|c| c.kind == ColumnKind::Text)
        .count();
    worksheet.set_freeze_panes(HEADER_ROW + 1, label_cols as u16)?;
    Ok(())
}

/// Write every table as its own sheet. Returns the sheet names used.
pub fn write_workbook(path: &Path, tables: &[ReportTable]) -> Result<Vec<String>> {
    let mut workbook = Workbook::new();
    let formats = Formats::new();
    let mut names = BTreeSet::new();
    let mut used = Vec::with_capacity(tables.len());
    for table in tables {
        let name = unique_sheet_name(&table.sheet_name, &mut names);
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&name)?;
        write_table(worksheet, table, &formats)?;
        used.push(name);
    }
    workbook.save(path)?;
    Ok(used)
}

pub fn write_csv_table(path: &Path, table: &ReportTable) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(table.columns.iter().map(|c| c.header.as_str()))?;
    for row in &table.rows {
        wtr.write_record(
            row.cells
                .iter()
                .zip(table.columns.iter())
                .map(|(v, c)| plain_value(v, c.kind)),
        )?;
    }
    wtr.flush()?;
    Ok(())
}

/// Markdown preview of the first rows and columns of a table.
pub fn preview_table(table: &ReportTable, max_rows: usize, max_cols: usize) {
    println!("{}", table.title);
    println!();
    if table.rows.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let n_cols = table.columns.len().min(max_cols);
    let mut builder = Builder::default();
    builder.push_record(table.columns.iter().take(n_cols).map(|c| c.header.clone()));
    for row in table.rows.iter().take(max_rows) {
        builder.push_record(
            row.cells
                .iter()
                .zip(table.columns.iter())
                .take(n_cols)
                .map(|(v, c)| display_value(v, c.kind)),
        );
    }
    println!("{}", builder.build().with(Style::markdown()));
    if table.columns.len() > n_cols {
        println!(
            "({} more columns in the workbook)",
            table.columns.len() - n_cols
        );
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::Column;
    use calamine::{open_workbook_auto, Data, Reader};
    use tempfile::tempdir;

    fn sample() -> ReportTable {
        let mut t = ReportTable::new(
            "Sample Report",
            "Region: Qty/Value",
            vec![
                Column::new("Region", ColumnKind::Text),
                Column::new("Qty", ColumnKind::Amount),
                Column::new("Ach %", ColumnKind::Percent),
            ],
        );
        t.push_row(vec!["SOUTH".into()], vec![1234.5, 80.0], RowStyle::Normal);
        t.push_row(vec!["TOTAL".into()], vec![1234.5, 80.0], RowStyle::Total);
        t
    }

    #[test]
    fn sheet_names_are_sanitized_and_unique() {
        assert_eq!(sanitize_sheet_name("Region: Qty/Value"), "Region_ Qty_Value");
        let long = "x".repeat(40);
        assert_eq!(sanitize_sheet_name(&long).len(), 31);
        let mut seen = BTreeSet::new();
        assert_eq!(unique_sheet_name("NBC", &mut seen), "NBC");
        assert_eq!(unique_sheet_name("NBC", &mut seen), "NBC (2)");
    }

    #[test]
    fn workbook_round_trips_through_calamine() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("out.xlsx");
        let names = write_workbook(&path, &[sample(), sample()]).expect("write workbook");
        assert_eq!(names, vec!["Region_ Qty_Value", "Region_ Qty_Value (2)"]);

        let mut wb = open_workbook_auto(&path).expect("open");
        let range = wb.worksheet_range(&names[0]).expect("sheet");
        assert_eq!(range.get_value((0, 0)), Some(&Data::String("Sample Report".into())));
        assert_eq!(range.get_value((1, 1)), Some(&Data::String("Qty".into())));
        assert_eq!(range.get_value((2, 1)), Some(&Data::Float(1234.5)));
        assert_eq!(range.get_value((3, 0)), Some(&Data::String("TOTAL".into())));
    }

    #[test]
    fn csv_copy_uses_plain_numbers() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("out.csv");
        write_csv_table(&path, &sample()).expect("write csv");
        let text = std::fs::read_to_string(&path).expect("read");
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("Region,Qty,Ach %"));
        assert_eq!(lines.next(), Some("SOUTH,1234.50,80.00"));
    }
}
