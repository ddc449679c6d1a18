//! Default layout of the generated timesheet
//!
//! The renderer fills an existing workbook so that deployments can ship their own
//! styled template. This module produces the stock one with the cells the
//! renderer expects: first and last name in `B3`/`B4`, one line per event in rows
//! 7 through 37 (date, from, to, hours, signature, note) and a total in row 38.

use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook, XlsxError};
use std::path::Path;
use thiserror::Error;

/// Sheet of the template the rows are written into
pub const TARGET_SHEET: &str = "výkaz práce";

/// Cell receiving the first name
pub const FIRST_NAME_CELL: &str = "B3";

/// Cell receiving the last name
pub const LAST_NAME_CELL: &str = "B4";

/// Spreadsheet row (1-based) of the first timesheet line
pub const FIRST_DATA_ROW: u32 = 7;

/// Number of timesheet lines the layout has room for
pub const MAX_ROWS: usize = 31;

pub const DATE_NUMBER_FORMAT: &str = "d.m.yyyy";
pub const TIME_NUMBER_FORMAT: &str = "hh:mm";

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to build template workbook: {0}")]
    Xlsx(#[from] XlsxError),

    #[error("failed to write template: {0}")]
    Io(#[from] std::io::Error),
}

/// Build the stock timesheet template
///
/// # Returns
/// * `Result<Vec<u8>, TemplateError>` - XLSX file content
pub fn build_default_template() -> Result<Vec<u8>, TemplateError> {
    let mut workbook = Workbook::new();

    let title = Format::new().set_bold().set_font_size(14.0);
    let label = Format::new().set_bold();
    let header = Format::new()
        .set_bold()
        .set_align(FormatAlign::Center)
        .set_border(FormatBorder::Thin);
    let date = Format::new()
        .set_num_format(DATE_NUMBER_FORMAT)
        .set_border(FormatBorder::Thin);
    let time = Format::new()
        .set_num_format(TIME_NUMBER_FORMAT)
        .set_border(FormatBorder::Thin);
    let hours = Format::new()
        .set_num_format("0.00")
        .set_border(FormatBorder::Thin);
    let plain = Format::new().set_border(FormatBorder::Thin);

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(TARGET_SHEET)?;

    worksheet.write_string_with_format(0, 0, "Výkaz práce", &title)?;
    worksheet.write_string_with_format(2, 0, "Jméno", &label)?;
    worksheet.write_string_with_format(3, 0, "Příjmení", &label)?;

    let headers = ["Datum", "Od", "Do", "Hodin", "Podpis", "Poznámka"];
    for (col, text) in headers.iter().enumerate() {
        worksheet.write_string_with_format(FIRST_DATA_ROW - 2, col as u16, *text, &header)?;
    }

    let first = FIRST_DATA_ROW - 1;
    for offset in 0..MAX_ROWS as u32 {
        let row = first + offset;
        let excel_row = row + 1;
        let formula = format!(
            "=IF(OR(B{r}=\"\",C{r}=\"\"),\"\",(C{r}-B{r})*24)",
            r = excel_row
        );

        worksheet.write_blank(row, 0, &date)?;
        worksheet.write_blank(row, 1, &time)?;
        worksheet.write_blank(row, 2, &time)?;
        worksheet.write_formula_with_format(row, 3, formula.as_str(), &hours)?;
        worksheet.write_blank(row, 4, &plain)?;
        worksheet.write_blank(row, 5, &plain)?;
    }

    let total_row = first + MAX_ROWS as u32;
    let total = format!(
        "=SUM(D{}:D{})",
        FIRST_DATA_ROW,
        FIRST_DATA_ROW + MAX_ROWS as u32 - 1
    );
    worksheet.write_string_with_format(total_row, 0, "Celkem", &label)?;
    worksheet.write_formula_with_format(total_row, 3, total.as_str(), &hours)?;

    worksheet.set_column_width(0, 12.0)?;
    worksheet.set_column_width(4, 14.0)?;
    worksheet.set_column_width(5, 40.0)?;

    Ok(workbook.save_to_buffer()?)
}

/// Write the stock template to `path`
pub fn write_default_template(path: impl AsRef<Path>) -> Result<(), TemplateError> {
    let data = build_default_template()?;
    std::fs::write(path, data)?;
    Ok(())
}
