use crate::template::{
    DATE_NUMBER_FORMAT, FIRST_DATA_ROW, FIRST_NAME_CELL, LAST_NAME_CELL, MAX_ROWS, TARGET_SHEET,
    TIME_NUMBER_FORMAT,
};
use crate::timesheet::{TimesheetRow, clock_to_serial, date_to_serial, parse_clock, split_name};
use log::warn;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;
use umya_spreadsheet::{Spreadsheet, Worksheet, reader, writer};

// Template columns (1-based) of one timesheet line
const COL_DATE: u32 = 1;
const COL_START: u32 = 2;
const COL_END: u32 = 3;
const COL_NOTE: u32 = 6;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to open template file {path}: {source}")]
    TemplateRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse template file: {0}")]
    TemplateParse(#[source] reader::xlsx::XlsxError),

    #[error("sheet {0:?} does not exist in the template file")]
    MissingSheet(String),

    /// A start or end time could not be parsed; the whole render is abandoned
    #[error("invalid {field} {value:?} on line {line}")]
    InvalidTime {
        line: usize,
        field: &'static str,
        value: String,
    },

    #[error("failed to write workbook: {0}")]
    Write(#[source] writer::xlsx::XlsxError),
}

impl RenderError {
    /// Whether the error comes from submitted rows rather than from the deployment
    pub fn is_input_error(&self) -> bool {
        matches!(self, RenderError::InvalidTime { .. })
    }
}

/// Fills the timesheet template with a person's rows
#[derive(Debug, Clone)]
pub struct Renderer {
    template_path: PathBuf,
}

impl Renderer {
    pub fn new(template_path: impl Into<PathBuf>) -> Self {
        Self {
            template_path: template_path.into(),
        }
    }

    pub fn template_path(&self) -> &Path {
        &self.template_path
    }

    /// Load the template from disk and fill it, see [`fill`]
    pub fn render(&self, name: &str, rows: &[TimesheetRow]) -> Result<Spreadsheet, RenderError> {
        let template = std::fs::read(&self.template_path).map_err(|source| {
            RenderError::TemplateRead {
                path: self.template_path.clone(),
                source,
            }
        })?;
        fill(&template, name, rows)
    }

    /// Render and serialize in one step
    pub fn render_bytes(&self, name: &str, rows: &[TimesheetRow]) -> Result<Vec<u8>, RenderError> {
        let book = self.render(name, rows)?;
        to_bytes(&book)
    }
}

/// Write a person's name and rows into a template workbook
///
/// Line `i` of `rows` goes to spreadsheet row `7 + i`; only the first 31 lines
/// fit and the rest are dropped without an error. A line with an unparseable
/// date is left out while the others are still written, but an unparseable
/// start or end time fails the whole render.
///
/// # Arguments
/// * `template` - XLSX bytes containing the [`TARGET_SHEET`] sheet
/// * `name` - Full name as listed in the attendance export (last name first)
/// * `rows` - Timesheet lines in canonical text formats
///
/// # Returns
/// * `Result<Spreadsheet, RenderError>` - The filled workbook, not yet serialized
pub fn fill(template: &[u8], name: &str, rows: &[TimesheetRow]) -> Result<Spreadsheet, RenderError> {
    let mut book = reader::xlsx::read_reader(Cursor::new(template), true)
        .map_err(RenderError::TemplateParse)?;

    let sheet = book
        .get_sheet_by_name_mut(TARGET_SHEET)
        .ok_or_else(|| RenderError::MissingSheet(TARGET_SHEET.to_string()))?;

    let (first_name, last_name) = split_name(name);
    sheet.get_cell_mut(FIRST_NAME_CELL).set_value_string(first_name);
    sheet.get_cell_mut(LAST_NAME_CELL).set_value_string(last_name);

    for (index, row) in rows.iter().take(MAX_ROWS).enumerate() {
        write_line(sheet, index, row)?;
    }

    Ok(book)
}

fn write_line(sheet: &mut Worksheet, index: usize, row: &TimesheetRow) -> Result<(), RenderError> {
    let line = index + 1;
    let target_row = FIRST_DATA_ROW + index as u32;

    let Some(date) = row.parse_date() else {
        warn!("Skipping timesheet line {} with invalid date {:?}", line, row.date);
        return Ok(());
    };

    let start = parse_clock(&row.start_time).ok_or_else(|| RenderError::InvalidTime {
        line,
        field: "start time",
        value: row.start_time.clone(),
    })?;
    let end = parse_clock(&row.end_time).ok_or_else(|| RenderError::InvalidTime {
        line,
        field: "end time",
        value: row.end_time.clone(),
    })?;

    sheet
        .get_cell_mut((COL_DATE, target_row))
        .set_value_number(date_to_serial(date));
    sheet
        .get_style_mut((COL_DATE, target_row))
        .get_number_format_mut()
        .set_format_code(DATE_NUMBER_FORMAT);

    for (col, time) in [(COL_START, start), (COL_END, end)] {
        sheet
            .get_cell_mut((col, target_row))
            .set_value_number(clock_to_serial(time));
        sheet
            .get_style_mut((col, target_row))
            .get_number_format_mut()
            .set_format_code(TIME_NUMBER_FORMAT);
    }

    sheet
        .get_cell_mut((COL_NOTE, target_row))
        .set_value_string(row.note.as_str());

    Ok(())
}

/// Serialize a filled workbook to XLSX bytes
pub fn to_bytes(book: &Spreadsheet) -> Result<Vec<u8>, RenderError> {
    let mut cursor = Cursor::new(Vec::new());
    writer::xlsx::write_writer(book, &mut cursor).map_err(RenderError::Write)?;
    Ok(cursor.into_inner())
}
