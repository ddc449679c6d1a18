use crate::timesheet::{DATE_FORMAT, TIME_FORMAT, TimesheetRow};
use calamine::{Data, Reader, open_workbook_auto_from_rs};
use chrono::{Datelike, NaiveDateTime};
use std::collections::BTreeSet;
use std::io::Cursor;
use thiserror::Error;

// Fixed column positions (0-based) of the attendance export
pub const COL_MEMBER: usize = 1;
pub const COL_ATTENDED: usize = 6;
pub const COL_EVENT_TITLE: usize = 9;
pub const COL_START: usize = 11;
pub const COL_END: usize = 12;

/// Value of the attendance column for events that were actually attended
pub const ATTENDED_MARKER: &str = "ano";

/// Text format of the event start and end columns
pub const EVENT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Error)]
pub enum LoadError {
    /// The requested sheet is missing; the caller can ask the user to pick one of `available`
    #[error("Sheet '{requested}' not found in Excel file")]
    SheetNotFound {
        requested: String,
        available: Vec<String>,
    },

    #[error("source sheet name is empty")]
    NoSheetName,

    #[error("failed to open uploaded file: {0}")]
    Open(#[source] calamine::Error),

    #[error("failed to get rows from sheet {sheet}: {source}")]
    Rows {
        sheet: String,
        #[source]
        source: calamine::Error,
    },
}

/// Distinct people and months found in an attendance sheet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetIndex {
    /// Member names, sorted lexicographically
    pub names: Vec<String>,
    /// Months (1-12), ascending
    pub months: Vec<u32>,
}

impl SheetIndex {
    /// Months as the decimal labels used by the select form
    pub fn month_labels(&self) -> Vec<String> {
        self.months.iter().map(|m| m.to_string()).collect()
    }
}

/// List the sheets of an uploaded workbook
pub fn sheet_names(data: &[u8]) -> Result<Vec<String>, LoadError> {
    let workbook = open_workbook_auto_from_rs(Cursor::new(data)).map_err(LoadError::Open)?;
    Ok(workbook.sheet_names())
}

/// Read every row of `sheet_name` as text, header included
///
/// Rows are addressed by absolute position so that fixed column indices stay
/// valid even when leading columns or rows are empty.
fn read_rows(data: &[u8], sheet_name: &str) -> Result<Vec<Vec<String>>, LoadError> {
    if sheet_name.is_empty() {
        return Err(LoadError::NoSheetName);
    }

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(data)).map_err(LoadError::Open)?;

    let available = workbook.sheet_names();
    if !available.iter().any(|name| name == sheet_name) {
        return Err(LoadError::SheetNotFound {
            requested: sheet_name.to_string(),
            available,
        });
    }

    let range = workbook
        .worksheet_range(sheet_name)
        .map_err(|source| LoadError::Rows {
            sheet: sheet_name.to_string(),
            source,
        })?;

    let Some((last_row, last_col)) = range.end() else {
        return Ok(Vec::new());
    };

    let rows = (0..=last_row)
        .map(|row| {
            (0..=last_col)
                .map(|col| range.get_value((row, col)).map(cell_text).unwrap_or_default())
                .collect()
        })
        .collect();

    Ok(rows)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(datetime) => datetime.format(EVENT_TIME_FORMAT).to_string(),
            None => dt.as_f64().to_string(),
        },
        Data::DateTimeIso(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
            .map(|datetime| datetime.format(EVENT_TIME_FORMAT).to_string())
            .unwrap_or_else(|_| s.clone()),
        Data::DurationIso(s) => s.clone(),
    }
}

/// Read a cell from a row, treating missing trailing cells as empty
pub fn cell_value(row: &[String], index: usize) -> &str {
    row.get(index).map(String::as_str).unwrap_or("")
}

/// Parse an event start or end cell (`YYYY-MM-DD HH:MM`)
pub fn parse_event_time(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), EVENT_TIME_FORMAT).ok()
}

/// Collect the people and months present in an attendance sheet
///
/// The first row is a header and is skipped. Rows without a parseable start
/// date still contribute their member name but no month.
///
/// # Arguments
/// * `data` - Raw bytes of the uploaded workbook
/// * `sheet_name` - Sheet holding the attendance table
///
/// # Returns
/// * `Result<SheetIndex, LoadError>` - Sorted names and months, or
///   [`LoadError::SheetNotFound`] listing the sheets that do exist
pub fn index(data: &[u8], sheet_name: &str) -> Result<SheetIndex, LoadError> {
    let rows = read_rows(data, sheet_name)?;

    let mut names = BTreeSet::new();
    let mut months = BTreeSet::new();

    for row in rows.iter().skip(1) {
        let member = cell_value(row, COL_MEMBER);
        if !member.is_empty() {
            names.insert(member.to_string());
        }

        if let Some(start) = parse_event_time(cell_value(row, COL_START)) {
            months.insert(start.month());
        }
    }

    Ok(SheetIndex {
        names: names.into_iter().collect(),
        months: months.into_iter().collect(),
    })
}

/// Extract the attended events of one person in one month
///
/// Rows are kept in sheet order. A row is used only when the member matches
/// exactly, both start and end parse, the start falls into `month` and the
/// attendance column holds [`ATTENDED_MARKER`]. Finding nothing is not an error.
pub fn extract(
    data: &[u8],
    sheet_name: &str,
    name: &str,
    month: u32,
) -> Result<Vec<TimesheetRow>, LoadError> {
    let rows = read_rows(data, sheet_name)?;

    let mut table = Vec::new();
    for row in rows.iter().skip(1) {
        if cell_value(row, COL_MEMBER) != name {
            continue;
        }

        let Some(start) = parse_event_time(cell_value(row, COL_START)) else {
            continue;
        };
        if start.month() != month {
            continue;
        }

        let Some(end) = parse_event_time(cell_value(row, COL_END)) else {
            continue;
        };

        if cell_value(row, COL_ATTENDED) != ATTENDED_MARKER {
            continue;
        }

        table.push(TimesheetRow {
            date: start.format(DATE_FORMAT).to_string(),
            start_time: start.format(TIME_FORMAT).to_string(),
            end_time: end.format(TIME_FORMAT).to_string(),
            note: cell_value(row, COL_EVENT_TITLE).to_string(),
        });
    }

    Ok(table)
}
