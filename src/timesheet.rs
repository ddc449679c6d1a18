use chrono::{NaiveDate, NaiveTime, Timelike};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Canonical text format of a timesheet date
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Canonical text format of a timesheet clock time
pub const TIME_FORMAT: &str = "%H:%M";

const SECONDS_PER_DAY: f64 = 86_400.0;

lazy_static! {
    static ref UNSAFE_FILENAME_CHARS: Regex =
        Regex::new(r#"[<>:"/\\|?*\x00-\x1F]"#).expect("filename pattern is valid");
}

/// One line of a timesheet
///
/// All fields are plain strings in their canonical formats (`YYYY-MM-DD` for the
/// date, `HH:MM` for both times). A row has no identity beyond its position in
/// the list that contains it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimesheetRow {
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub note: String,
}

impl TimesheetRow {
    pub fn new(
        date: impl Into<String>,
        start_time: impl Into<String>,
        end_time: impl Into<String>,
        note: impl Into<String>,
    ) -> Self {
        Self {
            date: date.into(),
            start_time: start_time.into(),
            end_time: end_time.into(),
            note: note.into(),
        }
    }

    /// The empty editable line shown when nothing was extracted
    pub fn blank() -> Self {
        Self::default()
    }

    pub fn parse_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.date.trim(), DATE_FORMAT).ok()
    }
}

/// Convert a clock time to a fraction of a day
///
/// Spreadsheet applications store times as the elapsed fraction of a 24-hour
/// day, so noon is `0.5` and 18:30 is roughly `0.770833`.
///
/// # Arguments
/// * `hours` - Hour of the day (0-23)
/// * `minutes` - Minute of the hour
/// * `seconds` - Second of the minute
///
/// # Returns
/// * `f64` - The serial time value
///
/// # Examples
/// ```
/// use timesheet_filler::timesheet::time_to_serial;
///
/// assert_eq!(time_to_serial(12, 0, 0), 0.5);
/// assert_eq!(time_to_serial(6, 0, 0), 0.25);
/// ```
pub fn time_to_serial(hours: u32, minutes: u32, seconds: u32) -> f64 {
    let total_seconds = hours * 3600 + minutes * 60 + seconds;
    f64::from(total_seconds) / SECONDS_PER_DAY
}

/// Serial value of a parsed clock time, see [`time_to_serial`]
pub fn clock_to_serial(time: NaiveTime) -> f64 {
    time_to_serial(time.hour(), time.minute(), time.second())
}

/// Convert a calendar date to a spreadsheet day serial (1900 date system)
pub fn date_to_serial(date: NaiveDate) -> f64 {
    // Day zero is 1899-12-30 so that the serials line up with the 1900 leap-year quirk
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or_default();
    (date - epoch).num_days() as f64
}

pub fn parse_clock(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), TIME_FORMAT).ok()
}

/// Split a full name into `(first, last)` parts
///
/// Attendance exports list the surname first, so the first whitespace token is
/// the last name and everything after it is the first name.
///
/// # Examples
/// ```
/// use timesheet_filler::timesheet::split_name;
///
/// assert_eq!(split_name("Novák Jan"), ("Jan".to_string(), "Novák".to_string()));
/// assert_eq!(split_name("Novák"), ("".to_string(), "Novák".to_string()));
/// ```
pub fn split_name(full_name: &str) -> (String, String) {
    let mut parts = full_name.split_whitespace();
    let last = parts.next().unwrap_or_default().to_string();
    let first = parts.collect::<Vec<_>>().join(" ");
    (first, last)
}

/// Parse a month given either as a number (`"1"`..`"12"`) or an English name
pub fn parse_month(value: &str) -> Option<u32> {
    let value = value.trim().to_lowercase();
    let named = match value.as_str() {
        "january" => Some(1),
        "february" => Some(2),
        "march" => Some(3),
        "april" => Some(4),
        "may" => Some(5),
        "june" => Some(6),
        "july" => Some(7),
        "august" => Some(8),
        "september" => Some(9),
        "october" => Some(10),
        "november" => Some(11),
        "december" => Some(12),
        _ => None,
    };

    named.or_else(|| value.parse::<u32>().ok().filter(|m| (1..=12).contains(m)))
}

pub fn remove_diacritics(value: &str) -> String {
    value.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Replace characters that are not allowed in file names with `_`
///
/// Trailing spaces and periods are trimmed as well.
pub fn sanitize_filename(filename: &str) -> String {
    let replaced = UNSAFE_FILENAME_CHARS.replace_all(filename, "_");
    replaced.trim_end_matches([' ', '.']).to_string()
}

/// Build the suggested download name for a rendered timesheet
///
/// # Arguments
/// * `full_name` - The person's name as it appears in the attendance export
/// * `month` - Month number (1-12)
/// * `year` - Four digit year
///
/// # Returns
/// * `String` - e.g. `Gorily_vykaz-prace_012023_Jan_Novak.xlsx`
pub fn output_filename(full_name: &str, month: u32, year: i32) -> String {
    let (first, last) = split_name(full_name);
    let filename = format!(
        "Gorily_vykaz-prace_{:02}{}_{}_{}.xlsx",
        month,
        year,
        remove_diacritics(&first),
        remove_diacritics(&last)
    );
    sanitize_filename(&filename)
}
