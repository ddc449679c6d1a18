//! Attendance exports for unit tests

use crate::loader::{COL_ATTENDED, COL_END, COL_EVENT_TITLE, COL_MEMBER, COL_START};
use rust_xlsxwriter::Workbook;

pub const FIXTURE_SHEET: &str = "docházka realizačního týmu";

/// One line of an attendance export
pub struct Event<'a> {
    pub member: &'a str,
    pub attended: &'a str,
    pub title: &'a str,
    pub start: &'a str,
    pub end: &'a str,
}

pub fn event<'a>(member: &'a str, attended: &'a str, title: &'a str, start: &'a str, end: &'a str) -> Event<'a> {
    Event {
        member,
        attended,
        title,
        start,
        end,
    }
}

/// Two attended January events of "Test User" and one February event of
/// "Another User"
pub fn standard_events() -> Vec<Event<'static>> {
    vec![
        event("Test User", "ano", "Team Practice", "2023-01-15 18:00", "2023-01-15 20:00"),
        event("Test User", "ano", "Championship", "2023-01-22 15:30", "2023-01-22 17:30"),
        event("Another User", "ano", "Training", "2023-02-05 10:00", "2023-02-05 12:00"),
    ]
}

/// Build an attendance export with the given events below a header row
pub fn attendance_workbook(sheet: &str, events: &[Event]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet).unwrap();

    let header = [
        (0, "ID"),
        (COL_MEMBER, "Člen"),
        (COL_ATTENDED, "Účast"),
        (8, "Typ akce"),
        (COL_EVENT_TITLE, "Název"),
        (COL_START, "Začátek"),
        (COL_END, "Konec"),
    ];
    for (col, text) in header {
        worksheet.write_string(0, col as u16, text).unwrap();
    }

    for (index, event) in events.iter().enumerate() {
        let row = index as u32 + 1;
        worksheet.write_number(row, 0, row as f64).unwrap();
        for (col, text) in [
            (COL_MEMBER, event.member),
            (COL_ATTENDED, event.attended),
            (8, "Trénink"),
            (COL_EVENT_TITLE, event.title),
            (COL_START, event.start),
            (COL_END, event.end),
        ] {
            if !text.is_empty() {
                worksheet.write_string(row, col as u16, text).unwrap();
            }
        }
    }

    workbook.save_to_buffer().unwrap()
}
