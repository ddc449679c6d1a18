use rust_xlsxwriter::Workbook;
use timesheet_filler::loader::{COL_ATTENDED, COL_END, COL_EVENT_TITLE, COL_MEMBER, COL_START};

pub const FIXTURE_SHEET: &str = "docházka realizačního týmu";

/// Attendance export with one line per `(member, attended, title, start, end)`
pub fn attendance_export(events: &[(&str, &str, &str, &str, &str)]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(FIXTURE_SHEET).unwrap();

    for (col, text) in [
        (COL_MEMBER, "Člen"),
        (COL_ATTENDED, "Účast"),
        (COL_EVENT_TITLE, "Název"),
        (COL_START, "Začátek"),
        (COL_END, "Konec"),
    ] {
        worksheet.write_string(0, col as u16, text).unwrap();
    }

    for (index, (member, attended, title, start, end)) in events.iter().enumerate() {
        let row = index as u32 + 1;
        worksheet.write_string(row, COL_MEMBER as u16, *member).unwrap();
        worksheet.write_string(row, COL_ATTENDED as u16, *attended).unwrap();
        worksheet.write_string(row, COL_EVENT_TITLE as u16, *title).unwrap();
        worksheet.write_string(row, COL_START as u16, *start).unwrap();
        worksheet.write_string(row, COL_END as u16, *end).unwrap();
    }

    workbook.save_to_buffer().unwrap()
}
