/*!
# Timesheet Filler

A small web application that turns an attendance export into a signed monthly
timesheet.

## Overview

Team members log their events (practices, matches, camps) in an attendance
system that exports one spreadsheet per season. Payroll needs a different
document: one timesheet per person and month, on a fixed company template.
This crate bridges the two through a short browser wizard.

## Workflow

1. **Upload** - The attendance export is uploaded and indexed. The configured
   sheet is tried first; if it is missing the user picks one of the sheets
   that do exist.
2. **Select** - The user chooses a person and a month. The most recent month
   is preselected.
3. **Edit** - Attended events of that person and month are listed as editable
   rows (date, from, to, note). Rows can be added, changed and removed.
4. **Generate** - The rows are written into the timesheet template and stored
   under a single-use download token.
5. **Deliver** - The timesheet is downloaded, or mailed to the office with an
   optional copy to the user.

No state is kept between requests apart from two in-memory stores addressed by
random tokens. Stored files expire after a configurable time and are removed by
a background sweep.

## Modules

- **timesheet**: Timesheet rows and the small conversions around them (serial
  times, month parsing, output file names)
- **store**: Token-addressed expiring storage for uploads and generated files
- **loader**: Reads attendance exports (names, months and attended events)
- **template**: Builds the stock output template
- **renderer**: Fills the template with a person's rows
- **mailer**: Sends generated timesheets over SMTP
- **workflow**: The wizard steps and the pages they lead to
- **config**: Configuration from defaults and `TIMESHEET_*` environment variables
- **views**: HTML rendering of the wizard pages (feature `web`)
- **app**: Routing, request logging and server lifecycle (feature `web`)

## HTTP Endpoints

- `GET /` - Upload form
- `POST /upload` - Upload an attendance export (`excelFile`)
- `POST /select-sheet` - Pick the attendance sheet
- `POST /edit` - Load the rows of one person and month
- `POST /process` - Generate the timesheet from the edited rows
- `GET /download/{token}` - Download a generated timesheet once
- `POST /send-email` - Mail a generated timesheet
- `GET /healthz`, `GET /readyz` - Liveness and readiness probes
*/

pub mod config;
pub mod loader;
pub mod mailer;
pub mod renderer;
pub mod store;
pub mod template;
pub mod timesheet;
pub mod workflow;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod views;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::Config;
pub use store::{FileStore, Token};
pub use timesheet::TimesheetRow;
pub use workflow::{Page, Workflow};
