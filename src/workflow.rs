//! The upload → select → edit → generate → download wizard
//!
//! [`Workflow`] is the only place that issues and resolves tokens. Each step
//! takes what the browser posted and returns a [`Step`]: the [`Page`] to show
//! next plus an [`Outcome`] telling the web layer which status to answer with.
//! Mistakes the user can fix are reported inside the page; only problems with
//! the deployment itself come back as [`WorkflowError`].

use crate::loader::{self, LoadError, SheetIndex};
use crate::mailer::{SendTimesheet, TimesheetMail, is_valid_email};
use crate::renderer::{RenderError, Renderer};
use crate::store::{FileStore, OutputRecord, SourceRecord};
use crate::timesheet::{TimesheetRow, output_filename, parse_month};
use chrono::Datelike;
use log::{error, info, warn};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("failed to render timesheet: {0}")]
    Render(#[from] RenderError),
}

/// How a step went, from the browser's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// The submitted form was incomplete or invalid
    BadRequest,
    /// A token no longer resolves
    NotFound,
    /// A feature is switched off in this deployment
    Unavailable,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UploadPage {
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SelectSheetPage {
    pub file_token: String,
    pub requested_sheet: String,
    pub available_sheets: Vec<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SelectPage {
    pub file_token: String,
    pub names: Vec<String>,
    pub months: Vec<String>,
    pub default_month: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EditPage {
    pub file_token: String,
    pub name: String,
    pub month: String,
    pub rows: Vec<TimesheetRow>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DownloadPage {
    pub download_token: String,
    pub file_name: String,
    pub file_token: String,
    pub name: String,
    pub month: String,
    pub email_enabled: bool,
    pub email_sent: bool,
    pub send_to_self: bool,
    pub user_email: String,
    pub error: Option<String>,
}

/// Every screen of the wizard
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "page", rename_all = "snake_case")]
pub enum Page {
    Upload(UploadPage),
    SelectSheet(SelectSheetPage),
    Select(SelectPage),
    Edit(EditPage),
    Download(DownloadPage),
}

impl Page {
    pub fn error(&self) -> Option<&str> {
        let error = match self {
            Page::Upload(page) => &page.error,
            Page::SelectSheet(page) => &page.error,
            Page::Select(page) => &page.error,
            Page::Edit(page) => &page.error,
            Page::Download(page) => &page.error,
        };
        error.as_deref()
    }

    fn upload_error(message: impl Into<String>) -> Self {
        Page::Upload(UploadPage {
            error: Some(message.into()),
        })
    }
}

/// The page to show next and how the request went
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub page: Page,
    pub outcome: Outcome,
}

impl Step {
    fn success(page: Page) -> Self {
        Self {
            page,
            outcome: Outcome::Success,
        }
    }

    fn bad_request(page: Page) -> Self {
        Self {
            page,
            outcome: Outcome::BadRequest,
        }
    }
}

/// Edited rows posted back from the edit page
#[derive(Debug, Clone, Default)]
pub struct ProcessRequest {
    pub file_token: String,
    pub name: String,
    pub month: String,
    pub rows: Vec<TimesheetRow>,
}

/// Form of the "send by email" button on the download page
#[derive(Debug, Clone, Default)]
pub struct EmailRequest {
    pub file_token: String,
    pub download_token: String,
    pub file_name: String,
    pub name: String,
    pub month: String,
    pub user_email: String,
    pub send_to_self: bool,
}

/// Zip the parallel columns of the edit form into rows
///
/// The date column decides the number of rows; shorter columns are padded
/// with empty values.
pub fn rows_from_columns(
    dates: &[String],
    start_times: &[String],
    end_times: &[String],
    notes: &[String],
) -> Vec<TimesheetRow> {
    let column = |values: &[String], index: usize| values.get(index).cloned().unwrap_or_default();

    dates
        .iter()
        .enumerate()
        .map(|(index, date)| TimesheetRow {
            date: date.clone(),
            start_time: column(start_times, index),
            end_time: column(end_times, index),
            note: column(notes, index),
        })
        .collect()
}

/// Sequences loading, editing, rendering and delivery of one timesheet
pub struct Workflow {
    store: Arc<FileStore>,
    default_sheet: String,
    renderer: Renderer,
    mailer: Option<Arc<dyn SendTimesheet>>,
}

impl Workflow {
    pub fn new(store: Arc<FileStore>, default_sheet: impl Into<String>, renderer: Renderer) -> Self {
        Self {
            store,
            default_sheet: default_sheet.into(),
            renderer,
            mailer: None,
        }
    }

    /// Enable the email step
    pub fn with_mailer(mut self, mailer: Arc<dyn SendTimesheet>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    pub fn store(&self) -> &Arc<FileStore> {
        &self.store
    }

    pub fn default_sheet(&self) -> &str {
        &self.default_sheet
    }

    pub fn email_enabled(&self) -> bool {
        self.mailer.is_some()
    }

    /// Accept a freshly uploaded attendance export
    ///
    /// The default sheet is tried first. When it is missing the bytes are kept
    /// anyway and the user is asked to pick one of the sheets that do exist.
    pub fn upload(&self, data: Vec<u8>) -> Step {
        info!("Received file ({} bytes)", data.len());
        let sheet = self.default_sheet.clone();
        self.index_and_store(data, sheet)
    }

    /// Retry indexing a stored upload with a sheet picked by the user
    ///
    /// The result is stored under a new token; the old one stays valid until
    /// it expires.
    pub fn select_sheet(&self, file_token: &str, sheet_name: &str) -> Step {
        info!("User selected sheet: '{}'", sheet_name);

        let Some(source) = self.store.source(file_token) else {
            return Step::bad_request(Page::upload_error(
                "Invalid session. Please re-upload your file.",
            ));
        };

        self.index_and_store(source.data.clone(), sheet_name.to_string())
    }

    fn index_and_store(&self, data: Vec<u8>, sheet_name: String) -> Step {
        match loader::index(&data, &sheet_name) {
            Ok(index) => self.select_page(data, sheet_name, index),
            Err(LoadError::SheetNotFound {
                requested,
                available,
            }) => {
                let file_token = self.store.store_source(SourceRecord {
                    data,
                    names: Vec::new(),
                    months: Vec::new(),
                    sheet_name: String::new(),
                });
                Step::success(Page::SelectSheet(SelectSheetPage {
                    file_token: file_token.into(),
                    requested_sheet: requested,
                    available_sheets: available,
                    error: None,
                }))
            }
            Err(LoadError::NoSheetName) => {
                let available = loader::sheet_names(&data).unwrap_or_default();
                let file_token = self.store.store_source(SourceRecord {
                    data,
                    names: Vec::new(),
                    months: Vec::new(),
                    sheet_name: String::new(),
                });
                Step::bad_request(Page::SelectSheet(SelectSheetPage {
                    file_token: file_token.into(),
                    requested_sheet: self.default_sheet.clone(),
                    available_sheets: available,
                    error: Some("Please choose a sheet.".to_string()),
                }))
            }
            Err(e) => {
                warn!("Error parsing Excel file: {}", e);
                Step::bad_request(Page::upload_error(format!(
                    "Unable to parse Excel file: {}",
                    e
                )))
            }
        }
    }

    fn select_page(&self, data: Vec<u8>, sheet_name: String, index: SheetIndex) -> Step {
        let months = index.month_labels();
        let default_month = months.last().cloned().unwrap_or_default();
        let names = index.names;

        let file_token = self.store.store_source(SourceRecord {
            data,
            names: names.clone(),
            months: months.clone(),
            sheet_name,
        });

        Step::success(Page::Select(SelectPage {
            file_token: file_token.into(),
            names,
            months,
            default_month,
            error: None,
        }))
    }

    /// Load the rows of one person and month for editing
    ///
    /// A person without matching rows still gets one blank row to fill in.
    pub fn edit(&self, file_token: &str, name: &str, month: &str) -> Step {
        if file_token.is_empty() || name.is_empty() || month.is_empty() {
            return Step::bad_request(Page::upload_error("All fields are required."));
        }

        let Some(source) = self.store.source(file_token) else {
            return Step::bad_request(Page::upload_error(
                "Invalid session. Please re-upload your file.",
            ));
        };

        let select_error = |message: String| {
            Step::bad_request(Page::Select(SelectPage {
                file_token: file_token.to_string(),
                names: source.names.clone(),
                months: source.months.clone(),
                default_month: month.to_string(),
                error: Some(message),
            }))
        };

        let Some(month_number) = parse_month(month) else {
            return select_error("Invalid month selected.".to_string());
        };

        if !source.is_resolved() {
            return match loader::sheet_names(&source.data) {
                Ok(available) => Step::success(Page::SelectSheet(SelectSheetPage {
                    file_token: file_token.to_string(),
                    requested_sheet: self.default_sheet.clone(),
                    available_sheets: available,
                    error: None,
                })),
                Err(e) => Step::bad_request(Page::upload_error(format!(
                    "Unable to parse Excel file: {}",
                    e
                ))),
            };
        }

        let mut rows = match loader::extract(&source.data, &source.sheet_name, name, month_number) {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Failed to extract rows for {}: {}", name, e);
                return select_error(format!("Failed to extract data: {}", e));
            }
        };

        if rows.is_empty() {
            rows.push(TimesheetRow::blank());
        }

        Step::success(Page::Edit(EditPage {
            file_token: file_token.to_string(),
            name: name.to_string(),
            month: month.to_string(),
            rows,
            error: None,
        }))
    }

    /// Render the edited rows and keep the result for download
    ///
    /// # Returns
    /// * `Ok(Step)` - The download page, or the edit page with an error when the
    ///   submitted rows cannot be used
    /// * `Err(WorkflowError)` - The template is missing or broken
    pub fn process(&self, request: ProcessRequest) -> Result<Step, WorkflowError> {
        let ProcessRequest {
            file_token,
            name,
            month,
            rows,
        } = request;

        if file_token.is_empty() || name.is_empty() || month.is_empty() {
            return Ok(Step::bad_request(Page::upload_error(
                "Missing required fields.",
            )));
        }

        let Some(month_number) = parse_month(&month) else {
            return Ok(Step::bad_request(Page::upload_error("Invalid month value.")));
        };

        let edit_error = |rows: Vec<TimesheetRow>, message: String| {
            Step::bad_request(Page::Edit(EditPage {
                file_token: file_token.clone(),
                name: name.clone(),
                month: month.clone(),
                rows,
                error: Some(message),
            }))
        };

        if rows.is_empty() {
            return Ok(edit_error(
                vec![TimesheetRow::blank()],
                "Please enter at least one row of data.".to_string(),
            ));
        }

        let data = match self.renderer.render_bytes(&name, &rows) {
            Ok(data) => data,
            Err(e) if e.is_input_error() => return Ok(edit_error(rows, e.to_string())),
            Err(e) => return Err(e.into()),
        };

        let year = rows
            .iter()
            .find_map(TimesheetRow::parse_date)
            .map(|date| date.year())
            .unwrap_or_else(|| chrono::Local::now().year());
        let filename = output_filename(&name, month_number, year);

        let download_token = self.store.store_output(data, filename.clone());
        info!("Generated {} for {}", filename, name);

        Ok(Step::success(Page::Download(DownloadPage {
            download_token: download_token.into(),
            file_name: filename,
            file_token,
            name,
            month,
            email_enabled: self.email_enabled(),
            ..Default::default()
        })))
    }

    /// Hand out a generated timesheet; each token can be downloaded once
    pub fn download(&self, token: &str) -> Option<Arc<OutputRecord>> {
        self.store.take_output(token)
    }

    /// Mail a generated timesheet to the configured recipients
    ///
    /// The timesheet stays downloadable whether sending works or not, so a
    /// failed attempt can be retried.
    pub fn email(&self, request: EmailRequest) -> Step {
        let page = |error: Option<String>, email_sent: bool| {
            Page::Download(DownloadPage {
                download_token: request.download_token.clone(),
                file_name: request.file_name.clone(),
                file_token: request.file_token.clone(),
                name: request.name.clone(),
                month: request.month.clone(),
                email_enabled: self.email_enabled(),
                email_sent,
                send_to_self: request.send_to_self,
                user_email: request.user_email.clone(),
                error,
            })
        };

        let Some(mailer) = &self.mailer else {
            return Step {
                page: page(Some("Email service is not properly configured".to_string()), false),
                outcome: Outcome::Unavailable,
            };
        };

        if request.file_token.is_empty()
            || request.download_token.is_empty()
            || request.file_name.is_empty()
        {
            return Step::bad_request(Page::upload_error("Missing required fields"));
        }

        if request.send_to_self && !is_valid_email(&request.user_email) {
            return Step::bad_request(page(
                Some("Please enter a valid email address".to_string()),
                false,
            ));
        }

        let Some(output) = self.store.output(&request.download_token) else {
            return Step {
                page: Page::upload_error("File not found. It may have expired."),
                outcome: Outcome::NotFound,
            };
        };

        let mut cc = Vec::new();
        if request.send_to_self {
            cc.push(request.user_email.clone());
        }
        let mail = TimesheetMail {
            name: request.name.clone(),
            month: request.month.clone(),
            file_name: output.filename.clone(),
            data: output.data.clone(),
            cc,
        };

        match mailer.send_timesheet(&mail) {
            Ok(()) => {
                info!("Sent {} by email", output.filename);
                Step::success(page(None, true))
            }
            Err(e) => {
                error!("Error sending email: {}", e);
                Step::success(page(Some(format!("Failed to send email: {}", e)), false))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::MailError;
    use crate::store::DEFAULT_EXPIRY;
    use crate::template::build_default_template;
    use crate::testutil::{FIXTURE_SHEET, attendance_workbook, standard_events};
    use std::sync::Mutex;

    const DEFAULT_SHEET: &str = "docházka správců týmu";

    /// Records every mail and fails while `fail` is set
    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<TimesheetMail>>,
        fail: Mutex<bool>,
    }

    impl SendTimesheet for RecordingMailer {
        fn send_timesheet(&self, mail: &TimesheetMail) -> Result<(), MailError> {
            if *self.fail.lock().unwrap() {
                return Err(MailError::Send("connection refused".to_string()));
            }
            self.sent.lock().unwrap().push(mail.clone());
            Ok(())
        }
    }

    struct Fixture {
        workflow: Workflow,
        _dir: tempfile::TempDir,
    }

    fn fixture(default_sheet: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("template.xlsx");
        std::fs::write(&template, build_default_template().unwrap()).unwrap();

        let store = Arc::new(FileStore::new(DEFAULT_EXPIRY));
        Fixture {
            workflow: Workflow::new(store, default_sheet, Renderer::new(template)),
            _dir: dir,
        }
    }

    fn upload_fixture(workflow: &Workflow) -> SelectPage {
        let data = attendance_workbook(FIXTURE_SHEET, &standard_events());
        match workflow.upload(data).page {
            Page::Select(page) => page,
            other => panic!("expected select page, got {:?}", other),
        }
    }

    fn generate(workflow: &Workflow) -> DownloadPage {
        let select = upload_fixture(workflow);
        let step = workflow
            .process(ProcessRequest {
                file_token: select.file_token,
                name: "Test User".to_string(),
                month: "1".to_string(),
                rows: vec![TimesheetRow::new("2023-01-15", "18:00", "20:00", "Team Practice")],
            })
            .unwrap();
        match step.page {
            Page::Download(page) => page,
            other => panic!("expected download page, got {:?}", other),
        }
    }

    #[test]
    fn full_round_trip() {
        let fixture = fixture(FIXTURE_SHEET);
        let workflow = &fixture.workflow;

        let select = upload_fixture(workflow);
        assert_eq!(select.names, vec!["Another User", "Test User"]);
        assert_eq!(select.months, vec!["1", "2"]);
        assert_eq!(select.default_month, "2");

        let step = workflow.edit(&select.file_token, "Test User", "1");
        assert_eq!(step.outcome, Outcome::Success);
        let Page::Edit(edit) = step.page else {
            panic!("expected edit page");
        };
        assert_eq!(edit.rows.len(), 2);
        assert_eq!(edit.rows[0].note, "Team Practice");

        let step = workflow
            .process(ProcessRequest {
                file_token: edit.file_token,
                name: edit.name,
                month: edit.month,
                rows: edit.rows,
            })
            .unwrap();
        let Page::Download(download) = step.page else {
            panic!("expected download page");
        };
        assert_eq!(
            download.file_name,
            "Gorily_vykaz-prace_012023_User_Test.xlsx"
        );
        assert!(!download.email_enabled);

        let output = workflow.download(&download.download_token).unwrap();
        assert_eq!(output.filename, download.file_name);
        assert!(!output.data.is_empty());
        assert!(workflow.download(&download.download_token).is_none());
    }

    #[test]
    fn missing_default_sheet_asks_for_another() {
        let fixture = fixture(DEFAULT_SHEET);
        let workflow = &fixture.workflow;
        let data = attendance_workbook(FIXTURE_SHEET, &standard_events());

        let step = workflow.upload(data);
        assert_eq!(step.outcome, Outcome::Success);
        let Page::SelectSheet(page) = step.page else {
            panic!("expected sheet selection");
        };
        assert_eq!(page.requested_sheet, DEFAULT_SHEET);
        assert_eq!(page.available_sheets, vec![FIXTURE_SHEET.to_string()]);

        // Skipping ahead with an unresolved upload leads back to sheet selection
        let step = workflow.edit(&page.file_token, "Test User", "1");
        assert!(matches!(step.page, Page::SelectSheet(_)));

        let step = workflow.select_sheet(&page.file_token, FIXTURE_SHEET);
        let Page::Select(select) = step.page else {
            panic!("expected select page");
        };
        assert_ne!(select.file_token, page.file_token);
        assert_eq!(select.names, vec!["Another User", "Test User"]);

        let resolved = workflow.store().source(&select.file_token).unwrap();
        assert_eq!(resolved.sheet_name, FIXTURE_SHEET);
        // The abandoned token still resolves to the unresolved upload
        assert!(!workflow.store().source(&page.file_token).unwrap().is_resolved());
    }

    #[test]
    fn selecting_another_missing_sheet_issues_new_token() {
        let fixture = fixture(DEFAULT_SHEET);
        let workflow = &fixture.workflow;
        let data = attendance_workbook(FIXTURE_SHEET, &standard_events());
        let Page::SelectSheet(first) = workflow.upload(data).page else {
            panic!("expected sheet selection");
        };

        let Page::SelectSheet(second) = workflow.select_sheet(&first.file_token, "List1").page
        else {
            panic!("expected sheet selection");
        };
        assert_eq!(second.requested_sheet, "List1");
        assert_ne!(second.file_token, first.file_token);
    }

    #[test]
    fn garbage_upload_is_rejected() {
        let fixture = fixture(DEFAULT_SHEET);
        let step = fixture.workflow.upload(b"definitely not xlsx".to_vec());
        assert_eq!(step.outcome, Outcome::BadRequest);
        assert!(matches!(step.page, Page::Upload(_)));
        assert!(step.page.error().unwrap().starts_with("Unable to parse Excel file"));
    }

    #[test]
    fn unknown_tokens_send_the_user_back_to_upload() {
        let fixture = fixture(FIXTURE_SHEET);
        let workflow = &fixture.workflow;

        for step in [
            workflow.select_sheet("0123456789abcdef0123456789abcdef", FIXTURE_SHEET),
            workflow.edit("0123456789abcdef0123456789abcdef", "Test User", "1"),
        ] {
            assert_eq!(step.outcome, Outcome::BadRequest);
            assert_eq!(
                step.page.error(),
                Some("Invalid session. Please re-upload your file.")
            );
        }
        assert!(workflow.download("0123456789abcdef0123456789abcdef").is_none());
    }

    #[test]
    fn edit_validates_its_fields() {
        let fixture = fixture(FIXTURE_SHEET);
        let workflow = &fixture.workflow;
        let select = upload_fixture(workflow);

        let step = workflow.edit(&select.file_token, "", "1");
        assert_eq!(step.page.error(), Some("All fields are required."));

        let step = workflow.edit(&select.file_token, "Test User", "13");
        let Page::Select(page) = step.page else {
            panic!("expected select page");
        };
        assert_eq!(page.error.as_deref(), Some("Invalid month selected."));
        assert_eq!(page.names, select.names);
        assert_eq!(page.default_month, "13");
    }

    #[test]
    fn person_without_rows_gets_one_blank_row() {
        let fixture = fixture(FIXTURE_SHEET);
        let workflow = &fixture.workflow;
        let select = upload_fixture(workflow);

        let Page::Edit(edit) = workflow.edit(&select.file_token, "Another User", "1").page else {
            panic!("expected edit page");
        };
        assert_eq!(edit.rows, vec![TimesheetRow::blank()]);
    }

    #[test]
    fn process_reports_bad_rows_on_the_edit_page() {
        let fixture = fixture(FIXTURE_SHEET);
        let workflow = &fixture.workflow;
        let select = upload_fixture(workflow);

        let request = |rows: Vec<TimesheetRow>| ProcessRequest {
            file_token: select.file_token.clone(),
            name: "Test User".to_string(),
            month: "1".to_string(),
            rows,
        };

        let step = workflow.process(request(Vec::new())).unwrap();
        assert_eq!(step.outcome, Outcome::BadRequest);
        assert_eq!(
            step.page.error(),
            Some("Please enter at least one row of data.")
        );

        let rows = vec![TimesheetRow::new("2023-01-15", "6pm", "20:00", "Practice")];
        let step = workflow.process(request(rows.clone())).unwrap();
        let Page::Edit(edit) = step.page else {
            panic!("expected edit page");
        };
        assert_eq!(edit.rows, rows);
        assert!(edit.error.unwrap().contains("6pm"));
        assert!(workflow.store().outputs().is_empty());

        let step = workflow
            .process(ProcessRequest {
                month: "0".to_string(),
                ..request(rows)
            })
            .unwrap();
        assert_eq!(step.page.error(), Some("Invalid month value."));
    }

    #[test]
    fn missing_template_is_an_internal_error() {
        let store = Arc::new(FileStore::new(DEFAULT_EXPIRY));
        let workflow = Workflow::new(store, FIXTURE_SHEET, Renderer::new("/nonexistent.xlsx"));
        let select = upload_fixture(&workflow);

        let result = workflow.process(ProcessRequest {
            file_token: select.file_token,
            name: "Test User".to_string(),
            month: "1".to_string(),
            rows: vec![TimesheetRow::new("2023-01-15", "18:00", "20:00", "")],
        });
        assert!(matches!(result, Err(WorkflowError::Render(_))));
    }

    #[test]
    fn filename_year_falls_back_to_current_year() {
        let fixture = fixture(FIXTURE_SHEET);
        let workflow = &fixture.workflow;
        let select = upload_fixture(workflow);

        let step = workflow
            .process(ProcessRequest {
                file_token: select.file_token,
                name: "Test User".to_string(),
                month: "3".to_string(),
                rows: vec![TimesheetRow::blank()],
            })
            .unwrap();
        let Page::Download(download) = step.page else {
            panic!("expected download page");
        };
        let year = chrono::Local::now().year();
        assert_eq!(
            download.file_name,
            format!("Gorily_vykaz-prace_03{}_User_Test.xlsx", year)
        );
    }

    #[test]
    fn email_requires_a_mailer() {
        let fixture = fixture(FIXTURE_SHEET);
        let download = generate(&fixture.workflow);

        let step = fixture.workflow.email(EmailRequest {
            file_token: download.file_token,
            download_token: download.download_token,
            file_name: download.file_name,
            ..Default::default()
        });
        assert_eq!(step.outcome, Outcome::Unavailable);
        assert!(matches!(step.page, Page::Download(_)));
    }

    #[test]
    fn failed_email_can_be_retried_and_downloaded() {
        let mailer = Arc::new(RecordingMailer::default());
        let fixture = fixture(FIXTURE_SHEET);
        let workflow = fixture.workflow.with_mailer(mailer.clone());
        let download = generate(&workflow);
        assert!(download.email_enabled);

        let request = EmailRequest {
            file_token: download.file_token.clone(),
            download_token: download.download_token.clone(),
            file_name: download.file_name.clone(),
            name: "Test User".to_string(),
            month: "1".to_string(),
            user_email: "test@example.com".to_string(),
            send_to_self: true,
        };

        *mailer.fail.lock().unwrap() = true;
        let Page::Download(page) = workflow.email(request.clone()).page else {
            panic!("expected download page");
        };
        assert!(!page.email_sent);
        assert!(page.error.unwrap().starts_with("Failed to send email"));

        *mailer.fail.lock().unwrap() = false;
        let Page::Download(page) = workflow.email(request).page else {
            panic!("expected download page");
        };
        assert!(page.email_sent);
        assert_eq!(page.error, None);

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].cc, vec!["test@example.com".to_string()]);
        assert_eq!(sent[0].file_name, download.file_name);

        assert!(workflow.download(&download.download_token).is_some());
    }

    #[test]
    fn email_rejects_invalid_own_address() {
        let mailer = Arc::new(RecordingMailer::default());
        let fixture = fixture(FIXTURE_SHEET);
        let workflow = fixture.workflow.with_mailer(mailer.clone());
        let download = generate(&workflow);

        let step = workflow.email(EmailRequest {
            file_token: download.file_token,
            download_token: download.download_token,
            file_name: download.file_name,
            user_email: "nobody".to_string(),
            send_to_self: true,
            ..Default::default()
        });
        assert_eq!(step.outcome, Outcome::BadRequest);
        assert_eq!(step.page.error(), Some("Please enter a valid email address"));
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn email_for_expired_output_is_not_found() {
        let mailer = Arc::new(RecordingMailer::default());
        let fixture = fixture(FIXTURE_SHEET);
        let workflow = fixture.workflow.with_mailer(mailer);
        let download = generate(&workflow);
        workflow.store().delete_output(&download.download_token);

        let step = workflow.email(EmailRequest {
            file_token: download.file_token,
            download_token: download.download_token,
            file_name: download.file_name,
            ..Default::default()
        });
        assert_eq!(step.outcome, Outcome::NotFound);
    }

    #[test]
    fn form_columns_are_padded() {
        let strings = |values: &[&str]| values.iter().map(|v| v.to_string()).collect::<Vec<_>>();
        let rows = rows_from_columns(
            &strings(&["2023-01-15", "2023-01-16"]),
            &strings(&["18:00", "08:00"]),
            &strings(&["20:00"]),
            &[],
        );
        assert_eq!(
            rows,
            vec![
                TimesheetRow::new("2023-01-15", "18:00", "20:00", ""),
                TimesheetRow::new("2023-01-16", "08:00", "", ""),
            ]
        );
    }
}
