use axum::{
    Json, Router,
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use log::{error, info, warn};
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;

use crate::config::Config;
use crate::mailer::{Mailer, XLSX_CONTENT_TYPE};
use crate::renderer::Renderer;
use crate::store::{FileStore, Sweeper};
use crate::views::{ViewError, Views};
use crate::workflow::{
    EmailRequest, Outcome, Page, ProcessRequest, Step, UploadPage, Workflow, WorkflowError,
    rows_from_columns,
};

/// Form field carrying the uploaded attendance export
const UPLOAD_FIELD: &str = "excelFile";

pub struct AppState {
    workflow: Arc<Workflow>,
    views: Views,
    ready: AtomicBool,
}

impl AppState {
    pub fn new(workflow: Workflow) -> Result<Self, ViewError> {
        Ok(Self {
            workflow: Arc::new(workflow),
            views: Views::new()?,
            ready: AtomicBool::new(true),
        })
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn render(&self, step: Step) -> Response {
        let status = match step.outcome {
            Outcome::Success => StatusCode::OK,
            Outcome::BadRequest => StatusCode::BAD_REQUEST,
            Outcome::NotFound => StatusCode::NOT_FOUND,
            Outcome::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        };

        match self.views.render(&step.page) {
            Ok(html) => (status, Html(html)).into_response(),
            Err(e) => {
                error!("Error rendering page: {}", e);
                internal_error()
            }
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct SelectSheetForm {
    file_token: String,
    sheet_name: String,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct EditForm {
    file_token: String,
    name: String,
    month: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct ProcessForm {
    #[serde(rename = "fileToken")]
    file_token: String,
    name: String,
    month: String,
    #[serde(rename = "date[]")]
    dates: Vec<String>,
    #[serde(rename = "start_time[]")]
    start_times: Vec<String>,
    #[serde(rename = "end_time[]")]
    end_times: Vec<String>,
    #[serde(rename = "note[]")]
    notes: Vec<String>,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct EmailForm {
    file_token: String,
    download_token: String,
    file_name: String,
    name: String,
    month: String,
    user_email: String,
    send_to_self: String,
}

/// Build the router with every wizard step and the health probes
///
/// # Arguments
/// * `state` - Shared application state
/// * `max_upload_size` - Largest accepted request body in bytes
pub fn router(state: Arc<AppState>, max_upload_size: usize) -> Router {
    Router::new()
        .route("/", get(upload_form))
        .route("/upload", post(upload))
        .route("/select-sheet", post(select_sheet))
        .route("/edit", post(edit))
        .route("/process", post(process))
        .route("/download/:token", get(download))
        .route("/send-email", post(send_email))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_size))
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

/// Start the web server and serve until Ctrl-C or SIGTERM
///
/// On shutdown the readiness probe starts failing, in-flight requests are
/// drained and the expiry sweeper is stopped.
pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(FileStore::new(config.token_expiry()));

    if !config.template_path.exists() {
        warn!(
            "Template file {} does not exist; generating timesheets will fail",
            config.template_path.display()
        );
    }

    let mut workflow = Workflow::new(
        Arc::clone(&store),
        config.sheet_name.clone(),
        Renderer::new(&config.template_path),
    );
    if config.email_configured() {
        workflow = workflow.with_mailer(Arc::new(Mailer::from_config(&config)?));
        info!("Email delivery enabled via {}", config.smtp_host);
    } else if config.email_enabled {
        warn!("Email is enabled but SMTP host, sender or recipients are missing; email is disabled");
    }

    let state = Arc::new(AppState::new(workflow)?);
    let sweeper = Sweeper::spawn(Arc::clone(&store), config.sweep_interval());
    let app = router(Arc::clone(&state), config.max_upload_size);

    let addr = config.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    let shutdown_state = Arc::clone(&state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            info!("Shutting down");
            shutdown_state.set_ready(false);
        })
        .await?;

    sweeper.shutdown().await;
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    info!(
        "{} {} {} {:?}",
        method,
        path,
        response.status().as_u16(),
        started.elapsed()
    );
    response
}

fn internal_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}

/// Run a workflow step on the blocking pool and render its page
async fn run_step<F>(state: Arc<AppState>, step: F) -> Response
where
    F: FnOnce(&Workflow) -> Result<Step, WorkflowError> + Send + 'static,
{
    let workflow = Arc::clone(&state.workflow);
    match tokio::task::spawn_blocking(move || step(&workflow)).await {
        Ok(Ok(step)) => state.render(step),
        Ok(Err(e)) => {
            error!("Error processing Excel file: {}", e);
            internal_error()
        }
        Err(e) => {
            error!("Worker task failed: {}", e);
            internal_error()
        }
    }
}

async fn upload_form(State(state): State<Arc<AppState>>) -> Response {
    state.render(Step {
        page: Page::Upload(UploadPage::default()),
        outcome: Outcome::Success,
    })
}

async fn upload(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> Response {
    let mut data = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some(UPLOAD_FIELD) {
                    continue;
                }
                info!("Received file: {}", field.file_name().unwrap_or("unnamed"));
                match field.bytes().await {
                    Ok(bytes) => data = Some(bytes.to_vec()),
                    Err(e) => {
                        warn!("Error reading uploaded file: {}", e);
                        return upload_error(&state, "Bad Request: Unable to read file.");
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Error parsing form data: {}", e);
                return upload_error(&state, "Bad Request: Unable to parse form data.");
            }
        }
    }

    let Some(data) = data.filter(|data| !data.is_empty()) else {
        return upload_error(&state, "Bad Request: Unable to retrieve file.");
    };

    run_step(state, move |workflow| Ok(workflow.upload(data))).await
}

fn upload_error(state: &AppState, message: &str) -> Response {
    state.render(Step {
        page: Page::Upload(UploadPage {
            error: Some(message.to_string()),
        }),
        outcome: Outcome::BadRequest,
    })
}

async fn select_sheet(
    State(state): State<Arc<AppState>>,
    axum::Form(form): axum::Form<SelectSheetForm>,
) -> Response {
    run_step(state, move |workflow| {
        Ok(workflow.select_sheet(&form.file_token, &form.sheet_name))
    })
    .await
}

async fn edit(
    State(state): State<Arc<AppState>>,
    axum::Form(form): axum::Form<EditForm>,
) -> Response {
    run_step(state, move |workflow| {
        Ok(workflow.edit(&form.file_token, &form.name, &form.month))
    })
    .await
}

async fn process(
    State(state): State<Arc<AppState>>,
    axum_extra::extract::Form(form): axum_extra::extract::Form<ProcessForm>,
) -> Response {
    let request = ProcessRequest {
        rows: rows_from_columns(&form.dates, &form.start_times, &form.end_times, &form.notes),
        file_token: form.file_token,
        name: form.name,
        month: form.month,
    };

    run_step(state, move |workflow| workflow.process(request)).await
}

async fn download(State(state): State<Arc<AppState>>, Path(token): Path<String>) -> Response {
    let Some(output) = state.workflow.download(&token) else {
        return (StatusCode::NOT_FOUND, "File Not Found").into_response();
    };

    let filename = output.filename.clone();
    let data = Arc::try_unwrap(output)
        .map(|output| output.data)
        .unwrap_or_else(|shared| shared.data.clone());

    (
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        Body::from(data),
    )
        .into_response()
}

async fn send_email(
    State(state): State<Arc<AppState>>,
    axum::Form(form): axum::Form<EmailForm>,
) -> Response {
    let request = EmailRequest {
        file_token: form.file_token,
        download_token: form.download_token,
        file_name: form.file_name,
        name: form.name,
        month: form.month,
        user_email: form.user_email,
        send_to_self: form.send_to_self == "true",
    };

    run_step(state, move |workflow| Ok(workflow.email(request))).await
}

async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn readyz(State(state): State<Arc<AppState>>) -> Response {
    if state.is_ready() {
        Json(serde_json::json!({ "status": "ready" })).into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "not ready" })),
        )
            .into_response()
    }
}
