#![cfg(not(tarpaulin_include))]

use timesheet_filler::{Config, app};

/// Main entry point for the web application
///
/// Reads the configuration from `TIMESHEET_*` environment variables and serves
/// the timesheet wizard until interrupted.
///
/// # Logging
/// * Defaults to the `info` level; override with `RUST_LOG`
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::load()?;
    log::info!(
        "Starting timesheet filler with template {} and sheet '{}'",
        config.template_path.display(),
        config.sheet_name
    );

    app::run(config).await
}
