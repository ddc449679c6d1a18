use std::env;
use std::path::PathBuf;
use timesheet_filler::{Config, template};

/// Writes the stock timesheet template
///
/// The target path is the first argument, or the configured template path when
/// no argument is given.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = match env::args().nth(1) {
        Some(path) => PathBuf::from(path),
        None => Config::load()?.template_path,
    };

    template::write_default_template(&path)?;
    println!("Template written to {}", path.display());

    Ok(())
}
