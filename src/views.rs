use crate::workflow::Page;
use chrono::Datelike;
use handlebars::Handlebars;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("invalid page template: {0}")]
    Template(#[from] handlebars::TemplateError),

    #[error("failed to render page: {0}")]
    Render(#[from] handlebars::RenderError),
}

const LAYOUT: &str = include_str!("./static/layout.hbs");

const PAGES: [(&str, &str); 5] = [
    ("upload", include_str!("./static/upload.hbs")),
    ("select_sheet", include_str!("./static/select_sheet.hbs")),
    ("select", include_str!("./static/select.hbs")),
    ("edit", include_str!("./static/edit.hbs")),
    ("download", include_str!("./static/download.hbs")),
];

#[derive(Serialize)]
struct Context<'a, T> {
    year: i32,
    #[serde(flatten)]
    page: &'a T,
}

/// HTML rendering of the wizard pages
///
/// Templates are compiled into the binary and registered once at startup.
pub struct Views {
    registry: Handlebars<'static>,
}

impl Views {
    pub fn new() -> Result<Self, ViewError> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(false);
        registry.register_partial("layout", LAYOUT)?;
        for (name, source) in PAGES {
            registry.register_template_string(name, source)?;
        }
        Ok(Self { registry })
    }

    /// Render a page to a complete HTML document
    pub fn render(&self, page: &Page) -> Result<String, ViewError> {
        match page {
            Page::Upload(data) => self.render_template("upload", data),
            Page::SelectSheet(data) => self.render_template("select_sheet", data),
            Page::Select(data) => self.render_template("select", data),
            Page::Edit(data) => self.render_template("edit", data),
            Page::Download(data) => self.render_template("download", data),
        }
    }

    fn render_template<T: Serialize>(&self, name: &str, page: &T) -> Result<String, ViewError> {
        let context = Context {
            year: chrono::Local::now().year(),
            page,
        };
        Ok(self.registry.render(name, &context)?)
    }
}
