//! Self-contained HTML report

use std::fs;
use std::path::Path;

use tera::{Context, Tera};

use super::runner::RunOutput;
use crate::errors::{Result, RunnerError};

const TEMPLATE: &str = include_str!("templates/report.html");

/// Render the run as a single HTML page
pub fn render_html(output: &RunOutput) -> Result<String> {
    let mut context = Context::from_serialize(output)
        .map_err(|e| RunnerError::Config(format!("Failed to build report context: {}", e)))?;
    context.insert("title", "Collection run report");
    context.insert("generated", &chrono::Utc::now().to_rfc3339());

    Tera::one_off(TEMPLATE, &context, true)
        .map_err(|e| RunnerError::Config(format!("Failed to render HTML report: {}", e)))
}

pub fn write_html(output: &RunOutput, path: &Path) -> Result<()> {
    fs::write(path, render_html(output)?)?;
    Ok(())
}
