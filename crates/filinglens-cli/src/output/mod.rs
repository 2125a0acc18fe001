//! Output formatters

pub mod json;
pub mod terminal;

use crate::app::OutputFormat;
use filinglens_core::FinalResponse;

/// Format options
pub struct FormatOptions {
    pub show_sources: bool,
}

/// Format a workflow response
pub fn format_response(
    response: &FinalResponse,
    format: OutputFormat,
    options: &FormatOptions,
) -> String {
    match format {
        OutputFormat::Json => json::format_response(response, options),
        OutputFormat::Cli => terminal::format_response(response, options),
    }
}
