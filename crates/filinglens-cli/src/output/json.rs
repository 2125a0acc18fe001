//! JSON output formatter

use super::FormatOptions;
use filinglens_core::FinalResponse;
use serde::Serialize;

#[derive(Serialize)]
struct JsonResponse<'a> {
    answer: &'a str,
    jargon: &'a filinglens_core::JargonMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    sources: Option<&'a [filinglens_core::RetrievedChunk]>,
}

pub fn format_response(response: &FinalResponse, options: &FormatOptions) -> String {
    let json = JsonResponse {
        answer: &response.answer,
        jargon: &response.jargon,
        sources: options.show_sources.then_some(response.sources.as_slice()),
    };

    let mut output =
        serde_json::to_string_pretty(&json).unwrap_or_else(|_| "{}".to_string());
    output.push('\n');
    output
}
