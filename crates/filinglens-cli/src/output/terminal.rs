//! Terminal output formatter

use super::FormatOptions;
use filinglens_core::FinalResponse;

pub fn format_response(response: &FinalResponse, options: &FormatOptions) -> String {
    let mut output = String::new();

    output.push_str(response.answer.trim());
    output.push('\n');

    if !response.jargon.is_empty() {
        output.push_str("\nJargon explained:\n");
        for entry in response.jargon.iter() {
            output.push_str(&format!("  {}: {}\n", entry.term, entry.analogy));
        }
    }

    if options.show_sources && !response.sources.is_empty() {
        output.push_str("\nSources:\n");
        for source in &response.sources {
            let score_pct = (source.score * 100.0) as u32;
            output.push_str(&format!("  {:>3}% {}\n", score_pct, source.source.label()));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use filinglens_core::{ChunkSource, JargonMap, RetrievedChunk};

    fn response() -> FinalResponse {
        let mut jargon = JargonMap::new();
        jargon.insert("EBITDA", "Profit before some subtractions.");

        FinalResponse {
            answer: "Revenue was $394.3 billion.".to_string(),
            jargon,
            sources: vec![RetrievedChunk {
                id: "c1".to_string(),
                text: "Total revenue was $394.3 billion.".to_string(),
                source: ChunkSource {
                    ticker: Some("AAPL".to_string()),
                    year: Some("2023".to_string()),
                    quarter: Some("FY".to_string()),
                    form_type: Some("10-K".to_string()),
                    source: None,
                },
                score: 0.91,
            }],
        }
    }

    #[test]
    fn test_format_with_sources() {
        let out = format_response(&response(), &FormatOptions { show_sources: true });
        assert!(out.starts_with("Revenue was $394.3 billion.\n"));
        assert!(out.contains("EBITDA: Profit before some subtractions."));
        assert!(out.contains("91% AAPL 10-K 2023"));
    }

    #[test]
    fn test_format_without_sources() {
        let out = format_response(&response(), &FormatOptions { show_sources: false });
        assert!(!out.contains("Sources:"));
    }
}
