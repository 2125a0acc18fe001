//! Ask command: run one question through the answer workflow

use crate::app::{AskArgs, OutputFormat};
use crate::output::{format_response, FormatOptions};
use anyhow::Result;
use filinglens_core::workflow::WorkflowController;
use filinglens_core::{
    CancelToken, ChromaRetriever, Config, HttpEmbedder, HttpJargonTranslator, HttpQueryRewriter,
    HttpRelevanceGrader, HttpSynthesizer, LLMClient, VLLMClient,
};
use std::sync::Arc;

pub async fn run(args: AskArgs, mut config: Config, format: OutputFormat, verbose: bool) -> Result<()> {
    let question = args.question.join(" ");

    if args.strict {
        config.workflow.strict = true;
    }
    if let Some(max_rewrites) = args.max_rewrites {
        config.workflow.max_rewrites = max_rewrites;
    }
    let top_k = args.top_k.unwrap_or(config.retriever.top_k);

    // One shared client for grading, rewriting, translation, synthesis, and
    // query embedding
    let client: Arc<VLLMClient> = Arc::new(VLLMClient::new(config.llm_service.clone())?);
    let llm: Arc<dyn LLMClient> = client.clone();

    let embedder = Arc::new(HttpEmbedder::new(llm.clone()));
    let retriever = Arc::new(ChromaRetriever::new(config.retriever.clone(), embedder)?);

    let (progress_tx, mut progress_rx) = tokio::sync::mpsc::unbounded_channel();

    let controller = WorkflowController::new(
        retriever,
        Arc::new(HttpRelevanceGrader::new(llm.clone())),
        Arc::new(HttpQueryRewriter::new(llm.clone())),
        Arc::new(HttpJargonTranslator::new(llm.clone())),
        Arc::new(HttpSynthesizer::new(llm.clone())),
        config.workflow.clone(),
    )
    .with_top_k(top_k)
    .with_progress(progress_tx);

    // Ctrl-C stops the workflow between stages
    let cancel = CancelToken::new();
    let controller = controller.with_cancellation(cancel.clone());
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    // Render stage transitions to stderr while the workflow runs
    let progress_task = tokio::spawn(async move {
        while let Some(stage) = progress_rx.recv().await {
            eprintln!("... {}", stage);
        }
    });

    let response = controller.run(&question).await;
    drop(controller);
    let _ = progress_task.await;

    let response = response?;

    let options = FormatOptions {
        show_sources: !args.no_sources,
    };
    print!("{}", format_response(&response, format, &options));

    if verbose {
        let metrics = client.metrics();
        eprintln!(
            "LLM calls: {} ({} errors, {:.0}% cache hits, {:.0} ms avg)",
            metrics.total_requests,
            metrics.total_errors,
            metrics.cache_hit_rate,
            metrics.avg_latency_ms
        );
    }

    Ok(())
}
