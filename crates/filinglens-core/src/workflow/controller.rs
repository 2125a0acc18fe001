//! Workflow controller
//!
//! Sequences retrieval, grading, rewriting, translation, and synthesis as an
//! explicit step loop. The rewrite ceiling is a hard cap: every path through
//! the loop either reaches `Done` or fails, and a stuck rewriter (duplicate
//! query) short-circuits to the ceiling policy instead of retrieving again.

use super::{
    decide, CancelToken, Decision, FinalResponse, WorkflowStage, WorkflowState,
    INSUFFICIENT_EVIDENCE_ANSWER,
};
use crate::config::WorkflowConfig;
use crate::error::{FilingLensError, Result};
use crate::llm::{
    JargonMap, JargonTranslator, QueryRewriter, RelevanceGrader, RewriteRequest, Synthesizer,
};
use crate::retrieval::{RetrievedChunk, Retriever};
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

/// In-flight grade calls per GRADING stage
const GRADING_CONCURRENCY: usize = 4;

/// Tagged step variants; each loop iteration consumes one and produces the
/// next
enum Step {
    Retrieve,
    Grade(Vec<RetrievedChunk>),
    Decide,
    Rewrite,
    Translate,
    Synthesize(JargonMap),
    Done(FinalResponse),
}

/// Drives one question through the retrieval/grading/rewriting loop to a
/// final response
pub struct WorkflowController {
    retriever: Arc<dyn Retriever>,
    grader: Arc<dyn RelevanceGrader>,
    rewriter: Arc<dyn QueryRewriter>,
    translator: Arc<dyn JargonTranslator>,
    synthesizer: Arc<dyn Synthesizer>,
    config: WorkflowConfig,
    top_k: usize,
    progress: Option<UnboundedSender<WorkflowStage>>,
    cancel: CancelToken,
}

impl WorkflowController {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        grader: Arc<dyn RelevanceGrader>,
        rewriter: Arc<dyn QueryRewriter>,
        translator: Arc<dyn JargonTranslator>,
        synthesizer: Arc<dyn Synthesizer>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            retriever,
            grader,
            rewriter,
            translator,
            synthesizer,
            config,
            top_k: 4,
            progress: None,
            cancel: CancelToken::new(),
        }
    }

    /// Candidate chunks fetched per retrieval round
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Observe stage transitions; notification only, dropped receivers are
    /// ignored
    pub fn with_progress(mut self, sender: UnboundedSender<WorkflowStage>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Attach an external cancellation signal
    pub fn with_cancellation(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Answer one question
    ///
    /// Fails with `RetrieverUnavailable` or `Upstream` on unrecoverable
    /// collaborator errors, and with `NoEvidenceFound` when strict mode is on
    /// and the ceiling is exhausted without any relevant evidence.
    pub async fn run(&self, question: &str) -> Result<FinalResponse> {
        let mut state = WorkflowState::new(question);
        let mut step = Step::Retrieve;
        let mut last_stage = WorkflowStage::Retrieving;

        loop {
            if self.cancel.is_cancelled() {
                tracing::info!("Workflow cancelled after {}", last_stage);
                return Err(FilingLensError::Cancelled { stage: last_stage });
            }

            step = match step {
                Step::Retrieve => {
                    last_stage = self.emit(WorkflowStage::Retrieving);
                    let candidates = self.retrieve(&state).await?;
                    tracing::info!(
                        "Retrieved {} candidate chunks for query {:?}",
                        candidates.len(),
                        state.current_query
                    );
                    Step::Grade(candidates)
                }

                Step::Grade(candidates) => {
                    last_stage = self.emit(WorkflowStage::Grading);
                    let relevant = self.grade_candidates(&state, candidates).await?;
                    tracing::info!("{} chunks passed the relevance filter", relevant.len());
                    state.accumulate(relevant);
                    Step::Decide
                }

                Step::Decide => {
                    last_stage = self.emit(WorkflowStage::Deciding);
                    match decide(state.relevant_chunks.len(), state.rewrites, &self.config) {
                        Decision::Proceed => Step::Translate,
                        Decision::Rewrite => Step::Rewrite,
                        Decision::Exhausted => self.apply_ceiling_policy(&state)?,
                    }
                }

                Step::Rewrite => {
                    last_stage = self.emit(WorkflowStage::Rewriting);
                    match self.rewrite_query(&state).await? {
                        Some(query) => {
                            tracing::info!("Rewriting query to {:?}", query);
                            state.apply_rewrite(query);
                            debug_assert!(state.rewrites <= self.config.max_rewrites);
                            Step::Retrieve
                        }
                        // Stuck rewriter: same query again means retrieval
                        // would return the same results forever.
                        None => {
                            tracing::warn!(
                                "Rewriter repeated an already-used query, treating ceiling as reached"
                            );
                            self.apply_ceiling_policy(&state)?
                        }
                    }
                }

                Step::Translate => {
                    last_stage = self.emit(WorkflowStage::Translating);
                    let jargon = self.translate_jargon(&state).await?;
                    Step::Synthesize(jargon)
                }

                Step::Synthesize(jargon) => {
                    last_stage = self.emit(WorkflowStage::Synthesizing);
                    let answer = self.synthesize_answer(&state, &jargon).await?;
                    self.emit(WorkflowStage::Done);
                    Step::Done(FinalResponse {
                        answer,
                        jargon,
                        sources: state.relevant_chunks.clone(),
                    })
                }

                Step::Done(response) => return Ok(response),
            };
        }
    }

    /// Ceiling policy: with zero evidence, strict mode fails and lenient mode
    /// degrades to a canned answer; with partial evidence both modes proceed
    /// to synthesis with what exists
    fn apply_ceiling_policy(&self, state: &WorkflowState) -> Result<Step> {
        if state.relevant_chunks.is_empty() && self.config.strict {
            return Err(FilingLensError::NoEvidenceFound {
                rewrites: state.rewrites,
            });
        }
        Ok(Step::Translate)
    }

    async fn retrieve(&self, state: &WorkflowState) -> Result<Vec<RetrievedChunk>> {
        self.call_stage(
            WorkflowStage::Retrieving,
            self.config.retrieval_timeout(),
            self.retriever.search(&state.current_query, self.top_k),
        )
        .await
    }

    /// Grade candidates concurrently, then merge verdicts back in candidate
    /// order so accumulation order is reproducible
    async fn grade_candidates(
        &self,
        state: &WorkflowState,
        candidates: Vec<RetrievedChunk>,
    ) -> Result<Vec<RetrievedChunk>> {
        let query = state.current_query.clone();
        let timeout = self.config.grading_timeout();

        let mut graded: Vec<(usize, RetrievedChunk, Result<bool>)> =
            stream::iter(candidates.into_iter().enumerate())
                .map(|(idx, chunk)| {
                    let grader = Arc::clone(&self.grader);
                    let query = query.clone();
                    async move {
                        let verdict =
                            match tokio::time::timeout(timeout, grader.grade(&query, &chunk)).await
                            {
                                Ok(Ok(verdict)) => Ok(verdict.is_relevant),
                                // Fail safe: a malformed verdict discards one
                                // chunk, not the whole run.
                                Ok(Err(FilingLensError::GradingParse(msg))) => {
                                    tracing::warn!(
                                        "Grading parse failure, treating chunk as irrelevant: {}",
                                        msg
                                    );
                                    Ok(false)
                                }
                                Ok(Err(e)) => Err(FilingLensError::Upstream {
                                    stage: WorkflowStage::Grading,
                                    message: e.to_string(),
                                }),
                                Err(_) => Err(FilingLensError::Upstream {
                                    stage: WorkflowStage::Grading,
                                    message: "grade call timed out".to_string(),
                                }),
                            };
                        (idx, chunk, verdict)
                    }
                })
                .buffer_unordered(GRADING_CONCURRENCY)
                .collect()
                .await;

        graded.sort_by_key(|(idx, _, _)| *idx);

        let mut relevant = Vec::new();
        for (_, chunk, verdict) in graded {
            if verdict? {
                relevant.push(chunk);
            }
        }

        Ok(relevant)
    }

    /// Returns `None` when the rewriter produced an already-used query
    async fn rewrite_query(&self, state: &WorkflowState) -> Result<Option<String>> {
        let request = RewriteRequest {
            original_question: &state.original_question,
            current_query: &state.current_query,
            relevant_found: state.relevant_chunks.len(),
            attempt: state.rewrites + 1,
        };

        let query = self
            .call_stage(
                WorkflowStage::Rewriting,
                self.config.rewrite_timeout(),
                self.rewriter.rewrite(&request),
            )
            .await?;

        if state.was_used(&query) {
            Ok(None)
        } else {
            Ok(Some(query))
        }
    }

    async fn translate_jargon(&self, state: &WorkflowState) -> Result<JargonMap> {
        self.call_stage(
            WorkflowStage::Translating,
            self.config.translation_timeout(),
            self.translator.translate(&state.relevant_chunks),
        )
        .await
    }

    async fn synthesize_answer(&self, state: &WorkflowState, jargon: &JargonMap) -> Result<String> {
        if state.relevant_chunks.is_empty() {
            tracing::warn!("Synthesizing without relevant evidence, returning fallback answer");
            return Ok(INSUFFICIENT_EVIDENCE_ANSWER.to_string());
        }

        self.call_stage(
            WorkflowStage::Synthesizing,
            self.config.synthesis_timeout(),
            self.synthesizer
                .synthesize(&state.original_question, &state.relevant_chunks, jargon),
        )
        .await
    }

    /// Run one collaborator call under its stage timeout, tagging failures
    /// with the stage name
    async fn call_stage<T>(
        &self,
        stage: WorkflowStage,
        timeout: Duration,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(tag_stage_error(stage, e)),
            Err(_) => Err(FilingLensError::Upstream {
                stage,
                message: "call timed out".to_string(),
            }),
        }
    }

    fn emit(&self, stage: WorkflowStage) -> WorkflowStage {
        tracing::debug!("--- {} ---", stage);
        if let Some(ref sender) = self.progress {
            let _ = sender.send(stage);
        }
        stage
    }
}

/// Attach the stage name to generic collaborator failures; domain variants
/// already carry their own context
fn tag_stage_error(stage: WorkflowStage, error: FilingLensError) -> FilingLensError {
    match error {
        e @ (FilingLensError::RetrieverUnavailable(_)
        | FilingLensError::GradingParse(_)
        | FilingLensError::Upstream { .. }
        | FilingLensError::NoEvidenceFound { .. }
        | FilingLensError::Cancelled { .. }) => e,
        other => FilingLensError::Upstream {
            stage,
            message: other.to_string(),
        },
    }
}
