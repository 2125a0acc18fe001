//! Integration tests for the workflow controller
//!
//! Drive the full loop against scripted collaborators: per-round retrieval
//! results, per-chunk verdicts, canned rewrites. No network involved.

use async_trait::async_trait;
use filinglens_core::workflow::WorkflowController;
use filinglens_core::{
    CancelToken, ChunkSource, FilingLensError, JargonMap, JargonTranslator, QueryRewriter,
    RelevanceGrader, RelevanceVerdict, Result, RetrievedChunk, Retriever, RewriteRequest,
    Synthesizer, WorkflowConfig, WorkflowStage, INSUFFICIENT_EVIDENCE_ANSWER,
};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn chunk(id: &str, text: &str) -> RetrievedChunk {
    RetrievedChunk {
        id: id.to_string(),
        text: text.to_string(),
        source: ChunkSource::default(),
        score: 0.8,
    }
}

/// Returns one scripted result set per retrieval round, then empty sets
struct ScriptedRetriever {
    rounds: Mutex<VecDeque<Vec<RetrievedChunk>>>,
    calls: AtomicUsize,
    queries: Mutex<Vec<String>>,
}

impl ScriptedRetriever {
    fn new(rounds: Vec<Vec<RetrievedChunk>>) -> Self {
        Self {
            rounds: Mutex::new(rounds.into()),
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Retriever for ScriptedRetriever {
    async fn search(&self, query: &str, _top_k: usize) -> Result<Vec<RetrievedChunk>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.to_string());
        Ok(self.rounds.lock().unwrap().pop_front().unwrap_or_default())
    }
}

struct UnavailableRetriever;

#[async_trait]
impl Retriever for UnavailableRetriever {
    async fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<RetrievedChunk>> {
        Err(FilingLensError::RetrieverUnavailable(
            "connection refused".to_string(),
        ))
    }
}

/// Grades by membership in a relevant-id set; ids in `parse_fail_ids` yield a
/// schema failure instead of a verdict
struct ScriptedGrader {
    relevant_ids: HashSet<String>,
    parse_fail_ids: HashSet<String>,
    calls: AtomicUsize,
}

impl ScriptedGrader {
    fn new(relevant: &[&str]) -> Self {
        Self {
            relevant_ids: relevant.iter().map(|s| s.to_string()).collect(),
            parse_fail_ids: HashSet::new(),
            calls: AtomicUsize::new(0),
        }
    }

    fn with_parse_failures(mut self, ids: &[&str]) -> Self {
        self.parse_fail_ids = ids.iter().map(|s| s.to_string()).collect();
        self
    }
}

#[async_trait]
impl RelevanceGrader for ScriptedGrader {
    async fn grade(&self, _query: &str, chunk: &RetrievedChunk) -> Result<RelevanceVerdict> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.parse_fail_ids.contains(&chunk.id) {
            return Err(FilingLensError::GradingParse(
                "missing field `is_relevant`".to_string(),
            ));
        }
        Ok(RelevanceVerdict {
            is_relevant: self.relevant_ids.contains(&chunk.id),
        })
    }

    fn model_name(&self) -> &str {
        "scripted-grader"
    }
}

/// Pops scripted rewrites in order; once exhausted, echoes the current query
/// (a stuck rewriter)
struct SequenceRewriter {
    rewrites: Mutex<VecDeque<String>>,
    calls: AtomicUsize,
}

impl SequenceRewriter {
    fn new(rewrites: &[&str]) -> Self {
        Self {
            rewrites: Mutex::new(rewrites.iter().map(|s| s.to_string()).collect()),
            calls: AtomicUsize::new(0),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryRewriter for SequenceRewriter {
    async fn rewrite(&self, request: &RewriteRequest<'_>) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .rewrites
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| request.current_query.to_string()))
    }

    fn model_name(&self) -> &str {
        "scripted-rewriter"
    }
}

/// Records the chunk count it was handed and returns a fixed mapping
struct RecordingTranslator {
    jargon: JargonMap,
    last_input_len: AtomicUsize,
    calls: AtomicUsize,
}

impl RecordingTranslator {
    fn empty() -> Self {
        Self::with_map(JargonMap::new())
    }

    fn with_map(jargon: JargonMap) -> Self {
        Self {
            jargon,
            last_input_len: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl JargonTranslator for RecordingTranslator {
    async fn translate(&self, chunks: &[RetrievedChunk]) -> Result<JargonMap> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_input_len.store(chunks.len(), Ordering::SeqCst);
        if chunks.is_empty() {
            return Ok(JargonMap::new());
        }
        Ok(self.jargon.clone())
    }

    fn model_name(&self) -> &str {
        "scripted-translator"
    }
}

struct StaticSynthesizer {
    answer: String,
    calls: AtomicUsize,
}

impl StaticSynthesizer {
    fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Synthesizer for StaticSynthesizer {
    async fn synthesize(
        &self,
        _question: &str,
        _chunks: &[RetrievedChunk],
        _jargon: &JargonMap,
    ) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.answer.clone())
    }

    fn model_name(&self) -> &str {
        "scripted-synthesizer"
    }
}

struct FailingSynthesizer;

#[async_trait]
impl Synthesizer for FailingSynthesizer {
    async fn synthesize(
        &self,
        _question: &str,
        _chunks: &[RetrievedChunk],
        _jargon: &JargonMap,
    ) -> Result<String> {
        Err(FilingLensError::Llm("model overloaded".to_string()))
    }

    fn model_name(&self) -> &str {
        "failing-synthesizer"
    }
}

struct Harness {
    retriever: Arc<ScriptedRetriever>,
    grader: Arc<ScriptedGrader>,
    rewriter: Arc<SequenceRewriter>,
    translator: Arc<RecordingTranslator>,
    synthesizer: Arc<StaticSynthesizer>,
}

impl Harness {
    fn new(
        rounds: Vec<Vec<RetrievedChunk>>,
        grader: ScriptedGrader,
        rewrites: &[&str],
    ) -> Self {
        Self {
            retriever: Arc::new(ScriptedRetriever::new(rounds)),
            grader: Arc::new(grader),
            rewriter: Arc::new(SequenceRewriter::new(rewrites)),
            translator: Arc::new(RecordingTranslator::empty()),
            synthesizer: Arc::new(StaticSynthesizer::new("Revenue was $394.3 billion.")),
        }
    }

    fn controller(&self, config: WorkflowConfig) -> WorkflowController {
        WorkflowController::new(
            self.retriever.clone(),
            self.grader.clone(),
            self.rewriter.clone(),
            self.translator.clone(),
            self.synthesizer.clone(),
            config,
        )
    }
}

#[tokio::test]
async fn relevant_first_round_goes_straight_to_synthesis() {
    let harness = Harness::new(
        vec![vec![chunk("a", "Revenue was $394.3 billion."), chunk("b", "Net sales grew.")]],
        ScriptedGrader::new(&["a", "b"]),
        &[],
    );

    let response = harness
        .controller(WorkflowConfig::default())
        .run("What was revenue in fiscal 2023?")
        .await
        .unwrap();

    assert_eq!(response.answer, "Revenue was $394.3 billion.");
    assert_eq!(response.sources.len(), 2);
    assert_eq!(harness.retriever.call_count(), 1);
    assert_eq!(harness.rewriter.call_count(), 0, "sufficiency predicate must suppress rewrites");
}

#[tokio::test]
async fn irrelevant_then_relevant_stops_after_one_rewrite() {
    let harness = Harness::new(
        vec![
            vec![chunk("a", "Board compensation."), chunk("b", "Office leases."), chunk("c", "Unrelated.")],
            vec![chunk("d", "Total revenue was $394.3 billion."), chunk("e", "Revenue grew 2%.")],
        ],
        ScriptedGrader::new(&["d", "e"]),
        &["fiscal year 2023 total revenue figure"],
    );

    let response = harness
        .controller(WorkflowConfig::default())
        .run("What was revenue in fiscal 2023?")
        .await
        .unwrap();

    assert_eq!(harness.retriever.call_count(), 2, "no third retrieval once evidence suffices");
    assert_eq!(harness.rewriter.call_count(), 1);
    assert_eq!(response.sources.len(), 2);
    let queries = harness.retriever.queries.lock().unwrap();
    assert_eq!(queries[1], "fiscal year 2023 total revenue figure");
}

#[tokio::test]
async fn grading_parse_failure_excludes_only_that_chunk() {
    let harness = Harness::new(
        vec![vec![
            chunk("a", "one"),
            chunk("b", "two"),
            chunk("c", "three"),
            chunk("d", "four"),
            chunk("e", "five"),
        ]],
        ScriptedGrader::new(&["a", "b", "c", "d", "e"]).with_parse_failures(&["c"]),
        &[],
    );

    let response = harness
        .controller(WorkflowConfig::default())
        .run("q")
        .await
        .unwrap();

    let ids: Vec<_> = response.sources.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "d", "e"]);
}

#[tokio::test]
async fn ceiling_exhaustion_lenient_returns_degraded_response() {
    let harness = Harness::new(
        vec![vec![chunk("a", "noise")], vec![chunk("b", "noise")], vec![], vec![]],
        ScriptedGrader::new(&[]),
        &["rewrite one", "rewrite two", "rewrite three"],
    );

    let response = harness
        .controller(WorkflowConfig::default())
        .run("q")
        .await
        .unwrap();

    assert_eq!(response.answer, INSUFFICIENT_EVIDENCE_ANSWER);
    assert!(response.sources.is_empty());
    assert!(response.jargon.is_empty());
    // initial round plus one per rewrite, never more
    assert_eq!(harness.retriever.call_count(), 4);
    assert_eq!(harness.rewriter.call_count(), 3);
    assert_eq!(
        harness.synthesizer.calls.load(Ordering::SeqCst),
        0,
        "degraded answer must not invoke the synthesis model"
    );
}

#[tokio::test]
async fn ceiling_exhaustion_strict_fails_with_no_evidence() {
    let harness = Harness::new(
        vec![vec![chunk("a", "noise")], vec![], vec![], vec![]],
        ScriptedGrader::new(&[]),
        &["rewrite one", "rewrite two", "rewrite three"],
    );

    let config = WorkflowConfig {
        strict: true,
        ..WorkflowConfig::default()
    };

    let err = harness.controller(config).run("q").await.unwrap_err();
    match err {
        FilingLensError::NoEvidenceFound { rewrites } => assert_eq!(rewrites, 3),
        other => panic!("expected NoEvidenceFound, got {other}"),
    }
}

#[tokio::test]
async fn stuck_rewriter_terminates_instead_of_looping() {
    // No scripted rewrites: the rewriter echoes the current query back.
    let harness = Harness::new(vec![vec![chunk("a", "noise")]], ScriptedGrader::new(&[]), &[]);

    let response = harness
        .controller(WorkflowConfig::default())
        .run("q")
        .await
        .unwrap();

    assert_eq!(response.answer, INSUFFICIENT_EVIDENCE_ANSWER);
    assert_eq!(harness.retriever.call_count(), 1, "duplicate query must not be re-issued");
    assert_eq!(harness.rewriter.call_count(), 1);
}

#[tokio::test]
async fn partial_evidence_at_ceiling_synthesizes_in_strict_mode() {
    // One relevant chunk but threshold demands two; ceiling exhausts with
    // partial evidence and strict mode still synthesizes from what exists.
    let harness = Harness::new(
        vec![vec![chunk("a", "Revenue figure.")], vec![], vec![], vec![]],
        ScriptedGrader::new(&["a"]),
        &["rewrite one", "rewrite two", "rewrite three"],
    );

    let config = WorkflowConfig {
        strict: true,
        min_relevant_chunks: 2,
        ..WorkflowConfig::default()
    };

    let response = harness.controller(config).run("q").await.unwrap();
    assert_eq!(response.sources.len(), 1);
    assert_eq!(response.answer, "Revenue was $394.3 billion.");
}

#[tokio::test]
async fn overlapping_rounds_deduplicate_by_chunk_identity() {
    let harness = Harness::new(
        vec![
            vec![chunk("a", "Relevant but alone.")],
            vec![chunk("a", "Relevant but alone."), chunk("b", "More evidence.")],
        ],
        ScriptedGrader::new(&["a", "b"]),
        &["broader revenue query"],
    );

    let config = WorkflowConfig {
        min_relevant_chunks: 2,
        ..WorkflowConfig::default()
    };

    let response = harness.controller(config).run("q").await.unwrap();
    let ids: Vec<_> = response.sources.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"], "first-seen order, no duplicate for id 'a'");
}

#[tokio::test]
async fn translator_receives_accumulated_chunks_and_jargon_flows_through() {
    let mut jargon = JargonMap::new();
    jargon.insert("EBITDA", "Profit before some subtractions.");

    let harness = Harness {
        retriever: Arc::new(ScriptedRetriever::new(vec![vec![
            chunk("a", "EBITDA improved."),
            chunk("b", "Margins held."),
        ]])),
        grader: Arc::new(ScriptedGrader::new(&["a", "b"])),
        rewriter: Arc::new(SequenceRewriter::new(&[])),
        translator: Arc::new(RecordingTranslator::with_map(jargon)),
        synthesizer: Arc::new(StaticSynthesizer::new("EBITDA went up.")),
    };

    let response = harness
        .controller(WorkflowConfig::default())
        .run("How did EBITDA do?")
        .await
        .unwrap();

    assert_eq!(harness.translator.last_input_len.load(Ordering::SeqCst), 2);
    assert!(response.jargon.contains("ebitda"));
}

#[tokio::test]
async fn empty_evidence_yields_empty_jargon_mapping() {
    let harness = Harness::new(vec![vec![]], ScriptedGrader::new(&[]), &[]);

    let response = harness
        .controller(WorkflowConfig::default())
        .run("q")
        .await
        .unwrap();

    assert!(response.jargon.is_empty());
    assert_eq!(harness.translator.last_input_len.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn retriever_unavailable_is_fatal_and_untranslated() {
    let harness = Harness::new(vec![], ScriptedGrader::new(&[]), &[]);
    let controller = WorkflowController::new(
        Arc::new(UnavailableRetriever),
        harness.grader.clone(),
        harness.rewriter.clone(),
        harness.translator.clone(),
        harness.synthesizer.clone(),
        WorkflowConfig::default(),
    );

    let err = controller.run("q").await.unwrap_err();
    assert!(matches!(err, FilingLensError::RetrieverUnavailable(_)));
}

#[tokio::test]
async fn synthesizer_failure_is_tagged_with_stage() {
    let harness = Harness::new(
        vec![vec![chunk("a", "Relevant.")]],
        ScriptedGrader::new(&["a"]),
        &[],
    );
    let controller = WorkflowController::new(
        harness.retriever.clone(),
        harness.grader.clone(),
        harness.rewriter.clone(),
        harness.translator.clone(),
        Arc::new(FailingSynthesizer),
        WorkflowConfig::default(),
    );

    let err = controller.run("q").await.unwrap_err();
    match err {
        FilingLensError::Upstream { stage, .. } => {
            assert_eq!(stage, WorkflowStage::Synthesizing)
        }
        other => panic!("expected Upstream, got {other}"),
    }
}

#[tokio::test]
async fn pre_cancelled_token_stops_before_any_stage() {
    let harness = Harness::new(
        vec![vec![chunk("a", "Relevant.")]],
        ScriptedGrader::new(&["a"]),
        &[],
    );

    let token = CancelToken::new();
    token.cancel();

    let controller = harness
        .controller(WorkflowConfig::default())
        .with_cancellation(token);

    let err = controller.run("q").await.unwrap_err();
    assert!(matches!(err, FilingLensError::Cancelled { .. }));
    assert_eq!(harness.retriever.call_count(), 0);
}

#[tokio::test]
async fn progress_channel_sees_every_transition_in_order() {
    let harness = Harness::new(
        vec![
            vec![chunk("a", "noise")],
            vec![chunk("b", "Total revenue was $394.3 billion.")],
        ],
        ScriptedGrader::new(&["b"]),
        &["fiscal year 2023 total revenue figure"],
    );

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let controller = harness
        .controller(WorkflowConfig::default())
        .with_progress(tx);

    controller.run("What was revenue in fiscal 2023?").await.unwrap();

    let mut stages = Vec::new();
    while let Ok(stage) = rx.try_recv() {
        stages.push(stage);
    }

    use WorkflowStage::*;
    assert_eq!(
        stages,
        vec![
            Retrieving, Grading, Deciding, Rewriting, Retrieving, Grading, Deciding, Translating,
            Synthesizing, Done
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn slow_collaborator_times_out_as_upstream_failure() {
    struct SlowRetriever;

    #[async_trait]
    impl Retriever for SlowRetriever {
        async fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<RetrievedChunk>> {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
            Ok(vec![])
        }
    }

    let harness = Harness::new(vec![], ScriptedGrader::new(&[]), &[]);
    let controller = WorkflowController::new(
        Arc::new(SlowRetriever),
        harness.grader.clone(),
        harness.rewriter.clone(),
        harness.translator.clone(),
        harness.synthesizer.clone(),
        WorkflowConfig::default(),
    );

    let err = controller.run("q").await.unwrap_err();
    match err {
        FilingLensError::Upstream { stage, .. } => {
            assert_eq!(stage, WorkflowStage::Retrieving)
        }
        other => panic!("expected Upstream timeout, got {other}"),
    }
}
