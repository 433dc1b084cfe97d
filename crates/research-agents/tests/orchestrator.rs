//! End-to-end request handling with in-memory collaborators

use async_trait::async_trait;
use research_agents::embedding::HashingEmbedder;
use research_agents::tabular::{InMemoryTable, MetricRow, Observation, QuerySpec};
use research_agents::{
    CollaboratorError, Collaborators, DispatchMode, Embedder, InMemoryVectorStore,
    MetadataFilteredRetriever, ResearchConfig, ResearchOrchestrator, SearchHit, TabularSource,
    WebSearch,
};
use research_core::{
    AgentKind, ChunkMetadata, DocumentChunk, Error, ErrorKind, OutcomeStatus, PeriodFilter,
    ResearchRequest,
};
use research_llm::ExtractiveSynthesizer;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const DIMENSION: usize = 128;

const CHUNKS: &[(&str, i32, u8, &str)] = &[
    ("2022_4_0", 2022, 4, "Data center revenue grew on hyperscale demand."),
    ("2022_4_1", 2022, 4, "Gaming revenue fell as channel inventory normalised."),
    ("2023_1_0", 2023, 1, "Data center revenue recovered with AI training demand."),
    ("2023_2_0", 2023, 2, "Record data center revenue driven by accelerated computing."),
    ("2023_2_1", 2023, 2, "Gross margin expanded on a favourable data center mix."),
    ("2023_2_2", 2023, 2, "Gaming revenue rose sequentially on new laptop launches."),
    ("2023_3_0", 2023, 3, "Export restrictions weighed on data center sales to China."),
];

/// Counts calls before delegating
struct Counting<T> {
    inner: T,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Embedder for Counting<HashingEmbedder> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed(text).await
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}

#[async_trait]
impl TabularSource for Counting<InMemoryTable> {
    async fn execute(&self, spec: &QuerySpec) -> Result<Vec<MetricRow>, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.execute(spec).await
    }
}

/// Web search returning a fixed script, optionally after a delay
struct ScriptedSearch {
    result: Result<Vec<SearchHit>, CollaboratorError>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl WebSearch for ScriptedSearch {
    async fn search(
        &self,
        _query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.result
            .clone()
            .map(|hits| hits.into_iter().take(max_results).collect())
    }
}

fn news() -> Vec<SearchHit> {
    (1..=3)
        .map(|n| SearchHit {
            title: format!("Headline {n}"),
            snippet: format!("Development {n} in the data center business."),
            url: format!("https://news.example/{n}"),
        })
        .collect()
}

fn vector_store() -> InMemoryVectorStore {
    let embedder = HashingEmbedder::new(DIMENSION);
    let mut store = InMemoryVectorStore::new(DIMENSION);
    for (id, year, quarter, text) in CHUNKS {
        store
            .insert(DocumentChunk {
                id: (*id).to_string(),
                text: (*text).to_string(),
                embedding: embedder.embed_text(text),
                metadata: ChunkMetadata {
                    year: *year,
                    quarter: *quarter,
                },
            })
            .unwrap();
    }
    store
}

/// Daily metrics for every quarter except 2023-Q2
fn table() -> InMemoryTable {
    [(2022, 4, 15.0), (2023, 1, 23.0), (2023, 3, 45.0)]
        .into_iter()
        .flat_map(|(year, quarter, close)| {
            (0..3).map(move |day| Observation {
                year,
                quarter,
                values: [
                    ("CLOSE".to_string(), close + f64::from(day)),
                    ("VOLUME".to_string(), 1_000.0),
                    ("MARKETCAP".to_string(), close * 2_500.0),
                    ("RSI".to_string(), 55.0),
                ]
                .into_iter()
                .collect(),
            })
        })
        .collect()
}

struct Harness {
    orchestrator: ResearchOrchestrator,
    embed_calls: Arc<AtomicUsize>,
    table_calls: Arc<AtomicUsize>,
    search_calls: Arc<AtomicUsize>,
}

impl Harness {
    fn collaborator_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
            + self.table_calls.load(Ordering::SeqCst)
            + self.search_calls.load(Ordering::SeqCst)
    }
}

fn harness(
    mode: DispatchMode,
    search: Option<(Result<Vec<SearchHit>, CollaboratorError>, Option<Duration>)>,
) -> Harness {
    let embed_calls = Arc::new(AtomicUsize::new(0));
    let table_calls = Arc::new(AtomicUsize::new(0));
    let search_calls = Arc::new(AtomicUsize::new(0));

    let config = ResearchConfig::builder()
        .company("NVIDIA")
        .dispatch_mode(mode)
        .agent_timeout(Duration::from_secs(2))
        .build()
        .unwrap();

    let web_search = search.map(|(result, delay)| {
        Arc::new(ScriptedSearch {
            result,
            delay,
            calls: Arc::clone(&search_calls),
        }) as Arc<dyn WebSearch>
    });

    let orchestrator = ResearchOrchestrator::with_collaborators(
        &config,
        Collaborators {
            embedder: Arc::new(Counting {
                inner: HashingEmbedder::new(DIMENSION),
                calls: Arc::clone(&embed_calls),
            }),
            vector_store: Arc::new(vector_store()),
            tabular: Arc::new(Counting {
                inner: table(),
                calls: Arc::clone(&table_calls),
            }),
            web_search,
            synthesizer: Arc::new(ExtractiveSynthesizer::new()),
        },
    )
    .unwrap();

    Harness {
        orchestrator,
        embed_calls,
        table_calls,
        search_calls,
    }
}

fn all_selections() -> Vec<BTreeSet<AgentKind>> {
    (1_u8..8)
        .map(|mask| {
            AgentKind::ALL
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, kind)| *kind)
                .collect()
        })
        .collect()
}

#[tokio::test]
async fn test_outcome_keys_equal_selection() {
    let h = harness(DispatchMode::Concurrent, Some((Ok(news()), None)));

    for selection in all_selections() {
        let request = ResearchRequest::new("data center revenue", selection.iter().copied())
            .with_period(PeriodFilter::year(2023));
        let report = h.orchestrator.submit_research_request(request).await.unwrap();

        let keys: BTreeSet<_> = report.outcomes.keys().copied().collect();
        assert_eq!(keys, selection);
    }
}

#[tokio::test]
async fn test_filtered_retrieval_agrees_with_filter_and_order() {
    let retriever = MetadataFilteredRetriever::new(
        Arc::new(HashingEmbedder::new(DIMENSION)),
        Arc::new(vector_store()),
    );

    let filters = [
        PeriodFilter::unconstrained(),
        PeriodFilter::year(2022),
        PeriodFilter::year(2023),
        PeriodFilter::quarter(2023, 2),
        PeriodFilter::quarter(2021, 1),
    ];
    for filter in filters {
        for top_k in [1, 2, 5, 50] {
            let result = retriever
                .retrieve("data center revenue", &filter, top_k)
                .await
                .unwrap();

            assert!(result.len() <= top_k);
            assert!(result.iter().all(|hit| filter.matches(&hit.chunk.metadata)));
            assert!(result.hits().windows(2).all(|w| {
                w[0].score > w[1].score
                    || (w[0].score == w[1].score && w[0].chunk.id < w[1].chunk.id)
            }));

            let matching = CHUNKS
                .iter()
                .filter(|(_, year, quarter, _)| filter.matches_period(*year, *quarter))
                .count();
            assert_eq!(result.len(), matching.min(top_k));
        }
    }
}

#[tokio::test]
async fn test_concurrent_and_sequential_reports_match() {
    let concurrent = harness(DispatchMode::Concurrent, Some((Ok(news()), None)));
    let sequential = harness(DispatchMode::Sequential, Some((Ok(news()), None)));

    for filter in [
        PeriodFilter::unconstrained(),
        PeriodFilter::year(2023),
        PeriodFilter::quarter(2023, 2),
    ] {
        let request =
            ResearchRequest::new("valuation trend", AgentKind::ALL).with_period(filter);
        let a = concurrent
            .orchestrator
            .submit_research_request(request.clone())
            .await
            .unwrap();
        let b = sequential
            .orchestrator
            .submit_research_request(request)
            .await
            .unwrap();
        assert_eq!(a.outcomes, b.outcomes);
    }
}

#[tokio::test]
async fn test_single_agent_failure_is_isolated() {
    let h = harness(
        DispatchMode::Concurrent,
        Some((Err(CollaboratorError::Unavailable("HTTP 503".into())), None)),
    );
    let report = h
        .orchestrator
        .submit_research_request(
            ResearchRequest::new("stock price", AgentKind::ALL)
                .with_period(PeriodFilter::year(2023)),
        )
        .await
        .unwrap();

    let live = report.outcome(AgentKind::Live).unwrap();
    assert_eq!(live.status(), OutcomeStatus::Failed);
    assert_eq!(live.error(), Some(ErrorKind::SearchUnavailable));
    assert!(report.outcome(AgentKind::Structured).unwrap().is_ok());
    assert!(report.outcome(AgentKind::Unstructured).unwrap().is_ok());
    assert!(report.to_markdown().contains("Unavailable (SearchUnavailable)"));
}

#[tokio::test]
async fn test_valuation_trend_without_rows_for_quarter() {
    let h = harness(DispatchMode::Concurrent, None);
    let request = ResearchRequest::new(
        "valuation trend",
        [AgentKind::Structured, AgentKind::Unstructured],
    )
    .with_period(PeriodFilter::quarter(2023, 2));
    let report = h.orchestrator.submit_research_request(request).await.unwrap();

    let structured = report.outcome(AgentKind::Structured).unwrap();
    assert_eq!(structured.status(), OutcomeStatus::Failed);
    assert_eq!(structured.error(), Some(ErrorKind::NoDataForPeriod));

    let unstructured = report.outcome(AgentKind::Unstructured).unwrap();
    assert!(unstructured.is_ok());
    assert_eq!(unstructured.sources().len(), 3);
    assert_eq!(report.outcomes.len(), 2);
}

#[tokio::test]
async fn test_quarter_without_year_rejected_before_dispatch() {
    let h = harness(DispatchMode::Concurrent, Some((Ok(news()), None)));
    let request = ResearchRequest::new("valuation trend", AgentKind::ALL).with_period(
        PeriodFilter {
            year: None,
            quarter: Some(3),
        },
    );

    let err = h.orchestrator.submit_research_request(request).await.unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)));
    assert_eq!(h.collaborator_calls(), 0);
}

#[tokio::test]
async fn test_live_agent_skipped_without_search() {
    let h = harness(DispatchMode::Concurrent, None);
    let report = h
        .orchestrator
        .submit_research_request(ResearchRequest::new("latest news", AgentKind::ALL))
        .await
        .unwrap();

    assert_eq!(
        report.outcome(AgentKind::Live).unwrap().status(),
        OutcomeStatus::Skipped
    );
    assert_eq!(report.summary().skipped, 1);
}

#[tokio::test]
async fn test_empty_search_is_ok_not_failed() {
    let h = harness(DispatchMode::Concurrent, Some((Ok(Vec::new()), None)));
    let report = h
        .orchestrator
        .submit_research_request(ResearchRequest::new("obscure topic", [AgentKind::Live]))
        .await
        .unwrap();

    let live = report.outcome(AgentKind::Live).unwrap();
    assert!(live.is_ok());
    assert!(live.narrative().unwrap().starts_with("No current results"));
    assert_eq!(h.search_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_agent_times_out_without_delaying_report() {
    let h = harness(
        DispatchMode::Concurrent,
        Some((Ok(news()), Some(Duration::from_secs(600)))),
    );
    let started = tokio::time::Instant::now();
    let report = h
        .orchestrator
        .submit_research_request(ResearchRequest::new("guidance", AgentKind::ALL))
        .await
        .unwrap();
    let elapsed = started.elapsed();

    let live = report.outcome(AgentKind::Live).unwrap();
    assert_eq!(live.error(), Some(ErrorKind::AgentTimeout));
    assert!(report.outcome(AgentKind::Structured).unwrap().is_ok());
    assert!(report.outcome(AgentKind::Unstructured).unwrap().is_ok());
    assert!(elapsed >= Duration::from_secs(2));
    assert!(elapsed < Duration::from_secs(3));
}
