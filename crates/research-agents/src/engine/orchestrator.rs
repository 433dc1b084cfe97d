//! Fan-out of one research request to its selected agents

use super::lifecycle::{RequestLifecycle, RequestState};
use crate::agents::{LiveAgent, StructuredAgent, UnstructuredAgent};
use crate::collaborators::{Embedder, TabularSource, VectorStore, WebSearch};
use crate::config::{DispatchMode, ResearchConfig};
use crate::embedding::CachedEmbedder;
use crate::error::Result;
use crate::prompts::PromptSet;
use crate::retriever::MetadataFilteredRetriever;
use futures::future::join_all;
use research_core::{
    AgentError, AgentKind, AgentOutcome, AgentTask, Error, ResearchAgent, ResearchReport,
    ResearchRequest,
};
use research_llm::NarrativeSynthesizer;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

const DEFAULT_AGENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Dispatch table entry for one agent kind
#[derive(Clone)]
pub enum AgentSlot {
    /// Invoked when selected
    Active(Arc<dyn ResearchAgent>),
    /// Selected requests record a skipped outcome with this reason
    Disabled(String),
}

/// External systems the standard agents are built from
pub struct Collaborators {
    pub embedder: Arc<dyn Embedder>,
    pub vector_store: Arc<dyn VectorStore>,
    pub tabular: Arc<dyn TabularSource>,
    /// Live search is disabled when absent
    pub web_search: Option<Arc<dyn WebSearch>>,
    pub synthesizer: Arc<dyn NarrativeSynthesizer>,
}

/// Runs every selected agent for a request and assembles the report
///
/// Agents are looked up in a table keyed by [`AgentKind`]. Each invocation is
/// an independent task bounded by a deadline fixed when the request starts
/// dispatching, in either mode; no agent failure, timeout or skip affects its
/// siblings. Dropping the request future aborts any agent still running.
pub struct ResearchOrchestrator {
    slots: BTreeMap<AgentKind, AgentSlot>,
    dispatch_mode: DispatchMode,
    agent_timeout: Duration,
}

impl Default for ResearchOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl ResearchOrchestrator {
    /// An orchestrator with no agents registered
    pub fn new() -> Self {
        Self {
            slots: BTreeMap::new(),
            dispatch_mode: DispatchMode::Concurrent,
            agent_timeout: DEFAULT_AGENT_TIMEOUT,
        }
    }

    /// Register an agent under its own kind, replacing any previous slot
    pub fn agent(mut self, agent: Arc<dyn ResearchAgent>) -> Self {
        self.slots.insert(agent.kind(), AgentSlot::Active(agent));
        self
    }

    /// Mark a kind as not configured
    pub fn disabled(mut self, kind: AgentKind, reason: impl Into<String>) -> Self {
        self.slots.insert(kind, AgentSlot::Disabled(reason.into()));
        self
    }

    pub fn dispatch_mode(mut self, mode: DispatchMode) -> Self {
        self.dispatch_mode = mode;
        self
    }

    /// Time from dispatch within which every agent of a request must finish
    pub fn agent_timeout(mut self, timeout: Duration) -> Self {
        self.agent_timeout = timeout;
        self
    }

    /// Build the three standard agents from configuration and collaborators
    pub fn with_collaborators(
        config: &ResearchConfig,
        collaborators: Collaborators,
    ) -> Result<Self> {
        config.validate()?;
        let prompts = Arc::new(PromptSet::new()?);

        let embedder: Arc<dyn Embedder> = Arc::new(CachedEmbedder::new(
            collaborators.embedder,
            config.embedding_cache_ttl,
        ));
        let retriever = MetadataFilteredRetriever::new(embedder, collaborators.vector_store);

        let structured = StructuredAgent::new(collaborators.tabular);
        let unstructured = UnstructuredAgent::new(
            retriever,
            Arc::clone(&collaborators.synthesizer),
            Arc::clone(&prompts),
            config.company.clone(),
        )
        .with_top_k(config.retrieval_top_k);

        let orchestrator = Self::new()
            .dispatch_mode(config.dispatch_mode)
            .agent_timeout(config.agent_timeout)
            .agent(Arc::new(structured))
            .agent(Arc::new(unstructured));

        let orchestrator = match collaborators.web_search {
            Some(search) => orchestrator.agent(Arc::new(
                LiveAgent::new(
                    search,
                    collaborators.synthesizer,
                    prompts,
                    config.company.clone(),
                )
                .with_max_results(config.live_max_results),
            )),
            None => {
                info!("No web search configured; live agent disabled");
                orchestrator.disabled(AgentKind::Live, "web search is not configured")
            }
        };
        Ok(orchestrator)
    }

    /// Dispatch table entry for a kind
    pub fn slot(&self, kind: AgentKind) -> Option<&AgentSlot> {
        self.slots.get(&kind)
    }

    /// Answer a request with one outcome per selected agent
    ///
    /// Fails only with `InvalidRequest`, raised before any agent runs, or
    /// `InternalFault` when an outcome cannot be collected.
    pub async fn submit_research_request(
        &self,
        request: ResearchRequest,
    ) -> research_core::Result<ResearchReport> {
        let id = Uuid::new_v4();
        let mut lifecycle = RequestLifecycle::new(id);

        if let Err(err) = request.validate() {
            warn!(request_id = %id, error = %err, "Rejecting request");
            return Err(err);
        }

        let plan = request
            .agent_selection
            .iter()
            .map(|kind| {
                self.slots.get(kind).map(|slot| (*kind, slot)).ok_or_else(|| {
                    Error::InternalFault(format!("no agent registered for '{kind}'"))
                })
            })
            .collect::<research_core::Result<Vec<_>>>()?;

        lifecycle.advance(RequestState::Dispatching)?;
        let task = Arc::new(AgentTask::for_request(id, &request));
        let deadline = Instant::now() + self.agent_timeout;
        debug!(request_id = %id, mode = %self.dispatch_mode, agents = plan.len(), "Dispatching");

        let outcomes = match self.dispatch_mode {
            DispatchMode::Concurrent => {
                let pending: Vec<_> = plan
                    .into_iter()
                    .map(|(kind, slot)| self.dispatch(kind, slot, &task, deadline))
                    .collect();
                lifecycle.advance(RequestState::Collecting)?;
                join_all(pending.into_iter().map(Pending::collect))
                    .await
                    .into_iter()
                    .collect::<research_core::Result<Vec<_>>>()?
            }
            DispatchMode::Sequential => {
                lifecycle.advance(RequestState::Collecting)?;
                let mut outcomes = Vec::with_capacity(plan.len());
                for (kind, slot) in plan {
                    let pending = self.dispatch(kind, slot, &task, deadline);
                    outcomes.push(pending.collect().await?);
                }
                outcomes
            }
        };

        let report = ResearchReport::assemble(id, request, outcomes)?;
        lifecycle.advance(RequestState::Assembled)?;

        let summary = report.summary();
        info!(
            request_id = %id,
            ok = summary.ok,
            failed = summary.failed,
            skipped = summary.skipped,
            "Report assembled"
        );
        Ok(report)
    }

    fn dispatch(
        &self,
        kind: AgentKind,
        slot: &AgentSlot,
        task: &Arc<AgentTask>,
        deadline: Instant,
    ) -> Pending {
        match slot {
            AgentSlot::Disabled(reason) => {
                debug!(agent = %kind, reason = %reason, "Skipping disabled agent");
                Pending::Ready(AgentOutcome::skipped(kind, reason.clone()))
            }
            AgentSlot::Active(agent) => {
                let span = info_span!("agent", agent = %kind, request_id = %task.request_id);
                let invocation = Invocation {
                    agent: Arc::clone(agent),
                    kind,
                    task: Arc::clone(task),
                    deadline,
                    budget: self.agent_timeout,
                };
                let handle = tokio::spawn(invocation.run().instrument(span));
                Pending::Running(kind, AbortOnDrop(handle))
            }
        }
    }
}

/// An outcome that is either known or still being produced
enum Pending {
    Ready(AgentOutcome),
    Running(AgentKind, AbortOnDrop),
}

impl Pending {
    async fn collect(self) -> research_core::Result<AgentOutcome> {
        match self {
            Self::Ready(outcome) => Ok(outcome),
            Self::Running(kind, mut handle) => (&mut handle.0).await.map_err(|e| {
                Error::InternalFault(format!("agent '{kind}' did not complete: {e}"))
            }),
        }
    }
}

/// Spawned agent task, aborted if dropped before it is collected
struct AbortOnDrop(JoinHandle<AgentOutcome>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// One agent run against the request deadline
struct Invocation {
    agent: Arc<dyn ResearchAgent>,
    kind: AgentKind,
    task: Arc<AgentTask>,
    deadline: Instant,
    /// Reported in the timeout error
    budget: Duration,
}

impl Invocation {
    async fn run(self) -> AgentOutcome {
        let result = tokio::time::timeout_at(self.deadline, self.agent.run(&self.task)).await;
        if let Ok(outcome) = result {
            if let Some(error) = outcome.error() {
                warn!(
                    error = %error,
                    detail = outcome.detail().unwrap_or_default(),
                    "Agent failed"
                );
            } else {
                debug!(status = %outcome.status(), "Agent finished");
            }
            outcome
        } else {
            let after_ms = u64::try_from(self.budget.as_millis()).unwrap_or(u64::MAX);
            warn!(after_ms, "Agent timed out");
            AgentOutcome::from_result(self.kind, Err(AgentError::Timeout { after_ms }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use research_core::{AgentReply, ErrorKind, OutcomeStatus, PeriodFilter};

    struct FixedAgent(AgentKind);

    #[async_trait]
    impl ResearchAgent for FixedAgent {
        fn kind(&self) -> AgentKind {
            self.0
        }

        async fn execute(&self, task: &AgentTask) -> std::result::Result<AgentReply, AgentError> {
            Ok(AgentReply::new(format!("{} answered {}", self.0, task.question)))
        }
    }

    struct PanickingAgent;

    #[async_trait]
    impl ResearchAgent for PanickingAgent {
        fn kind(&self) -> AgentKind {
            AgentKind::Live
        }

        async fn execute(&self, _task: &AgentTask) -> std::result::Result<AgentReply, AgentError> {
            panic!("boom")
        }
    }

    fn orchestrator() -> ResearchOrchestrator {
        ResearchOrchestrator::new()
            .agent(Arc::new(FixedAgent(AgentKind::Structured)))
            .agent(Arc::new(FixedAgent(AgentKind::Unstructured)))
            .disabled(AgentKind::Live, "no key")
    }

    #[tokio::test]
    async fn test_disabled_agent_is_skipped() {
        let report = orchestrator()
            .submit_research_request(ResearchRequest::new("q", AgentKind::ALL))
            .await
            .unwrap();

        assert_eq!(report.outcomes.len(), 3);
        let live = report.outcome(AgentKind::Live).unwrap();
        assert_eq!(live.status(), OutcomeStatus::Skipped);
        assert_eq!(live.detail(), Some("no key"));
        assert_eq!(
            report.outcome(AgentKind::Structured).unwrap().narrative(),
            Some("structured answered q")
        );
    }

    #[tokio::test]
    async fn test_invalid_request_rejected() {
        let request = ResearchRequest::new("q", [AgentKind::Structured]).with_period(PeriodFilter {
            year: None,
            quarter: Some(3),
        });
        let err = orchestrator().submit_research_request(request).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));

        let empty = ResearchRequest::new("q", Vec::<AgentKind>::new());
        assert!(matches!(
            orchestrator().submit_research_request(empty).await,
            Err(Error::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_unregistered_agent_is_internal_fault() {
        let orchestrator =
            ResearchOrchestrator::new().agent(Arc::new(FixedAgent(AgentKind::Structured)));
        let err = orchestrator
            .submit_research_request(ResearchRequest::new(
                "q",
                [AgentKind::Structured, AgentKind::Unstructured],
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InternalFault(msg) if msg.contains("unstructured")));
    }

    #[tokio::test]
    async fn test_panicking_agent_is_internal_fault() {
        let orchestrator = orchestrator().agent(Arc::new(PanickingAgent));
        let err = orchestrator
            .submit_research_request(ResearchRequest::new("q", [AgentKind::Live]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InternalFault(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_recorded() {
        struct SlowAgent;

        #[async_trait]
        impl ResearchAgent for SlowAgent {
            fn kind(&self) -> AgentKind {
                AgentKind::Unstructured
            }

            async fn execute(
                &self,
                _task: &AgentTask,
            ) -> std::result::Result<AgentReply, AgentError> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(AgentReply::new("late"))
            }
        }

        let report = orchestrator()
            .agent(Arc::new(SlowAgent))
            .agent_timeout(Duration::from_millis(250))
            .submit_research_request(ResearchRequest::new(
                "q",
                [AgentKind::Structured, AgentKind::Unstructured],
            ))
            .await
            .unwrap();

        let slow = report.outcome(AgentKind::Unstructured).unwrap();
        assert_eq!(slow.error(), Some(ErrorKind::AgentTimeout));
        assert_eq!(slow.detail(), Some("Agent timed out after 250 ms"));
        assert!(report.outcome(AgentKind::Structured).unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_agents_share_one_deadline() {
        let orchestrator = ResearchOrchestrator::new()
            .agent(Arc::new(SleepingAgent::new(AgentKind::Structured)))
            .agent(Arc::new(SleepingAgent::new(AgentKind::Unstructured)))
            .agent(Arc::new(SleepingAgent::new(AgentKind::Live)))
            .dispatch_mode(DispatchMode::Sequential)
            .agent_timeout(Duration::from_secs(2));

        let started = Instant::now();
        let report = orchestrator
            .submit_research_request(ResearchRequest::new("q", AgentKind::ALL))
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_secs(3), "assembled after {elapsed:?}");
        for kind in AgentKind::ALL {
            assert_eq!(
                report.outcome(kind).unwrap().error(),
                Some(ErrorKind::AgentTimeout)
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_request_aborts_agents() {
        let (agent, released) = SleepingAgent::watched(AgentKind::Unstructured);
        let orchestrator = ResearchOrchestrator::new()
            .agent(Arc::new(agent))
            .agent_timeout(Duration::from_secs(3600));

        let request = orchestrator
            .submit_research_request(ResearchRequest::new("q", [AgentKind::Unstructured]));
        assert!(
            tokio::time::timeout(Duration::from_millis(100), request)
                .await
                .is_err()
        );

        // The agent's future is dropped, closing the channel, long before its own deadline
        let closed = tokio::time::timeout(Duration::from_secs(1), released).await;
        assert!(matches!(closed, Ok(Err(_))));
    }

    /// Sleeps for an hour; optionally holds a sender that is dropped with the run
    struct SleepingAgent {
        kind: AgentKind,
        guard: std::sync::Mutex<Option<tokio::sync::oneshot::Sender<()>>>,
    }

    impl SleepingAgent {
        fn new(kind: AgentKind) -> Self {
            Self {
                kind,
                guard: std::sync::Mutex::new(None),
            }
        }

        fn watched(kind: AgentKind) -> (Self, tokio::sync::oneshot::Receiver<()>) {
            let (tx, rx) = tokio::sync::oneshot::channel();
            let agent = Self::new(kind);
            *agent.guard.lock().unwrap() = Some(tx);
            (agent, rx)
        }
    }

    #[async_trait]
    impl ResearchAgent for SleepingAgent {
        fn kind(&self) -> AgentKind {
            self.kind
        }

        async fn execute(&self, _task: &AgentTask) -> std::result::Result<AgentReply, AgentError> {
            let _guard = self.guard.lock().unwrap().take();
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(AgentReply::new("late"))
        }
    }
}
