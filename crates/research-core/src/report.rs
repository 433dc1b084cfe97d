//! The assembled research report

use crate::error::{Error, Result};
use crate::outcome::{AgentOutcome, OutcomeStatus, Series};
use crate::request::{AgentKind, ResearchRequest};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use uuid::Uuid;

/// The unified answer to one [`ResearchRequest`]
///
/// Outcomes are keyed by agent, so the report is the same whatever order the
/// agents finished in. The key set always equals the request's selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchReport {
    /// Request identifier
    pub id: Uuid,
    /// The request this report answers
    pub request: ResearchRequest,
    /// One outcome per selected agent
    pub outcomes: BTreeMap<AgentKind, AgentOutcome>,
    /// Assembly time
    pub generated_at: DateTime<Utc>,
}

/// Outcome counts for a report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub ok: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl ResearchReport {
    /// Key the outcomes by agent and check them against the selection
    ///
    /// A duplicate, missing, or unselected outcome is an internal fault: the
    /// orchestrator must never hand back a report with a silently absent key.
    pub fn assemble(
        id: Uuid,
        request: ResearchRequest,
        outcomes: impl IntoIterator<Item = AgentOutcome>,
    ) -> Result<Self> {
        let mut keyed = BTreeMap::new();
        for outcome in outcomes {
            let agent = outcome.agent();
            if !request.agent_selection.contains(&agent) {
                return Err(Error::InternalFault(format!(
                    "outcome for unselected agent '{agent}'"
                )));
            }
            if keyed.insert(agent, outcome).is_some() {
                return Err(Error::InternalFault(format!(
                    "duplicate outcome for agent '{agent}'"
                )));
            }
        }

        if let Some(missing) = request
            .agent_selection
            .iter()
            .find(|kind| !keyed.contains_key(kind))
        {
            return Err(Error::InternalFault(format!(
                "no outcome collected for agent '{missing}'"
            )));
        }

        Ok(Self {
            id,
            request,
            outcomes: keyed,
            generated_at: Utc::now(),
        })
    }

    /// Outcome of one agent, if it was selected
    pub fn outcome(&self, agent: AgentKind) -> Option<&AgentOutcome> {
        self.outcomes.get(&agent)
    }

    /// Count outcomes by status
    pub fn summary(&self) -> ReportSummary {
        self.outcomes
            .values()
            .fold(ReportSummary::default(), |mut acc, o| {
                match o.status() {
                    OutcomeStatus::Ok => acc.ok += 1,
                    OutcomeStatus::Failed => acc.failed += 1,
                    OutcomeStatus::Skipped => acc.skipped += 1,
                }
                acc
            })
    }

    /// Whether at least one selected agent did not produce a result
    pub fn is_partial(&self) -> bool {
        self.outcomes.values().any(|o| !o.is_ok())
    }

    /// Render the report as Markdown, one section per selected agent
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Research Report\n");
        let _ = writeln!(out, "**Question:** {}\n", self.request.question);
        let _ = writeln!(out, "**Period:** {}\n", self.request.period_filter);
        let _ = writeln!(
            out,
            "**Generated:** {}\n",
            self.generated_at.format("%Y-%m-%d %H:%M UTC")
        );

        for (agent, outcome) in &self.outcomes {
            let _ = writeln!(out, "## {}\n", agent.section_title());
            match outcome.status() {
                OutcomeStatus::Ok => {}
                OutcomeStatus::Failed => {
                    let kind = outcome
                        .error()
                        .map_or_else(|| "Unknown".to_string(), |k| k.to_string());
                    let _ = writeln!(out, "> ⚠️ Unavailable ({kind})");
                    if let Some(detail) = outcome.detail() {
                        let _ = writeln!(out, "> {detail}");
                    }
                    out.push('\n');
                }
                OutcomeStatus::Skipped => {
                    let _ = writeln!(
                        out,
                        "> Skipped: {}\n",
                        outcome.detail().unwrap_or("not configured")
                    );
                }
            }

            if let Some(narrative) = outcome.narrative() {
                let _ = writeln!(out, "{}\n", narrative.trim_end());
            }

            if let Some(payload) = outcome.visual_payload() {
                for series in payload.series.iter().filter(|s| !s.is_empty()) {
                    render_series(&mut out, series);
                }
            }

            if !outcome.sources().is_empty() {
                let _ = writeln!(out, "### Sources and References\n");
                for source in outcome.sources() {
                    let _ = writeln!(out, "- {source}");
                }
                out.push('\n');
            }
        }

        let summary = self.summary();
        let _ = writeln!(
            out,
            "---\n{} ok, {} failed, {} skipped",
            summary.ok, summary.failed, summary.skipped
        );
        out
    }
}

fn render_series(out: &mut String, series: &Series) {
    let _ = writeln!(out, "| Period | {} |", series.name);
    let _ = writeln!(out, "|---|---:|");
    for point in &series.points {
        let _ = writeln!(out, "| {} | {:.2} |", point.label, point.value);
    }
    out.push('\n');
}
