//! Research requests, agent kinds, and period filters

use crate::chunk::ChunkMetadata;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// The specialised agents a request can select
///
/// The derived ordering is the order sections appear in a rendered report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// Aggregate queries over the tabular financial dataset
    Structured,
    /// Filtered retrieval over historical report text
    Unstructured,
    /// Real-time web search
    Live,
}

impl AgentKind {
    /// Every agent kind, in report order
    pub const ALL: [AgentKind; 3] = [Self::Structured, Self::Unstructured, Self::Live];

    /// Canonical lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structured => "structured",
            Self::Unstructured => "unstructured",
            Self::Live => "live",
        }
    }

    /// Heading used for this agent's report section
    pub fn section_title(&self) -> &'static str {
        match self {
            Self::Structured => "Financial Metrics Analysis",
            Self::Unstructured => "Historical Report Analysis",
            Self::Live => "Recent Developments",
        }
    }

    /// Parse a comma-separated selection
    ///
    /// Accepts the canonical names, the data-source aliases
    /// (`snowflake`, `pinecone`, `web_search`) and `combined`/`all` for every
    /// agent. Blank input yields an empty set, which request validation
    /// rejects.
    pub fn parse_selection(input: &str) -> Result<BTreeSet<AgentKind>> {
        let mut selection = BTreeSet::new();
        for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if matches!(part.to_ascii_lowercase().as_str(), "combined" | "all") {
                selection.extend(Self::ALL);
            } else {
                selection.insert(part.parse()?);
            }
        }
        Ok(selection)
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "structured" | "snowflake" | "metrics" => Ok(Self::Structured),
            "unstructured" | "pinecone" | "rag" | "reports" => Ok(Self::Unstructured),
            "live" | "web_search" | "web" | "search" => Ok(Self::Live),
            other => Err(Error::InvalidRequest(format!("unknown agent '{other}'"))),
        }
    }
}

/// Exact-match predicate over (year, optional quarter)
///
/// Both fields are optional so that an ill-formed filter (quarter without a
/// year) can be represented and rejected by [`PeriodFilter::validate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeriodFilter {
    /// Fiscal year
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,

    /// Fiscal quarter, 1..=4
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quarter: Option<u8>,
}

impl PeriodFilter {
    /// No constraint
    pub fn unconstrained() -> Self {
        Self::default()
    }

    /// Constrain to a whole year
    pub fn year(year: i32) -> Self {
        Self {
            year: Some(year),
            quarter: None,
        }
    }

    /// Constrain to one quarter of a year
    pub fn quarter(year: i32, quarter: u8) -> Self {
        Self {
            year: Some(year),
            quarter: Some(quarter),
        }
    }

    /// Whether this filter places no constraint at all
    pub fn is_empty(&self) -> bool {
        self.year.is_none() && self.quarter.is_none()
    }

    /// Check the filter invariants
    pub fn validate(&self) -> Result<()> {
        if let Some(quarter) = self.quarter {
            if self.year.is_none() {
                return Err(Error::InvalidRequest(format!(
                    "quarter {quarter} given without a year"
                )));
            }
            if !(1..=4).contains(&quarter) {
                return Err(Error::InvalidRequest(format!(
                    "quarter must be in 1..=4, got {quarter}"
                )));
            }
        }
        Ok(())
    }

    /// Exact-match test against chunk metadata
    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        self.matches_period(metadata.year, metadata.quarter)
    }

    /// Exact-match test against a (year, quarter) pair
    pub fn matches_period(&self, year: i32, quarter: u8) -> bool {
        self.year.is_none_or(|y| y == year) && self.quarter.is_none_or(|q| q == quarter)
    }
}

impl fmt::Display for PeriodFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.year, self.quarter) {
            (Some(year), Some(quarter)) => write!(f, "{year}-Q{quarter}"),
            (Some(year), None) => write!(f, "{year}"),
            (None, Some(quarter)) => write!(f, "Q{quarter} (no year)"),
            (None, None) => f.write_str("all available periods"),
        }
    }
}

/// One research question submitted by a caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchRequest {
    /// Natural-language question
    pub question: String,

    /// Period constraint; unconstrained when omitted
    #[serde(default)]
    pub period_filter: PeriodFilter,

    /// Agents to invoke; there is no default
    pub agent_selection: BTreeSet<AgentKind>,
}

impl ResearchRequest {
    /// Create an unconstrained request for the given agents
    pub fn new(
        question: impl Into<String>,
        agent_selection: impl IntoIterator<Item = AgentKind>,
    ) -> Self {
        Self {
            question: question.into(),
            period_filter: PeriodFilter::default(),
            agent_selection: agent_selection.into_iter().collect(),
        }
    }

    /// Set the period filter
    pub fn with_period(mut self, period_filter: PeriodFilter) -> Self {
        self.period_filter = period_filter;
        self
    }

    /// Check the request invariants
    pub fn validate(&self) -> Result<()> {
        if self.agent_selection.is_empty() {
            return Err(Error::InvalidRequest(
                "agent_selection must name at least one agent".to_string(),
            ));
        }
        if self.question.trim().is_empty() {
            return Err(Error::InvalidRequest("question must not be blank".to_string()));
        }
        self.period_filter.validate()
    }
}
