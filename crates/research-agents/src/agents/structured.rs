//! Structured-query agent over the tabular metric dataset

use crate::collaborators::TabularSource;
use crate::router::MetricRouter;
use crate::tabular::{MetricRow, MetricSet, PeriodRange, QuerySpec};
use async_trait::async_trait;
use futures::future::try_join_all;
use research_core::{
    AgentError, AgentKind, AgentReply, AgentTask, ResearchAgent, Series, VisualPayload,
};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Answers questions about prices, valuation, trading and technicals
///
/// The question is routed to one or more [`MetricSet`]s; each becomes one
/// aggregate query over the period range derived from the task's filter. The
/// narrative is a deterministic digest of the resulting series.
pub struct StructuredAgent {
    source: Arc<dyn TabularSource>,
    router: MetricRouter,
}

impl StructuredAgent {
    pub fn new(source: Arc<dyn TabularSource>) -> Self {
        Self {
            source,
            router: MetricRouter::new(),
        }
    }

    /// Replace the default keyword router
    pub fn with_router(mut self, router: MetricRouter) -> Self {
        self.router = router;
        self
    }

    /// Query specs for a task, in metric-set order
    pub fn plan(&self, task: &AgentTask) -> Vec<QuerySpec> {
        let range = PeriodRange::from(&task.period_filter);
        self.router
            .route(&task.question)
            .into_iter()
            .map(|set| QuerySpec::new(set, range))
            .collect()
    }
}

#[async_trait]
impl ResearchAgent for StructuredAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Structured
    }

    #[instrument(skip(self, task), fields(request_id = %task.request_id, filter = %task.period_filter))]
    async fn execute(&self, task: &AgentTask) -> Result<AgentReply, AgentError> {
        let specs = self.plan(task);
        debug!(queries = specs.len(), "Running aggregate queries");

        let results = try_join_all(specs.iter().map(|spec| self.source.execute(spec)))
            .await
            .map_err(|e| AgentError::QueryExecution(e.to_string()))?;

        let series: Vec<Series> = specs
            .iter()
            .zip(results)
            .flat_map(|(spec, rows)| build_series(spec.metric_set, rows))
            .collect();

        if series.is_empty() {
            return Err(AgentError::NoDataForPeriod(task.period_filter.to_string()));
        }

        let sets: Vec<_> = specs.iter().map(|s| s.metric_set.as_str()).collect();
        info!(series = series.len(), "Structured query complete");

        let narrative = digest(&sets, &task.period_filter.to_string(), &series);
        Ok(AgentReply::new(narrative).with_visual_payload(VisualPayload::new(series)))
    }
}

/// One chronological series per metric of the set that has any value
fn build_series(set: MetricSet, mut rows: Vec<MetricRow>) -> Vec<Series> {
    rows.sort_by_key(|row| (row.year, row.quarter));
    set.metrics()
        .iter()
        .filter_map(|metric| {
            let mut series = Series::new(*metric);
            for row in &rows {
                if let Some(value) = row.values.get(*metric) {
                    series.push(row.period_label(), *value);
                }
            }
            (!series.is_empty()).then_some(series)
        })
        .collect()
}

fn digest(sets: &[&str], period: &str, series: &[Series]) -> String {
    let mut out = format!("Quarterly {} metrics for {period}:\n", sets.join(", "));
    for s in series {
        let _ = writeln!(out, "- {}", describe(s));
    }
    out
}

fn describe(series: &Series) -> String {
    let points = &series.points;
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return format!("**{}**: no observations", series.name);
    };
    if points.len() == 1 {
        return format!("**{}**: {:.2} in {}", series.name, last.value, last.label);
    }

    let min = points
        .iter()
        .min_by(|a, b| a.value.total_cmp(&b.value))
        .unwrap_or(first);
    let max = points
        .iter()
        .max_by(|a, b| a.value.total_cmp(&b.value))
        .unwrap_or(first);
    let mean = points.iter().map(|p| p.value).sum::<f64>() / points.len() as f64;

    let mut text = format!(
        "**{}**: latest {:.2} ({}); low {:.2} ({}), high {:.2} ({}); mean {:.2}",
        series.name, last.value, last.label, min.value, min.label, max.value, max.label, mean
    );
    if first.value.abs() > f64::EPSILON {
        let change = (last.value - first.value) / first.value.abs() * 100.0;
        let _ = write!(text, "; {change:+.1}% since {}", first.label);
    }
    text
}
