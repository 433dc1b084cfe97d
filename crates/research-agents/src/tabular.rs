//! Tabular financial data: metric sets, query specs, and an in-memory table

use crate::collaborators::TabularSource;
use crate::error::CollaboratorError;
use async_trait::async_trait;
use research_core::PeriodFilter;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A group of related metrics queried together
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricSet {
    /// Market value multiples
    Valuation,
    /// Daily price levels
    Price,
    /// Volume and turnover
    Trading,
    /// Moving averages, RSI, volatility
    Technical,
}

impl MetricSet {
    pub const ALL: [MetricSet; 4] = [Self::Valuation, Self::Price, Self::Trading, Self::Technical];

    /// Column names in this set, in display order
    pub fn metrics(&self) -> &'static [&'static str] {
        match self {
            Self::Valuation => &["market_cap", "pe_ratio", "price_to_book"],
            Self::Price => &["open", "high", "low", "close"],
            Self::Trading => &["volume", "dollar_volume"],
            Self::Technical => &["ma10", "ma30", "rsi", "volatility_20d"],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valuation => "valuation",
            Self::Price => "price",
            Self::Trading => "trading",
            Self::Technical => "technical",
        }
    }
}

impl fmt::Display for MetricSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How observations of a metric within one quarter are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Sum,
    Mean,
}

impl Aggregation {
    /// Flows are summed; levels and ratios are averaged
    pub fn for_metric(metric: &str) -> Self {
        match metric {
            "volume" | "dollar_volume" => Self::Sum,
            _ => Self::Mean,
        }
    }

    fn apply(self, values: &[f64]) -> f64 {
        let sum: f64 = values.iter().sum();
        match self {
            Self::Sum => sum,
            Self::Mean => sum / values.len() as f64,
        }
    }
}

/// Canonical metric name for a raw column header
///
/// Accepts the upper-case warehouse headers (`DOLLARVOLUME`,
/// `VOLATILITY20D`) as well as snake_case names.
pub fn canonical_metric(name: &str) -> String {
    let lower = name.trim().to_ascii_lowercase();
    match lower.as_str() {
        "dollarvolume" => "dollar_volume".to_string(),
        "volatility20d" => "volatility_20d".to_string(),
        "marketcap" => "market_cap".to_string(),
        "peratio" | "pe" => "pe_ratio".to_string(),
        "pricetobook" | "pb" => "price_to_book".to_string(),
        _ => lower,
    }
}

/// Periods a query covers, derived from a validated [`PeriodFilter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "range", rename_all = "snake_case")]
pub enum PeriodRange {
    /// Every available period
    All,
    /// All quarters of one year
    Year { year: i32 },
    /// A single quarter
    Quarter { year: i32, quarter: u8 },
}

impl PeriodRange {
    /// Whether a (year, quarter) falls in the range
    pub fn contains(&self, year: i32, quarter: u8) -> bool {
        match *self {
            Self::All => true,
            Self::Year { year: y } => y == year,
            Self::Quarter {
                year: y,
                quarter: q,
            } => y == year && q == quarter,
        }
    }
}

impl From<&PeriodFilter> for PeriodRange {
    fn from(filter: &PeriodFilter) -> Self {
        match (filter.year, filter.quarter) {
            (Some(year), Some(quarter)) => Self::Quarter { year, quarter },
            (Some(year), None) => Self::Year { year },
            _ => Self::All,
        }
    }
}

/// One parameterized aggregate query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuerySpec {
    pub metric_set: MetricSet,
    pub range: PeriodRange,
}

impl QuerySpec {
    pub fn new(metric_set: MetricSet, range: PeriodRange) -> Self {
        Self { metric_set, range }
    }
}

/// Aggregated metrics for one quarter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub year: i32,
    pub quarter: u8,
    /// Metric name to aggregated value; metrics without data are absent
    pub values: BTreeMap<String, f64>,
}

impl MetricRow {
    /// Label in the form `2023-Q2`
    pub fn period_label(&self) -> String {
        format!("{}-Q{}", self.year, self.quarter)
    }
}

/// A raw observation (daily or quarterly) of some metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub year: i32,
    pub quarter: u8,
    pub values: BTreeMap<String, f64>,
}

/// Tabular source holding observations in memory
///
/// Queries aggregate every observation in a quarter per metric, yielding one
/// row per quarter in chronological order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTable {
    observations: Vec<Observation>,
}

impl InMemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observation, canonicalising its metric names
    pub fn push(&mut self, observation: Observation) {
        let Observation {
            year,
            quarter,
            values,
        } = observation;
        let values = values
            .into_iter()
            .map(|(k, v)| (canonical_metric(&k), v))
            .collect();
        self.observations.push(Observation {
            year,
            quarter,
            values,
        });
    }

    /// Number of stored observations
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Distinct (year, quarter) pairs with at least one observation
    pub fn available_periods(&self) -> BTreeSet<(i32, u8)> {
        self.observations
            .iter()
            .map(|o| (o.year, o.quarter))
            .collect()
    }

    fn aggregate(&self, spec: &QuerySpec) -> Vec<MetricRow> {
        let mut grouped: BTreeMap<(i32, u8), BTreeMap<&str, Vec<f64>>> = BTreeMap::new();
        for obs in self
            .observations
            .iter()
            .filter(|o| spec.range.contains(o.year, o.quarter))
        {
            for metric in spec.metric_set.metrics() {
                if let Some(value) = obs.values.get(*metric).filter(|v| v.is_finite()) {
                    grouped
                        .entry((obs.year, obs.quarter))
                        .or_default()
                        .entry(*metric)
                        .or_default()
                        .push(*value);
                }
            }
        }

        grouped
            .into_iter()
            .map(|((year, quarter), metrics)| MetricRow {
                year,
                quarter,
                values: metrics
                    .into_iter()
                    .map(|(name, values)| {
                        let agg = Aggregation::for_metric(name).apply(&values);
                        (name.to_string(), agg)
                    })
                    .collect(),
            })
            .collect()
    }
}

impl FromIterator<Observation> for InMemoryTable {
    fn from_iter<I: IntoIterator<Item = Observation>>(iter: I) -> Self {
        let mut table = Self::new();
        for obs in iter {
            table.push(obs);
        }
        table
    }
}

#[async_trait]
impl TabularSource for InMemoryTable {
    async fn execute(&self, spec: &QuerySpec) -> Result<Vec<MetricRow>, CollaboratorError> {
        Ok(self.aggregate(spec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(year: i32, quarter: u8, pairs: &[(&str, f64)]) -> Observation {
        Observation {
            year,
            quarter,
            values: pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect(),
        }
    }

    fn table() -> InMemoryTable {
        [
            obs(2023, 2, &[("CLOSE", 40.0), ("VOLUME", 100.0)]),
            obs(2023, 2, &[("CLOSE", 44.0), ("VOLUME", 50.0)]),
            obs(2022, 4, &[("CLOSE", 30.0), ("RSI", 55.0)]),
            obs(2023, 1, &[("CLOSE", 35.0), ("DOLLARVOLUME", 7.0)]),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_period_range_from_filter() {
        assert_eq!(
            PeriodRange::from(&PeriodFilter::unconstrained()),
            PeriodRange::All
        );
        assert_eq!(
            PeriodRange::from(&PeriodFilter::year(2023)),
            PeriodRange::Year { year: 2023 }
        );
        assert_eq!(
            PeriodRange::from(&PeriodFilter::quarter(2023, 2)),
            PeriodRange::Quarter {
                year: 2023,
                quarter: 2
            }
        );
    }

    #[tokio::test]
    async fn test_rows_are_chronological_quarter_aggregates() {
        let rows = table()
            .execute(&QuerySpec::new(MetricSet::Price, PeriodRange::All))
            .await
            .unwrap();

        let labels: Vec<_> = rows.iter().map(MetricRow::period_label).collect();
        assert_eq!(labels, vec!["2022-Q4", "2023-Q1", "2023-Q2"]);
        assert_eq!(rows[2].values["close"], 42.0);
        assert!(!rows[2].values.contains_key("volume"));
    }

    #[tokio::test]
    async fn test_flows_are_summed() {
        let rows = table()
            .execute(&QuerySpec::new(
                MetricSet::Trading,
                PeriodRange::Quarter {
                    year: 2023,
                    quarter: 2,
                },
            ))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].values["volume"], 150.0);
    }

    #[tokio::test]
    async fn test_missing_period_yields_no_rows() {
        let rows = table()
            .execute(&QuerySpec::new(
                MetricSet::Valuation,
                PeriodRange::Quarter {
                    year: 2023,
                    quarter: 2,
                },
            ))
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_canonical_metric_names() {
        assert_eq!(canonical_metric("DOLLARVOLUME"), "dollar_volume");
        assert_eq!(canonical_metric("Volatility20D"), "volatility_20d");
        assert_eq!(canonical_metric("MA10"), "ma10");
        assert_eq!(
            table().available_periods().into_iter().next(),
            Some((2022, 4))
        );
    }
}
