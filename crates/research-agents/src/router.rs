//! Keyword routing from a research question to metric sets
//!
//! The structured agent has no LLM in the loop: a question is mapped to the
//! metric sets whose vocabulary it mentions, falling back to prices.

use crate::tabular::MetricSet;
use std::collections::BTreeSet;

/// Keywords per metric set
mod keywords {
    pub const VALUATION: &[&str] = &[
        "valuation",
        "valued",
        "market cap",
        "market capitalization",
        "p/e",
        "pe ratio",
        "price to earnings",
        "price to book",
        "p/b",
        "multiple",
        "multiples",
        "worth",
    ];

    pub const PRICE: &[&str] = &[
        "price",
        "prices",
        "share price",
        "stock price",
        "close",
        "closing",
        "open",
        "opening",
        "high",
        "low",
        "performance",
        "return",
        "returns",
    ];

    pub const TRADING: &[&str] = &[
        "volume",
        "volumes",
        "dollar volume",
        "liquidity",
        "turnover",
        "traded",
        "trading activity",
    ];

    pub const TECHNICAL: &[&str] = &[
        "technical",
        "rsi",
        "moving average",
        "moving averages",
        "ma10",
        "ma30",
        "volatility",
        "volatile",
        "momentum",
        "overbought",
        "oversold",
        "trend",
    ];
}

/// Maps questions to the metric sets they ask about
#[derive(Debug, Clone, Default)]
pub struct MetricRouter {
    fallback: Option<MetricSet>,
}

impl MetricRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Metric set used when no keyword matches (default: [`MetricSet::Price`])
    pub fn with_fallback(mut self, fallback: MetricSet) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Every metric set the question mentions, never empty
    pub fn route(&self, question: &str) -> BTreeSet<MetricSet> {
        let normalized = normalize(question);
        let mut sets = BTreeSet::new();

        for (set, words) in [
            (MetricSet::Valuation, keywords::VALUATION),
            (MetricSet::Price, keywords::PRICE),
            (MetricSet::Trading, keywords::TRADING),
            (MetricSet::Technical, keywords::TECHNICAL),
        ] {
            if Self::matches_any(&normalized, words) {
                sets.insert(set);
            }
        }

        if sets.is_empty() {
            sets.insert(self.fallback.unwrap_or(MetricSet::Price));
        }
        tracing::debug!(?sets, "Routed question to metric sets");
        sets
    }

    /// Whole-word (or whole-phrase) match against a normalized question
    fn matches_any(normalized: &str, words: &[&str]) -> bool {
        words
            .iter()
            .any(|word| normalized.contains(&format!(" {word} ")))
    }
}

/// Lowercase, punctuation to spaces (keeping `/`), padded with spaces
fn normalize(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '/' {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();
    let words: Vec<&str> = cleaned.split_whitespace().collect();
    format!(" {} ", words.join(" "))
}
