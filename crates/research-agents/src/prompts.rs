//! Synthesis instructions rendered with MiniJinja

use crate::error::Result;
use minijinja::{Environment, context};

const UNSTRUCTURED: &str = "unstructured";
const LIVE: &str = "live";

const UNSTRUCTURED_TEMPLATE: &str = "\
You are a financial research analyst covering {{ company }}.
Answer the question using ONLY the numbered report excerpts provided. They are \
ordered from most to least relevant and cover {{ period }}.
Cite excerpts by their number. If the excerpts do not answer the question, say so \
instead of guessing.

Question: {{ question }}";

const LIVE_TEMPLATE: &str = "\
You are a financial research analyst covering {{ company }}.
Summarise the current developments relevant to the question using ONLY the \
numbered search results provided.
{% if max_results %}Use at most {{ max_results }} results. {% endif %}\
Attribute each point to its result number and note when results disagree.

Question: {{ question }}";

/// Compiled instruction templates for the narrative agents
pub struct PromptSet {
    env: Environment<'static>,
}

impl PromptSet {
    /// Compile the built-in templates
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template(UNSTRUCTURED, UNSTRUCTURED_TEMPLATE)?;
        env.add_template(LIVE, LIVE_TEMPLATE)?;
        Ok(Self { env })
    }

    /// Instructions for grounding a narrative in report chunks
    pub fn unstructured(&self, company: &str, question: &str, period: &str) -> Result<String> {
        let template = self.env.get_template(UNSTRUCTURED)?;
        Ok(template.render(context! { company, question, period })?)
    }

    /// Instructions for summarising web results
    pub fn live(&self, company: &str, question: &str, max_results: usize) -> Result<String> {
        let template = self.env.get_template(LIVE)?;
        Ok(template.render(context! { company, question, max_results })?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unstructured_prompt() {
        let prompts = PromptSet::new().unwrap();
        let text = prompts
            .unstructured("NVIDIA", "How did gaming revenue change?", "2023-Q2")
            .unwrap();
        assert!(text.starts_with("You are a financial research analyst covering NVIDIA."));
        assert!(text.contains("cover 2023-Q2"));
        assert!(text.ends_with("Question: How did gaming revenue change?"));
    }

    #[test]
    fn test_live_prompt() {
        let prompts = PromptSet::new().unwrap();
        let text = prompts.live("NVIDIA", "latest chips", 5).unwrap();
        assert!(text.contains("Use at most 5 results."));
        assert!(text.contains("Question: latest chips"));
    }
}
