//! Command-line interface for company financial research
//!
//! ```bash
//! # Offline, against the bundled fixture
//! research-cli ask "valuation trend" --agents combined --year 2023 --quarter 2 \
//!     --dataset demos/nvidia.json
//!
//! # With live search and an LLM
//! export SERPAPI_API_KEY=...
//! export ANTHROPIC_API_KEY=...
//! research-cli ask "latest data center news" --agents live --dataset demos/nvidia.json
//!
//! # Against a hosted index, embedding queries with the index's own model
//! export PINECONE_API_KEY=... PINECONE_INDEX_HOST=https://...
//! export EMBEDDING_MODEL=all-MiniLM-L6-v2 EMBEDDING_API_BASE=http://localhost:8080/v1
//! research-cli ask "gaming outlook" --agents unstructured --year 2023 \
//!     --dataset demos/nvidia.json --vector-store pinecone
//!
//! research-cli periods --dataset demos/nvidia.json
//! ```

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand, ValueEnum};
use comfy_table::{Table, presets::UTF8_FULL};
use research_agents::embedding::{EmbeddingApiConfig, HashingEmbedder, OpenAIEmbedder};
use research_agents::{
    Collaborators, DispatchMode, Embedder, PineconeClient, PineconeConfig, ResearchConfig, ResearchDataset,
    ResearchOrchestrator, SerpApiClient, SerpApiConfig, VectorStore, WebSearch,
};
use research_core::{AgentKind, PeriodFilter, ResearchRequest};
use research_llm::providers::{AnthropicProvider, OpenAIConfig, OpenAIProvider};
use research_llm::{ExtractiveSynthesizer, LlmSynthesizer, NarrativeSynthesizer};
use research_utils::{EnvSource, LogFormat};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

#[derive(Parser, Debug)]
#[command(name = "research-cli", version)]
#[command(about = "Research a company across metrics, reports and live news", long_about = None)]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ask a research question and print the report
    Ask(AskArgs),
    /// List the periods a dataset covers
    Periods {
        /// Dataset fixture (JSON)
        #[arg(short, long)]
        dataset: PathBuf,
    },
}

#[derive(Args, Debug)]
struct AskArgs {
    /// The research question
    question: String,

    /// Agents to run: structured, unstructured, live, or combined
    #[arg(short, long)]
    agents: String,

    /// Fiscal year
    #[arg(long)]
    year: Option<i32>,

    /// Fiscal quarter (requires --year)
    #[arg(long)]
    quarter: Option<u8>,

    /// Dataset fixture (JSON) with report chunks and metrics
    #[arg(short, long)]
    dataset: PathBuf,

    /// Where report chunks are searched
    #[arg(long, value_enum, default_value_t = StoreChoice::Dataset)]
    vector_store: StoreChoice,

    /// Run agents one after another
    #[arg(long)]
    sequential: bool,

    /// Per-agent deadline in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Print the report as JSON instead of Markdown
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StoreChoice {
    /// Chunks from the dataset, embedded locally
    Dataset,
    /// A hosted Pinecone index (PINECONE_API_KEY, PINECONE_INDEX_HOST),
    /// queried through an embeddings API (EMBEDDING_MODEL)
    Pinecone,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    research_utils::init_tracing_with(format, "warn,research_agents=info");

    match cli.command {
        Command::Ask(args) => ask(args).await,
        Command::Periods { dataset } => periods(dataset).await,
    }
}

async fn ask(args: AskArgs) -> anyhow::Result<()> {
    let env = EnvSource::Process;
    let dataset = ResearchDataset::load(&args.dataset)
        .await
        .with_context(|| format!("failed to load dataset {}", args.dataset.display()))?;

    let mut config = ResearchConfig::from_env()?;
    if env.get("RESEARCH_COMPANY").is_none() {
        if let Some(company) = &dataset.company {
            config.company.clone_from(company);
        }
    }
    if args.sequential {
        config.dispatch_mode = DispatchMode::Sequential;
    }
    if let Some(secs) = args.timeout_secs {
        config.agent_timeout = Duration::from_secs(secs);
    }
    config.validate()?;

    let request = ResearchRequest::new(&args.question, AgentKind::parse_selection(&args.agents)?)
        .with_period(PeriodFilter {
            year: args.year,
            quarter: args.quarter,
        });

    let embedder = query_embedder(&env, args.vector_store)?;
    let tabular = Arc::new(dataset.to_table());
    let vector_store: Arc<dyn VectorStore> = match args.vector_store {
        StoreChoice::Dataset => Arc::new(dataset.into_vector_store(embedder.as_ref()).await?),
        StoreChoice::Pinecone => Arc::new(PineconeClient::new(PineconeConfig::from_source(&env)?)?),
    };

    let orchestrator = ResearchOrchestrator::with_collaborators(
        &config,
        Collaborators {
            embedder,
            vector_store,
            tabular,
            web_search: web_search(&env, &config)?,
            synthesizer: synthesizer(&env, &config)?,
        },
    )?;

    info!(company = %config.company, mode = %config.dispatch_mode, "Submitting request");
    let report = orchestrator.submit_research_request(request).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.to_markdown());
    }
    if report.is_partial() {
        warn!("Report is partial; see the failed or skipped sections");
    }
    Ok(())
}

/// Query embedder matching the vector space of the chosen store
fn query_embedder(env: &EnvSource, store: StoreChoice) -> anyhow::Result<Arc<dyn Embedder>> {
    match store {
        StoreChoice::Dataset => Ok(Arc::new(HashingEmbedder::default())),
        StoreChoice::Pinecone => {
            let config = EmbeddingApiConfig::from_source(env).context(
                "--vector-store pinecone needs the embedding model that built the index",
            )?;
            info!(
                model = %config.model,
                api_base = %config.api_base,
                "Embedding queries remotely"
            );
            Ok(Arc::new(OpenAIEmbedder::new(config)?))
        }
    }
}

/// SerpAPI when a key is present
fn web_search(
    env: &EnvSource,
    config: &ResearchConfig,
) -> anyhow::Result<Option<Arc<dyn WebSearch>>> {
    if env.get("SERPAPI_API_KEY").is_none() {
        return Ok(None);
    }
    let serp = SerpApiConfig::from_source(env)?
        .with_rate_limit(config.search_rate_limit_per_minute);
    Ok(Some(Arc::new(SerpApiClient::new(serp)?)))
}

/// Anthropic, then OpenAI-compatible, then the offline extractive synthesizer
fn synthesizer(
    env: &EnvSource,
    config: &ResearchConfig,
) -> anyhow::Result<Arc<dyn NarrativeSynthesizer>> {
    if env.get("ANTHROPIC_API_KEY").is_some() {
        let provider = Arc::new(AnthropicProvider::from_env()?);
        info!(model = %config.model, "Using Anthropic for synthesis");
        return Ok(Arc::new(
            LlmSynthesizer::new(provider, config.model.clone())
                .with_max_tokens(config.max_tokens)
                .with_temperature(config.temperature),
        ));
    }

    if env.get("OPENAI_API_KEY").is_some() {
        let model = env
            .get("OPENAI_MODEL")
            .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());
        let provider = Arc::new(OpenAIProvider::with_config(OpenAIConfig::from_env()?)?);
        info!(model = %model, "Using OpenAI-compatible endpoint for synthesis");
        return Ok(Arc::new(
            LlmSynthesizer::new(provider, model)
                .with_max_tokens(config.max_tokens)
                .with_temperature(config.temperature),
        ));
    }

    warn!("No LLM API key set; narratives will quote evidence verbatim");
    Ok(Arc::new(ExtractiveSynthesizer::new()))
}

async fn periods(path: PathBuf) -> anyhow::Result<()> {
    let dataset = ResearchDataset::load(&path)
        .await
        .with_context(|| format!("failed to load dataset {}", path.display()))?;

    let mut counts: BTreeMap<(i32, u8), (usize, usize)> = dataset
        .available_periods()
        .into_iter()
        .map(|period| (period, (0, 0)))
        .collect();
    for chunk in &dataset.chunks {
        counts.entry((chunk.year, chunk.quarter)).or_default().0 += 1;
    }
    for record in &dataset.metrics {
        counts.entry((record.year, record.quarter)).or_default().1 += 1;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Year", "Quarter", "Report chunks", "Metric rows"]);
    for ((year, quarter), (chunks, rows)) in counts {
        table.add_row(vec![
            year.to_string(),
            format!("Q{quarter}"),
            chunks.to_string(),
            rows.to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}
