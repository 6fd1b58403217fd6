//! `bedtime`: generate personalized bedtime stories from the command line.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bedtime_core::{Gender, StoryKey, StoryRequest, TemplateStoryteller};
use bedtime_runtime::orchestrator::StoryOrchestratorBuilder;
use bedtime_runtime::{ProviderRegistry, RuntimeConfig, StoryOrchestrator};

mod offline;

use offline::OfflineAgent;

#[derive(Parser)]
#[command(name = "bedtime")]
#[command(about = "Personalized bedtime stories with a template fallback", long_about = None)]
#[command(version)]
struct Cli {
    /// More log output (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a story
    Generate {
        #[command(flatten)]
        story: StoryArgs,

        /// Runtime configuration file (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Never call a model; always tell a template story
        #[arg(long)]
        offline: bool,

        /// Seed for template selection
        #[arg(long)]
        seed: Option<u64>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the cache key for a request
    Key {
        #[command(flatten)]
        story: StoryArgs,
    },

    /// Print the effective configuration as YAML
    Config {
        /// Configuration file to load instead of the defaults
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args)]
struct StoryArgs {
    /// The child's name
    #[arg(short, long)]
    name: String,

    /// Something the child loves (repeat for more)
    #[arg(short, long = "interest", required = true)]
    interests: Vec<String>,

    /// Story theme, e.g. adventure, friendship, magic, space
    #[arg(short, long)]
    theme: String,

    #[arg(short, long, value_enum, default_value_t = GenderArg::Neutral)]
    gender: GenderArg,
}

#[derive(Clone, Copy, ValueEnum)]
enum GenderArg {
    Boy,
    Girl,
    Neutral,
}

impl From<GenderArg> for Gender {
    fn from(arg: GenderArg) -> Self {
        match arg {
            GenderArg::Boy => Gender::Boy,
            GenderArg::Girl => Gender::Girl,
            GenderArg::Neutral => Gender::Neutral,
        }
    }
}

impl StoryArgs {
    fn request(&self) -> StoryRequest {
        StoryRequest::new(
            &self.name,
            &self.interests,
            &self.theme,
            self.gender.into(),
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Generate {
            story,
            config,
            offline,
            seed,
            json,
        } => {
            let config = load_config(config.as_deref())?;
            let orchestrator = build_orchestrator(config, offline, seed)?;

            let result = orchestrator.generate(&story.request()).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", result.story);
            }

            let usage = orchestrator.usage();
            tracing::debug!(
                source = %result.story.source,
                cached = result.cached,
                llm_calls = usage.llm.llm_calls,
                tokens = usage.llm.total_tokens,
                cost_usd = usage.llm.estimated_cost,
                "Done"
            );
        }
        Commands::Key { story } => {
            let request = story.request();
            request.validate()?;
            println!("{}", StoryKey::for_request(&request));
        }
        Commands::Config { config } => {
            let config = load_config(config.as_deref())?;
            print!("{}", config.to_yaml()?);
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<&Path>) -> Result<RuntimeConfig> {
    let mut config = match path {
        Some(path) => RuntimeConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => RuntimeConfig::default(),
    };
    config
        .apply_env_overrides()
        .context("applying environment overrides")?;
    Ok(config)
}

fn build_orchestrator(
    config: RuntimeConfig,
    offline: bool,
    seed: Option<u64>,
) -> Result<StoryOrchestrator> {
    let storyteller = Arc::new(match seed {
        Some(seed) => TemplateStoryteller::seeded(seed),
        None => TemplateStoryteller::new(),
    });

    let builder = if offline || config.provider.is_none() {
        if !offline {
            tracing::info!("No provider configured, telling template stories");
        }
        offline_builder(config)
    } else {
        match StoryOrchestratorBuilder::from_config(config.clone(), &ProviderRegistry::with_defaults()) {
            Ok(builder) => builder,
            Err(e) => {
                tracing::warn!(error = %e, "Provider unavailable, telling template stories");
                offline_builder(config)
            }
        }
    };

    Ok(builder.storyteller(storyteller).build()?)
}

fn offline_builder(config: RuntimeConfig) -> StoryOrchestratorBuilder {
    StoryOrchestrator::builder()
        .config(config)
        .agent(Arc::new(OfflineAgent))
}
