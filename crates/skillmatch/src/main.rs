use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use skillmatch_common::{logger, AppConfig, EmbeddingBackend};
use skillmatch_embed::{provider_from_config, OllamaClient};
use skillmatch_vector::{
    ensure_index, persist, summarize, write_csv, IndexOptions, IndexSource, Recommendation,
    RecommendationEngine,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Find project root by looking for .git directory
fn find_project_root() -> Option<PathBuf> {
    let mut current_dir = std::env::current_dir().ok()?;

    loop {
        if current_dir.join(".git").exists() {
            return Some(current_dir);
        }

        if !current_dir.pop() {
            break;
        }
    }

    None
}

/// Load .env file from project root
fn load_dotenv_from_project_root() {
    if let Some(root) = find_project_root() {
        let env_path = root.join(".env");
        if env_path.exists() {
            dotenv::from_path(&env_path).ok();
        }
    } else {
        dotenv::dotenv().ok();
    }
}

#[derive(Parser)]
#[command(name = "skillmatch")]
#[command(about = "SkillMatch - semantic course recommendations", long_about = None)]
struct Cli {
    /// Config file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Embedding backend override (ollama, hashing)
    #[arg(long, global = true)]
    backend: Option<EmbeddingBackend>,

    /// Course dataset override
    #[arg(long, global = true)]
    dataset: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index, or load it if it is up to date
    Build {
        /// Delete existing artifacts and rebuild
        #[arg(long)]
        force: bool,
    },

    /// Recommend courses for a free-text query
    Recommend {
        /// What you want to learn
        query: String,

        /// Number of recommendations
        #[arg(short, long)]
        k: Option<usize>,

        /// Also write results to this CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show persisted index details
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    load_dotenv_from_project_root();

    let config = load_config(&cli)?;

    // `info` only reads artifacts, so it logs to the console alone
    if matches!(cli.command, Commands::Info) {
        logger::setup_console_logging(&config.log_level)?;
    } else {
        config.ensure_directories()?;
        logger::setup_logging(&config.log_dir, &config.log_level)?;
    }
    tracing::info!("SkillMatch starting...");
    tracing::info!("  Dataset: {}", config.dataset_path.display());
    tracing::info!("  Index: {}/{}", config.index_dir.display(), config.index_name);

    match cli.command {
        Commands::Build { force } => build(&config, force).await,
        Commands::Recommend { query, k, output } => {
            let k = k.unwrap_or(config.default_top_k);
            recommend(&config, &query, k, output).await
        }
        Commands::Info => info(&config),
    }
}

/// Config layers first, then command-line overrides, then one validation
fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::load_layers(cli.config.as_deref())?;
    if let Some(backend) = cli.backend {
        config.embedding_backend = backend;
    }
    if let Some(dataset) = &cli.dataset {
        config.dataset_path = dataset.clone();
    }
    config.validate()?;
    Ok(config)
}

async fn build(config: &AppConfig, force: bool) -> Result<()> {
    let options = IndexOptions::from(config);
    if force {
        options.artifact_paths().remove()?;
    }

    if config.embedding_backend == EmbeddingBackend::Ollama {
        let client =
            OllamaClient::new(config.ollama_base_url.clone(), config.embedding_model.clone())?;
        if !client.test_connection().await.unwrap_or(false) {
            tracing::warn!("Ollama at {} is not reachable", config.ollama_base_url);
        }
    }

    let provider = provider_from_config(config)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner} {msg} [{elapsed}]")?);
    spinner.set_message("Preparing course index...");
    spinner.enable_steady_tick(Duration::from_millis(120));

    let result = ensure_index(&options, provider.as_ref()).await;
    spinner.finish_and_clear();
    let (index, source) = result.context("Failed to prepare course index")?;

    let verb = match source {
        IndexSource::Built => "Built",
        IndexSource::Loaded => "Loaded",
    };
    println!(
        "{} index with {} courses (dimension {}, model {})",
        verb,
        index.len(),
        index.dimension(),
        index.manifest().model_id
    );
    Ok(())
}

async fn recommend(config: &AppConfig, query: &str, k: usize, output: Option<PathBuf>) -> Result<()> {
    let provider = provider_from_config(config)?;
    let engine = RecommendationEngine::open(&IndexOptions::from(config), Arc::clone(&provider))
        .await
        .context("Failed to initialize recommender")?;

    let results = engine.recommend(query, k).await?;
    if results.is_empty() {
        println!("No courses found matching '{}'. Try a different search term.", query);
    } else {
        print_results(&results);
    }

    if let Some(path) = output {
        let file = std::fs::File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        write_csv(file, &results)?;
        println!("Results written to {}", path.display());
    }

    Ok(())
}

fn print_results(results: &[Recommendation]) {
    for (rank, r) in results.iter().enumerate() {
        println!("{}. {}", rank + 1, r.item.title);
        println!("   Offered by: {}", r.item.offered_by);
        println!("   Domain:     {}", r.item.domain);
        println!("   Duration:   {}", r.item.duration);
        println!("   Price:      {}", r.item.price);
        println!("   Similarity: {:.4}", r.score);
    }

    let summary = summarize(results);
    println!();
    println!("Courses found:   {}", summary.count);
    if let Some(avg) = summary.average_price {
        println!("Average price:   {:.0}", avg);
    }
    if let Some(best) = summary.best_score {
        println!("Best match:      {:.4}", best);
    }
}

fn info(config: &AppConfig) -> Result<()> {
    let index = persist::load(&config.index_dir, &config.index_name)
        .context("No usable index; run `skillmatch build` first")?;
    let manifest = index.manifest();

    println!("Courses:     {}", manifest.count);
    println!("Dimension:   {}", manifest.dimension);
    println!("Model:       {}", manifest.model_id);
    println!("Dataset:     {}", manifest.dataset_fingerprint);
    println!(
        "Built at:    {}",
        manifest.built_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    );
    Ok(())
}
