use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use textsift_core::{Embedder, ExtractConfig, TagKind};
use textsift_local::budget::truncate_to_word_budget;
use textsift_local::embed::{
    default_http_client, CachedEmbedder, OllamaEmbedder, OpenAiCompatEmbedder,
};
use textsift_local::pipeline::{finalize, Pipeline, PipelineOutput};
use textsift_local::records::{render_paragraphs, write_jsonl};
use textsift_local::score::TextScorer;
use textsift_local::FsStore;

#[derive(Parser, Debug)]
#[command(name = "textsift")]
#[command(about = "Pull the main prose out of an HTML page", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract, score, filter and dedup blocks; write JSONL and final text (json summary).
    Extract(ExtractCmd),
    /// Containment dedup over an existing JSONL record file.
    Dedup(DedupCmd),
    /// Score one piece of text (json).
    Score(ScoreCmd),
    /// Print version info.
    Version(VersionCmd),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum EmbedBackend {
    Ollama,
    OpenaiCompat,
}

#[derive(clap::Args, Debug)]
struct ExtractCmd {
    /// Input HTML file.
    #[arg(long, default_value = "browser_html.html")]
    html: PathBuf,
    #[arg(long, default_value = "extracted_content.jsonl")]
    output_jsonl: PathBuf,
    #[arg(long, default_value = "extracted_content.txt")]
    output_txt: PathBuf,
    /// Run the semantic (embedding) dedup stage.
    #[arg(long, env = "TEXTSIFT_EMBEDDINGS", default_value_t = false)]
    embeddings: bool,
    #[arg(long, value_enum, default_value = "ollama")]
    embed_backend: EmbedBackend,
    #[arg(long, env = "TEXTSIFT_EMBED_MODEL", default_value = "all-minilm")]
    embed_model: String,
    /// Embedding request timeout.
    #[arg(long, default_value_t = textsift_local::embed::DEFAULT_TIMEOUT_MS)]
    embed_timeout_ms: u64,
    /// Cache vectors on disk under this directory.
    #[arg(long)]
    embed_cache_dir: Option<PathBuf>,
    /// Keep the fingerprint-only result when the embedding backend fails.
    #[arg(long, default_value_t = false)]
    allow_embed_failure: bool,
    #[arg(long, default_value_t = 0.25)]
    min_threshold: f64,
    #[arg(long, default_value_t = 0.60)]
    max_threshold: f64,
    #[arg(long, default_value_t = 70.0)]
    percentile: f64,
    /// Comma-separated block tags (default: h1..h6,p,li,div).
    #[arg(long, value_delimiter = ',')]
    tags: Vec<String>,
    /// Comma-separated stop words replacing the built-in list.
    #[arg(long, value_delimiter = ',')]
    stopwords: Vec<String>,
    /// Cosine cutoff before corpus-size decay.
    #[arg(long, default_value_t = 0.93)]
    semantic_base: f64,
    /// Largest decay subtracted from the semantic cutoff.
    #[arg(long, default_value_t = 0.08)]
    semantic_decay_cap: f64,
    /// Skip nav/header/footer/aside/form and noscript/svg content; drop
    /// cookie/legal/sign-in blocks.
    #[arg(long, default_value_t = false)]
    drop_boilerplate: bool,
    /// Word budget for the final text (0 = unlimited).
    #[arg(long, default_value_t = 0)]
    max_words: usize,
}

#[derive(clap::Args, Debug)]
struct DedupCmd {
    #[arg(long, default_value = "extracted_content.jsonl")]
    input_jsonl: PathBuf,
    #[arg(long, default_value = "extracted_content.txt")]
    output_txt: PathBuf,
    /// Word budget for the final text (0 = unlimited).
    #[arg(long, default_value_t = 0)]
    max_words: usize,
}

#[derive(clap::Args, Debug)]
struct ScoreCmd {
    #[arg(long)]
    text: String,
}

#[derive(clap::Args, Debug)]
struct VersionCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn extract_config(args: &ExtractCmd) -> Result<ExtractConfig> {
    let mut cfg = ExtractConfig::default();
    if args.drop_boilerplate {
        cfg = cfg.with_boilerplate_dropping();
    }
    if !args.tags.is_empty() {
        cfg.block_tags = args
            .tags
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(|t| TagKind::from_tag_name(t).with_context(|| format!("unknown block tag: {t}")))
            .collect::<Result<Vec<_>>>()?;
    }
    if !args.stopwords.is_empty() {
        cfg.stopwords = args
            .stopwords
            .iter()
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
    }
    cfg.threshold.min = args.min_threshold;
    cfg.threshold.max = args.max_threshold;
    cfg.threshold.percentile = args.percentile;
    cfg.semantic.enabled = args.embeddings;
    cfg.semantic.model = args.embed_model.clone();
    cfg.semantic.base = args.semantic_base;
    cfg.semantic.decay_cap = args.semantic_decay_cap;
    Ok(cfg)
}

fn build_embedder(args: &ExtractCmd, model: &str) -> Result<Box<dyn Embedder>> {
    let client = default_http_client()?;
    let inner: Box<dyn Embedder> = match args.embed_backend {
        EmbedBackend::Ollama => Box::new(
            OllamaEmbedder::from_env(client, model)?.with_timeout_ms(args.embed_timeout_ms),
        ),
        EmbedBackend::OpenaiCompat => Box::new(
            OpenAiCompatEmbedder::from_env(client, model)?
                .with_timeout_ms(args.embed_timeout_ms),
        ),
    };
    Ok(match &args.embed_cache_dir {
        Some(dir) => Box::new(CachedEmbedder::new(inner, FsStore::new(dir.clone()))),
        None => inner,
    })
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create output dir {}", parent.display()))?;
    }
    fs::write(path, bytes).with_context(|| format!("write {}", path.display()))
}

/// Second pass from a record file on disk, with an optional word budget.
fn dedup_file(input: &Path, output: &Path, max_words: usize) -> Result<usize> {
    let f = fs::File::open(input).with_context(|| format!("open {}", input.display()))?;
    let mut paragraphs =
        finalize(BufReader::new(f)).with_context(|| format!("read records {}", input.display()))?;
    if max_words > 0 {
        paragraphs = truncate_to_word_budget(&paragraphs, max_words);
    }
    write_file(output, render_paragraphs(&paragraphs).as_bytes())?;
    Ok(paragraphs.len())
}

/// Backend construction and the embedding pass; both count as the model being unavailable.
async fn run_semantic(pipeline: &Pipeline, html: &str, args: &ExtractCmd) -> Result<PipelineOutput> {
    let embedder = build_embedder(args, &pipeline.config().semantic.model)
        .context("embedding backend unavailable")?;
    Ok(pipeline.run(html, Some(&*embedder)).await?)
}

async fn run_extract(args: ExtractCmd) -> Result<serde_json::Value> {
    let bytes = fs::read(&args.html).with_context(|| format!("read {}", args.html.display()))?;
    // Undecodable bytes are dropped rather than rejected.
    let html = String::from_utf8_lossy(&bytes);

    let cfg = extract_config(&args)?;
    let pipeline = Pipeline::new(cfg).context("invalid extraction config")?;

    let mut semantic_status = "off";
    let out: PipelineOutput = if pipeline.config().semantic.enabled {
        match run_semantic(&pipeline, &html, &args).await {
            Ok(out) => {
                semantic_status = "ok";
                out
            }
            Err(e) if args.allow_embed_failure => {
                tracing::warn!(error = %format!("{e:#}"), "semantic dedup skipped");
                semantic_status = "unavailable";
                pipeline.first_pass(&html)
            }
            Err(e) => return Err(e.context("semantic dedup failed")),
        }
    } else {
        pipeline.first_pass(&html)
    };

    let mut jsonl = Vec::new();
    write_jsonl(&mut jsonl, &out.blocks)?;
    write_file(&args.output_jsonl, &jsonl)?;

    let paragraphs = dedup_file(&args.output_jsonl, &args.output_txt, args.max_words)?;

    Ok(serde_json::json!({
        "schema_version": 1,
        "kind": "extract",
        "ok": true,
        "input": args.html.display().to_string(),
        "output_jsonl": args.output_jsonl.display().to_string(),
        "output_txt": args.output_txt.display().to_string(),
        "threshold": out.threshold,
        "semantic": semantic_status,
        "stats": out.stats,
        "records": out.blocks.len(),
        "paragraphs": paragraphs,
    }))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Extract(args) => {
            let v = run_extract(args).await?;
            println!("{v}");
        }
        Commands::Dedup(args) => {
            let paragraphs = dedup_file(&args.input_jsonl, &args.output_txt, args.max_words)?;
            let v = serde_json::json!({
                "schema_version": 1,
                "kind": "dedup",
                "ok": true,
                "input_jsonl": args.input_jsonl.display().to_string(),
                "output_txt": args.output_txt.display().to_string(),
                "paragraphs": paragraphs,
            });
            println!("{v}");
        }
        Commands::Score(args) => {
            let scorer = TextScorer::from_config(&ExtractConfig::default());
            let (score, features) = scorer.score(&args.text);
            let v = serde_json::json!({
                "schema_version": 1,
                "kind": "score",
                "ok": true,
                "score": score,
                "features": features,
            });
            println!("{v}");
        }
        Commands::Version(args) => {
            let v = serde_json::json!({
                "schema_version": 1,
                "kind": "version",
                "ok": true,
                "name": "textsift",
                "version": env!("CARGO_PKG_VERSION"),
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" => println!("textsift {}", env!("CARGO_PKG_VERSION")),
                _ => println!("{v}"),
            }
        }
    }
    Ok(())
}
