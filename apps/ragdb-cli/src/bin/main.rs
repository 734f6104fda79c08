use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use ragdb_chain::{ChatCompletionClient, GenerationConfig, KnowledgeService, RagChain, DEFAULT_K};
use ragdb_core::chunker::ChunkerParams;
use ragdb_core::config::Config;
use ragdb_embed::{default_backend, Embedder};
use ragdb_vector::{LanceVectorStore, RetrievalEngine};

const USAGE: &str = "Usage: ragdb <command> [args...]

Commands:
  ingest <file-or-dir> [--strategy fixed_size|semantic]
  ask \"<question>\" [--k N] [--ticket REF] [--timeout-ms N]
  count
  clear";

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("{USAGE}");
        std::process::exit(1);
    }
    let cmd = args.remove(0);
    (cmd, args)
}

/// Pull the value following a `--flag`, removing both from `args`.
fn take_flag(args: &mut Vec<String>, flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    if pos + 1 >= args.len() {
        eprintln!("Error: {flag} requires a value");
        std::process::exit(1);
    }
    let value = args.remove(pos + 1);
    args.remove(pos);
    Some(value)
}

async fn build_service(config: &Config) -> anyhow::Result<KnowledgeService> {
    let lancedb_dir: String = config
        .get("storage.lancedb_dir")
        .unwrap_or_else(|_| "./data/lancedb".to_string());
    let table: String = config
        .get("storage.table")
        .unwrap_or_else(|_| ragdb_vector::schema::DEFAULT_TABLE.to_string());
    // Relative config paths resolve against the invocation directory.
    let base = env::current_dir()?;
    let lancedb_path = ragdb_core::config::resolve_with_base(&base, &lancedb_dir);
    fs::create_dir_all(&lancedb_path)?;

    let backend = default_backend(config)?;
    let embedder = Embedder::new(backend);
    let dim = embedder.dim();
    let store =
        LanceVectorStore::connect(&lancedb_path.to_string_lossy(), &table, dim).await?;
    let engine = Arc::new(RetrievalEngine::new(embedder, Arc::new(store)));

    let generation: GenerationConfig = config.get("generation")?;
    let completion = Arc::new(ChatCompletionClient::new(generation)?);
    let chain = RagChain::new(engine.clone(), completion);

    let params: ChunkerParams = config.get("chunker").unwrap_or_default();
    Ok(KnowledgeService::new(engine, chain).with_chunker_params(params))
}

fn collect_text_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }
    WalkDir::new(path)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            matches!(
                e.path().extension().and_then(|x| x.to_str()),
                Some("txt" | "md")
            )
        })
        .map(|e| e.path().to_path_buf())
        .collect()
}

async fn cmd_ingest(service: &KnowledgeService, mut args: Vec<String>) -> anyhow::Result<()> {
    let strategy = take_flag(&mut args, "--strategy")
        .unwrap_or_else(|| ragdb_core::chunker::STRATEGY_FIXED_SIZE.to_string());
    let Some(target) = args.first() else {
        eprintln!("Usage: ragdb ingest <file-or-dir> [--strategy fixed_size|semantic]");
        std::process::exit(1);
    };
    let target = ragdb_core::config::expand_path(target);
    let files = collect_text_files(&target);
    if files.is_empty() {
        eprintln!("No .txt or .md files found under {}", target.display());
        std::process::exit(1);
    }

    println!("Ingesting {} file(s) with '{strategy}' chunking", files.len());
    let bar = ProgressBar::new(files.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut total_chunks = 0usize;
    for file in &files {
        let title = file
            .file_stem()
            .map_or_else(|| file.display().to_string(), |s| s.to_string_lossy().to_string());
        bar.set_message(title.clone());
        let content = fs::read_to_string(file)?;
        match service.ingest(&title, &content, &strategy).await {
            Ok(receipt) => {
                total_chunks += receipt.chunk_count;
            }
            Err(e) => {
                tracing::warn!(file = %file.display(), error = %e, "skipping file");
            }
        }
        bar.inc(1);
    }
    bar.finish_and_clear();
    println!("Ingest complete: {total_chunks} chunks from {} file(s)", files.len());
    Ok(())
}

async fn cmd_ask(service: &KnowledgeService, mut args: Vec<String>) -> anyhow::Result<()> {
    let k = match take_flag(&mut args, "--k") {
        Some(raw) => raw.parse::<usize>().map_err(|_| {
            anyhow::anyhow!("--k requires a positive integer, got '{raw}'")
        })?,
        None => DEFAULT_K,
    };
    let ticket = take_flag(&mut args, "--ticket");
    let timeout_ms = match take_flag(&mut args, "--timeout-ms") {
        Some(raw) => Some(raw.parse::<u64>().map_err(|_| {
            anyhow::anyhow!("--timeout-ms requires an integer, got '{raw}'")
        })?),
        None => None,
    };
    let Some(question) = args.first() else {
        eprintln!("Usage: ragdb ask \"<question>\" [--k N] [--ticket REF] [--timeout-ms N]");
        std::process::exit(1);
    };

    let answer = match timeout_ms {
        Some(ms) => {
            service
                .ask_with_deadline(question, k, ticket, Duration::from_millis(ms))
                .await?
        }
        None => service.ask(question, k, ticket).await?,
    };

    println!("{}", answer.answer);
    println!("\nSources:");
    for (i, source) in answer.sources.iter().enumerate() {
        let title = source
            .metadata
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or("untitled");
        println!("  [{}] {} (score {:.4})", i + 1, title, source.score);
    }
    println!(
        "\nretrieval {:.2}ms  generation {:.2}ms  total {:.2}ms  ({} chunks)",
        answer.metrics.retrieval_time_ms,
        answer.metrics.generation_time_ms,
        answer.metrics.total_time_ms,
        answer.metrics.chunks_retrieved
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {e}");
        e
    })?;
    let (cmd, args) = parse_args();
    let service = build_service(&config).await?;

    match cmd.as_str() {
        "ingest" => cmd_ingest(&service, args).await?,
        "ask" => cmd_ask(&service, args).await?,
        "count" => {
            println!("{} indexed chunks", service.count().await?);
        }
        "clear" => {
            service.clear().await?;
            println!("Knowledge base cleared");
        }
        other => {
            eprintln!("Unknown command: {other}\n\n{USAGE}");
            std::process::exit(1);
        }
    }
    Ok(())
}
