use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;

use treelight::HighlightClient;

/// Highlight a source file and print the resulting spans.
#[derive(Parser, Debug)]
#[command(name = "treelight", version, about)]
struct Args {
    /// File to highlight
    file: PathBuf,

    /// Filetype to use (inferred from the file extension when omitted)
    #[arg(long, short = 't')]
    filetype: Option<String>,

    /// Data directory for the grammar/query cache
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Print parse/query timing after highlighting
    #[arg(long)]
    performance: bool,
}

fn infer_filetype(path: &PathBuf) -> Option<&'static str> {
    match path.extension()?.to_str()? {
        "js" | "mjs" | "cjs" | "jsx" => Some("javascript"),
        "ts" | "mts" | "cts" | "tsx" => Some("typescript"),
        "txt" => Some(treelight::PLAINTEXT_FILETYPE),
        _ => None,
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let data_dir = args
        .data_dir
        .clone()
        .or_else(treelight::data_paths::default_data_dir)
        .ok_or_else(|| anyhow!("could not determine a data directory"))?;
    treelight::tracing::init(&data_dir);

    let filetype = match args.filetype.as_deref() {
        Some(ft) => ft.to_string(),
        None => infer_filetype(&args.file)
            .ok_or_else(|| {
                anyhow!(
                    "cannot infer filetype for {}; pass --filetype",
                    args.file.display()
                )
            })?
            .to_string(),
    };

    let content = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;

    let client = HighlightClient::new();
    client
        .initialize(Some(data_dir))
        .map_err(|e| anyhow!("engine initialization failed: {}", e))?;

    let highlights = client
        .highlight_once(&content, &filetype)
        .map_err(|e| anyhow!("{}", e))?;

    for (line, line_highlights) in &highlights.lines {
        for span in &line_highlights.spans {
            println!("{}:{}..{} {}", line, span.start_col, span.end_col, span.group);
        }
    }

    if args.performance {
        let stats = client
            .get_performance()
            .map_err(|e| anyhow!("failed to fetch performance stats: {}", e))?;
        eprintln!(
            "parse avg {:.3} ms over {} samples, query avg {:.3} ms over {} samples",
            stats.average_parse_ms,
            stats.parse_samples,
            stats.average_query_ms,
            stats.query_samples
        );
    }

    Ok(())
}
