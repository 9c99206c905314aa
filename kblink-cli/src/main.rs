//! kblink - batch entity linking CLI
//!
//! # Usage
//!
//! ```bash
//! # Alias matching with hyperlink propagation and coreference
//! kblink link articles.jsonl linked.jsonl --linker alias-matcher \
//!     --hyperlink-linker hyperlink-reference --coref kb-coref \
//!     --kb-dir data/kb --annotations annotations.jsonl
//!
//! # Replay precomputed predictions on the first 100 articles
//! kblink link articles.jsonl linked.jsonl --linker prediction-replay \
//!     --predictions predictions.jsonl -n 100
//!
//! # Show stage kinds and the mappings they load
//! kblink info
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};

use kblink::io::{create_output, open_articles, write_article};
use kblink::{
    CorefLinkerKind, EntityDatabase, HyperlinkLinkerKind, LinkerConfig, LinkerKind, LinkingSystem,
    PrecomputedAnnotator, TsvSource,
};

/// Entity linking against Wikidata
#[derive(Parser)]
#[command(name = "kblink", author, version)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Link a JSONL stream of articles
    #[command(visible_alias = "l")]
    Link(LinkArgs),

    /// List stage kinds and the knowledge-base mappings they load
    Info,
}

#[derive(Args)]
struct LinkArgs {
    /// Input articles (JSONL)
    input: PathBuf,

    /// Output articles (JSONL)
    output: PathBuf,

    /// Primary stage
    #[arg(long, default_value = "alias-matcher")]
    linker: LinkerKind,

    /// Optional hyperlink stage, run first
    #[arg(long)]
    hyperlink_linker: Option<HyperlinkLinkerKind>,

    /// Optional coreference stage, run last
    #[arg(long)]
    coref: Option<CorefLinkerKind>,

    /// TOML configuration file
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Knowledge-base directory (overrides the config file)
    #[arg(long)]
    kb_dir: Option<PathBuf>,

    /// Precomputed annotations (JSONL keyed by article id)
    #[arg(long)]
    annotations: Option<PathBuf>,

    /// Predictions for the prediction-replay stage (JSONL)
    #[arg(long)]
    predictions: Option<PathBuf>,

    /// Ignore all-lowercase mentions
    #[arg(long)]
    uppercase: bool,

    /// Process at most N articles
    #[arg(short = 'n', long)]
    limit: Option<usize>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Link(args) => cmd_link(args),
        Commands::Info => {
            cmd_info();
            Ok(())
        }
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(args: &LinkArgs) -> kblink::Result<LinkerConfig> {
    let mut config = match &args.config {
        Some(path) => LinkerConfig::from_file(path)?,
        None => LinkerConfig::default(),
    };
    if let Some(dir) = &args.kb_dir {
        config.kb_dir = dir.clone();
    }
    if args.uppercase {
        config.uppercase_only = true;
    }
    Ok(config)
}

fn cmd_link(args: LinkArgs) -> kblink::Result<()> {
    let config = load_config(&args)?;
    let db = Arc::new(EntityDatabase::new(TsvSource::new(&config.kb_dir)));

    let start = Instant::now();
    let mut builder = LinkingSystem::builder(args.linker).config(config);
    if let Some(kind) = args.hyperlink_linker {
        builder = builder.hyperlink(kind);
    }
    if let Some(kind) = args.coref {
        builder = builder.coref(kind);
    }
    if let Some(path) = &args.predictions {
        builder = builder.predictions(path);
    }
    if let Some(path) = &args.annotations {
        builder = builder.annotator(PrecomputedAnnotator::from_file(path)?);
    }
    let system = builder.build(db)?;
    log::info!(
        "Knowledge base ready in {:.1}s",
        start.elapsed().as_secs_f64()
    );

    let articles = open_articles(&args.input)?.take(args.limit.unwrap_or(usize::MAX));
    let mut out = create_output(&args.output)?;
    let start = Instant::now();
    let report = system.run(articles, |article| write_article(&mut out, article))?;
    std::io::Write::flush(&mut out)?;

    println!("{}", report);
    for failure in &report.failures {
        match failure.article_id {
            Some(id) => println!("  article {}: {}", id, failure.message),
            None => println!("  unreadable: {}", failure.message),
        }
    }
    println!("Linked in {:.1}s", start.elapsed().as_secs_f64());
    Ok(())
}

fn cmd_info() {
    let show = |slot: &str, tag: &str, mappings: &[kblink::MappingName]| {
        let names: Vec<&str> = mappings.iter().map(|m| m.as_str()).collect();
        println!("  {:<12} {:<22} {}", slot, tag, names.join(", "));
    };
    println!("Stage kinds:");
    for kind in HyperlinkLinkerKind::ALL {
        show("hyperlink", kind.as_str(), kind.required_mappings());
    }
    for kind in LinkerKind::ALL {
        show("primary", kind.as_str(), kind.required_mappings());
    }
    for kind in CorefLinkerKind::ALL {
        show("coreference", kind.as_str(), kind.required_mappings());
    }
}
