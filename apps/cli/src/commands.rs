//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use docweave_core::pipeline::{IngestConfig, IngestResult, ProgressReporter};
use docweave_core::render::render_chapter;
use docweave_search::{Catalog, DebouncedSearch, SearchOptions, SearchResults};
use docweave_shared::{
    AppConfig, Chapter, SearchHit, config_dir, init_config, load_config, load_config_from,
};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// docweave: reconcile document exports into a searchable content tree.
#[derive(Parser)]
#[command(
    name = "docweave",
    version,
    about = "Reconcile a markup export and a paginated text export into one searchable content tree.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.docweave/docweave.toml).
    #[arg(long, global = true, env = "DOCWEAVE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Build the content trees and search indexes for every configured language.
    Ingest {
        /// Output directory (defaults to `[output] dir` from the config).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Print the chapter outline of a language.
    Chapters {
        /// Language code.
        #[arg(short, long, default_value = "en")]
        lang: String,

        /// Artifact directory (defaults to `[output] dir` from the config).
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Print the tree as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Search a language's index.
    Search {
        /// Query text (omit with --interactive).
        query: Option<String>,

        /// Language code.
        #[arg(short, long, default_value = "en")]
        lang: String,

        /// Read one input change per stdin line through the debouncer.
        #[arg(short, long)]
        interactive: bool,

        /// Artifact directory (defaults to `[output] dir` from the config).
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Print hits as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Render one chapter as Markdown.
    Show {
        /// Chapter number.
        number: String,

        /// Language code.
        #[arg(short, long, default_value = "en")]
        lang: String,

        /// Artifact directory (defaults to `[output] dir` from the config).
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "docweave=info",
        1 => "docweave=debug",
        _ => "docweave=trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Ingest { out } => cmd_ingest(config_path.as_deref(), out),
        Command::Chapters { lang, dir, json } => {
            cmd_chapters(config_path.as_deref(), &lang, dir, json)
        }
        Command::Search {
            query,
            lang,
            interactive,
            dir,
            json,
        } => {
            let ctx = ReadContext::open(config_path.as_deref(), &lang, dir)?;
            if interactive {
                cmd_search_interactive(&ctx, &lang, json).await
            } else {
                let query = query
                    .ok_or_else(|| eyre!("a query is required unless --interactive is set"))?;
                cmd_search(&ctx, &query, &lang, json)
            }
        }
        Command::Show { number, lang, dir } => {
            cmd_show(config_path.as_deref(), &number, &lang, dir)
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path.as_deref()),
        },
    }
}

// ---------------------------------------------------------------------------
// Config resolution
// ---------------------------------------------------------------------------

/// Loaded config plus the directory its relative paths resolve against.
struct ResolvedConfig {
    config: AppConfig,
    base_dir: PathBuf,
}

impl ResolvedConfig {
    fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let config = load_config_from(path)?;
                let base_dir = path
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("."));
                Ok(Self { config, base_dir })
            }
            None => {
                let config = load_config()?;
                let dir = config_dir()?;
                let base_dir = if dir.is_dir() { dir } else { std::env::current_dir()? };
                Ok(Self { config, base_dir })
            }
        }
    }

    fn output_dir(&self, explicit: Option<PathBuf>) -> PathBuf {
        explicit.unwrap_or_else(|| self.base_dir.join(&self.config.output.dir))
    }
}

/// Everything the read-side commands need for one language.
struct ReadContext {
    config: AppConfig,
    catalog: Catalog,
}

impl ReadContext {
    fn open(config_path: Option<&Path>, lang: &str, dir: Option<PathBuf>) -> Result<Self> {
        let resolved = ResolvedConfig::load(config_path)?;
        let dir = resolved.output_dir(dir);
        let options = SearchOptions::from(&resolved.config.search);
        let catalog = Catalog::load(&dir, &[lang], &options);
        Ok(Self {
            config: resolved.config,
            catalog,
        })
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_ingest(config_path: Option<&Path>, out: Option<PathBuf>) -> Result<()> {
    let resolved = ResolvedConfig::load(config_path)?;
    let output_dir = resolved.output_dir(out);

    info!(
        languages = resolved.config.languages.len(),
        out = %output_dir.display(),
        "ingesting sources"
    );

    let ingest_config = IngestConfig {
        app: resolved.config,
        base_dir: resolved.base_dir,
        output_dir,
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
    };

    let reporter = CliProgress::new();
    let result = docweave_core::pipeline::ingest(&ingest_config, &reporter)?;

    for warning in &result.warnings {
        warn!("{warning}");
    }

    println!();
    println!("  Content built successfully!");
    println!("  Build:     {}", result.build_id);
    for lang in &result.languages {
        println!(
            "  [{}]      {} chapters, {} index entries",
            lang.code, lang.chapter_count, lang.entry_count
        );
        if let Some(merge) = &lang.merge {
            println!(
                "            merged {} lines, {} blocks after '{}'",
                merge.lines_merged, merge.blocks_added, merge.anchor
            );
        }
    }
    println!("  Warnings:  {}", result.warnings.len());
    println!("  Path:      {}", result.output_dir.display());
    println!("  Time:      {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

fn cmd_chapters(
    config_path: Option<&Path>,
    lang: &str,
    dir: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let ctx = ReadContext::open(config_path, lang, dir)?;
    let chapters = ctx.catalog.list_chapters(lang)?;

    if json {
        println!("{}", serde_json::to_string_pretty(chapters.as_slice())?);
        return Ok(());
    }

    for chapter in chapters.iter() {
        print_outline(chapter);
    }
    Ok(())
}

fn print_outline(chapter: &Chapter) {
    println!("{}. {}  ({})", chapter.number, chapter.title, chapter.slug);
    for section in &chapter.sections {
        println!("  {} {}", section.number, section.title);
        for sub in &section.subsections {
            println!("    {} {}", sub.number, sub.title);
        }
    }
}

fn cmd_search(ctx: &ReadContext, query: &str, lang: &str, json: bool) -> Result<()> {
    let hits = ctx.catalog.search(query, lang)?;
    print_hits(query, &hits, json)
}

/// Each stdin line is one input change; published results are printed as
/// they arrive. At end of input the last pending query is allowed to finish.
async fn cmd_search_interactive(ctx: &ReadContext, lang: &str, json: bool) -> Result<()> {
    let index = ctx.catalog.index(lang)?;
    let delay = Duration::from_millis(ctx.config.search.debounce_ms);
    let mut search = DebouncedSearch::new(index, delay);
    let mut rx = search.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => search.input(&line),
                None => break,
            },
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let results = rx.borrow_and_update().clone();
                print_results(&results, json)?;
            }
        }
    }

    if search.is_pending() {
        let grace = delay + Duration::from_millis(50);
        if tokio::time::timeout(grace, rx.changed()).await.is_ok() {
            let results = rx.borrow_and_update().clone();
            print_results(&results, json)?;
        }
    }
    Ok(())
}

fn print_results(results: &SearchResults, json: bool) -> Result<()> {
    print_hits(&results.query, &results.hits, json)
}

fn print_hits(query: &str, hits: &[SearchHit], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(hits)?);
        return Ok(());
    }

    println!("{} result(s) for '{query}'", hits.len());
    for hit in hits {
        let anchor = if hit.section_id.is_empty() {
            hit.chapter_slug.clone()
        } else {
            format!("{}#{}", hit.chapter_slug, hit.section_id)
        };
        println!("  {}  ({anchor})", hit.title);
        if !hit.snippet.is_empty() {
            println!("      {}", hit.snippet);
        }
    }
    Ok(())
}

fn cmd_show(
    config_path: Option<&Path>,
    number: &str,
    lang: &str,
    dir: Option<PathBuf>,
) -> Result<()> {
    let ctx = ReadContext::open(config_path, lang, dir)?;
    let chapters = ctx.catalog.list_chapters(lang)?;
    let chapter = chapters
        .iter()
        .find(|c| c.number == number)
        .ok_or_else(|| eyre!("no chapter {number} in language '{lang}'"))?;

    print!("{}", render_chapter(chapter));
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Created config file at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let resolved = ResolvedConfig::load(config_path)?;
    println!("# sources resolve against {}", resolved.base_dir.display());
    let toml_str = toml::to_string_pretty(&resolved.config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn language_built(&self, code: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Built [{current}/{total}] {code}"));
    }

    fn done(&self, _result: &IngestResult) {
        self.spinner.finish_and_clear();
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}
