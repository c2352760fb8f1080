use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use yarb::config::{self, YarbConfig};
use yarb::context::RunContext;
use yarb::digest::{self, Results, WrittenDigest};
use yarb::payload::FeishuPost;
use yarb::transport::{StdoutTransport, Transport, TransportError, TransportKind};
use yarb::{chunker, dispatch, feed, markdown, output, schedule};

#[derive(Parser)]
#[command(name = "yarb")]
#[command(about = "Daily RSS digest pushed to chat bots")]
#[command(long_about = "\
Daily RSS digest pushed to chat bots

Collects yesterday's posts from your feeds and OPML subscription lists,
writes them to a markdown digest, and pushes the digest to chat bots. Long
digests are split into several messages, each within the bot's size limit.

Files (under --output):

  today.md                       # Latest digest
  archive/2026/2026-10-19.md     # Dated copy of every digest
  temp_data.json                 # Entries selected by the last fetch
  rss/<list>.opml                # Subscription lists (refreshed with --update)

Pipeline:
  fetch   feeds → temp_data.json
  digest  temp_data.json → today.md + archive
  push    today.md → bots

Run 'yarb gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Config file (missing file = stock defaults)
    #[arg(long, default_value = "config.toml", global = true)]
    config: PathBuf,

    /// Output directory (overrides digest.output_dir)
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Run date, YYYY-MM-DD (default: today)
    #[arg(long, global = true)]
    date: Option<NaiveDate>,

    /// Log progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch feeds and select yesterday's entries into temp_data.json
    Fetch {
        /// Download subscription lists before reading them
        #[arg(long)]
        update: bool,
    },
    /// Write today.md and the archive copy from temp_data.json
    Digest,
    /// Split a markdown digest into messages and send them
    Push {
        /// Markdown digest to send (default: today.md)
        #[arg(long)]
        file: Option<PathBuf>,
        /// Send to this bot only, enabled or not
        #[arg(long)]
        bot: Option<String>,
        /// Print payloads to stdout instead of sending
        #[arg(long)]
        dry_run: bool,
    },
    /// Run the full pipeline: fetch → digest → push
    Run {
        /// Download subscription lists before reading them
        #[arg(long)]
        update: bool,
        /// Keep running and repeat every day at HH:MM local time
        #[arg(long, value_name = "HH:MM")]
        cron: Option<String>,
    },
    /// Show how a markdown digest would be split, without sending
    Chunk {
        /// Markdown digest to split
        #[arg(long)]
        file: PathBuf,
        /// Message size limit in bytes (default: push.budget)
        #[arg(long)]
        budget: Option<usize>,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let mut config = config::load_config(&cli.config)?;
    if let Some(output) = &cli.output {
        config.digest.output_dir = output.clone();
    }
    init_thread_pool(&config.fetch);

    match cli.command {
        Command::Fetch { update } => {
            let ctx = RunContext::from_config(&config.digest, cli.date);
            let (results, sources) = fetch_stage(&config, &ctx, update)?;
            output::print_fetch_output(&results, sources);
        }
        Command::Digest => {
            let ctx = RunContext::from_config(&config.digest, cli.date);
            let results = digest::read_results(&ctx)?;
            let written = digest_stage(&config, &ctx, &results)?;
            output::print_digest_output(&results, &written);
        }
        Command::Push { file, bot, dry_run } => {
            let ctx = RunContext::from_config(&config.digest, cli.date);
            let path = file.unwrap_or_else(|| ctx.today_path());
            push_stage(&config, &path, bot.as_deref(), dry_run)?;
        }
        Command::Run { update, cron } => {
            let job = || run_pipeline(&config, cli.date, update);
            match cron {
                Some(at) => {
                    schedule::check_run_date(cli.date)?;
                    let at = schedule::parse_daily_time(&at)?;
                    schedule::run_daily(at, job);
                }
                None => job()?,
            }
        }
        Command::Chunk { file, budget } => {
            let text = read_markdown(&file)?;
            let document = markdown::parse_with_fallback(&text, &config.digest.fallback_title);
            let budget = budget.unwrap_or(config.push.budget);
            let chunks = chunker::chunk(&document, budget, &FeishuPost);
            output::print_chunk_plan(&document.title, &chunks, budget);
        }
        // Printed before the config is loaded.
        Command::GenConfig => {}
    }

    Ok(())
}

/// Install the stderr log subscriber. `RUST_LOG`, when set, replaces the
/// level chosen by `--verbose`.
fn init_tracing(verbose: bool) {
    let level = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on fetch config.
///
/// Only feed fetching runs on the pool, so it is sized for network waits.
fn init_thread_pool(fetch: &config::FetchConfig) {
    let threads = config::effective_workers(fetch);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

/// One full run. A fresh context per call, so scheduled runs move with the clock.
fn run_pipeline(
    config: &YarbConfig,
    date: Option<NaiveDate>,
    update: bool,
) -> Result<(), Box<dyn Error>> {
    let ctx = RunContext::from_config(&config.digest, date);
    info!(date = %ctx.date_label(), "starting run");

    println!("==> Stage 1: Fetching feeds");
    let (results, sources) = fetch_stage(config, &ctx, update)?;
    output::print_fetch_output(&results, sources);

    println!("==> Stage 2: Writing digest");
    let written = digest_stage(config, &ctx, &results)?;
    output::print_digest_output(&results, &written);

    println!("==> Stage 3: Pushing {}", written.today.display());
    push_stage(config, &written.today, None, false)
}

fn fetch_stage(
    config: &YarbConfig,
    ctx: &RunContext,
    update: bool,
) -> Result<(Results, usize), Box<dyn Error>> {
    let fetcher = feed::Fetcher::new(&config.fetch);
    let urls = feed::resolve_sources(&config.sources, ctx, update, |url| fetcher.get(url));
    if urls.is_empty() {
        warn!("no feeds configured; add sources.feeds or sources.lists");
    }
    let feeds = feed::collect_digests(&urls, ctx.yesterday(), &config.filter.exclude, |url| {
        fetcher.get(url)
    });
    let results = Results {
        date: ctx.today,
        feeds,
    };
    digest::write_results(ctx, &results)?;
    Ok((results, urls.len()))
}

fn digest_stage(
    config: &YarbConfig,
    ctx: &RunContext,
    results: &Results,
) -> Result<WrittenDigest, digest::DigestError> {
    let title = digest::digest_title(&config.digest.title_prefix, ctx);
    let markdown = digest::render_markdown(&title, &results.feeds);
    digest::write_digest(ctx, &markdown)
}

fn push_stage(
    config: &YarbConfig,
    path: &Path,
    bot: Option<&str>,
    dry_run: bool,
) -> Result<(), Box<dyn Error>> {
    let text = read_markdown(path)?;
    let transports = build_transports(config, bot, dry_run)?;
    if transports.is_empty() {
        warn!("no enabled bots; nothing pushed");
        return Ok(());
    }

    let reports = dispatch::push_markdown(
        &text,
        &config.digest.fallback_title,
        config.push.budget,
        &FeishuPost,
        &transports,
    );
    for report in &reports {
        output::print_dispatch_report(report);
    }
    Ok(())
}

/// Transports to push to: stdout for dry runs, the named bot, or every
/// enabled bot. An enabled bot without a credential is skipped.
fn build_transports(
    config: &YarbConfig,
    bot: Option<&str>,
    dry_run: bool,
) -> Result<Vec<Box<dyn Transport>>, TransportError> {
    if dry_run {
        return Ok(vec![Box::new(StdoutTransport)]);
    }
    if let Some(name) = bot {
        let kind: TransportKind = name.parse()?;
        let bot_config = config.bots.get(name).cloned().unwrap_or_default();
        return Ok(vec![kind.build(&bot_config)?]);
    }

    let mut transports = Vec::new();
    for (name, bot_config) in config.enabled_bots() {
        match name.parse::<TransportKind>().and_then(|kind| kind.build(bot_config)) {
            Ok(transport) => transports.push(transport),
            Err(e) => warn!(bot = name, error = %e, "skipping bot"),
        }
    }
    Ok(transports)
}

fn read_markdown(path: &Path) -> Result<String, Box<dyn Error>> {
    std::fs::read_to_string(path).map_err(|e| format!("reading {}: {e}", path.display()).into())
}
