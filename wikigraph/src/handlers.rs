use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use colored::Colorize;
use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;
use tracing::warn;
use wikigraph_core::graph::{self, read_snapshot, split_snapshot, write_split};
use wikigraph_core::report::{ProgressReport, ReportFormat};
use wikigraph_core::{CrawlConfig, CrawlDriver, ShutdownHandle, StateStore};
use wikigraph_scanner::{LinkMode, WikipediaClient};

// Argument helpers. Subcommands only define some of the ids, so lookups
// must tolerate unknown ids.

fn arg_value<T: Clone + Send + Sync + 'static>(args: &ArgMatches, id: &str) -> Option<T> {
    args.try_get_one::<T>(id).ok().flatten().cloned()
}

fn flag(args: &ArgMatches, id: &str) -> bool {
    args.try_get_one::<bool>(id)
        .ok()
        .flatten()
        .copied()
        .unwrap_or(false)
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_header(title: &str) {
    print_divider();
    println!("{}", format!("  {}", title).bright_white().bold());
    print_divider();
    println!();
}

/// Build the effective config: defaults, then the `--config` file, then
/// command line flags.
pub fn resolve_config(args: &ArgMatches) -> Result<CrawlConfig> {
    let mut config = match arg_value::<PathBuf>(args, "config") {
        Some(path) => CrawlConfig::from_file(&path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?,
        None => CrawlConfig::default(),
    };

    if let Some(root) = arg_value::<String>(args, "root") {
        config.root_title = root;
    }
    if let Some(dir) = arg_value::<String>(args, "data-dir") {
        config.data_dir = dir;
    }
    if let Some(dir) = arg_value::<String>(args, "public-dir") {
        config.public_dir = dir;
    }
    if let Some(depth) = arg_value::<u32>(args, "max-depth") {
        config.max_depth = depth;
    }
    if let Some(depth) = arg_value::<u32>(args, "export-depth") {
        config.max_export_depth = Some(depth);
    }
    if let Some(size) = arg_value::<usize>(args, "batch-size") {
        config.batch_size = size;
    }
    if let Some(concurrency) = arg_value::<usize>(args, "concurrency") {
        config.concurrency = concurrency;
    }
    if let Some(delay) = arg_value::<f64>(args, "rate-limit") {
        config.rate_limit_delay = delay;
    }
    if let Some(mode) = arg_value::<String>(args, "link-mode") {
        config.link_mode = mode.parse::<LinkMode>().map_err(anyhow::Error::msg)?;
    }
    if let Some(url) = arg_value::<String>(args, "base-url") {
        config.wiki_base_url = url;
    }
    if let Some(agent) = arg_value::<String>(args, "user-agent") {
        config.user_agent = agent;
    }
    if let Some(timeout) = arg_value::<u64>(args, "timeout") {
        config.timeout_secs = timeout;
    }
    if flag(args, "keep-qualifiers") {
        config.strip_qualifiers = false;
    }
    if flag(args, "no-export") {
        config.export_on_finish = false;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Trigger `shutdown` on Ctrl-C, or on SIGTERM where the platform has it.
/// Handlers are registered before this returns. Must be called inside a
/// tokio runtime.
pub fn spawn_shutdown_listener(shutdown: ShutdownHandle) -> std::io::Result<JoinHandle<()>> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;
        Ok(tokio::spawn(async move {
            let received = tokio::select! {
                _ = interrupt.recv() => "Interrupt",
                _ = terminate.recv() => "Terminate signal",
            };
            warn!("{} received, finishing the current batch", received);
            shutdown.trigger();
        }))
    }

    #[cfg(not(unix))]
    {
        Ok(tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, finishing the current batch");
                shutdown.trigger();
            }
        }))
    }
}

pub async fn handle_crawl(args: &ArgMatches) -> Result<()> {
    let config = resolve_config(args)?;
    let quiet = flag(args, "quiet");

    print_header("WIKIGRAPH CRAWL");
    println!("{} Root: {}", "→".blue(), config.root().bright_white());
    println!(
        "{} Max depth: {} (export depth {})",
        "→".blue(),
        config.max_depth.to_string().cyan(),
        config.export_depth().to_string().cyan()
    );
    println!(
        "{} Batch size: {}, concurrency: {}",
        "→".blue(),
        config.batch_size.to_string().cyan(),
        config.concurrency.to_string().cyan()
    );
    println!("{} Link mode: {}", "→".blue(), config.link_mode.to_string().cyan());
    println!(
        "{} Data: {}",
        "→".blue(),
        config.data_path().display().to_string().bright_white()
    );
    println!();

    let client = WikipediaClient::new(config.client_options()?)
        .context("Failed to build the HTTP client")?;
    let store = StateStore::new(config.data_path());
    let mut driver = CrawlDriver::new(client, store, config.crawl_options(!quiet));

    spawn_shutdown_listener(driver.shutdown_handle())
        .context("Failed to install signal handlers")?;

    let summary = driver.run().await.context("Crawl failed")?;

    println!();
    print_divider();
    if summary.cancelled {
        println!("{}", "  CRAWL STOPPED".yellow().bold());
    } else {
        println!("{}", "  CRAWL COMPLETE".green().bold());
    }
    print_divider();
    println!();
    println!(
        "{} Pages processed: {}",
        "✓".green().bold(),
        summary.stats.pages_processed.to_string().cyan()
    );
    println!(
        "{} Edges: {} ({} new this run)",
        "✓".green().bold(),
        summary.edges.to_string().cyan(),
        summary.stats.edges_added.to_string().cyan()
    );
    println!(
        "{} Visited: {}, still queued: {}",
        "✓".green().bold(),
        summary.visited.to_string().cyan(),
        summary.pending.to_string().cyan()
    );
    println!(
        "{} Rate: {:.2} pages/second",
        "✓".green().bold(),
        summary.stats.pages_per_second()
    );
    if summary.stats.failures > 0 {
        println!(
            "{} {} pages failed and will be retried on the next crawl",
            "⚠".yellow().bold(),
            summary.stats.failures
        );
    }
    if summary.cancelled {
        println!(
            "{} Progress saved, run crawl again to resume",
            "→".yellow().bold()
        );
    }
    if let Some(export) = summary.export {
        println!(
            "{} Graph: {} ({} nodes, {} links)",
            "✓".green().bold(),
            export.path.display().to_string().bright_white(),
            export.nodes,
            export.links
        );
    }
    println!();
    Ok(())
}

pub fn handle_export(args: &ArgMatches) -> Result<()> {
    let config = resolve_config(args)?;
    let store = StateStore::new(config.data_path());
    if !store.exists() {
        bail!(
            "No crawl data found in {}, run crawl first",
            store.data_dir().display()
        );
    }

    let state = store.try_load().context("Failed to load crawl state")?;
    let path = arg_value::<PathBuf>(args, "output").unwrap_or_else(|| config.graph_path());
    let export = graph::export(
        state.edges(),
        &config.root(),
        config.export_depth(),
        &path,
    )
    .context("Export failed")?;

    println!(
        "{} Exported {} nodes and {} links (depth ≤ {}) to {}",
        "✓".green().bold(),
        export.nodes.to_string().cyan(),
        export.links.to_string().cyan(),
        export.max_depth,
        export.path.display().to_string().bright_white()
    );
    Ok(())
}

pub fn handle_status(args: &ArgMatches) -> Result<()> {
    let config = resolve_config(args)?;
    let format = arg_value::<String>(args, "format")
        .map(|f| f.parse::<ReportFormat>())
        .transpose()
        .map_err(anyhow::Error::msg)?
        .unwrap_or(ReportFormat::Text);

    let store = StateStore::new(config.data_path());
    if !store.exists() {
        println!(
            "{} No crawl data found in {}",
            "→".blue(),
            store.data_dir().display().to_string().bright_white()
        );
        return Ok(());
    }

    let state = store.try_load().context("Failed to load crawl state")?;
    let report = ProgressReport::from_state(&state, config.max_depth);
    print!("{}", report.render(format)?);
    if format == ReportFormat::Json {
        println!();
    }
    Ok(())
}

pub fn handle_split(args: &ArgMatches) -> Result<()> {
    let config = resolve_config(args)?;
    let input = arg_value::<PathBuf>(args, "input").unwrap_or_else(|| config.graph_path());
    let boundary = arg_value::<u32>(args, "boundary").unwrap_or(2);
    let output_dir = arg_value::<PathBuf>(args, "output-dir").unwrap_or_else(|| {
        input
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| config.public_path())
    });

    let snapshot = read_snapshot(&input)
        .with_context(|| format!("Failed to read graph {}", input.display()))?;
    let (inner, outer) = split_snapshot(&snapshot, boundary);
    let (inner_path, outer_path) =
        write_split(&output_dir, &inner, &outer).context("Failed to write split graphs")?;

    println!(
        "{} Depth < {}: {} nodes, {} links → {}",
        "✓".green().bold(),
        boundary,
        inner.nodes.len().to_string().cyan(),
        inner.links.len().to_string().cyan(),
        inner_path.display().to_string().bright_white()
    );
    println!(
        "{} Depth ≥ {}: {} nodes, {} links → {}",
        "✓".green().bold(),
        boundary,
        outer.nodes.len().to_string().cyan(),
        outer.links.len().to_string().cyan(),
        outer_path.display().to_string().bright_white()
    );
    Ok(())
}
