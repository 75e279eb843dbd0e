use colored::Colorize;
use tracing_subscriber::EnvFilter;
use wikigraph::commands::command_argument_builder;
use wikigraph::handlers::{handle_crawl, handle_export, handle_split, handle_status};

#[tokio::main]
async fn main() {
    let matches = command_argument_builder().get_matches();

    let default_level = if matches.get_flag("quiet") {
        "warn"
    } else if matches.get_flag("verbose") {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let result = match matches.subcommand() {
        Some(("crawl", sub_matches)) => handle_crawl(sub_matches).await,
        Some(("export", sub_matches)) => handle_export(sub_matches),
        Some(("status", sub_matches)) => handle_status(sub_matches),
        Some(("split", sub_matches)) => handle_split(sub_matches),
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}
