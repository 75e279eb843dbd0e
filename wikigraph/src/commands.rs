use crate::CLAP_STYLING;
use clap::{arg, command};
use std::path::PathBuf;

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("wikigraph")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("wikigraph")
        .about("Crawl Wikipedia breadth-first from a seed article and export a topic graph")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Only print warnings and errors, no progress spinner")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-v --"verbose" "Enable debug logging")
                .required(false)
                .global(true)
                .conflicts_with("quiet"),
        )
        .arg(
            arg!(-c --"config" <PATH>)
                .required(false)
                .help("JSON config file; command line flags override its values")
                .value_parser(clap::value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            arg!(-d --"data-dir" <DIR>)
                .required(false)
                .help("Directory holding edges.json and progress.json (default: data)")
                .global(true),
        )
        .arg(
            arg!(-p --"public-dir" <DIR>)
                .required(false)
                .help("Directory graph.json is exported to (default: public)")
                .global(true),
        )
        .arg(
            arg!(-r --"root" <TITLE>)
                .required(false)
                .help("Seed article title (default: Architecture)")
                .global(true),
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            command!("crawl")
                .about(
                    "Crawl from the root article, resuming any saved progress. Exports the \
                graph when the crawl stops.",
                )
                .arg(
                    arg!(-m --"max-depth" <DEPTH>)
                        .required(false)
                        .help("Deepest crawl depth to record links for (default: 2)")
                        .value_parser(clap::value_parser!(u32)),
                )
                .arg(
                    arg!(-e --"export-depth" <DEPTH>)
                        .required(false)
                        .help("Deepest node depth written to graph.json (default: max depth)")
                        .value_parser(clap::value_parser!(u32)),
                )
                .arg(
                    arg!(-b --"batch-size" <PAGES>)
                        .required(false)
                        .help("Pages taken from the frontier per batch; state is saved after each")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(-t --"concurrency" <REQUESTS>)
                        .required(false)
                        .help("Maximum page fetches in flight")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"rate-limit" <SECONDS>)
                        .required(false)
                        .help("Minimum delay between request starts")
                        .value_parser(clap::value_parser!(f64)),
                )
                .arg(
                    arg!(--"link-mode" <MODE>)
                        .required(false)
                        .help("Scrape rendered articles or use the MediaWiki links API")
                        .value_parser(["article", "api"]),
                )
                .arg(
                    arg!(--"base-url" <URL>)
                        .required(false)
                        .help("Wiki base URL (default: https://en.wikipedia.org)"),
                )
                .arg(
                    arg!(--"user-agent" <AGENT>)
                        .required(false)
                        .help("User-Agent header sent with every request"),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Request timeout in seconds")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(--"keep-qualifiers")
                        .required(false)
                        .help("Keep trailing parenthetical qualifiers such as '(architecture)' in titles")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"no-export")
                        .required(false)
                        .help("Do not write graph.json when the crawl stops")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            command!("export")
                .about("Re-export graph.json from the saved crawl state")
                .arg(
                    arg!(-e --"export-depth" <DEPTH>)
                        .required(false)
                        .help("Deepest node depth written to the graph (default: max depth)")
                        .value_parser(clap::value_parser!(u32)),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Write the graph here instead of <public-dir>/graph.json")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            command!("status")
                .about("Show crawl progress and time estimates for the remaining queue")
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                ),
        )
        .subcommand(
            command!("split")
                .about("Split graph.json into an inner and an outer graph at a depth boundary")
                .arg(
                    arg!(-B --"boundary" <DEPTH>)
                        .required(false)
                        .help("Nodes shallower than this go to the inner graph")
                        .value_parser(clap::value_parser!(u32))
                        .default_value("2"),
                )
                .arg(
                    arg!(-i --"input" <PATH>)
                        .required(false)
                        .help("Graph to split (default: <public-dir>/graph.json)")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-o --"output-dir" <DIR>)
                        .required(false)
                        .help("Directory for graph_inner.json and graph_outer.json (default: next to the input)")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
}
