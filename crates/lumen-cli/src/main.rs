//! Lumen command-line driver

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use lumen_core::{LumenConfig, ViewMode};
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod surface;

fn cli() -> Command {
    Command::new("lumen")
        .version(lumen_core::VERSION)
        .about("Extract, track and render artifacts from streamed chat transcripts")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::Count)
                .help("Debug logging"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("scan")
                .about("Extract artifacts from a complete transcript")
                .arg(input_arg())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("replay")
                .about("Stream a transcript in chunks and print session events")
                .arg(input_arg())
                .arg(
                    Arg::new("chunk")
                        .long("chunk")
                        .default_value("16")
                        .value_parser(value_parser!(usize))
                        .help("Bytes added per snapshot"),
                ),
        )
        .subcommand(
            Command::new("sanitize")
                .about("Prepare an HTML file for the sandbox")
                .arg(input_arg()),
        )
        .subcommand(
            Command::new("render")
                .about("Render one artifact of a transcript")
                .arg(input_arg())
                .arg(
                    Arg::new("id")
                        .long("id")
                        .help("Artifact to render (default: first completed)"),
                )
                .arg(
                    Arg::new("source")
                        .long("source")
                        .action(ArgAction::SetTrue)
                        .help("Show source instead of the preview"),
                )
                .arg(
                    Arg::new("out")
                        .long("out")
                        .default_value("lumen-preview/index.html")
                        .value_parser(value_parser!(PathBuf))
                        .help("Where sandboxed HTML is written"),
                ),
        )
}

fn input_arg() -> Arg {
    Arg::new("input")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Input file")
}

fn init_tracing(verbosity: u8, json: bool) {
    let default = if verbosity == 0 { "info" } else { "debug" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<LumenConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => LumenConfig::load(path)
            .with_context(|| format!("invalid configuration in {}", path.display())),
        None => Ok(LumenConfig::default()),
    }
}

fn input(args: &ArgMatches) -> anyhow::Result<String> {
    let path = args
        .get_one::<PathBuf>("input")
        .context("missing input file")?;
    commands::read_input(path)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_tracing(
        matches.get_count("verbose"),
        matches.get_flag("log-json"),
    );
    let config = load_config(&matches)?;

    let stdout = std::io::stdout();
    run(&matches, &config, &mut stdout.lock()).await
}

async fn run(
    matches: &ArgMatches,
    config: &LumenConfig,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    match matches.subcommand() {
        Some(("scan", args)) => {
            commands::scan(config, &input(args)?, args.get_flag("json"), out)?;
        }
        Some(("replay", args)) => {
            let chunk = args.get_one::<usize>("chunk").copied().unwrap_or(16);
            let summary = commands::replay(config, &input(args)?, chunk, out).await?;
            tracing::info!(
                snapshots = summary.snapshots,
                persisted = summary.persisted,
                "replay finished"
            );
        }
        Some(("sanitize", args)) => {
            let blocked = commands::sanitize(config, &input(args)?, out)?;
            tracing::info!(blocked = blocked.len(), "sanitized document");
        }
        Some(("render", args)) => {
            let mode = if args.get_flag("source") {
                ViewMode::Source
            } else {
                ViewMode::Preview
            };
            let target = args
                .get_one::<PathBuf>("out")
                .cloned()
                .unwrap_or_else(|| PathBuf::from("lumen-preview/index.html"));
            let id = args.get_one::<String>("id").map(String::as_str);
            commands::render(config, &input(args)?, id, mode, &target, out).await?;
        }
        Some((other, _)) => anyhow::bail!("unknown subcommand `{other}`"),
        None => anyhow::bail!("missing subcommand"),
    }
    Ok(())
}
