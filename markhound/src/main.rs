use colored::Colorize;
use commands::command_argument_builder;
use markhound::handlers::{handle_crawl, handle_match, handle_resolve};
use markhound_core::print_banner;
use tracing_subscriber::EnvFilter;

mod commands;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    init_tracing(chosen_command.get_flag("verbose"));

    if !quiet {
        print_banner();
    }

    let result = match chosen_command.subcommand() {
        Some(("crawl", primary_command)) => handle_crawl(primary_command).await,
        Some(("match", primary_command)) => handle_match(primary_command),
        Some(("resolve", primary_command)) => handle_resolve(primary_command).await,
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}

/// Logs go to stderr at `warn` unless RUST_LOG or `-v` says otherwise.
fn init_tracing(verbose: bool) {
    let env_filter = if verbose {
        EnvFilter::new("markhound=debug,markhound_core=debug,markhound_scanner=debug,warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
