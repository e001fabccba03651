use crate::CLAP_STYLING;
use clap::{arg, command};

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("markhound")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("markhound")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner and non-essential output")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-v --"verbose" "Show debug logging")
                .required(false)
                .global(true),
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            command!("crawl")
                .about(
                    "Crawl a partner site and report every place it mentions or links to the \
                brand.",
                )
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(true)
                        .help("The site to crawl (https:// is assumed when no scheme is given)"),
                )
                .arg(
                    arg!(-m --"mode" <MODE>)
                        .required(false)
                        .help("Traversal policy: quick (1 page), standard (100), complete (1000)")
                        .value_parser(["quick", "standard", "complete"])
                        .default_value("standard"),
                )
                .args(matcher_args())
                .arg(
                    arg!(-K --"keywords-file" <PATH>)
                        .required(false)
                        .help("Newline-delimited keyword file, replacing the default keywords")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(--"on-match" <ACTION>)
                        .required(false)
                        .help(
                            "What a standard crawl does when it finds matches: stop, continue \
                        with the current batch, or skip to the next category",
                        )
                        .value_parser(["stop", "continue", "next-category"])
                        .default_value("stop"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help(
                            "Save the report to a file, or to a timestamped file inside a \
                        directory (default: display to screen)",
                        ),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: csv, json, text")
                        .value_parser(["csv", "json", "text"])
                        .default_value("csv"),
                ),
        )
        .subcommand(
            command!("match")
                .about("Test a piece of text or a URL against the keyword patterns")
                .arg(arg!(<TEXT>).required(true).help("The text to test"))
                .args(matcher_args()),
        )
        .subcommand(
            command!("resolve")
                .about("Follow the redirects of a URL and show every hop")
                .arg(arg!(<URL>).required(true).help("The URL to resolve")),
        )
}

fn matcher_args() -> [clap::Arg; 3] {
    [
        arg!(-k --"keyword" <KEYWORD>)
            .required(false)
            .help("Keyword to look for; repeat for several (replaces the defaults)")
            .action(clap::ArgAction::Append),
        arg!(--"brand-domain" <DOMAIN>)
            .required(false)
            .help("Brand domain matched inside URLs (default: gowithguide.com)"),
        arg!(--"partner-id" <ID>)
            .required(false)
            .help("Numeric partner id matched inside URLs (default: 87121)"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_and_verbose_accepted_after_subcommand() {
        let matches = command_argument_builder()
            .try_get_matches_from(["markhound", "crawl", "-u", "blog.test", "-q", "-v"])
            .unwrap();
        assert!(matches.get_flag("quiet"));
        assert!(matches.get_flag("verbose"));
    }

    #[test]
    fn test_quiet_accepted_before_subcommand() {
        let matches = command_argument_builder()
            .try_get_matches_from(["markhound", "-q", "match", "gowithguide"])
            .unwrap();
        assert!(matches.get_flag("quiet"));
    }
}
