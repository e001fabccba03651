use anyhow::{Context, Result, anyhow, bail};
use chrono::Utc;
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use markhound_core::crawl::{
    CrawlMode, CrawlOptions, CrawlProgressCallback, CrawlSummary, OnMatch, SessionSnapshot,
    SessionState, execute_crawl, normalize_start_url,
};
use markhound_core::report::{
    CONTENT_SAMPLE_LIMIT, ReportFormat, default_report_filename, generate_csv_report,
    generate_json_report, generate_text_report, group_by_source, save_report,
};
use markhound_scanner::{KeywordMatcher, RedirectResolver, ScanConfig, StatusLog};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

/// Load keywords from a newline-delimited file. Blank lines and `#`
/// comments are skipped.
pub fn load_keywords_from_file(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read keywords file {}", path.display()))?;

    let keywords: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect();

    if keywords.is_empty() {
        bail!("No keywords found in {}", path.display());
    }

    Ok(keywords)
}

/// Parse a user-supplied start URL, adding https:// if needed
pub fn parse_url_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let candidate = normalize_start_url(line);
    match Url::parse(&candidate) {
        Ok(url) if url.host_str().is_some() => Some(candidate),
        _ => None,
    }
}

/// Scanner configuration from command line values. Keywords given with
/// `-k` and keywords read from a file are combined and replace the
/// defaults; with neither, the defaults stay.
pub fn build_scan_config(
    keywords: Vec<String>,
    keywords_file: Option<&Path>,
    brand_domain: Option<&str>,
    partner_id: Option<&str>,
) -> Result<ScanConfig> {
    let mut all_keywords = keywords;
    if let Some(path) = keywords_file {
        all_keywords.extend(load_keywords_from_file(path)?);
    }

    let mut config = ScanConfig::default();
    if !all_keywords.is_empty() {
        config = config.with_keywords(all_keywords);
    }
    if let Some(domain) = brand_domain {
        config = config.with_brand_domain(domain);
    }
    if let Some(id) = partner_id {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
            bail!("Partner id must be numeric, got '{}'", id);
        }
        config = config.with_partner_id(id);
    }
    Ok(config)
}

/// Where to write a report. `~` is expanded; a directory gets a
/// timestamped file name.
pub fn resolve_output_path(output: &str, format: ReportFormat) -> PathBuf {
    let expanded = shellexpand::tilde(output);
    let path = PathBuf::from(expanded.as_ref());
    if path.is_dir() {
        path.join(default_report_filename(format, Utc::now()))
    } else {
        path
    }
}

pub fn render_report(summary: &CrawlSummary, format: ReportFormat) -> Result<String> {
    let content = match format {
        ReportFormat::Csv => generate_csv_report(&summary.records)?,
        ReportFormat::Json => generate_json_report(summary)?,
        ReportFormat::Text => generate_text_report(summary),
    };
    Ok(content)
}

fn matcher_config(args: &ArgMatches, keywords_file: Option<&Path>) -> Result<ScanConfig> {
    let keywords: Vec<String> = args
        .get_many::<String>("keyword")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    build_scan_config(
        keywords,
        keywords_file,
        args.get_one::<String>("brand-domain").map(String::as_str),
        args.get_one::<String>("partner-id").map(String::as_str),
    )
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

pub async fn handle_crawl(sub_matches: &ArgMatches) -> Result<()> {
    let raw_url = sub_matches
        .get_one::<String>("url")
        .context("--url is required")?;
    let url = parse_url_line(raw_url).ok_or_else(|| anyhow!("Invalid URL '{}'", raw_url))?;

    let mode_name = sub_matches
        .get_one::<String>("mode")
        .map(String::as_str)
        .unwrap_or("standard");
    let mode =
        CrawlMode::from_str(mode_name).ok_or_else(|| anyhow!("Unknown mode '{}'", mode_name))?;

    let on_match_name = sub_matches
        .get_one::<String>("on-match")
        .map(String::as_str)
        .unwrap_or("stop");
    let on_match = OnMatch::from_str(on_match_name)
        .ok_or_else(|| anyhow!("Unknown on-match action '{}'", on_match_name))?;

    let format_name = sub_matches
        .get_one::<String>("format")
        .map(String::as_str)
        .unwrap_or("csv");
    let format = ReportFormat::from_str(format_name)
        .ok_or_else(|| anyhow!("Unknown report format '{}'", format_name))?;

    let keywords_file = sub_matches.get_one::<PathBuf>("keywords-file");
    let config = matcher_config(sub_matches, keywords_file.map(PathBuf::as_path))?;

    print_divider();
    println!("{} {}", "Crawling".bright_white().bold(), url.bright_cyan());
    println!("Mode:      {} ({} pages)", mode, mode.max_pages());
    println!("Keywords:  {}", config.keywords.join(", "));
    println!("On match:  {}", on_match_name);
    print_divider();

    let progress = ProgressBar::new(mode.max_pages() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}")?
            .progress_chars("=> "),
    );
    progress.enable_steady_tick(Duration::from_millis(100));

    let bar = progress.clone();
    let progress_callback: CrawlProgressCallback = Arc::new(move |snapshot: &SessionSnapshot| {
        bar.set_length(snapshot.max_pages as u64);
        bar.set_position(snapshot.pages_crawled as u64);
        if let Some(last) = snapshot.status_tail.last() {
            bar.set_message(last.clone());
        }
    });

    // Ctrl-C is observed between pages
    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Received Ctrl+C, stopping crawl");
            ctrl_c_token.cancel();
        }
    });

    let options = CrawlOptions {
        url,
        mode,
        config,
        on_match,
    };
    let result = execute_crawl(options, Some(progress_callback), Some(cancel)).await;
    progress.finish_and_clear();
    let summary = result.context("Crawl failed")?;

    print_summary(&summary);

    match sub_matches.get_one::<String>("output") {
        Some(output) => {
            let path = resolve_output_path(output, format);
            let report = render_report(&summary, format)?;
            save_report(&report, &path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            println!(
                "\n{} Report saved to {}",
                "✓".green().bold(),
                path.display().to_string().bright_white()
            );
        }
        None => print_matches(&summary),
    }

    Ok(())
}

fn print_summary(summary: &CrawlSummary) {
    let state = match summary.state {
        SessionState::Finished => "finished".green(),
        SessionState::Stopped => "stopped".yellow(),
        SessionState::Paused => "paused".yellow(),
        SessionState::Running => "running".normal(),
    };

    println!("\n{} Crawl {}\n", "✓".green().bold(), state);
    println!("  Pages crawled: {}", summary.pages_crawled);
    println!("  Matches found: {}", summary.records.len());
    println!(
        "  Duration:      {}s",
        (summary.finished_at - summary.started_at).num_seconds()
    );

    let warnings = summary
        .status
        .iter()
        .filter(|m| m.starts_with("Error"))
        .count();
    if warnings > 0 {
        println!(
            "  {} {} requests failed (run with -v for details)",
            "⚠".yellow(),
            warnings
        );
    }
}

fn print_matches(summary: &CrawlSummary) {
    if summary.records.is_empty() {
        println!("\nNo matches found.");
        return;
    }

    for (source_url, records) in group_by_source(&summary.records) {
        println!("\n  {}", source_url.bright_white().bold());
        println!("  {}", "─".repeat(source_url.chars().count().min(78)));
        for record in records {
            println!(
                "  {} {} {} {}",
                "●".bright_green(),
                record.keyword.bright_cyan(),
                format!("[{}]", record.location_type).dimmed(),
                record.matched_url
            );
            let sample: String = record.content_sample(CONTENT_SAMPLE_LIMIT);
            if !sample.is_empty() && sample != record.matched_url {
                println!("      {}", sample.dimmed());
            }
        }
    }
}

pub fn handle_match(sub_matches: &ArgMatches) -> Result<()> {
    let text = sub_matches
        .get_one::<String>("TEXT")
        .context("TEXT is required")?;
    let config = matcher_config(sub_matches, None)?;
    let matcher = KeywordMatcher::new(&config).context("Invalid keyword pattern")?;

    let hits = matcher.matches(text);
    if hits.is_empty() {
        println!("{} No keywords matched", "✗".red());
    } else {
        for keyword in hits {
            println!("{} {}", "✓".green().bold(), keyword.bright_cyan());
        }
    }
    Ok(())
}

pub async fn handle_resolve(sub_matches: &ArgMatches) -> Result<()> {
    let raw_url = sub_matches
        .get_one::<String>("URL")
        .context("URL is required")?;
    let url = parse_url_line(raw_url).ok_or_else(|| anyhow!("Invalid URL '{}'", raw_url))?;

    let config = ScanConfig::default();
    let matcher = KeywordMatcher::new(&config)?;
    let mut resolver = RedirectResolver::new(&config)?;
    let mut log = StatusLog::new();

    let resolution = resolver.resolve(&url, &mut log).await;

    for warning in log.messages() {
        println!("{} {}", "⚠".yellow(), warning);
    }

    for hop in &resolution.chain {
        println!("  {} {}{}", "↪".cyan(), hop, keyword_suffix(&matcher, hop));
    }
    println!(
        "  {} {}{}",
        "✓".green().bold(),
        resolution.final_url.bright_white(),
        keyword_suffix(&matcher, &resolution.final_url)
    );
    Ok(())
}

fn keyword_suffix(matcher: &KeywordMatcher, url: &str) -> String {
    let hits = matcher.matches(url);
    if hits.is_empty() {
        String::new()
    } else {
        format!("  {}", format!("[{}]", hits.join(", ")).bright_green())
    }
}
