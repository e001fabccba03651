// Export of crawl results

use crate::crawl::CrawlSummary;
use chrono::{DateTime, Utc};
use markhound_scanner::MatchRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Characters of matched content carried into an export row
pub const CONTENT_SAMPLE_LIMIT: usize = 300;

pub const CSV_COLUMNS: [&str; 8] = [
    "source_url",
    "matched_url",
    "keyword",
    "location_type",
    "element",
    "attribute",
    "content_sample",
    "timestamp",
];

const RULE: &str =
    "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Report is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Csv,
    Json,
    Text,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "csv" => Some(ReportFormat::Csv),
            "json" => Some(ReportFormat::Json),
            "text" | "txt" => Some(ReportFormat::Text),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Csv => "csv",
            ReportFormat::Json => "json",
            ReportFormat::Text => "txt",
        }
    }
}

/// One flattened export row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportRow {
    pub source_url: String,
    pub matched_url: String,
    pub keyword: String,
    pub location_type: String,
    pub element: String,
    pub attribute: String,
    pub content_sample: String,
    pub timestamp: String,
}

impl From<&MatchRecord> for ExportRow {
    fn from(record: &MatchRecord) -> Self {
        Self {
            source_url: record.source_url.clone(),
            matched_url: record.matched_url.clone(),
            keyword: record.keyword.clone(),
            location_type: record.location_type.as_str().to_string(),
            element: record.element.clone(),
            attribute: record.attribute.clone(),
            content_sample: record.content_sample(CONTENT_SAMPLE_LIMIT),
            timestamp: record.timestamp.to_rfc3339(),
        }
    }
}

/// `crawl_report_YYYYmmdd_HHMMSS.<ext>`
pub fn default_report_filename(format: ReportFormat, now: DateTime<Utc>) -> String {
    format!(
        "crawl_report_{}.{}",
        now.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

/// Header row first, even with no records.
pub fn generate_csv_report(records: &[MatchRecord]) -> Result<String, ReportError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    writer.write_record(CSV_COLUMNS)?;
    for record in records {
        writer.serialize(ExportRow::from(record))?;
    }
    writer.flush()?;

    let bytes = writer
        .into_inner()
        .map_err(|e| ReportError::Io(std::io::Error::other(e.to_string())))?;
    Ok(String::from_utf8(bytes)?)
}

pub fn generate_json_report(summary: &CrawlSummary) -> Result<String, ReportError> {
    let rows: Vec<ExportRow> = summary.records.iter().map(ExportRow::from).collect();

    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "Markhound",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": Utc::now().to_rfc3339(),
                "format": "json"
            },
            "session": {
                "id": summary.session_id,
                "start_url": summary.start_url,
                "mode": summary.mode.as_str(),
                "state": summary.state.as_str(),
                "start_time": summary.started_at.to_rfc3339(),
                "end_time": summary.finished_at.to_rfc3339(),
                "duration_seconds": (summary.finished_at - summary.started_at).num_seconds()
            },
            "summary": {
                "pages_crawled": summary.pages_crawled,
                "total_matches": summary.records.len(),
                "by_location": count_by_location(&summary.records),
                "by_keyword": count_by_keyword(&summary.records)
            },
            "matches": rows
        }
    });

    Ok(serde_json::to_string_pretty(&json_report)?)
}

pub fn generate_text_report(summary: &CrawlSummary) -> String {
    let mut report = String::new();

    report.push_str(RULE);
    report.push_str("                         MARKHOUND CRAWL REPORT\n");
    report.push_str(RULE);
    report.push('\n');

    report.push_str(&format!("Session ID:   {}\n", summary.session_id));
    report.push_str(&format!("Start URL:    {}\n", summary.start_url));
    report.push_str(&format!("Mode:         {}\n", summary.mode));
    report.push_str(&format!("Status:       {}\n", summary.state.as_str()));
    report.push_str(&format!(
        "Crawl Date:   {}\n",
        summary.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    report.push_str(&format!(
        "Duration:     {} seconds\n",
        (summary.finished_at - summary.started_at).num_seconds()
    ));
    report.push_str(&format!("Pages:        {}\n", summary.pages_crawled));
    report.push_str(&format!("Matches:      {}\n\n", summary.records.len()));

    report.push_str(RULE);
    report.push_str("SUMMARY\n");
    report.push_str(RULE);
    report.push('\n');

    if summary.records.is_empty() {
        report.push_str("No matches found.\n\n");
    } else {
        report.push_str("By location:\n");
        for (location, count) in count_by_location(&summary.records) {
            report.push_str(&format!("  {:<12} {}\n", location, count));
        }
        report.push_str("\nBy keyword:\n");
        for (keyword, count) in count_by_keyword(&summary.records) {
            report.push_str(&format!("  {:<16} {}\n", keyword, count));
        }
        report.push('\n');

        report.push_str(RULE);
        report.push_str("MATCHES\n");
        report.push_str(RULE);
        report.push('\n');

        for (source_url, records) in group_by_source(&summary.records) {
            report.push_str(&format!("{} ({} matches)\n", source_url, records.len()));
            for record in records {
                report.push_str(&format!(
                    "  [{}] {} <{}{}> {}\n",
                    record.keyword,
                    record.location_type,
                    record.element,
                    if record.attribute.is_empty() {
                        String::new()
                    } else {
                        format!(" {}", record.attribute)
                    },
                    record.matched_url
                ));
                let sample = record.content_sample(CONTENT_SAMPLE_LIMIT);
                if !sample.is_empty() {
                    report.push_str(&format!("      {}\n", sample));
                }
            }
            report.push('\n');
        }
    }

    report.push_str(RULE);
    report.push_str("                             End of Report\n");
    report.push_str(RULE);

    report
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

pub fn count_by_location(records: &[MatchRecord]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        *counts
            .entry(record.location_type.as_str().to_string())
            .or_insert(0) += 1;
    }
    counts
}

pub fn count_by_keyword(records: &[MatchRecord]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(record.keyword.clone()).or_insert(0) += 1;
    }
    counts
}

/// Records grouped per source page, pages in order of first appearance.
pub fn group_by_source(records: &[MatchRecord]) -> Vec<(&str, Vec<&MatchRecord>)> {
    let mut groups: Vec<(&str, Vec<&MatchRecord>)> = Vec::new();
    for record in records {
        match groups
            .iter_mut()
            .find(|(source, _)| *source == record.source_url)
        {
            Some((_, group)) => group.push(record),
            None => groups.push((record.source_url.as_str(), vec![record])),
        }
    }
    groups
}
