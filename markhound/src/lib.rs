pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    build_scan_config, load_keywords_from_file, parse_url_line, render_report,
    resolve_output_path,
};

// Re-export crawl functionality from markhound-core
pub use markhound_core::crawl::{
    CrawlMode, CrawlOptions, CrawlProgressCallback, OnMatch, execute_crawl,
};
