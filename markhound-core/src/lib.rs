use colored::Colorize;

pub mod crawl;
pub mod report;

pub use crawl::{
    CrawlMode, CrawlOptions, CrawlProgressCallback, CrawlSession, CrawlSummary, OnMatch,
    SessionSnapshot, SessionState, Step, execute_crawl, normalize_start_url,
};
pub use report::{ReportError, ReportFormat};

const BANNER: &str = r#"
  ╔═══════════════════════════════════════════════════════════════╗
  ║  ███╗   ███╗ █████╗ ██████╗ ██╗  ██╗██╗  ██╗ ██████╗ ██╗   ██╗║
  ║  ████╗ ████║██╔══██╗██╔══██╗██║ ██╔╝██║  ██║██╔═══██╗██║   ██║║
  ║  ██╔████╔██║███████║██████╔╝█████╔╝ ███████║██║   ██║██║   ██║║
  ║  ██║╚██╔╝██║██╔══██║██╔══██╗██╔═██╗ ██╔══██║██║   ██║██║   ██║║
  ║  ██║ ╚═╝ ██║██║  ██║██║  ██║██║  ██╗██║  ██║╚██████╔╝╚██████╔╝║
  ║  ╚═╝     ╚═╝╚═╝  ╚═╝╚═╝  ╚═╝╚═╝  ╚═╝╚═╝  ╚═╝ ╚═════╝  ╚═════╝ ║
  ╚═══════════════════════════════════════════════════════════════╝"#;

pub fn print_banner() {
    println!("{}", BANNER.bright_cyan().bold());
    println!(
        "  {} {}\n",
        "affiliate mention tracker".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
