pub mod classify;
pub mod config;
pub mod crawler;
pub mod discovery;
pub mod error;
pub mod extract;
pub mod matcher;
pub mod redirect;
pub mod result;
pub mod status;
pub mod store;

pub use config::ScanConfig;
pub use crawler::Crawler;
pub use discovery::Category;
pub use error::ScanError;
pub use matcher::KeywordMatcher;
pub use redirect::{RedirectResolver, Resolution};
pub use result::{LocationType, MatchRecord};
pub use status::StatusLog;
pub use store::ResultStore;
