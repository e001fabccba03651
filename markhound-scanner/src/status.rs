use tracing::{info, warn};

/// Session-scoped diagnostics. Nothing here is ever raised to the caller;
/// failures are written down and the crawl moves on.
#[derive(Debug, Default, Clone)]
pub struct StatusLog {
    messages: Vec<String>,
}

impl StatusLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!("{}", message);
        self.messages.push(message);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn tail(&self, n: usize) -> &[String] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
