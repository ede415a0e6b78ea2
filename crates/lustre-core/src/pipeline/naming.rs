//! Output file naming.
//!
//! Templates support two tokens: `{original_name}` (the source file stem) and
//! `{timestamp}` (local time, second resolution). The timestamp is captured
//! once per image so that the output, thumbnail and sidecar share it.
//!
//! Two images with the same stem processed within the same second map to the
//! same name; the last writer wins.

use chrono::{DateTime, Local};

use crate::config::OutputFormat;

/// Token replaced by the source file stem.
pub const ORIGINAL_NAME: &str = "{original_name}";

/// Token replaced by the per-image timestamp.
pub const TIMESTAMP: &str = "{timestamp}";

const DEFAULT_TEMPLATE: &str = "{original_name}_{timestamp}";

/// Format a timestamp the way it appears in output names.
pub fn timestamp(now: DateTime<Local>) -> String {
    now.format("%Y%m%d_%H%M%S").to_string()
}

/// A parsed naming template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingTemplate {
    template: String,
}

impl Default for NamingTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}

impl NamingTemplate {
    pub fn new(template: &str) -> Self {
        let template = template.trim();
        if template.is_empty() {
            return Self {
                template: DEFAULT_TEMPLATE.to_string(),
            };
        }
        Self {
            template: template.to_string(),
        }
    }

    /// Whether every render includes the timestamp token.
    pub fn is_timestamped(&self) -> bool {
        self.template.contains(TIMESTAMP)
    }

    /// Substitute the tokens. Path separators in the result are replaced so a
    /// name can never leave the output directory.
    pub fn render(&self, original_name: &str, timestamp: &str) -> String {
        let rendered = self
            .template
            .replace(ORIGINAL_NAME, original_name)
            .replace(TIMESTAMP, timestamp);
        let rendered: String = rendered
            .chars()
            .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
            .collect();

        match rendered.trim() {
            "" | "." | ".." => original_name.to_string(),
            name => name.to_string(),
        }
    }

    /// Full file name including the format's extension.
    pub fn file_name(&self, original_name: &str, timestamp: &str, format: OutputFormat) -> String {
        format!("{}.{}", self.render(original_name, timestamp), format.extension())
    }
}
