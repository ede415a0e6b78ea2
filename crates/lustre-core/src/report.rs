//! Per-run report of processing results.
//!
//! JSON Lines reports stream one result per line as images finish and end
//! with a `{"stats": ...}` line. JSON reports are a single document
//! `{"results": [...], "stats": {...}}` written when the run ends.

use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

use crate::types::{ProcessingResult, ProcessingStats};

/// Report file layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    JsonLines,
}

impl ReportFormat {
    /// Parse format from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "jsonl" | "jsonlines" | "ndjson" => Some(Self::JsonLines),
            _ => None,
        }
    }

    /// `.json` files get a JSON document; anything else is JSON Lines.
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::parse)
            .unwrap_or(Self::JsonLines)
    }
}

#[derive(Serialize)]
struct Document<'a> {
    results: &'a [ProcessingResult],
    stats: &'a ProcessingStats,
}

#[derive(Serialize)]
struct StatsLine<'a> {
    stats: &'a ProcessingStats,
}

/// Writes results as they arrive, then the run statistics.
pub struct ReportWriter<W: Write> {
    writer: W,
    format: ReportFormat,
    buffered: Vec<ProcessingResult>,
    records: usize,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(writer: W, format: ReportFormat) -> Self {
        Self {
            writer,
            format,
            buffered: Vec::new(),
            records: 0,
        }
    }

    /// Record one result. JSON Lines writes it immediately.
    pub fn record(&mut self, result: &ProcessingResult) -> io::Result<()> {
        match self.format {
            ReportFormat::JsonLines => {
                serde_json::to_writer(&mut self.writer, result).map_err(io::Error::other)?;
                writeln!(self.writer)?;
            }
            ReportFormat::Json => self.buffered.push(result.clone()),
        }
        self.records += 1;
        Ok(())
    }

    pub fn records(&self) -> usize {
        self.records
    }

    /// Write the statistics (and, for JSON, the whole document) and flush.
    pub fn finish(mut self, stats: &ProcessingStats) -> io::Result<W> {
        match self.format {
            ReportFormat::Json => {
                let doc = Document {
                    results: &self.buffered,
                    stats,
                };
                serde_json::to_writer_pretty(&mut self.writer, &doc).map_err(io::Error::other)?;
            }
            ReportFormat::JsonLines => {
                serde_json::to_writer(&mut self.writer, &StatsLine { stats })
                    .map_err(io::Error::other)?;
            }
        }
        writeln!(self.writer)?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FailureKind;

    fn failure(name: &str) -> ProcessingResult {
        ProcessingResult::failed(Path::new(name), FailureKind::Decode, "corrupt")
    }

    #[test]
    fn test_jsonl_streams_then_stats() {
        let mut writer = ReportWriter::new(Vec::new(), ReportFormat::JsonLines);
        writer.record(&failure("a.png")).unwrap();
        writer.record(&failure("b.png")).unwrap();
        assert_eq!(writer.records(), 2);

        let out = String::from_utf8(writer.finish(&ProcessingStats::default()).unwrap()).unwrap();
        let lines: Vec<&str> = out.trim().split('\n').collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains(r#""status":"failure""#));
        assert!(lines[2].starts_with(r#"{"stats":"#));
    }

    #[test]
    fn test_json_document() {
        let mut writer = ReportWriter::new(Vec::new(), ReportFormat::Json);
        writer.record(&failure("a.png")).unwrap();
        let out = writer.finish(&ProcessingStats::default()).unwrap();

        let doc: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(doc["results"].as_array().unwrap().len(), 1);
        assert_eq!(doc["stats"]["failed"], 0);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ReportFormat::from_path(Path::new("r.json")), ReportFormat::Json);
        assert_eq!(ReportFormat::from_path(Path::new("r.JSONL")), ReportFormat::JsonLines);
        assert_eq!(ReportFormat::from_path(Path::new("report")), ReportFormat::JsonLines);
        assert_eq!(ReportFormat::parse("invalid"), None);
    }
}
