//! Tagging reports: JSON, JSON Lines and a short text summary.
//!
//! A JSON report is the whole [`QueryOutput`] as one document. A JSONL
//! report has one [`TaggedImage`] per line, which is easier to stream into
//! other tools for large batches.

use serde::Serialize;
use std::fmt::Write as _;
use std::io::{self, Write};

use crate::types::{QueryOutput, TaggedImage};

/// Report format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Single JSON document
    Json,
    /// One image row per line (newline-delimited JSON)
    JsonLines,
}

impl OutputFormat {
    /// Parse format from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "jsonl" | "jsonlines" | "ndjson" => Some(Self::JsonLines),
            _ => None,
        }
    }
}

/// Serializes tagging results to a writer.
pub struct OutputWriter<W: Write> {
    writer: W,
    format: OutputFormat,
    pretty: bool,
    rows_written: usize,
}

impl<W: Write> OutputWriter<W> {
    /// `pretty` only affects [`OutputFormat::Json`].
    pub fn new(writer: W, format: OutputFormat, pretty: bool) -> Self {
        Self {
            writer,
            format,
            pretty,
            rows_written: 0,
        }
    }

    /// Write a full invocation result.
    pub fn write_report(&mut self, output: &QueryOutput) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => {
                self.write_json(output)?;
                self.rows_written += output.images.len();
                Ok(())
            }
            OutputFormat::JsonLines => {
                for row in &output.images {
                    self.write_row(row)?;
                }
                Ok(())
            }
        }
    }

    /// Write one image row as its own JSON value.
    pub fn write_row(&mut self, row: &TaggedImage) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => self.write_json(row)?,
            OutputFormat::JsonLines => {
                serde_json::to_writer(&mut self.writer, row).map_err(io::Error::other)?;
                writeln!(self.writer)?;
            }
        }
        self.rows_written += 1;
        Ok(())
    }

    fn write_json<T: Serialize>(&mut self, item: &T) -> io::Result<()> {
        if self.pretty {
            serde_json::to_writer_pretty(&mut self.writer, item).map_err(io::Error::other)?;
        } else {
            serde_json::to_writer(&mut self.writer, item).map_err(io::Error::other)?;
        }
        writeln!(self.writer)
    }

    /// Image rows written so far.
    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Human-readable summary: ratings, the most frequent tags and counters.
pub fn summary(output: &QueryOutput, top: usize) -> String {
    let mut text = String::new();

    if let Some(report) = &output.dry_run {
        let _ = writeln!(
            text,
            "Dry run: {} scheduled, {} read. Run again to tag.",
            report.scheduled.len(),
            report.read.len()
        );
    }

    if !output.ratings.is_empty() {
        let ratings: Vec<String> = output
            .ratings
            .iter()
            .map(|r| format!("{} {:.2}", r.name, r.confidence))
            .collect();
        let _ = writeln!(text, "Ratings: {}", ratings.join(", "));
    }

    let shown = output.counts.len().min(top);
    if shown > 0 {
        let _ = writeln!(text, "Top tags ({} of {}):", shown, output.counts.len());
        for count in output.counts.iter().take(top) {
            let _ = writeln!(text, "  {:>5}  {}", count.count, count.name);
        }
    }

    let stats = &output.stats;
    let _ = write!(
        text,
        "{} images: {} evaluated, {} cached, {} skipped, {} tags files",
        output.images.len(),
        stats.evaluated,
        stats.cached,
        stats.skipped,
        stats.written
    );
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DryRunReport, QueryStats, Tag, TagCount};

    fn row(path: &str, tags: &[(&str, f32)]) -> TaggedImage {
        TaggedImage {
            path: Some(path.into()),
            output_path: None,
            content_hash: Some("abc".to_string()),
            ratings: vec![Tag::new("general", 0.9)],
            tags: tags.iter().map(|(n, c)| Tag::new(*n, *c)).collect(),
            cached: false,
        }
    }

    fn report() -> QueryOutput {
        QueryOutput {
            images: vec![row("/a.png", &[("smile", 0.9)]), row("/b.png", &[("solo", 0.6)])],
            ratings: vec![Tag::new("general", 0.9)],
            tags: vec![Tag::new("smile", 0.9), Tag::new("solo", 0.6)],
            counts: vec![
                TagCount {
                    name: "smile".to_string(),
                    count: 1,
                },
                TagCount {
                    name: "solo".to_string(),
                    count: 1,
                },
            ],
            stats: QueryStats {
                evaluated: 2,
                ..QueryStats::default()
            },
            dry_run: None,
        }
    }

    #[test]
    fn test_json_report_is_one_document() {
        let mut buffer = Vec::new();
        let mut writer = OutputWriter::new(&mut buffer, OutputFormat::Json, false);
        writer.write_report(&report()).unwrap();
        assert_eq!(writer.rows_written(), 2);

        let output = String::from_utf8(buffer).unwrap();
        assert_eq!(output.lines().count(), 1);
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["images"].as_array().unwrap().len(), 2);
        assert!(value.get("dry_run").is_none());
    }

    #[test]
    fn test_jsonl_report_has_one_row_per_line() {
        let mut buffer = Vec::new();
        let mut writer = OutputWriter::new(&mut buffer, OutputFormat::JsonLines, true);
        writer.write_report(&report()).unwrap();

        let output = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: TaggedImage = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.tags[0].name, "smile");
    }

    #[test]
    fn test_summary_lists_top_tags_and_counters() {
        let text = summary(&report(), 1);
        assert!(text.contains("Ratings: general 0.90"));
        assert!(text.contains("Top tags (1 of 2)"));
        assert!(text.contains("smile"));
        assert!(!text.contains("solo"));
        assert!(text.ends_with("2 images: 2 evaluated, 0 cached, 0 skipped, 0 tags files"));
    }

    #[test]
    fn test_summary_mentions_dry_run() {
        let output = QueryOutput {
            dry_run: Some(DryRunReport {
                scheduled: vec!["/a.png".into()],
                read: vec!["/a.png".into()],
            }),
            ..QueryOutput::default()
        };
        assert!(summary(&output, 10).starts_with("Dry run: 1 scheduled, 1 read."));
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(OutputFormat::parse("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("JSONL"), Some(OutputFormat::JsonLines));
        assert_eq!(OutputFormat::parse("csv"), None);
    }
}
