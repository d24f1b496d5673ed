//! CLI output formatting for the `compress` command.
//!
//! Every `format_*` function is pure and returns display lines, so the
//! layout is unit tested without capturing stdout. The `print_*` wrappers
//! are the only functions that write.
//!
//! # Output Format
//!
//! ```text
//! 001 beach.jpg
//!     Source: 4000x2000, 3.1 MB
//!     Result: 1200x600 jpg q0.70 (quality), 187.4 KB
//!     Saved: compressed/beach.jpg
//! 002 scan.png
//!     Source: 5200x3400, 21.0 MB
//!     Result: 200x131 png (fallback), 248.9 KB
//!     Over budget: 200.0 KB limit
//!     Saved: compressed/scan.png
//! 003 notes.txt
//!     Error: could not detect image format
//!
//! 2 compressed, 1 failed
//! ```
//!
//! With `--json`, the same information is printed as one array of
//! [`FileReport`] objects.

use crate::imaging::OutputFormat;
use crate::types::{CompressionResult, SearchStage};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Human-readable byte count (binary units, one decimal).
///
/// ```text
/// 512 B
/// 187.4 KB
/// 3.1 MB
/// ```
fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let b = bytes as f64;
    if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}

fn stage_label(stage: SearchStage) -> &'static str {
    match stage {
        SearchStage::Quality => "quality",
        SearchStage::Dimensions => "dimensions",
        SearchStage::Fallback => "fallback",
    }
}

// ============================================================================
// Output names
// ============================================================================

/// Hands out output file names within one output directory.
///
/// Inputs from different directories can share a stem (`a/x.jpg`,
/// `b/x.jpg`); the second one becomes `x-2.jpg` instead of overwriting the
/// first. Names compare case-insensitively so the result is the same on
/// case-folding filesystems.
#[derive(Debug, Default)]
pub struct OutputNames {
    taken: HashSet<String>,
}

impl OutputNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// `<stem>.<extension>`, or `<stem>-<n>.<extension>` with the smallest
    /// `n >= 2` not yet handed out.
    pub fn assign(&mut self, input: &Path, extension: &str) -> String {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let mut name = format!("{stem}.{extension}");
        let mut n = 2;
        while !self.taken.insert(name.to_lowercase()) {
            name = format!("{stem}-{n}.{extension}");
            n += 1;
        }
        name
    }
}

// ============================================================================
// Reports
// ============================================================================

/// Outcome for one input file, as shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileReport {
    pub input: String,
    pub source_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_dimensions: Option<(u32, u32)>,
    #[serde(flatten)]
    pub outcome: ReportOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReportOutcome {
    Compressed {
        output: String,
        mime: String,
        bytes: u64,
        width: u32,
        height: u32,
        quality: f32,
        stage: SearchStage,
        over_budget: bool,
    },
    Failed {
        error: String,
    },
}

impl FileReport {
    /// Report for a file that never reached the worker (unreadable input).
    pub fn failed(input: &str, error: impl ToString) -> Self {
        Self {
            input: input.to_string(),
            source_bytes: 0,
            source_dimensions: None,
            outcome: ReportOutcome::Failed {
                error: error.to_string(),
            },
        }
    }

    /// Report for a worker result. `output` is where the blob was written.
    pub fn from_result(
        input: &str,
        source_bytes: u64,
        source_dimensions: Option<(u32, u32)>,
        result: &CompressionResult,
        output: &Path,
        max_bytes: u64,
    ) -> Self {
        let outcome = match result {
            CompressionResult::Success { blob, .. } => ReportOutcome::Compressed {
                output: output.display().to_string(),
                mime: blob.mime.clone(),
                bytes: blob.len() as u64,
                width: blob.width,
                height: blob.height,
                quality: blob.quality,
                stage: blob.stage,
                over_budget: !blob.fits(max_bytes),
            },
            CompressionResult::Failure { error, .. } => ReportOutcome::Failed {
                error: error.clone(),
            },
        };
        Self {
            input: input.to_string(),
            source_bytes,
            source_dimensions,
            outcome,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, ReportOutcome::Failed { .. })
    }
}

/// Format one file report as display lines.
///
/// Lossless results omit the quality, which the PNG encoder ignores.
pub fn format_report(index: usize, report: &FileReport, max_bytes: u64) -> Vec<String> {
    let mut lines = vec![format!("{} {}", format_index(index), report.input)];

    if report.source_bytes > 0 {
        match report.source_dimensions {
            Some((w, h)) => lines.push(format!(
                "    Source: {}x{}, {}",
                w,
                h,
                format_size(report.source_bytes)
            )),
            None => lines.push(format!("    Source: {}", format_size(report.source_bytes))),
        }
    }

    match &report.outcome {
        ReportOutcome::Compressed {
            output,
            mime,
            bytes,
            width,
            height,
            quality,
            stage,
            over_budget,
        } => {
            let format = OutputFormat::from_mime(mime);
            let name = format.map(|f| f.extension()).unwrap_or(mime.as_str());
            let quality = match format {
                Some(f) if f.is_lossless() => String::new(),
                _ => format!(" q{:.2}", quality),
            };
            lines.push(format!(
                "    Result: {}x{} {}{} ({}), {}",
                width,
                height,
                name,
                quality,
                stage_label(*stage),
                format_size(*bytes)
            ));
            if *over_budget {
                lines.push(format!("    Over budget: {} limit", format_size(max_bytes)));
            }
            lines.push(format!("    Saved: {}", output));
        }
        ReportOutcome::Failed { error } => {
            lines.push(format!("    Error: {}", error));
        }
    }
    lines
}

/// One-line totals after all files.
pub fn format_summary(reports: &[FileReport]) -> String {
    let failed = reports.iter().filter(|r| r.is_failure()).count();
    let compressed = reports.len() - failed;
    let over = reports
        .iter()
        .filter(|r| matches!(r.outcome, ReportOutcome::Compressed { over_budget: true, .. }))
        .count();
    if over > 0 {
        format!("{compressed} compressed ({over} over budget), {failed} failed")
    } else {
        format!("{compressed} compressed, {failed} failed")
    }
}

/// Format the full run: every report, a blank line, then the summary.
pub fn format_compress_output(reports: &[FileReport], max_bytes: u64) -> Vec<String> {
    let mut lines: Vec<String> = reports
        .iter()
        .enumerate()
        .flat_map(|(i, r)| format_report(i + 1, r, max_bytes))
        .collect();
    lines.push(String::new());
    lines.push(format_summary(reports));
    lines
}

/// Print the run to stdout.
pub fn print_compress_output(reports: &[FileReport], max_bytes: u64) {
    for line in format_compress_output(reports, max_bytes) {
        println!("{}", line);
    }
}

/// Print the run to stdout as a JSON array.
pub fn print_json_output(reports: &[FileReport]) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(reports)?);
    Ok(())
}
