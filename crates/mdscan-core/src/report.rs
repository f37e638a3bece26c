//! Output formatting for scan verdicts.

use std::io::{self, Write};

use crate::scan::ScanReport;
use crate::verdict::VerdictSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {s}. Use 'text' or 'json'.")),
        }
    }
}

pub fn print_report(report: &ScanReport, format: OutputFormat) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    render(report, format, &mut out)?;
    out.flush()
}

pub fn render<W: Write>(report: &ScanReport, format: OutputFormat, out: &mut W) -> io::Result<()> {
    match format {
        OutputFormat::Text => render_text(report, out),
        OutputFormat::Json => render_json(report, out),
    }
}

fn render_text<W: Write>(report: &ScanReport, out: &mut W) -> io::Result<()> {
    let verdict = &report.verdict;
    let name = verdict
        .display_name
        .clone()
        .unwrap_or_else(|| report.path.display().to_string());

    writeln!(out, "{}", "=".repeat(70))?;
    writeln!(out, "file:    {name}")?;
    writeln!(out, "sha256:  {}", report.sha256)?;
    if let Some(overall) = &verdict.overall {
        writeln!(out, "overall: {overall}")?;
    }
    match &verdict.source {
        VerdictSource::CacheHit => writeln!(out, "source:  cached verdict")?,
        VerdictSource::Analysis { data_id } => writeln!(out, "source:  analysis {data_id}")?,
    }
    writeln!(
        out,
        "engines: {} ({} detections)",
        verdict.engines.len(),
        verdict.detections()
    )?;
    writeln!(out, "{}", "=".repeat(70))?;

    for (engine, result) in &verdict.engines {
        writeln!(out)?;
        writeln!(out, "Scan Engine: {engine}")?;
        writeln!(out, "threat_found: {}", result.threat_found)?;
        writeln!(out, "scan_time: {:.0}", round_even(result.scan_time))?;
        writeln!(out, "scan_result_i: {:.0}", round_even(result.scan_result_i))?;
        writeln!(out, "def_time: {}", result.def_time)?;
    }
    Ok(())
}

fn render_json<W: Write>(report: &ScanReport, out: &mut W) -> io::Result<()> {
    let verdict = &report.verdict;
    let output = serde_json::json!({
        "file": verdict.display_name.clone().unwrap_or_else(|| report.path.display().to_string()),
        "sha256": report.sha256,
        "overall": verdict.overall,
        "source": verdict.source,
        "engines": verdict.engines,
        "summary": {
            "engines": verdict.engines.len(),
            "detections": verdict.detections(),
        }
    });
    serde_json::to_writer_pretty(&mut *out, &output)?;
    writeln!(out)
}

/// Round to a whole number, ties to even.
fn round_even(value: f64) -> f64 {
    value.round_ties_even()
}
