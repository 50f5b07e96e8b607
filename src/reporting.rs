use crate::lint::{DocumentReport, LintSummary};
use anyhow::{Context, Result};
use chrono::Local;
use std::collections::HashMap;
use std::io::{self, Write};

/// Formats a message with a timestamp, level and `(qmd_lint)` prefix.
fn format_line(level: &str, message: &str) -> String {
    format!(
        "{} [{}] (qmd_lint): {}",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        level,
        message
    )
}

/// Reports an error to stderr, one prefixed line per message line.
pub fn report_error(message: &str) {
    for line in message.lines() {
        eprintln!("{}", format_line("ERROR", line));
    }
}

/// Reports a non-fatal warning to stderr.
pub fn report_warning(message: &str) {
    for line in message.lines() {
        eprintln!("{}", format_line("WARN", line));
    }
}

/// Prints one document's outcome.
///
/// Analyzer stdout goes to stdout and analyzer stderr to stderr, both already
/// attributed to the document. Failures and cleanup warnings are reported on
/// stderr.
pub fn print_document_report(report: &DocumentReport) -> io::Result<()> {
    write_document_report(&mut io::stdout().lock(), report)
}

fn write_document_report<W: Write>(out: &mut W, report: &DocumentReport) -> io::Result<()> {
    if let Some(output) = &report.output {
        out.write_all(output.stdout.as_bytes())?;
        out.flush()?;
        if !output.stderr.is_empty() {
            eprintln!("{}", output.stderr);
        }
    }

    if let Some(error) = &report.error {
        report_error(error);
    }

    if let Some(warning) = &report.cleanup_warning {
        report_warning(warning);
    }

    Ok(())
}

/// Prints the reports of a lint run as pretty JSON on stdout.
pub fn print_json(summary: &LintSummary) -> Result<()> {
    write_json(&mut io::stdout().lock(), summary)
}

fn write_json<W: Write>(out: &mut W, summary: &LintSummary) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, summary)
        .context("Failed to serialize lint results")?;
    writeln!(out).context("Failed to write lint results")?;
    out.flush().context("Failed to write lint results")?;
    Ok(())
}

/// True if `err` was caused by stdout being closed, e.g. piped into `head`.
pub fn is_broken_pipe(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<io::Error>()
            .is_some_and(|e| e.kind() == io::ErrorKind::BrokenPipe)
            || cause
                .downcast_ref::<serde_json::Error>()
                .and_then(|e| e.io_error_kind())
                == Some(io::ErrorKind::BrokenPipe)
    })
}

/// Prints lint statistics to stderr.
///
/// Shows:
/// - Documents linted, split into clean / with diagnostics / failed
/// - Total time and average time per document
/// - Failed documents
/// - Individual document timings (RUST_LOG=debug)
pub fn print_lint_statistics(summary: &LintSummary) {
    let total = summary.reports.len();
    let sum_ms: u128 = summary.reports.iter().map(|r| r.duration.as_millis()).sum();
    let avg_ms = if total > 0 { sum_ms / total as u128 } else { 0 };

    eprintln!(
        "{}",
        format_line(
            "INFO",
            &format!(
                "Linted {} document(s): {} clean, {} with diagnostics, {} failed",
                total,
                summary.clean(),
                summary.with_diagnostics(),
                summary.failures()
            )
        )
    );
    eprintln!(
        "{}",
        format_line(
            "INFO",
            &format!(
                "Finished in {}ms (avg {}ms per document)",
                summary.duration.as_millis(),
                avg_ms
            )
        )
    );

    let failed: Vec<_> = summary.reports.iter().filter(|r| r.failed()).collect();
    if !failed.is_empty() {
        report_error("Failed to lint the following documents:");
        for report in failed {
            report_error(&format!("  {}", report.document.display()));
        }
    }

    let mut exit_codes: HashMap<i32, usize> = HashMap::new();
    for output in summary.reports.iter().filter_map(|r| r.output.as_ref()) {
        if let Some(code) = output.exit_code {
            *exit_codes.entry(code).or_insert(0) += 1;
        }
    }
    let mut sorted_codes: Vec<_> = exit_codes.into_iter().collect();
    sorted_codes.sort();
    log::debug!("Analyzer exit codes:");
    for (code, count) in sorted_codes {
        log::debug!("  {}: {} document(s)", code, count);
    }

    log::debug!("Individual document timings:");
    for report in &summary.reports {
        log::debug!(
            "[QMD_LINT_TIME] {}: {}ms",
            report.document.display(),
            report.duration.as_millis()
        );
    }
}
