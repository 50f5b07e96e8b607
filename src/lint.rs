use crate::config::QmdLintConfig;
use crate::document::{convert_file, default_output_path, validate_document};
use crate::linter::{LintOutput, Linter};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Options for a lint run that do not come from the configuration file.
#[derive(Debug, Clone)]
pub struct LintOptions {
    /// Keep the converted `.py` files after linting
    pub keep_temp: bool,
    /// Run the alignment check on every conversion
    pub verbose: bool,
    /// Maximum number of documents processed at once
    pub jobs: usize,
}

impl Default for LintOptions {
    fn default() -> Self {
        Self {
            keep_temp: false,
            verbose: false,
            jobs: num_cpus::get(),
        }
    }
}

/// Result of linting a single document.
///
/// Captures every outcome (conversion failure, analyzer failure, diagnostics
/// or a clean run) so one document never stops the batch.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    pub document: PathBuf,
    pub converted: PathBuf,
    /// Line count of the document, once converted
    pub line_count: Option<usize>,
    /// Analyzer output with the converted file name replaced
    pub output: Option<LintOutput>,
    /// Why the document could not be converted or linted
    pub error: Option<String>,
    /// Set when the converted file could not be removed
    pub cleanup_warning: Option<String>,
    #[serde(serialize_with = "serialize_millis")]
    pub duration: Duration,
}

fn serialize_millis<S: serde::Serializer>(
    duration: &Duration,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

impl DocumentReport {
    fn new(document: &Path) -> Self {
        Self {
            document: document.to_path_buf(),
            converted: default_output_path(document),
            line_count: None,
            output: None,
            error: None,
            cleanup_warning: None,
            duration: Duration::ZERO,
        }
    }

    /// True if the document could not be converted or the analyzer not run.
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }

    /// True if the analyzer ran and exited with a non-zero status.
    pub fn has_diagnostics(&self) -> bool {
        self.output.as_ref().is_some_and(|o| !o.success())
    }

    pub fn is_clean(&self) -> bool {
        !self.failed() && !self.has_diagnostics()
    }
}

/// Converts `document`, runs `linter` on the result and removes the
/// converted file unless `options.keep_temp` is set.
pub async fn lint_document(
    document: &Path,
    linter: &Linter,
    config: &QmdLintConfig,
    options: &LintOptions,
) -> DocumentReport {
    let start = Instant::now();
    let mut report = DocumentReport::new(document);

    if let Err(e) = validate_document(document) {
        report.error = Some(e.to_string());
        report.duration = start.elapsed();
        return report;
    }

    if report.converted.exists() {
        log::warn!("Overwriting existing {}", report.converted.display());
    }

    let summary = match convert_file(document, Some(&report.converted), config, options.verbose)
        .await
    {
        Ok(summary) => summary,
        Err(e) => {
            report.error = Some(format!(
                "Failed to convert {} to .py: {:#}",
                document.display(),
                e
            ));
            report.duration = start.elapsed();
            return report;
        }
    };
    report.line_count = Some(summary.line_count);

    let result = linter.run(&report.converted).await;

    // The converted file exists from here on, remove it whatever the analyzer did
    if !options.keep_temp {
        if let Err(e) = tokio::fs::remove_file(&report.converted).await {
            let warning = format!(
                "Could not remove temporary file {}: {}",
                report.converted.display(),
                e
            );
            log::warn!("{}", warning);
            report.cleanup_warning = Some(warning);
        }
    }

    match result {
        Ok(output) => {
            report.output = Some(output.attribute_to(&report.converted, document));
        }
        Err(e) => report.error = Some(format!("{:#}", e)),
    }

    report.duration = start.elapsed();
    report
}

/// Reports of a whole lint run, in input order.
#[derive(Debug, Clone, Serialize)]
pub struct LintSummary {
    pub reports: Vec<DocumentReport>,
    #[serde(serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl LintSummary {
    pub fn failures(&self) -> usize {
        self.reports.iter().filter(|r| r.failed()).count()
    }

    pub fn with_diagnostics(&self) -> usize {
        self.reports.iter().filter(|r| r.has_diagnostics()).count()
    }

    pub fn clean(&self) -> usize {
        self.reports.iter().filter(|r| r.is_clean()).count()
    }

    pub fn success(&self) -> bool {
        self.reports.iter().all(DocumentReport::is_clean)
    }

    /// 0 when every document converted and linted clean, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.success() {
            0
        } else {
            1
        }
    }
}

/// Lints all documents, up to `options.jobs` at a time.
///
/// Documents share no state, so they are converted and linted concurrently;
/// reports come back in the order of `documents`.
pub async fn lint_documents(
    documents: &[PathBuf],
    config: &QmdLintConfig,
    options: &LintOptions,
) -> LintSummary {
    let start = Instant::now();
    let linter = Linter::from_config(&config.linter);
    let linter = &linter;

    log::info!(
        "Linting {} document(s) with {} ({} at a time)",
        documents.len(),
        linter,
        options.jobs.max(1)
    );

    let reports = stream::iter(documents)
        .map(|document| lint_document(document, linter, config, options))
        .buffered(options.jobs.max(1))
        .collect::<Vec<_>>()
        .await;

    LintSummary {
        reports,
        duration: start.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(output: Option<LintOutput>, error: Option<&str>) -> DocumentReport {
        let mut report = DocumentReport::new(Path::new("a.qmd"));
        report.output = output;
        report.error = error.map(str::to_string);
        report
    }

    fn output(exit_code: i32) -> LintOutput {
        LintOutput {
            exit_code: Some(exit_code),
            ..LintOutput::default()
        }
    }

    #[test]
    fn test_report_classification() {
        let clean = report(Some(output(0)), None);
        assert!(clean.is_clean());
        assert_eq!(clean.converted, PathBuf::from("a.py"));

        let diagnostics = report(Some(output(4)), None);
        assert!(diagnostics.has_diagnostics());
        assert!(!diagnostics.failed());

        let failed = report(None, Some("pylint not found. Please install pylint."));
        assert!(failed.failed());
        assert!(!failed.has_diagnostics());
    }

    #[test]
    fn test_summary_exit_code() {
        let summary = LintSummary {
            reports: vec![report(Some(output(0)), None), report(Some(output(0)), None)],
            duration: Duration::ZERO,
        };
        assert_eq!(summary.exit_code(), 0);
        assert_eq!(summary.clean(), 2);

        let summary = LintSummary {
            reports: vec![
                report(Some(output(0)), None),
                report(Some(output(16)), None),
                report(None, Some("boom")),
            ],
            duration: Duration::ZERO,
        };
        assert_eq!(summary.exit_code(), 1);
        assert_eq!(summary.failures(), 1);
        assert_eq!(summary.with_diagnostics(), 1);
        assert_eq!(summary.clean(), 1);
    }

    #[test]
    fn test_empty_summary_succeeds() {
        let summary = LintSummary {
            reports: Vec::new(),
            duration: Duration::ZERO,
        };
        assert!(summary.success());
    }

    #[tokio::test]
    async fn test_invalid_document_is_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        let linter = Linter::new("pylint", Vec::new());
        let report = lint_document(
            &dir.path().join("missing.qmd"),
            &linter,
            &QmdLintConfig::default(),
            &LintOptions::default(),
        )
        .await;

        assert!(report.failed());
        assert!(report.error.unwrap().contains("is not a valid .qmd file"));
        assert!(report.line_count.is_none());
    }

    #[tokio::test]
    async fn test_missing_linter_still_cleans_up() {
        let dir = tempfile::TempDir::new().unwrap();
        let doc = dir.path().join("doc.qmd");
        std::fs::write(&doc, "```{python}\nx = 1\n```\n").unwrap();

        let linter = Linter::new("qmd-lint-no-such-linter", Vec::new());
        let report = lint_document(
            &doc,
            &linter,
            &QmdLintConfig::default(),
            &LintOptions::default(),
        )
        .await;

        assert!(report.failed());
        assert!(report.error.unwrap().contains("not found"));
        assert_eq!(report.line_count, Some(3));
        assert!(report.cleanup_warning.is_none());
        assert!(!dir.path().join("doc.py").exists());
    }
}
