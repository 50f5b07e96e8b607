//! Integration tests against a real pylint installation
//!
//! These tests need `pylint` on the PATH and only build with
//! `--features integration-tests`.
//!
//! ## Test Architecture
//!
//! Each test uses `TestFixture` to create an isolated copy of the fixture
//! documents in a temporary directory, cleaned up automatically on drop.

mod common;

use anyhow::Result;
use common::TestFixture;
use qmd_lint::{lint_documents, LintOptions, QmdLintConfig};

fn options() -> LintOptions {
    LintOptions {
        keep_temp: false,
        verbose: true,
        jobs: 2,
    }
}

#[tokio::test]
async fn integration_pylint_runs_on_converted_document() -> Result<()> {
    let fixture = TestFixture::new()?;
    let document = fixture.path("analysis.qmd");

    let summary = lint_documents(&[document], &QmdLintConfig::default(), &options()).await;
    let report = &summary.reports[0];

    // Diagnostics are allowed here, only the run itself must succeed
    assert!(report.error.is_none(), "{:?}", report.error);
    assert!(report.output.as_ref().is_some_and(|o| o.exit_code.is_some()));
    assert_eq!(report.line_count, Some(30));
    assert!(!report.converted.exists());
    Ok(())
}

#[tokio::test]
async fn integration_diagnostics_point_at_document_lines() -> Result<()> {
    let fixture = TestFixture::new()?;
    let document = fixture.write(
        "broken.qmd",
        "---\ntitle: Broken\n---\n\nText.\n\n```{python}\n\"\"\"Module.\"\"\"\nprint(undefined_name)\n```\n",
    )?;

    let summary = lint_documents(&[document], &QmdLintConfig::default(), &options()).await;
    let report = &summary.reports[0];
    let output = report.output.as_ref().expect("pylint ran");

    assert!(report.has_diagnostics());
    assert_eq!(summary.exit_code(), 1);

    // undefined_name sits on line 9 of the document
    let diagnostic = output
        .stdout
        .lines()
        .find(|line| line.contains("undefined-variable"))
        .expect("undefined-variable reported");
    assert!(diagnostic.contains("broken.qmd:9:"), "{}", diagnostic);
    assert!(!output.stdout.contains("broken.py"));
    Ok(())
}
