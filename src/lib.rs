//! qmd-lint library
//!
//! Converts Quarto (`.qmd`) documents into Python files that keep every line
//! of the document at the same line number, so a Python linter run on the
//! converted file reports diagnostics that point straight back into the
//! document. The primary interface is the `qmd-lint` binary.
//!
//! ## Public API
//!
//! The conversion core is [`convert`] / [`convert_with`], a single pass over
//! the document lines that returns exactly one output line per input line.
//!
//! Around it:
//! - [`convert_file`] - Convert a document on disk to a `.py` file
//! - [`lint_documents`] - Convert documents, run the linter and collect [`DocumentReport`]s
//! - [`verify_alignment`] - Check a conversion for line alignment
//! - [`QmdLintConfig`] - Configuration loaded from `qmd-lint.toml`

mod config;
mod converter;
mod document;
mod lint;
mod linter;
mod reporting;
mod verify;

pub use config::{
    FenceConfig, LinterConfig, QmdLintConfig, VerifyConfig, DEFAULT_CONFIG_FILE, DEFAULT_MARKERS,
};
pub use converter::{
    classify, convert, convert_with, split_lines, Conversion, Converter, Fences, LineKind, Region,
    BLANK_FILLER, CLOSING_FENCE, FILLER, HEADER_DELIMITER, HEADER_SENTINEL,
    SECONDARY_CLOSE_SENTINEL,
};
pub use document::{
    convert_file, default_output_path, gather_documents, is_document, read_document,
    validate_document, write_lines, ConversionSummary, CONVERTED_EXTENSION, DOCUMENT_EXTENSION,
};
pub use lint::{lint_document, lint_documents, DocumentReport, LintOptions, LintSummary};
pub use linter::{rewrite_output, LintOutput, Linter};
pub use reporting::{
    is_broken_pipe, print_document_report, print_json, print_lint_statistics, report_error,
    report_warning,
};
pub use verify::{verify_alignment, AlignmentReport, MarkerCheck, MarkerStatus};
