use crate::config::QmdLintConfig;
use crate::converter::{convert_with, split_lines};
use crate::verify::{verify_alignment, AlignmentReport};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// Extension of literate documents.
pub const DOCUMENT_EXTENSION: &str = "qmd";

/// Extension of converted files.
pub const CONVERTED_EXTENSION: &str = "py";

pub fn is_document(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(DOCUMENT_EXTENSION)
}

/// Ensures `path` exists and has the `.qmd` extension.
pub fn validate_document(path: &Path) -> Result<()> {
    if !path.is_file() || !is_document(path) {
        anyhow::bail!("{} is not a valid .{} file", path.display(), DOCUMENT_EXTENSION);
    }
    Ok(())
}

/// `docs/intro.qmd` -> `docs/intro.py`
pub fn default_output_path(document: &Path) -> PathBuf {
    document.with_extension(CONVERTED_EXTENSION)
}

/// Collects documents from a mix of files and directories.
///
/// Files are kept when they have the `.qmd` extension, directories are
/// searched recursively. Entries within a directory are visited in sorted
/// order and a document reached twice is only listed once.
///
/// # Errors
///
/// Returns an error if a directory cannot be read.
pub fn gather_documents(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut documents = Vec::new();
    let mut seen = HashSet::new();

    for path in paths {
        if path.is_file() {
            if is_document(path) {
                push_unique(&mut documents, &mut seen, path.clone());
            } else {
                log::warn!("Skipping {}: not a .{} file", path.display(), DOCUMENT_EXTENSION);
            }
        } else if path.is_dir() {
            let mut found = Vec::new();
            collect_from_dir(path, &mut found)?;
            for document in found {
                push_unique(&mut documents, &mut seen, document);
            }
        } else {
            log::warn!("Skipping {}: no such file or directory", path.display());
        }
    }

    Ok(documents)
}

fn push_unique(documents: &mut Vec<PathBuf>, seen: &mut HashSet<PathBuf>, path: PathBuf) {
    let key = path.canonicalize().unwrap_or_else(|_| path.clone());
    if seen.insert(key) {
        documents.push(path);
    }
}

fn collect_from_dir(dir: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
    {
        let entry =
            entry.with_context(|| format!("Failed to read directory: {}", dir.display()))?;
        entries.push(entry.path());
    }
    entries.sort();

    for path in entries {
        if path.is_dir() {
            collect_from_dir(&path, found)?;
        } else if is_document(&path) {
            found.push(path);
        }
    }

    Ok(())
}

/// Reads a document as UTF-8 text.
pub async fn read_document(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

/// Writes `lines` to `path`, terminating every line with `\n`.
pub async fn write_lines(path: &Path, lines: &[String]) -> Result<()> {
    let mut file = File::create(path)
        .await
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let write_error = || format!("Failed to write {}", path.display());
    for line in lines {
        file.write_all(line.as_bytes())
            .await
            .with_context(write_error)?;
        file.write_all(b"\n").await.with_context(write_error)?;
    }
    file.flush().await.with_context(write_error)?;

    Ok(())
}

/// Outcome of converting one document to a file.
#[derive(Debug, Clone)]
pub struct ConversionSummary {
    pub document: PathBuf,
    pub output: PathBuf,
    pub line_count: usize,
    /// Set when the metadata header opened on line 1 never closes
    pub ends_in_header: bool,
    /// Only computed in verbose mode
    pub alignment: Option<AlignmentReport>,
}

/// Converts `document` into a line-aligned `.py` file.
///
/// The output defaults to the document path with a `.py` extension.
///
/// # Errors
///
/// Returns an error if the document is missing, is not a `.qmd` file, or if
/// reading or writing fails.
pub async fn convert_file(
    document: &Path,
    output: Option<&Path>,
    config: &QmdLintConfig,
    verbose: bool,
) -> Result<ConversionSummary> {
    validate_document(document)?;

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output_path(document));
    log::info!("Converting {} to {}", document.display(), output.display());

    let text = read_document(document).await?;
    let lines = split_lines(&text);
    let fences = config.fences();
    let conversion = convert_with(&lines, &fences);

    if conversion.ends_in_header() {
        log::warn!(
            "{}: metadata header opened on line 1 is never closed, the rest of the document was converted to filler",
            document.display()
        );
    }

    write_lines(&output, &conversion.lines).await?;

    log::info!(
        "Converted {} to {} ({} -> {} lines)",
        document.display(),
        output.display(),
        lines.len(),
        conversion.lines.len()
    );

    let alignment = if verbose {
        let report = verify_alignment(&lines, &conversion.lines, &config.verify.markers, &fences);
        report.log();
        Some(report)
    } else {
        None
    };

    Ok(ConversionSummary {
        document: document.to_path_buf(),
        output,
        line_count: conversion.lines.len(),
        ends_in_header: conversion.ends_in_header(),
        alignment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = "---\ntitle: Sample\n---\n\nSome prose.\n\n```{python}\nimport os\n\nprint(os.getcwd())\n```\n\n```{r}\nx <- 1\n```\n";

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path(Path::new("docs/intro.qmd")),
            PathBuf::from("docs/intro.py")
        );
    }

    #[test]
    fn test_validate_document() {
        let dir = TempDir::new().unwrap();
        let doc = dir.path().join("a.qmd");
        let other = dir.path().join("a.md");
        touch(&doc);
        touch(&other);

        assert!(validate_document(&doc).is_ok());
        assert!(validate_document(&other).is_err());
        assert!(validate_document(&dir.path().join("missing.qmd")).is_err());
        assert!(validate_document(dir.path()).is_err());
    }

    #[test]
    fn test_gather_documents_recurses_and_dedupes() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(&root.join("b.qmd"));
        touch(&root.join("a.qmd"));
        touch(&root.join("notes.md"));
        touch(&root.join("nested/deeper/c.qmd"));
        touch(&root.join("nested/d.py"));

        let documents =
            gather_documents(&[root.join("a.qmd"), root.to_path_buf(), root.join("nope")])
                .unwrap();

        assert_eq!(
            documents,
            vec![
                root.join("a.qmd"),
                root.join("b.qmd"),
                root.join("nested/deeper/c.qmd"),
            ]
        );
    }

    #[test]
    fn test_gather_documents_ignores_other_files() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("readme.md"));
        let documents = gather_documents(&[dir.path().join("readme.md")]).unwrap();
        assert!(documents.is_empty());
    }

    #[tokio::test]
    async fn test_convert_file_preserves_line_count() {
        let dir = TempDir::new().unwrap();
        let doc = dir.path().join("sample.qmd");
        fs::write(&doc, SAMPLE).unwrap();

        let summary = convert_file(&doc, None, &QmdLintConfig::default(), true)
            .await
            .unwrap();

        assert_eq!(summary.output, dir.path().join("sample.py"));
        assert_eq!(summary.line_count, SAMPLE.lines().count());
        assert!(!summary.ends_in_header);
        assert!(summary.alignment.as_ref().is_some_and(|r| r.is_aligned()));

        let written = fs::read_to_string(&summary.output).unwrap();
        assert_eq!(
            written,
            "# ---\n# -\n# ---\n#\n# -\n#\n# %% [python]\nimport os\n\nprint(os.getcwd())\n\n#\n# -\n# -\n# ```\n"
        );
    }

    #[tokio::test]
    async fn test_convert_file_explicit_output_and_crlf() {
        let dir = TempDir::new().unwrap();
        let doc = dir.path().join("crlf.qmd");
        let out = dir.path().join("out/converted.py");
        fs::create_dir_all(out.parent().unwrap()).unwrap();
        fs::write(&doc, "```{python}\r\nx = 1\r\n```\r\n").unwrap();

        let summary = convert_file(&doc, Some(&out), &QmdLintConfig::default(), false)
            .await
            .unwrap();

        assert_eq!(summary.output, out);
        assert!(summary.alignment.is_none());
        assert_eq!(fs::read_to_string(&out).unwrap(), "# %% [python]\nx = 1\n\n");
    }

    #[tokio::test]
    async fn test_convert_file_reports_unterminated_header() {
        let dir = TempDir::new().unwrap();
        let doc = dir.path().join("open.qmd");
        fs::write(&doc, "---\ntitle: x\n```{python}\nx = 1\n```\n").unwrap();

        let summary = convert_file(&doc, None, &QmdLintConfig::default(), false)
            .await
            .unwrap();

        assert!(summary.ends_in_header);
        assert_eq!(
            fs::read_to_string(&summary.output).unwrap(),
            "# ---\n# -\n# -\n# -\n# -\n"
        );
    }

    #[tokio::test]
    async fn test_convert_empty_document() {
        let dir = TempDir::new().unwrap();
        let doc = dir.path().join("empty.qmd");
        fs::write(&doc, "").unwrap();

        let summary = convert_file(&doc, None, &QmdLintConfig::default(), false)
            .await
            .unwrap();

        assert_eq!(summary.line_count, 0);
        assert_eq!(fs::read_to_string(&summary.output).unwrap(), "");
    }

    #[tokio::test]
    async fn test_convert_file_rejects_wrong_extension() {
        let dir = TempDir::new().unwrap();
        let doc = dir.path().join("notes.md");
        fs::write(&doc, "text\n").unwrap();

        let err = convert_file(&doc, None, &QmdLintConfig::default(), false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("is not a valid .qmd file"));
        assert!(!dir.path().join("notes.py").exists());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_write_lines_error_names_the_file() {
        // Opens fine, every write fails with ENOSPC
        let full = Path::new("/dev/full");
        if !full.exists() {
            return;
        }

        let err = write_lines(full, &["x = 1".to_string()]).await.unwrap_err();
        assert!(
            format!("{:#}", err).contains("Failed to write /dev/full"),
            "{:#}",
            err
        );
    }
}
