//! Line alignment self-check.
//!
//! Compares a document with its converted output using only the converted
//! lines, so it can catch regressions in the converter without trusting it.

use crate::converter::Fences;

/// Where a marker was found in the document and in the converted output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerCheck {
    pub marker: String,
    /// 1-based line of the first occurrence in the document
    pub document_line: Option<usize>,
    /// 1-based line of the first occurrence in the converted output
    pub converted_line: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerStatus {
    Aligned,
    /// Found in both, `converted - document` lines apart
    Shifted(i64),
    /// Found in the document but not in the converted output
    Missing,
    /// Not present in the document at all
    Absent,
}

impl MarkerCheck {
    pub fn status(&self) -> MarkerStatus {
        match (self.document_line, self.converted_line) {
            (Some(d), Some(c)) if d == c => MarkerStatus::Aligned,
            (Some(d), Some(c)) => MarkerStatus::Shifted(c as i64 - d as i64),
            (Some(_), None) => MarkerStatus::Missing,
            (None, _) => MarkerStatus::Absent,
        }
    }
}

/// Result of [`verify_alignment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentReport {
    pub document_lines: usize,
    pub converted_lines: usize,
    pub markers: Vec<MarkerCheck>,
    /// 1-based lines of the converted output that read as a fence token
    pub fence_like_lines: Vec<usize>,
}

impl AlignmentReport {
    /// True when line counts match, no marker moved, and no converted line
    /// could re-open or close a block.
    ///
    /// Markers missing from the output do not count as misalignment: a marker
    /// in prose is expected to disappear.
    pub fn is_aligned(&self) -> bool {
        self.document_lines == self.converted_lines
            && self.fence_like_lines.is_empty()
            && !self
                .markers
                .iter()
                .any(|m| matches!(m.status(), MarkerStatus::Shifted(_)))
    }

    /// Writes the report through the `log` facade at info level.
    pub fn log(&self) {
        log::info!("=== Line Alignment Verification ===");
        log::info!(
            "Line count: {} -> {}",
            self.document_lines,
            self.converted_lines
        );

        for check in &self.markers {
            let label: String = check.marker.chars().take(35).collect();
            match check.status() {
                MarkerStatus::Aligned => {
                    log::info!(
                        "  ok       {:<35}: line {}",
                        label,
                        check.document_line.unwrap_or_default()
                    );
                }
                MarkerStatus::Shifted(diff) => {
                    log::warn!(
                        "  shifted  {:<35}: document={}, converted={} (diff: {:+})",
                        label,
                        check.document_line.unwrap_or_default(),
                        check.converted_line.unwrap_or_default(),
                        diff
                    );
                }
                MarkerStatus::Missing => {
                    log::info!(
                        "  missing  {:<35}: document line {} not in converted output",
                        label,
                        check.document_line.unwrap_or_default()
                    );
                }
                MarkerStatus::Absent => {
                    log::debug!("  absent   {:<35}", label);
                }
            }
        }

        for line in &self.fence_like_lines {
            log::warn!("  converted line {} reads as a fence token", line);
        }

        if self.is_aligned() {
            log::info!("Alignment verified");
        } else {
            log::warn!("Alignment issues detected");
        }
    }
}

/// Checks that `converted` lines up with `document`.
pub fn verify_alignment<D, C>(
    document: &[D],
    converted: &[C],
    markers: &[String],
    fences: &Fences,
) -> AlignmentReport
where
    D: AsRef<str>,
    C: AsRef<str>,
{
    let markers = markers
        .iter()
        .map(|marker| MarkerCheck {
            marker: marker.clone(),
            document_line: find_line_with_content(document, marker),
            converted_line: find_line_with_content(converted, marker),
        })
        .collect();

    let fence_like_lines = converted
        .iter()
        .enumerate()
        .filter_map(|(i, line)| fences.is_fence_token(line.as_ref()).then_some(i + 1))
        .collect();

    AlignmentReport {
        document_lines: document.len(),
        converted_lines: converted.len(),
        markers,
        fence_like_lines,
    }
}

/// 1-based line number of the first line containing `content`.
fn find_line_with_content<S: AsRef<str>>(lines: &[S], content: &str) -> Option<usize> {
    lines
        .iter()
        .position(|line| line.as_ref().contains(content))
        .map(|i| i + 1)
}
