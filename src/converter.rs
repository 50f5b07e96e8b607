/// Bare delimiter that opens and closes the metadata header on the first line.
pub const HEADER_DELIMITER: &str = "---";

/// Closing fence shared by every fenced code block.
pub const CLOSING_FENCE: &str = "```";

/// Emitted in place of either metadata header delimiter.
pub const HEADER_SENTINEL: &str = "# ---";

/// Filler for blank lines outside primary code blocks.
pub const BLANK_FILLER: &str = "#";

/// Filler for non-blank lines outside primary code blocks.
pub const FILLER: &str = "# -";

/// Emitted in place of the closing fence of a secondary code block.
pub const SECONDARY_CLOSE_SENTINEL: &str = "# ```";

/// The two fenced block kinds the converter recognizes.
///
/// A block opens on a line starting with `` ```{<language>} ``. Content of the
/// primary kind is reproduced verbatim, content of the secondary kind is
/// replaced by filler. Fences of any other language are plain prose.
///
/// ````markdown
/// ```{python}
/// x = 1        <- kept
/// ```
///
/// ```{r}
/// summary(x)   <- replaced by filler
/// ```
/// ````
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fences {
    primary: String,
    secondary: String,
    primary_open: String,
    secondary_open: String,
    primary_sentinel: String,
}

impl Fences {
    pub fn new(primary: impl Into<String>, secondary: impl Into<String>) -> Self {
        let primary = primary.into();
        let secondary = secondary.into();
        Self {
            primary_open: format!("{}{{{}}}", CLOSING_FENCE, primary),
            secondary_open: format!("{}{{{}}}", CLOSING_FENCE, secondary),
            primary_sentinel: format!("# %% [{}]", primary),
            primary,
            secondary,
        }
    }

    /// Language of the block kind whose content is kept (e.g. "python").
    pub fn primary(&self) -> &str {
        &self.primary
    }

    /// Language of the block kind whose content is suppressed (e.g. "r").
    pub fn secondary(&self) -> &str {
        &self.secondary
    }

    /// Line emitted in place of a primary block's opening fence.
    pub fn primary_sentinel(&self) -> &str {
        &self.primary_sentinel
    }

    fn opens_primary(&self, line: &str) -> bool {
        line.starts_with(&self.primary_open)
    }

    fn opens_secondary(&self, line: &str) -> bool {
        line.starts_with(&self.secondary_open)
    }

    /// Returns true if the converter would treat `line` as an opening or
    /// closing fence of either recognized kind.
    pub fn is_fence_token(&self, line: &str) -> bool {
        self.opens_primary(line) || self.opens_secondary(line) || line.trim() == CLOSING_FENCE
    }
}

impl Default for Fences {
    fn default() -> Self {
        Self::new("python", "r")
    }
}

/// Structural region the converter is in between two lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Region {
    /// Prose before the first line has been seen. Only here can a metadata
    /// header start.
    #[default]
    Start,
    Prose,
    Header,
    PrimaryBlock,
    SecondaryBlock,
}

/// Classification of a single input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    HeaderDelimiter,
    HeaderContent,
    PrimaryOpen,
    PrimaryContent,
    PrimaryClose,
    SecondaryOpen,
    SecondaryContent,
    SecondaryClose,
    ProseBlank,
    ProseContent,
}

impl LineKind {
    /// Returns true for lines that open or close the header or a block.
    pub fn is_boundary(self) -> bool {
        matches!(
            self,
            LineKind::HeaderDelimiter
                | LineKind::PrimaryOpen
                | LineKind::PrimaryClose
                | LineKind::SecondaryOpen
                | LineKind::SecondaryClose
        )
    }

    /// Produces the output line for an input line of this kind.
    pub fn render<'a>(self, line: &'a str, fences: &'a Fences) -> &'a str {
        match self {
            LineKind::HeaderDelimiter => HEADER_SENTINEL,
            LineKind::PrimaryOpen => fences.primary_sentinel(),
            LineKind::PrimaryContent => line,
            LineKind::PrimaryClose => "",
            LineKind::SecondaryOpen => FILLER,
            LineKind::SecondaryClose => SECONDARY_CLOSE_SENTINEL,
            LineKind::HeaderContent | LineKind::SecondaryContent | LineKind::ProseContent => {
                if line.trim().is_empty() {
                    BLANK_FILLER
                } else {
                    FILLER
                }
            }
            LineKind::ProseBlank => BLANK_FILLER,
        }
    }
}

/// Classifies `line` in `region` and returns the region for the next line.
///
/// Comparisons are made against the trimmed line, except for opening fences
/// which must start at column zero.
pub fn classify(region: Region, line: &str, fences: &Fences) -> (LineKind, Region) {
    let trimmed = line.trim();

    match region {
        Region::Start if trimmed == HEADER_DELIMITER => {
            return (LineKind::HeaderDelimiter, Region::Header);
        }
        Region::Header if trimmed == HEADER_DELIMITER => {
            return (LineKind::HeaderDelimiter, Region::Prose);
        }
        Region::Header => return (LineKind::HeaderContent, Region::Header),
        _ => {}
    }

    if fences.opens_primary(line) {
        return (LineKind::PrimaryOpen, Region::PrimaryBlock);
    }
    if fences.opens_secondary(line) {
        return (LineKind::SecondaryOpen, Region::SecondaryBlock);
    }

    match region {
        Region::PrimaryBlock if trimmed == CLOSING_FENCE => (LineKind::PrimaryClose, Region::Prose),
        Region::SecondaryBlock if trimmed == CLOSING_FENCE => {
            (LineKind::SecondaryClose, Region::Prose)
        }
        Region::PrimaryBlock => (LineKind::PrimaryContent, Region::PrimaryBlock),
        Region::SecondaryBlock => (LineKind::SecondaryContent, Region::SecondaryBlock),
        _ if trimmed.is_empty() => (LineKind::ProseBlank, Region::Prose),
        _ => (LineKind::ProseContent, Region::Prose),
    }
}

/// Output of a single conversion pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    /// One output line per input line, without terminators.
    pub lines: Vec<String>,
    /// Classification of each input line, index-aligned with `lines`.
    pub kinds: Vec<LineKind>,
    /// Region the converter was in after the last line.
    pub final_region: Region,
}

impl Conversion {
    /// True when the document opened a metadata header that was never closed,
    /// in which case everything after the first line was converted to filler.
    pub fn ends_in_header(&self) -> bool {
        self.final_region == Region::Header
    }

    /// Serializes the output with a `\n` after every line.
    pub fn to_text(&self) -> String {
        let mut text = String::with_capacity(self.lines.iter().map(|l| l.len() + 1).sum());
        for line in &self.lines {
            text.push_str(line);
            text.push('\n');
        }
        text
    }
}

/// Single-pass, line-by-line converter.
///
/// Every call to [`Converter::push_line`] appends exactly one output line, so
/// the output always has as many lines as were pushed.
pub struct Converter<'f> {
    fences: &'f Fences,
    region: Region,
    lines: Vec<String>,
    kinds: Vec<LineKind>,
}

impl<'f> Converter<'f> {
    pub fn new(fences: &'f Fences) -> Self {
        Self {
            fences,
            region: Region::Start,
            lines: Vec::new(),
            kinds: Vec::new(),
        }
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn push_line(&mut self, line: &str) -> LineKind {
        let (kind, next) = classify(self.region, line, self.fences);
        self.lines.push(kind.render(line, self.fences).to_string());
        self.kinds.push(kind);
        self.region = next;
        kind
    }

    pub fn finish(self) -> Conversion {
        Conversion {
            lines: self.lines,
            kinds: self.kinds,
            final_region: self.region,
        }
    }
}

/// Converts document lines using the given fences.
pub fn convert_with<I, S>(lines: I, fences: &Fences) -> Conversion
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut converter = Converter::new(fences);
    for line in lines {
        converter.push_line(line.as_ref());
    }
    converter.finish()
}

/// Converts document lines with the default `python` / `r` fences.
///
/// # Example
///
/// ```
/// use qmd_lint::convert;
///
/// let out = convert(&["```{python}", "x = 1", "```"]);
/// assert_eq!(out, vec!["# %% [python]", "x = 1", ""]);
/// ```
pub fn convert<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    convert_with(lines, &Fences::default()).lines
}

/// Splits document text into physical lines, dropping `\n` / `\r\n`
/// terminators. A trailing terminator does not produce an extra empty line.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.lines().collect()
}
