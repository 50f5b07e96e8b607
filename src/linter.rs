use crate::config::LinterConfig;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;
use std::io::ErrorKind;
use std::path::Path;
use tokio::process::Command;

/// Captured result of one analyzer run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LintOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code, `None` if the analyzer was killed by a signal
    pub exit_code: Option<i32>,
}

impl LintOutput {
    /// True when the analyzer exited with status 0, i.e. reported nothing.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Attributes the output to `document` instead of the converted file.
    pub fn attribute_to(self, converted: &Path, document: &Path) -> Self {
        Self {
            stdout: rewrite_output(&self.stdout, converted, document),
            stderr: rewrite_output(&self.stderr, converted, document),
            exit_code: self.exit_code,
        }
    }
}

/// Replaces every mention of `converted` in `text` with `document`.
///
/// Both the path as written and the path without a leading `./` are
/// replaced, since analyzers may print either form.
///
/// ```
/// use qmd_lint::rewrite_output;
/// use std::path::Path;
///
/// let text = "docs/intro.py:12:0: C0103: Invalid name";
/// let out = rewrite_output(text, Path::new("./docs/intro.py"), Path::new("./docs/intro.qmd"));
/// assert_eq!(out, "./docs/intro.qmd:12:0: C0103: Invalid name");
/// ```
pub fn rewrite_output(text: &str, converted: &Path, document: &Path) -> String {
    let converted = converted.display().to_string();
    let document = document.display().to_string();

    let mut rewritten = text.replace(&converted, &document);
    if let Some(short) = converted.strip_prefix("./") {
        if !short.is_empty() {
            rewritten = rewritten.replace(short, &document);
        }
    }
    rewritten
}

/// The external analyzer, invoked as `<command> <flags...> <file>`.
#[derive(Debug, Clone)]
pub struct Linter {
    command: String,
    flags: Vec<String>,
}

impl fmt::Display for Linter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command)?;
        for flag in &self.flags {
            write!(f, " {}", flag)?;
        }
        Ok(())
    }
}

impl Linter {
    pub fn new(command: impl Into<String>, flags: Vec<String>) -> Self {
        Self {
            command: command.into(),
            flags,
        }
    }

    pub fn from_config(config: &LinterConfig) -> Self {
        Self::new(config.command.clone(), config.flags.clone())
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Runs the analyzer on `file` and captures its output.
    ///
    /// A non-zero exit status is not an error: it is returned in
    /// [`LintOutput::exit_code`] so the caller can count diagnostics.
    ///
    /// # Errors
    ///
    /// Returns an error if the analyzer executable cannot be found or started.
    pub async fn run(&self, file: &Path) -> Result<LintOutput> {
        log::debug!("Running {} on {}", self, file.display());

        let output = match Command::new(&self.command)
            .args(&self.flags)
            .arg(file)
            .output()
            .await
        {
            Ok(output) => output,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                anyhow::bail!(
                    "{} not found. Please install {}.",
                    self.command,
                    self.command
                );
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!(
                        "Failed to execute linter '{}'\nFlags: {:?}\nFile: {}",
                        self.command,
                        self.flags,
                        file.display()
                    )
                });
            }
        };

        Ok(LintOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        })
    }
}
