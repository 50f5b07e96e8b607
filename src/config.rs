use crate::converter::Fences;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Component, Path};

/// File looked up in the current directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "qmd-lint.toml";

/// Configuration for qmd-lint.
///
/// Every section is optional; missing sections fall back to their defaults.
///
/// # Example
///
/// ```toml
/// [linter]
/// command = "${HOME}/.venvs/lint/bin/pylint"
/// flags = ["--disable=C0114"]
///
/// [fences]
/// primary = "python"
/// secondary = "r"
///
/// [verify]
/// markers = ["import inspect", "def model("]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct QmdLintConfig {
    pub linter: LinterConfig,
    pub fences: FenceConfig,
    pub verify: VerifyConfig,
}

/// The external analyzer run on converted files.
///
/// # Security
///
/// The command is validated to prevent command injection. It cannot contain
/// shell metacharacters or use parent directory traversal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LinterConfig {
    /// Analyzer executable (supports ${VAR} environment variable expansion)
    pub command: String,

    /// Arguments passed before the converted file path
    pub flags: Vec<String>,
}

impl Default for LinterConfig {
    fn default() -> Self {
        Self {
            command: "pylint".to_string(),
            flags: Vec::new(),
        }
    }
}

/// Languages of the two recognized fenced block kinds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FenceConfig {
    /// Block kind whose content is linted
    pub primary: String,

    /// Block kind whose content is blanked out
    pub secondary: String,
}

impl Default for FenceConfig {
    fn default() -> Self {
        Self {
            primary: "python".to_string(),
            secondary: "r".to_string(),
        }
    }
}

/// Markers checked when `[verify]` does not list any.
pub const DEFAULT_MARKERS: &[&str] = &[
    "# pylint: disable=missing-module-docstring",
    "import inspect",
    "class ParamClass:",
    "def check_param_names(",
    "def validate_param(",
    "def model(",
];

/// Marker strings checked by the alignment verification in verbose mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct VerifyConfig {
    pub markers: Vec<String>,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            markers: DEFAULT_MARKERS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

impl LinterConfig {
    /// Validate the configuration for security and correctness
    pub fn validate(&self) -> Result<()> {
        if self.command.is_empty() {
            anyhow::bail!("Linter command cannot be empty");
        }

        // Ensure the command doesn't contain shell metacharacters
        let dangerous_chars = [';', '|', '&', '`', '\n', '\r'];
        for ch in dangerous_chars {
            if self.command.contains(ch) {
                anyhow::bail!(
                    "Linter command contains invalid character '{}': {}",
                    ch.escape_default(),
                    self.command
                );
            }
        }

        let command_path = Path::new(&self.command);
        for component in command_path.components() {
            if matches!(component, Component::ParentDir) {
                anyhow::bail!("Linter command cannot contain '..': {}", self.command);
            }
        }

        Ok(())
    }
}

impl FenceConfig {
    pub fn to_fences(&self) -> Fences {
        Fences::new(self.primary.as_str(), self.secondary.as_str())
    }

    pub fn validate(&self) -> Result<()> {
        for (role, language) in [("primary", &self.primary), ("secondary", &self.secondary)] {
            if language.is_empty() {
                anyhow::bail!("The {} fence language cannot be empty", role);
            }
            if language
                .chars()
                .any(|c| c == '{' || c == '}' || c.is_whitespace())
            {
                anyhow::bail!(
                    "The {} fence language contains braces or whitespace: '{}'",
                    role,
                    language
                );
            }
        }

        if self.primary == self.secondary {
            anyhow::bail!(
                "The primary and secondary fence languages must differ (both are '{}')",
                self.primary
            );
        }

        Ok(())
    }
}

impl QmdLintConfig {
    /// Parse configuration from TOML text, expand environment variables and validate.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: QmdLintConfig =
            toml::from_str(content).context("Failed to parse configuration")?;
        config.finalize()?;
        Ok(config)
    }

    /// Load configuration from `path`, or from [`DEFAULT_CONFIG_FILE`] in the
    /// current directory when no path is given. Falls back to defaults if
    /// neither exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if !default_path.is_file() {
                    log::debug!("No {} found, using default configuration", DEFAULT_CONFIG_FILE);
                    return Ok(Self::default());
                }
                default_path.to_path_buf()
            }
        };

        log::info!("Loading configuration from {}", path.display());
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    fn finalize(&mut self) -> Result<()> {
        self.linter.command = expand_env_vars(&self.linter.command);
        for flag in self.linter.flags.iter_mut() {
            *flag = expand_env_vars(flag);
        }

        self.linter
            .validate()
            .context("Invalid [linter] configuration")?;
        self.fences
            .validate()
            .context("Invalid [fences] configuration")?;

        Ok(())
    }

    pub fn fences(&self) -> Fences {
        self.fences.to_fences()
    }
}

/// Expand environment variables in a string
/// Supports ${VAR_NAME} syntax
/// This function processes the string in a single pass to avoid re-processing expanded values
fn expand_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'

            let mut var_name = String::new();
            let mut found_close = false;

            for ch in chars.by_ref() {
                if ch == '}' {
                    found_close = true;
                    break;
                }
                var_name.push(ch);
            }

            if found_close {
                match env::var(&var_name) {
                    Ok(value) => result.push_str(&value),
                    Err(_) => {
                        log::warn!(
                            "Environment variable '{}' not found, leaving unexpanded",
                            var_name
                        );
                        result.push_str("${");
                        result.push_str(&var_name);
                        result.push('}');
                    }
                }
            } else {
                // No closing brace found, treat as literal
                result.push_str("${");
                result.push_str(&var_name);
            }
        } else {
            result.push(ch);
        }
    }

    result
}
