//! Configuration for remote-edit.
//!
//! Settings are read from `~/.config/remote-edit/config.toml`:
//!
//! ```toml
//! default_host = "{SUNetID}@cardinal.stanford.edu"
//! default_path = "~/"
//! scp_program = "scp"
//! max_attempts = 3
//!
//! [template_vars]
//! SUNetID = "alice"
//! ```
//!
//! A missing file yields [`RemoteEditConfig::default`]. Host and path strings
//! may contain `{name}` placeholders, substituted from `template_vars` before
//! any transfer runs (see [`RemoteEditConfig::expand`]).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Template variable holding the user's login on the remote host.
pub const SUNETID_VAR: &str = "SUNetID";

/// Default attempt budget for a single transfer.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Errors from loading configuration or expanding templates.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Unknown template variable {{{name}}} in {template:?}")]
    UnknownTemplateVariable { name: String, template: String },

    #[error("Unterminated placeholder in {0:?}")]
    UnterminatedPlaceholder(String),

    #[error("Unmatched '}}' in {0:?}")]
    UnmatchedBrace(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RemoteEditConfig {
    /// Values substituted for `{name}` placeholders in hosts and paths.
    pub template_vars: BTreeMap<String, String>,
    /// Host template pre-filled in the host prompt.
    pub default_host: String,
    /// Path template pre-filled in the path prompt.
    pub default_path: String,
    /// Root of the local cache tree.
    pub cache_root: PathBuf,
    /// Secure copy executable.
    pub scp_program: String,
    /// Attempts per transfer before giving up.
    pub max_attempts: u32,
}

impl Default for RemoteEditConfig {
    fn default() -> Self {
        let mut template_vars = BTreeMap::new();
        template_vars.insert(
            SUNETID_VAR.to_string(),
            std::env::var("USER").unwrap_or_default(),
        );

        Self {
            template_vars,
            default_host: "{SUNetID}@cardinal.stanford.edu".into(),
            default_path: "~/".into(),
            cache_root: default_cache_root(),
            scp_program: "scp".into(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl RemoteEditConfig {
    /// Load configuration from `path`, or from the default location when `None`.
    ///
    /// A missing file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::config_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config: Self =
            toml::from_str(&content).map_err(|source| ConfigError::Parse { path, source })?;
        Ok(config)
    }

    /// Default config file location.
    pub fn config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "remote-edit")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Set the user identifier substituted for `{SUNetID}`.
    pub fn with_sunetid(mut self, id: impl Into<String>) -> Self {
        self.template_vars.insert(SUNETID_VAR.to_string(), id.into());
        self
    }

    /// Attempt budget, never below one.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Expand `{name}` placeholders in `template`.
    pub fn expand(&self, template: &str) -> Result<String, ConfigError> {
        expand_template(template, &self.template_vars)
    }

    /// Expanded default host, used to pre-fill prompts.
    pub fn default_host(&self) -> Result<String, ConfigError> {
        self.expand(&self.default_host)
    }

    /// Expanded default path, used to pre-fill prompts.
    pub fn default_path(&self) -> Result<String, ConfigError> {
        self.expand(&self.default_path)
    }
}

/// Default cache root: `<tmp>/remote-edit`.
pub fn default_cache_root() -> PathBuf {
    std::env::temp_dir().join("remote-edit")
}

/// Substitute `{name}` placeholders from `vars`.
///
/// `{{` and `}}` produce literal braces.
pub fn expand_template(
    template: &str,
    vars: &BTreeMap<String, String>,
) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => name.push(ch),
                        None => {
                            return Err(ConfigError::UnterminatedPlaceholder(template.to_string()));
                        }
                    }
                }
                let value = vars.get(&name).ok_or_else(|| ConfigError::UnknownTemplateVariable {
                    name: name.clone(),
                    template: template.to_string(),
                })?;
                out.push_str(value);
            }
            '}' => return Err(ConfigError::UnmatchedBrace(template.to_string())),
            _ => out.push(c),
        }
    }

    Ok(out)
}
