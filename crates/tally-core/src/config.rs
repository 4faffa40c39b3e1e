use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, TallyError};
use crate::paths::Project;

/// Project configuration read from `.tally/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub lock: LockConfig,
    #[serde(default)]
    pub notes: NotesConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConfig {
    #[serde(default = "default_lock_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl LockConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotesConfig {
    /// Short name of the notes ref; `tally` means `refs/notes/tally`.
    #[serde(default = "default_notes_ref", rename = "ref")]
    pub notes_ref: String,
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            notes_ref: default_notes_ref(),
        }
    }
}

impl NotesConfig {
    /// Fully qualified ref name.
    #[must_use]
    pub fn full_ref(&self) -> String {
        if self.notes_ref.starts_with("refs/") {
            self.notes_ref.clone()
        } else {
            format!("refs/notes/{}", self.notes_ref)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Number of commits `tally report` walks when none are named.
    #[serde(default = "default_report_limit")]
    pub limit: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            limit: default_report_limit(),
        }
    }
}

/// Template written by `tally init`.
pub const CONFIG_TEMPLATE: &str = "\
[lock]
timeout_ms = 2000

[notes]
ref = \"tally\"

[report]
limit = 10
";

/// Load the project config, falling back to defaults when the file is absent.
///
/// # Errors
///
/// Returns [`TallyError::Config`] if the file exists but cannot be parsed,
/// or [`TallyError::Io`] if it cannot be read.
pub fn load_project_config(project: &Project) -> Result<ProjectConfig> {
    load_from(&project.config_toml)
}

fn load_from(path: &Path) -> Result<ProjectConfig> {
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    toml::from_str::<ProjectConfig>(&content).map_err(|source| TallyError::Config {
        path: path.to_path_buf(),
        source,
    })
}

const fn default_lock_timeout_ms() -> u64 {
    2_000
}

fn default_notes_ref() -> String {
    "tally".to_string()
}

const fn default_report_limit() -> usize {
    10
}
