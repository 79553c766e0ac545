use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::path_filter::PathFilter;
use crate::store::{ObjectStore, StatusQuery};
use crate::{Error, Result};

/// Location of the optional config file, relative to the git directory.
pub const CONFIG_FILE: &str = "info/changeview/config.json";

/// Options that shape the change model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModelConfig {
    /// Hex digits shown for abbreviated ids.
    pub abbreviation_length: usize,
    pub include_untracked: bool,
    pub recurse_untracked_dirs: bool,
    pub include_ignored: bool,
    /// Repository-relative paths to restrict the model to; empty means all.
    pub path_filter: Vec<String>,
    /// Drop commits without changes from history ranges.
    pub skip_empty_commits: bool,
    pub merge_strategy: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            abbreviation_length: 7,
            include_untracked: true,
            recurse_untracked_dirs: true,
            include_ignored: false,
            path_filter: Vec::new(),
            skip_empty_commits: false,
            merge_strategy: "resolve".to_string(),
        }
    }
}

impl ModelConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: ModelConfig = serde_json::from_str(&text)?;
        config.validate()?;
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Read the repository's config file, or fall back to defaults when there is none.
    pub fn discover(store: &dyn ObjectStore) -> Result<Self> {
        let path = ModelConfig::path_in(store.git_dir());
        if path.is_file() {
            ModelConfig::load(path)
        } else {
            Ok(ModelConfig::default())
        }
    }

    pub fn path_in(git_dir: &Path) -> PathBuf {
        git_dir.join(CONFIG_FILE)
    }

    pub fn validate(&self) -> Result<()> {
        if !(4..=40).contains(&self.abbreviation_length) {
            return Err(Error::invalid_argument(format!(
                "abbreviationLength must be between 4 and 40, got {}",
                self.abbreviation_length
            )));
        }
        if self.merge_strategy.trim().is_empty() {
            return Err(Error::invalid_argument("mergeStrategy must not be empty"));
        }
        Ok(())
    }

    pub fn filter(&self) -> PathFilter {
        PathFilter::new(&self.path_filter)
    }

    pub fn status_query(&self) -> StatusQuery {
        StatusQuery {
            include_untracked: self.include_untracked,
            recurse_untracked_dirs: self.recurse_untracked_dirs,
            include_ignored: self.include_ignored,
            filter: Some(self.filter()).filter(|f| !f.is_all()),
        }
    }
}
