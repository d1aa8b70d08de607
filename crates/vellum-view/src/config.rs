//! View configuration.
//!
//! [`ViewConfig`] carries everything the view layer needs from the host
//! application: where templates live, where compiled templates go, and the
//! knobs of the resolution and compilation rules. It can be built in code or
//! loaded from YAML:
//!
//! ```rust
//! use vellum_view::ViewConfig;
//!
//! let config = ViewConfig::from_yaml(r#"
//! base_path: /srv/app
//! paths:
//!   - /srv/app/views
//! strict_variables: true
//! "#).unwrap();
//!
//! assert_eq!(config.cache_root(), std::path::Path::new("/srv/app/storage/views"));
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default for [`ViewConfig::max_layout_depth`].
pub const DEFAULT_MAX_LAYOUT_DEPTH: usize = 32;

/// Default for [`ViewConfig::implicit_suffix`].
pub const DEFAULT_IMPLICIT_SUFFIX: &str = "html";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Template search paths, in priority order.
    pub paths: Vec<PathBuf>,

    /// Application base path. Relative `compiled_path` values resolve against it.
    pub base_path: PathBuf,

    /// Where compiled templates are cached. Defaults to `{base_path}/storage/views`.
    pub compiled_path: Option<PathBuf>,

    /// Suffix tried after an engine selector: with `html`, `page.vellum`
    /// also matches the `vellum.html` engine. `None` disables the fallback.
    pub implicit_suffix: Option<String>,

    /// Reading an unbound variable fails instead of yielding null.
    pub strict_variables: bool,

    /// How many layouts may wrap each other before rendering fails.
    pub max_layout_depth: usize,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            base_path: PathBuf::from("."),
            compiled_path: None,
            implicit_suffix: Some(DEFAULT_IMPLICIT_SUFFIX.to_string()),
            strict_variables: false,
            max_layout_depth: DEFAULT_MAX_LAYOUT_DEPTH,
        }
    }
}

impl ViewConfig {
    /// Default configuration for an application rooted at `base_path`.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            ..Self::default()
        }
    }

    /// Adds a search path.
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.push(path.into());
        self
    }

    /// Sets the compiled template directory.
    pub fn compiled_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.compiled_path = Some(path.into());
        self
    }

    /// Parses a configuration from YAML. Missing keys take their defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Reads and parses a YAML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Directory compiled templates are written to.
    pub fn cache_root(&self) -> PathBuf {
        match &self.compiled_path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => self.base_path.join(path),
            None => self.base_path.join("storage").join("views"),
        }
    }
}
