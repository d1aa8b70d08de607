//! Engine for directive templates.
//!
//! Sources are compiled with [`vellum_directive::compile`], cached through a
//! [`CompiledCache`] and interpreted by a fresh [`Frame`] per render. When
//! the template ran `@extends`, the captured output is handed to the layout
//! as `contents`.

use std::path::{Path, PathBuf};

use tracing::debug;
use vellum_directive::Program;

use super::Engine;
use crate::cache::{CacheStatus, CompiledCache};
use crate::context::Context;
use crate::error::ViewError;
use crate::exec::Frame;
use crate::view::View;

/// Compiles directive templates to cached programs and runs them.
///
/// # Example
///
/// ```rust,no_run
/// use vellum_view::{CompilingEngine, Manager};
/// use serde_json::json;
///
/// let manager = Manager::new()
///     .add_path("views")
///     .add_engine("vellum.html", CompilingEngine::new("storage/views"));
///
/// let html = manager.view("home", &json!({"title": "Welcome"})).unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct CompilingEngine {
    cache: CompiledCache,
    strict_variables: bool,
}

impl CompilingEngine {
    /// Creates an engine writing compiled templates under `cache_root`.
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache: CompiledCache::new(cache_root),
            strict_variables: false,
        }
    }

    /// Whether unbound variables are an error instead of null.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict_variables = strict;
        self
    }

    pub fn cache(&self) -> &CompiledCache {
        &self.cache
    }

    /// Compiles `path` unless its cached artifact is current.
    pub fn compile_if_stale(&self, path: &Path) -> Result<(Program, CacheStatus), ViewError> {
        Ok(self.cache.load_or_compile(path)?)
    }
}

impl Engine for CompilingEngine {
    fn render(&self, view: &View, cx: &Context<'_>) -> Result<String, ViewError> {
        let (program, _) = self.compile_if_stale(view.path())?;

        let output = Frame::new(cx.manager(), view.data())
            .strict(self.strict_variables)
            .run(&program)?;

        match output.layout {
            Some(layout) => {
                debug!(template = %view.path().display(), layout = %layout, "extending layout");
                cx.render_layout(&layout, view.data(), output.text)
            }
            None => Ok(output.text),
        }
    }
}
