//! The template manager.
//!
//! [`Manager`] owns the search paths, the engine registry and the macro
//! table, and turns logical template references into [`View`]s.
//!
//! # Resolution
//!
//! A reference such as `users.profile` or `users/profile` is tried in
//! several spellings. For every candidate, engines are tried in
//! registration order and, for each engine, search paths in registration
//! order; the first `{path}/{name}.{extension}` that is a regular file wins.
//!
//! ```text
//! users.profile  ->  users.profile, users/profile
//! users/profile  ->  users/profile, users.profile
//! ```
//!
//! A candidate with exactly one dot and no slash can also name an engine:
//! `page.vellum` narrows the search to engines registered as `vellum` and
//! `vellum.html` (the implicit suffix) and looks up `page`. When neither is
//! registered the candidate is searched as a plain name.
//!
//! References containing `..` are rejected.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace};

use crate::config::{ViewConfig, DEFAULT_IMPLICIT_SUFFIX, DEFAULT_MAX_LAYOUT_DEPTH};
use crate::engine::{
    CompilingEngine, Engine, LiteralEngine, NativeEngine, SubstitutionEngine,
    COMPILING_EXTENSION, LITERAL_EXTENSION, NATIVE_EXTENSION, SUBSTITUTION_EXTENSION,
};
use crate::error::{ResolveError, ViewError};
use crate::view::{to_data, Data, View};

/// A macro callable from templates. Receives the manager and the evaluated arguments.
pub type MacroFn = dyn Fn(&Manager, &[Value]) -> Result<Value, ViewError> + Send + Sync;

/// Name of the macro `{{ }}` output goes through.
pub const ESCAPE_MACRO: &str = "escape";

#[derive(Clone)]
pub struct Manager {
    paths: Vec<PathBuf>,
    engines: Vec<(String, Arc<dyn Engine>)>,
    macros: HashMap<String, Arc<MacroFn>>,
    implicit_suffix: Option<String>,
    max_layout_depth: usize,
}

impl Manager {
    /// Creates a manager with no paths, no engines and the `escape` macro.
    pub fn new() -> Self {
        Self {
            paths: Vec::new(),
            engines: Vec::new(),
            macros: HashMap::new(),
            implicit_suffix: Some(DEFAULT_IMPLICIT_SUFFIX.to_string()),
            max_layout_depth: DEFAULT_MAX_LAYOUT_DEPTH,
        }
        .add_macro(ESCAPE_MACRO, escape)
    }

    /// Creates a manager from configuration, with the default engines
    /// registered in this order:
    ///
    /// | Extension | Engine |
    /// |-----------|--------|
    /// | `vellum.html` | [`CompilingEngine`] caching into [`ViewConfig::cache_root`] |
    /// | `jinja` | [`NativeEngine`] |
    /// | `tpl` | [`SubstitutionEngine`] |
    /// | `txt` | [`LiteralEngine`] |
    pub fn from_config(config: &ViewConfig) -> Self {
        let mut manager = Self::new();
        manager.paths = config.paths.clone();
        manager.implicit_suffix = config.implicit_suffix.clone();
        manager.max_layout_depth = config.max_layout_depth;

        manager
            .add_engine(
                COMPILING_EXTENSION,
                CompilingEngine::new(config.cache_root()).strict(config.strict_variables),
            )
            .add_engine(
                NATIVE_EXTENSION,
                NativeEngine::new().strict(config.strict_variables),
            )
            .add_engine(SUBSTITUTION_EXTENSION, SubstitutionEngine::new())
            .add_engine(LITERAL_EXTENSION, LiteralEngine::new())
    }

    /// Loads a YAML [`ViewConfig`] from `path` and builds the manager from it.
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self, ViewError> {
        let config = ViewConfig::from_file(path)?;
        Ok(Self::from_config(&config))
    }

    /// Appends a search path. The directory does not need to exist yet.
    pub fn add_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.push(path.into());
        self
    }

    /// Registers the engine for `extension`.
    ///
    /// An engine already registered for the same extension is replaced and
    /// keeps its position in the search order.
    pub fn add_engine<E: Engine + 'static>(self, extension: impl Into<String>, engine: E) -> Self {
        self.add_shared_engine(extension, Arc::new(engine))
    }

    /// Like [`add_engine`](Self::add_engine), for an engine shared with other managers.
    pub fn add_shared_engine(mut self, extension: impl Into<String>, engine: Arc<dyn Engine>) -> Self {
        let extension = extension.into();
        match self.engines.iter_mut().find(|(ext, _)| *ext == extension) {
            Some(slot) => slot.1 = engine,
            None => self.engines.push((extension, engine)),
        }
        self
    }

    /// Registers a macro, replacing any macro of the same name.
    pub fn add_macro<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Manager, &[Value]) -> Result<Value, ViewError> + Send + Sync + 'static,
    {
        self.macros.insert(name.into(), Arc::new(f));
        self
    }

    /// Sets the suffix tried after an engine selector. `None` disables it.
    pub fn implicit_suffix(mut self, suffix: Option<&str>) -> Self {
        self.implicit_suffix = suffix.map(str::to_string);
        self
    }

    /// Sets how many layouts may wrap each other.
    pub fn max_layout_depth(mut self, depth: usize) -> Self {
        self.max_layout_depth = depth;
        self
    }

    /// Search paths, in priority order.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Registered extensions, in search order.
    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.engines.iter().map(|(ext, _)| ext.as_str())
    }

    /// The engine registered for exactly `extension`.
    pub fn engine(&self, extension: &str) -> Option<&Arc<dyn Engine>> {
        self.engines
            .iter()
            .find(|(ext, _)| ext == extension)
            .map(|(_, engine)| engine)
    }

    /// Whether a macro named `name` is registered.
    pub fn has_macro(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    /// Registered macro names, sorted.
    pub fn macro_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.macros.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub(crate) fn layout_depth_limit(&self) -> usize {
        self.max_layout_depth
    }

    /// Resolves `template` and binds `data` to it.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::Traversal`] if the reference contains `..`
    /// - [`ResolveError::NotFound`] if no engine and path produce a file
    /// - [`ViewError::Data`] if `data` does not serialize to a map
    pub fn render<T: Serialize + ?Sized>(&self, template: &str, data: &T) -> Result<View, ViewError> {
        self.resolve(template, to_data(data)?)
    }

    /// Resolves and renders `template` in one call.
    pub fn view<T: Serialize + ?Sized>(&self, template: &str, data: &T) -> Result<String, ViewError> {
        self.render(template, data)?.render(self)
    }

    /// Calls the macro registered as `name`.
    pub fn use_macro(&self, name: &str, args: &[Value]) -> Result<Value, ViewError> {
        let f = self
            .macros
            .get(name)
            .ok_or_else(|| ViewError::MacroUndefined(name.to_string()))?;
        trace!(name, args = args.len(), "calling macro");
        f(self, args)
    }

    /// Resolves `template` to a [`View`] over already prepared data.
    pub fn resolve(&self, template: &str, data: Data) -> Result<View, ViewError> {
        let reference = template.replace('\\', "/");
        if reference.contains("..") {
            return Err(ResolveError::Traversal {
                template: template.to_string(),
            }
            .into());
        }

        for candidate in candidates(&reference) {
            let (name, engines) = self.narrow(&candidate);
            for (extension, engine) in engines {
                if let Some(path) = self.find(name, extension)? {
                    debug!(template, extension = %extension, path = %path.display(), "resolved template");
                    return Ok(View::new(Arc::clone(engine), extension.as_str(), path, data));
                }
            }
        }

        debug!(template, "template not found");
        Err(ResolveError::NotFound {
            template: template.to_string(),
        }
        .into())
    }

    /// Picks the lookup name and engines for one candidate.
    fn narrow<'a>(&'a self, candidate: &'a str) -> (&'a str, Vec<&'a (String, Arc<dyn Engine>)>) {
        if let Some((base, selector)) = candidate.split_once('.') {
            if !selector.contains('.') && !candidate.contains('/') && !base.is_empty() {
                let with_suffix = self
                    .implicit_suffix
                    .as_ref()
                    .map(|suffix| format!("{}.{}", selector, suffix));
                let selected: Vec<_> = std::iter::once(selector)
                    .chain(with_suffix.as_deref())
                    .filter_map(|ext| self.engines.iter().find(|(e, _)| e == ext))
                    .collect();
                if !selected.is_empty() {
                    return (base, selected);
                }
            }
        }
        (candidate, self.engines.iter().collect())
    }

    fn find(&self, name: &str, extension: &str) -> Result<Option<PathBuf>, ResolveError> {
        let file_name = format!("{}.{}", name, extension);
        for dir in &self.paths {
            let file = dir.join(&file_name);
            trace!(path = %file.display(), "probing");
            if file.is_file() {
                return canonical(&file).map(Some);
            }
        }
        Ok(None)
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("paths", &self.paths)
            .field("engines", &self.extensions().collect::<Vec<_>>())
            .field("macros", &self.macro_names())
            .field("implicit_suffix", &self.implicit_suffix)
            .field("max_layout_depth", &self.max_layout_depth)
            .finish()
    }
}

/// Spellings of a reference to try, in order, trimmed and deduplicated.
fn candidates(reference: &str) -> Vec<String> {
    let mut raw = vec![reference.to_string()];
    if reference.contains('.') {
        raw.push(reference.replace('.', "/"));
    }
    if reference.contains('/') {
        raw.push(reference.replace('/', "."));
    }

    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for candidate in raw {
        let trimmed = candidate
            .trim_matches(|c: char| c == '/' || c == '.' || c.is_whitespace())
            .to_string();
        if !trimmed.is_empty() && !out.contains(&trimmed) {
            out.push(trimmed);
        }
    }
    out
}

fn canonical(path: &Path) -> Result<PathBuf, ResolveError> {
    path.canonicalize()
        .map_err(|source| ResolveError::Canonicalize {
            path: path.to_path_buf(),
            source,
        })
}

/// Default `escape` macro: HTML-escapes the stringified first argument.
fn escape(_: &Manager, args: &[Value]) -> Result<Value, ViewError> {
    let text = args
        .first()
        .map(vellum_directive::value::display)
        .unwrap_or_default();
    Ok(Value::String(
        html_escape::encode_quoted_attribute(&text).into_owned(),
    ))
}
