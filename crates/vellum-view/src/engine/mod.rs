//! Template engines.
//!
//! An [`Engine`] turns a resolved [`View`] into text. The manager picks the
//! engine by file extension; the four engines shipped here cover compiled
//! directive templates, MiniJinja templates, `{key}` substitution and
//! literal files.

mod compiling;
mod literal;
mod native;
mod simple;

pub use compiling::CompilingEngine;
pub use literal::LiteralEngine;
pub use native::{NativeEngine, EXTENDS_FUNCTION};
pub use simple::SubstitutionEngine;

use std::fs;
use std::path::Path;

use crate::context::Context;
use crate::error::{CompileError, ViewError};
use crate::view::View;

/// Extension [`Manager::from_config`](crate::Manager::from_config) registers [`CompilingEngine`] under.
pub const COMPILING_EXTENSION: &str = "vellum.html";
/// Extension registered for [`NativeEngine`].
pub const NATIVE_EXTENSION: &str = "jinja";
/// Extension registered for [`SubstitutionEngine`].
pub const SUBSTITUTION_EXTENSION: &str = "tpl";
/// Extension registered for [`LiteralEngine`].
pub const LITERAL_EXTENSION: &str = "txt";

/// Renders resolved views.
///
/// Engines are shared between renders and threads, so they must not keep
/// per-render state. Anything a render needs beyond the view itself (the
/// macro table, layout resolution) comes through `cx`.
pub trait Engine: Send + Sync {
    fn render(&self, view: &View, cx: &Context<'_>) -> Result<String, ViewError>;
}

pub(crate) fn read_source(path: &Path) -> Result<String, ViewError> {
    fs::read_to_string(path).map_err(|source| {
        CompileError::Read {
            path: path.to_path_buf(),
            source,
        }
        .into()
    })
}
