//! Per-render context passed to engines.
//!
//! Engines never hold on to the [`Manager`]. Every call to
//! [`Engine::render`](crate::Engine::render) receives a [`Context`] instead,
//! which gives access to the manager (macros, resolution) and tracks how many
//! layouts deep the current render is.

use serde_json::Value;
use tracing::debug;

use crate::error::ViewError;
use crate::manager::Manager;
use crate::view::Data;

/// Variable under which a layout receives the output of the view it wraps.
pub const CONTENTS_KEY: &str = "contents";

#[derive(Debug, Clone, Copy)]
pub struct Context<'m> {
    manager: &'m Manager,
    depth: usize,
}

impl<'m> Context<'m> {
    /// Context of a top-level render.
    pub fn root(manager: &'m Manager) -> Self {
        Self { manager, depth: 0 }
    }

    pub fn manager(&self) -> &'m Manager {
        self.manager
    }

    /// Number of layouts wrapping the view being rendered.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Renders `layout` around already captured output.
    ///
    /// The layout sees the child's data plus [`CONTENTS_KEY`] bound to
    /// `contents`, replacing any variable of that name.
    pub fn render_layout(
        &self,
        layout: &str,
        data: &Data,
        contents: String,
    ) -> Result<String, ViewError> {
        let depth = self.depth() + 1;
        let limit = self.manager.layout_depth_limit();
        if depth > limit {
            return Err(ViewError::LayoutDepth {
                template: layout.to_string(),
                depth: limit,
            });
        }

        let mut data = data.clone();
        data.insert(CONTENTS_KEY.to_string(), Value::String(contents));

        let view = self.manager.resolve(layout, data)?;
        debug!(layout, depth, path = %view.path().display(), "rendering layout");
        view.render_in(&Context {
            manager: self.manager,
            depth,
        })
    }
}
