//! Engine for MiniJinja templates.
//!
//! Templates run directly, without a compile cache. Every render gets its own
//! copy of the environment with two kinds of functions added:
//!
//! - `extends(name)`: registers a layout for this render and outputs nothing
//! - every macro registered with the [`Manager`](crate::Manager), forwarding
//!   to [`Manager::use_macro`](crate::Manager::use_macro)
//!
//! ```jinja
//! {{ extends("layouts.app") }}
//! <p>{{ money(price, "EUR") }}</p>
//! ```

use std::sync::{Arc, Mutex, MutexGuard};

use minijinja::value::Rest;
use minijinja::{Environment, Error, ErrorKind, UndefinedBehavior, Value};
use tracing::debug;

use super::{read_source, Engine};
use crate::context::Context;
use crate::error::ViewError;
use crate::view::View;

/// Name of the layout function available to templates.
pub const EXTENDS_FUNCTION: &str = "extends";

/// Renders MiniJinja templates.
#[derive(Debug, Clone)]
pub struct NativeEngine {
    env: Environment<'static>,
}

impl NativeEngine {
    pub fn new() -> Self {
        Self {
            env: Environment::new(),
        }
    }

    /// Fails on undefined variables instead of rendering them empty.
    pub fn strict(mut self, strict: bool) -> Self {
        self.env.set_undefined_behavior(if strict {
            UndefinedBehavior::Strict
        } else {
            UndefinedBehavior::Lenient
        });
        self
    }

    /// The base environment, cloned for every render.
    pub fn environment(&self) -> &Environment<'static> {
        &self.env
    }

    /// Mutable access to the base environment, for registering filters and globals.
    pub fn environment_mut(&mut self) -> &mut Environment<'static> {
        &mut self.env
    }
}

impl Default for NativeEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// State shared between the functions of one render and the engine.
#[derive(Default)]
struct RenderSlots {
    layout: Mutex<Option<String>>,
    failure: Mutex<Option<ViewError>>,
}

impl RenderSlots {
    fn lock<T>(slot: &Mutex<T>) -> MutexGuard<'_, T> {
        slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Engine for NativeEngine {
    fn render(&self, view: &View, cx: &Context<'_>) -> Result<String, ViewError> {
        let source = read_source(view.path())?;
        let slots = Arc::new(RenderSlots::default());
        let mut env = self.env.clone();

        let manager = Arc::new(cx.manager().clone());
        for name in cx.manager().macro_names() {
            let manager = Arc::clone(&manager);
            let slots = Arc::clone(&slots);
            let macro_name = name.to_string();
            env.add_function(
                name.to_string(),
                move |args: Rest<Value>| -> Result<Value, Error> {
                    let args = args
                        .iter()
                        .map(serde_json::to_value)
                        .collect::<Result<Vec<_>, _>>()
                        .map_err(|e| Error::new(ErrorKind::InvalidOperation, e.to_string()))?;
                    match manager.use_macro(&macro_name, &args) {
                        Ok(result) => Ok(Value::from_serialize(&result)),
                        Err(err) => {
                            let message = err.to_string();
                            *RenderSlots::lock(&slots.failure) = Some(err);
                            Err(Error::new(ErrorKind::InvalidOperation, message))
                        }
                    }
                },
            );
        }

        let layout_slot = Arc::clone(&slots);
        env.add_function(EXTENDS_FUNCTION, move |name: String| -> String {
            *RenderSlots::lock(&layout_slot.layout) = Some(name);
            String::new()
        });

        let name = view.path().to_string_lossy();
        let rendered = env.render_named_str(&name, &source, Value::from_serialize(view.data()));

        let text = match rendered {
            Ok(text) => text,
            Err(err) => {
                return Err(RenderSlots::lock(&slots.failure)
                    .take()
                    .unwrap_or_else(|| ViewError::Execution(err.to_string())));
            }
        };

        let layout = RenderSlots::lock(&slots.layout).take();
        match layout {
            Some(layout) => {
                debug!(template = %view.path().display(), layout = %layout, "extending layout");
                cx.render_layout(&layout, view.data(), text)
            }
            None => Ok(text),
        }
    }
}
