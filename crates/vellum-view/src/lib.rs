//! View layer: template resolution, engines and compiled-template caching.
//!
//! The [`Manager`] maps logical template names such as `users.profile` to
//! files on disk, picks the [`Engine`] registered for the file's extension,
//! and renders it with caller data. Four engines are provided:
//!
//! | Extension | Engine | Language |
//! |-----------|--------|----------|
//! | `vellum.html` | [`CompilingEngine`] | directive templates, compiled and cached |
//! | `jinja` | [`NativeEngine`] | MiniJinja |
//! | `tpl` | [`SubstitutionEngine`] | `{key}` placeholders |
//! | `txt` | [`LiteralEngine`] | none, the file is returned as is |
//!
//! # Example
//!
//! ```rust,no_run
//! use vellum_view::{Manager, ViewConfig};
//! use serde_json::json;
//!
//! let config = ViewConfig::new("/srv/app").path("/srv/app/views");
//! let manager = Manager::from_config(&config)
//!     .add_macro("money", |_, args| {
//!         let cents = args.first().and_then(|v| v.as_i64()).unwrap_or(0);
//!         Ok(json!(format!("{}.{:02}", cents / 100, cents % 100)))
//!     });
//!
//! let html = manager.view("orders.show", &json!({"total": 1999}))?;
//! # Ok::<(), vellum_view::ViewError>(())
//! ```
//!
//! # Layouts
//!
//! A directive template that runs `@extends('layouts.app')` (or a MiniJinja
//! template that calls `extends("layouts.app")`) has its output captured and
//! passed to the layout as the `contents` variable, next to the original
//! data. Layouts can extend further layouts up to
//! [`ViewConfig::max_layout_depth`].
//!
//! # Macros
//!
//! Macros are named functions registered on the manager. Directive templates
//! call them as `@name(args)` or inside expressions as `name(args)`;
//! MiniJinja templates call them as functions. `{{ }}` output always passes
//! through the `escape` macro, which [`Manager::new`] registers with an HTML
//! escaping default.
//!
//! # Logging
//!
//! Resolution, cache decisions and layout hops are reported through
//! [`tracing`] at `debug` and `trace` level. The crate never installs a
//! subscriber.

mod cache;
mod config;
mod context;
pub mod engine;
mod error;
mod exec;
mod manager;
mod view;

pub use cache::{CacheStatus, CompiledCache, COMPILED_EXTENSION};
pub use config::{ViewConfig, DEFAULT_IMPLICIT_SUFFIX, DEFAULT_MAX_LAYOUT_DEPTH};
pub use context::{Context, CONTENTS_KEY};
pub use engine::{CompilingEngine, Engine, LiteralEngine, NativeEngine, SubstitutionEngine};
pub use error::{CompileError, ConfigError, ResolveError, ViewError};
pub use exec::{Frame, Output};
pub use manager::{Manager, MacroFn, ESCAPE_MACRO};
pub use view::{to_data, Data, View};

pub use vellum_directive::{compile, Program};
