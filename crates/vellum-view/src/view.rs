//! Resolved views.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::context::Context;
use crate::engine::Engine;
use crate::error::ViewError;
use crate::manager::Manager;

/// Variables handed to a template, in insertion order.
pub type Data = serde_json::Map<String, Value>;

/// A template file bound to the engine that renders it and the data to render with.
///
/// Views are produced by [`Manager::render`]. The path always points at an
/// existing regular file and is canonical.
#[derive(Clone)]
pub struct View {
    engine: Arc<dyn Engine>,
    extension: String,
    path: PathBuf,
    data: Data,
}

impl View {
    pub(crate) fn new(
        engine: Arc<dyn Engine>,
        extension: impl Into<String>,
        path: PathBuf,
        data: Data,
    ) -> Self {
        Self {
            engine,
            extension: extension.into(),
            path,
            data,
        }
    }

    /// The extension of the engine this view was resolved for, e.g. `vellum.html`.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Canonical path of the template source.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Variables the template is rendered with.
    pub fn data(&self) -> &Data {
        &self.data
    }

    /// Adds or replaces one variable.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Renders the view at the top level.
    pub fn render(&self, manager: &Manager) -> Result<String, ViewError> {
        self.render_in(&Context::root(manager))
    }

    /// Renders the view inside an existing render, e.g. as a layout.
    pub fn render_in(&self, cx: &Context<'_>) -> Result<String, ViewError> {
        self.engine.render(self, cx)
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("extension", &self.extension)
            .field("path", &self.path)
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}

/// Serializes caller data into a variable map.
///
/// Null becomes an empty map. Anything else that is not an object is rejected.
pub fn to_data<T: Serialize + ?Sized>(data: &T) -> Result<Data, ViewError> {
    match serde_json::to_value(data) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Data::new()),
        Ok(other) => Err(ViewError::Data(format!(
            "expected a map of variables, got {}",
            vellum_directive::value::type_name(&other)
        ))),
        Err(e) => Err(ViewError::Data(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[derive(Serialize)]
    struct Page {
        title: &'static str,
        count: u32,
    }

    #[test]
    fn test_to_data_from_struct() {
        let data = to_data(&Page {
            title: "Home",
            count: 2,
        })
        .unwrap();
        assert_eq!(data.get("title"), Some(&json!("Home")));
        assert_eq!(data.get("count"), Some(&json!(2)));
    }

    #[test]
    fn test_to_data_keeps_order() {
        let data = to_data(&json!({"z": 1, "a": 2, "m": 3})).unwrap();
        let keys: Vec<_> = data.keys().map(String::as_str).collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }

    #[test]
    fn test_to_data_null_is_empty() {
        assert!(to_data(&()).unwrap().is_empty());
        assert!(to_data(&Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_to_data_rejects_scalars() {
        assert!(matches!(to_data(&42), Err(ViewError::Data(_))));
        assert!(matches!(to_data(&vec![1, 2]), Err(ViewError::Data(_))));
    }

    #[test]
    fn test_to_data_rejects_non_string_keys() {
        let mut map = BTreeMap::new();
        map.insert(vec![1u8], "x");
        assert!(matches!(to_data(&map), Err(ViewError::Data(_))));
    }
}
