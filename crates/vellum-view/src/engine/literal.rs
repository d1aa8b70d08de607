use std::fs;

use super::Engine;
use crate::context::Context;
use crate::error::{CompileError, ViewError};
use crate::view::View;

/// Returns the template file unmodified.
///
/// Bytes that are not valid UTF-8 come out as U+FFFD.
#[derive(Debug, Default, Clone, Copy)]
pub struct LiteralEngine;

impl LiteralEngine {
    /// Creates the engine. It has no settings.
    pub fn new() -> Self {
        Self
    }
}

impl Engine for LiteralEngine {
    fn render(&self, view: &View, _cx: &Context<'_>) -> Result<String, ViewError> {
        let bytes = fs::read(view.path()).map_err(|source| CompileError::Read {
            path: view.path().to_path_buf(),
            source,
        })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Manager;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_returns_file_verbatim() {
        let dir = TempDir::new().unwrap();
        let body = "{{ $not_compiled }} {name} @if(x)\n";
        fs::write(dir.path().join("notes.txt"), body).unwrap();

        let manager = Manager::new()
            .add_path(dir.path())
            .add_engine("txt", LiteralEngine::new());

        let out = manager.view("notes", &json!({"name": "ignored"})).unwrap();
        assert_eq!(out, body);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("latin1.txt"), b"caf\xe9 ok").unwrap();

        let manager = Manager::new()
            .add_path(dir.path())
            .add_engine("txt", LiteralEngine::new());

        assert_eq!(manager.view("latin1", &()).unwrap(), "caf\u{fffd} ok");
    }
}
