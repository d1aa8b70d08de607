//! On-disk cache of compiled templates.
//!
//! Each source file maps to `{root}/{sha256(path)}.json`, which holds the
//! serialized [`Program`]. An artifact is reused while it is newer than its
//! source; otherwise the source is recompiled and the artifact replaced
//! atomically (temporary file in the same directory, then rename), so
//! concurrent renders never observe a half-written file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, trace, warn};
use vellum_directive::Program;

use crate::error::CompileError;

/// File extension of compiled artifacts.
pub const COMPILED_EXTENSION: &str = "json";

/// Whether [`CompiledCache::load_or_compile`] reused an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// The existing artifact was up to date.
    Fresh,
    /// The source was compiled and the artifact written.
    Compiled,
}

#[derive(Debug, Clone)]
pub struct CompiledCache {
    root: PathBuf,
}

impl CompiledCache {
    /// Creates a cache rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory artifacts are written to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lowercase hex SHA-256 of the source path.
    pub fn key(source: &Path) -> String {
        hex::encode(Sha256::digest(source.to_string_lossy().as_bytes()))
    }

    /// Where the artifact for `source` lives.
    pub fn artifact_path(&self, source: &Path) -> PathBuf {
        self.root
            .join(format!("{}.{}", Self::key(source), COMPILED_EXTENSION))
    }

    /// Whether `source` must be recompiled: the artifact is missing, empty,
    /// or older than the source.
    pub fn is_stale(&self, source: &Path) -> bool {
        let Ok(artifact) = fs::metadata(self.artifact_path(source)) else {
            return true;
        };
        if artifact.len() == 0 {
            return true;
        }
        let modified = |meta: io::Result<fs::Metadata>| meta.and_then(|m| m.modified()).ok();
        match (modified(fs::metadata(source)), modified(Ok(artifact))) {
            (Some(source), Some(compiled)) => source > compiled,
            _ => true,
        }
    }

    /// Reads and decodes an artifact.
    ///
    /// serde_json's recursion limit is lifted here: nesting is already
    /// bounded at compile time by [`MAX_BLOCK_DEPTH`] and
    /// [`expr::MAX_EXPR_DEPTH`], and a program deep enough to hit the limit
    /// would otherwise be recompiled on every render.
    ///
    /// [`MAX_BLOCK_DEPTH`]: vellum_directive::MAX_BLOCK_DEPTH
    /// [`expr::MAX_EXPR_DEPTH`]: vellum_directive::expr::MAX_EXPR_DEPTH
    pub fn read(&self, artifact: &Path) -> Result<Program, CompileError> {
        let bytes = fs::read(artifact).map_err(|source| CompileError::Read {
            path: artifact.to_path_buf(),
            source,
        })?;
        let decode_error = |source: serde_json::Error| CompileError::Decode {
            path: artifact.to_path_buf(),
            source,
        };

        let mut de = serde_json::Deserializer::from_slice(&bytes);
        de.disable_recursion_limit();
        let program = Program::deserialize(&mut de).map_err(decode_error)?;
        de.end().map_err(decode_error)?;
        Ok(program)
    }

    /// Returns the compiled program for `source`, compiling it if the
    /// artifact is stale, unreadable or from an older compiler.
    pub fn load_or_compile(&self, source: &Path) -> Result<(Program, CacheStatus), CompileError> {
        let artifact = self.artifact_path(source);

        if !self.is_stale(source) {
            match self.read(&artifact) {
                Ok(program) if program.is_current() => {
                    trace!(source = %source.display(), "compiled template is fresh");
                    return Ok((program, CacheStatus::Fresh));
                }
                Ok(program) => {
                    debug!(
                        source = %source.display(),
                        version = program.version,
                        "compiled template format is outdated"
                    );
                }
                Err(err) => {
                    warn!(source = %source.display(), error = %err, "discarding unreadable compiled template");
                }
            }
        }

        let program = self.compile(source, &artifact)?;
        Ok((program, CacheStatus::Compiled))
    }

    fn compile(&self, source: &Path, artifact: &Path) -> Result<Program, CompileError> {
        let text = fs::read_to_string(source).map_err(|err| CompileError::Read {
            path: source.to_path_buf(),
            source: err,
        })?;
        let program = vellum_directive::compile(&text).map_err(|err| CompileError::Syntax {
            path: source.to_path_buf(),
            source: err,
        })?;
        self.write(artifact, &program)?;
        debug!(source = %source.display(), artifact = %artifact.display(), "compiled template");
        Ok(program)
    }

    fn write(&self, artifact: &Path, program: &Program) -> Result<(), CompileError> {
        let write_error = |source: io::Error| CompileError::Write {
            path: artifact.to_path_buf(),
            source,
        };

        fs::create_dir_all(&self.root).map_err(write_error)?;
        let mut file = NamedTempFile::new_in(&self.root).map_err(write_error)?;
        serde_json::to_writer(&mut file, program).map_err(|e| write_error(e.into()))?;
        file.persist(artifact).map_err(|e| write_error(e.error))?;
        Ok(())
    }

    /// Deletes every artifact under the cache root. Returns how many were removed.
    pub fn clear(&self) -> Result<usize, CompileError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(source) => {
                return Err(CompileError::Write {
                    path: self.root.clone(),
                    source,
                })
            }
        };

        let mut removed = 0;
        for entry in entries {
            let path = entry
                .map_err(|source| CompileError::Write {
                    path: self.root.clone(),
                    source,
                })?
                .path();
            if path.extension().is_some_and(|ext| ext == COMPILED_EXTENSION) && path.is_file() {
                fs::remove_file(&path).map_err(|source| CompileError::Write {
                    path: path.clone(),
                    source,
                })?;
                removed += 1;
            }
        }
        debug!(root = %self.root.display(), removed, "cleared compiled templates");
        Ok(removed)
    }
}
