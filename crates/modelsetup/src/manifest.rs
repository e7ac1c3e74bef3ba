//! Manifests and model files.
//!
//! A manifest is a JSON array of model names. Each model name resolves,
//! through a [`ModelLoader`], to a JSON array of entity instances. Both kinds
//! of document may carry `//` and `/* */` comments.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{SetupError, SetupResult};

/// Name of the manifest loaded when none is given.
pub const DEFAULT_MANIFEST: &str = "manifest";

/// Source of manifest and model documents.
pub trait ModelLoader: Send + Sync {
    /// Text of the document called `name` (without the `.json` suffix).
    fn load(&self, name: &str) -> SetupResult<String>;

    /// Where documents come from; distinguishes loaders in hash memoization.
    fn location(&self) -> String;
}

/// Loads `<dir>/<name>.json` from the filesystem.
#[derive(Debug, Clone)]
pub struct FsModelLoader {
    dir: PathBuf,
}

impl FsModelLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Loader for the directory holding `manifest_path`, plus the manifest name.
    pub fn for_manifest(manifest_path: &Path) -> SetupResult<(Self, String)> {
        let name = manifest_path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| SetupError::Manifest {
                location: manifest_path.display().to_string(),
                message: "manifest path has no file name".into(),
            })?
            .to_string();
        let dir = manifest_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok((Self::new(dir), name))
    }
}

impl ModelLoader for FsModelLoader {
    fn load(&self, name: &str) -> SetupResult<String> {
        let path = self.dir.join(format!("{name}.json"));
        std::fs::read_to_string(&path).map_err(|e| SetupError::Manifest {
            location: path.display().to_string(),
            message: e.to_string(),
        })
    }

    fn location(&self) -> String {
        self.dir.display().to_string()
    }
}

/// Serves documents from memory, e.g. ones compiled in with `include_str!`.
#[derive(Debug, Clone, Default)]
pub struct StaticModelLoader {
    prefix: String,
    documents: HashMap<String, String>,
}

impl StaticModelLoader {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            documents: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_document(mut self, name: impl Into<String>, json: impl Into<String>) -> Self {
        self.documents.insert(name.into(), json.into());
        self
    }
}

impl ModelLoader for StaticModelLoader {
    fn load(&self, name: &str) -> SetupResult<String> {
        self.documents
            .get(name)
            .cloned()
            .ok_or_else(|| SetupError::Manifest {
                location: format!("{}{name}.json", self.prefix),
                message: "document not found".into(),
            })
    }

    fn location(&self) -> String {
        self.prefix.clone()
    }
}

/// Read the manifest and every model it lists, in manifest order.
pub fn load_manifest(loader: &dyn ModelLoader, manifest: &str) -> SetupResult<Vec<(String, String)>> {
    let text = loader.load(manifest)?;
    let models: Vec<String> = serde_json::from_str(&strip_json_comments(&text)).map_err(|e| {
        SetupError::Manifest {
            location: format!("{}/{manifest}", loader.location()),
            message: e.to_string(),
        }
    })?;

    models
        .into_iter()
        .map(|model| {
            let json = loader.load(&model)?;
            Ok((model, json))
        })
        .collect()
}

/// SHA-256 hex digest of the manifest's model files concatenated in order.
pub fn model_hash(loader: &dyn ModelLoader, manifest: &str) -> SetupResult<String> {
    let mut hasher = Sha256::new();
    for (_, json) in load_manifest(loader, manifest)? {
        hasher.update(json.as_bytes());
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Entity type a model name stands for: everything before the first `_`,
/// or failing that the first `.`.
///
/// `account_extra` and `account.json` both mean `account`.
#[must_use]
pub fn entity_type_from_model_name(model: &str) -> &str {
    if let Some(idx) = model.find('_') {
        return &model[..idx];
    }
    if let Some(idx) = model.find('.') {
        return &model[..idx];
    }
    model
}

/// Remove `//` line comments and `/* */` block comments outside string literals.
#[must_use]
pub fn strip_json_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match (c, chars.peek()) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for skipped in chars.by_ref() {
                    if prev == '*' && skipped == '/' {
                        break;
                    }
                    prev = skipped;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }
    out
}
