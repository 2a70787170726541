//! Rendering deployment inputs: Helm values and raw manifests

use crate::config::HelmConfig;
use crate::error::{SkiffError, SkiffResult};
use serde_json::Value;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Merge `overlay` into `base`: objects merge key by key, anything else replaces
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Values files (in order) merged, then the inline values on top
pub fn helm_values(project_root: &Path, helm: &HelmConfig) -> SkiffResult<Value> {
    let mut values = Value::Object(serde_json::Map::new());

    for file in &helm.values_files {
        let path = project_root.join(file);
        let content = std::fs::read_to_string(&path)
            .map_err(|e| SkiffError::io(format!("reading values file {}", path.display()), e))?;
        let parsed: Value = serde_yaml::from_str(&content)?;
        // An empty YAML document parses as null
        if !parsed.is_null() {
            deep_merge(&mut values, parsed);
        }
    }

    deep_merge(&mut values, Value::Object(helm.values.clone()));
    Ok(values)
}

/// Manifest files for the given paths; directories contribute their
/// `.yaml`, `.yml` and `.json` files in name order
pub fn manifest_files(project_root: &Path, manifests: &[PathBuf]) -> SkiffResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for manifest in manifests {
        let path = project_root.join(manifest);
        if path.is_dir() {
            for entry in WalkDir::new(&path).sort_by_file_name() {
                let entry = entry.map_err(|e| SkiffError::hash(&path, e))?;
                let is_manifest = entry
                    .path()
                    .extension()
                    .is_some_and(|ext| ext == "yaml" || ext == "yml" || ext == "json");
                if entry.file_type().is_file() && is_manifest {
                    files.push(entry.into_path());
                }
            }
        } else if path.is_file() {
            files.push(path);
        } else {
            return Err(SkiffError::io(
                format!("reading manifest {}", path.display()),
                std::io::Error::new(std::io::ErrorKind::NotFound, "no such file or directory"),
            ));
        }
    }
    Ok(files)
}

/// All manifests as one multi-document YAML stream
pub fn manifest_text(project_root: &Path, manifests: &[PathBuf]) -> SkiffResult<String> {
    let mut documents = Vec::new();
    for file in manifest_files(project_root, manifests)? {
        let content = std::fs::read_to_string(&file)
            .map_err(|e| SkiffError::io(format!("reading manifest {}", file.display()), e))?;
        documents.push(content.trim_end().to_string());
    }
    Ok(documents.join("\n---\n") + "\n")
}
