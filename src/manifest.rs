//! Resource manifests (`.json` or `.toml`)

use anyhow::{Context, Result, bail};
use converge::Resource;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Desired resources of one stack
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub resources: Vec<Resource>,
}

impl Manifest {
    /// Load and validate a manifest, picking the format from the extension
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;

        let manifest: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content)
                .with_context(|| format!("Failed to parse manifest: {}", path.display()))?,
            Some("json") => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse manifest: {}", path.display()))?,
            other => bail!(
                "Unsupported manifest format {:?} (expected .json or .toml): {}",
                other.unwrap_or(""),
                path.display()
            ),
        };

        manifest.validate()?;
        log::debug!(
            "Loaded {} resources from {}",
            manifest.resources.len(),
            path.display()
        );
        Ok(manifest)
    }

    /// Check that every resource has a usable, unique id
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for resource in &self.resources {
            if resource.id.is_empty() {
                bail!("Resource of type {} has an empty id", resource.resource_type);
            }
            if resource.id.contains('.') {
                bail!(
                    "Resource id '{}' must not contain '.', it is the first segment of references",
                    resource.id
                );
            }
            if !seen.insert(resource.id.as_str()) {
                bail!("Duplicate resource id '{}'", resource.id);
            }
        }
        Ok(())
    }
}
