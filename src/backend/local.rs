//! Local file backend: one JSON document per resource

use converge::{ApplyRequest, Attributes, Backend, DeleteRequest, ReadRequest, Resource, Status};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Resource type served by [`LocalBackend`]
pub const LOCAL: &str = "Local";

/// Writes each resource's attributes to `<root>/<id>.json`
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// File holding the resource, with path separators in the id flattened
    pub fn path_for(&self, resource: &Resource) -> PathBuf {
        let name: String = resource
            .id
            .chars()
            .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
            .collect();
        self.root.join(format!("{name}.json"))
    }
}

fn read_attributes(path: &Path) -> Result<Option<Attributes>, Status> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(Status::backend(format!(
                "failed to read {}: {e}",
                path.display()
            )));
        }
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| Status::backend(format!("failed to parse {}: {e}", path.display())))
}

impl Backend for LocalBackend {
    fn apply(&self, request: ApplyRequest<'_>) -> Result<Resource, Status> {
        let planned = request.planned;
        if request.cancel.is_cancelled() {
            return Err(Status::backend(format!(
                "cancelled before writing {}",
                planned.id
            )));
        }

        fs::create_dir_all(&self.root).map_err(|e| {
            Status::backend(format!("failed to create {}: {e}", self.root.display()))
        })?;

        let path = self.path_for(planned);
        let content = serde_json::to_string_pretty(&planned.attributes)
            .map_err(|e| Status::backend(format!("failed to serialize {}: {e}", planned.id)))?;
        fs::write(&path, content)
            .map_err(|e| Status::backend(format!("failed to write {}: {e}", path.display())))?;

        log::debug!("wrote {}", path.display());
        Ok(planned.clone())
    }

    fn delete(&self, request: DeleteRequest<'_>) -> Result<(), Status> {
        let path = self.path_for(request.prior);
        match fs::remove_file(&path) {
            Ok(()) => {
                log::debug!("removed {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Status::backend(format!(
                "failed to remove {}: {e}",
                path.display()
            ))),
        }
    }

    fn read(&self, request: ReadRequest<'_>) -> Result<Option<Resource>, Status> {
        let path = self.path_for(request.prior);
        Ok(read_attributes(&path)?.map(|attributes| Resource {
            attributes,
            ..request.prior.clone()
        }))
    }
}
