//! Asset loading/parsers.
//! Meshes are loaded from OBJ into CPU-side [`MeshData`] ready for upload.

use std::path::Path;

use anyhow::{Result, bail};

pub mod mesh;
pub mod obj;

pub use mesh::MeshData;

/// Load a triangle mesh from disk, choosing the parser by file extension.
pub fn load_mesh(path: impl AsRef<Path>) -> Result<MeshData> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let mesh = match ext.as_deref() {
        Some("obj") => obj::load_obj_from_path(path)?,
        other => bail!(
            "Unsupported mesh format {:?} for {}",
            other.unwrap_or(""),
            path.display()
        ),
    };

    log::info!(
        "Loaded mesh {}: {} vertices, {} triangles",
        path.display(),
        mesh.vertex_count(),
        mesh.triangle_count()
    );
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_extension_is_rejected() {
        let err = load_mesh("resources/bunny.ply").unwrap_err();
        assert!(err.to_string().contains("Unsupported mesh format"));
    }

    #[test]
    fn loads_shipped_sample_mesh() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../resources/bunny.obj");
        let mesh = load_mesh(path).expect("sample mesh");
        assert!(mesh.is_valid());
    }
}
