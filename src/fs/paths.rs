//! Path and file management.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::fs::naming::sanitize_path_component;
use crate::queue::ExtraRequest;

/// Directory an extra is downloaded into: `<root>/<media title>/<extra type>`.
pub fn extra_output_dir(root: &Path, request: &ExtraRequest) -> Result<PathBuf> {
    let media_folder = if request.media_title.trim().is_empty() {
        format!("{}-{}", request.media_type, request.media_id)
    } else {
        sanitize_path_component(&request.media_title)?
    };

    let extra_folder = if request.extra_type.trim().is_empty() {
        "Other".to_string()
    } else {
        sanitize_path_component(&request.extra_type)?
    };

    Ok(root.join(media_folder).join(extra_folder))
}

/// Write a file by writing a sibling temp file and renaming it over the target.
///
/// Readers polling the target never observe a partially written file.
pub async fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = path.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

    tokio::fs::write(&temp, content).await?;
    if let Err(e) = tokio::fs::rename(&temp, path).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(e.into());
    }

    Ok(())
}
