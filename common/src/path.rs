//! Skip-vs-copy decisions and destination path derivation

use std::os::unix::ffi::OsStrExt;

use anyhow::{Context, Result};
use async_recursion::async_recursion;
use tracing::instrument;

/// A copy is needed when `dst` is missing or `src` was modified after `dst`.
#[instrument]
pub async fn is_copy_needed(src: &std::path::Path, dst: &std::path::Path) -> Result<bool> {
    let dst_metadata = match tokio::fs::metadata(dst).await {
        Ok(metadata) => metadata,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(true),
        Err(error) => {
            return Err(error).with_context(|| format!("failed reading metadata from {dst:?}"));
        }
    };
    let src_modified = tokio::fs::metadata(src)
        .await
        .with_context(|| format!("failed reading metadata from {src:?}"))?
        .modified()
        .with_context(|| format!("failed reading modification time of {src:?}"))?;
    let dst_modified = dst_metadata
        .modified()
        .with_context(|| format!("failed reading modification time of {dst:?}"))?;
    Ok(src_modified > dst_modified)
}

/// Where the source content lands: `dst` itself when merging, `dst/<basename of src>` otherwise.
#[must_use]
pub fn effective_destination(
    src: &std::path::Path,
    dst: &std::path::Path,
    merge_into_destination: bool,
) -> std::path::PathBuf {
    if merge_into_destination {
        return dst.to_path_buf();
    }
    match src.file_name() {
        Some(name) => dst.join(name),
        None => dst.to_path_buf(),
    }
}

/// True for paths written with a trailing separator, e.g. `src/`.
#[must_use]
pub fn has_trailing_separator(path: &std::path::Path) -> bool {
    path.as_os_str().as_bytes().last() == Some(&b'/')
}

/// A single file is written to `dst` directly unless `dst` is an existing directory.
pub async fn merge_into_destination_for_file(dst: &std::path::Path) -> bool {
    !tokio::fs::metadata(dst)
        .await
        .map(|metadata| metadata.is_dir())
        .unwrap_or(false)
}

/// `src/` copies the contents of `src`, `src` copies the directory itself.
#[must_use]
pub fn merge_into_destination_for_directory(src: &std::path::Path) -> bool {
    has_trailing_separator(src)
}

/// Sum of the sizes of all files under `path`, following symlinks like the copy walk does.
///
/// Sub-directories that cannot be read are skipped, only failing to read `path` is an error.
#[instrument]
#[async_recursion]
pub async fn directory_size(path: &std::path::Path) -> Result<u64> {
    let mut entries = tokio::fs::read_dir(path)
        .await
        .with_context(|| format!("cannot open directory {path:?} for reading"))?;
    let mut total = 0;
    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("failed traversing directory {path:?}"))?
    {
        let entry_path = entry.path();
        match tokio::fs::metadata(&entry_path).await {
            Ok(metadata) if metadata.is_file() => total += metadata.len(),
            Ok(metadata) if metadata.is_dir() => match directory_size(&entry_path).await {
                Ok(size) => total += size,
                Err(error) => {
                    tracing::warn!("not counting {:?} towards total size: {:#}", entry_path, error);
                }
            },
            Ok(_) => {}
            Err(error) => {
                tracing::warn!("not counting {:?} towards total size: {:#}", entry_path, error);
            }
        }
    }
    Ok(total)
}
