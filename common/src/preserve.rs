//! Copying permission bits and timestamps from a source file onto its copy

use anyhow::{Context, Result};
use std::os::unix::prelude::PermissionsExt;
use tracing::instrument;

#[derive(Copy, Clone, Debug, Default)]
pub struct Settings {
    /// mode bits taken over from the source
    pub mode_mask: u32,
    /// copy access and modification times
    pub time: bool,
}

#[instrument(skip(metadata))]
pub async fn set_file_metadata(
    settings: &Settings,
    metadata: &std::fs::Metadata,
    path: &std::path::Path,
) -> Result<()> {
    let permissions = if settings.mode_mask == 0o7777 {
        // special case for full preserve
        metadata.permissions()
    } else {
        std::fs::Permissions::from_mode(metadata.permissions().mode() & settings.mode_mask)
    };
    tokio::fs::set_permissions(path, permissions.clone())
        .await
        .with_context(|| format!("cannot set {:?} permissions to {:?}", &path, &permissions))?;
    if settings.time {
        tracing::debug!("setting timestamps");
        let atime = filetime::FileTime::from_last_access_time(metadata);
        let mtime = filetime::FileTime::from_last_modification_time(metadata);
        let dst = path.to_owned();
        tokio::task::spawn_blocking(move || filetime::set_file_times(&dst, atime, mtime))
            .await?
            .with_context(|| format!("failed setting timestamps for {:?}", &path))?;
    }
    Ok(())
}

/// Mode bits and timestamps, what the copy engine uses so unchanged files are skipped next time.
#[must_use]
pub fn preserve_all() -> Settings {
    Settings {
        mode_mask: 0o7777,
        time: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils;
    use std::os::unix::fs::MetadataExt;
    use tracing_test::traced_test;

    #[tokio::test]
    #[traced_test]
    async fn preserve_all_copies_mode_and_times() -> Result<()> {
        let tmp_dir = testutils::setup_test_dir().await?;
        let src = tmp_dir.join("foo").join("0.txt");
        let dst = tmp_dir.join("copy.txt");
        tokio::fs::write(&dst, testutils::file_contents(0)).await?;
        tokio::fs::set_permissions(&src, std::fs::Permissions::from_mode(0o640)).await?;
        filetime::set_file_times(
            &src,
            filetime::FileTime::from_unix_time(1_000_000, 500),
            filetime::FileTime::from_unix_time(2_000_000, 700),
        )?;
        let src_metadata = tokio::fs::metadata(&src).await?;
        set_file_metadata(&preserve_all(), &src_metadata, &dst).await?;
        let dst_metadata = tokio::fs::metadata(&dst).await?;
        assert_eq!(dst_metadata.mode() & 0o7777, 0o640);
        assert_eq!(dst_metadata.mtime(), 2_000_000);
        assert_eq!(dst_metadata.mtime_nsec(), 700);
        assert_eq!(dst_metadata.atime(), 1_000_000);
        Ok(())
    }

    #[tokio::test]
    #[traced_test]
    async fn mode_mask_drops_special_bits() -> Result<()> {
        let tmp_dir = testutils::setup_test_dir().await?;
        let src = tmp_dir.join("foo").join("0.txt");
        let dst = tmp_dir.join("copy.txt");
        tokio::fs::write(&dst, testutils::file_contents(0)).await?;
        tokio::fs::set_permissions(&src, std::fs::Permissions::from_mode(0o3750)).await?;
        filetime::set_file_mtime(&src, filetime::FileTime::from_unix_time(2_000_000, 0))?;
        let src_metadata = tokio::fs::metadata(&src).await?;
        let settings = Settings {
            mode_mask: 0o0777,
            time: false,
        };
        set_file_metadata(&settings, &src_metadata, &dst).await?;
        let dst_metadata = tokio::fs::metadata(&dst).await?;
        assert_eq!(dst_metadata.mode() & 0o7777, 0o750);
        assert_ne!(dst_metadata.mtime(), 2_000_000);
        Ok(())
    }
}
