//! Copying one file or directory tree with throttled reads

use anyhow::Context;
use async_recursion::async_recursion;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::instrument;

use crate::error::{Error, ErrorKind};
use crate::path;
use crate::preserve;
use crate::progress::ProgressRegistry;

/// Upper bound of a single read, whatever the bandwidth allows.
pub const MAX_READ_SIZE: usize = 1024 * 1024;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub bytes_copied: u64,
    pub files_copied: usize,
    pub files_unchanged: usize,
    pub directories_created: usize,
    pub files_failed: usize,
    pub directories_failed: usize,
}

impl std::ops::Add for Summary {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            bytes_copied: self.bytes_copied + other.bytes_copied,
            files_copied: self.files_copied + other.files_copied,
            files_unchanged: self.files_unchanged + other.files_unchanged,
            directories_created: self.directories_created + other.directories_created,
            files_failed: self.files_failed + other.files_failed,
            directories_failed: self.directories_failed + other.directories_failed,
        }
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "bytes copied: {}\n\
            files copied: {}\n\
            files unchanged: {}\n\
            directories created: {}\n\
            files failed: {}\n\
            directories failed: {}\n",
            bytesize::ByteSize(self.bytes_copied),
            self.files_copied,
            self.files_unchanged,
            self.directories_created,
            self.files_failed,
            self.directories_failed,
        )
    }
}

/// Performs a single transfer.
///
/// The engine owns the rate limiter of its transfer and reports copied bytes to the shared
/// registry under its worker id. Entries of a directory tree are copied one after another, a
/// failure on one entry is logged and counted in the [`Summary`] while the walk moves on.
pub struct CopyEngine {
    worker_id: usize,
    limiter: throttle::RateLimiter,
    registry: std::sync::Arc<ProgressRegistry>,
    preserve: preserve::Settings,
}

impl CopyEngine {
    #[must_use]
    pub fn new(
        worker_id: usize,
        limiter: throttle::RateLimiter,
        registry: std::sync::Arc<ProgressRegistry>,
        preserve: preserve::Settings,
    ) -> Self {
        Self {
            worker_id,
            limiter,
            registry,
            preserve,
        }
    }

    /// Copies `src` (a file or a directory) according to the shape of `src` and `dst`.
    ///
    /// A file is written to `dst`, or into it when `dst` is an existing directory. A directory
    /// written as `src/` has its contents merged into `dst`, otherwise it lands in `dst/<name>`.
    #[instrument(skip(self), fields(worker_id = self.worker_id))]
    pub async fn run(
        &mut self,
        src: &std::path::Path,
        dst: &std::path::Path,
    ) -> Result<Summary, Error> {
        let src_metadata = tokio::fs::metadata(src)
            .await
            .with_context(|| format!("failed reading metadata from {src:?}"))
            .map_err(|err| Error::with_source(src, dst, ErrorKind::SourceDoesntExist, err))?;
        if src_metadata.is_file() {
            let merge = path::merge_into_destination_for_file(dst).await;
            let target = path::effective_destination(src, dst, merge);
            self.registry.register(self.worker_id, src, dst, src_metadata.len());
            return self.copy_file(src, &target).await;
        }
        if !src_metadata.is_dir() {
            return Err(Error::new(src, dst, ErrorKind::UnsupportedType));
        }
        let dst_is_file = tokio::fs::metadata(dst)
            .await
            .map(|metadata| metadata.is_file())
            .unwrap_or(false);
        if dst_is_file {
            return Err(Error::new(src, dst, ErrorKind::FileExistInsteadOfDirectory));
        }
        let total_bytes = path::directory_size(src)
            .await
            .map_err(|err| Error::with_source(src, dst, ErrorKind::CopyDirectoryFailure, err))?;
        let merge = path::merge_into_destination_for_directory(src);
        let target = path::effective_destination(src, dst, merge);
        self.registry.register(self.worker_id, src, dst, total_bytes);
        self.copy_directory_contents(src, &target).await
    }

    #[instrument(skip(self))]
    async fn copy_file(
        &mut self,
        src: &std::path::Path,
        dst: &std::path::Path,
    ) -> Result<Summary, Error> {
        let failure = |err| Error::with_source(src, dst, ErrorKind::CopyFileFailure, err);
        if !path::is_copy_needed(src, dst).await.map_err(failure)? {
            tracing::debug!("destination is up to date, skipping");
            return Ok(Summary {
                files_unchanged: 1,
                ..Default::default()
            });
        }
        let bytes_copied = self.copy_file_body(src, dst).await.map_err(failure)?;
        Ok(Summary {
            bytes_copied,
            files_copied: 1,
            ..Default::default()
        })
    }

    async fn copy_file_body(
        &mut self,
        src: &std::path::Path,
        dst: &std::path::Path,
    ) -> anyhow::Result<u64> {
        tracing::debug!("opening 'src' for reading and 'dst' for writing");
        let mut reader = tokio::fs::File::open(src)
            .await
            .with_context(|| format!("cannot open {src:?} for reading"))?;
        let mut writer = tokio::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(dst)
            .await
            .with_context(|| format!("cannot open {dst:?} for writing"))?;
        let mut buffer = Vec::new();
        let mut copied = 0;
        loop {
            let chunk_size = usize::try_from(self.limiter.chunk_size())
                .unwrap_or(MAX_READ_SIZE)
                .clamp(1, MAX_READ_SIZE);
            buffer.resize(chunk_size, 0);
            let read = reader
                .read(&mut buffer)
                .await
                .with_context(|| format!("failed reading from {src:?}"))?;
            if read == 0 {
                break;
            }
            writer
                .write_all(&buffer[..read])
                .await
                .with_context(|| format!("failed writing to {dst:?}"))?;
            let read = read as u64;
            copied += read;
            self.registry.report(self.worker_id, read);
            self.limiter.consume(read).await;
        }
        writer
            .flush()
            .await
            .with_context(|| format!("failed flushing {dst:?}"))?;
        drop(writer);
        tracing::debug!("setting permissions and timestamps");
        let src_metadata = tokio::fs::metadata(src)
            .await
            .with_context(|| format!("failed reading metadata from {src:?}"))?;
        preserve::set_file_metadata(&self.preserve, &src_metadata, dst).await?;
        Ok(copied)
    }

    #[instrument(skip(self))]
    #[async_recursion]
    async fn copy_directory_contents(
        &mut self,
        src: &std::path::Path,
        dst: &std::path::Path,
    ) -> Result<Summary, Error> {
        let failure = |err| Error::with_source(src, dst, ErrorKind::CopyDirectoryFailure, err);
        let mut summary = Summary::default();
        let dst_is_dir = tokio::fs::metadata(dst)
            .await
            .map(|metadata| metadata.is_dir())
            .unwrap_or(false);
        if !dst_is_dir {
            tracing::debug!("creating destination directory");
            tokio::fs::create_dir_all(dst)
                .await
                .with_context(|| format!("cannot create directory {dst:?}"))
                .map_err(failure)?;
            summary.directories_created += 1;
        }
        let mut entries = tokio::fs::read_dir(src)
            .await
            .with_context(|| format!("cannot open directory {src:?} for reading"))
            .map_err(failure)?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .with_context(|| format!("failed traversing directory {src:?}"))
            .map_err(failure)?
        {
            let entry_src = entry.path();
            let entry_dst = dst.join(entry.file_name());
            let metadata = match tokio::fs::metadata(&entry_src).await {
                Ok(metadata) => metadata,
                Err(err) => {
                    if err.kind() == std::io::ErrorKind::NotFound
                        && is_symlink(&entry_src).await
                    {
                        tracing::warn!("skipping {:?}: dangling symlink", &entry_src);
                        continue;
                    }
                    let err = anyhow::Error::from(err)
                        .context(format!("failed reading metadata from {entry_src:?}"));
                    let error =
                        Error::with_source(&entry_src, &entry_dst, ErrorKind::CopyFileFailure, err);
                    tracing::error!("{}", &error);
                    summary.files_failed += 1;
                    continue;
                }
            };
            if metadata.is_file() {
                match self.copy_file(&entry_src, &entry_dst).await {
                    Ok(file_summary) => summary = summary + file_summary,
                    Err(error) => {
                        tracing::error!("{}", &error);
                        summary.files_failed += 1;
                    }
                }
            } else if metadata.is_dir() {
                match self.copy_directory_contents(&entry_src, &entry_dst).await {
                    Ok(dir_summary) => summary = summary + dir_summary,
                    Err(error) => {
                        tracing::error!("{}", &error);
                        summary.directories_failed += 1;
                    }
                }
            } else {
                tracing::warn!(
                    "skipping {:?}: {}",
                    &entry_src,
                    ErrorKind::UnsupportedType.description()
                );
            }
        }
        Ok(summary)
    }
}

async fn is_symlink(path: &std::path::Path) -> bool {
    tokio::fs::symlink_metadata(path)
        .await
        .map(|metadata| metadata.is_symlink())
        .unwrap_or(false)
}
