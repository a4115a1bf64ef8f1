//! Core-agent binary resolution.
//!
//! Fetching and verifying the agent tarball is an external concern; the
//! runtime only requires the [`Downloader`] capability. The shipped
//! [`CacheDownloader`] resolves a binary that is already on disk and never
//! reaches the network.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use tracing::debug;

use crate::errors::{ApmError, Result};
use crate::platform;
use crate::version::CoreAgentVersion;

/// Options handed to the downloader by agent setup.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Directory the agent binary is cached under.
    pub cache_dir: PathBuf,
    /// Tarball URL prefix for downloaders that do fetch.
    pub download_url: String,
    /// When true the downloader must not fetch; it may only resolve an
    /// existing binary.
    pub disallow_download: bool,
}

/// Capability that produces a local core-agent binary path.
pub trait Downloader: Send + Sync {
    /// Resolve (and, if permitted, fetch) the binary for `version`.
    ///
    /// # Errors
    ///
    /// Returns [`ApmError::Download`] when no binary can be produced.
    fn fetch<'a>(
        &'a self,
        version: &'a CoreAgentVersion,
        options: &'a DownloadOptions,
    ) -> Pin<Box<dyn Future<Output = Result<PathBuf>> + Send + 'a>>;
}

/// The versioned directory the binary for `version` lives under.
#[must_use]
pub fn versioned_dir_name(version: &CoreAgentVersion) -> String {
    format!(
        "scout_apm_core-v{}-{}",
        version.numeric(),
        platform::detect_triple()
    )
}

/// Downloader that only resolves an already-cached binary.
#[derive(Debug, Default)]
pub struct CacheDownloader;

impl Downloader for CacheDownloader {
    fn fetch<'a>(
        &'a self,
        version: &'a CoreAgentVersion,
        options: &'a DownloadOptions,
    ) -> Pin<Box<dyn Future<Output = Result<PathBuf>> + Send + 'a>> {
        Box::pin(async move {
            let path = options
                .cache_dir
                .join(versioned_dir_name(version))
                .join("core-agent");

            match tokio::fs::metadata(&path).await {
                Ok(meta) if meta.is_file() => {
                    debug!(path = %path.display(), "resolved cached core agent binary");
                    Ok(path)
                }
                _ if options.disallow_download => Err(ApmError::Download(format!(
                    "core agent binary not cached at {} and downloading is disabled",
                    path.display()
                ))),
                _ => Err(ApmError::Download(format!(
                    "core agent binary not cached at {}; install a downloader that fetches \
                     release tarballs, or pre-populate the cache directory",
                    path.display()
                ))),
            }
        })
    }
}
