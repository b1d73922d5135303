//! Remote index synchronization
//!
//! Each pass fetches the remote index, diffs it against the last applied one,
//! downloads additions into the store root and deletes removals. Downloads
//! land in a temp file next to their target and are renamed into place, so
//! the directory watch only ever sees complete packages.

use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::SyncConfig;
use crate::error::{Result, StoreError};
use crate::index::{Index, diff, package_url, parse_index};

/// Outcome of one synchronization pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub downloaded: Vec<String>,
    pub deleted: Vec<String>,
    /// Entries that failed and will be retried next pass
    pub failed: Vec<String>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Mirrors a remote template index into a local directory
#[derive(Debug)]
pub struct Synchronizer {
    client: reqwest::Client,
    address: String,
    index_url: String,
    root: PathBuf,
    known: Mutex<Index>,
}

impl Synchronizer {
    /// `root` is the store root; index paths are resolved against it
    pub fn new(config: &SyncConfig, root: impl Into<PathBuf>) -> Result<Self> {
        let address = config.address.trim_end_matches('/').to_string();
        Url::parse(&address).map_err(|e| StoreError::InvalidAddress {
            address: config.address.clone(),
            reason: e.to_string(),
        })?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("corral/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StoreError::NetworkError {
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            index_url: package_url(&address, &config.index),
            address,
            root: root.into(),
            known: Mutex::new(Index::new()),
        })
    }

    /// The index as of the last pass
    pub async fn known(&self) -> Index {
        self.known.lock().await.clone()
    }

    /// Run one pass.
    ///
    /// An unreachable or malformed index fails the pass and leaves the known
    /// index untouched. Per-entry failures are reported and retried next pass.
    pub async fn sync_once(&self) -> Result<SyncReport> {
        let remote = self.fetch_index().await?;

        let mut known = self.known.lock().await;
        let changes = diff(&known, &remote);
        let mut report = SyncReport::default();
        if changes.is_empty() {
            debug!(address = %self.address, "templates up to date");
            return Ok(report);
        }

        for (path, url) in changes.add {
            match self.download(&path, &url).await {
                Ok(()) => {
                    known.insert(path.clone(), url);
                    report.downloaded.push(path);
                }
                Err(e) => {
                    warn!(path = %path, error = %e, "failed to download template");
                    report.failed.push(path);
                }
            }
        }

        for (path, _) in changes.delete {
            match std::fs::remove_file(self.root.join(&path)) {
                Ok(()) => {
                    known.remove(&path);
                    report.deleted.push(path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    known.remove(&path);
                    report.deleted.push(path);
                }
                Err(e) => {
                    warn!(path = %path, error = %e, "failed to delete template");
                    report.failed.push(path);
                }
            }
        }

        info!(
            downloaded = report.downloaded.len(),
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "template sync finished"
        );
        Ok(report)
    }

    /// Sync every `interval` until the task is dropped
    pub async fn run(&self, interval: std::time::Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = self.sync_once().await {
                warn!(address = %self.address, error = %e, "template sync failed");
            }
        }
    }

    async fn fetch_index(&self) -> Result<Index> {
        let body = self.get(&self.index_url).await?;
        let body = String::from_utf8_lossy(&body);
        parse_index(&body, &self.address)
    }

    async fn download(&self, path: &str, url: &str) -> Result<()> {
        let bytes = self.get(url).await?;
        let target = self.root.join(path);
        tokio::task::spawn_blocking(move || write_atomically(&target, &bytes)).await??;
        debug!(path = %path, "template downloaded");
        Ok(())
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| StoreError::from_reqwest(url, e))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| StoreError::from_reqwest(url, e))?;
        Ok(bytes.to_vec())
    }
}

/// Write through a temp file in the target directory, then rename
fn write_atomically(target: &Path, content: &[u8]) -> Result<()> {
    let directory = target.parent().ok_or_else(|| StoreError::InvalidConfig {
        message: format!("no parent directory for {}", target.display()),
    })?;
    std::fs::create_dir_all(directory)?;

    let mut file = tempfile::NamedTempFile::new_in(directory)?;
    file.write_all(content)?;
    file.as_file().sync_all()?;
    file.persist(target).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}
