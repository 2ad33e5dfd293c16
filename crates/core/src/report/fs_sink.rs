//! Filesystem report sink.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{PersistError, ReportSink, TriageReport};

/// Collision suffixes tried before giving up (`_1` .. `_999`).
const MAX_NAME_CANDIDATES: u32 = 1000;

/// Writes reports as Markdown files into a directory.
///
/// The document is written to a hidden temporary file first and hard-linked
/// to its final name, so a reader never sees a partial report and an
/// existing file is never replaced.
///
/// The report directory must live on a filesystem that supports hard links.
/// Where linking is unsupported (some network and FAT mounts) every persist
/// fails with [`PersistError::LinkFailed`].
#[derive(Debug, Clone)]
pub struct FsReportSink {
    dir: PathBuf,
}

impl FsReportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn candidate(&self, stem: &str, n: u32) -> PathBuf {
        match n {
            0 => self.dir.join(format!("{}.md", stem)),
            n => self.dir.join(format!("{}_{}.md", stem, n)),
        }
    }

    async fn link_unique(&self, temp: &Path, stem: &str) -> Result<PathBuf, PersistError> {
        for n in 0..MAX_NAME_CANDIDATES {
            let path = self.candidate(stem, n);
            match fs::hard_link(temp, &path).await {
                Ok(()) => return Ok(path),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!("Report name taken: {}", path.display());
                }
                Err(source) => return Err(PersistError::LinkFailed { path, source }),
            }
        }
        Err(PersistError::NameExhausted {
            stem: stem.to_string(),
            attempts: MAX_NAME_CANDIDATES,
        })
    }
}

#[async_trait]
impl ReportSink for FsReportSink {
    fn name(&self) -> &str {
        "filesystem"
    }

    async fn persist(&self, report: &TriageReport) -> Result<PathBuf, PersistError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| PersistError::DirectoryCreationFailed {
                path: self.dir.clone(),
                source,
            })?;

        let stem = report.file_stem();
        let temp = self.dir.join(format!(".{}.{}.tmp", stem, Uuid::new_v4()));

        if let Err(source) = fs::write(&temp, report.to_markdown()).await {
            remove_temp(&temp).await;
            return Err(PersistError::WriteFailed { path: temp, source });
        }

        let result = self.link_unique(&temp, &stem).await;
        remove_temp(&temp).await;

        let path = result?;
        info!("Report saved to {}", path.display());
        Ok(path)
    }
}

async fn remove_temp(temp: &Path) {
    if let Err(e) = fs::remove_file(temp).await {
        if e.kind() != ErrorKind::NotFound {
            warn!("Failed to remove temporary report {}: {}", temp.display(), e);
        }
    }
}
