//! Delivery of finished 10Q files to the receiving system's drop folder.

use std::io::Write;
use std::path::{Component, Path, PathBuf};

use serde_derive::Deserialize;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

/// Reports `(bytes_sent, bytes_total)` while a file is transferred.
pub type Progress<'a> = &'a mut dyn FnMut(u64, u64);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("cannot reach drop folder root {root:?}")]
    Connection { root: PathBuf },
    #[error("invalid destination {0:?}")]
    InvalidDestination(String),
    #[error("destination folder {0:?} does not exist")]
    MissingFolder(PathBuf),
    #[error("writing {path:?}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Places a complete file in a folder on the receiving side.
///
/// A transfer either delivers the whole file or fails; the file is never
/// visible partially written. Retrying is left to the caller.
pub trait FileTransport {
    fn put_file(
        &self,
        content: &[u8],
        destination_folder: &str,
        destination_filename: &str,
        progress: Option<Progress>,
    ) -> Result<(), TransportError>;
}

fn default_chunk_size() -> usize {
    32 * 1024
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct LocalDropConfig {
    /// Directory standing in for the remote side. Destination folders are
    /// resolved relative to it.
    pub root: PathBuf,
    /// Bytes written between progress reports.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl LocalDropConfig {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            chunk_size: default_chunk_size(),
        }
    }
}

/// Transfers files into a local (or locally mounted) drop folder.
#[derive(Debug)]
pub struct LocalDropFolder {
    config: LocalDropConfig,
}

impl LocalDropFolder {
    pub fn new(config: LocalDropConfig) -> Self {
        Self { config }
    }

    fn target_dir(&self, destination_folder: &str) -> Result<PathBuf, TransportError> {
        if !self.config.root.is_dir() {
            return Err(TransportError::Connection {
                root: self.config.root.clone(),
            });
        }
        let folder = Path::new(destination_folder);
        if !folder
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(TransportError::InvalidDestination(
                destination_folder.to_string(),
            ));
        }
        let dir = self.config.root.join(folder);
        if !dir.is_dir() {
            return Err(TransportError::MissingFolder(dir));
        }
        Ok(dir)
    }
}

impl FileTransport for LocalDropFolder {
    fn put_file(
        &self,
        content: &[u8],
        destination_folder: &str,
        destination_filename: &str,
        mut progress: Option<Progress>,
    ) -> Result<(), TransportError> {
        let mut name_components = Path::new(destination_filename).components();
        match (name_components.next(), name_components.next()) {
            (Some(Component::Normal(_)), None) => {}
            _ => {
                return Err(TransportError::InvalidDestination(
                    destination_filename.to_string(),
                ))
            }
        }

        let dir = self.target_dir(destination_folder)?;
        let path = dir.join(destination_filename);
        let write_err = |source| TransportError::Write {
            path: path.clone(),
            source,
        };

        let mut tmp = NamedTempFile::new_in(&dir).map_err(write_err)?;
        let total = content.len() as u64;
        let mut sent: u64 = 0;
        for chunk in content.chunks(self.config.chunk_size.max(1)) {
            tmp.write_all(chunk).map_err(write_err)?;
            sent += chunk.len() as u64;
            if let Some(progress) = progress.as_mut() {
                progress(sent, total);
            }
        }
        tmp.as_file().sync_all().map_err(write_err)?;
        debug!(?path, bytes = total, "persisting transferred file");
        tmp.persist_noclobber(&path)
            .map_err(|e| write_err(e.error))?;

        info!(?path, bytes = total, "file delivered");
        Ok(())
    }
}
