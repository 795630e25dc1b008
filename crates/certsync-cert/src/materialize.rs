//! Local certificate files
//!
//! Keeps `<base>/certs/<domain>.key` and `<base>/certs/<domain>.crt` in step
//! with a [`CertificateBundle`]. The key file is the only staleness signal;
//! when it is stale both files are truncated and rewritten.
//!
//! Writes are not atomic and there is no locking. Two runs against the same
//! domain at the same time can interleave and corrupt the certificate file.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::bundle::{CertType, CertificateBundle};

/// Name of the directory holding the materialized files
pub const CERTS_DIR_NAME: &str = "certs";

#[cfg(unix)]
const DIR_MODE: u32 = 0o777;
#[cfg(unix)]
const FILE_MODE: u32 = 0o755;

/// Filesystem errors while materializing a bundle
#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("Failed to create certs directory {path:?}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("Failed to read key file {path:?}: {source}")]
    ReadKey { path: PathBuf, source: io::Error },

    #[error("Failed to write key file {path:?}: {source}")]
    WriteKey { path: PathBuf, source: io::Error },

    #[error("Failed to write certificate file {path:?}: {source}")]
    WriteCert { path: PathBuf, source: io::Error },
}

/// Result of a materialize run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterializeOutcome {
    /// On-disk key already matched, nothing was written
    Unchanged,

    /// Both files were rewritten
    Updated {
        endpoint_count: usize,
        ca_count: usize,
    },
}

/// Key and certificate paths for one domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFilePair {
    pub certs_dir: PathBuf,
    pub key_path: PathBuf,
    pub cert_path: PathBuf,
}

impl LocalFilePair {
    pub fn new(base_dir: impl AsRef<Path>, domain: &str) -> Self {
        let certs_dir = base_dir.as_ref().join(CERTS_DIR_NAME);
        Self {
            key_path: certs_dir.join(format!("{}.key", domain)),
            cert_path: certs_dir.join(format!("{}.crt", domain)),
            certs_dir,
        }
    }

    /// Create the certs directory if it is missing.
    ///
    /// Returns `true` when the directory was created. The parent must exist.
    pub fn ensure_certs_dir(&self) -> Result<bool, MaterializeError> {
        match fs::metadata(&self.certs_dir) {
            Ok(_) => {
                debug!("Certs directory exists: {:?}", self.certs_dir);
                Ok(false)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                create_dir(&self.certs_dir).map_err(|source| MaterializeError::CreateDir {
                    path: self.certs_dir.clone(),
                    source,
                })?;
                info!("Created certs directory: {:?}", self.certs_dir);
                Ok(true)
            }
            Err(source) => Err(MaterializeError::CreateDir {
                path: self.certs_dir.clone(),
                source,
            }),
        }
    }

    /// Check whether the on-disk key differs from (or is absent relative to) the bundle key.
    ///
    /// The key file is written with a trailing newline, so content equal to the
    /// key with or without that newline counts as current.
    pub fn needs_update(&self, bundle: &CertificateBundle) -> Result<bool, MaterializeError> {
        let on_disk = match fs::read(&self.key_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Key file missing: {:?}", self.key_path);
                return Ok(true);
            }
            Err(source) => {
                return Err(MaterializeError::ReadKey {
                    path: self.key_path.clone(),
                    source,
                })
            }
        };

        let key = bundle.private_key.as_bytes();
        let current = on_disk == key || on_disk.strip_suffix(b"\n") == Some(key);
        debug!(
            "Key file {:?} is {}",
            self.key_path,
            if current { "current" } else { "stale" }
        );
        Ok(!current)
    }

    /// Truncate and rewrite both files from the bundle
    pub fn write(&self, bundle: &CertificateBundle) -> Result<MaterializeOutcome, MaterializeError> {
        write_file(&self.key_path, bundle.render_key().as_bytes()).map_err(|source| {
            MaterializeError::WriteKey {
                path: self.key_path.clone(),
                source,
            }
        })?;
        debug!("Wrote key file: {:?}", self.key_path);

        for cert in bundle.records_of(CertType::Other) {
            warn!(
                "Skipping certificate with unknown type ({} bytes of PEM)",
                cert.pem.len()
            );
        }

        write_file(&self.cert_path, bundle.render_chain().as_bytes()).map_err(|source| {
            MaterializeError::WriteCert {
                path: self.cert_path.clone(),
                source,
            }
        })?;
        debug!("Wrote certificate file: {:?}", self.cert_path);

        Ok(MaterializeOutcome::Updated {
            endpoint_count: bundle.records_of(CertType::Endpoint).count(),
            ca_count: bundle.records_of(CertType::CertificateAuthority).count(),
        })
    }

    /// Ensure the directory, check staleness and rewrite when needed
    pub fn materialize(
        &self,
        bundle: &CertificateBundle,
    ) -> Result<MaterializeOutcome, MaterializeError> {
        self.ensure_certs_dir()?;

        if !self.needs_update(bundle)? {
            return Ok(MaterializeOutcome::Unchanged);
        }

        self.write(bundle)
    }
}

fn create_dir(path: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIR_MODE);
    }
    builder.create(path)
}

fn write_file(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(FILE_MODE);
    }

    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.flush()
}
