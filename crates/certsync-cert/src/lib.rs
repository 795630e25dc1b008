//! Certificate bundles and their local file representation
//!
//! Decodes the bundle JSON kept in the secret store and writes it out as a
//! private key file plus a concatenated certificate chain file.

pub mod bundle;
pub mod materialize;

pub use bundle::{BundleError, CertType, CertificateBundle, CertificateRecord};
pub use materialize::{LocalFilePair, MaterializeError, MaterializeOutcome, CERTS_DIR_NAME};
