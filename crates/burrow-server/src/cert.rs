//! Self-signed certificate generation for TLS deployments.
//!
//! Produces a throwaway CA plus a server certificate signed by it, so
//! clients only need to trust `ca.pem`. Existing files are never
//! overwritten.

use std::path::Path;

use anyhow::{Context, bail};
use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair};
use tracing::info;

pub const CA_CERT_FILE: &str = "ca.pem";
pub const SERVER_CERT_FILE: &str = "cert.pem";
pub const SERVER_KEY_FILE: &str = "key.pem";

/// Writes `ca.pem`, `cert.pem` and `key.pem` into `out_dir`. The server
/// certificate is valid for `host` (DNS name or IP address).
pub fn generate(out_dir: &Path, host: &str) -> anyhow::Result<()> {
    for file in [CA_CERT_FILE, SERVER_CERT_FILE, SERVER_KEY_FILE] {
        if out_dir.join(file).exists() {
            bail!("refusing to overwrite existing {file}");
        }
    }
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;

    let ca_key = KeyPair::generate()?;
    let mut ca_params = CertificateParams::new(Vec::<String>::new())?;
    ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    ca_params
        .distinguished_name
        .push(DnType::CommonName, "burrow ca");
    let ca_cert = ca_params.self_signed(&ca_key)?;

    let server_key = KeyPair::generate()?;
    let mut server_params = CertificateParams::new(vec![host.to_string()])?;
    server_params
        .distinguished_name
        .push(DnType::CommonName, host);
    let server_cert = server_params.signed_by(&server_key, &ca_cert, &ca_key)?;

    std::fs::write(out_dir.join(CA_CERT_FILE), ca_cert.pem())?;
    std::fs::write(out_dir.join(SERVER_CERT_FILE), server_cert.pem())?;
    std::fs::write(out_dir.join(SERVER_KEY_FILE), server_key.serialize_pem())?;

    info!(dir = %out_dir.display(), host, "certificates generated");
    Ok(())
}
