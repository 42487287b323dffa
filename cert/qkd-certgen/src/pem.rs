// Copyright (c) Microsoft. All rights reserved.

/// A derived identity in PEM form.
pub struct PemIdentity {
    /// `PRIVATE KEY` block (PKCS#8). Wiped on drop.
    pub private_key: zeroize::Zeroizing<Vec<u8>>,

    /// `CERTIFICATE` block.
    pub certificate: Vec<u8>,
}

pub fn encode(
    identity: &crate::DerivedIdentity,
) -> Result<PemIdentity, openssl::error::ErrorStack> {
    let private_key = openssl::pkey::PKey::private_key_from_pkcs8(&identity.private_key)?;
    let certificate = openssl::x509::X509::from_der(&identity.certificate)?;

    Ok(PemIdentity {
        private_key: zeroize::Zeroizing::new(private_key.private_key_to_pem_pkcs8()?),
        certificate: certificate.to_pem()?,
    })
}

/// Where a [`PemIdentity`] is written.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Output {
    /// `<prefix>-privatekey.pem` and `<prefix>-certificate.pem`.
    Files { prefix: std::path::PathBuf },

    /// Both blocks, key first.
    Stdout,
}

impl Output {
    pub fn private_key_path(prefix: &std::path::Path) -> std::path::PathBuf {
        with_suffix(prefix, "-privatekey.pem")
    }

    pub fn certificate_path(prefix: &std::path::Path) -> std::path::PathBuf {
        with_suffix(prefix, "-certificate.pem")
    }

    pub fn write(&self, identity: &PemIdentity) -> std::io::Result<()> {
        match self {
            Output::Files { prefix } => {
                let private_key_path = Output::private_key_path(prefix);
                write_private(&private_key_path, &identity.private_key)?;
                log::info!("wrote private key to {}", private_key_path.display());

                let certificate_path = Output::certificate_path(prefix);
                std::fs::write(&certificate_path, &identity.certificate)?;
                log::info!("wrote certificate to {}", certificate_path.display());

                Ok(())
            }

            Output::Stdout => {
                let stdout = std::io::stdout();
                let mut stdout = stdout.lock();
                write_to(&mut stdout, identity)
            }
        }
    }
}

pub fn write_to(mut w: impl std::io::Write, identity: &PemIdentity) -> std::io::Result<()> {
    w.write_all(&identity.private_key)?;
    w.write_all(&identity.certificate)?;
    w.flush()
}

fn with_suffix(prefix: &std::path::Path, suffix: &str) -> std::path::PathBuf {
    let mut path = prefix.as_os_str().to_owned();
    path.push(suffix);
    path.into()
}

#[cfg(unix)]
fn write_private(path: &std::path::Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;
    use std::os::unix::fs::PermissionsExt;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;

    // An existing file keeps its old mode through open(2).
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;

    file.write_all(contents)
}

#[cfg(not(unix))]
fn write_private(path: &std::path::Path, contents: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, contents)
}
