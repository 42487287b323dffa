// Copyright (c) Microsoft. All rights reserved.

/// A client certificate and its private key, both PEM-encoded.
pub struct ClientCredentials {
    pub cert: Vec<u8>,
    pub key: Vec<u8>,
}

/// A KME server cert and its key, plus the CA cert that issued it. All PEM-encoded.
pub struct ServerCredentials {
    pub ca_cert: Vec<u8>,
    pub cert: Vec<u8>,
    pub key: Vec<u8>,
}

/// A trust bundle written to a temporary directory, which is deleted on drop.
pub struct TrustBundleFile {
    _dir: tempfile::TempDir,
    pub path: std::path::PathBuf,
}

/// Client credentials written to a temporary directory, which is deleted on drop.
pub struct CredentialFiles {
    _dir: tempfile::TempDir,
    pub cert: std::path::PathBuf,
    pub key: std::path::PathBuf,
}

/// Generate a new P-256 private key.
pub fn new_key() -> openssl::pkey::PKey<openssl::pkey::Private> {
    let group =
        openssl::ec::EcGroup::from_curve_name(openssl::nid::Nid::X9_62_PRIME256V1).unwrap();
    let ec_key = openssl::ec::EcKey::generate(&group).unwrap();
    openssl::pkey::PKey::from_ec_key(ec_key).unwrap()
}

/// Generate a self-signed client auth cert and its key.
pub fn client_credentials(common_name: &str) -> ClientCredentials {
    let key = new_key();
    let cert = self_signed_cert(common_name, &key);

    ClientCredentials {
        cert: cert.to_pem().unwrap(),
        key: key.private_key_to_pem_pkcs8().unwrap(),
    }
}

/// A cert and a key that do not belong together.
pub fn mismatched_credentials() -> ClientCredentials {
    let cert = self_signed_cert("mismatched", &new_key());
    let other_key = new_key();

    ClientCredentials {
        cert: cert.to_pem().unwrap(),
        key: other_key.private_key_to_pem_pkcs8().unwrap(),
    }
}

/// Generate a CA and a server auth cert it issued for `dns_name`.
pub fn server_credentials(dns_name: &str) -> ServerCredentials {
    let ca_key = new_key();
    let ca_name = name("Test KME CA");

    let mut ca = cert_builder(1, &ca_name, &ca_name, &ca_key);
    let basic_constraints = openssl::x509::extension::BasicConstraints::new()
        .critical()
        .ca()
        .build()
        .unwrap();
    ca.append_extension(basic_constraints).unwrap();
    let key_usage = openssl::x509::extension::KeyUsage::new()
        .critical()
        .key_cert_sign()
        .crl_sign()
        .build()
        .unwrap();
    ca.append_extension(key_usage).unwrap();
    ca.sign(&ca_key, openssl::hash::MessageDigest::sha256())
        .unwrap();
    let ca = ca.build();

    let key = new_key();
    let mut cert = cert_builder(2, &name(dns_name), ca.subject_name(), &key);
    let subject_alt_name = openssl::x509::extension::SubjectAlternativeName::new()
        .dns(dns_name)
        .build(&cert.x509v3_context(Some(&ca), None))
        .unwrap();
    cert.append_extension(subject_alt_name).unwrap();
    let ext_key_usage = openssl::x509::extension::ExtendedKeyUsage::new()
        .server_auth()
        .build()
        .unwrap();
    cert.append_extension(ext_key_usage).unwrap();
    cert.sign(&ca_key, openssl::hash::MessageDigest::sha256())
        .unwrap();
    let cert = cert.build();

    ServerCredentials {
        ca_cert: ca.to_pem().unwrap(),
        cert: cert.to_pem().unwrap(),
        key: key.private_key_to_pem_pkcs8().unwrap(),
    }
}

pub fn write_trust_bundle(pem: &[u8]) -> TrustBundleFile {
    let dir = tempfile::tempdir().unwrap();

    let path = dir.path().join("trust-bundle.pem");
    std::fs::write(&path, pem).unwrap();

    TrustBundleFile { _dir: dir, path }
}

pub fn write_credentials(credentials: &ClientCredentials) -> CredentialFiles {
    let dir = tempfile::tempdir().unwrap();

    let cert = dir.path().join("client.crt");
    std::fs::write(&cert, &credentials.cert).unwrap();

    let key = dir.path().join("client.key");
    std::fs::write(&key, &credentials.key).unwrap();

    CredentialFiles {
        _dir: dir,
        cert,
        key,
    }
}

fn name(common_name: &str) -> openssl::x509::X509Name {
    let mut name = openssl::x509::X509Name::builder().unwrap();
    name.append_entry_by_nid(openssl::nid::Nid::COMMONNAME, common_name)
        .unwrap();
    name.build()
}

/// A v3 cert builder with everything but extensions and the signature filled in.
fn cert_builder(
    serial_number: u32,
    subject: &openssl::x509::X509NameRef,
    issuer: &openssl::x509::X509NameRef,
    key: &openssl::pkey::PKeyRef<openssl::pkey::Private>,
) -> openssl::x509::X509Builder {
    let mut cert = openssl::x509::X509::builder().unwrap();
    cert.set_version(2).unwrap();

    let serial_number = openssl::bn::BigNum::from_u32(serial_number)
        .unwrap()
        .to_asn1_integer()
        .unwrap();
    cert.set_serial_number(&serial_number).unwrap();

    cert.set_subject_name(subject).unwrap();
    cert.set_issuer_name(issuer).unwrap();
    cert.set_pubkey(key).unwrap();

    let not_before = openssl::asn1::Asn1Time::days_from_now(0).unwrap();
    let not_after = openssl::asn1::Asn1Time::days_from_now(30).unwrap();
    cert.set_not_before(&not_before).unwrap();
    cert.set_not_after(&not_after).unwrap();

    cert
}

fn self_signed_cert(
    common_name: &str,
    key: &openssl::pkey::PKeyRef<openssl::pkey::Private>,
) -> openssl::x509::X509 {
    let name = name(common_name);
    let mut cert = cert_builder(1, &name, &name, key);

    let ext_key_usage = openssl::x509::extension::ExtendedKeyUsage::new()
        .client_auth()
        .build()
        .unwrap();
    cert.append_extension(ext_key_usage).unwrap();

    cert.sign(key, openssl::hash::MessageDigest::sha256())
        .unwrap();

    cert.build()
}
