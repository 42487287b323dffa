// Copyright (c) Microsoft. All rights reserved.

//! Turns a validated seed into an Ed25519 key pair and a self-signed server certificate.
//!
//! The key pair is a pure function of the seed, so the same KME key always yields the same identity.
//! The certificate's validity window starts at the time of the call.

const SECS_PER_DAY: i64 = 24 * 60 * 60;

/// A derived key pair and certificate.
#[derive(Clone, Eq, PartialEq)]
pub struct DerivedIdentity {
    /// PKCS#8 DER. Wiped on drop.
    pub private_key: zeroize::Zeroizing<Vec<u8>>,

    /// X.509 DER.
    pub certificate: Vec<u8>,
}

impl std::fmt::Debug for DerivedIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedIdentity")
            .field("certificate_len", &self.certificate.len())
            .finish_non_exhaustive()
    }
}

pub fn derive(
    seed: &crate::ValidatedSeed,
    subject: Option<&crate::DistinguishedName>,
    validity_days: u32,
) -> Result<DerivedIdentity, crate::CertError> {
    if validity_days == 0 {
        return Err(crate::CertError::InvalidValidity);
    }

    let key = openssl::pkey::PKey::private_key_from_raw_bytes(
        seed.as_bytes(),
        openssl::pkey::Id::ED25519,
    )?;

    let default_subject;
    let subject = match subject {
        Some(subject) if !subject.is_empty() => subject,
        _ => {
            default_subject = crate::DistinguishedName::default_subject();
            &default_subject
        }
    };
    let name = subject.to_x509_name()?;

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_err(crate::CertError::Clock)?;
    #[allow(clippy::cast_possible_wrap)]
    let now = now.as_secs() as i64;
    let not_before = openssl::asn1::Asn1Time::from_unix(now)?;
    let not_after =
        openssl::asn1::Asn1Time::from_unix(now + i64::from(validity_days) * SECS_PER_DAY)?;

    let mut builder = openssl::x509::X509::builder()?;
    builder.set_version(2)?;

    let serial_number = openssl::bn::BigNum::from_u32(1)?.to_asn1_integer()?;
    builder.set_serial_number(&serial_number)?;

    builder.set_subject_name(&name)?;
    builder.set_issuer_name(&name)?;
    builder.set_pubkey(&key)?;
    builder.set_not_before(&not_before)?;
    builder.set_not_after(&not_after)?;

    let basic_constraints = openssl::x509::extension::BasicConstraints::new()
        .critical()
        .build()?;
    builder.append_extension(basic_constraints)?;

    let key_usage = openssl::x509::extension::KeyUsage::new()
        .critical()
        .digital_signature()
        .key_encipherment()
        .build()?;
    builder.append_extension(key_usage)?;

    let ext_key_usage = openssl::x509::extension::ExtendedKeyUsage::new()
        .server_auth()
        .build()?;
    builder.append_extension(ext_key_usage)?;

    // Ed25519 signs the message directly.
    builder.sign(&key, openssl::hash::MessageDigest::null())?;
    let certificate = builder.build();

    log::debug!(
        "derived certificate for {} valid for {} days",
        subject,
        validity_days
    );

    Ok(DerivedIdentity {
        private_key: zeroize::Zeroizing::new(key.private_key_to_pkcs8()?),
        certificate: certificate.to_der()?,
    })
}
