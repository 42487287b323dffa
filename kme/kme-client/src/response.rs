// Copyright (c) Microsoft. All rights reserved.

use crate::ProtocolError;

/// Parses a `200 OK` response body and checks it against what was asked for.
///
/// Exactly one key per call is supported. The key itself is returned still Base64-encoded.
pub fn validate(
    body: &[u8],
    key_mode: &kme_common::KeyMode,
) -> Result<kme_common::KeyMaterial, ProtocolError> {
    let response: kme_common_http::keys::Response =
        serde_json::from_slice(body).map_err(|err| ProtocolError::Malformed(Box::new(err)))?;

    let mut keys = response.keys.into_iter();
    let key = keys
        .next()
        .ok_or_else(|| ProtocolError::Malformed("response contains no keys".into()))?;

    let remaining = keys.len();
    if remaining > 0 {
        return Err(ProtocolError::UnexpectedKeyCount(remaining + 1));
    }

    if let kme_common::KeyMode::Decryption { key_id } = key_mode {
        if &key.key_id != key_id {
            return Err(ProtocolError::KeyIdMismatch {
                expected: key_id.clone(),
                got: key.key_id,
            });
        }
    }

    Ok(kme_common::KeyMaterial {
        key_id: key.key_id,
        key: key.key,
    })
}
